//! Metadata filtering engine for search queries.
//!
//! Evaluates [`FilterClause`] predicates against vector metadata.
//! Supports `must` (AND) and `must_not` (AND-NOT) conditions with
//! operators: `eq`, `ne`, `gt`, `lt`, `gte`, `lte`, `in`, `range`.
//! A condition on a missing field never matches.

use crate::filter_types::{FilterClause, FilterCondition, FilterOperator};
use crate::record::{Metadata, MetadataValue};
use std::cmp::Ordering;

/// Check if a vector's metadata matches the given filter clause.
/// `must` conditions are AND-ed; `must_not` conditions are AND-NOT-ed.
pub fn matches_filter(metadata: &Metadata, filter: &FilterClause) -> bool {
    for cond in &filter.must {
        if !evaluate_condition(metadata, cond) {
            return false;
        }
    }
    for cond in &filter.must_not {
        if evaluate_condition(metadata, cond) {
            return false;
        }
    }
    true
}

fn evaluate_condition(metadata: &Metadata, cond: &FilterCondition) -> bool {
    let field_value = match metadata.get(&cond.field) {
        Some(v) => v,
        None => return false,
    };

    match cond.op {
        FilterOperator::Eq => cond.value.as_ref().is_some_and(|v| json_eq(field_value, v)),
        FilterOperator::Ne => cond.value.as_ref().is_some_and(|v| !json_eq(field_value, v)),
        FilterOperator::Gt => compare(field_value, cond, |o| o == Ordering::Greater),
        FilterOperator::Lt => compare(field_value, cond, |o| o == Ordering::Less),
        FilterOperator::Gte => compare(field_value, cond, |o| o != Ordering::Less),
        FilterOperator::Lte => compare(field_value, cond, |o| o != Ordering::Greater),
        FilterOperator::In => cond
            .values
            .as_ref()
            .is_some_and(|vals| vals.iter().any(|v| json_eq(field_value, v))),
        FilterOperator::Range => match cond.values.as_deref() {
            Some([low, high]) => {
                json_cmp(field_value, low).is_some_and(|o| o != Ordering::Less)
                    && json_cmp(field_value, high).is_some_and(|o| o != Ordering::Greater)
            }
            _ => false,
        },
    }
}

fn compare(meta: &MetadataValue, cond: &FilterCondition, pred: impl Fn(Ordering) -> bool) -> bool {
    cond.value
        .as_ref()
        .and_then(|v| json_cmp(meta, v))
        .is_some_and(pred)
}

/// Compare a MetadataValue with a serde_json::Value for equality.
/// A string list is equal when any element is.
fn json_eq(meta: &MetadataValue, json: &serde_json::Value) -> bool {
    match (meta, json) {
        (MetadataValue::String(s), serde_json::Value::String(js)) => s == js,
        (MetadataValue::StringList(list), serde_json::Value::String(js)) => {
            list.iter().any(|s| s == js)
        }
        (MetadataValue::Boolean(b), serde_json::Value::Bool(jb)) => b == jb,
        (MetadataValue::Integer(i), serde_json::Value::Number(n)) => {
            n.as_i64().is_some_and(|ni| *i == ni)
                || n.as_f64()
                    .is_some_and(|nf| (*i as f64 - nf).abs() < f64::EPSILON)
        }
        (MetadataValue::Float(f), serde_json::Value::Number(n)) => {
            n.as_f64().is_some_and(|nf| (*f - nf).abs() < f64::EPSILON)
        }
        _ => false,
    }
}

/// Compare a MetadataValue with a serde_json::Value for ordering.
/// Only numbers are ordered.
fn json_cmp(meta: &MetadataValue, json: &serde_json::Value) -> Option<Ordering> {
    let meta_f = match meta {
        MetadataValue::Integer(i) => *i as f64,
        MetadataValue::Float(f) => *f,
        _ => return None,
    };
    let json_f = json.as_f64()?;
    meta_f.partial_cmp(&json_f)
}

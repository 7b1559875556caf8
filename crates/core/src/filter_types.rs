//! Metadata filter types for search queries.
//!
//! Defines the filter clause structure evaluated by [`crate::search::filter`]
//! during pre-, post- and in-traversal filtering.

use serde::{Deserialize, Serialize};

/// Metadata filter clause with `must` (AND) and `must_not` (AND-NOT) conditions.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FilterClause {
    #[serde(default)]
    pub must: Vec<FilterCondition>,
    #[serde(default)]
    pub must_not: Vec<FilterCondition>,
}

impl FilterClause {
    /// Adds a condition that must hold.
    pub fn must(mut self, condition: FilterCondition) -> Self {
        self.must.push(condition);
        self
    }

    /// Adds a condition that must not hold.
    pub fn must_not(mut self, condition: FilterCondition) -> Self {
        self.must_not.push(condition);
        self
    }

    /// A clause with no conditions accepts every vector.
    pub fn is_empty(&self) -> bool {
        self.must.is_empty() && self.must_not.is_empty()
    }
}

/// A single filter condition on a metadata field.
///
/// `value` is used by the comparison operators, `values` by `in` (any of)
/// and `range` (`[low, high]`, inclusive).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilterCondition {
    pub field: String,
    pub op: FilterOperator,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub values: Option<Vec<serde_json::Value>>,
}

impl FilterCondition {
    /// Comparison condition against a single value.
    pub fn compare(
        field: impl Into<String>,
        op: FilterOperator,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            op,
            value: Some(value.into()),
            values: None,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::compare(field, FilterOperator::Eq, value)
    }

    pub fn any_of(field: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        Self {
            field: field.into(),
            op: FilterOperator::In,
            value: None,
            values: Some(values),
        }
    }

    /// Inclusive numeric range.
    pub fn range(
        field: impl Into<String>,
        low: impl Into<serde_json::Value>,
        high: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            op: FilterOperator::Range,
            value: None,
            values: Some(vec![low.into(), high.into()]),
        }
    }
}

/// Comparison operator for filter conditions.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    Range,
}

//! Stored record types.
//!
//! A [`VectorRecord`] is what callers insert and get back: a unique string id,
//! a fixed-length float vector and arbitrary key-value metadata. `MetadataValue`
//! supports boolean, integer, float, string and string-list values for use in
//! filtered search.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A typed metadata value attached to a vector.
///
/// Uses the default externally-tagged serde representation for bincode compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// Boolean value (`true` / `false`).
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Tag list; `eq` and `in` match when any element matches.
    StringList(Vec<String>),
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Boolean(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(v: Vec<String>) -> Self {
        MetadataValue::StringList(v)
    }
}

/// Metadata map of a single vector.
pub type Metadata = HashMap<String, MetadataValue>;

/// A vector as supplied by and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier. Re-inserting an existing id replaces the record.
    pub id: String,
    /// Vector components. Cosine indexes store the unit-normalized form.
    pub values: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl VectorRecord {
    /// Creates a record without metadata.
    pub fn new(id: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            values,
            metadata: Metadata::new(),
        }
    }

    /// Creates a record with metadata.
    pub fn with_metadata(id: impl Into<String>, values: Vec<f32>, metadata: Metadata) -> Self {
        Self {
            id: id.into(),
            values,
            metadata,
        }
    }
}

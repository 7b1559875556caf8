//! Error types for the index.
//!
//! Every fallible operation returns [`Result`]. Errors are local and
//! synchronous; nothing in this crate retries internally.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors produced by index, quantizer, and persistence operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Vector length differs from the index dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality fixed at index construction.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// A vector component is NaN or infinite.
    #[error("invalid vector value at index {index}: {reason}")]
    InvalidVector {
        /// Position of the offending component.
        index: usize,
        /// Why the value was rejected.
        reason: &'static str,
    },

    /// Caller supplied an argument outside the accepted range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The graph violates a structural invariant (entry point or neighbor out of
    /// bounds). Indicates a bug elsewhere; never repaired silently.
    #[error("index corrupted: {0}")]
    CorruptIndex(String),

    /// Encode/decode/distance was attempted before the codebook was trained.
    #[error("quantizer has not been trained")]
    UntrainedQuantizer,

    /// A persisted snapshot does not match the caller's expectations.
    #[error("incompatible persisted format: {0}")]
    IncompatiblePersistedFormat(String),

    /// Snapshot encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Underlying filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for IndexError {
    fn from(err: bincode::Error) -> Self {
        IndexError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        IndexError::InvalidConfig(err.to_string())
    }
}

impl IndexError {
    /// Returns `true` for errors caused by caller input rather than index state.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            IndexError::DimensionMismatch { .. }
                | IndexError::InvalidVector { .. }
                | IndexError::InvalidParameter(_)
                | IndexError::InvalidConfig(_)
                | IndexError::UntrainedQuantizer
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_message() {
        let err = IndexError::DimensionMismatch {
            expected: 128,
            actual: 64,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 128, got 64");
        assert!(err.is_caller_error());
    }

    #[test]
    fn test_corrupt_index_is_not_caller_error() {
        let err = IndexError::CorruptIndex("entry point 9 >= node count 3".into());
        assert!(!err.is_caller_error());
        assert!(err.to_string().contains("entry point 9"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: IndexError = io.into();
        assert!(matches!(err, IndexError::Io(_)));
    }
}

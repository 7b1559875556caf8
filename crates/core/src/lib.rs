//! # vecdex-core
//!
//! Embeddable in-memory approximate nearest neighbor index built on an HNSW
//! graph, with optional scalar, product or binary quantization, metadata
//! filtering and crash-safe snapshots.
//!
//! The crate is synchronous and has no async dependencies. [`VectorIndex`] is
//! `Send + Sync` and cheap to clone, so it can be shared across threads or
//! wrapped by a server crate.
//!
//! ```no_run
//! use vecdex_core::{DistanceMetric, HnswParams, Metadata, SearchParams, VectorIndex};
//!
//! let index = VectorIndex::create(3, DistanceMetric::Cosine, HnswParams::default(), None)?;
//! index.insert("a", vec![1.0, 0.0, 0.0], Metadata::new())?;
//! let hits = index.search(&[0.9, 0.1, 0.0], &SearchParams::top_k(1))?;
//! assert_eq!(hits[0].id, "a");
//! # Ok::<(), vecdex_core::IndexError>(())
//! ```

/// Global configuration constants and the serializable index configuration.
pub mod config;
/// Query coordinator: the thread-safe [`VectorIndex`] handle.
pub mod coordinator;
/// Error type shared by every module.
pub mod error;
/// Filter types used by search.
pub mod filter_types;
/// HNSW approximate nearest neighbor graph: structure, search, insertion, deletion and distance metrics.
pub mod hnsw;
/// Vector compression: scalar, product and binary quantizers.
pub mod quantization;
/// Record and metadata types.
pub mod record;
/// Search request/response types and metadata filtering.
pub mod search;
/// Vector store and snapshot persistence.
pub mod storage;

pub use config::IndexConfig;
pub use coordinator::{BatchMode, BatchReport, HnswParams, IndexStats, VectorIndex};
pub use error::{IndexError, Result};
pub use filter_types::{FilterClause, FilterCondition, FilterOperator};
pub use hnsw::{DistanceMetric, HnswConfig};
pub use quantization::{AnyQuantizer, QuantConfig, QuantKind, Quantizer};
pub use record::{Metadata, MetadataValue, VectorRecord};
pub use search::{FilterMode, SearchParams, SearchResult};

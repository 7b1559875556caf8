//! Storage layer: the slot-addressed vector store and snapshot persistence.
//!
//! Vectors live in memory in a [`VectorStore`]. Durability is provided by
//! bincode snapshots (CRC32 footer, atomic temp-file + rename).

/// Disk persistence: snapshot save/load with atomic writes.
pub mod persistence;
/// Id → slot vector table with metadata.
pub mod store;

pub use persistence::{load_index, save_index};
pub use store::{Insertion, VectorStore};

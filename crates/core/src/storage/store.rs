//! Vector store: canonical float vectors and metadata keyed by string id.
//!
//! Each vector occupies a dense `u32` slot in a contiguous f32 arena
//! (Struct-of-Arrays), the same slot the HNSW graph uses as its node id.
//! Slots are append-only: replacing or removing an id tombstones its slot and
//! the vector bytes stay in the arena (the graph still routes through them)
//! until the index is compacted.

use crate::error::{IndexError, Result};
use crate::record::{Metadata, VectorRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of [`VectorStore::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    /// Slot holding the new vector.
    pub slot: u32,
    /// Slot tombstoned because the id already existed.
    pub replaced: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStore {
    dimensions: usize,
    /// Slot `s` occupies `vectors[s * dimensions..(s + 1) * dimensions]`.
    vectors: Vec<f32>,
    /// Slot → id. Kept for tombstoned slots too.
    ids: Vec<String>,
    /// Slot → metadata. Emptied when the slot is tombstoned.
    metadata: Vec<Metadata>,
    live: Vec<bool>,
    /// id → live slot.
    slots: HashMap<String, u32>,
}

impl VectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
            ids: Vec::new(),
            metadata: Vec::new(),
            live: Vec::new(),
            slots: HashMap::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of live vectors.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total slots, including tombstones.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.ids.len()
    }

    /// Appends a vector under a fresh slot. An existing id is tombstoned first.
    /// The caller has already validated length and values.
    pub fn push(&mut self, id: String, values: &[f32], metadata: Metadata) -> Result<Insertion> {
        if values.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: values.len(),
            });
        }
        if self.ids.len() >= u32::MAX as usize {
            return Err(IndexError::InvalidParameter("slot space exhausted".into()));
        }
        let replaced = self.remove(&id);
        let slot = self.ids.len() as u32;
        self.vectors.extend_from_slice(values);
        self.ids.push(id.clone());
        self.metadata.push(metadata);
        self.live.push(true);
        self.slots.insert(id, slot);
        Ok(Insertion { slot, replaced })
    }

    /// Tombstones the slot of `id`. Returns the slot, or `None` if the id is unknown.
    pub fn remove(&mut self, id: &str) -> Option<u32> {
        let slot = self.slots.remove(id)?;
        self.live[slot as usize] = false;
        self.metadata[slot as usize] = Metadata::new();
        Some(slot)
    }

    #[inline]
    pub fn slot_of(&self, id: &str) -> Option<u32> {
        self.slots.get(id).copied()
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    #[inline]
    pub fn is_live(&self, slot: u32) -> bool {
        self.live.get(slot as usize).copied().unwrap_or(false)
    }

    #[inline]
    pub fn vector(&self, slot: u32) -> &[f32] {
        let start = slot as usize * self.dimensions;
        &self.vectors[start..start + self.dimensions]
    }

    #[inline]
    pub fn id(&self, slot: u32) -> &str {
        &self.ids[slot as usize]
    }

    #[inline]
    pub fn metadata(&self, slot: u32) -> &Metadata {
        &self.metadata[slot as usize]
    }

    /// The whole slot-major arena, tombstones included.
    pub fn arena(&self) -> &[f32] {
        &self.vectors
    }

    /// Live slots in ascending order.
    pub fn live_slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.live
            .iter()
            .enumerate()
            .filter(|(_, &l)| l)
            .map(|(s, _)| s as u32)
    }

    /// Copy of the live vectors as one contiguous arena.
    pub fn live_arena(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * self.dimensions);
        for slot in self.live_slots() {
            out.extend_from_slice(self.vector(slot));
        }
        out
    }

    pub fn record(&self, slot: u32) -> VectorRecord {
        VectorRecord {
            id: self.id(slot).to_string(),
            values: self.vector(slot).to_vec(),
            metadata: self.metadata(slot).clone(),
        }
    }

    /// Checks that the parallel arrays and the id map agree.
    pub fn validate(&self) -> Result<()> {
        let n = self.ids.len();
        if self.vectors.len() != n * self.dimensions {
            return Err(IndexError::CorruptIndex(format!(
                "vector arena length {} != slots({}) * dimensions({})",
                self.vectors.len(),
                n,
                self.dimensions
            )));
        }
        if self.metadata.len() != n || self.live.len() != n {
            return Err(IndexError::CorruptIndex(format!(
                "metadata({}) / live({}) != slots({})",
                self.metadata.len(),
                self.live.len(),
                n
            )));
        }
        for (id, &slot) in &self.slots {
            let s = slot as usize;
            if s >= n || !self.live[s] || self.ids[s] != *id {
                return Err(IndexError::CorruptIndex(format!(
                    "id '{}' maps to invalid slot {}",
                    id, slot
                )));
            }
        }
        let live_count = self.live.iter().filter(|&&l| l).count();
        if live_count != self.slots.len() {
            return Err(IndexError::CorruptIndex(format!(
                "{} live slots but {} ids",
                live_count,
                self.slots.len()
            )));
        }
        Ok(())
    }

    /// Approximate heap footprint in bytes.
    pub fn estimate_memory_bytes(&self) -> usize {
        let ids: usize = self.ids.iter().map(|id| id.len() * 2 + 48).sum();
        let metadata: usize = self.metadata.iter().map(|m| m.len() * 64 + 48).sum();
        self.vectors.len() * std::mem::size_of::<f32>() + ids + metadata + self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MetadataValue;

    #[test]
    fn test_push_and_lookup() {
        let mut store = VectorStore::new(2);
        let ins = store.push("a".into(), &[1.0, 2.0], Metadata::new()).unwrap();
        assert_eq!(ins, Insertion { slot: 0, replaced: None });
        assert_eq!(store.vector(0), &[1.0, 2.0]);
        assert_eq!(store.slot_of("a"), Some(0));
        assert_eq!(store.len(), 1);
        assert!(store.validate().is_ok());
    }

    #[test]
    fn test_reinsert_tombstones_old_slot() {
        let mut store = VectorStore::new(2);
        let mut meta = Metadata::new();
        meta.insert("k".into(), MetadataValue::Integer(1));
        store.push("a".into(), &[1.0, 0.0], meta).unwrap();
        let ins = store.push("a".into(), &[0.0, 1.0], Metadata::new()).unwrap();
        assert_eq!(ins, Insertion { slot: 1, replaced: Some(0) });
        assert_eq!(store.len(), 1);
        assert_eq!(store.slot_count(), 2);
        assert!(!store.is_live(0));
        assert!(store.metadata(0).is_empty());
        // Tombstoned vectors stay addressable for graph routing
        assert_eq!(store.vector(0), &[1.0, 0.0]);
        assert_eq!(store.live_slots().collect::<Vec<_>>(), vec![1]);
        assert!(store.validate().is_ok());
    }

    #[test]
    fn test_remove_unknown_id() {
        let mut store = VectorStore::new(3);
        assert_eq!(store.remove("nope"), None);
    }

    #[test]
    fn test_wrong_length_rejected_without_side_effects() {
        let mut store = VectorStore::new(3);
        store.push("a".into(), &[1.0, 2.0, 3.0], Metadata::new()).unwrap();
        assert!(store.push("a".into(), &[1.0], Metadata::new()).is_err());
        assert!(store.contains("a"));
        assert_eq!(store.slot_count(), 1);
    }

    #[test]
    fn test_live_arena_skips_tombstones() {
        let mut store = VectorStore::new(1);
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            store.push(id.to_string(), &[i as f32], Metadata::new()).unwrap();
        }
        store.remove("b");
        assert_eq!(store.live_arena(), vec![0.0, 2.0]);
    }

    #[test]
    fn test_validate_detects_bad_map() {
        let mut store = VectorStore::new(1);
        store.push("a".into(), &[0.0], Metadata::new()).unwrap();
        store.slots.insert("ghost".into(), 7);
        assert!(matches!(store.validate(), Err(IndexError::CorruptIndex(_))));
    }
}

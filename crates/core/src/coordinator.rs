//! Query coordinator: the public face of the index.
//!
//! [`VectorIndex`] wraps the vector store, the HNSW graph and the optional
//! quantizer behind one `Arc<RwLock<IndexData>>`. Searches take the read lock
//! and run concurrently; insert, delete and the swap phases of training and
//! compaction take the write lock. Cloning a `VectorIndex` produces a new
//! handle to the same shared data.

use crate::config::{self, IndexConfig};
use crate::error::{IndexError, Result};
use crate::filter_types::FilterClause;
use crate::hnsw::distance::{self, DistanceMetric};
use crate::hnsw::graph::{HnswConfig, HnswGraph};
use crate::hnsw::search::SearchBudget;
use crate::hnsw::select::cmp_candidates;
use crate::quantization::{AnyQuantizer, QuantConfig, Quantizer};
use crate::record::{Metadata, VectorRecord};
use crate::search::filter::matches_filter;
use crate::search::types::{FilterMode, SearchParams, SearchResult};
use crate::storage::persistence;
use crate::storage::store::VectorStore;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// The two HNSW construction knobs most callers set.
#[derive(Debug, Clone, Copy)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: config::HNSW_DEFAULT_M,
            ef_construction: config::HNSW_DEFAULT_EF_CONSTRUCTION,
        }
    }
}

/// How a batch insert treats malformed entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchMode {
    /// Reject the whole batch on the first malformed entry. Nothing is inserted.
    #[default]
    Abort,
    /// Insert the valid entries and report the rest.
    BestEffort,
}

/// Result of [`VectorIndex::insert_batch_with`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub inserted: usize,
    /// Position in the input batch and the reason it was rejected.
    pub rejected: Vec<(usize, IndexError)>,
}

/// Point-in-time counters for an index.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub dimensions: usize,
    pub metric: DistanceMetric,
    pub live: usize,
    /// Tombstoned slots awaiting [`VectorIndex::compact`].
    pub deleted: usize,
    pub max_layer: usize,
    /// Live vectors reachable from the entry point at layer 0.
    pub reachable: usize,
    pub quantizer: Option<&'static str>,
    pub quantizer_trained: bool,
    /// Code bytes per vector when a trained quantizer is active, f32 bytes otherwise.
    pub bytes_per_vector: usize,
    pub memory_bytes: usize,
}

/// A validated, normalized entry ready for insertion.
struct Prepared {
    id: String,
    values: Vec<f32>,
    metadata: Metadata,
}

fn check_vector(dimensions: usize, values: &[f32]) -> Result<()> {
    if values.len() != dimensions {
        return Err(IndexError::DimensionMismatch {
            expected: dimensions,
            actual: values.len(),
        });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        let reason = if values[index].is_nan() {
            "NaN"
        } else {
            "infinite"
        };
        return Err(IndexError::InvalidVector { index, reason });
    }
    Ok(())
}

/// Length and value checks, then unit normalization for cosine.
fn prepare_vector(config: &IndexConfig, mut values: Vec<f32>) -> Result<Vec<f32>> {
    check_vector(config.dimensions, &values)?;
    if config.metric.requires_normalization() && !distance::normalize_in_place(&mut values) {
        return Err(IndexError::InvalidVector {
            index: 0,
            reason: "zero vector has no cosine direction",
        });
    }
    Ok(values)
}

fn prepare_record(config: &IndexConfig, record: VectorRecord) -> Result<Prepared> {
    if record.id.is_empty() || record.id.len() > config::MAX_ID_LEN {
        return Err(IndexError::InvalidParameter(format!(
            "id length must be in 1..={}, got {}",
            config::MAX_ID_LEN,
            record.id.len()
        )));
    }
    if record.metadata.len() > config::MAX_METADATA_KEYS {
        return Err(IndexError::InvalidParameter(format!(
            "at most {} metadata keys allowed, got {}",
            config::MAX_METADATA_KEYS,
            record.metadata.len()
        )));
    }
    Ok(Prepared {
        values: prepare_vector(config, record.values)?,
        id: record.id,
        metadata: record.metadata,
    })
}

/// Encode every slot of a slot-major arena, in parallel.
fn encode_all(quantizer: &AnyQuantizer, arena: &[f32], dimensions: usize) -> Result<Vec<u8>> {
    let per_slot: Vec<Vec<u8>> = arena
        .par_chunks(dimensions)
        .map(|v| quantizer.encode(v))
        .collect::<Result<_>>()?;
    Ok(per_slot.concat())
}

/// Everything behind the index lock. Graph code is single-threaded; all
/// synchronization happens in [`VectorIndex`].
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexData {
    pub config: IndexConfig,
    pub store: VectorStore,
    pub graph: HnswGraph,
    pub quantizer: Option<AnyQuantizer>,
    /// Slot-major codes, `code_size` bytes per slot. Empty while untrained.
    pub codes: Vec<u8>,
    /// Bumped on every (re)training so compaction can spot a concurrent swap.
    pub quantizer_epoch: u64,
}

impl IndexData {
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let quantizer = config
            .quantization
            .as_ref()
            .map(|q| AnyQuantizer::untrained(q, config.dimensions, config.metric));
        Ok(Self {
            store: VectorStore::new(config.dimensions),
            graph: HnswGraph::new(config.hnsw.clone()),
            quantizer,
            codes: Vec::new(),
            quantizer_epoch: 0,
            config,
        })
    }

    fn trained_quantizer(&self) -> Option<&AnyQuantizer> {
        self.quantizer.as_ref().filter(|q| q.is_trained())
    }

    fn rerank(&self) -> bool {
        self.config.quantization.as_ref().map_or(true, |q| q.rerank)
    }

    /// Validate invariants across store, graph and codes after deserialization.
    pub fn validate(&self) -> Result<()> {
        self.config
            .validate()
            .map_err(|e| IndexError::CorruptIndex(format!("stored config invalid: {}", e)))?;
        if self.store.dimensions() != self.config.dimensions {
            return Err(IndexError::CorruptIndex(format!(
                "store dimension {} != config dimension {}",
                self.store.dimensions(),
                self.config.dimensions
            )));
        }
        self.store.validate()?;
        self.graph.validate()?;

        let slots = self.store.slot_count();
        if self.graph.node_count() != slots {
            return Err(IndexError::CorruptIndex(format!(
                "graph nodes {} != store slots {}",
                self.graph.node_count(),
                slots
            )));
        }
        if let Some(slot) =
            (0..slots as u32).find(|&s| self.graph.is_deleted(s) == self.store.is_live(s))
        {
            return Err(IndexError::CorruptIndex(format!(
                "slot {} tombstone state differs between store and graph",
                slot
            )));
        }
        match &self.quantizer {
            Some(q) => {
                if q.dimensions() != self.config.dimensions {
                    return Err(IndexError::CorruptIndex(format!(
                        "quantizer dimension {} != config dimension {}",
                        q.dimensions(),
                        self.config.dimensions
                    )));
                }
                q.check_codes(&self.codes, slots)?;
            }
            None if !self.codes.is_empty() => {
                return Err(IndexError::CorruptIndex(
                    "codes present without a quantizer".into(),
                ));
            }
            None => {}
        }
        Ok(())
    }

    /// Insert a validated, normalized vector. `code` may carry a precomputed
    /// encoding from the current quantizer.
    pub(crate) fn insert_prepared(
        &mut self,
        id: String,
        values: Vec<f32>,
        metadata: Metadata,
        code: Option<Vec<u8>>,
    ) -> Result<u32> {
        // Encode before touching any state so a failure leaves nothing behind
        let code = match self.trained_quantizer() {
            Some(q) => Some(match code {
                Some(c) => c,
                None => q.encode(&values)?,
            }),
            None => None,
        };

        let metric = self.config.metric;
        let IndexData {
            store,
            graph,
            codes,
            ..
        } = self;
        let ins = store.push(id, &values, metadata)?;
        let store = &*store;
        let pair = |a: u32, b: u32| metric.distance(store.vector(a), store.vector(b));
        if let Some(old) = ins.replaced {
            graph.mark_deleted(old, &pair);
        }
        if let Some(c) = code {
            codes.extend_from_slice(&c);
        }
        let dist_to_new = |other: u32| metric.distance(&values, store.vector(other));
        graph.insert(ins.slot, &dist_to_new, &pair)?;
        Ok(ins.slot)
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let metric = self.config.metric;
        let IndexData { store, graph, .. } = self;
        match store.remove(id) {
            Some(slot) => {
                let store = &*store;
                let pair = |a: u32, b: u32| metric.distance(store.vector(a), store.vector(b));
                graph.mark_deleted(slot, &pair);
                true
            }
            None => false,
        }
    }

    #[inline]
    fn code(&self, slot: u32, size: usize) -> &[u8] {
        let start = slot as usize * size;
        &self.codes[start..start + size]
    }

    /// Graph candidates for a prepared query, best first, at most `ef` of them.
    /// Quantized distances steer the walk when a trained quantizer is present;
    /// with rerank on, the survivors are re-scored exactly.
    fn graph_search<A>(
        &self,
        query: &[f32],
        ef: usize,
        accept: &A,
        budget: &mut SearchBudget,
    ) -> Result<Vec<(f32, u32)>>
    where
        A: Fn(u32) -> bool,
    {
        let metric = self.config.metric;
        match self.trained_quantizer() {
            Some(q) => {
                let table = q.prepare(query)?;
                let size = q.code_size();
                let approx = |slot: u32| table.distance(self.code(slot, size));
                let mut candidates = self.graph.knn_search(ef, &approx, accept, budget)?;
                if self.rerank() {
                    for c in candidates.iter_mut() {
                        c.0 = metric.distance(query, self.store.vector(c.1));
                    }
                    candidates.sort_unstable_by(cmp_candidates);
                }
                Ok(candidates)
            }
            None => {
                let exact = |slot: u32| metric.distance(query, self.store.vector(slot));
                self.graph.knn_search(ef, &exact, accept, budget)
            }
        }
    }

    /// Exact linear scan over live slots passing `pred`.
    fn scan<P>(&self, query: &[f32], pred: P) -> Vec<(f32, u32)>
    where
        P: Fn(u32) -> bool,
    {
        let metric = self.config.metric;
        self.store
            .live_slots()
            .filter(|&s| pred(s))
            .map(|s| (metric.distance(query, self.store.vector(s)), s))
            .collect()
    }

    /// Graph search with over-fetch, doubling until `k` matches survive the
    /// filter or the live set is exhausted.
    fn post_filtered(
        &self,
        query: &[f32],
        k: usize,
        ef: usize,
        filter: &FilterClause,
        budget: &mut SearchBudget,
    ) -> Result<Vec<(f32, u32)>> {
        let live_count = self.store.len();
        let live = |slot: u32| !self.graph.is_deleted(slot);
        let mut fetch = k.saturating_mul(config::POST_FILTER_OVERFETCH);
        loop {
            let width = ef.max(fetch);
            let candidates = self.graph_search(query, width, &live, budget)?;
            let exhausted = candidates.len() < width || width >= live_count || budget.expired();
            let matched: Vec<(f32, u32)> = candidates
                .into_iter()
                .filter(|&(_, slot)| matches_filter(self.store.metadata(slot), filter))
                .collect();
            if matched.len() >= k || exhausted {
                return Ok(matched);
            }
            fetch = width.saturating_mul(2);
            tracing::debug!(
                matched = matched.len(),
                k,
                next_fetch = fetch,
                "post-filter over-fetch escalated"
            );
        }
    }

    /// Search with a query that already passed [`prepare_vector`].
    pub(crate) fn search_prepared(
        &self,
        query: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<SearchResult>> {
        params.validate()?;
        if self.store.is_empty() {
            return Ok(Vec::new());
        }
        let k = params.k;
        let ef = params.effective_ef(self.config.hnsw.ef_search);
        let mut budget = SearchBudget::from_deadline(params.deadline);
        let live = |slot: u32| !self.graph.is_deleted(slot);

        let filter = params.filter.as_ref().filter(|f| !f.is_empty());
        let hits = match (filter, params.filter_mode) {
            (None, _) => self.graph_search(query, ef, &live, &mut budget)?,
            (Some(filter), FilterMode::Traversal) => {
                let accept =
                    |slot: u32| live(slot) && matches_filter(self.store.metadata(slot), filter);
                self.graph_search(query, ef, &accept, &mut budget)?
            }
            (Some(filter), FilterMode::Pre) => {
                self.scan(query, |slot| matches_filter(self.store.metadata(slot), filter))
            }
            (Some(filter), FilterMode::Post) => {
                self.post_filtered(query, k, ef, filter, &mut budget)?
            }
        };
        Ok(self.finish(hits, k, params.include_metadata))
    }

    /// Order by `(distance, id)`, cut to `k` and attach ids and scores.
    fn finish(
        &self,
        mut hits: Vec<(f32, u32)>,
        k: usize,
        include_metadata: bool,
    ) -> Vec<SearchResult> {
        hits.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then_with(|| self.store.id(a.1).cmp(self.store.id(b.1)))
        });
        hits.truncate(k);
        let metric = self.config.metric;
        hits.into_iter()
            .map(|(d, slot)| SearchResult {
                id: self.store.id(slot).to_string(),
                score: metric.score(d),
                metadata: include_metadata.then(|| self.store.metadata(slot).clone()),
            })
            .collect()
    }

    fn stats(&self) -> IndexStats {
        let trained = self.trained_quantizer();
        IndexStats {
            dimensions: self.config.dimensions,
            metric: self.config.metric,
            live: self.store.len(),
            deleted: self.graph.deleted_count(),
            max_layer: self.graph.max_layer,
            reachable: self.graph.reachable_from_entry(),
            quantizer: self.quantizer.as_ref().map(|q| q.name()),
            quantizer_trained: trained.is_some(),
            bytes_per_vector: trained.map_or(
                self.config.dimensions * std::mem::size_of::<f32>(),
                |q| q.code_size(),
            ),
            memory_bytes: self.store.estimate_memory_bytes()
                + self.graph.estimate_memory_bytes()
                + self.codes.len(),
        }
    }
}

/// A thread-safe ANN index. Cheap to clone; clones share the same data.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    data: Arc<RwLock<IndexData>>,
    training: Arc<AtomicBool>,
}

impl VectorIndex {
    /// Creates an empty index from a full configuration.
    pub fn new(config: IndexConfig) -> Result<Self> {
        Ok(Self::from_data(IndexData::new(config)?))
    }

    /// Creates an empty index from the common construction parameters.
    pub fn create(
        dimensions: usize,
        metric: DistanceMetric,
        params: HnswParams,
        quantization: Option<QuantConfig>,
    ) -> Result<Self> {
        let mut config = IndexConfig::new(dimensions, metric)
            .with_hnsw(HnswConfig::with_params(params.m, params.ef_construction));
        config.quantization = quantization;
        Self::new(config)
    }

    fn from_data(data: IndexData) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            training: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> IndexConfig {
        self.data.read().config.clone()
    }

    pub fn dimensions(&self) -> usize {
        self.data.read().config.dimensions
    }

    /// Inserts or replaces the vector stored under `id`.
    pub fn insert(&self, id: impl Into<String>, vector: Vec<f32>, metadata: Metadata) -> Result<()> {
        {
            let mut data = self.data.write();
            let prepared =
                prepare_record(&data.config, VectorRecord::with_metadata(id, vector, metadata))?;
            data.insert_prepared(prepared.id, prepared.values, prepared.metadata, None)?;
        }
        self.maybe_train();
        Ok(())
    }

    /// Inserts under a fresh UUID v4 id and returns it.
    pub fn insert_auto(&self, vector: Vec<f32>, metadata: Metadata) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.insert(id.clone(), vector, metadata)?;
        Ok(id)
    }

    /// Inserts a batch; any malformed entry aborts the whole batch before
    /// anything is inserted.
    pub fn insert_batch(&self, entries: Vec<VectorRecord>) -> Result<()> {
        self.insert_batch_with(entries, BatchMode::Abort).map(|_| ())
    }

    /// Inserts a batch. Entries are validated, normalized and encoded in
    /// parallel; graph insertion runs sequentially under one write lock.
    /// Later duplicates of an id replace earlier ones.
    pub fn insert_batch_with(
        &self,
        entries: Vec<VectorRecord>,
        mode: BatchMode,
    ) -> Result<BatchReport> {
        if entries.len() > config::MAX_BATCH_SIZE {
            return Err(IndexError::InvalidParameter(format!(
                "batch of {} exceeds the limit of {}",
                entries.len(),
                config::MAX_BATCH_SIZE
            )));
        }
        let config = self.config();
        let prepared: Vec<Result<Prepared>> = entries
            .into_par_iter()
            .map(|record| prepare_record(&config, record))
            .collect();

        let mut report = BatchReport::default();
        let mut valid = Vec::with_capacity(prepared.len());
        for (index, entry) in prepared.into_iter().enumerate() {
            match entry {
                Ok(p) => valid.push(p),
                Err(e) if mode == BatchMode::Abort => {
                    tracing::debug!(index, error = %e, "batch rejected");
                    return Err(e);
                }
                Err(e) => report.rejected.push((index, e)),
            }
        }

        {
            let mut data = self.data.write();
            let codes: Option<Vec<Vec<u8>>> = match data.trained_quantizer() {
                Some(q) => Some(
                    valid
                        .par_iter()
                        .map(|p| q.encode(&p.values))
                        .collect::<Result<_>>()?,
                ),
                None => None,
            };
            let mut codes = codes.map(|c| c.into_iter());
            for p in valid {
                let code = codes.as_mut().and_then(|it| it.next());
                data.insert_prepared(p.id, p.values, p.metadata, code)?;
                report.inserted += 1;
            }
        }
        tracing::debug!(
            inserted = report.inserted,
            rejected = report.rejected.len(),
            "batch inserted"
        );
        self.maybe_train();
        Ok(report)
    }

    /// Top-k search. Results are ordered best first; ties go to the lower id.
    pub fn search(&self, query: &[f32], params: &SearchParams) -> Result<Vec<SearchResult>> {
        let data = self.data.read();
        let query = prepare_vector(&data.config, query.to_vec())?;
        data.search_prepared(&query, params)
    }

    /// Runs several queries in parallel under one read lock.
    pub fn search_batch(
        &self,
        queries: &[Vec<f32>],
        params: &SearchParams,
    ) -> Result<Vec<Vec<SearchResult>>> {
        let guard = self.data.read();
        let data: &IndexData = &guard;
        queries
            .par_iter()
            .map(|q| {
                let query = prepare_vector(&data.config, q.clone())?;
                data.search_prepared(&query, params)
            })
            .collect()
    }

    /// Removes `id`. Returns `false` when it was not present.
    pub fn delete(&self, id: &str) -> bool {
        self.data.write().remove(id)
    }

    /// The stored record; cosine indexes return the normalized vector.
    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        let data = self.data.read();
        data.store.slot_of(id).map(|slot| data.store.record(slot))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.data.read().store.contains(id)
    }

    pub fn len(&self) -> usize {
        self.data.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().store.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        self.data.read().stats()
    }

    /// Structural self-check of store, graph and codes.
    pub fn validate(&self) -> Result<()> {
        self.data.read().validate()
    }

    /// (Re)trains the configured quantizer on the live vectors.
    ///
    /// The new quantizer is trained on a snapshot without holding the lock;
    /// the swap and the full re-encode happen under the write lock, so no
    /// encode ever sees a half-trained codebook.
    pub fn train_quantizer(&self) -> Result<()> {
        // Phase A: snapshot under read lock
        let (quant_config, dimensions, metric, sample) = {
            let data = self.data.read();
            let quant_config = data.config.quantization.clone().ok_or_else(|| {
                IndexError::InvalidConfig("index has no quantization configured".into())
            })?;
            (
                quant_config,
                data.config.dimensions,
                data.config.metric,
                data.store.live_arena(),
            )
        };

        // Phase B: train without any lock
        let trained = AnyQuantizer::train(&quant_config, dimensions, metric, &sample)?;

        // Phase C: swap and re-encode under write lock
        let mut data = self.data.write();
        if data.config.dimensions != dimensions || data.config.metric != metric {
            return Err(IndexError::InvalidConfig(
                "index was replaced while the quantizer was training".into(),
            ));
        }
        let codes = encode_all(&trained, data.store.arena(), dimensions)?;
        let name = trained.name();
        data.quantizer = Some(trained);
        data.codes = codes;
        data.quantizer_epoch += 1;
        tracing::info!(
            quantizer = name,
            sample = sample.len() / dimensions,
            slots = data.store.slot_count(),
            "quantizer trained and codes re-encoded"
        );
        Ok(())
    }

    /// Trains once `train_after` vectors are stored. Failures are logged, not
    /// returned, since the triggering insert itself succeeded.
    fn maybe_train(&self) {
        let due = {
            let data = self.data.read();
            match (&data.config.quantization, &data.quantizer) {
                (Some(cfg), Some(q)) => cfg
                    .train_after
                    .is_some_and(|n| !q.is_trained() && data.store.len() >= n),
                _ => false,
            }
        };
        if !due {
            return;
        }
        if self
            .training
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if let Err(e) = self.train_quantizer() {
            tracing::warn!(error = %e, "automatic quantizer training failed");
        }
        self.training.store(false, Ordering::Release);
    }

    /// Rebuilds the graph from live vectors only, dropping tombstones.
    /// Returns the number of tombstoned slots reclaimed.
    ///
    /// **Phase A** (read lock, brief): snapshot live records.
    /// **Phase B** (no lock): build a fresh store and graph.
    /// **Phase C** (write lock, brief): catch up with writes made during
    /// Phase B and swap.
    pub fn compact(&self) -> Result<usize> {
        // Phase A: snapshot under read lock
        let (config, quantizer, epoch, records) = {
            let data = self.data.read();
            let records: Vec<(u32, VectorRecord)> = data
                .store
                .live_slots()
                .map(|slot| (slot, data.store.record(slot)))
                .collect();
            (
                data.config.clone(),
                data.quantizer.clone(),
                data.quantizer_epoch,
                records,
            )
        };
        let snapshot: HashMap<String, u32> = records
            .iter()
            .map(|(slot, r)| (r.id.clone(), *slot))
            .collect();

        // Phase B: rebuild without any lock
        let mut rebuilt = IndexData::new(config)?;
        rebuilt.quantizer = quantizer;
        rebuilt.quantizer_epoch = epoch;
        for (_, record) in records {
            rebuilt.insert_prepared(record.id, record.values, record.metadata, None)?;
        }

        // Phase C: catch up and swap under write lock
        let mut data = self.data.write();
        if data.config.dimensions != rebuilt.config.dimensions {
            return Err(IndexError::InvalidConfig(
                "index was replaced during compaction".into(),
            ));
        }
        if data.quantizer_epoch != rebuilt.quantizer_epoch {
            rebuilt.quantizer = data.quantizer.clone();
            rebuilt.quantizer_epoch = data.quantizer_epoch;
            rebuilt.codes = match rebuilt.trained_quantizer() {
                Some(q) => encode_all(q, rebuilt.store.arena(), rebuilt.config.dimensions)?,
                None => Vec::new(),
            };
        }
        for (id, &slot) in &snapshot {
            if data.store.slot_of(id) != Some(slot) {
                // Deleted or replaced during Phase B; replacements are re-added below
                rebuilt.remove(id);
            }
        }
        let mut caught_up = 0usize;
        let live_now: Vec<u32> = data.store.live_slots().collect();
        for slot in live_now {
            if snapshot.get(data.store.id(slot)) != Some(&slot) {
                let record = data.store.record(slot);
                rebuilt.insert_prepared(record.id, record.values, record.metadata, None)?;
                caught_up += 1;
            }
        }

        let reclaimed = data
            .graph
            .deleted_count()
            .saturating_sub(rebuilt.graph.deleted_count());
        *data = rebuilt;
        tracing::info!(
            live = data.store.len(),
            reclaimed,
            caught_up,
            "index compacted"
        );
        Ok(reclaimed)
    }

    /// Writes a snapshot of the index to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        persistence::save_index(&self.data.read(), path.as_ref())
    }

    /// Loads a snapshot whose dimensionality must equal `expected_dimensions`.
    pub fn load(path: impl AsRef<Path>, expected_dimensions: usize) -> Result<Self> {
        let data = persistence::load_index(path.as_ref())?;
        check_compatible(&data, expected_dimensions, None)?;
        Ok(Self::from_data(data))
    }

    /// Like [`VectorIndex::load`], additionally requiring `metric`.
    pub fn load_expecting(
        path: impl AsRef<Path>,
        expected_dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<Self> {
        let data = persistence::load_index(path.as_ref())?;
        check_compatible(&data, expected_dimensions, Some(metric))?;
        Ok(Self::from_data(data))
    }

    /// Replaces this index's contents with a snapshot. On any failure the
    /// current contents are left untouched.
    pub fn restore(&self, path: impl AsRef<Path>) -> Result<()> {
        let loaded = persistence::load_index(path.as_ref())?;
        let mut data = self.data.write();
        check_compatible(&loaded, data.config.dimensions, Some(data.config.metric))?;
        *data = loaded;
        Ok(())
    }
}

fn check_compatible(
    data: &IndexData,
    expected_dimensions: usize,
    metric: Option<DistanceMetric>,
) -> Result<()> {
    if data.config.dimensions != expected_dimensions {
        return Err(IndexError::IncompatiblePersistedFormat(format!(
            "snapshot has dimension {}, expected {}",
            data.config.dimensions, expected_dimensions
        )));
    }
    if let Some(m) = metric {
        if data.config.metric != m {
            return Err(IndexError::IncompatiblePersistedFormat(format!(
                "snapshot uses metric {:?}, expected {:?}",
                data.config.metric, m
            )));
        }
    }
    Ok(())
}

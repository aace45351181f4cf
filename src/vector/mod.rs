pub mod index;
mod persist;
mod simd;

pub use index::Metric;
pub use persist::Manifest;

use crate::vector::index::FlatIndex;
use crate::vector::persist::{CollectionLayout, LogRecord};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Single-collection vector record store.
///
/// Owns the record map, the similarity index over it, and the append-only
/// log that makes both durable. Writers (upsert/delete/compact) are
/// serialized behind the write lock; readers (get/search/info) run
/// concurrently under the read lock. The log append happens inside the
/// write path before any in-memory mutation, so an acknowledged write is
/// always on disk and a failed append leaves memory untouched.
#[derive(Clone)]
pub struct VectorStore(Arc<Inner>);

struct Inner {
    layout: Option<CollectionLayout>,
    state: RwLock<CollectionState>,
}

struct CollectionState {
    manifest: Manifest,
    records: HashMap<String, StoredRecord>,
    index: FlatIndex,
    total_records: u64,
    tombstones: u64,
    log_bytes: u64,
}

#[derive(Clone, Debug)]
pub struct StoreSettings {
    pub simd_enabled: bool,
    pub parallel_scan: bool,
    pub parallel_scan_min: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            simd_enabled: true,
            parallel_scan: true,
            parallel_scan_min: 4096,
        }
    }
}

impl StoreSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            simd_enabled: config.simd_enabled,
            parallel_scan: config.parallel_scan,
            parallel_scan_min: config.parallel_scan_min.max(2),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct StoredRecord {
    pub vector: Vec<f32>,
    #[serde(default = "empty_object")]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub doc: String,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub distance: f32,
    pub metadata: serde_json::Value,
    pub doc: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CollectionInfo {
    pub collection: String,
    pub dim: Option<usize>,
    pub metric: Metric,
    pub live_count: usize,
    pub total_records: u64,
    pub tombstones: u64,
    pub log_bytes: u64,
    pub compactions: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("id not found")]
    NotFound,
    #[error("collection metric mismatch: stored {stored}, configured {configured}")]
    MetricMismatch { stored: Metric, configured: Metric },
    #[error("corrupt collection state: {0}")]
    Corrupt(String),
    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),
}

impl VectorStore {
    /// In-memory store, no persistence. Used by tests and by deployments
    /// that explicitly run without a data directory.
    pub fn new(collection: &str, metric: Metric) -> Self {
        Self::with_settings(collection, metric, StoreSettings::default())
    }

    pub fn with_settings(collection: &str, metric: Metric, settings: StoreSettings) -> Self {
        let manifest = Manifest::new(collection, metric);
        Self(Arc::new(Inner {
            layout: None,
            state: RwLock::new(CollectionState::empty(manifest, &settings)),
        }))
    }

    /// Get-or-create the collection under `data_dir` and replay its log.
    ///
    /// The manifest's metric wins over the configured one; a disagreement is
    /// an error rather than a silent reordering of every future query.
    pub fn open(
        data_dir: impl AsRef<Path>,
        collection: &str,
        metric: Metric,
    ) -> Result<Self, StoreError> {
        Self::open_with_settings(data_dir, collection, metric, StoreSettings::default())
    }

    pub fn open_with_settings(
        data_dir: impl AsRef<Path>,
        collection: &str,
        metric: Metric,
        settings: StoreSettings,
    ) -> Result<Self, StoreError> {
        let base = data_dir.as_ref().join("collections");
        std::fs::create_dir_all(&base)?;
        let layout = CollectionLayout::new(&base, collection);
        let manifest = persist::init_collection(&layout, collection, metric)?;
        if manifest.metric != metric {
            return Err(StoreError::MetricMismatch {
                stored: manifest.metric,
                configured: metric,
            });
        }
        let loaded = persist::load_records(&layout, manifest.dim)?;
        let mut state = CollectionState::empty(manifest, &settings);
        for (id, record) in &loaded.records {
            state.index.insert(id.clone(), record.vector.clone());
        }
        state.records = loaded.records;
        state.total_records = loaded.total_records;
        state.tombstones = loaded.tombstones;
        state.log_bytes = loaded.log_bytes;
        tracing::info!(
            collection,
            live = state.records.len(),
            replayed = state.total_records,
            "collection loaded"
        );
        Ok(Self(Arc::new(Inner {
            layout: Some(layout),
            state: RwLock::new(state),
        })))
    }

    /// Insert-or-replace. The first-ever upsert establishes the collection
    /// dimensionality; it is persisted in the manifest before the record so
    /// replay can enforce it.
    pub fn upsert(&self, id: &str, record: StoredRecord) -> Result<(), StoreError> {
        let mut state = self.0.state.write();
        match state.manifest.dim {
            Some(dim) => {
                if record.vector.len() != dim {
                    return Err(StoreError::DimensionMismatch {
                        expected: dim,
                        got: record.vector.len(),
                    });
                }
            }
            None => {
                let mut manifest = state.manifest.clone();
                manifest.dim = Some(record.vector.len());
                if let Some(layout) = &self.0.layout {
                    persist::store_manifest(layout, &manifest)?;
                }
                state.manifest = manifest;
            }
        }
        if let Some(layout) = &self.0.layout {
            let appended = persist::append_record(layout, &LogRecord::upsert(id, &record))?;
            state.log_bytes = state.log_bytes.saturating_add(appended);
        }
        state.total_records = state.total_records.saturating_add(1);
        state.index.insert(id.to_string(), record.vector.clone());
        state.records.insert(id.to_string(), record);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<StoredRecord, StoreError> {
        let state = self.0.state.read();
        state.records.get(id).cloned().ok_or(StoreError::NotFound)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.0.state.write();
        if !state.records.contains_key(id) {
            return Err(StoreError::NotFound);
        }
        if let Some(layout) = &self.0.layout {
            let appended = persist::append_record(layout, &LogRecord::delete(id))?;
            state.log_bytes = state.log_bytes.saturating_add(appended);
        }
        state.total_records = state.total_records.saturating_add(1);
        state.tombstones = state.tombstones.saturating_add(1);
        state.records.remove(id);
        state.index.remove(id);
        Ok(())
    }

    /// Exact k-NN over the live records, ascending distance, ties by id.
    /// An empty collection (dimensionality not yet established) matches
    /// nothing rather than rejecting the query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, StoreError> {
        let state = self.0.state.read();
        let Some(dim) = state.manifest.dim else {
            return Ok(Vec::new());
        };
        if query.len() != dim {
            return Err(StoreError::DimensionMismatch {
                expected: dim,
                got: query.len(),
            });
        }
        let hits = state
            .index
            .search(query, k)
            .into_iter()
            .filter_map(|(id, distance)| {
                state.records.get(&id).map(|record| SearchHit {
                    distance,
                    metadata: record.metadata.clone(),
                    doc: record.doc.clone(),
                    id,
                })
            })
            .collect();
        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.0.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> Option<usize> {
        self.0.state.read().manifest.dim
    }

    pub fn info(&self) -> CollectionInfo {
        let state = self.0.state.read();
        CollectionInfo {
            collection: state.manifest.collection.clone(),
            dim: state.manifest.dim,
            metric: state.manifest.metric,
            live_count: state.records.len(),
            total_records: state.total_records,
            tombstones: state.tombstones,
            log_bytes: state.log_bytes,
            compactions: state.manifest.compactions,
        }
    }

    /// Rewrite the log to live records only. Returns false for in-memory
    /// stores, which have nothing to compact.
    pub fn compact(&self) -> Result<bool, StoreError> {
        let Some(layout) = &self.0.layout else {
            return Ok(false);
        };
        let mut state = self.0.state.write();
        let mut manifest = state.manifest.clone();
        let log_bytes = persist::rewrite_log(layout, &mut manifest, &state.records)?;
        state.manifest = manifest;
        state.total_records = state.records.len() as u64;
        state.tombstones = 0;
        state.log_bytes = log_bytes;
        Ok(true)
    }
}

impl CollectionState {
    fn empty(manifest: Manifest, settings: &StoreSettings) -> Self {
        let index = FlatIndex::new(
            manifest.metric,
            settings.simd_enabled,
            settings.parallel_scan,
            settings.parallel_scan_min,
        );
        Self {
            manifest,
            records: HashMap::new(),
            index,
            total_records: 0,
            tombstones: 0,
            log_bytes: 0,
        }
    }
}

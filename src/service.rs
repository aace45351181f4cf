use crate::config::Config;
use crate::vector::{CollectionInfo, SearchHit, StoreError, StoredRecord, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Request-facing façade over the store: validates shapes and limits,
/// applies defaults, and assembles query responses. Constructed once and
/// handed to the router, so tests can drive an isolated instance per
/// collection without any process-wide state.
#[derive(Clone)]
pub struct QueryService(Arc<ServiceInner>);

struct ServiceInner {
    store: VectorStore,
    limits: RequestLimits,
    started_at: Instant,
}

#[derive(Clone, Debug)]
pub struct RequestLimits {
    pub default_k: usize,
    pub max_k: usize,
    pub max_vector_dim: usize,
    pub max_id_len: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            default_k: 5,
            max_k: 256,
            max_vector_dim: 4096,
            max_id_len: 512,
        }
    }
}

impl RequestLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_k: config.default_k.max(1),
            max_k: config.max_k.max(1),
            max_vector_dim: config.max_vector_dim.max(1),
            max_id_len: config.max_id_len.max(1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpsertRequest {
    pub id: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub doc: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    #[serde(default)]
    pub n_results: Option<usize>,
}

/// Parallel arrays, all ordered by ascending distance.
#[derive(Clone, Debug, Serialize)]
pub struct QueryResponse {
    pub ids: Vec<String>,
    pub distances: Vec<f32>,
    pub metadatas: Vec<serde_json::Value>,
    pub documents: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RecordResponse {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: serde_json::Value,
    pub doc: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

impl QueryService {
    pub fn new(store: VectorStore, limits: RequestLimits) -> Self {
        Self(Arc::new(ServiceInner {
            store,
            limits,
            started_at: Instant::now(),
        }))
    }

    pub fn handle_upsert(&self, req: UpsertRequest) -> Result<(), ServiceError> {
        let limits = &self.0.limits;
        if req.id.is_empty() {
            return Err(ServiceError::Validation("id must not be empty".into()));
        }
        if req.id.len() > limits.max_id_len {
            return Err(ServiceError::Validation(format!(
                "id exceeds {} bytes",
                limits.max_id_len
            )));
        }
        validate_vector(&req.vector, limits.max_vector_dim)?;
        let metadata = match req.metadata {
            Some(meta) => {
                if !meta.is_object() {
                    return Err(ServiceError::Validation(
                        "metadata must be a JSON object".into(),
                    ));
                }
                meta
            }
            None => serde_json::Value::Object(Default::default()),
        };
        self.0.store.upsert(
            &req.id,
            StoredRecord {
                vector: req.vector,
                metadata,
                doc: req.doc.unwrap_or_default(),
            },
        )?;
        Ok(())
    }

    pub fn handle_query(&self, req: QueryRequest) -> Result<QueryResponse, ServiceError> {
        let limits = &self.0.limits;
        validate_vector(&req.vector, limits.max_vector_dim)?;
        let k = req.n_results.unwrap_or(limits.default_k);
        if k == 0 {
            return Err(ServiceError::Validation("n_results must be > 0".into()));
        }
        if k > limits.max_k {
            return Err(ServiceError::Validation(format!(
                "n_results exceeds {}",
                limits.max_k
            )));
        }
        let hits = self.0.store.search(&req.vector, k)?;
        Ok(assemble_response(hits))
    }

    pub fn get(&self, id: &str) -> Result<RecordResponse, ServiceError> {
        let record = self.0.store.get(id)?;
        Ok(RecordResponse {
            id: id.to_string(),
            vector: record.vector,
            metadata: record.metadata,
            doc: record.doc,
        })
    }

    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.0.store.delete(id)?;
        Ok(())
    }

    pub fn stats(&self) -> CollectionInfo {
        self.0.store.info()
    }

    pub fn compact(&self) -> Result<bool, ServiceError> {
        Ok(self.0.store.compact()?)
    }

    /// Liveness only. Touches neither the index nor the data directory, so
    /// it stays truthful as a probe even when storage is degraded.
    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: self.0.started_at.elapsed().as_secs(),
        }
    }
}

fn validate_vector(vector: &[f32], max_dim: usize) -> Result<(), ServiceError> {
    if vector.is_empty() {
        return Err(ServiceError::Validation("vector must not be empty".into()));
    }
    if vector.len() > max_dim {
        return Err(ServiceError::Validation(format!(
            "vector exceeds {} dimensions",
            max_dim
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(ServiceError::Validation(
            "vector must contain only finite numbers".into(),
        ));
    }
    Ok(())
}

fn assemble_response(hits: Vec<SearchHit>) -> QueryResponse {
    let mut response = QueryResponse {
        ids: Vec::with_capacity(hits.len()),
        distances: Vec::with_capacity(hits.len()),
        metadatas: Vec::with_capacity(hits.len()),
        documents: Vec::with_capacity(hits.len()),
    };
    for hit in hits {
        response.ids.push(hit.id);
        response.distances.push(hit.distance);
        response.metadatas.push(hit.metadata);
        response.documents.push(hit.doc);
    }
    response
}

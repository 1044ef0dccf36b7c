use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::SearchError;

/// Score carried by chunks that were only pulled in by document expansion.
pub const UNRANKED_SCORE: f64 = 0.0;

pub const DEFAULT_RESULT_LIMIT: usize = 30;

/// Qdrant point identifier: either an unsigned integer or a UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(uuid::Uuid),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(id) => write!(f, "{id}"),
            Self::Uuid(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

/// A point returned by a ranked query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f64,
    pub payload: Map<String, Value>,
}

/// A point returned by a filtered scroll, which carries no score.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub id: PointId,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub doc_id: String,
    pub chunk_index: u32,
    pub total_chunks: Option<u32>,
    pub text: String,
    pub score: f64,
    pub metadata: Map<String, Value>,
}

#[derive(Deserialize)]
struct ChunkPayload {
    doc_id: String,
    chunk_index: u32,
    #[serde(default)]
    total_chunks: Option<u32>,
    #[serde(default, alias = "text")]
    chunk_text: String,
    #[serde(flatten)]
    metadata: Map<String, Value>,
}

impl Chunk {
    /// Builds a chunk from a stored payload. `doc_id` and `chunk_index` are
    /// required; every other unknown key lands in `metadata`.
    pub fn from_payload(
        id: &PointId,
        score: f64,
        payload: Map<String, Value>,
    ) -> Result<Self, SearchError> {
        let parsed: ChunkPayload = serde_json::from_value(Value::Object(payload))?;
        Ok(Self {
            id: id.to_string(),
            doc_id: parsed.doc_id,
            chunk_index: parsed.chunk_index,
            total_chunks: parsed.total_chunks,
            text: parsed.chunk_text,
            score,
            metadata: parsed.metadata,
        })
    }

    pub fn is_ranked(&self) -> bool {
        self.score != UNRANKED_SCORE
    }
}

impl TryFrom<ScoredPoint> for Chunk {
    type Error = SearchError;

    fn try_from(point: ScoredPoint) -> Result<Self, Self::Error> {
        Self::from_payload(&point.id, point.score, point.payload)
    }
}

/// A document rebuilt from its chunks for one response. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub doc_id: String,
    pub chunks: Vec<Chunk>,
    pub full_text: String,
    pub score: f64,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub corpus: Option<String>,
    #[serde(default)]
    pub compare_mode: bool,
}

fn default_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_RESULT_LIMIT,
            corpus: None,
            compare_mode: false,
        }
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.query.trim().is_empty() {
            return Err(SearchError::InvalidRequest(
                "query is required and must be a non-empty string".to_string(),
            ));
        }
        if self.limit == 0 {
            return Err(SearchError::InvalidRequest(
                "limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineResult {
    pub corpus: String,
    pub collection: String,
    pub documents: Vec<Document>,
    pub elapsed_ms: u64,
    pub ranked_chunks: usize,
    pub expanded_documents: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineFailure {
    pub corpus: String,
    pub kind: String,
    pub message: String,
    /// Time spent on this side before it failed.
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl PipelineFailure {
    pub fn from_error(
        corpus: &str,
        error: &SearchError,
        elapsed_ms: u64,
        expose_details: bool,
    ) -> Self {
        Self {
            corpus: corpus.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
            elapsed_ms,
            details: expose_details.then(|| format!("{error:?}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    Succeeded(PipelineResult),
    Failed(PipelineFailure),
}

impl PipelineOutcome {
    pub fn result(&self) -> Option<&PipelineResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonResult {
    pub primary: PipelineOutcome,
    pub alternate: PipelineOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SearchResponse {
    Single(PipelineResult),
    Comparison(ComparisonResult),
}

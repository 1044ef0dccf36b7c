//! In-memory fakes for the store and embedding seams.

use crate::models::{PointId, ScoredPoint, SparseVector, StoredPoint};
use crate::traits::{
    CollectionInfo, DenseEmbedder, FusedQuery, QueryVector, ScrollPage, ScrollRequest,
    SparseEmbedder, VectorQuery, VectorStore,
};
use crate::SearchError;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

pub fn payload(doc_id: &str, chunk_index: u32, text: &str) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("doc_id".to_string(), json!(doc_id));
    payload.insert("chunk_index".to_string(), json!(chunk_index));
    payload.insert("chunk_text".to_string(), json!(text));
    payload
}

pub fn ranked(id: u64, doc_id: &str, chunk_index: u32, score: f64) -> ScoredPoint {
    ScoredPoint {
        id: PointId::Num(id),
        score,
        payload: payload(doc_id, chunk_index, &format!("text-{id}")),
    }
}

pub fn stored(id: u64, doc_id: &str, chunk_index: u32) -> StoredPoint {
    StoredPoint {
        id: PointId::Num(id),
        payload: payload(doc_id, chunk_index, &format!("text-{id}")),
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub collections: Vec<String>,
    pub fused: HashMap<String, Vec<ScoredPoint>>,
    pub dense_hits: Vec<ScoredPoint>,
    pub sparse_hits: Vec<ScoredPoint>,
    pub points: HashMap<String, Vec<StoredPoint>>,
    pub fail_scroll: bool,
    /// Every scroll page points back at the first one.
    pub stalled_scroll: bool,
    pub list_calls: AtomicUsize,
    pub fused_calls: AtomicUsize,
    pub vector_calls: AtomicUsize,
    pub scroll_calls: AtomicUsize,
}

impl FakeStore {
    pub fn with_collection(
        collection: &str,
        fused: Vec<ScoredPoint>,
        points: Vec<StoredPoint>,
    ) -> Self {
        let mut store = Self::default();
        store.add_collection(collection, fused, points);
        store
    }

    pub fn add_collection(
        &mut self,
        collection: &str,
        fused: Vec<ScoredPoint>,
        points: Vec<StoredPoint>,
    ) {
        self.collections.push(collection.to_string());
        self.fused.insert(collection.to_string(), fused);
        self.points.insert(collection.to_string(), points);
    }

    pub fn total_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
            + self.fused_calls.load(Ordering::SeqCst)
            + self.vector_calls.load(Ordering::SeqCst)
            + self.scroll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorStore for FakeStore {
    async fn list_collections(&self) -> Result<Vec<String>, SearchError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.collections.clone())
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, SearchError> {
        Ok(CollectionInfo {
            name: collection.to_string(),
            indexed_fields: vec!["doc_id".to_string()],
        })
    }

    async fn fused_query(
        &self,
        collection: &str,
        query: &FusedQuery,
    ) -> Result<Vec<ScoredPoint>, SearchError> {
        self.fused_calls.fetch_add(1, Ordering::SeqCst);
        let mut hits = self.fused.get(collection).cloned().unwrap_or_default();
        hits.truncate(query.ranked_width);
        Ok(hits)
    }

    async fn vector_query(
        &self,
        _collection: &str,
        query: &VectorQuery,
    ) -> Result<Vec<ScoredPoint>, SearchError> {
        self.vector_calls.fetch_add(1, Ordering::SeqCst);
        let mut hits = match query.vector {
            QueryVector::Dense(_) => self.dense_hits.clone(),
            QueryVector::Sparse(_) => self.sparse_hits.clone(),
        };
        hits.truncate(query.limit);
        Ok(hits)
    }

    /// Pages by position; the offset is the index of the next matching point.
    async fn filtered_scroll(
        &self,
        collection: &str,
        request: &ScrollRequest,
    ) -> Result<ScrollPage, SearchError> {
        self.scroll_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_scroll {
            return Err(SearchError::BackendResponse {
                backend: "qdrant".to_string(),
                details: "400 Bad Request: Index required".to_string(),
            });
        }

        let matching = self
            .points
            .get(collection)
            .map(|points| {
                points
                    .iter()
                    .filter(|point| {
                        point
                            .payload
                            .get(&request.field)
                            .and_then(Value::as_str)
                            .is_some_and(|value| request.any_of.iter().any(|id| id == value))
                    })
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let start = match request.offset {
            Some(PointId::Num(offset)) => offset as usize,
            _ => 0,
        };
        let end = (start + request.limit).min(matching.len());
        let next_offset = if self.stalled_scroll {
            Some(PointId::Num(0))
        } else {
            (end < matching.len()).then(|| PointId::Num(end as u64))
        };

        Ok(ScrollPage {
            points: matching[start.min(end)..end].to_vec(),
            next_offset,
        })
    }
}

/// Blocks until every party sharing the barrier has arrived, so callers that
/// await the parties one after another never finish.
async fn rendezvous(barrier: &Option<Arc<Barrier>>) {
    if let Some(barrier) = barrier {
        barrier.wait().await;
    }
}

#[derive(Default)]
pub struct FakeDenseEmbedder {
    pub failing_dimension: Option<usize>,
    pub delay: Option<Duration>,
    pub rendezvous: Option<Arc<Barrier>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl DenseEmbedder for FakeDenseEmbedder {
    fn provider(&self) -> &str {
        "fake-dense"
    }

    async fn embed_dense(&self, _text: &str, dimension: usize) -> Result<Vec<f32>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        rendezvous(&self.rendezvous).await;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_dimension == Some(dimension) {
            return Err(SearchError::EmbeddingProvider {
                provider: self.provider().to_string(),
                status: None,
                details: "operation timed out".to_string(),
            });
        }
        Ok(vec![0.1; dimension])
    }
}

#[derive(Default)]
pub struct FakeSparseEmbedder {
    pub rendezvous: Option<Arc<Barrier>>,
    pub calls: AtomicUsize,
}

#[async_trait]
impl SparseEmbedder for FakeSparseEmbedder {
    fn provider(&self) -> &str {
        "fake-sparse"
    }

    async fn embed_sparse(&self, _text: &str) -> Result<SparseVector, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        rendezvous(&self.rendezvous).await;
        Ok(SparseVector {
            indices: vec![7, 42],
            values: vec![1.0, 0.5],
        })
    }
}

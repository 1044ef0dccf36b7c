use crate::models::{PointId, ScoredPoint, SparseVector, StoredPoint};
use crate::SearchError;
use async_trait::async_trait;

pub const DENSE_VECTOR_NAME: &str = "dense";
pub const SPARSE_VECTOR_NAME: &str = "sparse";

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
    pub indexed_fields: Vec<String>,
}

impl CollectionInfo {
    pub fn has_index_on(&self, field: &str) -> bool {
        self.indexed_fields.iter().any(|indexed| indexed == field)
    }
}

/// Dense and sparse prefetches combined by the store with reciprocal rank fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedQuery {
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub prefetch_width: usize,
    pub ranked_width: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryVector {
    Dense(Vec<f32>),
    Sparse(SparseVector),
}

impl QueryVector {
    pub fn vector_name(&self) -> &'static str {
        match self {
            Self::Dense(_) => DENSE_VECTOR_NAME,
            Self::Sparse(_) => SPARSE_VECTOR_NAME,
        }
    }
}

/// Similarity search on a single named vector.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    pub vector: QueryVector,
    pub limit: usize,
}

/// Unordered listing of every point whose `field` matches one of `any_of`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollRequest {
    pub field: String,
    pub any_of: Vec<String>,
    pub limit: usize,
    pub offset: Option<PointId>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScrollPage {
    pub points: Vec<StoredPoint>,
    pub next_offset: Option<PointId>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>, SearchError>;

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, SearchError>;

    async fn fused_query(
        &self,
        collection: &str,
        query: &FusedQuery,
    ) -> Result<Vec<ScoredPoint>, SearchError>;

    async fn vector_query(
        &self,
        collection: &str,
        query: &VectorQuery,
    ) -> Result<Vec<ScoredPoint>, SearchError>;

    async fn filtered_scroll(
        &self,
        collection: &str,
        request: &ScrollRequest,
    ) -> Result<ScrollPage, SearchError>;
}

#[async_trait]
pub trait DenseEmbedder: Send + Sync {
    fn provider(&self) -> &str;

    /// Returns exactly `dimension` values or fails.
    async fn embed_dense(&self, text: &str, dimension: usize) -> Result<Vec<f32>, SearchError>;
}

#[async_trait]
pub trait SparseEmbedder: Send + Sync {
    fn provider(&self) -> &str;

    async fn embed_sparse(&self, text: &str) -> Result<SparseVector, SearchError>;
}

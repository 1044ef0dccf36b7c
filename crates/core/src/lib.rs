pub mod config;
pub mod embeddings;
pub mod error;
pub mod expander;
pub mod fusion;
pub mod models;
pub mod orchestrator;
pub mod reassembler;
pub mod retriever;
pub mod stores;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{CorpusCatalog, CorpusConfig, DenseDimension, PipelineSettings};
pub use embeddings::{Bm25ServiceEmbedder, VoyageEmbedder};
pub use error::SearchError;
pub use expander::{DocumentExpander, Expansion};
pub use fusion::{reciprocal_rank_fusion, RankingStrategy, DEFAULT_RRF_K};
pub use models::{
    Chunk, ComparisonResult, Document, PipelineFailure, PipelineOutcome, PipelineResult,
    SearchRequest, SearchResponse, SparseVector,
};
pub use orchestrator::SearchCoordinator;
pub use reassembler::reassemble;
pub use retriever::HybridRetriever;
pub use stores::{IndexAction, QdrantStore};
pub use traits::{CollectionInfo, DenseEmbedder, SparseEmbedder, VectorStore};

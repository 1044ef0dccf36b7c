use crate::config::{CorpusConfig, PipelineSettings};
use crate::fusion::{reciprocal_rank_fusion, RankingStrategy};
use crate::models::{Chunk, ScoredPoint, SparseVector};
use crate::traits::{
    DenseEmbedder, FusedQuery, QueryVector, SparseEmbedder, VectorQuery, VectorStore,
};
use crate::SearchError;
use tracing::{debug, info};

/// Dense + sparse retrieval fused into a single chunk ranking.
pub struct HybridRetriever<'a> {
    store: &'a dyn VectorStore,
    dense: &'a dyn DenseEmbedder,
    sparse: &'a dyn SparseEmbedder,
    ranking: RankingStrategy,
    prefetch_width: usize,
    ranked_width: usize,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(
        store: &'a dyn VectorStore,
        dense: &'a dyn DenseEmbedder,
        sparse: &'a dyn SparseEmbedder,
        settings: &PipelineSettings,
    ) -> Self {
        Self {
            store,
            dense,
            sparse,
            ranking: settings.ranking,
            prefetch_width: settings.prefetch_width,
            ranked_width: settings.ranked_width,
        }
    }

    /// Ranked chunks, best first, each carrying its fusion score.
    pub async fn retrieve(
        &self,
        query: &str,
        corpus: &CorpusConfig,
    ) -> Result<Vec<Chunk>, SearchError> {
        self.ensure_corpus_exists(corpus).await?;

        let dimension = corpus.dimension.size();
        let (dense, sparse) = tokio::try_join!(
            self.dense.embed_dense(query, dimension),
            self.sparse.embed_sparse(query)
        )?;
        debug!(
            collection = %corpus.collection,
            dimension,
            sparse_terms = sparse.indices.len(),
            "query embedded"
        );

        let points = match self.ranking {
            RankingStrategy::Delegated => {
                self.store
                    .fused_query(
                        &corpus.collection,
                        &FusedQuery {
                            dense,
                            sparse,
                            prefetch_width: self.prefetch_width,
                            ranked_width: self.ranked_width,
                        },
                    )
                    .await?
            }
            RankingStrategy::LocalRrf { k } => {
                self.local_fusion(&corpus.collection, dense, sparse, k)
                    .await?
            }
        };

        let chunks = points
            .into_iter()
            .map(Chunk::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            collection = %corpus.collection,
            ranked_chunks = chunks.len(),
            "hybrid retrieval finished"
        );
        Ok(chunks)
    }

    async fn ensure_corpus_exists(&self, corpus: &CorpusConfig) -> Result<(), SearchError> {
        let collections = self.store.list_collections().await?;
        if collections.iter().any(|name| name == &corpus.collection) {
            Ok(())
        } else {
            Err(SearchError::CorpusNotFound {
                corpus: corpus.collection.clone(),
            })
        }
    }

    async fn local_fusion(
        &self,
        collection: &str,
        dense: Vec<f32>,
        sparse: SparseVector,
        k: u32,
    ) -> Result<Vec<ScoredPoint>, SearchError> {
        let dense_query = VectorQuery {
            vector: QueryVector::Dense(dense),
            limit: self.prefetch_width,
        };
        let sparse_query = VectorQuery {
            vector: QueryVector::Sparse(sparse),
            limit: self.prefetch_width,
        };

        let (dense_hits, sparse_hits) = tokio::try_join!(
            self.store.vector_query(collection, &dense_query),
            self.store.vector_query(collection, &sparse_query)
        )?;

        Ok(reciprocal_rank_fusion(
            &[dense_hits, sparse_hits],
            k,
            self.ranked_width,
        ))
    }
}

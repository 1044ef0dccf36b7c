use crate::config::{CorpusCatalog, CorpusConfig, PipelineSettings};
use crate::expander::DocumentExpander;
use crate::models::{
    ComparisonResult, PipelineFailure, PipelineOutcome, PipelineResult, SearchRequest,
    SearchResponse,
};
use crate::reassembler::reassemble;
use crate::retriever::HybridRetriever;
use crate::traits::{DenseEmbedder, SparseEmbedder, VectorStore};
use crate::SearchError;
use std::time::Instant;
use tracing::{info, warn};

/// Runs retrieval, expansion and reassembly for one or both corpus
/// configurations. Holds injected clients only; every request starts fresh.
pub struct SearchCoordinator<V, D, S>
where
    V: VectorStore,
    D: DenseEmbedder,
    S: SparseEmbedder,
{
    store: V,
    dense: D,
    sparse: S,
    catalog: CorpusCatalog,
    settings: PipelineSettings,
}

impl<V, D, S> SearchCoordinator<V, D, S>
where
    V: VectorStore,
    D: DenseEmbedder,
    S: SparseEmbedder,
{
    pub fn new(store: V, dense: D, sparse: S) -> Self {
        Self {
            store,
            dense,
            sparse,
            catalog: CorpusCatalog::default(),
            settings: PipelineSettings::default(),
        }
    }

    pub fn with_catalog(mut self, catalog: CorpusCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &V {
        &self.store
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        request.validate()?;

        info!(
            compare_mode = request.compare_mode,
            limit = request.limit,
            "hybrid search requested"
        );

        if request.compare_mode {
            return Ok(SearchResponse::Comparison(
                self.compare(&request.query, request.limit).await,
            ));
        }

        let corpus = self.catalog.resolve(request.corpus.as_deref());
        let result = self.run_pipeline(&request.query, request.limit, &corpus).await?;
        Ok(SearchResponse::Single(result))
    }

    /// Runs primary and alternate concurrently. A failure on one side is
    /// reported in its outcome and never hides the other side's result.
    pub async fn compare(&self, query: &str, limit: usize) -> ComparisonResult {
        let (primary, alternate) = tokio::join!(
            self.run_outcome(query, limit, &self.catalog.primary),
            self.run_outcome(query, limit, &self.catalog.alternate)
        );
        ComparisonResult { primary, alternate }
    }

    async fn run_outcome(
        &self,
        query: &str,
        limit: usize,
        corpus: &CorpusConfig,
    ) -> PipelineOutcome {
        let started = Instant::now();
        match self.run_pipeline(query, limit, corpus).await {
            Ok(result) => PipelineOutcome::Succeeded(result),
            Err(error) => {
                let elapsed_ms = elapsed_millis(started);
                warn!(
                    corpus = %corpus.label,
                    kind = error.kind(),
                    elapsed_ms,
                    %error,
                    "pipeline failed"
                );
                PipelineOutcome::Failed(PipelineFailure::from_error(
                    &corpus.label,
                    &error,
                    elapsed_ms,
                    self.settings.expose_error_details,
                ))
            }
        }
    }

    pub async fn run_pipeline(
        &self,
        query: &str,
        limit: usize,
        corpus: &CorpusConfig,
    ) -> Result<PipelineResult, SearchError> {
        let started = Instant::now();

        let retriever =
            HybridRetriever::new(&self.store, &self.dense, &self.sparse, &self.settings);
        let ranked = retriever.retrieve(query, corpus).await?;

        let expander = DocumentExpander::new(&self.store, &self.settings);
        let expansion = expander.expand(&corpus.collection, &ranked).await?;

        let mut documents = reassemble(expansion.chunks);
        documents.truncate(limit);

        let elapsed_ms = elapsed_millis(started);
        info!(
            corpus = %corpus.label,
            collection = %corpus.collection,
            dimension = %corpus.dimension,
            ranked_chunks = ranked.len(),
            documents = documents.len(),
            elapsed_ms,
            "pipeline finished"
        );

        Ok(PipelineResult {
            corpus: corpus.label.clone(),
            collection: corpus.collection.clone(),
            documents,
            elapsed_ms,
            ranked_chunks: ranked.len(),
            expanded_documents: expansion.doc_ids.len(),
        })
    }
}

fn elapsed_millis(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

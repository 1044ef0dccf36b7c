use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("corpus '{corpus}' not found; run the ingestion/migration step first")]
    CorpusNotFound { corpus: String },

    #[error("embedding provider {provider} failed{}: {details}", status_suffix(.status))]
    EmbeddingProvider {
        provider: String,
        status: Option<u16>,
        details: String,
    },

    #[error("document expansion failed: {0}")]
    Expansion(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SearchError {
    pub(crate) fn embedding(
        provider: &str,
        status: Option<u16>,
        details: impl Into<String>,
    ) -> Self {
        Self::EmbeddingProvider {
            provider: provider.to_string(),
            status,
            details: details.into(),
        }
    }

    pub(crate) fn backend(backend: &str, details: impl Into<String>) -> Self {
        Self::BackendResponse {
            backend: backend.to_string(),
            details: details.into(),
        }
    }

    /// Stable tag used when an error is reported as data instead of returned.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CorpusNotFound { .. } => "corpus_not_found",
            Self::EmbeddingProvider { .. } => "embedding_provider",
            Self::Expansion(_) => "expansion",
            Self::InvalidRequest(_) => "invalid_request",
            Self::BackendResponse { .. } => "backend_response",
            Self::Http(_) => "http",
            Self::Url(_) => "url",
            Self::Serialization(_) => "serialization",
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" with status {code}"))
        .unwrap_or_default()
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

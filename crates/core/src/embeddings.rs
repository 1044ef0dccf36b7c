use crate::models::SparseVector;
use crate::traits::{DenseEmbedder, SparseEmbedder};
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_VOYAGE_ENDPOINT: &str = "https://api.voyageai.com";
pub const DEFAULT_VOYAGE_MODEL: &str = "voyage-3.5-lite";
pub const DEFAULT_EMBEDDING_SERVICE_ENDPOINT: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

fn http_client(timeout: Duration) -> Result<Client, SearchError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

fn normalize_endpoint(endpoint: &str) -> Result<String, SearchError> {
    let parsed = Url::parse(endpoint)?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Dense query embeddings from the Voyage AI embeddings API.
pub struct VoyageEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl VoyageEmbedder {
    pub fn new(
        endpoint: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: normalize_endpoint(endpoint)?,
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[derive(Deserialize)]
struct VoyageResponse {
    #[serde(default)]
    data: Vec<VoyageEmbedding>,
}

#[derive(Deserialize)]
struct VoyageEmbedding {
    embedding: Vec<f32>,
}

fn first_dense(
    provider: &str,
    response: VoyageResponse,
    dimension: usize,
) -> Result<Vec<f32>, SearchError> {
    let embedding = response
        .data
        .into_iter()
        .next()
        .map(|item| item.embedding)
        .ok_or_else(|| SearchError::embedding(provider, None, "response carried no embedding"))?;

    if embedding.len() != dimension {
        return Err(SearchError::embedding(
            provider,
            None,
            format!(
                "expected {dimension} dimensions, received {}",
                embedding.len()
            ),
        ));
    }

    Ok(embedding)
}

#[async_trait]
impl DenseEmbedder for VoyageEmbedder {
    fn provider(&self) -> &str {
        "voyage"
    }

    async fn embed_dense(&self, text: &str, dimension: usize) -> Result<Vec<f32>, SearchError> {
        let provider = self.provider();
        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "input": [text],
                "model": self.model,
                "output_dimension": dimension,
                "input_type": "query",
            }))
            .send()
            .await
            .map_err(|error| SearchError::embedding(provider, None, error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::embedding(
                provider,
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("request failed"),
            ));
        }

        let parsed: VoyageResponse = response
            .json()
            .await
            .map_err(|error| SearchError::embedding(provider, None, error.to_string()))?;

        let embedding = first_dense(provider, parsed, dimension)?;
        debug!(provider, dimension, "dense embedding ready");
        Ok(embedding)
    }
}

/// Sparse BM25 query embeddings from the embedding microservice.
pub struct Bm25ServiceEmbedder {
    client: Client,
    endpoint: String,
}

impl Bm25ServiceEmbedder {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: normalize_endpoint(endpoint)?,
        })
    }

    /// True when the service answers its health probe within five seconds.
    pub async fn health(&self) -> bool {
        self.client
            .get(format!("{}/health", self.endpoint))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }
}

#[derive(Deserialize)]
struct Bm25Response {
    #[serde(default)]
    embeddings: Vec<SparseVector>,
}

fn first_sparse(provider: &str, response: Bm25Response) -> Result<SparseVector, SearchError> {
    let sparse = response
        .embeddings
        .into_iter()
        .next()
        .ok_or_else(|| SearchError::embedding(provider, None, "response carried no embedding"))?;

    if sparse.indices.len() != sparse.values.len() {
        return Err(SearchError::embedding(
            provider,
            None,
            format!(
                "sparse vector has {} indices but {} values",
                sparse.indices.len(),
                sparse.values.len()
            ),
        ));
    }

    Ok(sparse)
}

#[async_trait]
impl SparseEmbedder for Bm25ServiceEmbedder {
    fn provider(&self) -> &str {
        "bm25"
    }

    async fn embed_sparse(&self, text: &str) -> Result<SparseVector, SearchError> {
        let provider = self.provider();
        let response = self
            .client
            .post(format!("{}/embed/bm25", self.endpoint))
            .json(&json!({
                "texts": [text],
                "model": "bm25",
            }))
            .send()
            .await
            .map_err(|error| SearchError::embedding(provider, None, error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::embedding(
                provider,
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("request failed"),
            ));
        }

        let parsed: Bm25Response = response
            .json()
            .await
            .map_err(|error| SearchError::embedding(provider, None, error.to_string()))?;

        let sparse = first_sparse(provider, parsed)?;
        debug!(provider, terms = sparse.indices.len(), "sparse embedding ready");
        Ok(sparse)
    }
}

use crate::models::{PointId, ScoredPoint, StoredPoint};
use crate::traits::{
    CollectionInfo, FusedQuery, QueryVector, ScrollRequest, ScrollPage, VectorQuery, VectorStore,
    DENSE_VECTOR_NAME, SPARSE_VECTOR_NAME,
};
use crate::SearchError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

const BACKEND: &str = "qdrant";

pub struct QdrantStore {
    endpoint: String,
    api_key: Option<String>,
    client: Client,
}

/// Result of [`QdrantStore::ensure_keyword_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexAction {
    NoActionNeeded,
    Created,
}

impl QdrantStore {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let endpoint = Url::parse(endpoint)?
            .as_str()
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            endpoint,
            api_key: api_key.filter(|key| !key.is_empty()),
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, SearchError> {
        let response = self.authorize(request).send().await?;
        Self::read_json(response).await
    }

    async fn read_json(response: Response) -> Result<Value, SearchError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::backend(
                BACKEND,
                format!("{status}: {}", body.trim()),
            ));
        }
        Ok(response.json().await?)
    }

    fn collection_url(&self, collection: &str, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.endpoint, collection, suffix)
    }

    /// Creates a keyword payload index on `field` unless one already exists.
    /// Filtered scrolls on an unindexed field are rejected by Qdrant Cloud.
    pub async fn ensure_keyword_index(
        &self,
        collection: &str,
        field: &str,
    ) -> Result<IndexAction, SearchError> {
        let collections = self.list_collections().await?;
        if !collections.iter().any(|name| name == collection) {
            return Err(SearchError::CorpusNotFound {
                corpus: collection.to_string(),
            });
        }

        if self.collection_info(collection).await?.has_index_on(field) {
            return Ok(IndexAction::NoActionNeeded);
        }

        self.send(
            self.client
                .put(self.collection_url(collection, "/index?wait=true"))
                .json(&json!({
                    "field_name": field,
                    "field_schema": {
                        "type": "keyword",
                        "is_tenant": false,
                        "on_disk": false,
                    },
                })),
        )
        .await?;

        Ok(IndexAction::Created)
    }
}

fn fused_query_body(query: &FusedQuery) -> Value {
    json!({
        "prefetch": [
            {
                "query": query.dense,
                "using": DENSE_VECTOR_NAME,
                "limit": query.prefetch_width,
            },
            {
                "query": { "indices": query.sparse.indices, "values": query.sparse.values },
                "using": SPARSE_VECTOR_NAME,
                "limit": query.prefetch_width,
            },
        ],
        "query": { "fusion": "rrf" },
        "limit": query.ranked_width,
        "with_payload": true,
    })
}

fn vector_query_body(query: &VectorQuery) -> Value {
    let vector = match &query.vector {
        QueryVector::Dense(values) => json!(values),
        QueryVector::Sparse(sparse) => json!({
            "indices": sparse.indices,
            "values": sparse.values,
        }),
    };
    json!({
        "query": vector,
        "using": query.vector.vector_name(),
        "limit": query.limit,
        "with_payload": true,
    })
}

fn scroll_body(request: &ScrollRequest) -> Value {
    let mut body = json!({
        "filter": {
            "must": [
                { "key": request.field, "match": { "any": request.any_of } }
            ]
        },
        "limit": request.limit,
        "with_payload": true,
        "with_vector": false,
    });
    if let Some(offset) = &request.offset {
        body["offset"] = json!(offset);
    }
    body
}

fn parse_point_id(raw: &Value) -> Result<PointId, SearchError> {
    let id = raw
        .pointer("/id")
        .cloned()
        .ok_or_else(|| SearchError::backend(BACKEND, "point without id"))?;
    Ok(serde_json::from_value(id)?)
}

fn parse_payload(raw: &Value) -> Map<String, Value> {
    raw.pointer("/payload")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// A 200 reply without `result.points` is a store failure, not an empty match.
fn result_points(parsed: &Value) -> Result<&[Value], SearchError> {
    parsed
        .pointer("/result/points")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| SearchError::backend(BACKEND, "response without result.points"))
}

fn parse_scored_points(parsed: &Value) -> Result<Vec<ScoredPoint>, SearchError> {
    result_points(parsed)?
        .iter()
        .map(|raw| {
            let score = raw
                .pointer("/score")
                .and_then(Value::as_f64)
                .ok_or_else(|| SearchError::backend(BACKEND, "query point without score"))?;
            Ok(ScoredPoint {
                id: parse_point_id(raw)?,
                score,
                payload: parse_payload(raw),
            })
        })
        .collect()
}

fn parse_collection_names(parsed: &Value) -> Result<Vec<String>, SearchError> {
    let collections = parsed
        .pointer("/result/collections")
        .and_then(Value::as_array)
        .ok_or_else(|| SearchError::backend(BACKEND, "response without result.collections"))?;

    collections
        .iter()
        .map(|item| {
            item.pointer("/name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| SearchError::backend(BACKEND, "collection without name"))
        })
        .collect()
}

fn parse_scroll_page(parsed: &Value) -> Result<ScrollPage, SearchError> {
    let points = result_points(parsed)?
        .iter()
        .map(|raw| {
            Ok(StoredPoint {
                id: parse_point_id(raw)?,
                payload: parse_payload(raw),
            })
        })
        .collect::<Result<Vec<_>, SearchError>>()?;

    let next_offset = match parsed.pointer("/result/next_page_offset") {
        None | Some(Value::Null) => None,
        Some(offset) => Some(serde_json::from_value(offset.clone())?),
    };

    Ok(ScrollPage {
        points,
        next_offset,
    })
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn list_collections(&self) -> Result<Vec<String>, SearchError> {
        let parsed = self
            .send(self.client.get(format!("{}/collections", self.endpoint)))
            .await?;

        parse_collection_names(&parsed)
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo, SearchError> {
        let parsed = self
            .send(self.client.get(self.collection_url(collection, "")))
            .await?;

        let indexed_fields = parsed
            .pointer("/result/payload_schema")
            .and_then(Value::as_object)
            .map(|schema| schema.keys().cloned().collect())
            .unwrap_or_default();

        Ok(CollectionInfo {
            name: collection.to_string(),
            indexed_fields,
        })
    }

    async fn fused_query(
        &self,
        collection: &str,
        query: &FusedQuery,
    ) -> Result<Vec<ScoredPoint>, SearchError> {
        let parsed = self
            .send(
                self.client
                    .post(self.collection_url(collection, "/points/query"))
                    .json(&fused_query_body(query)),
            )
            .await?;

        let points = parse_scored_points(&parsed)?;
        debug!(collection, hits = points.len(), "qdrant fused query");
        Ok(points)
    }

    async fn vector_query(
        &self,
        collection: &str,
        query: &VectorQuery,
    ) -> Result<Vec<ScoredPoint>, SearchError> {
        let parsed = self
            .send(
                self.client
                    .post(self.collection_url(collection, "/points/query"))
                    .json(&vector_query_body(query)),
            )
            .await?;

        let points = parse_scored_points(&parsed)?;
        debug!(
            collection,
            using = query.vector.vector_name(),
            hits = points.len(),
            "qdrant vector query"
        );
        Ok(points)
    }

    async fn filtered_scroll(
        &self,
        collection: &str,
        request: &ScrollRequest,
    ) -> Result<ScrollPage, SearchError> {
        let parsed = self
            .send(
                self.client
                    .post(self.collection_url(collection, "/points/scroll"))
                    .json(&scroll_body(request)),
            )
            .await?;

        parse_scroll_page(&parsed)
    }
}

//! HTTP client wrapper for interacting with Qdrant.

use crate::config::Config;
use crate::index::{ChunkHit, ChunkRecord, IndexError, VectorIndex};
use crate::qdrant::{
    payload::{build_payload, current_timestamp_rfc3339, generate_point_id, hit_from_payload},
    types::{CountResponse, QdrantError, QueryResponse, QueryResponseResult},
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;

/// Lightweight HTTP client for the Qdrant collection holding document chunks.
pub struct QdrantService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    pub(crate) vector_size: u64,
}

impl QdrantService {
    /// Construct a new client using the supplied configuration.
    pub fn new(config: &Config) -> Result<Self, QdrantError> {
        let client = Client::builder()
            .user_agent("rusty-rag/0.1")
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        let base_url = normalize_base_url(&config.qdrant_url).map_err(QdrantError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %config.qdrant_collection_name,
            has_api_key = %config
                .qdrant_api_key
                .as_deref()
                .map(|value| !value.is_empty())
                .unwrap_or(false),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.qdrant_api_key.clone(),
            collection: config.qdrant_collection_name.clone(),
            vector_size: config.embedding_dimension as u64,
        })
    }

    /// Name of the collection this client writes to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection only when it is missing from Qdrant.
    pub async fn create_collection_if_not_exists(&self) -> Result<(), QdrantError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        tracing::debug!(
            collection = %self.collection,
            vector_size = self.vector_size,
            "Creating collection"
        );
        self.create_collection().await
    }

    /// Create or update the collection with the configured vector size.
    pub async fn create_collection(&self) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": self.vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))?
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, "Collection ensured/created");
        })
        .await
    }

    /// Ensure payload indexes exist for the fields used when inspecting documents.
    pub async fn ensure_payload_indexes(&self) -> Result<(), QdrantError> {
        let fields: [(&str, &str); 3] = [
            ("document_id", "keyword"),
            ("filename", "keyword"),
            ("chunk_hash", "keyword"),
        ];

        for (field, schema) in fields {
            let body = json!({
                "field_name": field,
                "field_schema": schema,
            });

            let response = self
                .request(Method::PUT, &format!("collections/{}/index", self.collection))?
                .json(&body)
                .send()
                .await?;

            if response.status().is_success() {
                tracing::debug!(collection = %self.collection, field, schema, "Payload index ensured");
            } else if response.status() == StatusCode::CONFLICT {
                tracing::debug!(collection = %self.collection, field, schema, "Payload index already exists");
            } else {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::warn!(collection = %self.collection, field, schema, error = %error, "Failed to ensure payload index");
            }
        }

        Ok(())
    }

    /// Upload vectors to the collection, waiting for Qdrant to apply them.
    pub async fn index_points(&self, records: Vec<ChunkRecord>) -> Result<usize, QdrantError> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = current_timestamp_rfc3339();
        let serialized: Vec<_> = records
            .into_iter()
            .map(|record| {
                let payload = build_payload(&record, &now);
                json!({
                    "id": generate_point_id(),
                    "vector": record.vector,
                    "payload": payload,
                })
            })
            .collect();

        let point_count = serialized.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )?
            .query(&[("wait", true)])
            .json(&json!({ "points": serialized }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = %self.collection, points = point_count, "Points indexed");
        })
        .await?;

        Ok(point_count)
    }

    /// Perform a similarity search, returning scored payloads best first.
    pub async fn search_points(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ChunkHit>, QdrantError> {
        let body = json!({
            "query": vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )?
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        Ok(points
            .into_iter()
            .map(|point| hit_from_payload(stringify_point_id(point.id), point.score, point.payload))
            .collect())
    }

    /// Exact number of points stored; a missing collection counts as empty.
    pub async fn count_points(&self) -> Result<u64, QdrantError> {
        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/count", self.collection),
            )?
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(0),
            status if status.is_success() => {
                let CountResponse { result } = response.json().await?;
                Ok(result.count)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Qdrant count failed");
                Err(error)
            }
        }
    }

    async fn collection_exists(&self) -> Result<bool, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))?
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection existence check failed");
                Err(error)
            }
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, QdrantError> {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        Ok(req)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantService {
    async fn ensure_ready(&self) -> Result<(), IndexError> {
        self.create_collection_if_not_exists().await?;
        self.ensure_payload_indexes().await?;
        Ok(())
    }

    async fn upsert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<usize, IndexError> {
        Ok(self.index_points(chunks).await?)
    }

    async fn search(&self, vector: Vec<f32>, limit: usize) -> Result<Vec<ChunkHit>, IndexError> {
        Ok(self.search_points(vector, limit).await?)
    }

    async fn count(&self) -> Result<u64, IndexError> {
        Ok(self.count_points().await?)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn stringify_point_id(id: Value) -> String {
    match id {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Object(map) => map
            .get("uuid")
            .map(|value| match value {
                Value::String(uuid) => uuid.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

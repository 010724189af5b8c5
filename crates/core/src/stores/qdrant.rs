use crate::embeddings::classify_status;
use crate::error::WorkflowError;
use crate::models::{SearchOutcome, StoredPoint};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use url::Url;

pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self, WorkflowError> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)?;

        Ok(Self {
            endpoint,
            collection: collection.into(),
            client: Client::new(),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    async fn existing_dimensions(&self) -> Result<Option<usize>, WorkflowError> {
        let response = self.client.get(self.collection_url()).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let parsed: Value = response.json().await?;
                let size = parsed
                    .pointer("/result/config/params/vectors/size")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| WorkflowError::BackendResponse {
                        backend: "qdrant".to_string(),
                        details: "collection info had no vector size".to_string(),
                    })?;
                Ok(Some(size as usize))
            }
            status => Err(classify_status("qdrant", status)),
        }
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), WorkflowError> {
        match self.existing_dimensions().await? {
            Some(existing) if existing == dimensions => return Ok(()),
            Some(existing) => {
                return Err(WorkflowError::BackendResponse {
                    backend: "qdrant".to_string(),
                    details: format!(
                        "collection {} exists with dimension {}, expected {}",
                        self.collection, existing, dimensions
                    ),
                });
            }
            None => {}
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": dimensions, "distance": "Cosine" },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_status("qdrant", response.status()));
        }

        Ok(())
    }

    async fn upsert(&self, points: &[StoredPoint]) -> Result<(), WorkflowError> {
        if points.is_empty() {
            return Ok(());
        }

        let body = points
            .iter()
            .map(|point| {
                json!({
                    "id": point.id,
                    "vector": point.vector,
                    "payload": {
                        "source": point.payload.source,
                        "text": point.payload.text,
                    },
                })
            })
            .collect::<Vec<_>>();

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": body }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_status("qdrant", response.status()));
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<SearchOutcome, WorkflowError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(classify_status("qdrant", response.status()));
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(outcome_from_hits(&hits))
    }
}

/// Turns ranked search hits into contexts and deduplicated sources. Hits
/// with a missing or empty `text` payload are skipped; a missing `source`
/// keeps the context but contributes no source entry.
fn outcome_from_hits(hits: &[Value]) -> SearchOutcome {
    let mut outcome = SearchOutcome::default();

    for hit in hits {
        let text = hit
            .pointer("/payload/text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if text.is_empty() {
            continue;
        }
        outcome.contexts.push(text.to_string());

        if let Some(source) = hit.pointer("/payload/source").and_then(Value::as_str) {
            if !source.is_empty() && !outcome.sources.iter().any(|seen| seen == source) {
                outcome.sources.push(source.to_string());
            }
        }
    }

    outcome
}

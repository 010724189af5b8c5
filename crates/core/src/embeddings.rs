use crate::error::WorkflowError;
use crate::models::EMBEDDING_DIMENSIONS;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// Turns text batches into fixed-dimension vectors. One invocation is one
/// round trip to the backing service; output order matches input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, WorkflowError>;
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    client: Client,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, WorkflowError> {
        let base_url = base_url.into();
        Url::parse(&base_url)?;

        Ok(Self {
            base_url,
            api_key: api_key.into(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: EMBEDDING_DIMENSIONS,
            client: Client::new(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, WorkflowError> {
        if texts.is_empty() {
            return Err(WorkflowError::Validation(
                "embedding input batch is empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status("openai-embeddings", status));
        }

        let parsed: EmbeddingsResponse = response.json().await?;
        collect_vectors(parsed, texts.len(), self.dimensions)
    }
}

/// Maps a non-2xx status onto the retryable/terminal error split.
pub(crate) fn classify_status(backend: &str, status: StatusCode) -> WorkflowError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        WorkflowError::RateLimited {
            backend: backend.to_string(),
        }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        WorkflowError::BackendUnavailable {
            backend: backend.to_string(),
            details: status.to_string(),
        }
    } else {
        WorkflowError::BackendResponse {
            backend: backend.to_string(),
            details: status.to_string(),
        }
    }
}

/// Reorders response items by their index and verifies count and dimension.
fn collect_vectors(
    response: EmbeddingsResponse,
    expected_count: usize,
    expected_dimensions: usize,
) -> Result<Vec<Vec<f32>>, WorkflowError> {
    let mut items = response.data;
    items.sort_by_key(|item| item.index);

    if items.len() != expected_count {
        return Err(WorkflowError::BackendResponse {
            backend: "openai-embeddings".to_string(),
            details: format!(
                "expected {} embeddings, got {}",
                expected_count,
                items.len()
            ),
        });
    }

    let mut vectors = Vec::with_capacity(items.len());
    for item in items {
        if item.embedding.len() != expected_dimensions {
            return Err(WorkflowError::BackendResponse {
                backend: "openai-embeddings".to_string(),
                details: format!(
                    "embedding dimension {} != {}",
                    item.embedding.len(),
                    expected_dimensions
                ),
            });
        }
        vectors.push(item.embedding);
    }

    Ok(vectors)
}

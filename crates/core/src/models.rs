use serde::{Deserialize, Serialize};

/// Embedding width of `text-embedding-3-large`, the model this pipeline is
/// built around. Every vector in the collection must have this dimension.
pub const EMBEDDING_DIMENSIONS: usize = 3072;

pub const DEFAULT_TOP_K: usize = 5;

/// Typed payload of the `ingest_pdf` triggering event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub file_path: String,
    #[serde(default)]
    pub source_id: Option<String>,
}

/// Typed payload of the `query_pdf` triggering event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn effective_top_k(&self) -> usize {
        self.top_k.unwrap_or(DEFAULT_TOP_K)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestResult {
    pub ingested: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<String>,
    pub num_contexts: usize,
}

/// Checkpointed output of the load-and-chunk step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkBatch {
    pub chunks: Vec<String>,
    pub source_id: String,
}

/// Payload persisted next to every vector in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PointPayload {
    pub source: String,
    pub text: String,
}

/// One (id, vector, payload) triple as written to the vector store. The id
/// is derived from `(source_id, chunk_index)`, so re-ingesting the same
/// source replaces points instead of duplicating them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}

/// Checkpointed output of the embed-and-search step: ranked context texts
/// (duplicates kept) and source identifiers (deduplicated, rank order).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SearchOutcome {
    pub contexts: Vec<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_defaults_to_five() {
        let request = QueryRequest {
            question: "what is the operating pressure?".to_string(),
            top_k: None,
        };
        assert_eq!(request.effective_top_k(), 5);

        let request = QueryRequest {
            question: "what is the operating pressure?".to_string(),
            top_k: Some(12),
        };
        assert_eq!(request.effective_top_k(), 12);
    }

    #[test]
    fn event_payloads_accept_minimal_json() {
        let ingest: IngestRequest =
            serde_json::from_str(r#"{"file_path": "/tmp/manual.pdf"}"#).unwrap();
        assert_eq!(ingest.file_path, "/tmp/manual.pdf");
        assert!(ingest.source_id.is_none());

        let query: QueryRequest = serde_json::from_str(r#"{"question": "why?"}"#).unwrap();
        assert!(query.top_k.is_none());
    }
}

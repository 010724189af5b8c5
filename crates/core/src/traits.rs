use crate::error::WorkflowError;
use crate::models::{SearchOutcome, StoredPoint};
use async_trait::async_trait;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the backing collection with cosine vectors of `dimensions`
    /// if it does not exist. Errors when an existing collection has a
    /// different dimension.
    async fn ensure_collection(&self, dimensions: usize) -> Result<(), WorkflowError>;

    /// Id-keyed insert-or-replace. Re-upserting an id replaces its vector
    /// and payload, so retried writes converge.
    async fn upsert(&self, points: &[StoredPoint]) -> Result<(), WorkflowError>;

    /// Top-k cosine search. Returns at most `top_k` contexts ranked by
    /// similarity plus their deduplicated sources.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<SearchOutcome, WorkflowError>;
}

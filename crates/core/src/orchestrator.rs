use crate::checkpoint::{run_step, StepJournal};
use crate::chunking::{normalize_whitespace, SentenceChunker};
use crate::embeddings::Embedder;
use crate::error::WorkflowError;
use crate::extractor::extract_page_texts;
use crate::ingest::{default_source_id, point_id};
use crate::llm::{ChatRequest, LlmClient};
use crate::models::{
    ChunkBatch, IngestRequest, IngestResult, IngestionOptions, PointPayload, QueryRequest,
    QueryResult, SearchOutcome, StoredPoint,
};
use crate::retry::{with_retry, RetryPolicy};
use crate::traits::VectorStore;
use std::path::Path;
use tracing::info;

pub const ANSWER_SYSTEM_PROMPT: &str = "You answer questions strictly from the supplied context. \
If the context does not contain the answer, say that you do not know. \
Do not use outside knowledge.";

const STEP_LOAD_AND_CHUNK: &str = "load-and-chunk";
const STEP_EMBED_AND_UPSERT: &str = "embed-and-upsert";
const STEP_EMBED_AND_SEARCH: &str = "embed-and-search";

/// Runs the two durable workflows against injected collaborators. One
/// coordinator is built at process start and shared across invocations;
/// it holds no per-run state, so concurrent runs need no locking.
pub struct WorkflowCoordinator<E, S, L, J>
where
    E: Embedder,
    S: VectorStore,
    L: LlmClient,
    J: StepJournal,
{
    embedder: E,
    store: S,
    llm: L,
    journal: J,
    chunker: SentenceChunker,
    retry: RetryPolicy,
}

impl<E, S, L, J> WorkflowCoordinator<E, S, L, J>
where
    E: Embedder + Send + Sync,
    S: VectorStore + Send + Sync,
    L: LlmClient + Send + Sync,
    J: StepJournal + Send + Sync,
{
    pub fn new(
        embedder: E,
        store: S,
        llm: L,
        journal: J,
        options: IngestionOptions,
    ) -> Result<Self, WorkflowError> {
        Ok(Self {
            embedder,
            store,
            llm,
            journal,
            chunker: SentenceChunker::new(options)?,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The `ingest_pdf` workflow. Both steps are journaled under `run_id`,
    /// so a resumed run re-parses nothing and re-embeds nothing that
    /// already completed; the idempotent point ids make a repeated upsert
    /// a replace.
    pub async fn ingest(
        &self,
        run_id: &str,
        request: &IngestRequest,
    ) -> Result<IngestResult, WorkflowError> {
        if request.file_path.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "file_path is required".to_string(),
            ));
        }

        let batch: ChunkBatch = run_step(&self.journal, run_id, STEP_LOAD_AND_CHUNK, async {
            self.load_and_chunk(request)
        })
        .await?;

        info!(
            run_id,
            source_id = %batch.source_id,
            chunks = batch.chunks.len(),
            "document chunked"
        );

        let ingested: usize = run_step(&self.journal, run_id, STEP_EMBED_AND_UPSERT, async {
            self.embed_and_upsert(&batch).await
        })
        .await?;

        info!(run_id, ingested, "ingest complete");
        Ok(IngestResult { ingested })
    }

    /// The `query_pdf` workflow. Retrieval is journaled; the LLM call is
    /// deliberately outside the journal so a resumed run re-asks the model
    /// with the already-checkpointed contexts.
    pub async fn query(
        &self,
        run_id: &str,
        request: &QueryRequest,
    ) -> Result<QueryResult, WorkflowError> {
        if request.question.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "question is required".to_string(),
            ));
        }
        let top_k = request.effective_top_k();

        let outcome: SearchOutcome = run_step(&self.journal, run_id, STEP_EMBED_AND_SEARCH, async {
            self.embed_and_search(&request.question, top_k).await
        })
        .await?;

        info!(
            run_id,
            contexts = outcome.contexts.len(),
            sources = outcome.sources.len(),
            "retrieval complete"
        );

        // Zero contexts still go to the model; the system prompt makes it
        // answer "I do not know" rather than hallucinate.
        let chat = ChatRequest::new(
            ANSWER_SYSTEM_PROMPT,
            build_user_prompt(&outcome.contexts, &request.question),
        );
        let answer = with_retry(&self.retry, "chat-completion", || self.llm.complete(&chat)).await?;

        Ok(QueryResult {
            answer: answer.trim().to_string(),
            sources: outcome.sources,
            num_contexts: outcome.contexts.len(),
        })
    }

    fn load_and_chunk(&self, request: &IngestRequest) -> Result<ChunkBatch, WorkflowError> {
        let pages = extract_page_texts(Path::new(&request.file_path))?;

        let mut chunks = Vec::new();
        for page in pages {
            let normalized = normalize_whitespace(&page.text);
            chunks.extend(self.chunker.split_text(&normalized));
        }

        if chunks.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "no content extracted from {}",
                request.file_path
            )));
        }

        let source_id = request
            .source_id
            .clone()
            .unwrap_or_else(|| default_source_id(&request.file_path));

        Ok(ChunkBatch { chunks, source_id })
    }

    async fn embed_and_upsert(&self, batch: &ChunkBatch) -> Result<usize, WorkflowError> {
        with_retry(&self.retry, "ensure-collection", || {
            self.store.ensure_collection(self.embedder.dimensions())
        })
        .await?;

        let vectors = with_retry(&self.retry, "embed-chunks", || {
            self.embedder.embed_batch(&batch.chunks)
        })
        .await?;

        let points = batch
            .chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (text, vector))| StoredPoint {
                id: point_id(&batch.source_id, index),
                vector,
                payload: PointPayload {
                    source: batch.source_id.clone(),
                    text: text.clone(),
                },
            })
            .collect::<Vec<_>>();

        with_retry(&self.retry, "upsert-points", || self.store.upsert(&points)).await?;
        Ok(points.len())
    }

    async fn embed_and_search(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<SearchOutcome, WorkflowError> {
        let question_batch = vec![question.to_string()];
        let mut vectors = with_retry(&self.retry, "embed-question", || {
            self.embedder.embed_batch(&question_batch)
        })
        .await?;

        let query_vector = vectors.pop().ok_or_else(|| WorkflowError::BackendResponse {
            backend: "openai-embeddings".to_string(),
            details: "question embedding missing".to_string(),
        })?;

        with_retry(&self.retry, "search-points", || {
            self.store.search(&query_vector, top_k)
        })
        .await
    }
}

fn build_user_prompt(contexts: &[String], question: &str) -> String {
    let mut prompt = String::from("Context:\n");
    for context in contexts {
        prompt.push_str("- ");
        prompt.push_str(context);
        prompt.push('\n');
    }
    prompt.push_str("\nQuestion: ");
    prompt.push_str(question);
    prompt
}

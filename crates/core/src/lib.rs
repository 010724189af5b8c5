pub mod checkpoint;
pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod orchestrator;
pub mod retry;
pub mod stores;
pub mod traits;

pub use checkpoint::{run_step, FileJournal, MemoryJournal, StepJournal};
pub use chunking::{normalize_whitespace, SentenceChunker};
pub use embeddings::{Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_MODEL};
pub use error::WorkflowError;
pub use extractor::{extract_page_texts, PageText, PdfExtractor};
pub use ingest::{default_source_id, discover_pdf_files, point_id};
pub use llm::{ChatRequest, LlmClient, OpenAiChatClient, DEFAULT_CHAT_MODEL};
pub use models::{
    ChunkBatch, IngestRequest, IngestResult, IngestionOptions, PointPayload, QueryRequest,
    QueryResult, SearchOutcome, StoredPoint, DEFAULT_TOP_K, EMBEDDING_DIMENSIONS,
};
pub use orchestrator::{WorkflowCoordinator, ANSWER_SYSTEM_PROMPT};
pub use retry::{with_retry, RetryPolicy};
pub use stores::QdrantStore;
pub use traits::VectorStore;

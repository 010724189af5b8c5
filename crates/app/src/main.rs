use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use clap::{Parser, Subcommand};
use pdf_rag_core::{
    discover_pdf_files, FileJournal, IngestRequest, IngestionOptions, OpenAiChatClient,
    OpenAiEmbedder, QdrantStore, QueryRequest, WorkflowCoordinator, WorkflowError,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pdf-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection name
    #[arg(long, default_value = "documents")]
    collection: String,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, default_value = "https://api.openai.com")]
    openai_url: String,

    /// API key for the embedding and chat endpoints
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: String,

    /// Embedding model
    #[arg(long, default_value = "text-embedding-3-large")]
    embedding_model: String,

    /// Embedding dimension; must match the collection
    #[arg(long, default_value_t = 3072)]
    embedding_dimensions: usize,

    /// Chat model used to synthesize answers
    #[arg(long, default_value = "gpt-4o-mini")]
    chat_model: String,

    /// Directory holding per-run step journals
    #[arg(long, default_value = ".pdf-rag/runs")]
    state_dir: String,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[arg(long, default_value_t = 200)]
    chunk_overlap: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest one PDF (or every PDF under a folder) into the vector store.
    Ingest {
        /// Path to a single PDF file.
        #[arg(long, conflicts_with = "folder")]
        file: Option<String>,
        /// Folder to scan recursively for PDFs.
        #[arg(long)]
        folder: Option<String>,
        /// Attribution id stored with each chunk; defaults to the file name.
        #[arg(long)]
        source_id: Option<String>,
        /// Reuse a run id to resume a previously failed ingest.
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Ask a question over the ingested documents.
    Query {
        /// The question to answer.
        #[arg(long)]
        question: String,
        /// Number of contexts to retrieve.
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Reuse a run id to resume a previously failed query.
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Serve the ingest_pdf and query_pdf events over HTTP.
    Serve {
        /// Listen address.
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },
}

type Coordinator = WorkflowCoordinator<OpenAiEmbedder, QdrantStore, OpenAiChatClient, FileJournal>;

fn build_coordinator(cli: &Cli) -> anyhow::Result<Coordinator> {
    let embedder = OpenAiEmbedder::new(&cli.openai_url, &cli.openai_api_key)?
        .with_model(&cli.embedding_model, cli.embedding_dimensions);
    let store = QdrantStore::new(&cli.qdrant_url, &cli.collection)?;
    let llm =
        OpenAiChatClient::new(&cli.openai_url, &cli.openai_api_key)?.with_model(&cli.chat_model);
    let journal = FileJournal::new(&cli.state_dir);

    let coordinator = WorkflowCoordinator::new(
        embedder,
        store,
        llm,
        journal,
        IngestionOptions {
            chunk_size: cli.chunk_size,
            chunk_overlap: cli.chunk_overlap,
        },
    )?;
    Ok(coordinator)
}

fn fresh_run_id(kind: &str) -> String {
    format!("{kind}-{}", Uuid::new_v4())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let coordinator = build_coordinator(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-rag boot"
    );

    match cli.command {
        Command::Ingest {
            file,
            folder,
            source_id,
            run_id,
        } => {
            let files = match (file, folder) {
                (Some(file), None) => vec![file],
                (None, Some(folder)) => {
                    let found = discover_pdf_files(Path::new(&folder));
                    if found.is_empty() {
                        anyhow::bail!("no pdf files found in {folder}");
                    }
                    found
                        .into_iter()
                        .map(|path| path.to_string_lossy().to_string())
                        .collect()
                }
                _ => anyhow::bail!("pass exactly one of --file or --folder"),
            };

            // A reused run id only makes sense for a single document;
            // folder ingests get a fresh journal per file.
            let reuse_run_id = run_id.filter(|_| files.len() == 1);

            let mut total = 0usize;
            for file_path in files {
                let run_id = reuse_run_id
                    .clone()
                    .unwrap_or_else(|| fresh_run_id("ingest"));
                let request = IngestRequest {
                    file_path: file_path.clone(),
                    source_id: source_id.clone(),
                };

                match coordinator.ingest(&run_id, &request).await {
                    Ok(result) => {
                        println!("{}: {} chunks ingested (run {})", file_path, result.ingested, run_id);
                        total += result.ingested;
                    }
                    Err(error) => {
                        warn!(file = %file_path, run_id = %run_id, %error, "ingest failed");
                        return Err(error.into());
                    }
                }
            }
            println!("{total} chunks ingested at {}", Utc::now().to_rfc3339());
        }
        Command::Query {
            question,
            top_k,
            run_id,
        } => {
            let run_id = run_id.unwrap_or_else(|| fresh_run_id("query"));
            let result = coordinator
                .query(
                    &run_id,
                    &QueryRequest {
                        question,
                        top_k: Some(top_k),
                    },
                )
                .await?;

            println!("{}", result.answer);
            println!();
            println!("contexts used: {}", result.num_contexts);
            for source in result.sources {
                println!("source: {source}");
            }
        }
        Command::Serve { addr } => {
            let app = Router::new()
                .route("/events/ingest_pdf", post(ingest_event))
                .route("/events/query_pdf", post(query_event))
                .with_state(Arc::new(coordinator));

            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(addr = %addr, "serving triggering events");
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

async fn ingest_event(
    State(coordinator): State<Arc<Coordinator>>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<pdf_rag_core::IngestResult>, (StatusCode, String)> {
    let run_id = fresh_run_id("ingest");
    coordinator
        .ingest(&run_id, &request)
        .await
        .map(Json)
        .map_err(into_response_error)
}

async fn query_event(
    State(coordinator): State<Arc<Coordinator>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<pdf_rag_core::QueryResult>, (StatusCode, String)> {
    let run_id = fresh_run_id("query");
    coordinator
        .query(&run_id, &request)
        .await
        .map(Json)
        .map_err(into_response_error)
}

fn into_response_error(error: WorkflowError) -> (StatusCode, String) {
    let status = match &error {
        WorkflowError::Validation(_) | WorkflowError::InvalidChunkConfig(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, error.to_string())
}

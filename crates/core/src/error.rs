use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("{backend} unavailable: {details}")]
    BackendUnavailable { backend: String, details: String },

    #[error("rate limited by {backend}")]
    RateLimited { backend: String },

    #[error("step journal error: {0}")]
    Journal(String),
}

impl WorkflowError {
    /// Whether a retry of the failing step can reasonably succeed.
    ///
    /// Validation failures, unreadable PDFs, and malformed responses are
    /// terminal; transport failures, rate limits, and backend outages are
    /// worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkflowError::Http(error) => !error.is_builder(),
            WorkflowError::BackendUnavailable { .. } | WorkflowError::RateLimited { .. } => true,
            WorkflowError::Io(_) => false,
            WorkflowError::PdfParse(_)
            | WorkflowError::RegexError(_)
            | WorkflowError::InvalidChunkConfig(_)
            | WorkflowError::Validation(_)
            | WorkflowError::Url(_)
            | WorkflowError::Serialization(_)
            | WorkflowError::BackendResponse { .. }
            | WorkflowError::Journal(_) => false,
        }
    }
}

pub type Result<T, E = WorkflowError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::WorkflowError;

    #[test]
    fn validation_errors_are_terminal() {
        let error = WorkflowError::Validation("file_path is required".to_string());
        assert!(!error.is_retryable());
    }

    #[test]
    fn backend_outages_are_retryable() {
        let error = WorkflowError::BackendUnavailable {
            backend: "qdrant".to_string(),
            details: "503 Service Unavailable".to_string(),
        };
        assert!(error.is_retryable());

        let error = WorkflowError::RateLimited {
            backend: "openai".to_string(),
        };
        assert!(error.is_retryable());
    }
}

//! Error taxonomies for the ingestion and answer paths.
//!
//! Ingestion errors are caught at the orchestrator boundary and converted
//! into a terminal FAILED status; they never reach the upload-event caller.
//! Answer-path errors before streaming begins surface synchronously to the
//! HTTP caller; errors during streaming terminate the stream.

/// Ingestion-path errors. Each variant maps to a terminal FAILED transition.
#[derive(Debug)]
pub enum IngestError {
    /// Declared type is not in the supported closed set.
    UnsupportedType(String),
    /// Blob fetch or parser failure, carrying the underlying cause.
    Extraction(String),
    /// Unit count exceeded the plan's per-file limit.
    QuotaExceeded { units: usize, limit: usize },
    /// Embedding-provider or index-write failure.
    Indexing(String),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::UnsupportedType(t) => write!(f, "unsupported file type: {}", t),
            IngestError::Extraction(e) => write!(f, "extraction failed: {}", e),
            IngestError::QuotaExceeded { units, limit } => {
                write!(f, "quota exceeded: {} units over limit {}", units, limit)
            }
            IngestError::Indexing(e) => write!(f, "indexing failed: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}

/// Answer-path errors.
#[derive(Debug)]
pub enum ChatError {
    /// No identity on the request.
    Unauthorized,
    /// File does not exist or is not owned by the caller. Deliberately
    /// indistinguishable, so ownership cannot be probed.
    NotFound,
    /// Retrieval or model failure, before or during streaming.
    Stream(String),
    /// Record-store write failure.
    Persistence(String),
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::Unauthorized => write!(f, "unauthorized"),
            ChatError::NotFound => write!(f, "not found"),
            ChatError::Stream(e) => write!(f, "stream failed: {}", e),
            ChatError::Persistence(e) => write!(f, "persistence failed: {}", e),
        }
    }
}

impl std::error::Error for ChatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_error_display() {
        let err = IngestError::QuotaExceeded {
            units: 30,
            limit: 5,
        };
        assert_eq!(err.to_string(), "quota exceeded: 30 units over limit 5");
        assert_eq!(
            IngestError::UnsupportedType("docx".into()).to_string(),
            "unsupported file type: docx"
        );
    }

    #[test]
    fn chat_error_display() {
        assert_eq!(ChatError::NotFound.to_string(), "not found");
        assert_eq!(
            ChatError::Stream("model disconnect".into()).to_string(),
            "stream failed: model disconnect"
        );
    }
}

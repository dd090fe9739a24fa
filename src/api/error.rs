//! API error type with status mapping for the request handlers.

use crate::pipeline::processor::ProcessingError;
use crate::pipeline::structuring::StructuringError;

use super::types::Envelope;

/// Handler-level errors. `status()` gives the HTTP-style code a transport
/// should answer with; `message()` is safe to show to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(message) | ApiError::Internal(message) => message,
        }
    }

    /// Failure envelope carrying this error's message.
    pub fn into_envelope<T>(self) -> Envelope<T> {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(detail, "Handler internal error");
        }
        Envelope::failure(self.message())
    }
}

impl From<StructuringError> for ApiError {
    fn from(err: StructuringError) -> Self {
        match err {
            StructuringError::NoContent => {
                ApiError::BadRequest(StructuringError::NoContent.to_string())
            }
            other => ApiError::Internal(format!("AI analysis failed: {other}")),
        }
    }
}

impl From<ProcessingError> for ApiError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::Structuring(inner) => inner.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

/// Failures while wiring the handlers at startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("Extractor setup failed: {0}")]
    Extraction(#[from] crate::pipeline::extraction::ExtractionError),

    #[error("LLM client setup failed: {0}")]
    Llm(#[from] StructuringError),
}

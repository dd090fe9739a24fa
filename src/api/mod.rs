//! Transport-agnostic request handlers.
//!
//! Each handler takes an `ApiContext` plus a deserialized request body and
//! returns an `ApiResponse`: an HTTP-style status and a JSON envelope. A
//! host (the CLI, or any HTTP server) only has to route and serialize.

pub mod diagnostics;
pub mod error;
pub mod insights;
pub mod types;

use std::sync::Arc;

pub use error::{ApiError, StartupError};
pub use types::{ApiResponse, Envelope};

use crate::config::ServiceConfig;
use crate::pipeline::extraction::{DocumentExtractor, PdfiumRenderer};
use crate::pipeline::insights::{HealthInsightGenerator, MedicationRecommender};
use crate::pipeline::processor::DocumentProcessor;
use crate::pipeline::structuring::{ChatCompletionClient, DiagnosticAnalyzer, LlmClient};

/// Which optional engines are usable in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub ocr: bool,
    pub pdf_rendering: bool,
}

impl Capabilities {
    pub fn detect() -> Self {
        Self {
            ocr: cfg!(feature = "ocr"),
            pdf_rendering: PdfiumRenderer::new().is_available(),
        }
    }
}

/// Shared, read-only state for all handlers. Safe to share across threads.
pub struct ApiContext {
    pub processor: DocumentProcessor,
    pub health_insights: HealthInsightGenerator,
    pub recommender: MedicationRecommender,
    pub capabilities: Capabilities,
}

impl ApiContext {
    pub fn new(
        processor: DocumentProcessor,
        health_insights: HealthInsightGenerator,
        recommender: MedicationRecommender,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            processor,
            health_insights,
            recommender,
            capabilities,
        }
    }

    /// Production wiring. One completion client is shared by all
    /// generators.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, StartupError> {
        let llm: Arc<dyn LlmClient + Send + Sync> =
            Arc::new(ChatCompletionClient::from_config(config)?);
        let extractor = DocumentExtractor::with_defaults(
            config.http_timeout_secs,
            config.tessdata_dir.as_deref(),
        )?;

        let capabilities = Capabilities::detect();
        tracing::info!(
            model = %config.model,
            ocr = capabilities.ocr,
            pdf_rendering = capabilities.pdf_rendering,
            "Handlers initialized"
        );

        Ok(Self::new(
            DocumentProcessor::new(
                Box::new(extractor),
                DiagnosticAnalyzer::new(Box::new(Arc::clone(&llm))),
            ),
            HealthInsightGenerator::new(Box::new(Arc::clone(&llm))),
            MedicationRecommender::new(Box::new(llm)),
            capabilities,
        ))
    }
}

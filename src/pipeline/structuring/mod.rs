pub mod types;
pub mod client;
pub mod prompt;
pub mod parser;
pub mod orchestrator;
pub mod metrics;

pub use types::*;
pub use client::*;
pub use prompt::*;
pub use parser::*;
pub use orchestrator::*;
pub use metrics::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("LLM request failed: {0}")]
    Upstream(String),

    #[error("LLM service returned error (status {status}): {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("No content available for analysis")]
    NoContent,
}

//! labsight: command-line front end for the diagnostic insight handlers.
//!
//! Every subcommand prints the handler's JSON envelope to stdout and exits
//! non-zero when the handler reports a non-2xx status.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;

use labsight::api::types::{
    HealthInsightRequest, InsightRequest, MedicationRecommendationRequest, OcrExtractRequest,
    ValidateDocumentRequest,
};
use labsight::api::{diagnostics, insights, ApiContext, ApiResponse};
use labsight::config::{self, ServiceConfig};
use labsight::pipeline::structuring::StructuredData;

#[derive(Parser)]
#[command(name = "labsight")]
#[command(author, version, about = "Structured diagnostic insights from lab reports")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, analyze and print a diagnostic insight record
    Insights {
        /// Identifier of the test result being analyzed
        #[arg(short = 'i', long)]
        test_result_id: String,

        /// Report URL or local path
        #[arg(short, long)]
        attachment: Option<String>,

        /// Kind of test (e.g. "Complete Blood Count")
        #[arg(short = 't', long)]
        test_type: Option<String>,

        /// Clinician findings appended to the report text
        #[arg(short, long)]
        findings: Option<String>,
    },

    /// Extract text from a report and score it as a medical document
    Extract {
        /// Report URL or local path
        source: String,
    },

    /// Score text as a medical document
    Validate {
        /// Text to score; read from --file when omitted
        #[arg(short, long, conflicts_with = "file")]
        text: Option<String>,

        /// File holding the text to score
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Count normal/abnormal tests in a structuredData JSON file
    Metrics {
        /// Path to a structuredData JSON document
        input: PathBuf,
    },

    /// Generate health insights from a JSON request file
    HealthInsights {
        /// Path to a {"patient_data": ..., "analysis_type": ...} JSON document
        input: PathBuf,
    },

    /// Generate medication recommendations from a JSON request file
    Recommend {
        /// Path to a {"patient_data": ...} JSON document
        input: PathBuf,
    },

    /// Report which engines are available
    Status,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    labsight::init_tracing();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the handler succeeded.
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Validate { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => Some(text),
                (None, Some(path)) => Some(std::fs::read_to_string(path)?),
                (None, None) => None,
            };
            print_response(&diagnostics::validate_document(&ValidateDocumentRequest { text }))
        }
        Commands::Metrics { input } => {
            let data: StructuredData = read_json(&input)?;
            print_response(&diagnostics::key_metrics(&data))
        }
        Commands::Insights {
            test_result_id,
            attachment,
            test_type,
            findings,
        } => {
            let ctx = build_context()?;
            let request = InsightRequest {
                test_result_id: Some(test_result_id),
                attachment_url: attachment,
                test_type,
                findings,
            };
            print_response(&diagnostics::generate_insights(&ctx, &request))
        }
        Commands::Extract { source } => {
            let ctx = build_context()?;
            let request = OcrExtractRequest {
                file_url: Some(source),
            };
            print_response(&diagnostics::ocr_extract(&ctx, &request))
        }
        Commands::HealthInsights { input } => {
            let request: HealthInsightRequest = read_json(&input)?;
            let ctx = build_context()?;
            print_response(&insights::health_insights(&ctx, &request))
        }
        Commands::Recommend { input } => {
            let request: MedicationRecommendationRequest = read_json(&input)?;
            let ctx = build_context()?;
            print_response(&insights::medication_recommendations(&ctx, &request))
        }
        Commands::Status => {
            let ctx = build_context()?;
            print_response(&diagnostics::health(&ctx))
        }
    }
}

fn build_context() -> Result<ApiContext, Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env()?;
    tracing::info!(
        version = config::APP_VERSION,
        model = %config.model,
        "{} starting",
        config::APP_NAME
    );
    Ok(ApiContext::from_config(&config)?)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_response<T: Serialize>(response: &ApiResponse<T>) -> Result<bool, Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(response.is_success())
}

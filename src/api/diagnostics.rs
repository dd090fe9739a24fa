//! Diagnostic report handlers: insight generation, raw extraction,
//! document validation, key metrics and the service health probe.

use serde::Serialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::types::{respond, ApiResponse, Envelope, OcrExtractRequest, ValidateDocumentRequest};
use super::ApiContext;
use crate::pipeline::extraction::{validate_medical_document, DocumentValidation};
use crate::pipeline::processor::{DiagnosticInsight, InsightRequest};
use crate::pipeline::structuring::{extract_key_metrics, KeyMetrics, StructuredData};

pub fn generate_insights(ctx: &ApiContext, request: &InsightRequest) -> ApiResponse<DiagnosticInsight> {
    respond(
        ctx.processor
            .generate_insights(request)
            .map(|processed| {
                let metadata = json!({
                    "processingTime": processed.insight.source_file.processing_time,
                    "textLength": processed.text_length,
                    "ocrMetadata": processed.extraction,
                });
                Envelope::ok(processed.insight).with_metadata(metadata)
            })
            .map_err(ApiError::from),
    )
}

pub fn ocr_extract(ctx: &ApiContext, request: &OcrExtractRequest) -> ApiResponse<Value> {
    respond(run_ocr_extract(ctx, request))
}

fn run_ocr_extract(ctx: &ApiContext, request: &OcrExtractRequest) -> Result<Envelope<Value>, ApiError> {
    let file_url = request
        .file_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::bad_request("fileUrl is required"))?;

    let result = ctx.processor.extract(file_url);
    if !result.success {
        let reason = result.error.unwrap_or_default();
        return Err(ApiError::bad_request(format!("Text extraction failed: {reason}")));
    }

    let validation = validate_medical_document(&result.extracted_text);
    Ok(Envelope::ok(json!({
        "extractedText": result.extracted_text,
        "metadata": result.metadata,
        "validation": validation,
    })))
}

pub fn validate_document(request: &ValidateDocumentRequest) -> ApiResponse<DocumentValidation> {
    respond(
        request
            .text
            .as_deref()
            .filter(|text| !text.is_empty())
            .map(|text| Envelope::ok(validate_medical_document(text)))
            .ok_or_else(|| ApiError::bad_request("text is required")),
    )
}

pub fn key_metrics(data: &StructuredData) -> ApiResponse<KeyMetrics> {
    ApiResponse::ok(Envelope::ok(extract_key_metrics(data)))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub ocr: bool,
    pub pdf_rendering: bool,
    /// A completion model is configured. Reachability is not checked.
    pub llm_configured: bool,
    /// Analysis can be attempted: follows `llm_configured`.
    pub diagnostic_analysis: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthReport {
    pub services: ServiceStatus,
    pub status: &'static str,
    pub model: String,
    pub version: &'static str,
}

/// Availability probe. Reports local engine availability and whether a
/// model is configured, without spending a completion call, so an
/// unreachable provider still reads as configured here.
pub fn health(ctx: &ApiContext) -> ApiResponse<HealthReport> {
    let caps = ctx.capabilities;
    let model = ctx.processor.analyzer().model().to_string();
    let llm_configured = !model.trim().is_empty();
    let services = ServiceStatus {
        ocr: caps.ocr,
        pdf_rendering: caps.pdf_rendering,
        llm_configured,
        diagnostic_analysis: llm_configured,
    };
    let status = if caps.ocr && caps.pdf_rendering && llm_configured {
        "healthy"
    } else {
        "degraded"
    };

    ApiResponse::ok(Envelope::ok(HealthReport {
        services,
        status,
        model,
        version: crate::config::APP_VERSION,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::{context, context_with};
    use crate::pipeline::structuring::{MockLlmClient, TestValue};
    use std::sync::Arc;

    const REPORT: &str = "Laboratory report. Hemoglobin 10.2 g/dL, glucose 250 mg/dL. \
        Reference range provided for each test result.";

    const ANALYSIS: &str = r#"{"aiSummary":"Anemia and hyperglycemia","riskAssessment":{"level":"moderate","description":"Two abnormal values"},"confidence":0.7}"#;

    fn insight_request(id: Option<&str>, attachment: Option<&str>) -> InsightRequest {
        InsightRequest {
            test_result_id: id.map(String::from),
            attachment_url: attachment.map(String::from),
            ..InsightRequest::default()
        }
    }

    #[test]
    fn generate_insights_success_envelope() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let ctx = context(REPORT.as_bytes(), &llm);
        let response = generate_insights(
            &ctx,
            &insight_request(Some("tr-7"), Some("https://files.example/cbc.txt")),
        );

        assert_eq!(response.status, 200);
        let json = serde_json::to_value(&response.body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["testResultId"], "tr-7");
        assert_eq!(json["data"]["processingStatus"], "completed");
        assert_eq!(json["data"]["riskAssessment"]["level"], "moderate");
        assert_eq!(json["data"]["sourceFile"]["fileSize"], REPORT.len());
        assert_eq!(json["metadata"]["ocrMetadata"]["extractionMethod"], "direct");
        assert_eq!(json["metadata"]["textLength"], REPORT.len());
    }

    #[test]
    fn generate_insights_without_id_is_400() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let ctx = context(REPORT.as_bytes(), &llm);
        let response = generate_insights(&ctx, &insight_request(None, None));
        assert_eq!(response.status, 400);
        assert_eq!(response.body.message.as_deref(), Some("testResultId is required"));
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn generate_insights_without_content_is_400_and_no_completion() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let ctx = context(REPORT.as_bytes(), &llm);
        let response = generate_insights(&ctx, &insight_request(Some("tr-8"), None));
        assert_eq!(response.status, 400);
        assert_eq!(
            response.body.message.as_deref(),
            Some("No content available for analysis")
        );
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn generate_insights_upstream_failure_is_500() {
        let llm = Arc::new(MockLlmClient::failing(429, "rate limited"));
        let ctx = context(REPORT.as_bytes(), &llm);
        let response = generate_insights(
            &ctx,
            &insight_request(Some("tr-9"), Some("https://files.example/cbc.txt")),
        );
        assert_eq!(response.status, 500);
        assert!(response
            .body
            .message
            .as_deref()
            .unwrap()
            .starts_with("AI analysis failed: "));
    }

    #[test]
    fn ocr_extract_returns_text_and_validation() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let ctx = context(REPORT.as_bytes(), &llm);
        let response = ocr_extract(
            &ctx,
            &OcrExtractRequest {
                file_url: Some("https://files.example/cbc.txt".into()),
            },
        );
        assert_eq!(response.status, 200);
        let data = response.body.data.unwrap();
        assert_eq!(data["extractedText"], REPORT);
        assert_eq!(data["metadata"]["fileType"], "text");
        assert_eq!(data["validation"]["isLikelyMedical"], true);
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn ocr_extract_requires_url() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let ctx = context(b"", &llm);
        let response = ocr_extract(&ctx, &OcrExtractRequest::default());
        assert_eq!(response.status, 400);
        assert_eq!(response.body.message.as_deref(), Some("fileUrl is required"));
    }

    #[test]
    fn ocr_extract_reports_unsupported_format() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let ctx = context_with(b"PK\x03\x04", Some("application/zip"), &llm);
        let response = ocr_extract(
            &ctx,
            &OcrExtractRequest {
                file_url: Some("https://files.example/archive.zip".into()),
            },
        );
        assert_eq!(response.status, 400);
        let message = response.body.message.unwrap();
        assert!(message.starts_with("Text extraction failed: Unsupported file type"));
        assert!(message.contains("zip"));
    }

    #[test]
    fn validate_document_requires_text() {
        let response = validate_document(&ValidateDocumentRequest::default());
        assert_eq!(response.status, 400);
        assert_eq!(response.body.message.as_deref(), Some("text is required"));

        let response = validate_document(&ValidateDocumentRequest {
            text: Some(REPORT.into()),
        });
        assert_eq!(response.status, 200);
        assert!(response.body.data.unwrap().is_likely_medical);
    }

    #[test]
    fn key_metrics_counts() {
        let data = StructuredData {
            test_values: vec![
                TestValue {
                    is_abnormal: true,
                    ..TestValue::default()
                },
                TestValue::default(),
            ],
            ..StructuredData::default()
        };
        let response = key_metrics(&data);
        let metrics = response.body.data.unwrap();
        assert_eq!(metrics.abnormal_tests, 1);
        assert_eq!(metrics.abnormal_percentage, 50.0);
    }

    #[test]
    fn health_reports_degraded_without_ocr() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let ctx = context(b"", &llm);
        let response = health(&ctx);
        let report = response.body.data.unwrap();
        assert_eq!(report.status, "degraded");
        assert!(report.services.llm_configured);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["services"]["llmConfigured"], true);
        assert!(!report.services.ocr);
        assert_eq!(report.model, "mock-model");
        assert_eq!(llm.calls(), 0);
    }
}

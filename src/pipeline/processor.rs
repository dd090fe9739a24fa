//! Document Processing Orchestrator.
//!
//! Single entry point that drives the diagnostic pipeline for one request:
//! fetch + extract → classify → combine with findings → analyze → assemble
//! the `DiagnosticInsight` record.
//!
//! Engines are injected as trait objects so the processor is fully testable
//! with mock implementations.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AI_MODEL_TAG;
use crate::pipeline::extraction::{
    validate_medical_document, DocumentValidation, ExtractionMetadata, ExtractionResult,
    TextExtractor,
};
use crate::pipeline::structuring::{
    AbnormalFinding, DiagnosticAnalyzer, RiskAssessment, StructuredData, StructuringError,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that end a diagnostic insight request.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("testResultId is required")]
    MissingTestResultId,

    /// Carries the extractor's in-band error message.
    #[error("Failed to extract text: {0}")]
    Extraction(String),

    #[error(transparent)]
    Structuring(#[from] StructuringError),
}

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// Body of a diagnostic insight request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct InsightRequest {
    pub test_result_id: Option<String>,
    pub attachment_url: Option<String>,
    pub test_type: Option<String>,
    pub findings: Option<String>,
}

/// Where the analyzed text came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    /// Wall-clock time for the whole request, in milliseconds.
    pub processing_time: u64,
}

/// The record handed back to the caller for one test result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticInsight {
    pub test_result_id: String,
    pub extracted_text: String,
    pub structured_data: StructuredData,
    pub abnormal_findings: Vec<AbnormalFinding>,
    pub ai_summary: String,
    pub risk_assessment: RiskAssessment,
    pub processing_status: String,
    pub confidence: f64,
    pub ai_model: String,
    pub source_file: SourceFile,
}

/// A completed insight plus request-level details for the response
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedInsight {
    pub insight: DiagnosticInsight,
    /// Length of the combined text sent for analysis.
    pub text_length: usize,
    /// Extraction metadata when an attachment was processed.
    pub extraction: Option<ExtractionMetadata>,
    pub validation: Option<DocumentValidation>,
}

pub const PROCESSING_COMPLETED: &str = "completed";
const UNKNOWN: &str = "unknown";

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct DocumentProcessor {
    extractor: Box<dyn TextExtractor + Send + Sync>,
    analyzer: DiagnosticAnalyzer,
}

impl DocumentProcessor {
    pub fn new(
        extractor: Box<dyn TextExtractor + Send + Sync>,
        analyzer: DiagnosticAnalyzer,
    ) -> Self {
        Self { extractor, analyzer }
    }

    /// Extraction only, for callers that want the raw text.
    pub fn extract(&self, source_ref: &str) -> ExtractionResult {
        self.extractor.extract(source_ref)
    }

    pub fn analyzer(&self) -> &DiagnosticAnalyzer {
        &self.analyzer
    }

    /// Run the full pipeline for one request.
    ///
    /// At most two network calls are made (download, completion). When there
    /// is neither extracted text nor findings the model is never called.
    pub fn generate_insights(
        &self,
        request: &InsightRequest,
    ) -> Result<ProcessedInsight, ProcessingError> {
        let start = Instant::now();
        let request_id = Uuid::new_v4();

        let test_result_id = request
            .test_result_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ProcessingError::MissingTestResultId)?;

        let _span = tracing::info_span!(
            "generate_insights",
            %request_id,
            test_result_id,
            has_attachment = request.attachment_url.is_some()
        )
        .entered();

        let (extracted_text, extraction, validation) = match non_blank(&request.attachment_url) {
            Some(url) => {
                let result = self.extractor.extract(url);
                if !result.success {
                    let reason = result.error.unwrap_or_else(|| "unknown error".to_string());
                    warn!(error = %reason, "Attachment extraction failed");
                    return Err(ProcessingError::Extraction(reason));
                }

                let validation = validate_medical_document(&result.extracted_text);
                if !validation.is_likely_medical {
                    warn!(
                        confidence = validation.confidence,
                        keyword_matches = validation.keyword_matches,
                        "Document may not be a medical report"
                    );
                }
                (result.extracted_text, Some(result.metadata), Some(validation))
            }
            None => (String::new(), None, None),
        };

        let combined = combine_text(&extracted_text, non_blank(&request.findings));
        if combined.is_empty() {
            return Err(StructuringError::NoContent.into());
        }

        let analysis = self.analyzer.analyze(
            &combined,
            non_blank(&request.test_type),
            non_blank(&request.findings),
        )?;

        let processing_time = start.elapsed().as_millis() as u64;
        let source_file = source_file(extraction.as_ref(), processing_time);

        info!(
            processing_ms = processing_time,
            text_length = combined.len(),
            risk = ?analysis.risk_assessment.level,
            "Diagnostic insight generated"
        );

        Ok(ProcessedInsight {
            insight: DiagnosticInsight {
                test_result_id: test_result_id.to_string(),
                extracted_text,
                structured_data: analysis.structured_data,
                abnormal_findings: analysis.abnormal_findings,
                ai_summary: analysis.ai_summary,
                risk_assessment: analysis.risk_assessment,
                processing_status: PROCESSING_COMPLETED.to_string(),
                confidence: analysis.confidence,
                ai_model: AI_MODEL_TAG.to_string(),
                source_file,
            },
            text_length: combined.len(),
            extraction,
            validation,
        })
    }
}

/// `"{extracted}\n\nAdditional Findings:\n{findings}"`, trimmed. Either part
/// may be absent.
pub fn combine_text(extracted: &str, findings: Option<&str>) -> String {
    match findings {
        Some(findings) => format!("{extracted}\n\nAdditional Findings:\n{findings}")
            .trim()
            .to_string(),
        None => extracted.trim().to_string(),
    }
}

fn source_file(metadata: Option<&ExtractionMetadata>, processing_time: u64) -> SourceFile {
    SourceFile {
        file_name: metadata
            .and_then(|m| m.file_name.clone())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        file_type: metadata
            .and_then(|m| m.file_type)
            .map_or_else(|| UNKNOWN.to_string(), |t| t.to_string()),
        file_size: metadata.and_then(|m| m.file_size).unwrap_or(0),
        processing_time,
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::{
        DocumentExtractor, MockDocumentFetcher, MockOcrEngine, MockPdfExtractor,
        MockPdfPageRenderer,
    };
    use crate::pipeline::structuring::{MockLlmClient, Severity};
    use std::sync::Arc;

    const REPORT: &str = "Patient: Jane Doe\nTest: Fasting Blood Glucose\n\
        Result: Glucose 250 mg/dL (Reference 70-100)";

    const ANALYSIS: &str = r#"{
        "structuredData": {"testValues": [{"parameter": "Glucose", "value": "250", "unit": "mg/dL", "referenceRange": "70-100", "isAbnormal": true}]},
        "abnormalFindings": [{"parameter": "Glucose", "value": "250", "severity": "high", "description": "Elevated"}],
        "aiSummary": "Fasting glucose is well above range.",
        "riskAssessment": {"level": "high", "description": "Possible diabetes"},
        "confidence": 0.85
    }"#;

    fn processor(bytes: &[u8], llm: &Arc<MockLlmClient>) -> DocumentProcessor {
        let extractor = DocumentExtractor::new(
            Box::new(MockDocumentFetcher::new(bytes.to_vec(), Some("text/plain"))),
            Box::new(MockOcrEngine::new("", 0.0)),
            Box::new(MockPdfExtractor::new(&[])),
            Box::new(MockPdfPageRenderer::new(0)),
        );
        DocumentProcessor::new(
            Box::new(extractor),
            DiagnosticAnalyzer::new(Box::new(Arc::clone(llm))),
        )
    }

    fn request(attachment: Option<&str>, findings: Option<&str>) -> InsightRequest {
        InsightRequest {
            test_result_id: Some("tr-42".into()),
            attachment_url: attachment.map(String::from),
            test_type: Some("Glucose".into()),
            findings: findings.map(String::from),
        }
    }

    #[test]
    fn plain_text_attachment_end_to_end() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let processor = processor(REPORT.as_bytes(), &llm);

        let processed = processor
            .generate_insights(&request(Some("https://files.example/report.txt"), None))
            .unwrap();
        let insight = &processed.insight;

        assert_eq!(llm.calls(), 1);
        assert_eq!(insight.test_result_id, "tr-42");
        assert_eq!(insight.extracted_text, REPORT);
        assert_eq!(insight.processing_status, "completed");
        assert_eq!(insight.ai_model, "gemini-1.5-flash");
        assert_eq!(insight.risk_assessment.level, Severity::High);
        assert!(insight.structured_data.test_values[0].is_abnormal);
        assert_eq!(insight.source_file.file_size, REPORT.len() as u64);
        assert_eq!(insight.source_file.file_type, "text");
        assert_eq!(insight.source_file.file_name, "report.txt");
        assert!(processed.validation.is_some());
        assert_eq!(processed.text_length, REPORT.len());
    }

    #[test]
    fn text_report_with_findings_end_to_end() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let processor = processor(REPORT.as_bytes(), &llm);
        let req = InsightRequest {
            test_result_id: Some("tr-1".into()),
            attachment_url: Some("https://files.example/glucose.txt".into()),
            test_type: None,
            findings: Some("patient reports fatigue".into()),
        };

        let processed = processor.generate_insights(&req).unwrap();
        let insight = &processed.insight;

        assert!(processed.validation.unwrap().is_likely_medical);
        assert_eq!(llm.calls(), 1);
        assert_eq!(insight.test_result_id, "tr-1");
        assert_eq!(insight.ai_model, "gemini-1.5-flash");
        assert_eq!(insight.source_file.file_size, REPORT.len() as u64);
        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("patient reports fatigue"));
        assert!(prompt.contains("Glucose 250 mg/dL"));
    }

    #[test]
    fn missing_attachment_and_findings_never_calls_model() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let err = processor(b"", &llm)
            .generate_insights(&request(None, Some("   ")))
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Structuring(StructuringError::NoContent)));
        assert_eq!(err.to_string(), "No content available for analysis");
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn missing_test_result_id_rejected_first() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let mut req = request(Some("https://files.example/report.txt"), None);
        req.test_result_id = Some(" ".into());
        let err = processor(REPORT.as_bytes(), &llm).generate_insights(&req).unwrap_err();
        assert!(matches!(err, ProcessingError::MissingTestResultId));
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn findings_only_request_uses_unknown_source() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let processed = processor(b"", &llm)
            .generate_insights(&request(None, Some("Polyuria and thirst")))
            .unwrap();

        assert_eq!(processed.insight.extracted_text, "");
        assert_eq!(processed.insight.source_file.file_name, "unknown");
        assert_eq!(processed.insight.source_file.file_type, "unknown");
        assert_eq!(processed.insight.source_file.file_size, 0);
        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("Additional Findings:\nPolyuria and thirst"));
    }

    #[test]
    fn failed_download_is_extraction_error() {
        let llm = Arc::new(MockLlmClient::new(ANALYSIS));
        let extractor = DocumentExtractor::new(
            Box::new(MockDocumentFetcher::with_status(404)),
            Box::new(MockOcrEngine::new("", 0.0)),
            Box::new(MockPdfExtractor::new(&[])),
            Box::new(MockPdfPageRenderer::new(0)),
        );
        let processor = DocumentProcessor::new(
            Box::new(extractor),
            DiagnosticAnalyzer::new(Box::new(Arc::clone(&llm))),
        );

        let err = processor
            .generate_insights(&request(Some("https://files.example/missing.pdf"), None))
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Extraction(_)));
        assert!(err.to_string().starts_with("Failed to extract text: "));
        assert_eq!(llm.calls(), 0);
    }

    #[test]
    fn upstream_failure_propagates() {
        let llm = Arc::new(MockLlmClient::failing(500, "overloaded"));
        let err = processor(REPORT.as_bytes(), &llm)
            .generate_insights(&request(Some("https://files.example/report.txt"), None))
            .unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Structuring(StructuringError::UpstreamStatus { status: 500, .. })
        ));
    }

    #[test]
    fn combine_text_shapes() {
        assert_eq!(combine_text("  abc  ", None), "abc");
        assert_eq!(combine_text("", Some("note")), "Additional Findings:\nnote");
        assert_eq!(
            combine_text("abc", Some("note")),
            "abc\n\nAdditional Findings:\nnote"
        );
        assert_eq!(combine_text(" ", None), "");
    }
}

use super::parser::parse_analysis_response;
use super::prompt::{build_diagnostic_prompt, DIAGNOSTIC_PROFILE};
use super::types::{LlmClient, StructuredAnalysis};
use super::StructuringError;

/// Orchestrates one diagnostic analysis:
/// prompt → LLM → parse → normalize.
pub struct DiagnosticAnalyzer {
    llm: Box<dyn LlmClient + Send + Sync>,
}

impl DiagnosticAnalyzer {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>) -> Self {
        Self { llm }
    }

    /// Analyze report text with optional test type and clinician findings.
    ///
    /// Blank text is rejected before any upstream call. Upstream errors are
    /// returned unchanged; a malformed model response is not an error and
    /// produces a low-confidence fallback analysis.
    pub fn analyze(
        &self,
        report_text: &str,
        test_type: Option<&str>,
        findings: Option<&str>,
    ) -> Result<StructuredAnalysis, StructuringError> {
        let _span = tracing::info_span!(
            "analyze",
            model = %self.llm.model(),
            text_length = report_text.len()
        )
        .entered();

        if report_text.trim().is_empty() {
            return Err(StructuringError::NoContent);
        }

        let prompt = build_diagnostic_prompt(report_text, test_type, findings);
        let response = self.llm.complete(&prompt, &DIAGNOSTIC_PROFILE)?;

        let outcome = parse_analysis_response(&response);
        if outcome.is_fallback() {
            tracing::warn!(
                response_length = response.len(),
                "Model response could not be parsed, returning fallback analysis"
            );
        }

        let analysis = outcome.into_analysis();
        tracing::info!(
            test_values = analysis.structured_data.test_values.len(),
            abnormal_findings = analysis.abnormal_findings.len(),
            risk = ?analysis.risk_assessment.level,
            confidence = analysis.confidence,
            "Diagnostic analysis complete"
        );

        Ok(analysis)
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::structuring::client::MockLlmClient;
    use crate::pipeline::structuring::types::Severity;
    use std::sync::Arc;

    fn analyzer(mock: &Arc<MockLlmClient>) -> DiagnosticAnalyzer {
        DiagnosticAnalyzer::new(Box::new(Arc::clone(mock)))
    }

    #[test]
    fn analyze_returns_normalized_analysis() {
        let mock = Arc::new(MockLlmClient::new(
            r#"{"aiSummary":"Elevated glucose","abnormalFindings":[{"parameter":"Glucose","value":"250","severity":"high"}],"riskAssessment":{"level":"moderate","description":"Follow up"},"confidence":0.8}"#,
        ));
        let analysis = analyzer(&mock)
            .analyze("Glucose 250 mg/dL", Some("Metabolic panel"), None)
            .unwrap();

        assert_eq!(analysis.ai_summary, "Elevated glucose");
        assert_eq!(analysis.abnormal_findings[0].severity, Severity::High);
        assert_eq!(analysis.risk_assessment.level, Severity::Moderate);
        assert_eq!(analysis.ai_model, "gemini-1.5-flash");
        assert_eq!(mock.calls(), 1);

        let prompt = mock.last_prompt().unwrap();
        assert!(prompt.contains("Glucose 250 mg/dL"));
        assert!(prompt.contains("- Test Type: Metabolic panel"));
        assert!(prompt.contains("- Clinical Findings: Not provided"));
    }

    #[test]
    fn blank_text_rejected_without_upstream_call() {
        let mock = Arc::new(MockLlmClient::new("{}"));
        let err = analyzer(&mock).analyze("  \n\t ", None, None).unwrap_err();
        assert!(matches!(err, StructuringError::NoContent));
        assert_eq!(mock.calls(), 0);
    }

    #[test]
    fn upstream_error_surfaces_without_retry() {
        let mock = Arc::new(MockLlmClient::failing(500, "boom"));
        let err = analyzer(&mock).analyze("Glucose 95", None, None).unwrap_err();
        assert!(matches!(err, StructuringError::UpstreamStatus { status: 500, .. }));
        assert_eq!(mock.calls(), 1);
    }

    #[test]
    fn unparseable_response_is_fallback_not_error() {
        let mock = Arc::new(MockLlmClient::new("Sorry, I can't help with that."));
        let analysis = analyzer(&mock).analyze("Glucose 95", None, None).unwrap();
        assert!((analysis.confidence - 0.1).abs() < f64::EPSILON);
        assert_eq!(analysis.risk_assessment.level, Severity::Low);
    }
}

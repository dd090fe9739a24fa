use serde::{Deserialize, Serialize};

use super::StructuringError;

/// One measured parameter from a report, in report order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestValue {
    pub parameter: String,
    pub value: String,
    pub unit: String,
    pub reference_range: String,
    pub is_abnormal: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub test_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaboratoryInfo {
    pub name: String,
    pub address: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructuredData {
    pub test_values: Vec<TestValue>,
    pub patient_info: PatientInfo,
    pub laboratory_info: LaboratoryInfo,
}

/// Severity scale shared by findings and overall risk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    /// Case-insensitive parse of `low|moderate|high|critical`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "moderate" => Some(Self::Moderate),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AbnormalFinding {
    pub parameter: String,
    pub value: String,
    pub severity: Severity,
    pub description: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub level: Severity,
    pub description: String,
}

/// Normalized diagnostic analysis of one report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructuredAnalysis {
    pub extracted_text: String,
    pub structured_data: StructuredData,
    pub abnormal_findings: Vec<AbnormalFinding>,
    pub ai_summary: String,
    pub risk_assessment: RiskAssessment,
    pub confidence: f64,
    pub ai_model: String,
}

/// Result of parsing a model response. `Fallback` carries a synthesized
/// low-confidence analysis when the response held no usable JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(StructuredAnalysis),
    Fallback(StructuredAnalysis),
}

impl ParseOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    pub fn into_analysis(self) -> StructuredAnalysis {
        match self {
            Self::Parsed(analysis) | Self::Fallback(analysis) => analysis,
        }
    }

    pub fn analysis_mut(&mut self) -> &mut StructuredAnalysis {
        match self {
            Self::Parsed(analysis) | Self::Fallback(analysis) => analysis,
        }
    }
}

/// Sampling settings and system prompt for one kind of completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionProfile {
    pub system_prompt: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Chat-completion LLM abstraction (allows mocking)
pub trait LlmClient {
    /// Send one prompt, return the model's text. Exactly one upstream
    /// attempt; no retry.
    fn complete(
        &self,
        prompt: &str,
        profile: &CompletionProfile,
    ) -> Result<String, StructuringError>;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;
}

impl<T: LlmClient + ?Sized> LlmClient for std::sync::Arc<T> {
    fn complete(
        &self,
        prompt: &str,
        profile: &CompletionProfile,
    ) -> Result<String, StructuringError> {
        (**self).complete(prompt, profile)
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

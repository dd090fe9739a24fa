//! Response envelopes and request bodies shared by the handlers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiError;
use crate::pipeline::insights::{InsightOptions, MedicationRequest, PatientData};
pub use crate::pipeline::processor::InsightRequest;

/// `{ success, message?, data?, error?, metadata? }` body returned by every
/// handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            metadata: None,
        }
    }

    /// Failure body. `message` and `error` carry the same client-safe text.
    pub fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            error: Some(message.clone()),
            message: Some(message),
            data: None,
            metadata: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A handler's answer: an HTTP-style status plus the envelope body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: Envelope<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(body: Envelope<T>) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl<T> From<ApiError> for ApiResponse<T> {
    fn from(err: ApiError) -> Self {
        Self {
            status: err.status(),
            body: err.into_envelope(),
        }
    }
}

/// Convert a handler result into a response.
pub fn respond<T>(result: Result<Envelope<T>, ApiError>) -> ApiResponse<T> {
    match result {
        Ok(body) => ApiResponse::ok(body),
        Err(err) => err.into(),
    }
}

// ═══════════════════════════════════════════════════════════
// Request bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct OcrExtractRequest {
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidateDocumentRequest {
    pub text: Option<String>,
}

/// Health insight request. Options use the snake_case names clients send.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthInsightRequest {
    pub patient_data: PatientData,
    pub analysis_type: Option<String>,
    pub include_trends: Option<bool>,
    pub include_recommendations: Option<bool>,
}

impl HealthInsightRequest {
    pub fn options(&self) -> InsightOptions {
        let defaults = InsightOptions::default();
        InsightOptions {
            analysis_type: self
                .analysis_type
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(defaults.analysis_type),
            include_trends: self.include_trends.unwrap_or(defaults.include_trends),
            include_recommendations: self
                .include_recommendations
                .unwrap_or(defaults.include_recommendations),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MedicationRecommendationRequest {
    pub patient_data: MedicationRequest,
}

//! Patient-level insight handlers.

use serde_json::{Map, Value};

use super::error::ApiError;
use super::types::{
    respond, ApiResponse, Envelope, HealthInsightRequest, MedicationRecommendationRequest,
};
use super::ApiContext;

pub fn health_insights(
    ctx: &ApiContext,
    request: &HealthInsightRequest,
) -> ApiResponse<Map<String, Value>> {
    if request.patient_data.is_empty() {
        return ApiError::bad_request("Patient data is required").into();
    }

    let insights = ctx
        .health_insights
        .generate(&request.patient_data, &request.options());
    respond(Ok(
        Envelope::ok(insights).with_message("Health insights generated successfully")
    ))
}

pub fn medication_recommendations(
    ctx: &ApiContext,
    request: &MedicationRecommendationRequest,
) -> ApiResponse<Map<String, Value>> {
    if request.patient_data.is_empty() {
        return ApiError::bad_request("Patient data is required for medication recommendations")
            .into();
    }

    let recommendations = ctx.recommender.recommend(&request.patient_data);
    respond(Ok(Envelope::ok(recommendations)
        .with_message("Medication recommendations generated successfully")))
}

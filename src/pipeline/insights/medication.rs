use std::fmt::Write;

use chrono::Utc;
use serde_json::{json, Map, Value};

use super::types::{or_placeholder, Allergy, Condition, Listed, Medication, MedicationRequest};
use super::validation::{ensure_shape, fill_missing, repair_entries, RequiredKey};
use crate::pipeline::structuring::{coerce_confidence, extract_json_object, CompletionProfile, LlmClient};

pub const MEDICATION_SYSTEM_PROMPT: &str = "You are an expert clinical pharmacist AI assistant \
specializing in medication recommendations. Provide safe, evidence-based recommendations while \
considering patient safety above all else.";

pub const MEDICATION_PROFILE: CompletionProfile = CompletionProfile {
    system_prompt: MEDICATION_SYSTEM_PROMPT,
    temperature: 0.3,
    max_tokens: 4000,
};

pub const RECOMMENDATION_DISCLAIMER: &str = "These are AI-generated recommendations for clinical \
consideration only. Final prescribing decisions should always be made by a licensed healthcare \
provider.";

fn default_analysis() -> Value {
    json!({
        "primary_diagnosis": "Unable to determine - insufficient data",
        "severity": "unknown",
        "risk_factors": [],
        "contraindications": [],
    })
}

fn empty_list() -> Value {
    json!([])
}

fn default_follow_up() -> Value {
    json!({
        "timeline": "As soon as possible",
        "parameters_to_monitor": [],
        "red_flags": [],
    })
}

fn not_available() -> Value {
    json!("N/A")
}

const RECOMMENDATION_KEYS: &[RequiredKey] = &[
    RequiredKey { key: "analysis", default: default_analysis },
    RequiredKey { key: "recommendations", default: empty_list },
    RequiredKey { key: "warnings", default: empty_list },
    RequiredKey { key: "follow_up", default: default_follow_up },
];

const MEDICATION_FIELDS: &[RequiredKey] = &[
    RequiredKey { key: "medication_name", default: not_available },
    RequiredKey { key: "dosage", default: not_available },
    RequiredKey { key: "frequency", default: not_available },
    RequiredKey { key: "indication", default: not_available },
    RequiredKey { key: "rationale", default: not_available },
];

/// Medication recommendations for a patient presentation.
///
/// Like the health insight generator this never fails: upstream errors and
/// unusable responses produce a fallback set with `confidence_score = 0.0`.
pub struct MedicationRecommender {
    llm: Box<dyn LlmClient + Send + Sync>,
}

impl MedicationRecommender {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>) -> Self {
        Self { llm }
    }

    pub fn recommend(&self, request: &MedicationRequest) -> Map<String, Value> {
        let _span = tracing::info_span!(
            "medication_recommendations",
            allergies = request.allergies.len(),
            current_medications = request.current_medications.len()
        )
        .entered();

        let prompt = build_medication_prompt(request);
        let response = match self.llm.complete(&prompt, &MEDICATION_PROFILE) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Medication recommendation request failed, using fallback");
                return fallback_recommendations();
            }
        };

        let Some(mut recommendations) = extract_json_object(&response) else {
            tracing::warn!(
                response_length = response.len(),
                "No JSON object in recommendation response, using fallback"
            );
            return fallback_recommendations();
        };

        repair_recommendations(&mut recommendations);
        let count = recommendations
            .get("recommendations")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        tracing::info!(recommendations = count, "Medication recommendations generated");
        recommendations
    }
}

/// Fill required sections, drop non-object recommendations, default the
/// per-medication fields and clamp `confidence_score`.
pub fn repair_recommendations(recommendations: &mut Map<String, Value>) {
    let filled = fill_missing(recommendations, RECOMMENDATION_KEYS);
    if !filled.is_empty() {
        tracing::debug!(filled = ?filled, "Filled missing recommendation sections");
    }
    ensure_shape(recommendations, &RECOMMENDATION_KEYS[1], Value::is_array);
    ensure_shape(recommendations, &RECOMMENDATION_KEYS[2], Value::is_array);

    let dropped = repair_entries(recommendations, "recommendations", MEDICATION_FIELDS);
    if dropped > 0 {
        tracing::warn!(dropped, "Dropped malformed medication recommendations");
    }

    let confidence = coerce_confidence(recommendations.get("confidence_score"));
    recommendations.insert("confidence_score".into(), json!(confidence));
    recommendations
        .entry("generated_at")
        .or_insert_with(|| json!(Utc::now().to_rfc3339()));
    recommendations
        .entry("disclaimer")
        .or_insert_with(|| json!(RECOMMENDATION_DISCLAIMER));
}

pub fn fallback_recommendations() -> Map<String, Value> {
    let fallback = json!({
        "analysis": default_analysis(),
        "recommendations": [{
            "medication_name": "Assessment Required",
            "brand_names": [],
            "dosage": "N/A",
            "frequency": "N/A",
            "duration": "N/A",
            "route": "N/A",
            "indication": "Unable to generate recommendations",
            "rationale": "Insufficient patient data or AI service unavailable",
            "monitoring": "Clinical assessment required",
            "side_effects": [],
            "priority": "primary",
            "estimated_cost": "unknown",
        }],
        "warnings": [{
            "type": "system",
            "message": "AI medication recommendation service is currently unavailable. Please conduct manual assessment.",
            "severity": "high",
        }],
        "lifestyle_recommendations": ["Consult with healthcare provider for proper assessment"],
        "follow_up": {
            "timeline": "As soon as possible",
            "parameters_to_monitor": ["Clinical assessment needed"],
            "red_flags": ["Any worsening symptoms"],
        },
        "confidence_score": 0.0,
        "generated_at": Utc::now().to_rfc3339(),
        "disclaimer": "AI service unavailable. Manual clinical assessment required.",
    });
    match fallback {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn pretty_or(value: &impl serde::Serialize, is_empty: bool, placeholder: &str) -> String {
    if is_empty {
        return placeholder.to_string();
    }
    serde_json::to_string_pretty(value).unwrap_or_else(|_| placeholder.to_string())
}

fn list_or<T>(
    entries: &[Listed<T>],
    describe: impl Fn(&T) -> String,
    placeholder: &str,
) -> String {
    if entries.is_empty() {
        return placeholder.to_string();
    }
    entries
        .iter()
        .map(|entry| match entry {
            Listed::Detailed(detail) => describe(detail),
            Listed::Plain(text) => text.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_medication_prompt(request: &MedicationRequest) -> String {
    let allergies = list_or(
        &request.allergies,
        |a: &Allergy| {
            format!(
                "{} - {}",
                or_placeholder(&a.allergen, "Unknown"),
                or_placeholder(&a.severity, "Unknown severity")
            )
        },
        "No known allergies",
    );
    let history = list_or(
        &request.medical_history,
        |c: &Condition| {
            format!(
                "{} - {}",
                or_placeholder(&c.condition, "Unknown"),
                or_placeholder(&c.diagnosed_date, "Unknown date")
            )
        },
        "No significant medical history",
    );
    let current = list_or(
        &request.current_medications,
        |m: &Medication| {
            format!(
                "{} - {}",
                or_placeholder(&m.name, "Unknown"),
                or_placeholder(&m.dosage, "Unknown dosage")
            )
        },
        "No current medications",
    );

    let mut prompt = String::new();
    let _ = write!(
        prompt,
        r#"
As an expert clinical pharmacist and medical AI assistant, analyze the following comprehensive patient data and provide evidence-based medication recommendations.

PATIENT PROFILE:
- Age: {age}
- Gender: {gender}
- Chief Complaint: {complaint}

CURRENT SYMPTOMS AND PRESENTATION:
{symptoms}

PRE-VISIT TRIAGE RESPONSES:
{triage}

VITAL SIGNS:
{vitals}

KNOWN ALLERGIES (CRITICAL - MUST AVOID):
{allergies}

MEDICAL HISTORY:
{history}

CURRENT MEDICATIONS:
{current}
"#,
        age = or_placeholder(&request.age, "Unknown"),
        gender = or_placeholder(&request.gender, "Unknown"),
        complaint = request.chief_complaint.as_deref().unwrap_or_default(),
        symptoms = pretty_or(
            &request.symptoms,
            request.symptoms.is_empty(),
            "No specific symptoms documented"
        ),
        triage = pretty_or(
            &request.triage_responses,
            request.triage_responses.is_empty(),
            "No triage data available"
        ),
        vitals = pretty_or(
            &request.vital_signs,
            request.vital_signs.is_empty(),
            "No vital signs available"
        ),
    );
    prompt.push_str(RECOMMENDATION_SCHEMA);
    prompt
}

const RECOMMENDATION_SCHEMA: &str = r#"
INSTRUCTIONS:
1. Analyze the patient's condition based on symptoms, triage responses, and medical history
2. Consider drug allergies and contraindications carefully
3. Check for drug-drug interactions with current medications
4. Recommend appropriate medications with proper dosing
5. Include rationale for each recommendation
6. Suggest monitoring parameters if needed
7. Include any warnings or precautions

Provide your response in the following JSON format:
{
    "analysis": {
        "primary_diagnosis": "Most likely diagnosis based on presented data",
        "severity": "mild|moderate|severe",
        "risk_factors": ["list of identified risk factors"],
        "contraindications": ["list of contraindications found"]
    },
    "recommendations": [
        {
            "medication_name": "Generic name of medication",
            "brand_names": ["Common brand names"],
            "dosage": "Recommended dosage",
            "frequency": "How often to take",
            "duration": "Recommended duration",
            "route": "oral|topical|injection|etc",
            "indication": "What this medication treats",
            "rationale": "Why this medication is recommended",
            "monitoring": "What to monitor while on this medication",
            "side_effects": ["Common side effects to watch for"],
            "priority": "primary|secondary|alternative",
            "estimated_cost": "low|moderate|high"
        }
    ],
    "warnings": [
        {
            "type": "allergy|interaction|contraindication|monitoring",
            "message": "Specific warning message",
            "severity": "low|medium|high|critical"
        }
    ],
    "lifestyle_recommendations": [
        "Non-pharmacological recommendations"
    ],
    "follow_up": {
        "timeline": "When to follow up",
        "parameters_to_monitor": ["What to check at follow-up"],
        "red_flags": ["Symptoms that require immediate attention"]
    },
    "confidence_score": 0.85
}

IMPORTANT: Ensure all recommendations are safe given the patient's allergies and current medications. If insufficient data is available for safe recommendations, indicate this in the analysis.
"#;

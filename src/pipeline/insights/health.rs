use std::fmt::Write;

use chrono::Utc;
use serde_json::{json, Map, Value};

use super::types::{or_placeholder, InsightOptions, PatientData, VitalReading};
use super::validation::{ensure_shape, fill_missing, RequiredKey};
use crate::pipeline::structuring::{extract_json_object, CompletionProfile, LlmClient};

/// Readings per vital series included in the prompt.
pub const MAX_READINGS_PER_VITAL: usize = 10;

/// `modelUsed` value on synthesized insights.
pub const FALLBACK_MODEL: &str = "fallback";

pub const HEALTH_SYSTEM_PROMPT: &str = "You are an expert medical AI assistant. You analyze \
patient health data and return trend analysis, personalized tips, a health score and risk \
factors. Always respond with valid JSON only.";

pub const HEALTH_PROFILE: CompletionProfile = CompletionProfile {
    system_prompt: HEALTH_SYSTEM_PROMPT,
    temperature: 0.3,
    max_tokens: 3000,
};

const NA: &str = "N/A";

fn empty_object() -> Value {
    json!({})
}

fn empty_list() -> Value {
    json!([])
}

fn default_health_score() -> Value {
    json!({"overall": 75, "breakdown": default_breakdown()})
}

fn default_overall() -> Value {
    json!(75)
}

fn default_breakdown() -> Value {
    json!({"vitals": 75, "medications": 75, "lifestyle": 75})
}

fn default_trend() -> Value {
    json!("stable")
}

fn default_trend_confidence() -> Value {
    json!(0.6)
}

fn default_trend_summary() -> Value {
    json!("Insufficient data for detailed analysis")
}

fn default_trend_recommendations() -> Value {
    json!(["Continue monitoring", "Consult with healthcare provider"])
}

const INSIGHT_KEYS: &[RequiredKey] = &[
    RequiredKey { key: "trendAnalysis", default: empty_object },
    RequiredKey { key: "personalizedTips", default: empty_list },
    RequiredKey { key: "healthScore", default: default_health_score },
    RequiredKey { key: "riskFactors", default: empty_list },
];

const TREND_KEYS: &[RequiredKey] = &[
    RequiredKey { key: "trend", default: default_trend },
    RequiredKey { key: "confidence", default: default_trend_confidence },
    RequiredKey { key: "summary", default: default_trend_summary },
    RequiredKey { key: "recommendations", default: default_trend_recommendations },
];

const SCORE_KEYS: &[RequiredKey] = &[
    RequiredKey { key: "overall", default: default_overall },
    RequiredKey { key: "breakdown", default: default_breakdown },
];

/// Generates trend analysis, tips, a health score and risk factors from a
/// patient's profile, vitals, medications, conditions and allergies.
///
/// Never fails: an upstream error or an unusable response yields
/// deterministic fallback insights tagged `modelUsed = "fallback"`.
pub struct HealthInsightGenerator {
    llm: Box<dyn LlmClient + Send + Sync>,
}

impl HealthInsightGenerator {
    pub fn new(llm: Box<dyn LlmClient + Send + Sync>) -> Self {
        Self { llm }
    }

    pub fn generate(&self, data: &PatientData, options: &InsightOptions) -> Map<String, Value> {
        let _span = tracing::info_span!(
            "health_insights",
            analysis_type = %options.analysis_type,
            medications = data.medications.len(),
            conditions = data.conditions.len()
        )
        .entered();

        let prompt = build_health_prompt(data, options);
        let response = match self.llm.complete(&prompt, &HEALTH_PROFILE) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Health insight request failed, using fallback");
                return fallback_insights(data, options);
            }
        };

        let Some(mut insights) = extract_json_object(&response) else {
            tracing::warn!(
                response_length = response.len(),
                "Health insight response was not a JSON object, using fallback"
            );
            return fallback_insights(data, options);
        };

        let filled = repair_insights(&mut insights);
        if !filled.is_empty() {
            tracing::debug!(filled = ?filled, "Filled missing insight keys");
        }

        stamp_metadata(&mut insights, self.llm.model(), &options.analysis_type);
        tracing::info!("Health insights generated");
        insights
    }
}

/// Fill missing top-level keys, trend fields and score fields.
/// Returns the top-level keys that were absent.
pub fn repair_insights(insights: &mut Map<String, Value>) -> Vec<&'static str> {
    let filled = fill_missing(insights, INSIGHT_KEYS);
    ensure_shape(insights, &INSIGHT_KEYS[0], Value::is_object);
    ensure_shape(insights, &INSIGHT_KEYS[1], Value::is_array);
    ensure_shape(insights, &INSIGHT_KEYS[2], Value::is_object);
    ensure_shape(insights, &INSIGHT_KEYS[3], Value::is_array);

    if let Some(Value::Object(trends)) = insights.get_mut("trendAnalysis") {
        for trend in trends.values_mut() {
            if let Value::Object(fields) = trend {
                fill_missing(fields, TREND_KEYS);
            }
        }
    }
    if let Some(Value::Object(score)) = insights.get_mut("healthScore") {
        fill_missing(score, SCORE_KEYS);
    }
    filled
}

fn stamp_metadata(insights: &mut Map<String, Value>, model: &str, analysis_type: &str) {
    insights.insert("generatedAt".into(), json!(Utc::now().to_rfc3339()));
    insights.insert("modelUsed".into(), json!(model));
    insights.insert("analysisType".into(), json!(analysis_type));
}

/// Deterministic insights built from which data the patient has.
pub fn fallback_insights(data: &PatientData, options: &InsightOptions) -> Map<String, Value> {
    let mut trends = Map::new();
    for (kind, readings) in data.vitals.series() {
        if !readings.is_empty() {
            trends.insert(
                kind.to_string(),
                json!({
                    "trend": "stable",
                    "confidence": 0.5,
                    "summary": format!("Based on available data, {kind} appears stable."),
                    "recommendations": ["Continue regular monitoring", "Discuss with healthcare provider"],
                }),
            );
        }
    }

    let mut tips = vec![json!({
        "category": "monitoring",
        "priority": "medium",
        "title": "Regular Health Monitoring",
        "description": "Continue tracking your vital signs regularly to maintain awareness of your health status.",
        "actionable": true,
    })];
    if !data.medications.is_empty() {
        tips.push(json!({
            "category": "medication",
            "priority": "high",
            "title": "Medication Adherence",
            "description": "Take all medications as prescribed and report any side effects to your healthcare provider.",
            "actionable": true,
        }));
    }
    if !data.conditions.is_empty() {
        tips.push(json!({
            "category": "lifestyle",
            "priority": "medium",
            "title": "Chronic Condition Management",
            "description": "Follow your treatment plan and maintain regular check-ups for optimal health management.",
            "actionable": true,
        }));
    }

    let mut insights = Map::new();
    insights.insert("trendAnalysis".into(), Value::Object(trends));
    insights.insert("personalizedTips".into(), Value::Array(tips));
    insights.insert(
        "healthScore".into(),
        json!({"overall": 75, "breakdown": {"vitals": 70, "medications": 80, "lifestyle": 75}}),
    );
    insights.insert("riskFactors".into(), json!([]));
    stamp_metadata(&mut insights, FALLBACK_MODEL, &options.analysis_type);
    insights
}

pub fn build_health_prompt(data: &PatientData, options: &InsightOptions) -> String {
    let profile = &data.patient;
    let mut prompt = format!(
        r#"
You are an expert medical AI assistant tasked with analyzing patient health data to provide comprehensive insights, trend analysis, and personalized recommendations.

ANALYSIS TYPE: {analysis_type}

PATIENT PROFILE:
- Age: {age}
- Gender: {gender}
- Blood Type: {blood_type}
- Height: {height}
- Weight: {weight}

VITALS DATA:
"#,
        analysis_type = options.analysis_type,
        age = or_placeholder(&profile.age, NA),
        gender = or_placeholder(&profile.gender, NA),
        blood_type = or_placeholder(&profile.blood_type, NA),
        height = or_placeholder(&profile.height, NA),
        weight = or_placeholder(&profile.weight, NA),
    );

    for (kind, readings) in data.vitals.series() {
        if readings.is_empty() {
            continue;
        }
        let _ = writeln!(prompt, "\n{}:", kind.to_uppercase());
        for reading in readings.iter().take(MAX_READINGS_PER_VITAL) {
            let _ = writeln!(prompt, "  - {}", format_reading(kind, reading));
        }
    }

    if !data.medications.is_empty() {
        prompt.push_str("\nCURRENT MEDICATIONS:\n");
        for med in &data.medications {
            let _ = writeln!(
                prompt,
                "  - {} ({}) - {}",
                or_placeholder(&med.name, NA),
                or_placeholder(&med.dosage, NA),
                or_placeholder(&med.frequency, NA)
            );
            let _ = writeln!(
                prompt,
                "    Purpose: {}, Adherence: {}%",
                or_placeholder(&med.purpose, NA),
                or_placeholder(&med.adherence, NA)
            );
        }
    }

    if !data.conditions.is_empty() {
        prompt.push_str("\nCHRONIC CONDITIONS:\n");
        for condition in &data.conditions {
            let _ = writeln!(
                prompt,
                "  - {} (Status: {})",
                or_placeholder(&condition.condition, NA),
                or_placeholder(&condition.status, NA)
            );
            let _ = writeln!(
                prompt,
                "    Diagnosed: {}",
                or_placeholder(&condition.diagnosed_date, NA)
            );
        }
    }

    if !data.allergies.is_empty() {
        prompt.push_str("\nALLERGIES:\n");
        for allergy in &data.allergies {
            let _ = writeln!(
                prompt,
                "  - {} (Severity: {})",
                or_placeholder(&allergy.allergen, NA),
                or_placeholder(&allergy.severity, NA)
            );
            let _ = writeln!(
                prompt,
                "    Reaction: {}",
                or_placeholder(&allergy.reaction, NA)
            );
        }
    }

    prompt.push_str(INSIGHT_SCHEMA);

    if !options.include_trends {
        prompt.push_str("- Trend analysis is not requested: return an empty \"trendAnalysis\" object.\n");
    }
    if !options.include_recommendations {
        prompt.push_str(
            "- Personalized tips are not requested: return an empty \"personalizedTips\" array.\n",
        );
    }

    prompt.push_str("\nPlease analyze this patient's health data and provide comprehensive insights:\n");
    prompt
}

fn format_reading(kind: &str, reading: &VitalReading) -> String {
    let date = or_placeholder(&reading.date, NA);
    if kind == "bloodPressure" {
        format!(
            "{date}: {}/{} mmHg",
            or_placeholder(&reading.systolic, NA),
            or_placeholder(&reading.diastolic, NA)
        )
    } else {
        format!("{date}: {}", or_placeholder(&reading.value, NA))
    }
}

const INSIGHT_SCHEMA: &str = r#"
ANALYSIS REQUIREMENTS:
Please provide a comprehensive health analysis in the following JSON format:

{
  "trendAnalysis": {
    "<vital>": {
      "trend": "improving|stable|declining|concerning",
      "confidence": 0.0-1.0,
      "summary": "Brief analysis of the trend for this vital",
      "recommendations": ["specific recommendation 1", "specific recommendation 2"]
    }
  },
  "personalizedTips": [
    {
      "category": "medication|lifestyle|diet|exercise|monitoring|general",
      "priority": "high|medium|low",
      "title": "Tip title",
      "description": "Detailed actionable advice",
      "actionable": true|false
    }
  ],
  "healthScore": {
    "overall": 0-100,
    "breakdown": {
      "vitals": 0-100,
      "medications": 0-100,
      "lifestyle": 0-100
    }
  },
  "riskFactors": [
    {
      "condition": "Condition name",
      "riskLevel": "low|moderate|high",
      "factors": ["factor 1", "factor 2"],
      "preventionTips": ["prevention tip 1", "prevention tip 2"]
    }
  ]
}

Use bloodPressure, bloodSugar, heartRate, weight or cholesterol as <vital> keys.

IMPORTANT GUIDELINES:
1. Only analyze vitals that have data available
2. Be specific and actionable in recommendations
3. Consider medication adherence in your analysis
4. Factor in chronic conditions when assessing trends
5. Provide realistic and achievable health tips
6. Base health scores on actual data patterns
7. Identify genuine risk factors based on the patient's profile
8. Use medical knowledge but avoid specific diagnoses
9. Encourage professional medical consultation when appropriate
10. Return ONLY valid JSON format
"#;

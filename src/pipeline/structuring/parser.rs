use serde_json::{Map, Value};

use super::types::{
    AbnormalFinding, LaboratoryInfo, ParseOutcome, PatientInfo, RiskAssessment, Severity,
    StructuredAnalysis, StructuredData, TestValue,
};
use crate::config::AI_MODEL_TAG;

/// Top-level keys of the diagnostic schema. An object with none of them is
/// treated as unrelated JSON.
const ANALYSIS_KEYS: &[&str] = &[
    "structuredData",
    "abnormalFindings",
    "aiSummary",
    "riskAssessment",
    "confidence",
    "extractedText",
];

/// Characters of the raw response quoted in the fallback summary.
const FALLBACK_EXCERPT_CHARS: usize = 500;

const FALLBACK_CONFIDENCE: f64 = 0.1;

/// Parse a model response into a normalized analysis.
///
/// Never fails: a response without a usable JSON object yields
/// [`ParseOutcome::Fallback`] built from the raw text.
pub fn parse_analysis_response(raw: &str) -> ParseOutcome {
    match extract_json_object(raw) {
        Some(object) if ANALYSIS_KEYS.iter().any(|k| object.contains_key(*k)) => {
            ParseOutcome::Parsed(normalize_analysis(&object))
        }
        Some(_) => {
            tracing::warn!("Model JSON has no analysis fields, using fallback");
            ParseOutcome::Fallback(fallback_analysis(raw))
        }
        None => {
            tracing::warn!(
                response_length = raw.len(),
                "No JSON object in model response, using fallback"
            );
            ParseOutcome::Fallback(fallback_analysis(raw))
        }
    }
}

/// Remove a leading ```` ```json ```` / ```` ``` ```` fence and a trailing
/// ```` ``` ```` fence, if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json").or_else(|| text.strip_prefix("```JSON")) {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// The JSON object spanning the first `{` to the last `}` of the
/// (fence-stripped) response, if it parses as an object.
pub fn extract_json_object(raw: &str) -> Option<Map<String, Value>> {
    let text = strip_code_fences(raw);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(object)) => Some(object),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "Embedded JSON failed to parse");
            None
        }
    }
}

/// Stringify a JSON scalar the way a report would print it.
/// `null` and absent values become the empty string.
pub fn coerce_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Truthiness for model-supplied flags: `true`, `"true"`, `"yes"`, or a
/// non-zero number.
pub fn coerce_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes")
        }
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

/// Confidence clamped into `[0, 1]`. Non-numeric input scores 0.
pub fn coerce_confidence(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn object_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    object.get(key).and_then(Value::as_object)
}

fn array_field<'a>(object: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    object
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn normalize_analysis(object: &Map<String, Value>) -> StructuredAnalysis {
    let empty = Map::new();
    let structured = object_field(object, "structuredData").unwrap_or(&empty);
    let risk = object_field(object, "riskAssessment").unwrap_or(&empty);

    StructuredAnalysis {
        extracted_text: coerce_string(object.get("extractedText")),
        structured_data: normalize_structured_data(structured),
        abnormal_findings: array_field(object, "abnormalFindings")
            .iter()
            .filter_map(Value::as_object)
            .filter_map(normalize_finding)
            .collect(),
        ai_summary: coerce_string(object.get("aiSummary")),
        risk_assessment: RiskAssessment {
            level: risk
                .get("level")
                .and_then(Value::as_str)
                .and_then(Severity::parse)
                .unwrap_or(Severity::Low),
            description: coerce_string(risk.get("description")),
        },
        confidence: coerce_confidence(object.get("confidence")),
        ai_model: AI_MODEL_TAG.to_string(),
    }
}

fn normalize_structured_data(data: &Map<String, Value>) -> StructuredData {
    let empty = Map::new();
    let patient = object_field(data, "patientInfo").unwrap_or(&empty);
    let lab = object_field(data, "laboratoryInfo").unwrap_or(&empty);

    StructuredData {
        test_values: array_field(data, "testValues")
            .iter()
            .filter_map(Value::as_object)
            .map(|tv| TestValue {
                parameter: coerce_string(tv.get("parameter")),
                value: coerce_string(tv.get("value")),
                unit: coerce_string(tv.get("unit")),
                reference_range: coerce_string(tv.get("referenceRange")),
                is_abnormal: coerce_bool(tv.get("isAbnormal")),
            })
            .collect(),
        patient_info: PatientInfo {
            name: coerce_string(patient.get("name")),
            age: coerce_string(patient.get("age")),
            gender: coerce_string(patient.get("gender")),
            test_date: coerce_string(patient.get("testDate")),
        },
        laboratory_info: LaboratoryInfo {
            name: coerce_string(lab.get("name")),
            address: coerce_string(lab.get("address")),
            phone: coerce_string(lab.get("phone")),
        },
    }
}

/// Findings without a parameter name are dropped.
fn normalize_finding(finding: &Map<String, Value>) -> Option<AbnormalFinding> {
    let parameter = coerce_string(finding.get("parameter"));
    if parameter.trim().is_empty() {
        return None;
    }
    Some(AbnormalFinding {
        parameter,
        value: coerce_string(finding.get("value")),
        severity: finding
            .get("severity")
            .and_then(Value::as_str)
            .and_then(Severity::parse)
            .unwrap_or(Severity::Moderate),
        description: coerce_string(finding.get("description")),
        recommendation: coerce_string(finding.get("recommendation")),
    })
}

fn fallback_analysis(raw: &str) -> StructuredAnalysis {
    let excerpt: String = raw.chars().take(FALLBACK_EXCERPT_CHARS).collect();
    StructuredAnalysis {
        extracted_text: raw.to_string(),
        structured_data: StructuredData::default(),
        abnormal_findings: Vec::new(),
        ai_summary: format!(
            "AI analysis completed but response formatting failed. Raw response: {excerpt}..."
        ),
        risk_assessment: RiskAssessment {
            level: Severity::Low,
            description: "Unable to determine risk level due to parsing error".to_string(),
        },
        confidence: FALLBACK_CONFIDENCE,
        ai_model: AI_MODEL_TAG.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(raw: &str) -> StructuredAnalysis {
        match parse_analysis_response(raw) {
            ParseOutcome::Parsed(a) => a,
            ParseOutcome::Fallback(a) => panic!("unexpected fallback: {}", a.ai_summary),
        }
    }

    #[test]
    fn embedded_json_with_prose_is_parsed() {
        let raw = r#"Here is the analysis: {"abnormalFindings":[{"parameter":"Glucose","value":"250","severity":"severe"}],"confidence":0.9} Thanks"#;
        let analysis = parsed(raw);

        assert_eq!(analysis.abnormal_findings.len(), 1);
        let finding = &analysis.abnormal_findings[0];
        assert_eq!(finding.parameter, "Glucose");
        assert_eq!(finding.value, "250");
        assert_eq!(finding.severity, Severity::Moderate);
        assert!((analysis.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(analysis.ai_model, AI_MODEL_TAG);
    }

    #[test]
    fn response_without_braces_falls_back() {
        let outcome = parse_analysis_response("I cannot analyze this document.");
        assert!(outcome.is_fallback());
        let analysis = outcome.into_analysis();

        assert!((analysis.confidence - 0.1).abs() < f64::EPSILON);
        assert_eq!(analysis.risk_assessment.level, Severity::Low);
        assert_eq!(
            analysis.risk_assessment.description,
            "Unable to determine risk level due to parsing error"
        );
        assert!(analysis
            .ai_summary
            .starts_with("AI analysis completed but response formatting failed. Raw response: I cannot"));
        assert!(analysis.ai_summary.ends_with("..."));
        assert_eq!(analysis.extracted_text, "I cannot analyze this document.");
        assert!(analysis.abnormal_findings.is_empty());
        assert!(analysis.structured_data.test_values.is_empty());
    }

    #[test]
    fn invalid_json_between_braces_falls_back() {
        assert!(parse_analysis_response("{ not: valid json, }").is_fallback());
    }

    #[test]
    fn unrelated_object_falls_back() {
        assert!(parse_analysis_response(r#"{"error": "quota exceeded"}"#).is_fallback());
    }

    #[test]
    fn fallback_excerpt_limited_to_500_chars() {
        let raw = "é".repeat(800);
        let analysis = parse_analysis_response(&raw).into_analysis();
        let prefix = "AI analysis completed but response formatting failed. Raw response: ";
        let excerpt = analysis
            .ai_summary
            .strip_prefix(prefix)
            .and_then(|s| s.strip_suffix("..."))
            .unwrap();
        assert_eq!(excerpt.chars().count(), 500);
        assert_eq!(analysis.extracted_text, raw);
    }

    #[test]
    fn confidence_clamped_into_unit_interval() {
        assert_eq!(parsed(r#"{"confidence": 1.5}"#).confidence, 1.0);
        assert_eq!(parsed(r#"{"confidence": -0.2}"#).confidence, 0.0);
        assert_eq!(parsed(r#"{"confidence": "high"}"#).confidence, 0.0);
        assert!((parsed(r#"{"confidence": "0.75"}"#).confidence - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn code_fenced_response_is_parsed() {
        let raw = "```json\n{\"aiSummary\": \"All values normal\", \"riskAssessment\": {\"level\": \"LOW\"}}\n```";
        let analysis = parsed(raw);
        assert_eq!(analysis.ai_summary, "All values normal");
        assert_eq!(analysis.risk_assessment.level, Severity::Low);
    }

    #[test]
    fn invalid_risk_level_defaults_to_low() {
        let analysis = parsed(r#"{"riskAssessment": {"level": "extreme", "description": "x"}}"#);
        assert_eq!(analysis.risk_assessment.level, Severity::Low);
        assert_eq!(analysis.risk_assessment.description, "x");
    }

    #[test]
    fn test_values_coerced_and_non_objects_skipped() {
        let raw = json!({
            "structuredData": {
                "testValues": [
                    {"parameter": "Glucose", "value": 250, "unit": "mg/dL", "referenceRange": "70-100", "isAbnormal": "yes"},
                    "garbage",
                    {"parameter": "Sodium", "value": 140.5, "isAbnormal": 0},
                    {"parameter": "Potassium", "value": null, "isAbnormal": 1}
                ],
                "patientInfo": {"name": "Jane Doe", "age": 54},
                "laboratoryInfo": {"phone": null}
            }
        })
        .to_string();
        let data = parsed(&raw).structured_data;

        assert_eq!(data.test_values.len(), 3);
        assert_eq!(data.test_values[0].value, "250");
        assert!(data.test_values[0].is_abnormal);
        assert_eq!(data.test_values[1].value, "140.5");
        assert_eq!(data.test_values[1].unit, "");
        assert!(!data.test_values[1].is_abnormal);
        assert_eq!(data.test_values[2].value, "");
        assert!(data.test_values[2].is_abnormal);
        assert_eq!(data.patient_info.name, "Jane Doe");
        assert_eq!(data.patient_info.age, "54");
        assert_eq!(data.patient_info.gender, "");
        assert_eq!(data.laboratory_info.phone, "");
    }

    #[test]
    fn findings_without_parameter_dropped() {
        let raw = json!({
            "abnormalFindings": [
                {"value": "12"},
                {"parameter": "", "value": "3"},
                {"parameter": "LDL", "value": "190", "severity": "high", "description": "Elevated", "recommendation": "Statin review"},
                42
            ]
        })
        .to_string();
        let findings = parsed(&raw).abnormal_findings;

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].parameter, "LDL");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].recommendation, "Statin review");
    }

    #[test]
    fn missing_sections_default_to_empty() {
        let analysis = parsed(r#"{"aiSummary": "Brief"}"#);
        assert!(analysis.structured_data.test_values.is_empty());
        assert!(analysis.abnormal_findings.is_empty());
        assert_eq!(analysis.extracted_text, "");
        assert_eq!(analysis.confidence, 0.0);
        assert_eq!(analysis.risk_assessment.level, Severity::Low);
    }

    #[test]
    fn strip_fences_variants() {
        assert_eq!(strip_code_fences("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {}  "), "{}");
    }

    #[test]
    fn coerce_bool_variants() {
        assert!(coerce_bool(Some(&json!(true))));
        assert!(coerce_bool(Some(&json!("TRUE"))));
        assert!(coerce_bool(Some(&json!(" yes "))));
        assert!(coerce_bool(Some(&json!(2))));
        assert!(!coerce_bool(Some(&json!("no"))));
        assert!(!coerce_bool(Some(&json!(0.0))));
        assert!(!coerce_bool(Some(&json!(null))));
        assert!(!coerce_bool(None));
    }
}

//! Heuristic check that extracted text looks like a medical document.
//!
//! Advisory only: the processor logs a warning for low scores but still
//! sends the text for analysis.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Vocabulary typical of lab reports and clinical notes. Matched as
/// case-insensitive substrings, each keyword counted once.
const MEDICAL_KEYWORDS: &[&str] = &[
    "patient",
    "doctor",
    "physician",
    "laboratory",
    "test",
    "result",
    "blood",
    "urine",
    "sample",
    "specimen",
    "analysis",
    "report",
    "normal",
    "abnormal",
    "reference",
    "range",
    "value",
    "level",
    "diagnosis",
    "clinical",
    "medical",
    "health",
    "mg/dl",
    "mmol/l",
    "count",
    "hemoglobin",
    "glucose",
    "cholesterol",
    "creatinine",
];

/// Keyword hits at which confidence saturates.
const CONFIDENCE_SATURATION: f32 = 10.0;

/// Keyword hits required (together with a digit) to call text medical.
const MIN_KEYWORD_MATCHES: usize = 3;

static UNIT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(mg/dl|mmol/l|g/dl|µg/ml|iu/l|%)").expect("valid unit regex")
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentValidation {
    pub is_likely_medical: bool,
    pub confidence: f32,
    pub keyword_matches: usize,
    pub has_numbers: bool,
    pub has_medical_units: bool,
    pub text_length: usize,
}

/// Score how likely `text` is a medical document. Pure and total.
pub fn validate_medical_document(text: &str) -> DocumentValidation {
    let lower = text.to_lowercase();

    let keyword_matches = MEDICAL_KEYWORDS
        .iter()
        .filter(|keyword| lower.contains(*keyword))
        .count();

    let has_numbers = text.chars().any(|c| c.is_ascii_digit());
    let has_medical_units = UNIT_PATTERN.is_match(text);
    let confidence = (keyword_matches as f32 / CONFIDENCE_SATURATION).min(1.0);

    DocumentValidation {
        is_likely_medical: keyword_matches >= MIN_KEYWORD_MATCHES && has_numbers,
        confidence,
        keyword_matches,
        has_numbers,
        has_medical_units,
        text_length: text.chars().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_report_is_medical() {
        let v = validate_medical_document("Patient glucose 95 mg/dL, reference range 70-100");
        // patient, glucose, mg/dl, reference, range
        assert_eq!(v.keyword_matches, 5);
        assert!(v.is_likely_medical);
        assert!(v.has_numbers);
        assert!(v.has_medical_units);
        assert!((v.confidence - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn unrelated_text_scores_zero() {
        let v = validate_medical_document("Hello world");
        assert_eq!(v.keyword_matches, 0);
        assert!(!v.is_likely_medical);
        assert_eq!(v.confidence, 0.0);
        assert!(!v.has_numbers);
        assert_eq!(v.text_length, 11);
    }

    #[test]
    fn keywords_without_digits_not_medical() {
        let v = validate_medical_document("Blood test result reported as normal by the physician");
        assert!(v.keyword_matches >= 3);
        assert!(!v.has_numbers);
        assert!(!v.is_likely_medical);
    }

    #[test]
    fn two_keywords_with_digits_not_medical() {
        let v = validate_medical_document("Invoice 42: blood bank donation, sample kit");
        assert_eq!(v.keyword_matches, 2);
        assert!(!v.is_likely_medical);
    }

    #[test]
    fn confidence_saturates_at_one() {
        let text = "patient doctor physician laboratory test result blood urine \
                    sample specimen analysis report 12";
        let v = validate_medical_document(text);
        assert!(v.keyword_matches > 10);
        assert_eq!(v.confidence, 1.0);
    }

    #[test]
    fn keyword_counted_once_regardless_of_repeats() {
        let v = validate_medical_document("glucose glucose GLUCOSE 1");
        assert_eq!(v.keyword_matches, 1);
    }

    #[test]
    fn units_detected_case_insensitively() {
        assert!(validate_medical_document("HbA1c 6.1 %").has_medical_units);
        assert!(validate_medical_document("ALT 40 IU/L").has_medical_units);
        assert!(validate_medical_document("Vit B12 0.4 µg/mL").has_medical_units);
        assert!(!validate_medical_document("Height 180 cm").has_medical_units);
    }

    #[test]
    fn text_length_counts_characters_not_bytes() {
        let v = validate_medical_document("µg");
        assert_eq!(v.text_length, 2);
    }

    #[test]
    fn empty_text_is_not_medical() {
        let v = validate_medical_document("");
        assert!(!v.is_likely_medical);
        assert_eq!(v.text_length, 0);
    }
}

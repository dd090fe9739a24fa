use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A scalar a client may send as text, number, or flag (`"45"` and `45`
/// are both accepted for an age).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Flag(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

/// Render an optional field for a prompt, `placeholder` when absent.
pub fn or_placeholder<T: fmt::Display>(value: &Option<T>, placeholder: &str) -> String {
    match value {
        Some(v) => v.to_string(),
        None => placeholder.to_string(),
    }
}

// ═══════════════════════════════════════════
// Health insight input
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PatientData {
    pub patient: PatientProfile,
    pub vitals: Vitals,
    pub medications: Vec<Medication>,
    pub conditions: Vec<Condition>,
    pub allergies: Vec<Allergy>,
}

impl PatientData {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PatientProfile {
    pub age: Option<FieldValue>,
    pub gender: Option<String>,
    pub blood_type: Option<String>,
    pub height: Option<FieldValue>,
    pub weight: Option<FieldValue>,
}

/// One dated measurement. Blood pressure uses `systolic`/`diastolic`;
/// every other series uses `value`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VitalReading {
    pub date: Option<String>,
    pub value: Option<FieldValue>,
    pub systolic: Option<FieldValue>,
    pub diastolic: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Vitals {
    pub blood_pressure: Vec<VitalReading>,
    pub blood_sugar: Vec<VitalReading>,
    pub heart_rate: Vec<VitalReading>,
    pub weight: Vec<VitalReading>,
    pub cholesterol: Vec<VitalReading>,
}

/// Vital series identifiers, as used for `trendAnalysis` keys.
pub const VITAL_KINDS: [&str; 5] = [
    "bloodPressure",
    "bloodSugar",
    "heartRate",
    "weight",
    "cholesterol",
];

impl Vitals {
    /// Series in `VITAL_KINDS` order, paired with their identifier.
    pub fn series(&self) -> [(&'static str, &[VitalReading]); 5] {
        [
            (VITAL_KINDS[0], self.blood_pressure.as_slice()),
            (VITAL_KINDS[1], self.blood_sugar.as_slice()),
            (VITAL_KINDS[2], self.heart_rate.as_slice()),
            (VITAL_KINDS[3], self.weight.as_slice()),
            (VITAL_KINDS[4], self.cholesterol.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Medication {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub purpose: Option<String>,
    /// Adherence percentage.
    pub adherence: Option<FieldValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Condition {
    pub condition: Option<String>,
    pub status: Option<String>,
    pub diagnosed_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Allergy {
    pub allergen: Option<String>,
    pub severity: Option<String>,
    pub reaction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InsightOptions {
    pub analysis_type: String,
    pub include_trends: bool,
    pub include_recommendations: bool,
}

impl Default for InsightOptions {
    fn default() -> Self {
        Self {
            analysis_type: "comprehensive".to_string(),
            include_trends: true,
            include_recommendations: true,
        }
    }
}

// ═══════════════════════════════════════════
// Medication recommendation input
// ═══════════════════════════════════════════

/// List entry sent either as a structured record or as free text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Listed<T> {
    Detailed(T),
    Plain(String),
}

/// Patient context for a medication recommendation. Field names are
/// snake_case on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MedicationRequest {
    pub age: Option<FieldValue>,
    pub gender: Option<String>,
    pub chief_complaint: Option<String>,
    pub symptoms: Vec<Value>,
    pub allergies: Vec<Listed<Allergy>>,
    pub medical_history: Vec<Listed<Condition>>,
    pub current_medications: Vec<Listed<Medication>>,
    pub vital_signs: Map<String, Value>,
    pub triage_responses: Map<String, Value>,
}

impl MedicationRequest {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patient_data_accepts_camel_case_and_mixed_scalars() {
        let data: PatientData = serde_json::from_value(json!({
            "patient": {"age": 54, "gender": "female", "bloodType": "O+"},
            "vitals": {
                "bloodPressure": [{"date": "2024-03-01", "systolic": 130, "diastolic": "85"}],
                "heartRate": [{"date": "2024-03-01", "value": 72}]
            },
            "medications": [{"name": "Metformin", "adherence": 90}],
            "conditions": [{"condition": "Type 2 diabetes", "diagnosedDate": "2019"}]
        }))
        .unwrap();

        assert_eq!(data.patient.age, Some(FieldValue::from(54)));
        assert_eq!(data.patient.blood_type.as_deref(), Some("O+"));
        assert_eq!(data.vitals.blood_pressure[0].diastolic, Some(FieldValue::from("85")));
        assert_eq!(data.vitals.heart_rate.len(), 1);
        assert!(data.vitals.cholesterol.is_empty());
        assert_eq!(data.conditions[0].diagnosed_date.as_deref(), Some("2019"));
        assert!(!data.is_empty());
    }

    #[test]
    fn empty_object_is_empty_patient_data() {
        let data: PatientData = serde_json::from_value(json!({})).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn medication_request_accepts_plain_and_detailed_entries() {
        let request: MedicationRequest = serde_json::from_value(json!({
            "age": "34",
            "chief_complaint": "Sore throat",
            "allergies": ["penicillin", {"allergen": "sulfa", "severity": "severe"}],
            "current_medications": [{"name": "Lisinopril", "dosage": "10mg"}],
            "vital_signs": {"temperature": 38.4}
        }))
        .unwrap();

        assert_eq!(request.allergies[0], Listed::Plain("penicillin".into()));
        match &request.allergies[1] {
            Listed::Detailed(a) => assert_eq!(a.severity.as_deref(), Some("severe")),
            Listed::Plain(_) => panic!("expected structured allergy"),
        }
        assert_eq!(request.vital_signs["temperature"], json!(38.4));
        assert!(!request.is_empty());
        assert!(MedicationRequest::default().is_empty());
    }

    #[test]
    fn placeholder_used_for_absent_fields() {
        assert_eq!(or_placeholder::<FieldValue>(&None, "N/A"), "N/A");
        assert_eq!(or_placeholder(&Some(FieldValue::from(7)), "N/A"), "7");
    }
}

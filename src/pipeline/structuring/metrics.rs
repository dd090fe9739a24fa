use serde::{Deserialize, Serialize};

use super::types::StructuredData;

/// Quick overview counts for a structured report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetrics {
    pub total_tests: usize,
    pub abnormal_tests: usize,
    pub normal_tests: usize,
    /// Share of abnormal tests, rounded to one decimal. 0 when no tests.
    pub abnormal_percentage: f64,
}

pub fn extract_key_metrics(data: &StructuredData) -> KeyMetrics {
    let total_tests = data.test_values.len();
    let abnormal_tests = data.test_values.iter().filter(|tv| tv.is_abnormal).count();

    let abnormal_percentage = if total_tests > 0 {
        let pct = abnormal_tests as f64 / total_tests as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    } else {
        0.0
    };

    KeyMetrics {
        total_tests,
        abnormal_tests,
        normal_tests: total_tests - abnormal_tests,
        abnormal_percentage,
    }
}

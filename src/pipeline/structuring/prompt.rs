use super::types::CompletionProfile;

pub const DIAGNOSTIC_SYSTEM_PROMPT: &str = "You are a medical AI assistant specializing in \
diagnostic test analysis. You read laboratory and diagnostic reports and return structured \
findings. Always respond with valid JSON only.";

pub const DIAGNOSTIC_PROFILE: CompletionProfile = CompletionProfile {
    system_prompt: DIAGNOSTIC_SYSTEM_PROMPT,
    temperature: 0.3,
    max_tokens: 2000,
};

/// Build the diagnostic analysis prompt for one report.
/// Blank optional context is rendered as "Not specified" / "Not provided".
pub fn build_diagnostic_prompt(
    report_text: &str,
    test_type: Option<&str>,
    findings: Option<&str>,
) -> String {
    let test_type = non_blank(test_type).unwrap_or("Not specified");
    let findings = non_blank(findings).unwrap_or("Not provided");

    format!(
        r#"
You are a medical AI assistant specializing in diagnostic test analysis. Please analyze the following diagnostic report and provide a structured response.

DIAGNOSTIC REPORT TEXT:
{report_text}

ADDITIONAL CONTEXT:
- Test Type: {test_type}
- Clinical Findings: {findings}

INSTRUCTIONS:
Please provide a comprehensive analysis in the following JSON format:

{{
  "extractedText": "cleaned and formatted version of the OCR text",
  "structuredData": {{
    "testValues": [
      {{
        "parameter": "test parameter name",
        "value": "measured value",
        "unit": "unit of measurement",
        "referenceRange": "normal reference range",
        "isAbnormal": true/false
      }}
    ],
    "patientInfo": {{
      "name": "patient name if found",
      "age": "patient age if found",
      "gender": "patient gender if found",
      "testDate": "test date if found"
    }},
    "laboratoryInfo": {{
      "name": "lab name if found",
      "address": "lab address if found",
      "phone": "lab phone if found"
    }}
  }},
  "abnormalFindings": [
    {{
      "parameter": "abnormal parameter name",
      "value": "abnormal value",
      "severity": "low/moderate/high/critical",
      "description": "detailed description of the abnormality",
      "recommendation": "clinical recommendation for this finding"
    }}
  ],
  "aiSummary": "comprehensive natural language summary of the test results, highlighting key findings and their clinical significance",
  "riskAssessment": {{
    "level": "low/moderate/high/critical",
    "description": "overall risk assessment based on all findings"
  }},
  "confidence": 0.85
}}

ANALYSIS GUIDELINES:
1. Extract all numerical test values with their reference ranges
2. Identify any values outside normal ranges
3. Assess clinical significance of abnormal findings
4. Provide severity ratings: low (slightly abnormal), moderate (concerning), high (requires attention), critical (urgent)
5. Generate clear, professional language suitable for both patients and healthcare providers
6. If information is unclear or missing, indicate this appropriately
7. Confidence score should reflect how clearly the data could be extracted and analyzed

Please respond ONLY with the JSON object, no additional text.
"#
    )
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

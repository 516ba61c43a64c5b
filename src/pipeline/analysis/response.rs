//! Strict parsing of the analysis model's completion.
//!
//! The contract is one JSON object, optionally wrapped in a ```json fence
//! (models add one despite instructions). A malformed or non-JSON completion
//! is a hard failure for the whole call — no partial-result extraction.
//! Status and category strings, however, are domain enums and degrade
//! leniently to `unknown`/`other`.

use serde::Deserialize;

use super::AnalysisError;
use crate::models::enums::{MarkerCategory, MarkerStatus};
use crate::models::{AnalysisResults, AnalyzedMarker};

#[derive(Deserialize)]
struct RawAnalysisResponse {
    biomarkers: Vec<RawMarker>,
    summary: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Deserialize)]
struct RawMarker {
    name: String,
    value: ValueOrNumber,
    #[serde(default)]
    unit: String,
    #[serde(default, rename = "referenceRange")]
    reference_range: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Models emit values both as strings and bare numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum ValueOrNumber {
    Text(String),
    Number(f64),
}

impl ValueOrNumber {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", n as i64)
                } else {
                    format!("{n}")
                }
            }
        }
    }
}

/// Parse the completion into `AnalysisResults`.
pub fn parse_analysis_response(completion: &str) -> Result<AnalysisResults, AnalysisError> {
    let json = extract_json_payload(completion);

    let raw: RawAnalysisResponse = serde_json::from_str(json)
        .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

    let markers = raw
        .biomarkers
        .into_iter()
        .map(|m| AnalyzedMarker {
            name: m.name,
            value: m.value.into_string(),
            unit: m.unit,
            reference_range: m.reference_range,
            status: m
                .status
                .as_deref()
                .map(MarkerStatus::from_str_lenient)
                .unwrap_or(MarkerStatus::Unknown),
            category: m
                .category
                .as_deref()
                .map(MarkerCategory::from_str_lenient)
                .unwrap_or(MarkerCategory::Other),
        })
        .collect();

    Ok(AnalysisResults {
        summary: raw.summary,
        markers,
        recommendations: raw.recommendations,
    })
}

/// Strip an optional markdown code fence around the JSON object.
fn extract_json_payload(completion: &str) -> &str {
    let trimmed = completion.trim();

    if let Some(start) = trimmed.find("```json") {
        let body = &trimmed[start + 7..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    } else if let Some(stripped) = trimmed.strip_prefix("```") {
        if let Some(end) = stripped.find("```") {
            return stripped[..end].trim();
        }
    }

    trimmed
}

//! Blood analysis adapter: confirmed biomarker text in, structured
//! `AnalysisResults` out.

use std::sync::Arc;

use super::ollama::LlmClient;
use super::prompt::{build_analysis_prompt, ANALYSIS_SYSTEM_PROMPT};
use super::response::parse_analysis_response;
use super::AnalysisError;
use crate::models::AnalysisResults;

pub struct BloodAnalyzer {
    client: Arc<dyn LlmClient>,
    model: String,
}

impl BloodAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>, model: String) -> Self {
        Self { client, model }
    }

    /// Run the analysis model over the confirmed biomarker lines.
    ///
    /// An empty or malformed completion fails the whole call; nothing is
    /// salvaged from a broken response.
    pub fn analyze(&self, biomarker_text: &str) -> Result<AnalysisResults, AnalysisError> {
        let _span = tracing::info_span!(
            "blood_analysis",
            model = %self.model,
            input_len = biomarker_text.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let prompt = build_analysis_prompt(biomarker_text);
        let completion = self
            .client
            .generate(&self.model, &prompt, ANALYSIS_SYSTEM_PROMPT)?;

        if completion.trim().is_empty() {
            return Err(AnalysisError::EmptyCompletion);
        }

        let results = parse_analysis_response(&completion)?;

        tracing::info!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            markers = results.markers.len(),
            recommendations = results.recommendations.len(),
            "Blood analysis complete"
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::MarkerStatus;
    use crate::pipeline::analysis::ollama::MockLlmClient;

    const VALID_COMPLETION: &str = r#"{
  "biomarkers": [{"name": "Глюкоза", "value": "7.5", "unit": "ммоль/л", "status": "high", "category": "metabolism"}],
  "summary": "Glucose is elevated.",
  "recommendations": ["Repeat fasting glucose"]
}"#;

    #[test]
    fn analyze_returns_structured_results() {
        let analyzer = BloodAnalyzer::new(
            Arc::new(MockLlmClient::new(VALID_COMPLETION)),
            "medgemma:4b".into(),
        );

        let results = analyzer.analyze("Глюкоза: 7.5 ммоль/л").unwrap();
        assert_eq!(results.markers.len(), 1);
        assert_eq!(results.markers[0].status, MarkerStatus::High);
        assert_eq!(results.recommendations, vec!["Repeat fasting glucose"]);
    }

    #[test]
    fn empty_completion_errors() {
        let analyzer = BloodAnalyzer::new(
            Arc::new(MockLlmClient::new("  \n ")),
            "medgemma:4b".into(),
        );
        let err = analyzer.analyze("Глюкоза: 7.5").unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyCompletion));
    }

    #[test]
    fn provider_error_propagates() {
        let analyzer = BloodAnalyzer::new(
            Arc::new(MockLlmClient::failing("overloaded")),
            "medgemma:4b".into(),
        );
        let err = analyzer.analyze("Глюкоза: 7.5").unwrap_err();
        assert!(matches!(err, AnalysisError::Api { .. }));
    }

    #[test]
    fn prose_completion_is_malformed() {
        let analyzer = BloodAnalyzer::new(
            Arc::new(MockLlmClient::new("Everything looks fine to me.")),
            "medgemma:4b".into(),
        );
        let err = analyzer.analyze("Глюкоза: 7.5").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedResponse(_)));
    }
}

//! Prompt construction for the blood-analysis model call.

/// System prompt pinning the JSON output contract. The model sees the
/// confirmed biomarker lines and must return a single JSON object — any
/// deviation is treated as a hard failure by the response parser.
pub const ANALYSIS_SYSTEM_PROMPT: &str = "\
You are a medical laboratory analysis assistant. You receive a list of blood \
biomarker readings, one per line, in the form \"<name>: <value> <unit>\". \
Respond with ONLY a single JSON object, no prose before or after, with this \
exact shape:\n\
{\n\
  \"biomarkers\": [{\"name\": \"...\", \"value\": \"...\", \"unit\": \"...\", \
\"referenceRange\": \"min-max or null\", \"status\": \
\"normal|low|high|critical|unknown\", \"category\": \
\"blood|immunity|coagulation|metabolism|lipids|cardiovascular|kidney|liver|hormonal|other\"}],\n\
  \"summary\": \"2-4 sentence plain-language overview\",\n\
  \"recommendations\": [\"actionable suggestion\", ...]\n\
}\n\
Keep marker names and units exactly as given. Recommendations are lifestyle \
and follow-up guidance, never a diagnosis or prescription.";

/// User prompt embedding the confirmed, serialized biomarker text.
pub fn build_analysis_prompt(biomarker_text: &str) -> String {
    format!(
        "Analyze these blood test results and respond with the JSON object described in your instructions:\n\n{biomarker_text}"
    )
}

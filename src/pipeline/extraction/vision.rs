//! Text extraction from lab-report photos via a vision-capable model.
//!
//! The provider is asked for plain line-oriented text, one marker per line —
//! structuring the rows is this crate's job (the parser's), not the model's.
//! Provider failures and blank completions are hard errors: the caller must
//! offer a retry or a switch to manual text entry, never fabricated data.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ExtractionError;

/// Mime types the adapter accepts from the upload layer.
const ALLOWED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Fallback when the upload layer sends nothing usable.
const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Fixed extraction instruction. Plain text out, one row per marker,
/// reference interval kept in parentheses when the report prints one.
const EXTRACTION_SYSTEM_PROMPT: &str = "\
You are a medical lab report transcriber. Extract EVERY row of the blood test \
in the image as plain text, one line per marker, in the exact form:\n\
<name>: <value> <unit> (референс: <min>-<max>)\n\
Omit the parenthesized part when the report shows no reference interval. \
Keep original marker names and units exactly as printed, including Russian. \
Include handwritten annotations as their own lines. \
Output only the lines — no commentary, no tables, no JSON.";

const EXTRACTION_USER_PROMPT: &str =
    "Transcribe all biomarker rows from this lab report image.";

/// Vision model client abstraction (allows mocking).
///
/// `mime_type` is part of the provider boundary; backends that transmit raw
/// base64 (Ollama) may ignore it.
pub trait VisionClient: Send + Sync {
    fn chat_with_image(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
        image_base64: &str,
        mime_type: &str,
    ) -> Result<String, ExtractionError>;
}

/// Normalize a caller-supplied mime type against the allow-list.
/// Missing or unrecognized values fall back to jpeg — never a rejection.
pub fn normalize_mime_type(mime_type: Option<&str>) -> &'static str {
    match mime_type {
        Some(m) => ALLOWED_MIME_TYPES
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(m.trim()))
            .copied()
            .unwrap_or(DEFAULT_MIME_TYPE),
        None => DEFAULT_MIME_TYPE,
    }
}

/// Text Extraction Adapter: turns a lab-report photo into raw line text.
pub struct LabTextExtractor {
    client: Arc<dyn VisionClient>,
    model: String,
}

impl LabTextExtractor {
    pub fn new(client: Arc<dyn VisionClient>, model: String) -> Self {
        Self { client, model }
    }

    /// Extract line-oriented lab text from a base64-encoded image.
    ///
    /// Errors on provider failure or an empty completion; the result is
    /// never silently substituted.
    pub fn extract_text(
        &self,
        image_base64: &str,
        mime_type: Option<&str>,
    ) -> Result<String, ExtractionError> {
        let mime = normalize_mime_type(mime_type);

        let _span = tracing::info_span!(
            "vision_extract",
            model = %self.model,
            mime,
            image_size = image_base64.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let text = self.client.chat_with_image(
            &self.model,
            EXTRACTION_USER_PROMPT,
            Some(EXTRACTION_SYSTEM_PROMPT),
            image_base64,
            mime,
        )?;

        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyCompletion);
        }

        tracing::info!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            "Vision extraction complete"
        );

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Ollama-backed client
// ---------------------------------------------------------------------------

/// Vision client backed by a local Ollama instance (`/api/chat`).
pub struct OllamaVisionClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaVisionClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<&'a str>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl VisionClient for OllamaVisionClient {
    fn chat_with_image(
        &self,
        model: &str,
        prompt: &str,
        system: Option<&str>,
        image_base64: &str,
        _mime_type: &str,
    ) -> Result<String, ExtractionError> {
        let url = format!("{}/api/chat", self.base_url);

        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
                images: None,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
            images: Some(vec![image_base64]),
        });

        let body = ChatRequest {
            model,
            messages,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                ExtractionError::ProviderUnreachable(self.base_url.clone())
            } else if e.is_timeout() {
                ExtractionError::Timeout(self.timeout_secs)
            } else {
                ExtractionError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ExtractionError::ResponseParsing(e.to_string()))?;

        Ok(parsed.message.content)
    }
}

// ---------------------------------------------------------------------------
// Mock client (testing)
// ---------------------------------------------------------------------------

/// Mock vision client returning a configured response or error.
pub struct MockVisionClient {
    response: Result<String, String>,
}

impl MockVisionClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
        }
    }
}

impl VisionClient for MockVisionClient {
    fn chat_with_image(
        &self,
        _model: &str,
        _prompt: &str,
        _system: Option<&str>,
        _image_base64: &str,
        _mime_type: &str,
    ) -> Result<String, ExtractionError> {
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(msg) => Err(ExtractionError::Api {
                status: 500,
                body: msg.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── normalize_mime_type ──

    #[test]
    fn known_mime_types_pass_through() {
        assert_eq!(normalize_mime_type(Some("image/png")), "image/png");
        assert_eq!(normalize_mime_type(Some("image/webp")), "image/webp");
        assert_eq!(normalize_mime_type(Some("IMAGE/GIF")), "image/gif");
    }

    #[test]
    fn missing_or_unknown_mime_defaults_to_jpeg() {
        assert_eq!(normalize_mime_type(None), "image/jpeg");
        assert_eq!(normalize_mime_type(Some("application/pdf")), "image/jpeg");
        assert_eq!(normalize_mime_type(Some("")), "image/jpeg");
    }

    // ── LabTextExtractor ──

    #[test]
    fn extract_returns_provider_text() {
        let client = Arc::new(MockVisionClient::new(
            "Гемоглобин: 145 г/л (референс: 110-160)\nГлюкоза: 5.2 ммоль/л",
        ));
        let extractor = LabTextExtractor::new(client, "llava:13b".into());

        let text = extractor.extract_text("aGVsbG8=", Some("image/png")).unwrap();
        assert!(text.contains("Гемоглобин"));
        assert!(text.lines().count() == 2);
    }

    #[test]
    fn empty_completion_is_an_error() {
        let client = Arc::new(MockVisionClient::new("   \n  "));
        let extractor = LabTextExtractor::new(client, "llava:13b".into());

        let err = extractor.extract_text("aGVsbG8=", None).unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyCompletion));
    }

    #[test]
    fn provider_failure_propagates() {
        let client = Arc::new(MockVisionClient::failing("model not loaded"));
        let extractor = LabTextExtractor::new(client, "llava:13b".into());

        let err = extractor.extract_text("aGVsbG8=", None).unwrap_err();
        assert!(matches!(err, ExtractionError::Api { status: 500, .. }));
    }

    #[test]
    fn invalid_mime_does_not_reject() {
        let client = Arc::new(MockVisionClient::new("Гемоглобин: 145 г/л"));
        let extractor = LabTextExtractor::new(client, "llava:13b".into());

        // Unknown mime falls back to jpeg and the call still succeeds
        let text = extractor
            .extract_text("aGVsbG8=", Some("text/plain"))
            .unwrap();
        assert!(text.contains("145"));
    }

    #[test]
    fn system_prompt_pins_line_format() {
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("референс"));
        assert!(EXTRACTION_SYSTEM_PROMPT.contains("<name>: <value> <unit>"));
    }
}

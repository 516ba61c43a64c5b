use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "Vitalog";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tracing filter when RUST_LOG is not set
pub fn default_log_filter() -> String {
    "info,vitalog=debug".to_string()
}

/// Get the application data directory
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vitalog")
}

/// Path of the application database
pub fn database_path() -> PathBuf {
    app_data_dir().join("vitalog.db")
}

/// Where the AI providers live and which models to call.
///
/// One value type covers both provider calls: the vision model transcribes
/// lab photos, the analysis model interprets confirmed biomarker lines.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub base_url: String,
    pub vision_model: String,
    pub analysis_model: String,
    /// Bounded timeout applied to every provider call.
    pub timeout_secs: u64,
}

impl AiConfig {
    /// Local Ollama instance with a 5-minute call timeout.
    pub fn default_local() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            vision_model: "llava:13b".to_string(),
            analysis_model: "medgemma:4b".to_string(),
            timeout_secs: 300,
        }
    }
}

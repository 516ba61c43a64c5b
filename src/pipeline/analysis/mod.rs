pub mod analyzer;
pub mod ollama;
pub mod prompt;
pub mod response;

pub use analyzer::*;
pub use ollama::*;
pub use response::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis provider not reachable at {0}")]
    ProviderUnreachable(String),

    #[error("Analysis request timed out after {0}s")]
    Timeout(u64),

    #[error("Analysis provider error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Analysis provider returned an empty completion")]
    EmptyCompletion,

    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

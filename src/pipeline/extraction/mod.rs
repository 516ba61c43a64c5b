pub mod preprocess;
pub mod vision;

pub use preprocess::*;
pub use vision::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Vision provider not reachable at {0}")]
    ProviderUnreachable(String),

    #[error("Vision request timed out after {0}s")]
    Timeout(u64),

    #[error("Vision provider error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Vision provider returned an empty completion")]
    EmptyCompletion,

    #[error("Failed to parse provider response: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

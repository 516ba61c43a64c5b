pub mod extraction;
pub mod parsing;
pub mod review;
pub mod analysis;
pub mod store;
pub mod orchestrator;

pub use orchestrator::{AnalysisSession, OrchestratorError, ProcessingStage};
pub use review::{ConfirmedFields, FieldPatch, ReviewBuffer, ReviewError};

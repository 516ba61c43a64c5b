//! Vitalog — blood-test ingestion and biomarker analysis backend.
//!
//! The pipeline turns a lab-report photo or pasted text into classified,
//! persisted biomarker readings with AI-generated recommendations:
//! compress → extract → parse → review (human-in-the-loop) → analyze → save.
//! Auth, profile CRUD, and the web UI are external collaborators.

pub mod config;
pub mod models;
pub mod db;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the hosting process.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Vitalog starting v{}", config::APP_VERSION);
}

//! Analysis Orchestrator — drives one ingestion session through the staged
//! pipeline: upload → extract → parse/review → analyze → save.
//!
//! The stage machine is explicit and decoupled from any rendering concern;
//! progress percentages are a derived projection of the current stage, not
//! stored data. Every failure resets the stage to `Idle` and leaves the
//! `BloodAnalysis` row at `pending`, so confirming again retries the
//! analyze/save steps without repeating the upload or extraction.

use std::sync::Arc;

use base64::Engine as _;
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use super::analysis::{AnalysisError, BloodAnalyzer};
use super::extraction::preprocess::{compress_for_upload, DEFAULT_JPEG_QUALITY};
use super::extraction::vision::LabTextExtractor;
use super::extraction::ExtractionError;
use super::parsing::parse_lab_text;
use super::review::{ReviewBuffer, ReviewError};
use super::store::commit_results;
use crate::db::repository::analysis as analysis_repo;
use crate::db::DatabaseError;
use crate::models::BloodAnalysis;

// ---------------------------------------------------------------------------
// Stage machine
// ---------------------------------------------------------------------------

/// Stages of one ingestion session. Strictly sequential; any failure returns
/// to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    Idle,
    Uploading,
    Recognizing,
    Analyzing,
    Saving,
    Complete,
}

impl ProcessingStage {
    /// UI progress projection. Derived, never source-of-truth.
    pub fn progress_percent(&self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Uploading => 40,
            Self::Recognizing => 65,
            Self::Analyzing => 80,
            Self::Saving => 90,
            Self::Complete => 100,
        }
    }
}

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Auth collaborator: answers whether the acting user session is still
/// valid. Session mechanics themselves live outside this crate.
pub trait SessionValidator: Send + Sync {
    fn is_valid(&self, user_id: &str) -> bool;
}

/// Validator for deployments where the session was checked upstream.
pub struct AlwaysValidSessions;

impl SessionValidator for AlwaysValidSessions {
    fn is_valid(&self, _user_id: &str) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Session-level failures, one variant per recovery path: retry the call,
/// switch to manual entry, fix the staged fields, or re-authenticate.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Text extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Review incomplete: {0}")]
    Review(#[from] ReviewError),

    #[error("Saving failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Session expired — sign in again to continue")]
    SessionExpired,

    #[error("Another operation is already in flight for this analysis")]
    OperationInFlight,

    #[error("No analysis in progress — start a photo or text session first")]
    NoActiveAnalysis,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One user-visible ingestion session. Exactly one orchestration runs per
/// session; the UI must not submit again while the stage is not `Idle`.
pub struct AnalysisSession<'a> {
    conn: &'a Connection,
    extractor: LabTextExtractor,
    analyzer: BloodAnalyzer,
    sessions: Arc<dyn SessionValidator>,
    stage: ProcessingStage,
    analysis_id: Option<Uuid>,
}

impl<'a> AnalysisSession<'a> {
    pub fn new(
        conn: &'a Connection,
        extractor: LabTextExtractor,
        analyzer: BloodAnalyzer,
        sessions: Arc<dyn SessionValidator>,
    ) -> Self {
        Self {
            conn,
            extractor,
            analyzer,
            sessions,
            stage: ProcessingStage::Idle,
            analysis_id: None,
        }
    }

    pub fn stage(&self) -> ProcessingStage {
        self.stage
    }

    pub fn progress_percent(&self) -> u8 {
        self.stage.progress_percent()
    }

    pub fn analysis_id(&self) -> Option<Uuid> {
        self.analysis_id
    }

    /// Start a photo ingestion: create the pending analysis row, compress
    /// and encode the image, extract text, parse, and open the review stage.
    ///
    /// On extraction failure the stage returns to `Idle` and the caller may
    /// switch the same analysis to manual text entry.
    pub fn start_photo(
        &mut self,
        user_id: &str,
        image_bytes: &[u8],
        mime_type: Option<&str>,
    ) -> Result<ReviewBuffer, OrchestratorError> {
        self.guard_idle()?;
        self.check_session(user_id)?;

        self.stage = ProcessingStage::Uploading;
        let analysis = BloodAnalysis::new(user_id);
        analysis_repo::insert_analysis(self.conn, &analysis).map_err(|e| self.fail(e))?;
        self.analysis_id = Some(analysis.id);

        let compressed = compress_for_upload(image_bytes, DEFAULT_JPEG_QUALITY);
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&compressed);

        self.stage = ProcessingStage::Recognizing;
        let text = self
            .extractor
            .extract_text(&image_base64, mime_type)
            .map_err(|e| self.fail(e))?;

        let outcome = parse_lab_text(&text);
        tracing::info!(
            analysis_id = %analysis.id,
            parsed = outcome.fields.len(),
            skipped = outcome.skipped_lines,
            "Photo session ready for review"
        );

        Ok(ReviewBuffer::from_outcome(outcome))
    }

    /// Start a manual text ingestion: create the pending analysis row, parse
    /// the pasted text, and open the review stage.
    pub fn start_text(
        &mut self,
        user_id: &str,
        text: &str,
    ) -> Result<ReviewBuffer, OrchestratorError> {
        self.guard_idle()?;
        self.check_session(user_id)?;

        self.stage = ProcessingStage::Uploading;
        let analysis = BloodAnalysis::new(user_id);
        analysis_repo::insert_analysis(self.conn, &analysis).map_err(|e| self.fail(e))?;
        self.analysis_id = Some(analysis.id);

        let outcome = parse_lab_text(text);
        tracing::info!(
            analysis_id = %analysis.id,
            parsed = outcome.fields.len(),
            skipped = outcome.skipped_lines,
            "Text session ready for review"
        );

        Ok(ReviewBuffer::from_outcome(outcome))
    }

    /// Confirm the reviewed fields, run the analysis model, and persist.
    ///
    /// A blank buffer is a local input error: the review stage stays open.
    /// Analysis/persistence failures reset to `Idle` with the row still
    /// `pending`; calling this again retries without re-uploading.
    pub fn confirm_and_analyze(
        &mut self,
        buffer: &ReviewBuffer,
    ) -> Result<BloodAnalysis, OrchestratorError> {
        match self.stage {
            ProcessingStage::Analyzing | ProcessingStage::Saving => {
                return Err(OrchestratorError::OperationInFlight)
            }
            ProcessingStage::Complete => return Err(OrchestratorError::NoActiveAnalysis),
            _ => {}
        }
        let analysis_id = self.analysis_id.ok_or(OrchestratorError::NoActiveAnalysis)?;

        // Local input error — review stays open, no stage reset
        let confirmed = buffer.confirm()?;

        self.stage = ProcessingStage::Analyzing;
        let serialized = confirmed.serialize();
        let results = self.analyzer.analyze(&serialized).map_err(|e| self.fail(e))?;

        self.stage = ProcessingStage::Saving;
        commit_results(self.conn, &analysis_id, &confirmed.fields)
            .map_err(|e| self.fail(e))?;
        analysis_repo::mark_analyzed(self.conn, &analysis_id, &results, chrono::Utc::now())
            .map_err(|e| self.fail(e))?;

        let analysis = analysis_repo::get_analysis(self.conn, &analysis_id)
            .map_err(|e| self.fail(e))?;

        self.stage = ProcessingStage::Complete;
        tracing::info!(
            analysis_id = %analysis_id,
            markers = results.markers.len(),
            "Analysis session complete"
        );

        Ok(analysis)
    }

    /// Abandon the session before confirmation. Staged fields are the
    /// caller's to drop; nothing was persisted beyond the pending row.
    pub fn cancel(&mut self) {
        self.stage = ProcessingStage::Idle;
        self.analysis_id = None;
    }

    /// Return to `Idle` after `Complete` so a new session can start.
    pub fn reset(&mut self) {
        self.cancel();
    }

    fn guard_idle(&self) -> Result<(), OrchestratorError> {
        if self.stage != ProcessingStage::Idle {
            return Err(OrchestratorError::OperationInFlight);
        }
        Ok(())
    }

    fn check_session(&mut self, user_id: &str) -> Result<(), OrchestratorError> {
        if !self.sessions.is_valid(user_id) {
            self.stage = ProcessingStage::Idle;
            return Err(OrchestratorError::SessionExpired);
        }
        Ok(())
    }

    /// Reset to `Idle` and convert the stage error. The analysis row, if
    /// created, remains `pending` — safe to retry.
    fn fail<E: Into<OrchestratorError>>(&mut self, err: E) -> OrchestratorError {
        self.stage = ProcessingStage::Idle;
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::biomarker;
    use crate::models::enums::{AnalysisStatus, MarkerStatus};
    use crate::pipeline::analysis::ollama::{LlmClient, MockLlmClient};
    use crate::pipeline::extraction::vision::{MockVisionClient, VisionClient};

    const AI_COMPLETION: &str = r#"{
  "biomarkers": [
    {"name": "Глюкоза", "value": "7.5", "unit": "ммоль/л", "status": "high", "category": "metabolism"},
    {"name": "Холестерин", "value": "4.0", "unit": "ммоль/л", "status": "normal", "category": "lipids"}
  ],
  "summary": "Glucose is elevated; cholesterol is within range.",
  "recommendations": ["Reduce simple carbohydrates"]
}"#;

    fn make_session<'a>(
        conn: &'a Connection,
        vision: Arc<dyn VisionClient>,
        llm: Arc<dyn LlmClient>,
    ) -> AnalysisSession<'a> {
        AnalysisSession::new(
            conn,
            LabTextExtractor::new(vision, "llava:13b".into()),
            BloodAnalyzer::new(llm, "medgemma:4b".into()),
            Arc::new(AlwaysValidSessions),
        )
    }

    #[test]
    fn text_session_end_to_end() {
        let conn = open_memory_database().unwrap();
        let mut session = make_session(
            &conn,
            Arc::new(MockVisionClient::new("unused")),
            Arc::new(MockLlmClient::new(AI_COMPLETION)),
        );

        let buffer = session
            .start_text("user-1", "Глюкоза: 7.5 ммоль/л\nХолестерин: 4.0 ммоль/л")
            .unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.fields()[0].status, MarkerStatus::High);
        assert_eq!(buffer.fields()[1].status, MarkerStatus::Normal);

        let analysis = session.confirm_and_analyze(&buffer).unwrap();
        assert_eq!(analysis.status, AnalysisStatus::Analyzed);
        assert!(analysis.analyzed_at.is_some());
        let results = analysis.results.unwrap();
        assert_eq!(results.markers.len(), 2);
        assert_eq!(results.recommendations.len(), 1);

        // Two definitions and two result rows persisted
        assert_eq!(biomarker::list_definitions(&conn).unwrap().len(), 2);
        assert_eq!(
            biomarker::list_results_by_analysis(&conn, &analysis.id)
                .unwrap()
                .len(),
            2
        );

        assert_eq!(session.stage(), ProcessingStage::Complete);
        assert_eq!(session.progress_percent(), 100);
    }

    #[test]
    fn photo_session_opens_review_with_parsed_fields() {
        let conn = open_memory_database().unwrap();
        let mut session = make_session(
            &conn,
            Arc::new(MockVisionClient::new(
                "Гемоглобин: 145 г/л (референс: 110-160)\nШум строки без значения",
            )),
            Arc::new(MockLlmClient::new(AI_COMPLETION)),
        );

        let buffer = session
            .start_photo("user-1", b"raw-photo-bytes", Some("image/png"))
            .unwrap();
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.fields()[0].name, "Гемоглобин");
        assert_eq!(session.stage(), ProcessingStage::Recognizing);
        assert_eq!(session.progress_percent(), 65);
    }

    #[test]
    fn extraction_failure_resets_to_idle_row_stays_pending() {
        let conn = open_memory_database().unwrap();
        let mut session = make_session(
            &conn,
            Arc::new(MockVisionClient::failing("vision model offline")),
            Arc::new(MockLlmClient::new(AI_COMPLETION)),
        );

        let err = session
            .start_photo("user-1", b"raw-photo-bytes", None)
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Extraction(_)));
        assert_eq!(session.stage(), ProcessingStage::Idle);

        // The created row is still pending and no results exist
        let id = session.analysis_id().unwrap();
        let analysis = analysis_repo::get_analysis(&conn, &id).unwrap();
        assert_eq!(analysis.status, AnalysisStatus::Pending);
        assert!(biomarker::list_results_by_analysis(&conn, &id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn malformed_ai_response_leaves_row_pending() {
        let conn = open_memory_database().unwrap();
        let mut session = make_session(
            &conn,
            Arc::new(MockVisionClient::new("unused")),
            Arc::new(MockLlmClient::new("not json at all")),
        );

        let buffer = session.start_text("user-1", "Глюкоза: 7.5 ммоль/л").unwrap();
        let err = session.confirm_and_analyze(&buffer).unwrap_err();
        assert!(matches!(err, OrchestratorError::Analysis(_)));
        assert_eq!(session.stage(), ProcessingStage::Idle);

        let id = session.analysis_id().unwrap();
        let analysis = analysis_repo::get_analysis(&conn, &id).unwrap();
        assert_eq!(analysis.status, AnalysisStatus::Pending);
        assert!(biomarker::list_results_by_analysis(&conn, &id)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn blank_buffer_keeps_review_open() {
        let conn = open_memory_database().unwrap();
        let mut session = make_session(
            &conn,
            Arc::new(MockVisionClient::new("unused")),
            Arc::new(MockLlmClient::new(AI_COMPLETION)),
        );

        let mut buffer = session.start_text("user-1", "шум\nбез маркеров").unwrap();
        assert!(buffer.is_empty());
        buffer.add();

        let err = session.confirm_and_analyze(&buffer).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Review(ReviewError::NoFields)
        ));
        // Input error recovered locally — the session is not torn down
        assert_eq!(session.stage(), ProcessingStage::Uploading);
    }

    #[test]
    fn second_start_while_review_open_is_rejected() {
        let conn = open_memory_database().unwrap();
        let mut session = make_session(
            &conn,
            Arc::new(MockVisionClient::new("unused")),
            Arc::new(MockLlmClient::new(AI_COMPLETION)),
        );

        session.start_text("user-1", "Глюкоза: 7.5").unwrap();
        let err = session.start_text("user-1", "Глюкоза: 7.5").unwrap_err();
        assert!(matches!(err, OrchestratorError::OperationInFlight));
    }

    #[test]
    fn expired_session_is_distinct_and_fatal() {
        struct ExpiredSessions;
        impl SessionValidator for ExpiredSessions {
            fn is_valid(&self, _user_id: &str) -> bool {
                false
            }
        }

        let conn = open_memory_database().unwrap();
        let mut session = AnalysisSession::new(
            &conn,
            LabTextExtractor::new(Arc::new(MockVisionClient::new("unused")), "llava:13b".into()),
            BloodAnalyzer::new(Arc::new(MockLlmClient::new(AI_COMPLETION)), "medgemma:4b".into()),
            Arc::new(ExpiredSessions),
        );

        let err = session.start_text("user-1", "Глюкоза: 7.5").unwrap_err();
        assert!(matches!(err, OrchestratorError::SessionExpired));
        assert_eq!(session.stage(), ProcessingStage::Idle);
        // Nothing was created
        assert!(session.analysis_id().is_none());
    }

    #[test]
    fn cancel_discards_staging_without_side_effects() {
        let conn = open_memory_database().unwrap();
        let mut session = make_session(
            &conn,
            Arc::new(MockVisionClient::new("unused")),
            Arc::new(MockLlmClient::new(AI_COMPLETION)),
        );

        session.start_text("user-1", "Глюкоза: 7.5 ммоль/л").unwrap();
        let id = session.analysis_id().unwrap();
        session.cancel();

        assert_eq!(session.stage(), ProcessingStage::Idle);
        assert!(session.analysis_id().is_none());
        // No biomarker rows were written; the pending row simply remains
        assert!(biomarker::list_results_by_analysis(&conn, &id)
            .unwrap()
            .is_empty());
        let analysis = analysis_repo::get_analysis(&conn, &id).unwrap();
        assert_eq!(analysis.status, AnalysisStatus::Pending);
    }

    #[test]
    fn confirm_without_session_is_rejected() {
        let conn = open_memory_database().unwrap();
        let mut session = make_session(
            &conn,
            Arc::new(MockVisionClient::new("unused")),
            Arc::new(MockLlmClient::new(AI_COMPLETION)),
        );

        let buffer = ReviewBuffer::new();
        let err = session.confirm_and_analyze(&buffer).unwrap_err();
        assert!(matches!(err, OrchestratorError::NoActiveAnalysis));
    }

    #[test]
    fn progress_projection_per_stage() {
        assert_eq!(ProcessingStage::Idle.progress_percent(), 0);
        assert_eq!(ProcessingStage::Uploading.progress_percent(), 40);
        assert_eq!(ProcessingStage::Recognizing.progress_percent(), 65);
        assert_eq!(ProcessingStage::Analyzing.progress_percent(), 80);
        assert_eq!(ProcessingStage::Saving.progress_percent(), 90);
        assert_eq!(ProcessingStage::Complete.progress_percent(), 100);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AnalysisStatus, MarkerCategory, MarkerStatus};

/// One ingestion event for a user: a lab-report photo or a pasted text,
/// plus the eventual AI-derived results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodAnalysis {
    pub id: Uuid,
    pub user_id: String,
    pub status: AnalysisStatus,
    pub image_path: Option<String>,
    pub analysis_date: DateTime<Utc>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub results: Option<AnalysisResults>,
}

impl BloodAnalysis {
    /// Fresh `pending` analysis for a user. `image_path` is set later if a
    /// photo was supplied.
    pub fn new(user_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            status: AnalysisStatus::Pending,
            image_path: None,
            analysis_date: Utc::now(),
            analyzed_at: None,
            results: None,
        }
    }
}

/// Structured payload attached to an analysis once the AI step completes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnalysisResults {
    pub summary: String,
    pub markers: Vec<AnalyzedMarker>,
    pub recommendations: Vec<String>,
}

/// One marker as interpreted by the analysis model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzedMarker {
    pub name: String,
    pub value: String,
    pub unit: String,
    pub reference_range: Option<String>,
    pub status: MarkerStatus,
    pub category: MarkerCategory,
}

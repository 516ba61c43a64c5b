use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Importance, MarkerCategory, MarkerStatus};

/// Canonical, deduplicated description of a named lab measurement.
/// Created lazily the first time a name is seen during persistence;
/// subsequent sightings of the same case-folded name reuse the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomarkerDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: MarkerCategory,
    pub importance: Importance,
    pub normal_range: Option<NormalRange>,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Reference interval attached to a definition, in the definition's unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalRange {
    pub min: f64,
    pub max: f64,
    pub unit: String,
}

/// One observed value of a `BiomarkerDefinition` within one `BloodAnalysis`.
/// The value is kept as text to preserve the original formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomarkerResult {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub biomarker_id: Uuid,
    pub value: String,
    pub unit: String,
    pub status: MarkerStatus,
    pub created_at: DateTime<Utc>,
}

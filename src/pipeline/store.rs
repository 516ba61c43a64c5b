//! Biomarker Result Store — persists a confirmed field set under an analysis.
//!
//! Definitions are created lazily: the first sighting of a name (case-folded
//! match) creates a `BiomarkerDefinition` with category and importance
//! inferred from the name and a normal range taken from the field's captured
//! reference annotation, when one was printed. Every field then becomes one
//! `BiomarkerResult` row.
//!
//! The whole commit runs inside a single transaction — a failed insert rolls
//! back siblings, so a retry cannot duplicate rows.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository::biomarker;
use crate::db::DatabaseError;
use crate::models::{BiomarkerDefinition, BiomarkerResult, NormalRange};
use crate::pipeline::parsing::{categorize, infer_importance, BiomarkerField};

/// What a commit did, for logging and the caller's summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub results_created: usize,
    pub definitions_created: usize,
}

/// Persist confirmed biomarker fields for an analysis.
pub fn commit_results(
    conn: &Connection,
    analysis_id: &Uuid,
    fields: &[BiomarkerField],
) -> Result<CommitSummary, DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    let mut summary = CommitSummary::default();

    for field in fields {
        let definition = match biomarker::find_definition_by_name(&tx, &field.name)? {
            Some(existing) => existing,
            None => {
                let def = definition_for_field(field);
                biomarker::insert_definition(&tx, &def)?;
                summary.definitions_created += 1;
                def
            }
        };

        biomarker::insert_result(
            &tx,
            &BiomarkerResult {
                id: Uuid::new_v4(),
                analysis_id: *analysis_id,
                biomarker_id: definition.id,
                value: field.value.clone(),
                unit: field.unit.clone(),
                status: field.status,
                created_at: Utc::now(),
            },
        )?;
        summary.results_created += 1;
    }

    tx.commit()?;

    tracing::info!(
        analysis_id = %analysis_id,
        results = summary.results_created,
        new_definitions = summary.definitions_created,
        "Biomarker results committed"
    );

    Ok(summary)
}

/// Build a lazily-created definition from a field's name and captured
/// reference bounds.
fn definition_for_field(field: &BiomarkerField) -> BiomarkerDefinition {
    let normal_range = match (field.reference_low, field.reference_high) {
        (Some(min), Some(max)) => Some(NormalRange {
            min,
            max,
            unit: field.unit.clone(),
        }),
        _ => None,
    };

    BiomarkerDefinition {
        id: Uuid::new_v4(),
        name: field.name.trim().to_string(),
        description: None,
        category: categorize(&field.name),
        importance: infer_importance(&field.name),
        normal_range,
        recommendations: vec![],
        created_at: Utc::now(),
    }
}

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::AnalysisStatus;
use crate::models::{AnalysisResults, BloodAnalysis};

pub fn insert_analysis(conn: &Connection, analysis: &BloodAnalysis) -> Result<(), DatabaseError> {
    let results_json = match &analysis.results {
        Some(r) => Some(
            serde_json::to_string(r)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        ),
        None => None,
    };

    conn.execute(
        "INSERT INTO blood_analyses (id, user_id, status, image_path, analysis_date, analyzed_at, results)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            analysis.id.to_string(),
            analysis.user_id,
            analysis.status.as_str(),
            analysis.image_path,
            analysis.analysis_date.to_rfc3339(),
            analysis.analyzed_at.map(|t| t.to_rfc3339()),
            results_json,
        ],
    )?;
    Ok(())
}

pub fn get_analysis(conn: &Connection, id: &Uuid) -> Result<BloodAnalysis, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, user_id, status, image_path, analysis_date, analyzed_at, results
             FROM blood_analyses WHERE id = ?1",
            params![id.to_string()],
            |row| Ok(analysis_row_from_rusqlite(row)),
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "BloodAnalysis".into(),
            id: id.to_string(),
        })?;

    analysis_from_row(row?)
}

pub fn list_analyses_for_user(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<BloodAnalysis>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, status, image_path, analysis_date, analyzed_at, results
         FROM blood_analyses WHERE user_id = ?1 ORDER BY analysis_date DESC",
    )?;

    let rows = stmt.query_map(params![user_id], |row| Ok(analysis_row_from_rusqlite(row)))?;

    let mut analyses = Vec::new();
    for row in rows {
        analyses.push(analysis_from_row(row??)?);
    }
    Ok(analyses)
}

/// Record the stored image path once an upload has been staged.
pub fn set_image_path(
    conn: &Connection,
    id: &Uuid,
    image_path: &str,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE blood_analyses SET image_path = ?1 WHERE id = ?2",
        params![image_path, id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "BloodAnalysis".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Transition an analysis to `analyzed`, attaching results and the
/// completion timestamp in one statement.
pub fn mark_analyzed(
    conn: &Connection,
    id: &Uuid,
    results: &AnalysisResults,
    analyzed_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let results_json = serde_json::to_string(results)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    let updated = conn.execute(
        "UPDATE blood_analyses SET status = ?1, results = ?2, analyzed_at = ?3 WHERE id = ?4",
        params![
            AnalysisStatus::Analyzed.as_str(),
            results_json,
            analyzed_at.to_rfc3339(),
            id.to_string(),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "BloodAnalysis".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Explicit terminal failure marking. The orchestrator's error paths leave
/// rows `pending`; this is for callers abandoning an analysis permanently.
pub fn mark_failed(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE blood_analyses SET status = ?1 WHERE id = ?2",
        params![AnalysisStatus::Failed.as_str(), id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "BloodAnalysis".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// Internal row type for BloodAnalysis mapping
struct AnalysisRow {
    id: String,
    user_id: String,
    status: String,
    image_path: Option<String>,
    analysis_date: String,
    analyzed_at: Option<String>,
    results: Option<String>,
}

fn analysis_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<AnalysisRow, rusqlite::Error> {
    Ok(AnalysisRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        status: row.get(2)?,
        image_path: row.get(3)?,
        analysis_date: row.get(4)?,
        analyzed_at: row.get(5)?,
        results: row.get(6)?,
    })
}

fn analysis_from_row(row: AnalysisRow) -> Result<BloodAnalysis, DatabaseError> {
    let results = match row.results {
        Some(json) => Some(
            serde_json::from_str(&json)
                .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        ),
        None => None,
    };

    Ok(BloodAnalysis {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        user_id: row.user_id,
        status: AnalysisStatus::from_str(&row.status)?,
        image_path: row.image_path,
        analysis_date: parse_timestamp(&row.analysis_date)?,
        analyzed_at: row.analyzed_at.as_deref().map(parse_timestamp).transpose()?,
        results,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{Importance, MarkerCategory, MarkerStatus};
use crate::models::{BiomarkerDefinition, BiomarkerResult, NormalRange};

pub fn insert_definition(
    conn: &Connection,
    def: &BiomarkerDefinition,
) -> Result<(), DatabaseError> {
    let recommendations = serde_json::to_string(&def.recommendations)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    conn.execute(
        "INSERT INTO biomarker_definitions (id, name, description, category, importance,
         normal_min, normal_max, normal_unit, recommendations, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            def.id.to_string(),
            def.name,
            def.description,
            def.category.as_str(),
            def.importance.as_str(),
            def.normal_range.as_ref().map(|r| r.min),
            def.normal_range.as_ref().map(|r| r.max),
            def.normal_range.as_ref().map(|r| r.unit.clone()),
            recommendations,
            def.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Case-insensitive definition lookup — the dedup key for lazy creation.
/// Returns the oldest match if OCR variance ever produced duplicates.
pub fn find_definition_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<BiomarkerDefinition>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, name, description, category, importance,
             normal_min, normal_max, normal_unit, recommendations, created_at
             FROM biomarker_definitions WHERE LOWER(name) = LOWER(?1)
             ORDER BY created_at ASC LIMIT 1",
            params![name],
            |row| Ok(definition_row_from_rusqlite(row)),
        )
        .optional()?;

    match row {
        Some(r) => Ok(Some(definition_from_row(r?)?)),
        None => Ok(None),
    }
}

pub fn list_definitions(conn: &Connection) -> Result<Vec<BiomarkerDefinition>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, category, importance,
         normal_min, normal_max, normal_unit, recommendations, created_at
         FROM biomarker_definitions ORDER BY name COLLATE NOCASE",
    )?;

    let rows = stmt.query_map([], |row| Ok(definition_row_from_rusqlite(row)))?;

    let mut defs = Vec::new();
    for row in rows {
        defs.push(definition_from_row(row??)?);
    }
    Ok(defs)
}

pub fn insert_result(conn: &Connection, result: &BiomarkerResult) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO biomarker_results (id, analysis_id, biomarker_id, value, unit, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            result.id.to_string(),
            result.analysis_id.to_string(),
            result.biomarker_id.to_string(),
            result.value,
            result.unit,
            result.status.as_str(),
            result.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn list_results_by_analysis(
    conn: &Connection,
    analysis_id: &Uuid,
) -> Result<Vec<BiomarkerResult>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, analysis_id, biomarker_id, value, unit, status, created_at
         FROM biomarker_results WHERE analysis_id = ?1 ORDER BY created_at ASC",
    )?;

    let rows = stmt.query_map(params![analysis_id.to_string()], |row| {
        Ok(result_row_from_rusqlite(row))
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(result_from_row(row??)?);
    }
    Ok(results)
}

// Internal row types

struct DefinitionRow {
    id: String,
    name: String,
    description: Option<String>,
    category: String,
    importance: String,
    normal_min: Option<f64>,
    normal_max: Option<f64>,
    normal_unit: Option<String>,
    recommendations: String,
    created_at: String,
}

fn definition_row_from_rusqlite(
    row: &rusqlite::Row<'_>,
) -> Result<DefinitionRow, rusqlite::Error> {
    Ok(DefinitionRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        importance: row.get(4)?,
        normal_min: row.get(5)?,
        normal_max: row.get(6)?,
        normal_unit: row.get(7)?,
        recommendations: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn definition_from_row(row: DefinitionRow) -> Result<BiomarkerDefinition, DatabaseError> {
    let normal_range = match (row.normal_min, row.normal_max, row.normal_unit) {
        (Some(min), Some(max), Some(unit)) => Some(NormalRange { min, max, unit }),
        _ => None,
    };

    Ok(BiomarkerDefinition {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        name: row.name,
        description: row.description,
        category: MarkerCategory::from_str(&row.category)?,
        importance: Importance::from_str(&row.importance)?,
        normal_range,
        recommendations: serde_json::from_str(&row.recommendations)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

struct ResultRow {
    id: String,
    analysis_id: String,
    biomarker_id: String,
    value: String,
    unit: String,
    status: String,
    created_at: String,
}

fn result_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<ResultRow, rusqlite::Error> {
    Ok(ResultRow {
        id: row.get(0)?,
        analysis_id: row.get(1)?,
        biomarker_id: row.get(2)?,
        value: row.get(3)?,
        unit: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn result_from_row(row: ResultRow) -> Result<BiomarkerResult, DatabaseError> {
    Ok(BiomarkerResult {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        analysis_id: Uuid::parse_str(&row.analysis_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        biomarker_id: Uuid::parse_str(&row.biomarker_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        value: row.value,
        unit: row.unit,
        status: MarkerStatus::from_str(&row.status)?,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

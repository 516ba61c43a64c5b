//! Best-effort parser for line-oriented lab text.
//!
//! One production rule per line: `<name>: <value> <unit> (референс: min-max)`
//! with the unit and the reference annotation optional. Lines that do not
//! match are skipped and counted, never raised — OCR output is noisy and the
//! review stage exists precisely to let the user repair what parsing missed.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::classify::{categorize, classify_status, parse_numeric};
use crate::models::enums::{MarkerCategory, MarkerStatus};

/// A parsed-but-unconfirmed biomarker candidate. Lives only in the staging
/// buffer; converted into persistent rows on explicit confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomarkerField {
    /// Ephemeral id, regenerated on every parse.
    pub id: Uuid,
    pub name: String,
    pub value: String,
    pub unit: String,
    pub status: MarkerStatus,
    pub category: MarkerCategory,
    /// Reference interval captured from the line's annotation, if printed.
    pub reference_low: Option<f64>,
    pub reference_high: Option<f64>,
    /// UI edit flag; irrelevant to persistence.
    pub is_editing: bool,
}

impl BiomarkerField {
    /// Blank field appended by the review stage's "add" action.
    pub fn blank() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            value: String::new(),
            unit: String::new(),
            status: MarkerStatus::Unknown,
            category: MarkerCategory::Other,
            reference_low: None,
            reference_high: None,
            is_editing: true,
        }
    }
}

/// Result of a parse pass. `skipped_lines` counts non-empty lines that did
/// not match the grammar, for observability.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub fields: Vec<BiomarkerField>,
    pub skipped_lines: usize,
}

fn value_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid regex"))
}

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\(\s*референс\s*:\s*(\d+(?:[.,]\d+)?)\s*[-–]\s*(\d+(?:[.,]\d+)?)\s*\)")
            .expect("valid regex")
    })
}

/// Parse free lab text into biomarker candidates.
///
/// Total function: always returns, possibly with zero fields. Parsing the
/// same text twice yields field-for-field identical output except ids.
pub fn parse_lab_text(text: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Some(field) => outcome.fields.push(field),
            None => outcome.skipped_lines += 1,
        }
    }

    tracing::debug!(
        parsed = outcome.fields.len(),
        skipped = outcome.skipped_lines,
        "Lab text parsed"
    );

    outcome
}

/// Parse one line; `None` if it does not match the grammar.
fn parse_line(line: &str) -> Option<BiomarkerField> {
    let colon = line.find(':')?;
    let name = line[..colon].trim();
    if name.is_empty() {
        return None;
    }

    let rest = &line[colon + 1..];

    // First numeric token after the colon is the value
    let value_match = value_regex().find(rest)?;
    let value = value_match.as_str().to_string();

    // Unit: what follows the value, up to any parenthesized annotation
    let after_value = &rest[value_match.end()..];
    let unit = after_value
        .split('(')
        .next()
        .unwrap_or("")
        .trim()
        .to_string();

    // Optional reference interval annotation
    let (reference_low, reference_high) = match reference_regex().captures(rest) {
        Some(caps) => (
            parse_numeric(caps.get(1).map_or("", |m| m.as_str())),
            parse_numeric(caps.get(2).map_or("", |m| m.as_str())),
        ),
        None => (None, None),
    };

    Some(BiomarkerField {
        id: Uuid::new_v4(),
        name: name.to_string(),
        value: value.clone(),
        unit,
        status: classify_status(name, &value),
        category: categorize(name),
        reference_low,
        reference_high,
        is_editing: false,
    })
}

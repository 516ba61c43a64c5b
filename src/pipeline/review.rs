//! Review & Edit stage — the editable staging buffer between parsing and
//! analysis.
//!
//! The buffer is a plain value type owned by the caller: every operation is
//! an in-memory transform, nothing is persisted until the orchestrator
//! commits the confirmed set. Abandoning the buffer has no side effects.
//! Status and category are recomputed on every relevant edit so the user
//! always sees live status chips, never stale ones.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::parsing::{categorize, classify_status, BiomarkerField, ParseOutcome};

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("At least one biomarker with a name and value is required")]
    NoFields,

    #[error("No staged field with id {0}")]
    FieldNotFound(Uuid),
}

/// Partial update for a staged field. `None` leaves the member unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldPatch {
    pub name: Option<String>,
    pub value: Option<String>,
    pub unit: Option<String>,
    pub is_editing: Option<bool>,
}

/// The staging buffer: parsed-but-unconfirmed biomarker candidates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewBuffer {
    fields: Vec<BiomarkerField>,
}

impl ReviewBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_outcome(outcome: ParseOutcome) -> Self {
        Self {
            fields: outcome.fields,
        }
    }

    pub fn fields(&self) -> &[BiomarkerField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a blank field in edit mode; returns its id.
    pub fn add(&mut self) -> Uuid {
        let field = BiomarkerField::blank();
        let id = field.id;
        self.fields.push(field);
        id
    }

    /// Merge a patch into a field. Changing name, value, or unit recomputes
    /// status and category immediately — never lazily at confirm time.
    pub fn update(&mut self, id: Uuid, patch: FieldPatch) -> Result<(), ReviewError> {
        let field = self
            .fields
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(ReviewError::FieldNotFound(id))?;

        let mut reclassify = false;
        if let Some(name) = patch.name {
            field.name = name;
            reclassify = true;
        }
        if let Some(value) = patch.value {
            field.value = value;
            reclassify = true;
        }
        if let Some(unit) = patch.unit {
            field.unit = unit;
            reclassify = true;
        }
        if let Some(is_editing) = patch.is_editing {
            field.is_editing = is_editing;
        }

        if reclassify {
            field.status = classify_status(&field.name, &field.value);
            field.category = categorize(&field.name);
        }

        Ok(())
    }

    /// Delete a staged field by id.
    pub fn remove(&mut self, id: Uuid) -> Result<(), ReviewError> {
        let before = self.fields.len();
        self.fields.retain(|f| f.id != id);
        if self.fields.len() == before {
            return Err(ReviewError::FieldNotFound(id));
        }
        Ok(())
    }

    /// Confirm the buffer: keep fields where both name and value are
    /// non-blank after trimming, silently dropping the rest. Refuses to
    /// proceed when nothing remains.
    pub fn confirm(&self) -> Result<ConfirmedFields, ReviewError> {
        let fields: Vec<BiomarkerField> = self
            .fields
            .iter()
            .filter(|f| !f.name.trim().is_empty() && !f.value.trim().is_empty())
            .cloned()
            .collect();

        if fields.is_empty() {
            return Err(ReviewError::NoFields);
        }

        Ok(ConfirmedFields { fields })
    }
}

/// The confirmed subset of a staging buffer, ready for analysis and commit.
#[derive(Debug, Clone)]
pub struct ConfirmedFields {
    pub fields: Vec<BiomarkerField>,
}

impl ConfirmedFields {
    /// Serialize back into the `"name: value unit"` line format the parser
    /// consumes — the same text shape the next pipeline stage expects.
    pub fn serialize(&self) -> String {
        self.fields
            .iter()
            .map(|f| {
                let line = format!("{}: {} {}", f.name.trim(), f.value.trim(), f.unit.trim());
                line.trim_end().to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

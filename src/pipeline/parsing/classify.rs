//! Status classification and categorization for biomarker names.
//!
//! Both functions run against small static lookup tables: an ordered list of
//! keyword sets with first-match-wins semantics. The thresholds are coarse
//! screening heuristics, not lab-specific reference intervals — `unknown`
//! means "needs human judgment", not an error.

use crate::models::enums::{Importance, MarkerCategory, MarkerStatus};

/// One known biomarker norm: lowercase keywords matched as substrings of the
/// case-folded marker name, and the accepted [min, max] interval.
struct MarkerNorm {
    keywords: &'static [&'static str],
    min: f64,
    max: f64,
}

/// Built-in norms table. Ordered; the first keyword hit wins.
const NORMS: &[MarkerNorm] = &[
    MarkerNorm {
        keywords: &["гемоглобин", "hemoglobin"],
        min: 110.0,
        max: 160.0,
    },
    MarkerNorm {
        keywords: &["эритроцит", "erythrocyte"],
        min: 3.8,
        max: 5.8,
    },
    MarkerNorm {
        keywords: &["лейкоцит", "leukocyte"],
        min: 4.0,
        max: 9.0,
    },
    MarkerNorm {
        keywords: &["тромбоцит", "platelet"],
        min: 150.0,
        max: 400.0,
    },
    MarkerNorm {
        keywords: &["глюкоза", "glucose"],
        min: 3.3,
        max: 6.1,
    },
    MarkerNorm {
        keywords: &["холестерин", "cholesterol"],
        min: 3.0,
        max: 5.2,
    },
    MarkerNorm {
        keywords: &["креатинин", "creatinine"],
        min: 53.0,
        max: 115.0,
    },
    MarkerNorm {
        keywords: &["гематокрит", "hematocrit"],
        min: 35.0,
        max: 50.0,
    },
];

/// Category keyword groups in fixed priority order; first match wins.
const CATEGORY_RULES: &[(&[&str], MarkerCategory)] = &[
    (
        &["гемоглобин", "эритроцит", "гематокрит", "hemoglobin", "erythrocyte", "hematocrit"],
        MarkerCategory::Blood,
    ),
    (
        &["лейкоцит", "лимфоцит", "нейтрофил", "моноцит", "эозинофил", "leukocyte", "lymphocyte", "neutrophil"],
        MarkerCategory::Immunity,
    ),
    (
        &["тромбоцит", "фибриноген", "протромбин", "platelet", "fibrinogen"],
        MarkerCategory::Coagulation,
    ),
    (
        &["глюкоза", "холестерин", "билирубин", "белок", "glucose", "cholesterol", "bilirubin", "protein"],
        MarkerCategory::Metabolism,
    ),
    (
        &["креатинин", "мочевина", "creatinine", "urea"],
        MarkerCategory::Kidney,
    ),
];

/// Parse a lab value as a float, accepting comma as decimal separator.
pub fn parse_numeric(value: &str) -> Option<f64> {
    value.trim().replace(',', ".").parse::<f64>().ok()
}

/// Classify a value against the built-in norms table.
///
/// Total: unparseable values and unlisted markers degrade to `Unknown`.
/// The classifier never emits `Critical` — the single-table heuristics are
/// too coarse to call criticality.
pub fn classify_status(name: &str, value: &str) -> MarkerStatus {
    let Some(numeric) = parse_numeric(value) else {
        return MarkerStatus::Unknown;
    };

    let folded = name.to_lowercase();
    for norm in NORMS {
        if norm.keywords.iter().any(|k| folded.contains(k)) {
            return if numeric < norm.min {
                MarkerStatus::Low
            } else if numeric > norm.max {
                MarkerStatus::High
            } else {
                MarkerStatus::Normal
            };
        }
    }

    MarkerStatus::Unknown
}

/// Assign a category from the keyword groups; unmatched names go to `Other`.
pub fn categorize(name: &str) -> MarkerCategory {
    let folded = name.to_lowercase();
    for (keywords, category) in CATEGORY_RULES {
        if keywords.iter().any(|k| folded.contains(k)) {
            return *category;
        }
    }
    MarkerCategory::Other
}

/// Importance for a lazily created definition: markers with a built-in norm
/// rank high, markers we can at least categorize rank medium, the rest low.
pub fn infer_importance(name: &str) -> Importance {
    let folded = name.to_lowercase();
    if NORMS
        .iter()
        .any(|n| n.keywords.iter().any(|k| folded.contains(k)))
    {
        Importance::High
    } else if categorize(name) != MarkerCategory::Other {
        Importance::Medium
    } else {
        Importance::Low
    }
}

mod engine;
mod health;
mod result;
mod review;

use serde::Serialize;
use tracing::debug;

use crate::fields::{Category, ExtractedFields, FIELD_CONFIG, HEALTH_WARNING_FIELD, NOT_FOUND};
use crate::fuzzy;
use crate::ocr::LabelScan;
use crate::settings::Settings;

pub use engine::{Engine, IngestOutcome, PreconditionError};
pub use health::{
    HEALTH_WARNING_LABEL, HEALTH_WARNING_REFERENCE, HEALTH_WARNING_TEXT, HealthWarningCheck,
};
pub use result::{
    FieldComparison, MISMATCH, MatchStatus, NO_APPLICATION, Verdict, VerificationResult,
    overall_status,
};
pub use review::{FieldEdit, ReviewDecision};

/// An ingested application document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationRecord {
    pub file_name: String,
    pub fields: ExtractedFields,
    pub category: Category,
}

impl ApplicationRecord {
    pub fn from_text(file_name: &str, text: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            fields: crate::fields::extract_fields(text),
            category: Category::infer(text),
        }
    }
}

/// Application whose brand best resembles the label text.
///
/// Only strictly positive scores count; the first of equally scored applications wins.
pub fn best_application<'a>(
    library: &'a [ApplicationRecord],
    full_text: &str,
) -> Option<&'a ApplicationRecord> {
    let text = full_text.to_lowercase();
    let mut best = None;
    let mut highest = 0;
    for record in library {
        let score = fuzzy::partial_ratio(&record.fields.get("brand").to_lowercase(), &text);
        if score > highest {
            highest = score;
            best = Some(record);
        }
    }
    if let Some(record) = best {
        debug!("matched {} (brand score {})", record.file_name, highest);
    }
    best
}

pub fn field_status(reference: &str, score: u8, threshold: u8) -> MatchStatus {
    if reference != NOT_FOUND && score > threshold {
        MatchStatus::Match
    } else {
        MatchStatus::Fail
    }
}

/// Compares every regulated field except the health warning against the label text.
pub fn compare_fields(
    record: &ApplicationRecord,
    full_text: &str,
    threshold: u8,
) -> Vec<FieldComparison> {
    let text = full_text.to_lowercase();
    FIELD_CONFIG
        .iter()
        .filter(|descriptor| descriptor.id != HEALTH_WARNING_FIELD)
        .map(|descriptor| {
            let reference = record.fields.get(descriptor.id);
            let score = fuzzy::partial_ratio(&reference.to_lowercase(), &text);
            let status = field_status(reference, score, threshold);
            FieldComparison {
                field: descriptor.label.to_string(),
                reference: reference.to_string(),
                detected: match status {
                    MatchStatus::Match => reference.to_string(),
                    MatchStatus::Fail => MISMATCH.to_string(),
                },
                status,
            }
        })
        .collect()
}

/// Scores an already scanned label against the library. `forced` replaces the category of the
/// matched application.
pub fn verify_scan(
    label_file: &str,
    scan: &LabelScan,
    library: &[ApplicationRecord],
    forced: Option<Category>,
    settings: &Settings,
) -> VerificationResult {
    let Some(record) = best_application(library, &scan.full_text) else {
        debug!("{}: no application matched", label_file);
        return VerificationResult::unmatched(label_file, forced);
    };

    let mut comparisons = compare_fields(record, &scan.full_text, settings.field_match_threshold);
    let health = HealthWarningCheck::run(
        &scan.full_text,
        &scan.detections,
        &scan.image,
        &settings.bold_detector(),
    );
    comparisons.push(health.to_comparison(settings.health_warning_threshold));

    VerificationResult::scored(
        label_file,
        &record.file_name,
        Some(forced.unwrap_or(record.category)),
        comparisons,
    )
}

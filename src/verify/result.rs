use serde::{Serialize, Serializer};
use std::time::Duration;

use crate::fields::Category;

pub const NO_APPLICATION: &str = "None";
pub const MISMATCH: &str = "Mismatch/Missing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Pass,
    Fail,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatchStatus {
    Match,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldComparison {
    pub field: String,
    pub reference: String,
    pub detected: String,
    pub status: MatchStatus,
}

/// Pass only when every comparison matched.
pub fn overall_status(comparisons: &[FieldComparison]) -> Verdict {
    if comparisons
        .iter()
        .all(|comparison| comparison.status == MatchStatus::Match)
    {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

/// Outcome of checking one label.
///
/// `final_status` equals `ai_status` until a review is applied; see
/// [`VerificationResult::apply_review`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub label_file: String,
    pub app_file: String,
    pub category: Option<Category>,
    #[serde(rename = "latency_secs", serialize_with = "serialize_secs")]
    pub latency: Duration,
    pub(super) ai_status: Verdict,
    pub(super) final_status: Verdict,
    pub(super) human_decision: bool,
    pub(super) comparisons: Vec<FieldComparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) error: Option<String>,
}

impl VerificationResult {
    /// No application in the library resembled the label.
    pub fn unmatched(label_file: &str, category: Option<Category>) -> Self {
        Self {
            label_file: label_file.to_string(),
            app_file: NO_APPLICATION.to_string(),
            category,
            latency: Duration::ZERO,
            ai_status: Verdict::Fail,
            final_status: Verdict::Fail,
            human_decision: false,
            comparisons: Vec::new(),
            error: None,
        }
    }

    pub fn scored(
        label_file: &str,
        app_file: &str,
        category: Option<Category>,
        comparisons: Vec<FieldComparison>,
    ) -> Self {
        let status = overall_status(&comparisons);
        Self {
            label_file: label_file.to_string(),
            app_file: app_file.to_string(),
            category,
            latency: Duration::ZERO,
            ai_status: status,
            final_status: status,
            human_decision: false,
            comparisons,
            error: None,
        }
    }

    /// Placeholder for a label whose processing failed.
    pub fn error(label_file: &str, category: Option<Category>, message: impl Into<String>) -> Self {
        Self {
            label_file: label_file.to_string(),
            app_file: NO_APPLICATION.to_string(),
            category,
            latency: Duration::ZERO,
            ai_status: Verdict::Error,
            final_status: Verdict::Error,
            human_decision: false,
            comparisons: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn ai_status(&self) -> Verdict {
        self.ai_status
    }

    pub fn final_status(&self) -> Verdict {
        self.final_status
    }

    pub fn human_decision(&self) -> bool {
        self.human_decision
    }

    pub fn comparisons(&self) -> &[FieldComparison] {
        &self.comparisons
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a reviewer's verdict disagrees with the automated one.
    pub fn human_override(&self) -> bool {
        self.final_status != self.ai_status
    }
}

fn serialize_secs<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

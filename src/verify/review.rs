use anyhow::{Result, anyhow};
use serde::Deserialize;

use crate::fields::{FIELD_CONFIG, NOT_FOUND};
use crate::fuzzy;

use super::health::HEALTH_WARNING_LABEL;
use super::result::{MatchStatus, Verdict, VerificationResult, overall_status};

/// A reviewer's replacement for the value read off the label.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FieldEdit {
    /// Field id (`brand`) or comparison label (`Brand Name`).
    pub field: String,
    pub detected: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    OverridePass,
    ConfirmFail,
    Resubmit(Vec<FieldEdit>),
}

impl VerificationResult {
    /// Moves an automatically scored result into the human-reviewed state.
    ///
    /// A result can be reviewed once. Error placeholders cannot be reviewed. On resubmit, each
    /// edited field is re-scored against its reference value; the health warning keeps its
    /// automated status because caps and weight cannot be judged from typed text.
    pub fn apply_review(&mut self, decision: ReviewDecision, field_threshold: u8) -> Result<()> {
        if self.human_decision {
            return Err(anyhow!("{} has already been reviewed", self.label_file));
        }
        if self.ai_status == Verdict::Error {
            return Err(anyhow!(
                "{} failed to process and cannot be reviewed",
                self.label_file
            ));
        }

        match decision {
            ReviewDecision::OverridePass => self.final_status = Verdict::Pass,
            ReviewDecision::ConfirmFail => self.final_status = Verdict::Fail,
            ReviewDecision::Resubmit(edits) => {
                let targets = edits
                    .iter()
                    .map(|edit| {
                        self.comparison_index(&edit.field)
                            .ok_or_else(|| anyhow!("no comparison for field '{}'", edit.field))
                    })
                    .collect::<Result<Vec<_>>>()?;

                for (index, edit) in targets.into_iter().zip(edits) {
                    let comparison = &mut self.comparisons[index];
                    let detected = edit.detected.trim().to_string();
                    if comparison.field != HEALTH_WARNING_LABEL {
                        let score = fuzzy::partial_ratio(
                            &comparison.reference.to_lowercase(),
                            &detected.to_lowercase(),
                        );
                        comparison.status = if comparison.reference != NOT_FOUND
                            && !detected.is_empty()
                            && score > field_threshold
                        {
                            MatchStatus::Match
                        } else {
                            MatchStatus::Fail
                        };
                    }
                    comparison.detected = detected;
                }
                self.ai_status = overall_status(&self.comparisons);
                self.final_status = self.ai_status;
            }
        }
        self.human_decision = true;
        Ok(())
    }

    fn comparison_index(&self, field: &str) -> Option<usize> {
        let field = field.trim();
        let label = FIELD_CONFIG
            .iter()
            .find(|descriptor| descriptor.id.eq_ignore_ascii_case(field))
            .map(|descriptor| descriptor.label)
            .unwrap_or(field);
        self.comparisons
            .iter()
            .position(|comparison| comparison.field.eq_ignore_ascii_case(label))
    }
}

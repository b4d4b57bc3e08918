use image::RgbImage;
use tracing::debug;

use crate::fuzzy;
use crate::ocr::OcrDetection;
use crate::vision::BoldDetector;

use super::result::{FieldComparison, MatchStatus};

/// Mandatory statement under the Alcoholic Beverage Labeling Act of 1988.
pub const HEALTH_WARNING_TEXT: &str = "GOVERNMENT WARNING: (1) According to the Surgeon General, \
     women should not drink alcoholic beverages during pregnancy because of the risk of birth \
     defects. (2) Consumption of alcoholic beverages impairs your ability to drive a car or \
     operate machinery, and may cause health problems.";

pub const HEALTH_WARNING_LABEL: &str = "HEALTH WARNING";
pub const HEALTH_WARNING_REFERENCE: &str = "Regulatory Text + CAPS + BOLD";

const CAPS_PHRASE: &str = "GOVERNMENT WARNING";
const BOLD_MARKER: &str = "GOVERNMENT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthWarningCheck {
    pub score: u8,
    pub caps: bool,
    pub bold: bool,
}

impl HealthWarningCheck {
    pub fn run(
        full_text: &str,
        detections: &[OcrDetection],
        image: &RgbImage,
        detector: &BoldDetector,
    ) -> Self {
        let score = fuzzy::token_set_ratio(
            &HEALTH_WARNING_TEXT.to_lowercase(),
            &full_text.to_lowercase(),
        );
        let caps = full_text.contains(CAPS_PHRASE);
        let bold = detections
            .iter()
            .filter(|detection| detection.text.to_uppercase().contains(BOLD_MARKER))
            .any(|detection| detector.detect(image, &detection.quad).is_bold());
        debug!("health warning: score={} caps={} bold={}", score, caps, bold);
        Self { score, caps, bold }
    }

    /// Wording above `threshold`, the caps phrase and bold type must all hold.
    pub fn passes(&self, threshold: u8) -> bool {
        self.score > threshold && self.caps && self.bold
    }

    pub fn to_comparison(&self, threshold: u8) -> FieldComparison {
        let status = if self.passes(threshold) {
            MatchStatus::Match
        } else {
            MatchStatus::Fail
        };
        FieldComparison {
            field: HEALTH_WARNING_LABEL.to_string(),
            reference: HEALTH_WARNING_REFERENCE.to_string(),
            detected: format!(
                "{}% Text Match | {} | {}",
                self.score,
                if self.caps { "CAPS" } else { "NOT CAPS" },
                if self.bold { "BOLD" } else { "NOT BOLD" }
            ),
            status,
        }
    }
}

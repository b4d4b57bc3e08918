use anyhow::{Result, anyhow};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::euclidean_squared_distance_transform;
use serde::Serialize;
use tracing::{debug, warn};

use crate::ocr::Quad;

use super::to_gray;

/// Outcome of a stroke-width check. `Degraded` means the region could not be analysed and is
/// treated as not bold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoldVerdict {
    Bold { ratio: f64 },
    NotBold { ratio: f64 },
    Degraded { reason: String },
}

impl BoldVerdict {
    pub fn is_bold(&self) -> bool {
        matches!(self, BoldVerdict::Bold { .. })
    }
}

pub fn classify_stroke_ratio(ratio: f64, threshold: f64) -> BoldVerdict {
    if ratio > threshold {
        BoldVerdict::Bold { ratio }
    } else {
        BoldVerdict::NotBold { ratio }
    }
}

/// Judges typographic weight from the thickest stroke inside a text box.
///
/// The peak of the distance transform over the text mask is half the thickest stroke; dividing
/// by the box height makes it comparable across font sizes. The ratio is still resolution and
/// font dependent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoldDetector {
    ratio_threshold: f64,
}

impl Default for BoldDetector {
    fn default() -> Self {
        Self::new(0.04)
    }
}

impl BoldDetector {
    pub fn new(ratio_threshold: f64) -> Self {
        Self { ratio_threshold }
    }

    pub fn is_bold(&self, image: &RgbImage, quad: &Quad) -> bool {
        self.detect(image, quad).is_bold()
    }

    pub fn detect(&self, image: &RgbImage, quad: &Quad) -> BoldVerdict {
        match stroke_ratio(image, quad) {
            Ok(Some(ratio)) => {
                let verdict = classify_stroke_ratio(ratio, self.ratio_threshold);
                debug!("bold: stroke ratio {:.4} -> {:?}", ratio, verdict);
                verdict
            }
            Ok(None) => BoldVerdict::Degraded {
                reason: "empty crop".to_string(),
            },
            Err(err) => {
                warn!("bold: stroke analysis failed, assuming not bold: {}", err);
                BoldVerdict::Degraded {
                    reason: err.to_string(),
                }
            }
        }
    }
}

fn stroke_ratio(image: &RgbImage, quad: &Quad) -> Result<Option<f64>> {
    let Some(rect) = quad.crop_rect(image.width(), image.height()) else {
        return Ok(None);
    };
    let crop = image::imageops::crop_imm(image, rect.x, rect.y, rect.w, rect.h).to_image();
    let mask = text_mask(&to_gray(&crop));

    // Background pixels are the sources, so each text pixel gets its distance to the nearest
    // background pixel.
    let background = GrayImage::from_fn(rect.w, rect.h, |x, y| {
        if mask.get_pixel(x, y)[0] == 0 {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let distances = euclidean_squared_distance_transform(&background);
    let max_sq = distances
        .pixels()
        .map(|pixel| pixel[0])
        .fold(0.0f64, f64::max);
    if !max_sq.is_finite() {
        return Err(anyhow!("text region has no background pixels"));
    }
    Ok(Some(max_sq.sqrt() / rect.h as f64))
}

/// Otsu-thresholded mask with text as 255. Assumes text covers less than half of the box.
fn text_mask(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    let mut mask = GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > level {
            Luma([0])
        } else {
            Luma([255])
        }
    });
    let count = (mask.width() as f64 * mask.height() as f64).max(1.0);
    let mean = mask.pixels().map(|pixel| pixel[0] as f64).sum::<f64>() / count;
    if mean > 127.0 {
        image::imageops::invert(&mut mask);
    }
    mask
}

mod parse;
mod tesseract;

use anyhow::{Context, Result};
use image::RgbImage;
use serde::Serialize;

use crate::vision::{PreprocessOptions, preprocess};

pub use tesseract::{TesseractOcr, list_tesseract_languages};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBoxPx {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Four corners of a detected text region, clockwise from top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    pub fn from_bbox(bbox: &BBoxPx) -> Self {
        let (x0, y0) = (bbox.x as f32, bbox.y as f32);
        let (x1, y1) = ((bbox.x + bbox.w) as f32, (bbox.y + bbox.h) as f32);
        Quad([
            Point { x: x0, y: y0 },
            Point { x: x1, y: y0 },
            Point { x: x1, y: y1 },
            Point { x: x0, y: y1 },
        ])
    }

    /// Axis-aligned box around the corners, clamped to a `width` x `height` image.
    /// `None` when nothing of the box lies inside the image.
    pub fn crop_rect(&self, width: u32, height: u32) -> Option<BBoxPx> {
        let xs = self.0.iter().map(|point| point.x);
        let ys = self.0.iter().map(|point| point.y);
        let min_x = xs.clone().fold(f32::INFINITY, f32::min);
        let max_x = xs.fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.clone().fold(f32::INFINITY, f32::min);
        let max_y = ys.fold(f32::NEG_INFINITY, f32::max);
        if !(min_x.is_finite() && max_x.is_finite() && min_y.is_finite() && max_y.is_finite()) {
            return None;
        }

        let x0 = (min_x.trunc().max(0.0) as u32).min(width);
        let x1 = (max_x.trunc().max(0.0) as u32).min(width);
        let y0 = (min_y.trunc().max(0.0) as u32).min(height);
        let y1 = (max_y.trunc().max(0.0) as u32).min(height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(BBoxPx {
            x: x0,
            y: y0,
            w: x1 - x0,
            h: y1 - y0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrDetection {
    pub quad: Quad,
    pub text: String,
    /// 0.0 to 1.0.
    pub confidence: f32,
}

/// Text recognition over a preprocessed RGB image. Detections come back in reading order.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> Result<Vec<OcrDetection>>;
}

/// Detection texts joined by single spaces, in detection order.
pub fn full_text(detections: &[OcrDetection]) -> String {
    detections
        .iter()
        .map(|detection| detection.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A decoded, preprocessed image together with what OCR found on it.
#[derive(Debug, Clone)]
pub struct LabelScan {
    pub image: RgbImage,
    pub detections: Vec<OcrDetection>,
    pub full_text: String,
}

pub fn scan(
    image_bytes: &[u8],
    engine: &dyn OcrEngine,
    options: &PreprocessOptions,
) -> Result<LabelScan> {
    let decoded =
        image::load_from_memory(image_bytes).with_context(|| "failed to decode image for OCR")?;
    let image = preprocess(decoded, options);
    let detections = engine
        .recognize(&image)
        .with_context(|| "ocr engine failed")?;
    let full_text = full_text(&detections);
    Ok(LabelScan {
        image,
        detections,
        full_text,
    })
}

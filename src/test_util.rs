use std::io::Cursor;
use std::path::Path;

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::ocr::{BBoxPx, OcrDetection, OcrEngine, Quad};

pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: every test touching HOME holds HOME_MUTEX.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    match old_home {
        Some(old) => unsafe { std::env::set_var("HOME", old) },
        None => unsafe { std::env::remove_var("HOME") },
    }
    result
}

/// OCR stand-in that reports the same detections for every image.
pub(crate) struct FixedOcr(Vec<OcrDetection>);

impl FixedOcr {
    pub(crate) fn new(detections: Vec<OcrDetection>) -> Self {
        Self(detections)
    }

    pub(crate) fn empty() -> Self {
        Self(Vec::new())
    }
}

impl OcrEngine for FixedOcr {
    fn recognize(&self, _image: &RgbImage) -> Result<Vec<OcrDetection>> {
        Ok(self.0.clone())
    }
}

pub(crate) fn detection(text: &str, x: u32, y: u32, w: u32, h: u32) -> OcrDetection {
    OcrDetection {
        quad: Quad::from_bbox(&BBoxPx { x, y, w, h }),
        text: text.to_string(),
        confidence: 0.95,
    }
}

pub(crate) fn white_page(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))
}

/// Paints a solid black rectangle, clipped to the image.
pub(crate) fn fill_black(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
    let x1 = (x + w).min(image.width());
    let y1 = (y + h).min(image.height());
    for py in y..y1 {
        for px in x..x1 {
            image.put_pixel(px, py, Rgb([0, 0, 0]));
        }
    }
}

pub(crate) fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("encode png");
    cursor.into_inner()
}

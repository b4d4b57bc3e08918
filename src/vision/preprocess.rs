use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::filter::laplacian_filter;
use tracing::debug;

use super::{ClaheParams, enhance_contrast, to_gray};

const SHARPEN_KERNEL: [[i32; 3]; 3] = [[-1, -1, -1], [-1, 9, -1], [-1, -1, -1]];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessOptions {
    /// Focus measure below which the image is sharpened.
    pub blur_threshold: f64,
    pub clahe: ClaheParams,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
            clahe: ClaheParams::default(),
        }
    }
}

/// Normalizes an image for OCR and stroke analysis: RGB, sharpened when blurry, local contrast
/// equalized on the lightness channel.
pub fn preprocess(image: DynamicImage, options: &PreprocessOptions) -> RgbImage {
    let mut rgb = image.to_rgb8();
    let focus = focus_measure(&to_gray(&rgb));
    if focus < options.blur_threshold {
        debug!(
            "preprocess: focus measure {:.1} below {:.1}, sharpening",
            focus, options.blur_threshold
        );
        rgb = sharpen(&rgb);
    }
    enhance_contrast(&rgb, options.clahe)
}

/// Variance of the Laplacian response. Low values mean few sharp edges.
pub fn focus_measure(gray: &GrayImage) -> f64 {
    let (width, height) = gray.dimensions();
    let count = width as f64 * height as f64;
    if count == 0.0 {
        return 0.0;
    }
    let response = laplacian_filter(gray);
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for pixel in response.pixels() {
        let value = pixel[0] as f64;
        sum += value;
        sum_sq += value * value;
    }
    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0)
}

pub fn sharpen(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut output = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = [0i32; 3];
            for (ky, row) in SHARPEN_KERNEL.iter().enumerate() {
                let sy = reflect(y as i64 + ky as i64 - 1, height);
                for (kx, weight) in row.iter().enumerate() {
                    let sx = reflect(x as i64 + kx as i64 - 1, width);
                    let pixel = image.get_pixel(sx, sy);
                    for (channel, value) in acc.iter_mut().enumerate() {
                        *value += weight * pixel[channel] as i32;
                    }
                }
            }
            output.put_pixel(x, y, Rgb(acc.map(|value| value.clamp(0, 255) as u8)));
        }
    }
    output
}

/// Mirrors an out-of-range coordinate back inside `0..len` without repeating the edge pixel.
fn reflect(pos: i64, len: u32) -> u32 {
    let last = len as i64 - 1;
    if last <= 0 {
        return 0;
    }
    let mirrored = if pos < 0 {
        -pos
    } else if pos > last {
        2 * last - pos
    } else {
        pos
    };
    mirrored.clamp(0, last) as u32
}

mod bold;
mod clahe;
mod preprocess;

use image::{GrayImage, Luma, RgbImage};

pub use bold::{BoldDetector, BoldVerdict, classify_stroke_ratio};
pub use clahe::ClaheParams;
pub use preprocess::{PreprocessOptions, focus_measure, preprocess, sharpen};

pub(crate) use clahe::enhance_contrast;

pub(crate) fn to_gray(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut luma = GrayImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let value = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
        luma.put_pixel(x, y, Luma([value]));
    }
    luma
}

use image::{GrayImage, Luma, Rgb, RgbImage};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaheParams {
    pub clip_limit: f32,
    /// Tiles per axis.
    pub tiles: u32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tiles: 8,
        }
    }
}

/// Equalizes local contrast on the L* channel only, leaving chroma untouched.
pub(crate) fn enhance_contrast(image: &RgbImage, params: ClaheParams) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let lab = image
        .pixels()
        .map(|pixel| rgb_to_lab(pixel.0))
        .collect::<Vec<_>>();
    let index = |x: u32, y: u32| (y as usize) * (width as usize) + x as usize;

    let lightness = GrayImage::from_fn(width, height, |x, y| {
        let l = lab[index(x, y)][0];
        Luma([(l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8])
    });
    let equalized = clahe(&lightness, params);

    RgbImage::from_fn(width, height, |x, y| {
        let [_, a, b] = lab[index(x, y)];
        let l = equalized.get_pixel(x, y)[0] as f32 * 100.0 / 255.0;
        Rgb(lab_to_rgb([l, a, b]))
    })
}

pub(crate) fn clahe(image: &GrayImage, params: ClaheParams) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }
    let tiles_x = params.tiles.clamp(1, width);
    let tiles_y = params.tiles.clamp(1, height);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        let (y0, y1) = tile_span(ty, tiles_y, height);
        for tx in 0..tiles_x {
            let (x0, x1) = tile_span(tx, tiles_x, width);
            luts.push(tile_lut(image, (x0, x1), (y0, y1), params.clip_limit));
        }
    }

    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;
    GrayImage::from_fn(width, height, |x, y| {
        let value = image.get_pixel(x, y)[0] as usize;
        let (tx0, tx1, ax) = neighbours(x as f32 / tile_w - 0.5, tiles_x);
        let (ty0, ty1, ay) = neighbours(y as f32 / tile_h - 0.5, tiles_y);
        let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][value] as f32;
        let top = lut(tx0, ty0) * (1.0 - ax) + lut(tx1, ty0) * ax;
        let bottom = lut(tx0, ty1) * (1.0 - ax) + lut(tx1, ty1) * ax;
        let mixed = top * (1.0 - ay) + bottom * ay;
        Luma([mixed.round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_span(index: u32, tiles: u32, len: u32) -> (u32, u32) {
    let start = (index as u64 * len as u64 / tiles as u64) as u32;
    let end = ((index as u64 + 1) * len as u64 / tiles as u64) as u32;
    (start, end)
}

/// Two tile indices bracketing a fractional tile position and the weight of the second one.
fn neighbours(position: f32, tiles: u32) -> (u32, u32, f32) {
    let floor = position.floor();
    let weight = position - floor;
    let last = tiles as i64 - 1;
    let first = (floor as i64).clamp(0, last) as u32;
    let second = (floor as i64 + 1).clamp(0, last) as u32;
    (first, second, weight)
}

fn tile_lut(
    image: &GrayImage,
    (x0, x1): (u32, u32),
    (y0, y1): (u32, u32),
    clip_limit: f32,
) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)).max(1);

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut clipped = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                clipped += *bin - limit;
                *bin = limit;
            }
        }
        let batch = clipped / 256;
        let mut residual = clipped % 256;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual as usize).max(1);
            let mut idx = 0usize;
            while idx < 256 && residual > 0 {
                hist[idx] += 1;
                residual -= 1;
                idx += step;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; 256];
    let mut sum = 0u32;
    for (value, count) in hist.iter().enumerate() {
        sum += count;
        lut[value] = (sum as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

const WHITE_X: f32 = 0.950456;
const WHITE_Z: f32 = 1.088754;
const EPSILON: f32 = 0.008856;
const KAPPA: f32 = 903.3;

fn rgb_to_lab([r, g, b]: [u8; 3]) -> [f32; 3] {
    let r = srgb_to_linear(r as f32 / 255.0);
    let g = srgb_to_linear(g as f32 / 255.0);
    let b = srgb_to_linear(b as f32 / 255.0);

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / WHITE_X;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > EPSILON {
        116.0 * y.cbrt() - 16.0
    } else {
        KAPPA * y
    };
    [l, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

fn lab_to_rgb([l, a, b]: [f32; 3]) -> [u8; 3] {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let y = if l > KAPPA * EPSILON {
        fy.powi(3)
    } else {
        l / KAPPA
    };
    let x = lab_f_inv(fx) * WHITE_X;
    let z = lab_f_inv(fz) * WHITE_Z;

    let r = 3.240479 * x - 1.537150 * y - 0.498535 * z;
    let g = -0.969256 * x + 1.875992 * y + 0.041556 * z;
    let b = 0.055648 * x - 0.204043 * y + 1.057311 * z;
    [to_channel(r), to_channel(g), to_channel(b)]
}

fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn lab_f_inv(t: f32) -> f32 {
    let cube = t.powi(3);
    if cube > EPSILON {
        cube
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

fn to_channel(linear: f32) -> u8 {
    let linear = linear.clamp(0.0, 1.0);
    let srgb = if linear <= 0.0031308 {
        12.92 * linear
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    };
    (srgb * 255.0).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_round_trip_is_close() {
        for rgb in [[0, 0, 0], [255, 255, 255], [200, 30, 40], [12, 180, 90], [128, 128, 128]] {
            let back = lab_to_rgb(rgb_to_lab(rgb));
            for channel in 0..3 {
                assert!(
                    rgb[channel].abs_diff(back[channel]) <= 1,
                    "{:?} -> {:?}",
                    rgb,
                    back
                );
            }
        }
    }

    #[test]
    fn white_is_full_lightness() {
        let [l, a, b] = rgb_to_lab([255, 255, 255]);
        assert!((l - 100.0).abs() < 0.1);
        assert!(a.abs() < 0.1 && b.abs() < 0.1);
    }

    #[test]
    fn clahe_stretches_low_contrast_gradient() {
        let image = GrayImage::from_fn(64, 64, |x, _| Luma([100 + (x / 4) as u8]));
        let params = ClaheParams {
            clip_limit: 2.0,
            tiles: 1,
        };
        let output = clahe(&image, params);
        let spread = |img: &GrayImage| {
            let min = img.pixels().map(|p| p[0]).min().unwrap_or(0);
            let max = img.pixels().map(|p| p[0]).max().unwrap_or(0);
            max - min
        };
        assert!(spread(&output) > spread(&image));
    }

    #[test]
    fn clahe_is_monotonic_within_a_tile() {
        let image = GrayImage::from_fn(8, 8, |x, y| Luma([(x * 8 + y) as u8 * 3]));
        let params = ClaheParams {
            clip_limit: 2.0,
            tiles: 1,
        };
        let output = clahe(&image, params);
        for y in 0..8 {
            for x in 1..8 {
                assert!(output.get_pixel(x, y)[0] >= output.get_pixel(x - 1, y)[0]);
            }
        }
    }

    #[test]
    fn tiny_images_survive() {
        let image = GrayImage::from_pixel(3, 2, Luma([50]));
        let output = clahe(&image, ClaheParams::default());
        assert_eq!(output.dimensions(), (3, 2));
        let rgb = RgbImage::new(0, 0);
        assert_eq!(enhance_contrast(&rgb, ClaheParams::default()).dimensions(), (0, 0));
    }

    #[test]
    fn tile_spans_cover_the_axis() {
        let spans = (0..8).map(|i| tile_span(i, 8, 30)).collect::<Vec<_>>();
        assert_eq!(spans.first().map(|s| s.0), Some(0));
        assert_eq!(spans.last().map(|s| s.1), Some(30));
        for pair in spans.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }
}

//! Structural similarity oracle.

use std::path::Path;

use image::DynamicImage;
use skinmatch_core::{ComparisonResult, Oracle};

use crate::decode::{DecodeCache, decode, dimensions_of};

const WINDOW: u32 = 7;
const K1: f64 = 0.01;
const K2: f64 = 0.03;

/// Scores a pair as `1 - SSIM`, averaged over every channel.
///
/// Both images must have the same width, height and color type (channel
/// count and sample depth); anything else is a dimension mismatch. Samples
/// are normalized to `[0, 1]` before comparison, and the mean is taken over
/// every full 7x7 window (smaller images use the largest odd window that
/// fits). Negative SSIM clamps the score to 1.
#[derive(Debug, Default)]
pub struct SsimOracle {
    queries: DecodeCache,
}

impl SsimOracle {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Channel-interleaved `f32` samples in `[0, 1]`, keeping the channel count.
fn samples(image: &DynamicImage) -> Vec<f32> {
    match image.color().channel_count() {
        1 => image.to_luma32f().into_raw(),
        2 => image.to_luma_alpha32f().into_raw(),
        3 => image.to_rgb32f().into_raw(),
        _ => image.to_rgba32f().into_raw(),
    }
}

/// Summed-area table over one channel, `(width + 1) * (height + 1)` entries.
struct Integral {
    stride: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn build(width: usize, height: usize, value: impl Fn(usize, usize) -> f64) -> Self {
        let stride = width + 1;
        let mut sums = vec![0.0; stride * (height + 1)];
        for y in 0..height {
            let mut row = 0.0;
            for x in 0..width {
                row += value(x, y);
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    fn window(&self, x: usize, y: usize, size: usize) -> f64 {
        let at = |x: usize, y: usize| self.sums[y * self.stride + x];
        at(x + size, y + size) - at(x, y + size) - at(x + size, y) + at(x, y)
    }
}

/// Mean SSIM of two equally shaped interleaved buffers.
pub(crate) fn mean_ssim(
    left: &[f32],
    right: &[f32],
    width: usize,
    height: usize,
    channels: usize,
) -> f64 {
    let mut size = (WINDOW as usize).min(width).min(height);
    if size % 2 == 0 {
        size -= 1;
    }
    if size == 0 || channels == 0 {
        return 1.0;
    }

    let count = (size * size) as f64;
    let cov_norm = if count > 1.0 { count / (count - 1.0) } else { 1.0 };
    let c1 = K1 * K1;
    let c2 = K2 * K2;

    let mut total = 0.0;
    let mut windows = 0usize;
    for channel in 0..channels {
        let x_at = |x: usize, y: usize| f64::from(left[(y * width + x) * channels + channel]);
        let y_at = |x: usize, y: usize| f64::from(right[(y * width + x) * channels + channel]);

        let sx = Integral::build(width, height, x_at);
        let sy = Integral::build(width, height, y_at);
        let sxx = Integral::build(width, height, |x, y| x_at(x, y) * x_at(x, y));
        let syy = Integral::build(width, height, |x, y| y_at(x, y) * y_at(x, y));
        let sxy = Integral::build(width, height, |x, y| x_at(x, y) * y_at(x, y));

        for y in 0..=(height - size) {
            for x in 0..=(width - size) {
                let ux = sx.window(x, y, size) / count;
                let uy = sy.window(x, y, size) / count;
                let vx = cov_norm * (sxx.window(x, y, size) / count - ux * ux);
                let vy = cov_norm * (syy.window(x, y, size) / count - uy * uy);
                let vxy = cov_norm * (sxy.window(x, y, size) / count - ux * uy);

                total += ((2.0 * ux * uy + c1) * (2.0 * vxy + c2))
                    / ((ux * ux + uy * uy + c1) * (vx + vy + c2));
                windows += 1;
            }
        }
    }

    total / windows as f64
}

impl Oracle for SsimOracle {
    fn compare(&self, query: &Path, candidate: &Path) -> ComparisonResult {
        let left = match self.queries.get(query) {
            Ok(image) => image,
            Err(reason) => return ComparisonResult::failure(query, candidate, reason),
        };
        let right = match decode(candidate) {
            Ok(image) => image,
            Err(reason) => return ComparisonResult::failure(query, candidate, reason),
        };

        let left_dims = dimensions_of(&left);
        let right_dims = dimensions_of(&right);
        if left_dims != right_dims || left.color() != right.color() {
            return ComparisonResult::mismatch(
                query,
                candidate,
                Some(left_dims),
                format!(
                    "{left_dims} {:?} vs {right_dims} {:?}",
                    left.color(),
                    right.color()
                ),
            );
        }

        let (left_samples, right_samples) = (samples(&left), samples(&right));
        if left_samples == right_samples {
            return ComparisonResult::success(query, candidate, 0.0, left_dims);
        }

        let ssim = mean_ssim(
            &left_samples,
            &right_samples,
            left_dims.width as usize,
            left_dims.height as usize,
            usize::from(left_dims.channels),
        );
        let score = (1.0 - ssim).clamp(0.0, 1.0);
        ComparisonResult::success(query, candidate, score, left_dims)
    }
}

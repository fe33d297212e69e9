//! Intensity-histogram oracle.

use std::path::Path;

use image::DynamicImage;
use skinmatch_core::{ComparisonResult, Dimensions, Oracle};

use crate::decode::{DecodeCache, decode, dimensions_of};

const BINS: usize = 256;

/// Compares the 256-bin luma histograms of two images.
///
/// The score is the Bhattacharyya distance divided by ten plus one minus the
/// normalized correlation of the histograms, clamped to `[0, 1]`. Sizes may
/// differ, so no dimension mismatch is ever reported.
#[derive(Debug, Default)]
pub struct HistogramOracle {
    queries: DecodeCache,
}

impl HistogramOracle {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn histogram(image: &DynamicImage) -> [f64; BINS] {
    let mut bins = [0.0; BINS];
    for pixel in image.to_luma8().pixels() {
        bins[usize::from(pixel[0])] += 1.0;
    }
    bins
}

/// Bhattacharyya distance between two histograms, in `[0, 1]`.
pub(crate) fn bhattacharyya(left: &[f64; BINS], right: &[f64; BINS]) -> f64 {
    let (left_total, right_total): (f64, f64) = (left.iter().sum(), right.iter().sum());
    if left_total == 0.0 || right_total == 0.0 {
        return if left_total == right_total { 0.0 } else { 1.0 };
    }

    let overlap: f64 = left.iter().zip(right).map(|(a, b)| (a * b).sqrt()).sum();
    (1.0 - overlap / (left_total * right_total).sqrt()).max(0.0).sqrt()
}

/// Zero-mean normalized cross-correlation of two histograms, in `[-1, 1]`.
pub(crate) fn correlation(left: &[f64; BINS], right: &[f64; BINS]) -> f64 {
    let mean = |bins: &[f64; BINS]| bins.iter().sum::<f64>() / BINS as f64;
    let (left_mean, right_mean) = (mean(left), mean(right));

    let (mut cross, mut left_var, mut right_var) = (0.0, 0.0, 0.0);
    for (a, b) in left.iter().zip(right) {
        let (da, db) = (a - left_mean, b - right_mean);
        cross += da * db;
        left_var += da * da;
        right_var += db * db;
    }

    let norm = (left_var * right_var).sqrt();
    if norm == 0.0 {
        return if left == right { 1.0 } else { 0.0 };
    }
    (cross / norm).clamp(-1.0, 1.0)
}

impl Oracle for HistogramOracle {
    fn compare(&self, query: &Path, candidate: &Path) -> ComparisonResult {
        let left = match self.queries.get(query) {
            Ok(image) => image,
            Err(reason) => return ComparisonResult::failure(query, candidate, reason),
        };
        let right = match decode(candidate) {
            Ok(image) => image,
            Err(reason) => return ComparisonResult::failure(query, candidate, reason),
        };

        let dims: Dimensions = dimensions_of(&left);
        let (left_hist, right_hist) = (histogram(&left), histogram(&right));
        if left_hist == right_hist {
            return ComparisonResult::success(query, candidate, 0.0, dims);
        }

        let score = bhattacharyya(&left_hist, &right_hist) / 10.0
            + (1.0 - correlation(&left_hist, &right_hist));
        ComparisonResult::success(query, candidate, score.clamp(0.0, 1.0), dims)
    }
}

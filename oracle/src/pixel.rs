//! Per-pixel difference oracle.

use std::path::Path;

use image::DynamicImage;
use skinmatch_core::{ComparisonResult, Oracle};

use crate::decode::{DecodeCache, decode, dimensions_of};

/// Compares two images pixel by pixel.
///
/// Images must share width, height and channel count; otherwise the pair is
/// reported as a dimension mismatch. The score is the mean absolute
/// difference of the RGBA8 samples, normalized to `[0, 1]`. Query images are
/// decoded once and reused across candidates.
#[derive(Debug, Default)]
pub struct PixelOracle {
    queries: DecodeCache,
}

impl PixelOracle {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Mean absolute difference of two equally sized RGBA8 buffers, in `[0, 1]`.
fn mean_abs_difference(left: &DynamicImage, right: &DynamicImage) -> f64 {
    let left = left.to_rgba8();
    let right = right.to_rgba8();
    let samples = left.as_raw().len();
    if samples == 0 {
        return 0.0;
    }

    let total: u64 = left
        .as_raw()
        .iter()
        .zip(right.as_raw())
        .map(|(a, b)| u64::from(a.abs_diff(*b)))
        .sum();

    total as f64 / (samples as f64 * 255.0)
}

impl Oracle for PixelOracle {
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
        if left_dims != right_dims {
            return ComparisonResult::mismatch(
                query,
                candidate,
                Some(left_dims),
                format!("{left_dims} vs {right_dims}"),
            );
        }

        let score = mean_abs_difference(&left, &right);
        ComparisonResult::success(query, candidate, score, left_dims)
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage, RgbImage};
    use skinmatch_core::{CompareStatus, Dimensions};

    use super::*;

    fn write_rgba(path: &Path, width: u32, height: u32, pixel: [u8; 4]) {
        RgbaImage::from_pixel(width, height, Rgba(pixel))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_identical_images_score_zero() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_rgba(&a, 4, 4, [10, 20, 30, 255]);
        write_rgba(&b, 4, 4, [10, 20, 30, 255]);

        let result = PixelOracle::new().compare(&a, &b);
        assert_eq!(result.status(), CompareStatus::Success);
        assert!(result.is_exact());
        assert_eq!(result.dimensions(), Some(Dimensions::new(4, 4, 4)));
    }

    #[test]
    fn test_difference_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let black = dir.path().join("black.png");
        let white = dir.path().join("white.png");
        write_rgba(&black, 2, 2, [0, 0, 0, 255]);
        write_rgba(&white, 2, 2, [255, 255, 255, 255]);

        let score = PixelOracle::new().compare(&black, &white).score().unwrap();
        assert!((score - 0.75).abs() < 1e-9, "three of four channels differ fully: {score}");
    }

    #[test]
    fn test_size_difference_is_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let small = dir.path().join("small.png");
        let large = dir.path().join("large.png");
        write_rgba(&small, 2, 2, [0, 0, 0, 255]);
        write_rgba(&large, 4, 2, [0, 0, 0, 255]);

        let result = PixelOracle::new().compare(&small, &large);
        assert_eq!(result.status(), CompareStatus::DimensionMismatch);
        assert_eq!(result.score(), None);
        assert_eq!(result.reason(), Some("2x2x4 vs 4x2x4"));
    }

    #[test]
    fn test_channel_difference_is_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let rgba = dir.path().join("rgba.png");
        let rgb = dir.path().join("rgb.png");
        write_rgba(&rgba, 2, 2, [0, 0, 0, 255]);
        RgbImage::from_pixel(2, 2, image::Rgb([0, 0, 0]))
            .save(&rgb)
            .unwrap();

        let result = PixelOracle::new().compare(&rgba, &rgb);
        assert_eq!(result.status(), CompareStatus::DimensionMismatch);
    }

    #[test]
    fn test_query_is_decoded_once() {
        let dir = tempfile::tempdir().unwrap();
        let query = dir.path().join("query.png");
        let first = dir.path().join("first.png");
        let second = dir.path().join("second.png");
        for path in [&query, &first, &second] {
            write_rgba(path, 2, 2, [9, 9, 9, 255]);
        }

        let oracle = PixelOracle::new();
        assert!(oracle.compare(&query, &first).is_exact());
        std::fs::remove_file(&query).unwrap();
        assert!(oracle.compare(&query, &second).is_exact());
    }

    #[test]
    fn test_undecodable_file_is_oracle_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.png");
        let broken = dir.path().join("broken.png");
        write_rgba(&good, 2, 2, [0, 0, 0, 255]);
        std::fs::write(&broken, b"not a png").unwrap();

        let result = PixelOracle::new().compare(&good, &broken);
        assert_eq!(result.status(), CompareStatus::OracleFailure);
        assert!(result.reason().unwrap().contains("broken.png"));
    }
}

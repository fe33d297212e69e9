//! Perceptual difference-hash oracle.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use image::imageops::FilterType;
use image::DynamicImage;
use skinmatch_core::{ComparisonResult, Dimensions, Oracle};

use crate::decode::{decode, dimensions_of};

const HASH_BITS: u32 = 64;

/// Compares images by their 64-bit difference hash.
///
/// The hash is computed on a 9x8 grayscale thumbnail, so images of any size
/// can be compared and no dimension mismatch is ever reported. The score is
/// the Hamming distance divided by 64. Hashes are memoized per path because
/// every candidate is hashed once per query.
#[derive(Debug, Default)]
pub struct HashOracle {
    cache: RwLock<HashMap<PathBuf, Result<(u64, Dimensions), String>>>,
}

impl HashOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn fingerprint(&self, path: &Path) -> Result<(u64, Dimensions), String> {
        if let Ok(cache) = self.cache.read() {
            if let Some(entry) = cache.get(path) {
                return entry.clone();
            }
        }

        let entry = decode(path).map(|image| (dhash(&image), dimensions_of(&image)));
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(path.to_path_buf(), entry.clone());
        }
        entry
    }
}

/// Row-wise difference hash: bit set where a pixel is brighter than its right
/// neighbour.
pub fn dhash(image: &DynamicImage) -> u64 {
    let thumb = image.resize_exact(9, 8, FilterType::Triangle).to_luma8();
    let mut hash = 0u64;
    for y in 0..8 {
        for x in 0..8 {
            let left = thumb.get_pixel(x, y)[0];
            let right = thumb.get_pixel(x + 1, y)[0];
            hash = (hash << 1) | u64::from(left > right);
        }
    }
    hash
}

impl Oracle for HashOracle {
    fn compare(&self, query: &Path, candidate: &Path) -> ComparisonResult {
        let (query_hash, query_dims) = match self.fingerprint(query) {
            Ok(fingerprint) => fingerprint,
            Err(reason) => return ComparisonResult::failure(query, candidate, reason),
        };
        let (candidate_hash, _) = match self.fingerprint(candidate) {
            Ok(fingerprint) => fingerprint,
            Err(reason) => return ComparisonResult::failure(query, candidate, reason),
        };

        let distance = (query_hash ^ candidate_hash).count_ones();
        ComparisonResult::success(
            query,
            candidate,
            f64::from(distance) / f64::from(HASH_BITS),
            query_dims,
        )
    }
}

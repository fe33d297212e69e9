//! Image decoding shared by the oracles, plus a small memo for query images.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, GenericImageView};
use skinmatch_core::Dimensions;
use tracing::debug;

/// Queries kept decoded at once. Collection runs have up to one query in
/// flight per worker, so a handful of slots covers them.
pub(crate) const QUERY_CACHE_CAPACITY: usize = 16;

type Decoded = Result<Arc<DynamicImage>, String>;

pub(crate) fn decode(path: &Path) -> Result<DynamicImage, String> {
    image::open(path).map_err(|err| {
        debug!(path = %path.display(), error = %err, "Failed to decode image");
        format!("failed to decode '{}': {err}", path.display())
    })
}

pub(crate) fn dimensions_of(image: &DynamicImage) -> Dimensions {
    let (width, height) = image.dimensions();
    Dimensions::new(width, height, image.color().channel_count())
}

/// Bounded first-in first-out memo of decoded images.
///
/// A query is compared against every candidate of the pool, so the oracles
/// decode it once and reuse the result. Decode errors are cached too. The
/// lock is never held while decoding.
#[derive(Debug)]
pub(crate) struct DecodeCache {
    capacity: usize,
    entries: Mutex<VecDeque<(PathBuf, Decoded)>>,
}

impl Default for DecodeCache {
    fn default() -> Self {
        Self::new(QUERY_CACHE_CAPACITY)
    }
}

impl DecodeCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub(crate) fn get(&self, path: &Path) -> Decoded {
        if let Some(hit) = self.lookup(path) {
            return hit;
        }

        let decoded = decode(path).map(Arc::new);
        if self.capacity > 0 {
            if let Ok(mut entries) = self.entries.lock() {
                if !entries.iter().any(|(cached, _)| cached == path) {
                    if entries.len() >= self.capacity {
                        entries.pop_front();
                    }
                    entries.push_back((path.to_path_buf(), decoded.clone()));
                }
            }
        }
        decoded
    }

    fn lookup(&self, path: &Path) -> Option<Decoded> {
        let entries = self.entries.lock().ok()?;
        entries
            .iter()
            .find(|(cached, _)| cached == path)
            .map(|(_, decoded)| decoded.clone())
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

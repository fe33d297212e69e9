//! Header-only oracle comparing file format, size and name.

use std::path::Path;

use image::{ImageDecoder, ImageFormat, ImageReader};
use skinmatch_core::{ComparisonResult, Dimensions, Oracle};

/// Format and dimensions read from an image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    format: ImageFormat,
    dimensions: Dimensions,
}

impl Header {
    fn read(path: &Path) -> Result<Self, String> {
        let fail = |err: &dyn std::fmt::Display| {
            format!("failed to read header of '{}': {err}", path.display())
        };

        let reader = ImageReader::open(path)
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|err| fail(&err))?;
        let format = reader
            .format()
            .ok_or_else(|| fail(&"unknown image format"))?;
        let decoder = reader.into_decoder().map_err(|err| fail(&err))?;
        let (width, height) = decoder.dimensions();
        let channels = decoder.color_type().channel_count();

        Ok(Self {
            format,
            dimensions: Dimensions::new(width, height, channels),
        })
    }

    fn same_shape(&self, other: &Self) -> bool {
        self.format == other.format
            && self.dimensions.width == other.dimensions.width
            && self.dimensions.height == other.dimensions.height
    }
}

/// Matches files by metadata alone, without decoding pixels.
///
/// A pair whose format, width or height differ is a dimension mismatch.
/// Otherwise a pair with the same file name is an exact match and any other
/// pair is an oracle failure. Channel count is reported but not compared.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataOracle;

impl MetadataOracle {
    pub fn new() -> Self {
        Self
    }
}

impl Oracle for MetadataOracle {
    fn compare(&self, query: &Path, candidate: &Path) -> ComparisonResult {
        let left = match Header::read(query) {
            Ok(header) => header,
            Err(reason) => return ComparisonResult::failure(query, candidate, reason),
        };
        let right = match Header::read(candidate) {
            Ok(header) => header,
            Err(reason) => return ComparisonResult::failure(query, candidate, reason),
        };

        if !left.same_shape(&right) {
            return ComparisonResult::mismatch(
                query,
                candidate,
                Some(left.dimensions),
                format!(
                    "{:?} {} vs {:?} {}",
                    left.format, left.dimensions, right.format, right.dimensions
                ),
            );
        }

        if query.file_name() == candidate.file_name() {
            ComparisonResult::success(query, candidate, 0.0, left.dimensions)
        } else {
            ComparisonResult::failure(query, candidate, "file name differs")
        }
    }
}

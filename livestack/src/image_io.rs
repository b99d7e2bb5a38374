//! Row-oriented pixel access for light frames, calibration masters and stacks.
//!
//! Frames are consumed through [`PixelSource`], which hands out single rows
//! normalized to `[0,1]` with random row access. Whole buffers are written
//! through an [`ImageCodec`] together with header cards. The production codec
//! is FITS via `fitsio` ([`FitsCodec`]).

pub(crate) mod error;
mod fits;
mod memory;

use std::fmt;
use std::path::Path;

pub use error::ImageIoError;
pub use fits::FitsCodec;
pub use memory::MemoryPixelSource;

/// Random-access row reader over a single-plane image.
pub trait PixelSource {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Reads row `row` (0-indexed) as `width` floats normalized to `[0,1]`.
    fn read_row(&mut self, row: usize) -> Result<Vec<f32>, ImageIoError>;

    /// Reads a numeric header card, `None` when absent or not numeric.
    fn read_header_f64(&mut self, key: &str) -> Option<f64>;

    /// Reads every row into one contiguous buffer.
    fn read_all(&mut self) -> Result<Vec<f32>, ImageIoError> {
        let (width, height) = (self.width(), self.height());
        let mut pixels = Vec::with_capacity(width * height);
        for row in 0..height {
            let data = self.read_row(row)?;
            if data.len() != width {
                return Err(ImageIoError::RowLength {
                    row,
                    expected: width,
                    actual: data.len(),
                });
            }
            pixels.extend_from_slice(&data);
        }
        Ok(pixels)
    }
}

/// Value of a header card.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Named header key/value written alongside a pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCard {
    pub key: String,
    pub value: HeaderValue,
}

impl HeaderCard {
    pub fn int(key: &str, value: i64) -> Self {
        Self {
            key: key.to_string(),
            value: HeaderValue::Int(value),
        }
    }

    pub fn float(key: &str, value: f64) -> Self {
        Self {
            key: key.to_string(),
            value: HeaderValue::Float(value),
        }
    }

    pub fn text(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: HeaderValue::Text(value.to_string()),
        }
    }
}

/// Opens and writes image files of one on-disk format.
pub trait ImageCodec: Send + Sync + fmt::Debug {
    fn open(&self, path: &Path) -> Result<Box<dyn PixelSource>, ImageIoError>;

    /// Writes a `width * height` buffer plus header cards, replacing any existing file.
    fn write(
        &self,
        path: &Path,
        width: usize,
        height: usize,
        pixels: &[f32],
        headers: &[HeaderCard],
    ) -> Result<(), ImageIoError>;

    /// File extension (without dot) of files this codec produces.
    fn extension(&self) -> &'static str {
        "fits"
    }
}

/// Writes to `<path>.tmp` and renames over `path`.
///
/// A crash or error mid-write leaves the previous `path` intact.
pub fn write_atomic(
    codec: &dyn ImageCodec,
    path: &Path,
    width: usize,
    height: usize,
    pixels: &[f32],
    headers: &[HeaderCard],
) -> Result<(), ImageIoError> {
    if pixels.len() != width * height {
        return Err(ImageIoError::BufferSize {
            expected: width * height,
            actual: pixels.len(),
        });
    }

    let temp = common::file_utils::temp_path_for(path);
    common::file_utils::remove_file_if_exists(&temp).map_err(|source| ImageIoError::Io {
        path: temp.clone(),
        source,
    })?;

    codec.write(&temp, width, height, pixels, headers)?;

    common::file_utils::replace_file(&temp, path).map_err(|source| ImageIoError::Io {
        path: path.to_path_buf(),
        source,
    })
}

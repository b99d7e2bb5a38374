use std::collections::HashMap;

use super::{ImageIoError, PixelSource};

/// Pixel source over a buffer already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPixelSource {
    width: usize,
    height: usize,
    pixels: Vec<f32>,
    headers: HashMap<String, f64>,
}

impl MemoryPixelSource {
    /// # Panics
    /// Panics if `pixels.len() != width * height`.
    pub fn new(width: usize, height: usize, pixels: Vec<f32>) -> Self {
        assert_eq!(
            pixels.len(),
            width * height,
            "pixels length must equal width * height"
        );
        Self {
            width,
            height,
            pixels,
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: f64) -> Self {
        self.headers.insert(key.to_string(), value);
        self
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }
}

impl PixelSource for MemoryPixelSource {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn read_row(&mut self, row: usize) -> Result<Vec<f32>, ImageIoError> {
        if row >= self.height {
            return Err(ImageIoError::RowOutOfRange {
                row,
                height: self.height,
            });
        }
        let start = row * self.width;
        Ok(self.pixels[start..start + self.width].to_vec())
    }

    fn read_header_f64(&mut self, key: &str) -> Option<f64> {
        self.headers.get(key).copied()
    }
}

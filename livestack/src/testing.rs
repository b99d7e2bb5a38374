//! Test helpers: a dependency-free on-disk codec and synthetic star fields.

use std::fs;
use std::io::Write;
use std::path::Path;

use glam::DVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::image_io::{HeaderCard, HeaderValue, ImageCodec, ImageIoError, MemoryPixelSource, PixelSource};
use crate::registration::{BoundingBox, DetectedStar};

/// Codec writing a JSON header line followed by little-endian f32 pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

#[derive(Serialize, Deserialize)]
struct RawHeader {
    width: usize,
    height: usize,
    headers: Vec<(String, serde_json::Value)>,
}

impl ImageCodec for RawCodec {
    fn open(&self, path: &Path) -> Result<Box<dyn PixelSource>, ImageIoError> {
        let bytes = fs::read(path).map_err(|source| ImageIoError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let layout = |reason: String| ImageIoError::UnsupportedLayout {
            path: path.to_path_buf(),
            reason,
        };

        let split = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| layout("missing header line".to_string()))?;
        let header: RawHeader =
            serde_json::from_slice(&bytes[..split]).map_err(|e| layout(e.to_string()))?;

        let body = &bytes[split + 1..];
        if body.len() != header.width * header.height * 4 {
            return Err(layout(format!("body has {} bytes", body.len())));
        }
        let pixels = body
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let mut source = MemoryPixelSource::new(header.width, header.height, pixels);
        for (key, value) in header.headers {
            if let Some(v) = value.as_f64() {
                source = source.with_header(&key, v);
            }
        }
        Ok(Box::new(source))
    }

    fn write(
        &self,
        path: &Path,
        width: usize,
        height: usize,
        pixels: &[f32],
        headers: &[HeaderCard],
    ) -> Result<(), ImageIoError> {
        let header = RawHeader {
            width,
            height,
            headers: headers
                .iter()
                .map(|card| {
                    let value = match &card.value {
                        HeaderValue::Int(v) => serde_json::Value::from(*v),
                        HeaderValue::Float(v) => serde_json::Value::from(*v),
                        HeaderValue::Text(v) => serde_json::Value::from(v.as_str()),
                    };
                    (card.key.clone(), value)
                })
                .collect(),
        };

        let io_err = |source| ImageIoError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = fs::File::create(path).map_err(io_err)?;
        let line = serde_json::to_vec(&header).map_err(|e| ImageIoError::UnsupportedLayout {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        file.write_all(&line).map_err(io_err)?;
        file.write_all(b"\n").map_err(io_err)?;
        let body: Vec<u8> = pixels.iter().flat_map(|p| p.to_le_bytes()).collect();
        file.write_all(&body).map_err(io_err)
    }
}

/// Writes a raw frame and returns its path.
pub fn write_raw(dir: &Path, name: &str, width: usize, height: usize, pixels: &[f32]) -> std::path::PathBuf {
    let path = dir.join(name);
    RawCodec.write(&path, width, height, pixels, &[]).unwrap();
    path
}

/// Deterministic star positions kept `margin` pixels away from the borders
/// and at least 6 px apart.
pub fn star_positions(count: usize, width: usize, height: usize, seed: u64) -> Vec<DVec2> {
    let margin = 10.0;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut positions: Vec<DVec2> = Vec::with_capacity(count);
    while positions.len() < count {
        let p = DVec2::new(
            rng.random_range(margin..width as f64 - margin),
            rng.random_range(margin..height as f64 - margin),
        );
        if positions.iter().all(|q| q.distance(p) > 6.0) {
            positions.push(p);
        }
    }
    positions
}

/// Detected-star records for `positions`, brightest first.
pub fn detected_stars(positions: &[DVec2]) -> Vec<DetectedStar> {
    positions
        .iter()
        .enumerate()
        .map(|(i, &position)| DetectedStar {
            position,
            average_brightness: 20_000.0 - i as f64 * 50.0,
            max_brightness: 40_000.0 - i as f64 * 100.0,
            background: 500.0,
            bounding_box: BoundingBox {
                x: position.x as i32 - 3,
                y: position.y as i32 - 3,
                width: 7,
                height: 7,
            },
            hfr: 2.0,
        })
        .collect()
}

/// Gaussian star field on a flat background.
pub fn render_star_field(width: usize, height: usize, positions: &[DVec2], background: f32) -> Vec<f32> {
    let sigma = 1.5f64;
    let mut pixels = vec![background; width * height];
    for p in positions {
        let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
        for y in (cy - 5).max(0)..(cy + 6).min(height as i64) {
            for x in (cx - 5).max(0)..(cx + 6).min(width as i64) {
                let d2 = (x as f64 - p.x).powi(2) + (y as f64 - p.y).powi(2);
                let v = 0.5 * (-d2 / (2.0 * sigma * sigma)).exp();
                let idx = y as usize * width + x as usize;
                pixels[idx] = (pixels[idx] + v as f32).min(1.0);
            }
        }
    }
    pixels
}

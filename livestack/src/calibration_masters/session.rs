use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use super::{CalibrationError, CalibrationFrameMeta, CalibrationKind, CalibrationLibrary, CalibrationMaster, FrameIdentity};
use crate::image_io::{ImageCodec, PixelSource};

/// Library snapshot plus the masters opened while processing frames.
///
/// Masters are opened on first use and kept with their row caches until the
/// session is dropped.
#[derive(Debug)]
pub struct CalibrationSession {
    library: CalibrationLibrary,
    codec: Arc<dyn ImageCodec>,
    use_bias_for_lights: bool,
    masters: HashMap<(CalibrationKind, usize), CalibrationMaster>,
}

/// Rows of one selected master, `None` when no master applies.
type MasterRows<'a> = Option<Vec<&'a [f32]>>;

impl CalibrationSession {
    pub fn new(library: CalibrationLibrary, codec: Arc<dyn ImageCodec>, use_bias_for_lights: bool) -> Self {
        Self {
            library,
            codec,
            use_bias_for_lights,
            masters: HashMap::new(),
        }
    }

    pub fn library(&self) -> &CalibrationLibrary {
        &self.library
    }

    /// Adds a master to the snapshot, e.g. a flat built during this session.
    pub fn register_master(&mut self, meta: CalibrationFrameMeta) -> bool {
        self.library.register(meta)
    }

    /// Number of masters currently open.
    pub fn open_masters(&self) -> usize {
        self.masters.len()
    }

    /// Bias/dark/flat corrected light frame, normalized to `[0,1]`.
    ///
    /// Per pixel: subtract bias (when enabled) and dark, clamp to `[0,1]`,
    /// divide by `flat / flat_mean`. Channels without a matching master are
    /// skipped.
    pub fn calibrate_light(
        &mut self,
        source: &mut dyn PixelSource,
        frame: &FrameIdentity,
    ) -> Result<Vec<f32>, CalibrationError> {
        let bias = if self.use_bias_for_lights {
            self.prepare(CalibrationKind::Bias, frame)?
        } else {
            None
        };
        let dark = self.prepare(CalibrationKind::Dark, frame)?;
        let flat = self.prepare(CalibrationKind::Flat, frame)?;

        let flat_mean = match flat.and_then(|key| self.masters.get_mut(&key)) {
            Some(master) => Some(master.mean()? as f32),
            None => None,
        };

        let light = self.read_frame(source, frame, [bias, dark, flat])?;

        let bias_rows = self.rows(bias);
        let dark_rows = self.rows(dark);
        let flat_rows = self.rows(flat);

        tracing::debug!(
            bias = bias.is_some(),
            dark = dark.is_some(),
            flat = flat.is_some(),
            "Calibrating light frame"
        );

        let width = frame.width;
        let mut output = light;
        output.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            let bias_row = bias_rows.as_ref().map(|r| r[y]);
            let dark_row = dark_rows.as_ref().map(|r| r[y]);
            let flat_row = flat_rows.as_ref().zip(flat_mean).map(|(r, mean)| (r[y], mean));

            for (x, v) in row.iter_mut().enumerate() {
                let mut value = *v;
                if let Some(b) = bias_row {
                    value -= b[x];
                }
                if let Some(d) = dark_row {
                    value -= d[x];
                }
                value = value.clamp(0.0, 1.0);

                if let Some((f, mean)) = flat_row {
                    let normalized = f[x] / mean;
                    if normalized > common::EPSILON as f32 {
                        value /= normalized;
                    }
                }
                *v = value.clamp(0.0, 1.0);
            }
        });

        Ok(output)
    }

    /// Bias or dark corrected raw flat, used when building flat masters.
    ///
    /// Applies the bias master when one matches, otherwise the dark master.
    /// Never applies a flat.
    pub fn calibrate_flat(
        &mut self,
        source: &mut dyn PixelSource,
        frame: &FrameIdentity,
    ) -> Result<Vec<f32>, CalibrationError> {
        let offset_master = match self.prepare(CalibrationKind::Bias, frame)? {
            Some(bias) => Some(bias),
            None => self.prepare(CalibrationKind::Dark, frame)?,
        };

        let raw = self.read_frame(source, frame, [offset_master, None, None])?;
        let offset_rows = self.rows(offset_master);

        let mut output = raw;
        output.par_chunks_mut(frame.width).enumerate().for_each(|(y, row)| {
            let offset_row = offset_rows.as_ref().map(|r| r[y]);
            for (x, v) in row.iter_mut().enumerate() {
                let mut value = *v;
                if let Some(o) = offset_row {
                    value -= o[x];
                }
                *v = value.clamp(0.0, 1.0);
            }
        });

        Ok(output)
    }

    /// Selects the master of `kind` for `frame` and opens it if needed.
    fn prepare(
        &mut self,
        kind: CalibrationKind,
        frame: &FrameIdentity,
    ) -> Result<Option<(CalibrationKind, usize)>, CalibrationError> {
        let Some(index) = self.library.select(kind, frame) else {
            return Ok(None);
        };
        let key = (kind, index);

        if !self.masters.contains_key(&key) {
            let meta = self.library.entries(kind)[index].clone();
            tracing::info!(kind = %kind, path = %meta.path.display(), "Opening calibration master");
            let master = CalibrationMaster::open(meta, self.codec.as_ref())?;
            self.masters.insert(key, master);
        }

        Ok(Some(key))
    }

    /// Reads every frame row and warms the row caches of `masters`.
    fn read_frame(
        &mut self,
        source: &mut dyn PixelSource,
        frame: &FrameIdentity,
        masters: [Option<(CalibrationKind, usize)>; 3],
    ) -> Result<Vec<f32>, CalibrationError> {
        let actual = (source.width(), source.height());
        if actual != frame.dimensions() {
            return Err(CalibrationError::FrameDimensions {
                expected: frame.dimensions(),
                actual,
            });
        }

        let (width, height) = actual;
        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            for key in masters.iter().flatten() {
                if let Some(master) = self.masters.get_mut(key) {
                    master.row(y)?;
                }
            }

            let row = source.read_row(y).map_err(CalibrationError::FrameRead)?;
            if row.len() != width {
                return Err(CalibrationError::FrameDimensions {
                    expected: frame.dimensions(),
                    actual: (row.len(), height),
                });
            }
            pixels.extend_from_slice(&row);
        }
        Ok(pixels)
    }

    /// Cached rows of an opened master. All rows must have been read.
    fn rows(&self, key: Option<(CalibrationKind, usize)>) -> MasterRows<'_> {
        let master = self.masters.get(&key?)?;
        (0..master.meta().height)
            .map(|y| master.cached_row(y))
            .collect()
    }
}

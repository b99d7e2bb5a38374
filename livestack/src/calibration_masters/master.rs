use super::{CalibrationError, CalibrationFrameMeta};
use crate::image_io::{ImageCodec, PixelSource};

/// Open calibration master with a row cache.
///
/// Rows are read from the underlying source at most once. Dropping the
/// master closes the source.
pub struct CalibrationMaster {
    meta: CalibrationFrameMeta,
    source: Box<dyn PixelSource>,
    rows: Vec<Option<Vec<f32>>>,
}

impl std::fmt::Debug for CalibrationMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationMaster")
            .field("meta", &self.meta)
            .field("cached_rows", &self.cached_row_count())
            .finish()
    }
}

impl CalibrationMaster {
    /// Opens the file named by `meta` and checks it against the registered size.
    pub fn open(meta: CalibrationFrameMeta, codec: &dyn ImageCodec) -> Result<Self, CalibrationError> {
        let source = codec
            .open(&meta.path)
            .map_err(|source| CalibrationError::MasterUnavailable {
                kind: meta.kind,
                path: meta.path.clone(),
                source,
            })?;
        Self::from_source(meta, source)
    }

    pub fn from_source(
        meta: CalibrationFrameMeta,
        source: Box<dyn PixelSource>,
    ) -> Result<Self, CalibrationError> {
        let actual = (source.width(), source.height());
        if actual != meta.dimensions() {
            return Err(CalibrationError::MasterDimensions {
                kind: meta.kind,
                path: meta.path.clone(),
                expected: meta.dimensions(),
                actual,
            });
        }

        let rows = vec![None; meta.height];
        Ok(Self { meta, source, rows })
    }

    pub fn meta(&self) -> &CalibrationFrameMeta {
        &self.meta
    }

    /// Row `row`, read on first access and cached afterwards.
    pub fn row(&mut self, row: usize) -> Result<&[f32], CalibrationError> {
        let width = self.meta.width;
        let slot = self.rows.get_mut(row).ok_or_else(|| CalibrationError::MasterRead {
            kind: self.meta.kind,
            path: self.meta.path.clone(),
            source: crate::image_io::ImageIoError::RowOutOfRange {
                row,
                height: self.meta.height,
            },
        })?;

        if slot.is_none() {
            let data = self.source.read_row(row).map_err(|source| CalibrationError::MasterRead {
                kind: self.meta.kind,
                path: self.meta.path.clone(),
                source,
            })?;
            if data.len() != width {
                return Err(CalibrationError::MasterDimensions {
                    kind: self.meta.kind,
                    path: self.meta.path.clone(),
                    expected: self.meta.dimensions(),
                    actual: (data.len(), self.meta.height),
                });
            }
            *slot = Some(data);
        }

        Ok(slot.as_deref().unwrap_or_default())
    }

    /// Cached row `row`, `None` if it has not been read yet.
    pub fn cached_row(&self, row: usize) -> Option<&[f32]> {
        self.rows.get(row).and_then(|r| r.as_deref())
    }

    pub fn cached_row_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_some()).count()
    }

    /// Mean pixel value, from the registered meta or computed over all rows.
    pub fn mean(&mut self) -> Result<f64, CalibrationError> {
        if let Some(mean) = self.meta.known_mean() {
            return Ok(mean);
        }

        let mut sum = 0.0f64;
        for row in 0..self.meta.height {
            sum += self.row(row)?.iter().map(|&v| v as f64).sum::<f64>();
        }
        let count = (self.meta.width * self.meta.height).max(1) as f64;
        let mean = sum / count;
        self.meta.mean = mean;
        Ok(mean)
    }
}

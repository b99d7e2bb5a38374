//! Flat master generation from a session's raw flat frames.
//!
//! Each raw flat is bias/dark corrected and parked under `temp/` with its
//! median in a `MEDIAN` header. [`FlatMasterBuilder::finish`] then
//! percentile-clips every filter group into a master under `stacks/` and
//! registers it as a flat master.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::file_utils::{random_file_name, remove_file_if_exists, sanitize_file_name, unique_file_path};

use super::{BagKey, LiveStackError, LiveStackItem};
use crate::calibration_masters::{CalibrationFrameMeta, CalibrationLibrary, CalibrationSession, normalize_filter};
use crate::image_io::{HeaderCard, ImageCodec, PixelSource, write_atomic};
use crate::math::statistics::median_and_mad;
use crate::stacking::{PercentileClip, percentile_clip};

/// Fewest calibrated flats a master is built from.
pub const MIN_FLAT_FRAMES: usize = 3;

/// Collects calibrated flats per filter and integrates them into masters.
#[derive(Debug)]
pub struct FlatMasterBuilder {
    working_dir: PathBuf,
    codec: Arc<dyn ImageCodec>,
    delete_raw_frames: bool,
    clip: PercentileClip,
    frames: BTreeMap<String, Vec<PathBuf>>,
}

impl FlatMasterBuilder {
    pub fn new(working_dir: impl Into<PathBuf>, codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            working_dir: working_dir.into(),
            codec,
            delete_raw_frames: true,
            clip: PercentileClip::FLAT,
            frames: BTreeMap::new(),
        }
    }

    pub fn with_delete_raw_frames(mut self, delete: bool) -> Self {
        self.delete_raw_frames = delete;
        self
    }

    pub fn with_clip(mut self, clip: PercentileClip) -> Self {
        self.clip = clip;
        self
    }

    /// Calibrated frames collected for `filter`.
    pub fn frame_count(&self, filter: &str) -> usize {
        self.frames.get(&normalize_filter(filter)).map_or(0, Vec::len)
    }

    /// Calibrates one raw flat and stores it until [`finish`](Self::finish).
    ///
    /// Returns the path of the calibrated copy.
    pub fn add_frame(
        &mut self,
        calibration: &mut CalibrationSession,
        item: &LiveStackItem,
    ) -> Result<PathBuf, LiveStackError> {
        let filter = normalize_filter(&item.filter);
        tracing::debug!(path = %item.path.display(), filter = %filter, "Preparing flat frame for stack");

        let pixels = {
            let mut source = self.codec.open(&item.path)?;
            calibration.calibrate_flat(source.as_mut(), &item.identity())?
        };

        tracing::debug!("Computing median after calibration");
        let median = median_and_mad(&pixels).median;

        let dir = self.working_dir.join("temp");
        create_dir(&dir)?;
        let path = unique_file_path(&dir.join(random_file_name(self.codec.extension())));

        tracing::info!(path = %path.display(), "Saving calibrated flat frame");
        let headers = [
            HeaderCard::int("GAIN", i64::from(item.gain)),
            HeaderCard::int("OFFSET", i64::from(item.offset)),
            HeaderCard::float("EXPOSURE", item.exposure_time),
            HeaderCard::text("FILTER", &filter),
            HeaderCard::float("MEDIAN", median),
        ];
        write_atomic(self.codec.as_ref(), &path, item.width, item.height, &pixels, &headers)?;
        self.frames.entry(filter).or_default().push(path.clone());

        if self.delete_raw_frames {
            remove_file_if_exists(&item.path).map_err(|source| LiveStackError::Io {
                path: item.path.clone(),
                source,
            })?;
        }
        Ok(path)
    }

    /// Builds one master per filter and registers it in `library`.
    ///
    /// Filters fail independently. Calibrated intermediates are removed
    /// whether or not their master could be built.
    pub fn finish(
        self,
        target: &str,
        library: &mut CalibrationLibrary,
    ) -> Vec<(String, Result<CalibrationFrameMeta, LiveStackError>)> {
        if self.frames.is_empty() {
            tracing::info!("No flat frames to stack");
            return Vec::new();
        }

        let target = BagKey::new(target, "").target;
        let mut results = Vec::with_capacity(self.frames.len());
        for (filter, paths) in &self.frames {
            let result = self.build_master(&target, filter, paths);
            match &result {
                Ok(meta) => {
                    library.register(meta.clone());
                }
                Err(err) => {
                    tracing::error!(filter = %filter, error = %err, "Failed to generate flat master");
                }
            }

            tracing::info!(filter = %filter, "Cleaning up flat files");
            for path in paths {
                if let Err(err) = remove_file_if_exists(path) {
                    tracing::error!(path = %path.display(), error = %err, "Failed to delete calibrated flat");
                }
            }
            results.push((filter.clone(), result));
        }
        results
    }

    fn build_master(
        &self,
        target: &str,
        filter: &str,
        paths: &[PathBuf],
    ) -> Result<CalibrationFrameMeta, LiveStackError> {
        let insufficient = |found| LiveStackError::InsufficientFrames {
            filter: filter.to_string(),
            found,
            required: MIN_FLAT_FRAMES,
        };
        if paths.len() < MIN_FLAT_FRAMES {
            return Err(insufficient(paths.len()));
        }

        tracing::info!(filter = %filter, "Generating flat master");
        let mut sources: Vec<Box<dyn PixelSource>> = Vec::with_capacity(paths.len());
        let mut medians = Vec::with_capacity(paths.len());
        for path in paths {
            match self.codec.open(path) {
                Ok(mut source) => {
                    let median = match source.read_header_f64("MEDIAN") {
                        Some(median) => median,
                        None => {
                            tracing::warn!(path = %path.display(), "Flat frame has no MEDIAN header, computing it");
                            median_and_mad(&source.read_all()?).median
                        }
                    };
                    medians.push(median as f32);
                    sources.push(source);
                }
                Err(err) => {
                    tracing::error!(path = %path.display(), error = %err, "Failed to open flat frame file");
                }
            }
        }
        if sources.len() < MIN_FLAT_FRAMES {
            return Err(insufficient(sources.len()));
        }

        let (width, height) = (sources[0].width(), sources[0].height());
        tracing::info!(filter = %filter, frames = sources.len(), "Stacking flat");
        let master = percentile_clip(&mut sources, &medians, self.clip)?;
        let frame_count = sources.len();
        drop(sources);

        let dir = self.working_dir.join("stacks");
        create_dir(&dir)?;
        let name = format!("MASTER_FLAT_{target}_{filter}.{}", self.codec.extension());
        let output = unique_file_path(&dir.join(sanitize_file_name(&name)));

        let mean = master.iter().map(|&v| f64::from(v)).sum::<f64>() / master.len().max(1) as f64;
        tracing::info!(path = %output.display(), mean, "Writing master flat");
        let headers = [
            HeaderCard::text("FILTER", filter),
            HeaderCard::int("IMGCOUNT", frame_count as i64),
            HeaderCard::float("MEAN", mean),
        ];
        write_atomic(self.codec.as_ref(), &output, width, height, &master, &headers)?;

        Ok(CalibrationFrameMeta::flat(output, filter, width, height, mean))
    }
}

fn create_dir(dir: &Path) -> Result<(), LiveStackError> {
    std::fs::create_dir_all(dir).map_err(|source| LiveStackError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

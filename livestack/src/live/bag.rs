use std::fmt;
use std::path::{Path, PathBuf};

use glam::DVec2;

use super::{LiveStackError, LiveStackItem};
use crate::calibration_masters::normalize_filter;
use crate::image_io::{HeaderCard, ImageCodec, write_atomic};
use crate::math::statistics::{MedianMad, median_and_mad};
use crate::stacking::fold_into_mean;

/// Target name used when a frame carries none.
pub const NO_TARGET: &str = "No_target";
pub const RED_OSC: &str = "Red_OSC";
pub const GREEN_OSC: &str = "Green_OSC";
pub const BLUE_OSC: &str = "Blue_OSC";

/// Normalized (target, filter) pair identifying one stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BagKey {
    pub target: String,
    pub filter: String,
}

impl BagKey {
    /// Blank target becomes [`NO_TARGET`], blank filter `No_filter`.
    pub fn new(target: &str, filter: &str) -> Self {
        let target = target.trim();
        Self {
            target: if target.is_empty() {
                NO_TARGET.to_string()
            } else {
                target.to_string()
            },
            filter: normalize_filter(filter),
        }
    }

    /// Stack the item goes into; one-shot-color frames key to the red channel.
    pub fn for_item(item: &LiveStackItem) -> Self {
        let key = Self::new(&item.target, &item.filter);
        if item.bayered { key.with_filter(RED_OSC) } else { key }
    }

    pub fn with_filter(&self, filter: &str) -> Self {
        Self {
            target: self.target.clone(),
            filter: filter.to_string(),
        }
    }
}

impl fmt::Display for BagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.target, self.filter)
    }
}

/// Running mean of every frame accepted for one (target, filter) pair.
#[derive(Debug, Clone)]
pub struct LiveStackBag {
    key: BagKey,
    width: usize,
    height: usize,
    bit_depth: u32,
    bayered: bool,
    /// Positions every later frame is aligned to. Empty until seeded for OSC.
    reference_stars: Vec<DVec2>,
    stack: Option<Vec<f32>>,
    count: u32,
}

impl LiveStackBag {
    pub fn new(
        key: BagKey,
        width: usize,
        height: usize,
        bit_depth: u32,
        bayered: bool,
        reference_stars: Vec<DVec2>,
    ) -> Self {
        tracing::info!(stack = %key, width, height, stars = reference_stars.len(), "Created stack");
        Self {
            key,
            width,
            height,
            bit_depth,
            bayered,
            reference_stars,
            stack: None,
            count: 0,
        }
    }

    pub fn key(&self) -> &BagKey {
        &self.key
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    pub fn bayered(&self) -> bool {
        self.bayered
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn reference_stars(&self) -> &[DVec2] {
        &self.reference_stars
    }

    pub fn has_reference(&self) -> bool {
        !self.reference_stars.is_empty()
    }

    pub fn stack(&self) -> Option<&[f32]> {
        self.stack.as_deref()
    }

    /// Seeds the stack with `frame` or folds it into the running mean.
    ///
    /// `frame` must already be aligned to the reference stars.
    pub fn add(&mut self, frame: Vec<f32>) -> Result<(), LiveStackError> {
        self.check_len(frame.len())?;
        match self.stack.as_mut() {
            None => self.stack = Some(frame),
            Some(stack) => fold_into_mean(stack, &frame, self.count)?,
        }
        self.count += 1;
        Ok(())
    }

    /// Replaces reference stars and stack outright, leaving a count of 1.
    ///
    /// Used to seed a bag created without reference stars. The geometry may
    /// only change while the bag holds no stack.
    pub fn force_push_reference(
        &mut self,
        width: usize,
        height: usize,
        reference_stars: Vec<DVec2>,
        stack: Vec<f32>,
    ) -> Result<(), LiveStackError> {
        if self.stack.is_some() && (width, height) != self.dimensions() {
            return Err(self.dimension_error((width, height)));
        }
        if stack.len() != width * height {
            return Err(LiveStackError::Stacking(crate::stacking::Error::BufferLength {
                expected: width * height,
                actual: stack.len(),
            }));
        }

        self.width = width;
        self.height = height;
        self.reference_stars = reference_stars;
        self.stack = Some(stack);
        self.count = 1;
        Ok(())
    }

    /// Median and MAD of the current stack, `None` while empty.
    pub fn statistics(&self) -> Option<MedianMad> {
        self.stack.as_deref().map(median_and_mad)
    }

    /// `<working_dir>/stacks/<target>-<filter>.<ext>` with unsafe characters replaced.
    pub fn stack_path(&self, working_dir: &Path, codec: &dyn ImageCodec) -> PathBuf {
        let name = format!("{}.{}", self.key, codec.extension());
        working_dir
            .join("stacks")
            .join(common::file_utils::sanitize_file_name(&name))
    }

    /// Writes the stack with an `IMGCOUNT` header, replacing the previous file atomically.
    pub fn save(&self, working_dir: &Path, codec: &dyn ImageCodec) -> Result<PathBuf, LiveStackError> {
        let Some(stack) = self.stack.as_deref() else {
            return Err(LiveStackError::EmptyBag {
                target: self.key.target.clone(),
                filter: self.key.filter.clone(),
            });
        };

        let path = self.stack_path(working_dir, codec);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| LiveStackError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let headers = [
            HeaderCard::int("IMGCOUNT", i64::from(self.count)),
            HeaderCard::text("OBJECT", &self.key.target),
            HeaderCard::text("FILTER", &self.key.filter),
        ];
        write_atomic(codec, &path, self.width, self.height, stack, &headers)?;
        tracing::debug!(path = %path.display(), frames = self.count, "Saved stack");
        Ok(path)
    }

    fn check_len(&self, len: usize) -> Result<(), LiveStackError> {
        if len == self.width * self.height {
            Ok(())
        } else {
            let actual = if self.width > 0 { (self.width, len / self.width) } else { (0, len) };
            Err(self.dimension_error(actual))
        }
    }

    fn dimension_error(&self, actual: (usize, usize)) -> LiveStackError {
        LiveStackError::BagDimensions {
            target: self.key.target.clone(),
            filter: self.key.filter.clone(),
            expected: self.dimensions(),
            actual,
        }
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::DVec2;

use super::{
    BLUE_OSC, BagKey, GREEN_OSC, LiveStackBag, LiveStackConfig, LiveStackError, LiveStackItem, QualityGate, RED_OSC,
    demosaic_bilinear, failed_gates,
};
use crate::calibration_masters::{CalibrationFrameMeta, CalibrationLibrary, CalibrationSession};
use crate::image_io::ImageCodec;
use crate::registration::{Alignment, RegistrationError, align, select_stars};
use crate::stacking::{color::merge_rgb, remove_hot_pixels};

/// Why a frame was not stacked although it could be read.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    TooFewStars { found: usize, required: usize },
    QualityGates(Vec<QualityGate>),
}

/// Result of processing one queued frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The frame became the reference of its stack.
    Seeded(BagKey),
    /// The frame was aligned and folded into an existing stack.
    Stacked { key: BagKey, count: u32 },
    Rejected(RejectReason),
}

/// Stacks of one processing run plus the calibration masters it opened.
///
/// Frames must be fed one at a time; the session is the single writer of
/// all its bags.
#[derive(Debug)]
pub struct LiveStackSession {
    config: LiveStackConfig,
    codec: Arc<dyn ImageCodec>,
    calibration: CalibrationSession,
    bags: BTreeMap<BagKey, LiveStackBag>,
}

impl LiveStackSession {
    pub fn new(config: LiveStackConfig, library: CalibrationLibrary, codec: Arc<dyn ImageCodec>) -> Self {
        let calibration = CalibrationSession::new(library, Arc::clone(&codec), config.use_bias_for_lights);
        Self {
            config,
            codec,
            calibration,
            bags: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &LiveStackConfig {
        &self.config
    }

    pub fn codec(&self) -> &dyn ImageCodec {
        self.codec.as_ref()
    }

    pub fn calibration_mut(&mut self) -> &mut CalibrationSession {
        &mut self.calibration
    }

    /// Makes a master available to the following frames of this session.
    pub fn register_master(&mut self, meta: CalibrationFrameMeta) -> bool {
        self.calibration.register_master(meta)
    }

    pub fn bag(&self, key: &BagKey) -> Option<&LiveStackBag> {
        self.bags.get(key)
    }

    pub fn bags(&self) -> impl Iterator<Item = &LiveStackBag> {
        self.bags.values()
    }

    /// Star-count floor and quality gates.
    pub fn screen(&self, item: &LiveStackItem) -> Option<RejectReason> {
        let found = item.stars.len();
        if found < self.config.min_star_count {
            tracing::info!(path = %item.path.display(), stars = found, "Skipping frame as not enough stars have been detected");
            return Some(RejectReason::TooFewStars {
                found,
                required: self.config.min_star_count,
            });
        }

        let failed = failed_gates(&self.config.quality_gates, item);
        if failed.is_empty() {
            return None;
        }
        let summary = failed
            .iter()
            .map(|gate| format!("{}: {}", gate.name(), gate.value()))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::warn!(path = %item.path.display(), gates = %summary, "Frame ignored as it does not meet quality gate criteria");
        Some(RejectReason::QualityGates(failed.into_iter().copied().collect()))
    }

    /// Calibrates, aligns and stacks one frame, then persists the touched stacks.
    pub fn process_item(&mut self, item: &LiveStackItem) -> Result<FrameOutcome, LiveStackError> {
        if let Some(reason) = self.screen(item) {
            return Ok(FrameOutcome::Rejected(reason));
        }
        tracing::info!(path = %item.path.display(), "Received new frame");

        let frame = self.calibrate(item)?;
        let key = BagKey::for_item(item);
        if item.bayered {
            self.stack_color(item, key, frame)
        } else {
            self.stack_mono(item, key, frame)
        }
    }

    /// RGB composite of the three one-shot-color stacks of `target`, if all exist.
    pub fn color_composite(&self, target: &str) -> Result<Option<Vec<f32>>, LiveStackError> {
        let base = BagKey::new(target, "");
        let stack = |filter: &str| self.bags.get(&base.with_filter(filter)).and_then(|bag| bag.stack());

        let (Some(red), Some(green), Some(blue)) = (stack(RED_OSC), stack(GREEN_OSC), stack(BLUE_OSC)) else {
            return Ok(None);
        };
        Ok(Some(merge_rgb(red, green, blue, self.config.green_denoise)?))
    }

    fn calibrate(&mut self, item: &LiveStackItem) -> Result<Vec<f32>, LiveStackError> {
        tracing::info!(path = %item.path.display(), "Calibrating frame");
        let mut source = self.codec.open(&item.path)?;
        let mut pixels = self.calibration.calibrate_light(source.as_mut(), &item.identity())?;

        if self.config.hot_pixel_removal {
            tracing::info!(path = %item.path.display(), "Removing hot pixels in frame");
            let replaced = remove_hot_pixels(&mut pixels, item.width, item.height, &self.config.hot_pixels);
            tracing::debug!(replaced, "Hot pixels replaced");
        }
        Ok(pixels)
    }

    fn stack_mono(
        &mut self,
        item: &LiveStackItem,
        key: BagKey,
        frame: Vec<f32>,
    ) -> Result<FrameOutcome, LiveStackError> {
        let (width, height) = item.dimensions();
        let config = &self.config;
        let reference = match self.bags.get(&key) {
            Some(bag) if bag.stack().is_some() => None,
            _ => Some(reference_stars(item, config)?),
        };
        let bag = self.bags.entry(key.clone()).or_insert_with(|| {
            LiveStackBag::new(key.clone(), width, height, item.bit_depth, false, Vec::new())
        });
        check_dimensions(bag, item)?;

        let outcome = if let Some(stars) = reference {
            bag.force_push_reference(width, height, stars, frame)?;
            FrameOutcome::Seeded(key)
        } else {
            tracing::info!(path = %item.path.display(), "Aligning frame");
            let alignment = align(bag.reference_stars(), &item.stars, width, height, &config.registration)?;
            let aligned = alignment.warp(&frame, width, height);

            tracing::info!(path = %item.path.display(), "Updating stack");
            bag.add(aligned)?;
            FrameOutcome::Stacked {
                key,
                count: bag.count(),
            }
        };

        bag.save(&config.working_dir, self.codec.as_ref())?;
        Ok(outcome)
    }

    /// Debayers the frame, aligns once against the red stack and applies
    /// the same transform to all three planes.
    fn stack_color(
        &mut self,
        item: &LiveStackItem,
        red_key: BagKey,
        frame: Vec<f32>,
    ) -> Result<FrameOutcome, LiveStackError> {
        let (width, height) = item.dimensions();
        let config = &self.config;

        tracing::info!(path = %item.path.display(), "Debayering");
        let planes = demosaic_bilinear(&frame, width, height, config.cfa_pattern);
        let reference = match self.bags.get(&red_key) {
            Some(red) if red.stack().is_some() => None,
            _ => Some(reference_stars(item, config)?),
        };

        let red = self
            .bags
            .entry(red_key.clone())
            .or_insert_with(|| LiveStackBag::new(red_key.clone(), width, height, item.bit_depth, true, Vec::new()));
        check_dimensions(red, item)?;

        let placement = match reference {
            Some(stars) => {
                red.force_push_reference(width, height, stars.clone(), planes.red)?;
                Placement::Seed(stars)
            }
            None => {
                tracing::info!(path = %item.path.display(), "Aligning frame - red channel");
                let alignment = align(red.reference_stars(), &item.stars, width, height, &config.registration)?;
                red.add(alignment.warp(&planes.red, width, height))?;
                Placement::Align(alignment)
            }
        };
        let red_count = red.count();

        let mut touched = vec![red_key.clone()];
        for (filter, plane) in [(GREEN_OSC, planes.green), (BLUE_OSC, planes.blue)] {
            let key = red_key.with_filter(filter);
            let bag = self
                .bags
                .entry(key.clone())
                .or_insert_with(|| LiveStackBag::new(key.clone(), width, height, item.bit_depth, true, Vec::new()));
            check_dimensions(bag, item)?;

            match &placement {
                Placement::Align(alignment) => bag.add(alignment.warp(&plane, width, height))?,
                Placement::Seed(stars) => bag.force_push_reference(width, height, stars.clone(), plane)?,
            }
            touched.push(key);
        }

        for key in &touched {
            if let Some(bag) = self.bags.get(key) {
                bag.save(&self.config.working_dir, self.codec.as_ref())?;
            }
        }

        Ok(match placement {
            Placement::Align(_) => FrameOutcome::Stacked {
                key: red_key,
                count: red_count,
            },
            Placement::Seed(_) => FrameOutcome::Seeded(red_key),
        })
    }
}

/// How a one-shot-color frame enters its three stacks.
enum Placement {
    /// First frame: its planes become the stacks, aligned to these stars.
    Seed(Vec<DVec2>),
    Align(Alignment),
}

/// Stars a new stack is aligned to; a frame with too few usable stars cannot seed one.
fn reference_stars(item: &LiveStackItem, config: &LiveStackConfig) -> Result<Vec<DVec2>, LiveStackError> {
    let (width, height) = item.dimensions();
    let stars = select_stars(&item.stars, width, height, &config.registration.stars);
    let required = config.registration.min_matches.max(3);
    if stars.len() < required {
        return Err(RegistrationError::InsufficientStars {
            found: stars.len(),
            required,
        }
        .into());
    }
    Ok(stars)
}

fn check_dimensions(bag: &LiveStackBag, item: &LiveStackItem) -> Result<(), LiveStackError> {
    if bag.dimensions() == item.dimensions() {
        return Ok(());
    }
    Err(LiveStackError::BagDimensions {
        target: bag.key().target.clone(),
        filter: bag.key().filter.clone(),
        expected: bag.dimensions(),
        actual: item.dimensions(),
    })
}

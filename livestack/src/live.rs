//! Live stacking: frame queue, per-(target, filter) accumulators and the
//! consumer loop that calibrates, aligns and folds frames into them.
//!
//! Producers hand [`LiveStackItem`]s to a [`FrameQueue`]. One consumer
//! ([`LiveStackWorker`] or [`run`]) drains it through a [`LiveStackSession`],
//! so each [`LiveStackBag`] is only ever updated by one frame at a time.

mod bag;
mod config;
pub mod demosaic;
mod error;
pub mod flats;
mod item;
mod quality;
mod queue;
mod session;
mod worker;

pub use bag::{BLUE_OSC, BagKey, GREEN_OSC, LiveStackBag, NO_TARGET, RED_OSC};
pub use config::LiveStackConfig;
pub use demosaic::{CfaPattern, ColorPlanes, demosaic_bilinear};
pub use error::LiveStackError;
pub use flats::FlatMasterBuilder;
pub use item::{GuidingRms, LiveStackItem};
pub use quality::{QualityGate, failed_gates};
pub use queue::{FrameQueue, FrameReceiver, frame_queue};
pub use session::{FrameOutcome, LiveStackSession, RejectReason};
pub use worker::{LiveStackWorker, RunSummary, WorkerStatus, run};

#[cfg(test)]
mod tests;

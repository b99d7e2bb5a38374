use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use common::CancellationToken;
use parking_lot::Mutex;

use super::{FrameOutcome, FrameQueue, FrameReceiver, LiveStackConfig, LiveStackError, LiveStackSession, frame_queue};
use crate::calibration_masters::CalibrationLibrary;
use crate::image_io::ImageCodec;

/// What the consumer is currently doing, for display by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStatus {
    pub message: String,
    pub current: Option<PathBuf>,
    pub pending: usize,
}

/// Frame counts of one processing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub seeded: usize,
    pub stacked: usize,
    pub rejected: usize,
    pub failed: usize,
    /// Frames dropped unprocessed when the run ended.
    pub flushed: usize,
}

/// Consumer loop: processes queued frames one at a time until every producer
/// is gone, `cancel` fires or a fatal error occurs.
///
/// Frames still queued when the loop ends are flushed. Returns
/// [`LiveStackError::Cancelled`] after a cancellation and the fatal error
/// after a fatal failure.
pub async fn run(
    session: &mut LiveStackSession,
    receiver: &mut FrameReceiver,
    cancel: &CancellationToken,
    status: &Mutex<WorkerStatus>,
) -> Result<RunSummary, LiveStackError> {
    let delete_frames = session.config().delete_processed_frames;
    let mut summary = RunSummary::default();
    let mut fatal = None;

    loop {
        set_status(status, "Waiting for next frame", None, receiver.pending());
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = receiver.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        set_status(status, "Processing frame", Some(&item.path), receiver.pending());
        let result = session.process_item(&item);
        if delete_frames {
            delete_frame(&item.path);
        }

        match result {
            Ok(FrameOutcome::Seeded(_)) => summary.seeded += 1,
            Ok(FrameOutcome::Stacked { .. }) => summary.stacked += 1,
            Ok(FrameOutcome::Rejected(_)) => summary.rejected += 1,
            Err(err) if err.is_fatal() => {
                tracing::error!(path = %item.path.display(), error = %err, "Live stacking stopped");
                fatal = Some(err);
                break;
            }
            Err(err) => {
                tracing::warn!(path = %item.path.display(), error = %err, "Frame skipped");
                summary.failed += 1;
            }
        }
    }

    for item in receiver.close_and_drain() {
        tracing::info!(path = %item.path.display(), "Flushing queue");
        if delete_frames {
            delete_frame(&item.path);
        }
        summary.flushed += 1;
    }
    set_status(status, "", None, 0);

    tracing::info!(?summary, "Live stacking run ended");
    if let Some(err) = fatal {
        return Err(err);
    }
    if cancel.is_cancelled() {
        return Err(LiveStackError::Cancelled);
    }
    Ok(summary)
}

fn set_status(status: &Mutex<WorkerStatus>, message: &str, current: Option<&Path>, pending: usize) {
    let mut status = status.lock();
    status.message = message.to_string();
    status.current = current.map(Path::to_path_buf);
    status.pending = pending;
}

fn delete_frame(path: &Path) {
    if let Err(err) = common::file_utils::remove_file_if_exists(path) {
        tracing::warn!(path = %path.display(), error = %err, "Failed to delete frame");
    }
}

/// Live stacking consumer on a dedicated thread.
///
/// The thread runs its own single-threaded runtime and owns the
/// [`LiveStackSession`], so opened calibration masters never leave it.
#[derive(Debug)]
pub struct LiveStackWorker {
    queue: FrameQueue,
    cancel: CancellationToken,
    status: Arc<Mutex<WorkerStatus>>,
    handle: thread::JoinHandle<Result<RunSummary, LiveStackError>>,
}

impl LiveStackWorker {
    pub fn spawn(
        config: LiveStackConfig,
        library: CalibrationLibrary,
        codec: Arc<dyn ImageCodec>,
    ) -> Result<Self, LiveStackError> {
        let (queue, mut receiver) = frame_queue(config.queue_capacity.max(1));
        let cancel = CancellationToken::new();
        let status = Arc::new(Mutex::new(WorkerStatus::default()));

        let thread_cancel = cancel.clone();
        let thread_status = Arc::clone(&status);
        let handle = thread::Builder::new()
            .name("livestack".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(LiveStackError::WorkerStart)?;
                let mut session = LiveStackSession::new(config, library, codec);
                runtime.block_on(run(&mut session, &mut receiver, &thread_cancel, &thread_status))
            })
            .map_err(LiveStackError::WorkerStart)?;

        Ok(Self {
            queue,
            cancel,
            status,
            handle,
        })
    }

    /// Producer handle; frames can be queued from any thread.
    pub fn queue(&self) -> FrameQueue {
        self.queue.clone()
    }

    pub fn status(&self) -> WorkerStatus {
        self.status.lock().clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drains the remaining frames and waits for the worker.
    ///
    /// Blocks until every [`FrameQueue`] clone handed out by
    /// [`queue`](Self::queue) has been dropped.
    pub fn finish(self) -> Result<RunSummary, LiveStackError> {
        let Self { queue, handle, .. } = self;
        drop(queue);
        handle.join().map_err(|_| LiveStackError::WorkerPanicked)?
    }

    /// Cancels the run, flushing queued frames, and waits for the worker.
    pub fn stop(self) -> Result<RunSummary, LiveStackError> {
        self.cancel.cancel();
        self.finish()
    }
}

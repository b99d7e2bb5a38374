use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;

use super::{LiveStackError, LiveStackItem};

/// Producer handle of the bounded frame queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    sender: mpsc::Sender<LiveStackItem>,
    pending: Arc<AtomicUsize>,
}

/// Consumer end of the frame queue.
#[derive(Debug)]
pub struct FrameReceiver {
    receiver: mpsc::Receiver<LiveStackItem>,
    pending: Arc<AtomicUsize>,
}

/// Bounded queue of frames waiting to be stacked.
///
/// # Panics
/// Panics if `capacity` is 0.
pub fn frame_queue(capacity: usize) -> (FrameQueue, FrameReceiver) {
    let (sender, receiver) = mpsc::channel(capacity);
    let pending = Arc::new(AtomicUsize::new(0));
    (
        FrameQueue {
            sender,
            pending: Arc::clone(&pending),
        },
        FrameReceiver { receiver, pending },
    )
}

impl FrameQueue {
    /// Waits for a free slot, then queues `item`.
    pub async fn enqueue(&self, item: LiveStackItem) -> Result<(), LiveStackError> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.sender.send(item).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            LiveStackError::QueueClosed
        })
    }

    /// Blocking variant of [`enqueue`](Self::enqueue) for threads outside a runtime.
    pub fn blocking_enqueue(&self, item: LiveStackItem) -> Result<(), LiveStackError> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.sender.blocking_send(item).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            LiveStackError::QueueClosed
        })
    }

    /// Frames handed to the queue and not yet taken by the consumer.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl FrameReceiver {
    /// Next frame, `None` once every producer is gone and the queue is empty.
    pub async fn recv(&mut self) -> Option<LiveStackItem> {
        let item = self.receiver.recv().await?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(item)
    }

    /// Stops accepting frames and returns everything still queued.
    pub fn close_and_drain(&mut self) -> Vec<LiveStackItem> {
        self.receiver.close();
        let mut drained = Vec::new();
        while let Ok(item) = self.receiver.try_recv() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            drained.push(item);
        }
        drained
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

//! Bounded hand-off between a backend audio thread and the coordinator.
//!
//! The producer never blocks: when the channel is full the new block is
//! dropped. The consumer applies the latency rule: once more than
//! `high_water` blocks are pending, everything but the newest is discarded
//! before a block is taken.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

/// Channel capacity for callback blocks (~0.7 s at the default hop).
pub const QUEUE_CAPACITY: usize = 64;

/// Counters kept by a queue pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending: usize,
    pub stale_dropped: u64,
    pub overflow_dropped: u64,
    pub timeouts: u64,
}

/// Create a connected producer/consumer pair.
pub fn channel(capacity: usize, high_water: usize, timeout: Duration) -> (HopProducer, HopConsumer) {
    let (tx, rx) = bounded(capacity.max(1));
    let overflowed = Arc::new(AtomicU64::new(0));
    (
        HopProducer {
            tx,
            overflowed: Arc::clone(&overflowed),
        },
        HopConsumer {
            rx,
            high_water,
            timeout,
            overflowed,
            stale_dropped: 0,
            timeouts: 0,
        },
    )
}

/// Audio-thread side of the queue.
pub struct HopProducer {
    tx: Sender<Vec<f32>>,
    overflowed: Arc<AtomicU64>,
}

impl HopProducer {
    /// Enqueue a block without blocking. Returns `false` if it was dropped.
    pub fn push(&self, block: Vec<f32>) -> bool {
        match self.tx.try_send(block) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.overflowed.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Coordinator side of the queue.
pub struct HopConsumer {
    rx: Receiver<Vec<f32>>,
    high_water: usize,
    timeout: Duration,
    overflowed: Arc<AtomicU64>,
    stale_dropped: u64,
    timeouts: u64,
}

impl HopConsumer {
    /// Take the next block, waiting up to the timeout.
    ///
    /// When more than `high_water` blocks are pending, the stale ones are
    /// drained first so the block returned is the newest. Returns `None` on
    /// timeout.
    pub fn pop_latest(&mut self) -> Option<Vec<f32>> {
        if self.rx.len() > self.high_water {
            while self.rx.len() > 1 {
                if self.rx.try_recv().is_err() {
                    break;
                }
                self.stale_dropped += 1;
            }
        }

        match self.rx.recv_timeout(self.timeout) {
            Ok(block) => Some(block),
            Err(RecvTimeoutError::Timeout) => {
                self.timeouts += 1;
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Producer is gone; keep the caller's pacing.
                thread::sleep(self.timeout);
                self.timeouts += 1;
                None
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.rx.len(),
            stale_dropped: self.stale_dropped,
            overflow_dropped: self.overflowed.load(Ordering::Relaxed),
            timeouts: self.timeouts,
        }
    }
}

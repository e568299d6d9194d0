//! # Log Queue
//!
//! Bounded multi-producer queue between logging call sites and the
//! background listener. Enqueueing never performs I/O.
//!
//! ## Overflow
//!
//! When the queue is full the [`OverflowPolicy`] decides:
//!
//! - `Block` (default): the producer waits for a free slot. Nothing is lost.
//! - `DropOldest`: the oldest queued record is discarded to make room. Dropped
//!   records are counted, never retried. Admitted records keep FIFO order.
//!
//! ## Closing
//!
//! Every enqueue holds a shared gate from the closed check until the record is
//! in the channel. [`QueueSender::close`] takes the gate exclusively, so once it
//! returns no producer is mid-send and every `Ok` enqueue is visible to the
//! listener's final drain. A producer blocked on a full `Block` queue holds
//! the gate until the still-running listener frees a slot.

use super::record::LogRecord;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    Block,
    DropOldest,
}

/// The listener has stopped, or is stopping, and accepts no more records
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("log queue is closed")]
pub struct QueueClosed;

/// Create a queue of `capacity` records.
///
/// The receiver belongs to the listener; the sender can be cloned freely.
pub fn log_queue(capacity: usize, policy: OverflowPolicy) -> (QueueSender, Receiver<LogRecord>) {
    let (tx, rx) = bounded(capacity.max(1));
    let evict = match policy {
        OverflowPolicy::Block => None,
        OverflowPolicy::DropOldest => Some(rx.clone()),
    };

    let sender = QueueSender {
        tx,
        evict,
        policy,
        closed: Arc::new(RwLock::new(false)),
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, rx)
}

/// Producer side of the log queue
#[derive(Debug, Clone)]
pub struct QueueSender {
    tx: Sender<LogRecord>,
    /// Receiver clone used to discard the oldest record under `DropOldest`
    evict: Option<Receiver<LogRecord>>,
    policy: OverflowPolicy,
    /// `true` once closed; read-held for the whole of each enqueue
    closed: Arc<RwLock<bool>>,
    dropped: Arc<AtomicU64>,
}

impl QueueSender {
    pub fn enqueue(&self, record: LogRecord) -> Result<(), QueueClosed> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            return Err(QueueClosed);
        }

        match (&self.evict, self.policy) {
            (Some(evict), OverflowPolicy::DropOldest) => self.enqueue_dropping(evict, record),
            _ => self.tx.send(record).map_err(|_| QueueClosed),
        }
    }

    fn enqueue_dropping(&self, evict: &Receiver<LogRecord>, mut record: LogRecord) -> Result<(), QueueClosed> {
        loop {
            match self.tx.try_send(record) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(rejected)) => {
                    if evict.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    record = rejected;
                }
                Err(TrySendError::Disconnected(_)) => return Err(QueueClosed),
            }
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Records discarded by the overflow policy so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Records currently waiting for the listener
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refuse further records; already queued ones stay for draining.
    ///
    /// Waits for enqueues that already passed the closed check to finish.
    pub(crate) fn close(&self) {
        *self.closed.write().unwrap_or_else(PoisonError::into_inner) = true;
    }
}

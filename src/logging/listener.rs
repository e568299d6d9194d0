//! # Queue Listener
//!
//! One background thread per pipeline dequeues records in FIFO order and
//! dispatches each to every handler that accepts it.
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped --start--> Running --stop--> Draining --queue empty--> Stopped
//! ```
//!
//! Stopping always drains: records admitted before the stop signal are
//! delivered and every handler is flushed before the thread exits.
//!
//! The worker never logs through `tracing` itself, since its own events would
//! be routed back into the queue it is draining. Delivery failures go to stderr.

use super::handler::Handler;
use super::queue::QueueSender;
use super::record::LogRecord;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const LISTENER_THREAD_NAME: &str = "tomatempo-log-listener";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Running,
    Draining,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Running => 1,
            Self::Draining => 2,
        }
    }
}

#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: WorkerState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

/// Handle to the background delivery thread
#[derive(Debug)]
pub struct QueueListener {
    state: SharedState,
    sender: QueueSender,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl QueueListener {
    /// Spawn the worker. `sender` is the producer side of `records`; it is
    /// closed when the listener stops.
    pub fn start(
        sender: QueueSender,
        records: Receiver<LogRecord>,
        handlers: Vec<Handler>,
    ) -> std::io::Result<Self> {
        let state = SharedState(Arc::new(AtomicU8::new(WorkerState::Stopped.as_u8())));
        let (stop_tx, stop_rx) = bounded::<()>(1);

        state.set(WorkerState::Running);
        let worker_state = state.clone();
        let spawned = thread::Builder::new()
            .name(LISTENER_THREAD_NAME.to_string())
            .spawn(move || run(records, stop_rx, handlers, worker_state));

        let worker = match spawned {
            Ok(worker) => worker,
            Err(err) => {
                state.set(WorkerState::Stopped);
                return Err(err);
            }
        };

        Ok(Self {
            state,
            sender,
            stop_tx: Some(stop_tx),
            worker: Some(worker),
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Close the queue, deliver what is left, then join the worker.
    ///
    /// Calling it again is a no-op.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.sender.close();
        self.state.set(WorkerState::Draining);
        if let Some(stop_tx) = self.stop_tx.take() {
            // A full or disconnected channel means the worker is already on its way out
            let _ = stop_tx.try_send(());
        }

        if worker.join().is_err() {
            eprintln!("log listener thread panicked; queued records may be lost");
        }
        self.state.set(WorkerState::Stopped);
    }
}

impl Drop for QueueListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(records: Receiver<LogRecord>, stop: Receiver<()>, mut handlers: Vec<Handler>, state: SharedState) {
    loop {
        select! {
            recv(records) -> message => match message {
                Ok(record) => dispatch(&mut handlers, &record),
                // Every producer is gone and the queue is empty
                Err(_) => break,
            },
            recv(stop) -> _ => break,
        }

        if records.is_empty() {
            flush_all(&mut handlers);
        }
    }

    state.set(WorkerState::Draining);
    for record in records.try_iter() {
        dispatch(&mut handlers, &record);
    }
    flush_all(&mut handlers);
}

fn dispatch(handlers: &mut [Handler], record: &LogRecord) {
    for handler in handlers.iter_mut() {
        if let Err(err) = handler.handle(record) {
            eprintln!("log handler {} failed: {err}", handler.name());
        }
    }
}

fn flush_all(handlers: &mut [Handler]) {
    for handler in handlers.iter_mut() {
        if let Err(err) = handler.flush() {
            eprintln!("log handler {} failed to flush: {err}", handler.name());
        }
    }
}

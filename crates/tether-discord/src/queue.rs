//! Per-session serialized work queue.
//!
//! Turns for one session run strictly in arrival order, one at a time; turns
//! on different sessions are independent. Each queue owns a single worker
//! task draining an unbounded FIFO mailbox. The worker awaits every job to
//! completion (catching panics) before taking the next, so a failed turn
//! releases its slot like any other.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;

use futures_util::FutureExt;
use tokio::sync::mpsc;
use tracing::error;

type Job = Pin<Box<dyn Future<Output = ()> + Send>>;

/// FIFO executor serializing all work for one conversation channel.
pub struct SerialQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialQueue {
    /// Spawn the worker task and return the queue handle.
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
                    error!(panic = panic_message(&*panic), "queued turn panicked");
                }
            }
        });
        Self { tx }
    }

    /// Enqueue a job behind everything already queued.
    ///
    /// Returns `false` if the worker is gone (runtime shutting down).
    pub fn enqueue<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tx.send(Box::pin(job)).is_ok()
    }
}

impl Default for SerialQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

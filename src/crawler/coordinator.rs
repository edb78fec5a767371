//! Completion tracking for the crawl pipeline
//!
//! Every unit of work (a pagination loop, a candidate waiting for or inside a
//! worker) holds a [`WorkGuard`]. Dropping the guard, on any exit path,
//! decrements the shared counter exactly once. When the counter reaches zero
//! the [`Coordinator`] closes the candidate channel.
//!
//! A candidate's guard is registered by the sink *before* the send and travels
//! inside the [`WorkItem`], so the counter can never be observed at zero while
//! a candidate is in the channel.

use crate::hosts::{CandidateSink, RepositoryCandidate, SinkClosed};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// Shared counter of outstanding work
#[derive(Debug, Default)]
pub struct WorkTracker {
    outstanding: AtomicUsize,
    idle: Notify,
}

impl WorkTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers one unit of work; it ends when the guard is dropped
    pub fn register(self: &Arc<Self>) -> WorkGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        WorkGuard {
            tracker: Arc::clone(self),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Waits until no work is outstanding
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// One outstanding unit of work
#[derive(Debug)]
pub struct WorkGuard {
    tracker: Arc<WorkTracker>,
}

impl Drop for WorkGuard {
    fn drop(&mut self) {
        if self.tracker.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}

/// A candidate together with the guard keeping the run open
#[derive(Debug)]
pub struct WorkItem {
    pub candidate: RepositoryCandidate,
    pub guard: WorkGuard,
}

/// Sink pushing candidates onto the shared channel
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<WorkItem>,
    tracker: Arc<WorkTracker>,
}

#[async_trait]
impl CandidateSink for ChannelSink {
    async fn send(&self, candidate: RepositoryCandidate) -> Result<(), SinkClosed> {
        let item = WorkItem {
            candidate,
            guard: self.tracker.register(),
        };
        // On failure the item, and its guard, are dropped with the error
        self.sender.send(item).await.map_err(|_| SinkClosed)
    }
}

/// Owns the candidate channel and closes it once all work is done
pub struct Coordinator {
    tracker: Arc<WorkTracker>,
    sender: Mutex<Option<mpsc::Sender<WorkItem>>>,
    closed: AtomicBool,
}

impl Coordinator {
    /// Creates the coordinator and the receiving end of the candidate channel
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WorkItem>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let coordinator = Self {
            tracker: WorkTracker::new(),
            sender: Mutex::new(Some(sender)),
            closed: AtomicBool::new(false),
        };
        (coordinator, receiver)
    }

    pub fn tracker(&self) -> &Arc<WorkTracker> {
        &self.tracker
    }

    /// Registers one unit of work
    pub fn register(&self) -> WorkGuard {
        self.tracker.register()
    }

    /// A sink for producers, or `None` once the channel is closed
    pub fn sink(&self) -> Option<ChannelSink> {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        sender.as_ref().map(|sender| ChannelSink {
            sender: sender.clone(),
            tracker: Arc::clone(&self.tracker),
        })
    }

    /// Waits for zero outstanding work, then closes the channel
    ///
    /// Returns `true` for the call that actually closed it.
    pub async fn wait_and_close(&self) -> bool {
        self.tracker.wait_idle().await;

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        match sender {
            Some(sender) => {
                drop(sender);
                self.closed.store(true, Ordering::SeqCst);
                tracing::debug!("All work finished, candidate channel closed");
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

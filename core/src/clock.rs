//! Build clock: where construction latency comes from.
//!
//! Build tasks never sleep directly. They call `BuildClock::wait`, which must
//! return `Err(Interrupted)` promptly once the cancel token fires.
//!
//!   - `WallClock`:   real time, interruptible.
//!   - `InstantClock`: no latency at all.
//!   - `ManualClock`: blocks until a test releases a permit.

use crate::cancel::{CancelToken, Interrupted};
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

pub trait BuildClock: Send + Sync {
    fn wait(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Interrupted>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl BuildClock for WallClock {
    fn wait(&self, duration: Duration, cancel: &CancelToken) -> Result<(), Interrupted> {
        cancel.sleep(duration)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstantClock;

impl BuildClock for InstantClock {
    fn wait(&self, _duration: Duration, cancel: &CancelToken) -> Result<(), Interrupted> {
        cancel.check()
    }
}

/// Each `wait` consumes one permit handed out by `release`. The requested
/// duration is ignored.
pub struct ManualClock {
    permits_tx: Sender<()>,
    permits_rx: Receiver<()>,
    waiting:    AtomicUsize,
}

impl ManualClock {
    pub fn new() -> Self {
        let (permits_tx, permits_rx) = unbounded();
        Self { permits_tx, permits_rx, waiting: AtomicUsize::new(0) }
    }

    /// Let `n` pending (or future) waits through.
    pub fn release(&self, n: usize) {
        for _ in 0..n {
            // Both ends live in `self`, so the channel cannot be disconnected.
            let _ = self.permits_tx.send(());
        }
    }

    /// Tasks currently parked in `wait`.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

impl Default for ManualClock {
    fn default() -> Self { Self::new() }
}

impl BuildClock for ManualClock {
    fn wait(&self, _duration: Duration, cancel: &CancelToken) -> Result<(), Interrupted> {
        cancel.check()?;
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let result = select! {
            recv(self.permits_rx) -> _ => cancel.check(),
            recv(cancel.wake()) -> _ => Err(Interrupted),
        };
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

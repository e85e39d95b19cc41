//! Cooperative cancellation.
//!
//! A `CancelToken` is a flag plus a wake channel. Build tasks check the flag
//! at their checkpoints; blocking waits select on `wake()` so that
//! cancellation interrupts them immediately instead of at the end of a sleep.
//! The wake channel never carries a message: cancelling drops the only
//! sender, which disconnects every receiver at once.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

/// A task observed cancellation at one of its checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interrupted;

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("interrupted by cancellation")
    }
}

impl std::error::Error for Interrupted {}

#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    wake_tx:   Mutex<Option<Sender<()>>>,
    wake_rx:   Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                wake_tx:   Mutex::new(Some(tx)),
                wake_rx:   rx,
            }),
        }
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner
            .wake_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Checkpoint: `Err(Interrupted)` once cancelled.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.is_cancelled() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Disconnects when the token is cancelled. For use in `select!`.
    pub fn wake(&self) -> &Receiver<()> {
        &self.inner.wake_rx
    }

    /// Sleep for `duration` unless cancelled first.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        self.check()?;
        match self.inner.wake_rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => self.check(),
            Err(RecvTimeoutError::Disconnected) | Ok(()) => Err(Interrupted),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

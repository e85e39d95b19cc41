//! Build scheduler: a fixed pool of worker threads fed by a queue.
//!
//! LIFECYCLE OF A TASK (every accepted task ends in exactly one state):
//!   queued → executing → completed   unit appended, snapshot requested
//!                      → aborted     template vanished before execution
//!                      → interrupted cancelled during construction
//!   queued → dropped                 cancelled before a worker picked it up
//!
//! RULES:
//!   - `submit` never blocks. The queue is unbounded; the pool is not.
//!   - At most `capacity` tasks execute at once.
//!   - Nothing retries. A dropped or interrupted build is reported, and
//!     resubmitting is the caller's call.
//!   - Shutdown never waits past its timeout plus the cancel grace period,
//!     even if a worker is stuck in a snapshot write.

use crate::{
    cancel::CancelToken,
    catalog::TemplateSource,
    clock::BuildClock,
    error::{ShipyardError, ShipyardResult},
    event::ShipyardEvent,
    rng::construction_latency,
    types::{TaskId, TypeName},
    unit::Unit,
    yard::Yard,
};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(TaskId),
    Rejected(RejectReason),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    InvalidType,
    ShuttingDown,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::InvalidType  => "invalid_type",
            RejectReason::ShuttingDown => "shutting_down",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Aborted,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub completed: u64,
    /// Accepted builds that produced no unit and were not aborted:
    /// drained from the queue, interrupted, or still unsettled at the deadline.
    pub dropped:   u64,
    pub aborted:   u64,
    pub timed_out: bool,
}

/// Point-in-time view of the scheduler counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SchedulerStats {
    pub capacity:       usize,
    pub accepted:       u64,
    pub rejected:       u64,
    pub queued:         usize,
    pub executing:      usize,
    pub peak_executing: usize,
    pub completed:      u64,
    pub aborted:        u64,
    pub interrupted:    u64,
    pub dropped:        u64,
}

#[derive(Default)]
struct Counters {
    accepted:       AtomicU64,
    rejected:       AtomicU64,
    queued:         AtomicUsize,
    executing:      AtomicUsize,
    peak_executing: AtomicUsize,
    completed:      AtomicU64,
    aborted:        AtomicU64,
    interrupted:    AtomicU64,
    dropped:        AtomicU64,
}

/// Latency model for construction.
#[derive(Debug, Clone, Copy)]
pub struct BuildTiming {
    pub base_ms:   u64,
    pub jitter_ms: u64,
    pub seed:      u64,
}

/// Everything a worker needs to run a build.
pub struct BuildContext {
    pub templates: Arc<dyn TemplateSource>,
    pub clock:     Arc<dyn BuildClock>,
    pub yard:      Arc<Yard>,
    pub timing:    BuildTiming,
}

struct BuildTask {
    id:        TaskId,
    sequence:  u64,
    unit_type: TypeName,
}

pub struct BuildScheduler {
    capacity: usize,
    ctx:      Arc<BuildContext>,
    cancel:   CancelToken,
    counters: Arc<Counters>,
    sequence: AtomicU64,
    queue_tx: Mutex<Option<Sender<BuildTask>>>,
    /// Kept so shutdown can drain tasks no worker has picked up.
    queue_rx: Receiver<BuildTask>,
    /// Disconnects once every worker thread has exited.
    done_rx:  Mutex<Option<Receiver<()>>>,
    workers:  Mutex<Vec<JoinHandle<()>>>,
    report:   Mutex<Option<ShutdownReport>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BuildScheduler {
    pub fn start(capacity: usize, ctx: BuildContext) -> ShipyardResult<Self> {
        let capacity = capacity.max(1);
        let ctx = Arc::new(ctx);
        let cancel = CancelToken::new();
        let counters = Arc::new(Counters::default());
        let (queue_tx, queue_rx) = unbounded::<BuildTask>();
        let (done_tx, done_rx) = bounded::<()>(0);

        let mut workers = Vec::with_capacity(capacity);
        for slot in 0..capacity {
            let worker = Worker {
                ctx:      Arc::clone(&ctx),
                cancel:   cancel.clone(),
                counters: Arc::clone(&counters),
            };
            let rx = queue_rx.clone();
            let done = done_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("shipyard-builder-{slot}"))
                .spawn(move || worker.run(rx, done))
                .map_err(|e| ShipyardError::WorkerSpawn(e.to_string()))?;
            workers.push(handle);
        }
        drop(done_tx);
        log::debug!("Build scheduler started with {capacity} workers");

        Ok(Self {
            capacity,
            ctx,
            cancel,
            counters,
            sequence: AtomicU64::new(0),
            queue_tx: Mutex::new(Some(queue_tx)),
            queue_rx,
            done_rx:  Mutex::new(Some(done_rx)),
            workers:  Mutex::new(workers),
            report:   Mutex::new(None),
        })
    }

    /// Validate and enqueue. Never blocks on the pool.
    pub fn submit(&self, unit_type: &str) -> SubmitOutcome {
        let ledger = &self.ctx.yard.ledger;

        if self.ctx.templates.template(unit_type).is_none() {
            log::info!("Invalid unit type '{unit_type}'");
            return self.reject(unit_type, RejectReason::InvalidType);
        }

        // Holding the sender lock across the send means shutdown cannot
        // close the queue between the check and the enqueue.
        let tx = lock(&self.queue_tx);
        let Some(sender) = tx.as_ref() else {
            return self.reject(unit_type, RejectReason::ShuttingDown);
        };

        let task = BuildTask {
            id:        Uuid::new_v4().to_string(),
            sequence:  self.sequence.fetch_add(1, Ordering::SeqCst),
            unit_type: unit_type.to_string(),
        };
        let id = task.id.clone();

        self.counters.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(task).is_err() {
            // Unreachable while `queue_rx` is alive; handled for completeness.
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            return self.reject(unit_type, RejectReason::ShuttingDown);
        }
        self.counters.accepted.fetch_add(1, Ordering::SeqCst);
        drop(tx);

        log::info!("Building {unit_type}... (task {id})");
        ledger.record(ShipyardEvent::BuildAccepted {
            task_id:   id.clone(),
            unit_type: unit_type.to_string(),
        });
        SubmitOutcome::Accepted(id)
    }

    fn reject(&self, unit_type: &str, reason: RejectReason) -> SubmitOutcome {
        self.counters.rejected.fetch_add(1, Ordering::SeqCst);
        self.ctx.yard.ledger.record(ShipyardEvent::BuildRejected {
            unit_type: unit_type.to_string(),
            reason:    reason.as_str().to_string(),
        });
        SubmitOutcome::Rejected(reason)
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.counters;
        SchedulerStats {
            capacity:       self.capacity,
            accepted:       c.accepted.load(Ordering::SeqCst),
            rejected:       c.rejected.load(Ordering::SeqCst),
            queued:         c.queued.load(Ordering::SeqCst),
            executing:      c.executing.load(Ordering::SeqCst),
            peak_executing: c.peak_executing.load(Ordering::SeqCst),
            completed:      c.completed.load(Ordering::SeqCst),
            aborted:        c.aborted.load(Ordering::SeqCst),
            interrupted:    c.interrupted.load(Ordering::SeqCst),
            dropped:        c.dropped.load(Ordering::SeqCst),
        }
    }

    /// Stop accepting, wait up to `timeout` for queued and running builds,
    /// then cancel whatever is left. Idempotent: later calls return the
    /// first report.
    pub fn shutdown(&self, timeout: Duration, cancel_grace: Duration) -> ShutdownReport {
        let mut slot = lock(&self.report);
        if let Some(report) = *slot {
            return report;
        }

        // `None` means the timeout is too large to represent: wait for good.
        let deadline = Instant::now().checked_add(timeout);
        lock(&self.queue_tx).take();
        let done_rx = lock(&self.done_rx).take();

        let mut all_exited = done_rx
            .as_ref()
            .map_or(true, |done| wait_for_workers(done, deadline));
        let timed_out = !all_exited;

        if timed_out {
            log::warn!("Build pool did not drain within {timeout:?}; cancelling remaining builds");
            self.cancel.cancel();
            let drained = self.drain_queue();
            if drained > 0 {
                log::warn!("Dropped {drained} queued builds");
            }
            let grace_deadline = Instant::now().checked_add(cancel_grace);
            all_exited = done_rx
                .as_ref()
                .map_or(true, |done| wait_for_workers(done, grace_deadline));
        }

        let handles: Vec<_> = lock(&self.workers).drain(..).collect();
        if all_exited {
            for handle in handles {
                if handle.join().is_err() {
                    log::warn!("A build worker panicked");
                }
            }
        } else {
            log::warn!("{} build workers still busy; detaching them", handles.len());
        }

        let stats = self.stats();
        let report = ShutdownReport {
            completed: stats.completed,
            dropped:   stats.accepted.saturating_sub(stats.completed + stats.aborted),
            aborted:   stats.aborted,
            timed_out,
        };
        log::info!(
            "Build pool shut down: {} completed, {} dropped, {} aborted",
            report.completed,
            report.dropped,
            report.aborted
        );
        self.ctx.yard.ledger.record(ShipyardEvent::ShutdownCompleted {
            completed: report.completed,
            dropped:   report.dropped,
            aborted:   report.aborted,
            timed_out: report.timed_out,
        });
        *slot = Some(report);
        report
    }

    fn drain_queue(&self) -> u64 {
        let mut drained = 0;
        while let Ok(task) = self.queue_rx.try_recv() {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
            self.ctx.yard.ledger.record(ShipyardEvent::BuildDropped {
                task_id:   task.id,
                unit_type: task.unit_type,
            });
            drained += 1;
        }
        drained
    }
}

impl Drop for BuildScheduler {
    /// Without an explicit shutdown, cancel everything and let the workers
    /// exit on their own; never block in drop.
    fn drop(&mut self) {
        if lock(&self.report).is_none() {
            self.cancel.cancel();
            lock(&self.queue_tx).take();
        }
    }
}

/// True if every worker exited before `deadline`. Without a deadline this
/// blocks until they have.
fn wait_for_workers(done: &Receiver<()>, deadline: Option<Instant>) -> bool {
    let Some(deadline) = deadline else {
        while done.recv().is_ok() {}
        return true;
    };
    loop {
        match done.recv_deadline(deadline) {
            Err(RecvTimeoutError::Disconnected) => return true,
            Err(RecvTimeoutError::Timeout) => return false,
            Ok(()) => {}
        }
    }
}

struct Worker {
    ctx:      Arc<BuildContext>,
    cancel:   CancelToken,
    counters: Arc<Counters>,
}

impl Worker {
    /// `_done` is dropped when this returns, which is how shutdown learns
    /// the worker has exited.
    fn run(self, queue: Receiver<BuildTask>, _done: Sender<()>) {
        for task in queue.iter() {
            self.counters.queued.fetch_sub(1, Ordering::SeqCst);

            if self.cancel.is_cancelled() {
                self.counters.dropped.fetch_add(1, Ordering::SeqCst);
                self.ctx.yard.ledger.record(ShipyardEvent::BuildDropped {
                    task_id:   task.id,
                    unit_type: task.unit_type,
                });
                continue;
            }

            let executing = self.counters.executing.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.peak_executing.fetch_max(executing, Ordering::SeqCst);
            let outcome = self.execute(&task);
            self.counters.executing.fetch_sub(1, Ordering::SeqCst);

            let counter = match outcome {
                TaskOutcome::Completed   => None,
                TaskOutcome::Aborted     => Some(&self.counters.aborted),
                TaskOutcome::Interrupted => Some(&self.counters.interrupted),
            };
            if let Some(counter) = counter {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn execute(&self, task: &BuildTask) -> TaskOutcome {
        let yard = &self.ctx.yard;

        // Re-resolve: the template may have gone since submit.
        let Some(template) = self.ctx.templates.template(&task.unit_type) else {
            log::warn!("Template not found for unit type: {} (task {})", task.unit_type, task.id);
            yard.ledger.record(ShipyardEvent::BuildAborted {
                task_id:   task.id.clone(),
                unit_type: task.unit_type.clone(),
            });
            return TaskOutcome::Aborted;
        };

        let timing = self.ctx.timing;
        let latency = construction_latency(timing.base_ms, timing.jitter_ms, timing.seed, task.sequence);
        let built = self
            .ctx
            .clock
            .wait(latency, &self.cancel)
            .and_then(|()| {
                let unit = Unit::from_template(&template);
                yard.fleet.append_unless_cancelled(unit, &self.cancel)
            });

        let snapshot = match built {
            Ok(snapshot) => snapshot,
            Err(interrupted) => {
                log::warn!("Build of {} {interrupted} (task {})", task.unit_type, task.id);
                yard.ledger.record(ShipyardEvent::BuildInterrupted {
                    task_id:   task.id.clone(),
                    unit_type: task.unit_type.clone(),
                });
                return TaskOutcome::Interrupted;
            }
        };

        // Count before the write so a slow disk cannot hide a finished build
        // from a shutdown report.
        self.counters.completed.fetch_add(1, Ordering::SeqCst);
        log::info!("{} construction complete! Added to fleet.", task.unit_type);
        yard.ledger.record(ShipyardEvent::BuildCompleted {
            task_id:    task.id.clone(),
            unit_type:  task.unit_type.clone(),
            fleet_size: snapshot.len(),
        });

        // Errors are logged and recorded by the yard; the build still counts.
        let _ = yard.persist(&snapshot);
        TaskOutcome::Completed
    }
}

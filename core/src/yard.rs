//! State shared between the engine facade and the build workers.

use crate::{
    error::ShipyardResult,
    event::ShipyardEvent,
    fleet::{Fleet, FleetSnapshot},
    ledger::EventLedger,
    persistence::{SaveOutcome, SnapshotStore},
};

pub struct Yard {
    pub fleet:  Fleet,
    pub store:  SnapshotStore,
    pub ledger: EventLedger,
}

impl Yard {
    pub fn new(store: SnapshotStore, ledger: EventLedger) -> Self {
        Self { fleet: Fleet::new(), store, ledger }
    }

    /// Load the last snapshot into the (empty) fleet. Returns the unit count.
    pub fn restore(&self) -> usize {
        let units = self.store.load();
        let count = units.len();
        if count > 0 {
            self.fleet.replace_all(units);
        }
        self.ledger.record(ShipyardEvent::FleetRestored { units: count });
        count
    }

    /// Write `snapshot` and record the outcome. Must be called without the
    /// fleet lock held. Failures are logged and returned, never panicked on;
    /// the in-memory fleet stays authoritative.
    pub fn persist(&self, snapshot: &FleetSnapshot) -> ShipyardResult<SaveOutcome> {
        let result = self.store.save(snapshot);
        match &result {
            Ok(SaveOutcome::Written { revision, units }) => {
                self.ledger.record(ShipyardEvent::SnapshotSaved {
                    revision: *revision,
                    units:    *units,
                });
            }
            Ok(SaveOutcome::Superseded { .. }) => {}
            Err(e) => {
                log::warn!(
                    "Error saving fleet snapshot r{} to {}: {e}",
                    snapshot.revision,
                    self.store.path().display()
                );
                self.ledger.record(ShipyardEvent::SnapshotFailed {
                    revision: snapshot.revision,
                    error:    e.to_string(),
                });
            }
        }
        result
    }

    /// Snapshot the current fleet and write it.
    pub fn flush(&self) -> ShipyardResult<SaveOutcome> {
        self.persist(&self.fleet.snapshot())
    }
}

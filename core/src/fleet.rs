//! The fleet: shared, ordered collection of constructed units.
//!
//! RULE: Every read and write goes through the single mutex owned here.
//! Find-then-mutate sequences run inside one critical section, and every
//! mutation hands back a snapshot copied before the lock is released, so
//! callers can persist it without holding the lock during I/O.

use crate::{
    cancel::{CancelToken, Interrupted},
    types::Revision,
    unit::Unit,
};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Point-in-time copy of the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FleetSnapshot {
    pub revision: Revision,
    pub units:    Vec<Unit>,
}

impl FleetSnapshot {
    pub fn len(&self) -> usize      { self.units.len() }
    pub fn is_empty(&self) -> bool  { self.units.is_empty() }
}

#[derive(Default)]
struct FleetState {
    units:    Vec<Unit>,
    revision: Revision,
}

impl FleetState {
    fn bump(&mut self) -> FleetSnapshot {
        self.revision += 1;
        self.copy()
    }

    fn copy(&self) -> FleetSnapshot {
        FleetSnapshot {
            revision: self.revision,
            units:    self.units.clone(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.units
            .iter()
            .position(|u| u.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Default)]
pub struct Fleet {
    state: Mutex<FleetState>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutations never panic while the guard is held, so a poisoned lock
    /// still protects a consistent vector.
    fn lock(&self) -> MutexGuard<'_, FleetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn append(&self, unit: Unit) -> FleetSnapshot {
        let mut state = self.lock();
        state.units.push(unit);
        state.bump()
    }

    /// Append only if `cancel` has not fired. The check happens under the
    /// fleet lock, so once cancellation is observed by shutdown no further
    /// append can slip in behind it.
    pub fn append_unless_cancelled(
        &self,
        unit: Unit,
        cancel: &CancelToken,
    ) -> Result<FleetSnapshot, Interrupted> {
        let mut state = self.lock();
        cancel.check()?;
        state.units.push(unit);
        Ok(state.bump())
    }

    /// First unit whose name matches case-insensitively.
    pub fn find_by_name(&self, name: &str) -> Option<Unit> {
        let state = self.lock();
        state.position(name).map(|i| state.units[i].clone())
    }

    /// Locate the first matching unit and mutate it in one critical section.
    pub fn update_by_name<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Unit) -> R,
    ) -> Option<(R, FleetSnapshot)> {
        let mut state = self.lock();
        let i = state.position(name)?;
        let out = f(&mut state.units[i]);
        Some((out, state.bump()))
    }

    pub fn remove_by_name(&self, name: &str) -> Option<(Unit, FleetSnapshot)> {
        let mut state = self.lock();
        let i = state.position(name)?;
        let removed = state.units.remove(i);
        Some((removed, state.bump()))
    }

    /// Swap in a restored fleet wholesale.
    pub fn replace_all(&self, units: Vec<Unit>) -> FleetSnapshot {
        let mut state = self.lock();
        state.units = units;
        state.bump()
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        self.lock().copy()
    }

    pub fn size(&self) -> usize {
        self.lock().units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn revision(&self) -> Revision {
        self.lock().revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn append_preserves_order_and_bumps_revision() {
        let fleet = Fleet::new();
        let s1 = fleet.append(Unit::new("Fighter", 100, 20));
        let s2 = fleet.append(Unit::new("Cruiser", 200, 40));

        assert_eq!(s1.revision, 1);
        assert_eq!(s2.revision, 2);
        let names: Vec<_> = s2.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Fighter", "Cruiser"]);
    }

    #[test]
    fn snapshot_is_independent_of_later_mutation() {
        let fleet = Fleet::new();
        fleet.append(Unit::new("Fighter", 100, 20));
        let before = fleet.snapshot();

        fleet.update_by_name("fighter", |u| u.reinforce(50));
        fleet.append(Unit::new("Cruiser", 200, 40));

        assert_eq!(before.units.len(), 1);
        assert_eq!(before.units[0].health(), 100);
        assert_eq!(fleet.find_by_name("FIGHTER").unwrap().health(), 150);
    }

    #[test]
    fn update_touches_only_the_first_match() {
        let fleet = Fleet::new();
        fleet.append(Unit::new("Fighter", 100, 20));
        fleet.append(Unit::new("Fighter", 100, 20));

        let (health, snap) = fleet.update_by_name("Fighter", |u| {
            u.reinforce(50);
            u.health()
        }).unwrap();

        assert_eq!(health, 150);
        assert_eq!(snap.units[0].health(), 150);
        assert_eq!(snap.units[1].health(), 100);
    }

    #[test]
    fn missing_name_leaves_revision_untouched() {
        let fleet = Fleet::new();
        fleet.append(Unit::new("Fighter", 100, 20));
        let rev = fleet.revision();

        assert!(fleet.update_by_name("Ghost", |u| u.reinforce(1)).is_none());
        assert!(fleet.remove_by_name("Ghost").is_none());
        assert_eq!(fleet.revision(), rev);
    }

    #[test]
    fn remove_takes_unit_out() {
        let fleet = Fleet::new();
        fleet.append(Unit::new("Fighter", 100, 20));
        fleet.append(Unit::new("Cruiser", 200, 40));

        let (removed, snap) = fleet.remove_by_name("fighter").unwrap();
        assert_eq!(removed.name, "Fighter");
        assert_eq!(snap.len(), 1);
        assert_eq!(fleet.size(), 1);
    }

    #[test]
    fn cancelled_append_is_refused() {
        let fleet = Fleet::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        assert_eq!(
            fleet.append_unless_cancelled(Unit::new("Fighter", 100, 20), &cancel),
            Err(Interrupted)
        );
        assert!(fleet.is_empty());
    }

    #[test]
    fn concurrent_appends_and_upgrades_do_not_tear() {
        let fleet = Arc::new(Fleet::new());
        fleet.append(Unit::new("Battleship", 300, 60));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let fleet = Arc::clone(&fleet);
                thread::spawn(move || {
                    for _ in 0..50 {
                        if i % 2 == 0 {
                            fleet.append(Unit::new("Fighter", 100, 20));
                        } else {
                            fleet.update_by_name("Battleship", |u| u.reinforce(1));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = fleet.snapshot();
        assert_eq!(snap.len(), 1 + 4 * 50);
        assert_eq!(snap.units[0].health(), 300 + 4 * 50);
        assert_eq!(snap.revision, 1 + 8 * 50);
    }
}

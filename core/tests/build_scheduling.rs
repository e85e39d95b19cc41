//! Build scheduler tests: acceptance, pool bound, no loss or duplication,
//! and the template race.

mod common;

use common::{config_in, wait_for, PATIENCE};
use shipyard_core::{
    catalog::{Catalog, TemplateSource, UnitTemplate},
    clock::{InstantClock, ManualClock},
    engine::EngineParts,
    ledger::EventLedger,
    RejectReason, ShipyardEngine, SubmitOutcome,
};
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

#[test]
fn concurrent_submissions_all_land_exactly_once() {
    const N: usize = 24;
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(
        ShipyardEngine::build_test(config_in(dir.path()), Arc::new(InstantClock)).unwrap(),
    );

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let unit_type = ["Fighter", "Cruiser", "Battleship"][i % 3];
                engine.submit(unit_type)
            })
        })
        .collect();
    let task_ids: HashSet<_> = handles
        .into_iter()
        .map(|h| match h.join().unwrap() {
            SubmitOutcome::Accepted(id) => id,
            other => panic!("expected acceptance, got {other:?}"),
        })
        .collect();
    assert_eq!(task_ids.len(), N, "task ids must be unique");

    assert!(wait_for(PATIENCE, || engine.stats().completed == N as u64));
    let fleet = engine.snapshot();
    assert_eq!(fleet.len(), N);
    for kind in ["Fighter", "Cruiser", "Battleship"] {
        assert_eq!(fleet.iter().filter(|u| u.name == kind).count(), N / 3);
    }
    assert_eq!(engine.ledger().count_of("build_completed").unwrap(), N as i64);

    let report = engine.shutdown(PATIENCE);
    assert_eq!((report.completed, report.dropped), (N as u64, 0));
}

#[test]
fn unknown_type_is_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let engine =
        ShipyardEngine::build_test(config_in(dir.path()), Arc::new(InstantClock)).unwrap();

    assert_eq!(
        engine.submit("NoSuchType"),
        SubmitOutcome::Rejected(RejectReason::InvalidType)
    );
    // Catalog lookup is exact-case.
    assert_eq!(
        engine.submit("fighter"),
        SubmitOutcome::Rejected(RejectReason::InvalidType)
    );

    let stats = engine.stats();
    assert_eq!((stats.accepted, stats.rejected), (0, 2));
    assert!(engine.snapshot().is_empty());
    assert!(!dir.path().join("ships.json").exists());
    assert_eq!(engine.ledger().count_of("build_rejected").unwrap(), 2);
}

#[test]
fn built_units_carry_template_stats_and_no_abilities() {
    let dir = tempfile::tempdir().unwrap();
    let engine =
        ShipyardEngine::build_test(config_in(dir.path()), Arc::new(InstantClock)).unwrap();

    assert!(engine.submit("Battleship").is_accepted());
    assert!(wait_for(PATIENCE, || engine.fleet_size() == 1));

    let unit = &engine.snapshot()[0];
    assert_eq!(unit.name, "Battleship");
    assert_eq!((unit.health(), unit.attack_power()), (300, 60));
    assert_eq!(unit.abilities().count(), 0);
}

#[test]
fn pool_never_runs_more_than_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new());
    let engine = ShipyardEngine::build_test(config_in(dir.path()), clock.clone()).unwrap();
    assert_eq!(engine.config().pool_capacity, 2);

    for _ in 0..5 {
        assert!(engine.submit("Fighter").is_accepted());
    }

    // Two builds park in the clock, three wait in the queue.
    assert!(wait_for(PATIENCE, || clock.waiting() == 2));
    let stats = engine.stats();
    assert_eq!((stats.executing, stats.queued), (2, 3));

    for released in 1..=5u64 {
        clock.release(1);
        assert!(wait_for(PATIENCE, || engine.stats().completed == released));
        assert!(engine.stats().executing <= 2);
    }

    let stats = engine.stats();
    assert_eq!(stats.peak_executing, 2);
    assert_eq!((stats.queued, stats.executing), (0, 0));
    assert_eq!(engine.fleet_size(), 5);
}

/// Resolves each template once, then forgets it, the way a catalog reload
/// racing a build would.
struct VanishingCatalog {
    inner: Catalog,
    calls: AtomicUsize,
}

impl TemplateSource for VanishingCatalog {
    fn template(&self, type_name: &str) -> Option<UnitTemplate> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.inner.template(type_name)
        } else {
            None
        }
    }
}

#[test]
fn template_vanishing_before_execution_aborts_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let parts = EngineParts::new(
        Catalog::reference().unwrap(),
        Arc::new(InstantClock),
        EventLedger::in_memory().unwrap(),
    )
    .with_template_source(Arc::new(VanishingCatalog {
        inner: Catalog::reference().unwrap(),
        calls: AtomicUsize::new(0),
    }));
    let engine = ShipyardEngine::new(config, parts).unwrap();

    assert!(engine.submit("Cruiser").is_accepted());
    assert!(wait_for(PATIENCE, || engine.stats().aborted == 1));

    assert!(engine.snapshot().is_empty());
    assert_eq!(engine.ledger().count_of("build_aborted").unwrap(), 1);

    let report = engine.shutdown(PATIENCE);
    assert_eq!((report.completed, report.dropped, report.aborted), (0, 0, 1));
}

#[test]
fn submissions_after_shutdown_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let engine =
        ShipyardEngine::build_test(config_in(dir.path()), Arc::new(InstantClock)).unwrap();
    engine.shutdown(Duration::from_secs(1));

    assert_eq!(
        engine.submit("Fighter"),
        SubmitOutcome::Rejected(RejectReason::ShuttingDown)
    );
    assert!(engine.snapshot().is_empty());
}

#[test]
fn jittered_wall_clock_builds_all_complete() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.build_latency_ms = 5;
    config.build_jitter_ms = 20;
    config.seed = 0x5EED;
    let engine = ShipyardEngine::open(config).unwrap();

    for unit_type in ["Fighter", "Cruiser", "Battleship", "Fighter"] {
        assert!(engine.submit(unit_type).is_accepted());
    }
    let report = engine.shutdown(PATIENCE);
    assert_eq!((report.completed, report.dropped), (4, 0));

    // Completion order may differ from submission order; the multiset may not.
    let mut names: Vec<_> = engine.snapshot().into_iter().map(|u| u.name).collect();
    names.sort();
    assert_eq!(names, ["Battleship", "Cruiser", "Fighter", "Fighter"]);
}

#[test]
fn maximal_jitter_setting_still_builds() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.build_jitter_ms = u64::MAX;
    let engine = ShipyardEngine::build_test(config, Arc::new(InstantClock)).unwrap();

    assert!(engine.submit("Fighter").is_accepted());
    let report = engine.shutdown(PATIENCE);

    assert_eq!((report.completed, report.dropped), (1, 0));
    assert_eq!(engine.stats().executing, 0);
    assert_eq!(engine.ledger().count_of("build_completed").unwrap(), 1);
}

//! The shipyard engine: facade over catalog, fleet, scheduler and storage.
//!
//! STARTUP ORDER (fixed):
//!   1. Validate config and build the catalog.
//!   2. Open the ledger and apply migrations.
//!   3. Restore the last snapshot into the fleet.
//!   4. Start the build workers. Only now are submissions accepted.
//!
//! RULES:
//!   - Every fleet mutation goes through `Fleet`, which copies the snapshot
//!     under its lock; the snapshot is written after the lock is released.
//!   - Operations return outcomes, not errors, for expected conditions
//!     (unknown type, unknown unit). Only storage failures surface as
//!     `ShipyardError`, and only from explicit saves.

use crate::{
    catalog::{Catalog, TemplateSource, UnitTemplate},
    clock::{BuildClock, WallClock},
    config::ShipyardConfig,
    error::ShipyardResult,
    event::ShipyardEvent,
    ledger::EventLedger,
    persistence::{SaveOutcome, SnapshotStore},
    scheduler::{
        BuildContext, BuildScheduler, BuildTiming, SchedulerStats, ShutdownReport, SubmitOutcome,
    },
    unit::{Ability, Unit},
    yard::Yard,
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpgradeOutcome {
    Applied { health: u32 },
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EquipOutcome {
    Equipped,
    AlreadyEquipped,
    NotFound,
}

/// Collaborators the engine is assembled from.
pub struct EngineParts {
    pub catalog:   Arc<Catalog>,
    /// Where workers resolve templates at execution time.
    pub templates: Arc<dyn TemplateSource>,
    pub clock:     Arc<dyn BuildClock>,
    pub ledger:    EventLedger,
}

impl EngineParts {
    pub fn new(catalog: Catalog, clock: Arc<dyn BuildClock>, ledger: EventLedger) -> Self {
        let catalog = Arc::new(catalog);
        Self {
            templates: catalog.clone(),
            catalog,
            clock,
            ledger,
        }
    }

    pub fn with_template_source(mut self, templates: Arc<dyn TemplateSource>) -> Self {
        self.templates = templates;
        self
    }
}

pub struct ShipyardEngine {
    config:    ShipyardConfig,
    catalog:   Arc<Catalog>,
    yard:      Arc<Yard>,
    scheduler: BuildScheduler,
}

impl ShipyardEngine {
    /// Production wiring: wall-clock latency, catalog and ledger from config.
    pub fn open(config: ShipyardConfig) -> ShipyardResult<Self> {
        let catalog = Catalog::from_config(&config.catalog)?;
        let ledger = match &config.ledger_path {
            Some(path) => EventLedger::open(path)?,
            None => EventLedger::in_memory()?,
        };
        Self::new(config, EngineParts::new(catalog, Arc::new(WallClock), ledger))
    }

    /// In-memory ledger, catalog from config, caller-supplied clock.
    pub fn build_test(config: ShipyardConfig, clock: Arc<dyn BuildClock>) -> ShipyardResult<Self> {
        let catalog = Catalog::from_config(&config.catalog)?;
        Self::new(config, EngineParts::new(catalog, clock, EventLedger::in_memory()?))
    }

    pub fn new(config: ShipyardConfig, parts: EngineParts) -> ShipyardResult<Self> {
        config.validate()?;
        parts.ledger.migrate()?;

        let yard = Arc::new(Yard::new(SnapshotStore::new(&config.save_path), parts.ledger));
        let restored = yard.restore();
        log::info!(
            "Shipyard open: {} templates, {} units restored from {}",
            parts.catalog.len(),
            restored,
            config.save_path
        );

        let scheduler = BuildScheduler::start(
            config.pool_capacity,
            BuildContext {
                templates: parts.templates,
                clock:     parts.clock,
                yard:      Arc::clone(&yard),
                timing:    BuildTiming {
                    base_ms:   config.build_latency_ms,
                    jitter_ms: config.build_jitter_ms,
                    seed:      config.seed,
                },
            },
        )?;

        Ok(Self { config, catalog: parts.catalog, yard, scheduler })
    }

    pub fn config(&self) -> &ShipyardConfig {
        &self.config
    }

    pub fn available_templates(&self) -> &[UnitTemplate] {
        self.catalog.templates()
    }

    /// Queue a build. Returns immediately; watch `snapshot()` for the unit.
    pub fn submit(&self, unit_type: &str) -> SubmitOutcome {
        self.scheduler.submit(unit_type)
    }

    /// Add the configured health delta to the first unit named `name`
    /// (case-insensitive).
    pub fn upgrade(&self, name: &str) -> UpgradeOutcome {
        let delta = self.config.upgrade_health_delta;
        let Some((health, snapshot)) = self.yard.fleet.update_by_name(name, |unit| {
            unit.reinforce(delta);
            unit.health()
        }) else {
            log::info!("Unit '{name}' not found in fleet");
            return UpgradeOutcome::NotFound;
        };

        log::info!("{name} upgraded! New health: {health}");
        self.yard.ledger.record(ShipyardEvent::UnitUpgraded {
            name: name.to_string(),
            health,
        });
        let _ = self.yard.persist(&snapshot);
        UpgradeOutcome::Applied { health }
    }

    pub fn equip(&self, name: &str, ability: Ability) -> EquipOutcome {
        let Some((added, snapshot)) = self
            .yard
            .fleet
            .update_by_name(name, |unit| unit.add_ability(ability))
        else {
            return EquipOutcome::NotFound;
        };
        if !added {
            return EquipOutcome::AlreadyEquipped;
        }

        log::info!("{name} equipped with {ability}");
        self.yard.ledger.record(ShipyardEvent::AbilityEquipped {
            name:    name.to_string(),
            ability: ability.tag().to_string(),
        });
        let _ = self.yard.persist(&snapshot);
        EquipOutcome::Equipped
    }

    /// Remove the first unit named `name` from the fleet.
    pub fn decommission(&self, name: &str) -> Option<Unit> {
        let (unit, snapshot) = self.yard.fleet.remove_by_name(name)?;
        log::info!("{} decommissioned", unit.name);
        self.yard.ledger.record(ShipyardEvent::UnitDecommissioned {
            name: unit.name.clone(),
        });
        let _ = self.yard.persist(&snapshot);
        Some(unit)
    }

    /// Read-only copy of the fleet in completion order.
    pub fn snapshot(&self) -> Vec<Unit> {
        self.yard.fleet.snapshot().units
    }

    pub fn fleet_size(&self) -> usize {
        self.yard.fleet.size()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Write the current fleet now. Storage failures are returned here so an
    /// operator can act on them.
    pub fn save_now(&self) -> ShipyardResult<SaveOutcome> {
        self.yard.flush()
    }

    pub fn ledger(&self) -> &EventLedger {
        &self.yard.ledger
    }

    /// One line per unit, in fleet order.
    pub fn fleet_report(&self) -> String {
        let units = self.snapshot();
        if units.is_empty() {
            return "No units in fleet.".to_string();
        }
        units
            .iter()
            .map(|u| format!("- {u}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        self.scheduler.shutdown(timeout, self.config.cancel_grace())
    }

    /// Shutdown with the configured timeout.
    pub fn close(&self) -> ShutdownReport {
        self.shutdown(self.config.shutdown_timeout())
    }
}

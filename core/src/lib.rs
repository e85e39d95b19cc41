//! Shipyard core: concurrent fleet construction with durable snapshots.
//!
//! Build requests run on a bounded worker pool and land in a shared,
//! mutex-guarded fleet. Every mutation writes a snapshot through a
//! single-writer persistence gateway; startup restores the last one.

pub mod cancel;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod fleet;
pub mod ledger;
pub mod persistence;
pub mod rng;
pub mod scheduler;
pub mod snapshot;
pub mod types;
pub mod unit;
pub mod yard;

pub use catalog::{Catalog, TemplateSource, UnitTemplate};
pub use config::ShipyardConfig;
pub use engine::{EngineParts, EquipOutcome, ShipyardEngine, UpgradeOutcome};
pub use error::{ShipyardError, ShipyardResult};
pub use scheduler::{RejectReason, SchedulerStats, ShutdownReport, SubmitOutcome};
pub use unit::{Ability, Unit};

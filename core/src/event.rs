//! Engine events: everything the shipyard records in its ledger.
//!
//! Variants are appended, never removed or reordered: the ledger stores
//! the serialized payload and `event_type()` name.

use crate::types::{Revision, TaskId, TypeName};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShipyardEvent {
    // ── Startup ────────────────────────────────────
    FleetRestored {
        units: usize,
    },

    // ── Build lifecycle ────────────────────────────
    BuildAccepted {
        task_id:   TaskId,
        unit_type: TypeName,
    },
    BuildRejected {
        unit_type: TypeName,
        reason:    String,
    },
    BuildCompleted {
        task_id:    TaskId,
        unit_type:  TypeName,
        fleet_size: usize,
    },
    BuildAborted {
        task_id:   TaskId,
        unit_type: TypeName,
    },
    BuildInterrupted {
        task_id:   TaskId,
        unit_type: TypeName,
    },
    BuildDropped {
        task_id:   TaskId,
        unit_type: TypeName,
    },

    // ── Fleet mutations ────────────────────────────
    UnitUpgraded {
        name:   String,
        health: u32,
    },
    AbilityEquipped {
        name:    String,
        ability: String,
    },
    UnitDecommissioned {
        name: String,
    },

    // ── Persistence ────────────────────────────────
    SnapshotSaved {
        revision: Revision,
        units:    usize,
    },
    SnapshotFailed {
        revision: Revision,
        error:    String,
    },

    // ── Shutdown ───────────────────────────────────
    ShutdownCompleted {
        completed: u64,
        dropped:   u64,
        aborted:   u64,
        timed_out: bool,
    },
}

impl ShipyardEvent {
    /// Stable name stored in the ledger's event_type column.
    pub fn event_type(&self) -> &'static str {
        match self {
            ShipyardEvent::FleetRestored { .. }      => "fleet_restored",
            ShipyardEvent::BuildAccepted { .. }      => "build_accepted",
            ShipyardEvent::BuildRejected { .. }      => "build_rejected",
            ShipyardEvent::BuildCompleted { .. }     => "build_completed",
            ShipyardEvent::BuildAborted { .. }       => "build_aborted",
            ShipyardEvent::BuildInterrupted { .. }   => "build_interrupted",
            ShipyardEvent::BuildDropped { .. }       => "build_dropped",
            ShipyardEvent::UnitUpgraded { .. }       => "unit_upgraded",
            ShipyardEvent::AbilityEquipped { .. }    => "ability_equipped",
            ShipyardEvent::UnitDecommissioned { .. } => "unit_decommissioned",
            ShipyardEvent::SnapshotSaved { .. }      => "snapshot_saved",
            ShipyardEvent::SnapshotFailed { .. }     => "snapshot_failed",
            ShipyardEvent::ShutdownCompleted { .. }  => "shutdown_completed",
        }
    }
}

//! Snapshot schema: the durable form of the fleet.
//!
//! The record layout is versioned and independent of `Unit`'s in-memory
//! representation. Field names are part of the on-disk format; never rename
//! them without bumping SCHEMA_VERSION.

use crate::{
    error::{ShipyardError, ShipyardResult},
    unit::{Ability, Unit},
};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSnapshot {
    pub version: u32,
    pub units:   Vec<UnitRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRecord {
    pub name:         String,
    pub health:       u32,
    pub attack_power: u32,
    #[serde(default)]
    pub abilities:    Vec<String>,
}

impl From<&Unit> for UnitRecord {
    fn from(unit: &Unit) -> Self {
        Self {
            name:         unit.name.clone(),
            health:       unit.health(),
            attack_power: unit.attack_power(),
            abilities:    unit.abilities().map(|a| a.tag().to_string()).collect(),
        }
    }
}

impl TryFrom<UnitRecord> for Unit {
    type Error = ShipyardError;

    fn try_from(record: UnitRecord) -> ShipyardResult<Self> {
        let abilities = record
            .abilities
            .iter()
            .map(|tag| tag.parse::<Ability>())
            .collect::<ShipyardResult<Vec<_>>>()?;
        Ok(Unit::new(record.name, record.health, record.attack_power).with_abilities(abilities))
    }
}

impl PersistedSnapshot {
    pub fn from_units(units: &[Unit]) -> Self {
        Self {
            version: SCHEMA_VERSION,
            units:   units.iter().map(UnitRecord::from).collect(),
        }
    }

    /// Rebuild units in file order. Fails on a version mismatch or an
    /// unknown ability tag.
    pub fn into_units(self) -> ShipyardResult<Vec<Unit>> {
        if self.version != SCHEMA_VERSION {
            return Err(ShipyardError::SchemaVersion {
                expected: SCHEMA_VERSION,
                found:    self.version,
            });
        }
        self.units.into_iter().map(Unit::try_from).collect()
    }
}

//! Constructed units and their capability tags.

use crate::{catalog::UnitTemplate, error::ShipyardError};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// Capability tags a unit can carry. Closed set; never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Ability {
    LaserCannon,
    ShieldGenerator,
    MissileLauncher,
    CloakingDevice,
    RepairDrones,
}

impl Ability {
    pub const ALL: [Ability; 5] = [
        Ability::LaserCannon,
        Ability::ShieldGenerator,
        Ability::MissileLauncher,
        Ability::CloakingDevice,
        Ability::RepairDrones,
    ];

    /// Stable tag written to snapshots.
    pub fn tag(self) -> &'static str {
        match self {
            Ability::LaserCannon     => "LASER_CANNON",
            Ability::ShieldGenerator => "SHIELD_GENERATOR",
            Ability::MissileLauncher => "MISSILE_LAUNCHER",
            Ability::CloakingDevice  => "CLOAKING_DEVICE",
            Ability::RepairDrones    => "REPAIR_DRONES",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Ability {
    type Err = ShipyardError;

    /// Accepts the snapshot tag, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ability::ALL
            .into_iter()
            .find(|a| a.tag().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ShipyardError::UnknownAbility { tag: s.to_string() })
    }
}

/// A unit in the fleet. Owned by the fleet once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub name:         String,
    health:           u32,
    attack_power:     u32,
    abilities:        BTreeSet<Ability>,
}

impl Unit {
    pub fn new(name: impl Into<String>, health: u32, attack_power: u32) -> Self {
        Self {
            name: name.into(),
            health,
            attack_power,
            abilities: BTreeSet::new(),
        }
    }

    /// Fresh unit carrying the template's base stats and no abilities.
    pub fn from_template(template: &UnitTemplate) -> Self {
        Self::new(template.name.clone(), template.base_health, template.base_attack)
    }

    pub fn health(&self) -> u32       { self.health }
    pub fn attack_power(&self) -> u32 { self.attack_power }

    /// Reduce health; clamps at zero.
    pub fn take_damage(&mut self, damage: u32) {
        self.health = self.health.saturating_sub(damage);
    }

    /// Raise health by `amount`. No upper cap beyond the integer range.
    pub fn reinforce(&mut self, amount: u32) {
        self.health = self.health.saturating_add(amount);
    }

    pub fn is_destroyed(&self) -> bool {
        self.health == 0
    }

    /// Returns false if the ability was already present.
    pub fn add_ability(&mut self, ability: Ability) -> bool {
        self.abilities.insert(ability)
    }

    pub fn remove_ability(&mut self, ability: Ability) -> bool {
        self.abilities.remove(&ability)
    }

    pub fn has_ability(&self, ability: Ability) -> bool {
        self.abilities.contains(&ability)
    }

    /// Abilities in stable (declaration) order.
    pub fn abilities(&self) -> impl Iterator<Item = Ability> + '_ {
        self.abilities.iter().copied()
    }

    pub(crate) fn with_abilities(mut self, abilities: impl IntoIterator<Item = Ability>) -> Self {
        self.abilities.extend(abilities);
        self
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | Health: {} | Attack: {}",
            self.name, self.health, self.attack_power
        )?;
        if !self.abilities.is_empty() {
            let tags: Vec<&str> = self.abilities.iter().map(|a| a.tag()).collect();
            write!(f, " | Abilities: {}", tags.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_clamps_at_zero() {
        let mut unit = Unit::new("Fighter", 100, 20);
        unit.take_damage(30);
        assert_eq!(unit.health(), 70);
        unit.take_damage(500);
        assert_eq!(unit.health(), 0);
        assert!(unit.is_destroyed());
    }

    #[test]
    fn reinforce_saturates_instead_of_wrapping() {
        let mut unit = Unit::new("Battleship", u32::MAX - 10, 60);
        unit.reinforce(50);
        assert_eq!(unit.health(), u32::MAX);
    }

    #[test]
    fn abilities_have_no_duplicates() {
        let mut unit = Unit::new("Cruiser", 200, 40);
        assert!(unit.add_ability(Ability::CloakingDevice));
        assert!(!unit.add_ability(Ability::CloakingDevice));
        assert!(unit.add_ability(Ability::LaserCannon));
        assert_eq!(unit.abilities().count(), 2);

        assert!(unit.remove_ability(Ability::CloakingDevice));
        assert!(!unit.has_ability(Ability::CloakingDevice));
        assert!(unit.has_ability(Ability::LaserCannon));
    }

    #[test]
    fn ability_tags_parse_case_insensitively() {
        assert_eq!("repair_drones".parse::<Ability>().unwrap(), Ability::RepairDrones);
        assert_eq!("SHIELD_GENERATOR".parse::<Ability>().unwrap(), Ability::ShieldGenerator);
        assert!("WARP_CORE".parse::<Ability>().is_err());
    }

    #[test]
    fn display_lists_stats_and_abilities() {
        let mut unit = Unit::new("Fighter", 100, 20);
        assert_eq!(unit.to_string(), "Fighter | Health: 100 | Attack: 20");
        unit.add_ability(Ability::MissileLauncher);
        assert_eq!(
            unit.to_string(),
            "Fighter | Health: 100 | Attack: 20 | Abilities: MISSILE_LAUNCHER"
        );
    }
}

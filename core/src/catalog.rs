//! Unit template catalog.
//!
//! RULE: The catalog is built once, before the engine starts, and is
//! never mutated afterwards. It is shared as `Arc<dyn TemplateSource>`;
//! there is no process-wide registry.

use crate::{
    config::{ShipyardConfig, TemplateConfig},
    error::{ShipyardError, ShipyardResult},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Base stats for one buildable unit type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTemplate {
    pub name:        String,
    pub base_health: u32,
    pub base_attack: u32,
}

/// Where build tasks resolve templates at execution time.
///
/// `Catalog` is the production implementation. The indirection exists so a
/// template that disappears between submit and execution can be observed.
pub trait TemplateSource: Send + Sync {
    fn template(&self, type_name: &str) -> Option<UnitTemplate>;
}

#[derive(Debug, Clone)]
pub struct Catalog {
    templates: Vec<UnitTemplate>,
    index:     HashMap<String, usize>,
}

impl Catalog {
    pub fn new(templates: Vec<UnitTemplate>) -> ShipyardResult<Self> {
        if templates.is_empty() {
            return Err(ShipyardError::InvalidCatalog {
                reason: "catalog has no entries".into(),
            });
        }
        let mut index = HashMap::with_capacity(templates.len());
        for (i, t) in templates.iter().enumerate() {
            if t.name.trim().is_empty() {
                return Err(ShipyardError::InvalidCatalog {
                    reason: format!("entry {i} has an empty name"),
                });
            }
            if t.base_health == 0 || t.base_attack == 0 {
                return Err(ShipyardError::InvalidCatalog {
                    reason: format!("'{}' must have positive health and attack", t.name),
                });
            }
            if index.insert(t.name.clone(), i).is_some() {
                return Err(ShipyardError::InvalidCatalog {
                    reason: format!("duplicate entry '{}'", t.name),
                });
            }
        }
        Ok(Self { templates, index })
    }

    pub fn from_config(entries: &[TemplateConfig]) -> ShipyardResult<Self> {
        Self::new(
            entries
                .iter()
                .map(|e| UnitTemplate {
                    name:        e.name.clone(),
                    base_health: e.health,
                    base_attack: e.attack,
                })
                .collect(),
        )
    }

    /// The catalog of `ShipyardConfig::reference()`: Fighter 100/20,
    /// Cruiser 200/40, Battleship 300/60.
    pub fn reference() -> ShipyardResult<Self> {
        Self::from_config(&ShipyardConfig::reference().catalog)
    }

    /// Exact-name lookup.
    pub fn lookup(&self, type_name: &str) -> Option<&UnitTemplate> {
        self.index.get(type_name).map(|&i| &self.templates[i])
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.index.contains_key(type_name)
    }

    /// Templates in configuration order.
    pub fn templates(&self) -> &[UnitTemplate] {
        &self.templates
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateSource for Catalog {
    fn template(&self, type_name: &str) -> Option<UnitTemplate> {
        self.lookup(type_name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, health: u32, attack: u32) -> TemplateConfig {
        TemplateConfig { name: name.into(), health, attack }
    }

    #[test]
    fn reference_catalog_has_three_entries_in_order() {
        let catalog = Catalog::reference().unwrap();
        let names: Vec<&str> = catalog.templates().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Fighter", "Cruiser", "Battleship"]);

        let cruiser = catalog.lookup("Cruiser").expect("cruiser");
        assert_eq!((cruiser.base_health, cruiser.base_attack), (200, 40));
        assert!(catalog.lookup("Dreadnought").is_none());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let catalog = Catalog::reference().unwrap();
        assert!(catalog.lookup("fighter").is_none());
        assert!(catalog.contains("Fighter"));
    }

    #[test]
    fn rejects_duplicates_and_zero_stats() {
        assert!(Catalog::from_config(&[entry("Scout", 10, 1), entry("Scout", 20, 2)]).is_err());
        assert!(Catalog::from_config(&[entry("Scout", 0, 1)]).is_err());
        assert!(Catalog::from_config(&[entry("  ", 10, 1)]).is_err());
        assert!(Catalog::from_config(&[]).is_err());
    }

    #[test]
    fn from_config_matches_reference() {
        let catalog = Catalog::from_config(&[
            entry("Fighter", 100, 20),
            entry("Cruiser", 200, 40),
            entry("Battleship", 300, 60),
        ])
        .unwrap();
        assert_eq!(catalog.templates(), Catalog::reference().unwrap().templates());
    }
}

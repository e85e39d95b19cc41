use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub name:   String,
    pub health: u32,
    pub attack: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipyardConfig {
    pub catalog:              Vec<TemplateConfig>,
    /// Maximum number of builds executing at once.
    pub pool_capacity:        usize,
    pub build_latency_ms:     u64,
    /// Extra per-task latency in [0, build_jitter_ms], seeded by `seed`.
    pub build_jitter_ms:      u64,
    pub seed:                 u64,
    pub upgrade_health_delta: u32,
    pub save_path:            String,
    /// None keeps the ledger in memory.
    pub ledger_path:          Option<String>,
    pub shutdown_timeout_ms:  u64,
    /// How long shutdown waits for interrupted workers to settle after
    /// cancelling them.
    pub cancel_grace_ms:      u64,
}

impl Default for ShipyardConfig {
    fn default() -> Self {
        Self::reference()
    }
}

impl ShipyardConfig {
    /// The stock shipyard: three hulls, two slipways, two-second builds.
    pub fn reference() -> Self {
        Self {
            catalog: vec![
                TemplateConfig { name: "Fighter".into(),    health: 100, attack: 20 },
                TemplateConfig { name: "Cruiser".into(),    health: 200, attack: 40 },
                TemplateConfig { name: "Battleship".into(), health: 300, attack: 60 },
            ],
            pool_capacity:        2,
            build_latency_ms:     2_000,
            build_jitter_ms:      0,
            seed:                 0,
            upgrade_health_delta: 50,
            save_path:            "resources/ships.json".into(),
            ledger_path:          None,
            shutdown_timeout_ms:  3_000,
            cancel_grace_ms:      250,
        }
    }

    /// Load from a JSON file. Missing fields fall back to `reference()`.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ShipyardConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pool_capacity == 0 {
            anyhow::bail!("pool_capacity must be at least 1");
        }
        if self.save_path.trim().is_empty() {
            anyhow::bail!("save_path must not be empty");
        }
        crate::catalog::Catalog::from_config(&self.catalog)?;
        Ok(())
    }

    /// Config with no construction latency, for tests. The snapshot goes
    /// to a fresh file under the system temp directory.
    pub fn default_test() -> Self {
        let save_path = std::env::temp_dir()
            .join(format!("shipyard-test-{}.json", uuid::Uuid::new_v4()));
        Self {
            build_latency_ms:    0,
            shutdown_timeout_ms: 1_000,
            cancel_grace_ms:     100,
            save_path:           save_path.to_string_lossy().into_owned(),
            ..Self::reference()
        }
    }

    pub fn build_latency(&self) -> Duration {
        Duration::from_millis(self.build_latency_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

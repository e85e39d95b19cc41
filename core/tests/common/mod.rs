//! Helpers shared by the integration tests.

#![allow(dead_code)]

use shipyard_core::ShipyardConfig;
use std::{
    path::Path,
    thread,
    time::{Duration, Instant},
};

/// Route library logs through `env_logger`; `RUST_LOG=debug` shows them.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Test config with its snapshot inside `dir`.
pub fn config_in(dir: &Path) -> ShipyardConfig {
    init_logging();
    let mut config = ShipyardConfig::default_test();
    config.save_path = dir.join("ships.json").to_string_lossy().into_owned();
    config
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(2));
    }
}

pub const PATIENCE: Duration = Duration::from_secs(10);

//! Persistence gateway: writes fleet snapshots to disk and restores them.
//!
//! RULES:
//!   - Callers copy the fleet under the fleet lock; this module does the I/O
//!     after that lock is released.
//!   - One writer at a time. Writes go to a sibling temp file and are renamed
//!     into place, so a failed write leaves the previous file intact.
//!   - A snapshot older than the last one written is skipped, never written
//!     over newer state.
//!   - Loading never fails the caller: missing or unreadable files restore
//!     an empty fleet.

use crate::{
    error::ShipyardResult,
    fleet::FleetSnapshot,
    snapshot::PersistedSnapshot,
    types::Revision,
    unit::Unit,
};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { revision: Revision, units: usize },
    /// A snapshot at `latest` (>= this one) is already on disk.
    Superseded { revision: Revision, latest: Revision },
}

#[derive(Default)]
struct WriterState {
    last_written: Option<Revision>,
    writes:       u64,
}

pub struct SnapshotStore {
    path:   PathBuf,
    writer: Mutex<WriterState>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:   path.into(),
            writer: Mutex::new(WriterState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of snapshots durably written by this store.
    pub fn writes(&self) -> u64 {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner).writes
    }

    pub fn save(&self, snapshot: &FleetSnapshot) -> ShipyardResult<SaveOutcome> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(latest) = writer.last_written {
            if snapshot.revision <= latest {
                log::debug!(
                    "Skipping snapshot r{} (r{latest} already written)",
                    snapshot.revision
                );
                return Ok(SaveOutcome::Superseded {
                    revision: snapshot.revision,
                    latest,
                });
            }
        }

        let bytes = serde_json::to_vec_pretty(&PersistedSnapshot::from_units(&snapshot.units))?;
        self.write_atomically(&bytes)?;

        writer.last_written = Some(snapshot.revision);
        writer.writes += 1;
        log::debug!(
            "Snapshot r{} saved to {} ({} units)",
            snapshot.revision,
            self.path.display(),
            snapshot.units.len()
        );
        Ok(SaveOutcome::Written {
            revision: snapshot.revision,
            units:    snapshot.units.len(),
        })
    }

    fn write_atomically(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Strict load. `Ok(None)` when no snapshot exists yet.
    pub fn try_load(&self) -> ShipyardResult<Option<Vec<Unit>>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: PersistedSnapshot = serde_json::from_slice(&bytes)?;
        snapshot.into_units().map(Some)
    }

    /// Lenient load used at startup.
    pub fn load(&self) -> Vec<Unit> {
        match self.try_load() {
            Ok(Some(units)) => {
                log::info!("Restored {} units from {}", units.len(), self.path.display());
                units
            }
            Ok(None) => {
                log::info!("No snapshot at {}; starting with an empty fleet", self.path.display());
                Vec::new()
            }
            Err(e) => {
                log::warn!(
                    "Unreadable snapshot at {}: {e}; starting with an empty fleet",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }
}

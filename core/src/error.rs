use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShipyardError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported snapshot schema version {found} (expected {expected})")]
    SchemaVersion { expected: u32, found: u32 },

    #[error("Unknown ability tag '{tag}'")]
    UnknownAbility { tag: String },

    #[error("Invalid catalog: {reason}")]
    InvalidCatalog { reason: String },

    #[error("Worker thread could not be started: {0}")]
    WorkerSpawn(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ShipyardResult<T> = Result<T, ShipyardError>;

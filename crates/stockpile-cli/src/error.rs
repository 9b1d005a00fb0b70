use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] stockpile_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No payload provided")]
    EmptyPayload,
    #[error("Payload must be a JSON object: {0}")]
    InvalidPayload(String),
    #[error("Entity id cannot be empty")]
    EmptyEntityId,
    #[error(
        "Sync is not configured. Set STOCKPILE_SYNC_ENDPOINT to the remote sync endpoint to enable delivery."
    )]
    SyncNotConfigured,
}

//! Inkboard App
//!
//! Headless shell around `inkboard-core`: replays scripted editing sessions
//! through the interaction controller and history service.

pub mod replay;

use inkboard_core::{ConfigError, SceneError, StorageError};
use thiserror::Error;

pub use replay::{Action, Replay};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid script: {0}")]
    Script(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Scene error: {0}")]
    Scene(#[from] SceneError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

//! Error types for wallsync.
//!
//! Every layer has its own error enum; [`WallsyncError`] is what the CLI
//! surfaces to the user.

use thiserror::Error;

use crate::config::ConfigError;
use crate::sync::SyncError;
use crate::sync::service::StartupError;

/// Errors that end a CLI invocation.
#[derive(Debug, Error)]
pub enum WallsyncError {
    /// Invalid command arguments.
    #[error("{0}")]
    InvalidArguments(String),

    /// Loading or validating the configuration failed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The reconciler could not start.
    #[error("startup failed: {0}")]
    Startup(#[from] StartupError),

    /// A one-shot sync cycle failed.
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),

    /// Encoding command output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

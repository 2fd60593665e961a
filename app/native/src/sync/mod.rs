//! The wallpaper reconciler.
//!
//! Two watchers share one [`HandledStore`]:
//!
//! - [`LocalWatcher`] publishes changes of the local background file into the
//!   shared folder, marking each artifact as handled *before* copying it.
//! - [`RemoteWatcher`] applies the newest artifact of the shared folder,
//!   marking it as handled only *after* the apply succeeded.
//!
//! [`SyncService`] wires both to a [`ChangeStream`] through a [`Debouncer`].

pub mod artifact;
pub mod bridge;
pub mod debounce;
pub mod events;
pub mod handled;
pub mod local;
pub mod remote;
pub mod retry;
pub mod service;

use std::io;
use std::path::PathBuf;

pub use artifact::{ArtifactId, InvalidArtifactId};
pub use bridge::{ApplyError, CommandSetter, NativeSetter, Setter, WallpaperSetter};
pub use debounce::Debouncer;
pub use events::{ChangeEvent, ChangeSource, ChangeStream, WatchTargets};
pub use handled::{HandledGuard, HandledStore, StoreError, load_handled_set};
pub use local::{LocalWatcher, PublishOutcome};
pub use remote::{ReconcileOutcome, RemoteWatcher, list_artifacts, newest_artifact};
pub use retry::RetryPolicy;
pub use service::{StartupError, StatusReport, SyncService, read_status, shutdown_signal};

/// Errors that end a single reconciliation cycle.
///
/// None of these stop the daemon; the next trigger starts a fresh cycle.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Reading or writing the handled set failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The artifact was marked but could not be copied into the shared folder.
    #[error("failed to publish {id}: {source}")]
    Publish { id: ArtifactId, source: io::Error },

    /// The shared folder could not be listed.
    #[error("failed to scan {}: {source}", path.display())]
    Scan { path: PathBuf, source: io::Error },

    /// The wallpaper setter reported failure.
    #[error("failed to apply {id}: {source}")]
    Apply { id: ArtifactId, source: ApplyError },
}

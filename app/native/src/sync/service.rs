//! The long-running reconciler.
//!
//! Startup order matters: directories are created and the handled set loaded
//! first, then one remote pass runs to completion, and only then is the
//! notification stream armed. From that point on every classified change is
//! debounced per source and dispatched to the matching watcher.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::artifact::ArtifactId;
use super::bridge::WallpaperSetter;
use super::debounce::Debouncer;
use super::events::{ChangeEvent, ChangeSource, ChangeStream, WatchTargets};
use super::handled::{HandledStore, StoreError, load_handled_set};
use super::local::{LocalWatcher, PublishOutcome};
use super::remote::{ReconcileOutcome, RemoteWatcher, newest_artifact};
use super::SyncError;
use crate::config::SyncSettings;

/// Failures that prevent the reconciler from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// A required directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    /// The handled set could not be loaded.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The notification backend could not be armed.
    #[error("failed to watch for changes: {0}")]
    Watch(#[from] notify::Error),
}

/// Snapshot of the reconciler state, as printed by `wallsync status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub local_wallpaper: PathBuf,
    pub local_wallpaper_exists: bool,
    pub shared_folder: PathBuf,
    pub state_file: PathBuf,
    pub newest_artifact: Option<ArtifactId>,
    pub newest_handled: bool,
    pub handled_count: usize,
}

/// Owns the watchers, the handled set and the debouncer.
pub struct SyncService<S> {
    settings: SyncSettings,
    store: Arc<HandledStore>,
    local: Arc<LocalWatcher>,
    remote: Arc<RemoteWatcher<S>>,
    debouncer: Debouncer<ChangeSource>,
}

impl<S> SyncService<S>
where S: WallpaperSetter + 'static
{
    /// Prepares the reconciler.
    ///
    /// Creates the shared folder, the state directory and the directory of
    /// the local background file, then loads the handled set.
    ///
    /// # Errors
    ///
    /// Returns a [`StartupError`] if a directory cannot be created or the
    /// handled set cannot be read. Both are fatal.
    pub fn new(settings: SyncSettings, setter: S) -> Result<Self, StartupError> {
        ensure_dir(&settings.shared_folder)?;
        if let Some(state_dir) = settings.state_file.parent() {
            ensure_dir(state_dir)?;
        }
        if let Some(local_dir) = settings.local_wallpaper.parent() {
            ensure_dir(local_dir)?;
        }

        let store = Arc::new(HandledStore::open(&settings.state_file)?);
        let local = Arc::new(LocalWatcher::new(
            &settings.local_wallpaper,
            &settings.shared_folder,
            Arc::clone(&store),
            settings.publish_retry,
        ));
        let remote =
            Arc::new(RemoteWatcher::new(&settings.shared_folder, Arc::clone(&store), setter));

        Ok(Self { settings, store, local, remote, debouncer: Debouncer::new() })
    }

    /// The resolved settings.
    #[must_use]
    pub const fn settings(&self) -> &SyncSettings { &self.settings }

    /// The shared handled set.
    #[must_use]
    pub fn store(&self) -> &Arc<HandledStore> { &self.store }

    /// Runs one local publish cycle.
    ///
    /// # Errors
    ///
    /// See [`LocalWatcher::run_cycle`].
    pub async fn publish_once(&self) -> Result<PublishOutcome, SyncError> {
        self.local.run_cycle().await
    }

    /// Runs one remote reconciliation pass.
    ///
    /// # Errors
    ///
    /// See [`RemoteWatcher::run_cycle`].
    pub async fn reconcile_once(&self) -> Result<ReconcileOutcome, SyncError> {
        self.remote.run_cycle().await
    }

    /// Runs the startup pass. Failures are logged and never fatal.
    pub async fn reconcile_startup(&self) {
        tracing::debug!("running startup reconciliation");
        log_remote_outcome(self.remote.run_cycle().await);
    }

    /// Runs until `shutdown` resolves.
    ///
    /// On shutdown the notification stream is dropped first, then pending
    /// timers are discarded and in-flight cycles are awaited, so no handled
    /// set write is cut short.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Watch`] if the notification stream cannot be
    /// armed.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), StartupError> {
        self.reconcile_startup().await;

        let targets = WatchTargets::new(&self.settings.local_wallpaper, &self.settings.shared_folder);
        let mut stream = ChangeStream::watch(targets)?;
        tracing::info!(
            local_wallpaper = %self.settings.local_wallpaper.display(),
            shared_folder = %self.settings.shared_folder.display(),
            "wallsync is running"
        );

        let mut shutdown = std::pin::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                change = stream.next() => match change {
                    Some(change) => self.dispatch(change),
                    None => {
                        tracing::warn!("notification stream ended");
                        break;
                    }
                },
            }
        }

        drop(stream);
        self.debouncer.shutdown().await;
        tracing::info!("wallsync stopped");

        Ok(())
    }

    fn dispatch(&self, change: ChangeEvent) {
        tracing::trace!(source = %change.source, path = %change.path.display(), "change detected");

        let delay = self.settings.debounce;
        let scheduled = match change.source {
            ChangeSource::Local => {
                let local = Arc::clone(&self.local);
                self.debouncer.schedule(ChangeSource::Local, delay, move || async move {
                    log_local_outcome(local.run_cycle().await);
                })
            }
            ChangeSource::Remote => {
                let remote = Arc::clone(&self.remote);
                self.debouncer.schedule(ChangeSource::Remote, delay, move || async move {
                    log_remote_outcome(remote.run_cycle().await);
                })
            }
        };

        if !scheduled {
            tracing::trace!(source = %change.source, "ignoring change after shutdown");
        }
    }
}

fn ensure_dir(path: &Path) -> Result<(), StartupError> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(path)
        .map_err(|source| StartupError::CreateDir { path: path.to_path_buf(), source })
}

fn log_local_outcome(result: Result<PublishOutcome, SyncError>) {
    if let Err(err) = result {
        tracing::error!(error = %err, "local sync cycle failed");
    }
}

fn log_remote_outcome(result: Result<ReconcileOutcome, SyncError>) {
    match result {
        Ok(ReconcileOutcome::Vanished(id)) => {
            tracing::debug!(artifact = %id, "nothing applied, artifact vanished");
        }
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "remote sync cycle failed"),
    }
}

/// Collects the reconciler state from disk without changing anything.
///
/// Nothing is created and a corrupt handled set is reported, not
/// quarantined. A shared folder that does not exist yet has no artifacts.
///
/// # Errors
///
/// Returns [`SyncError::Scan`] if the shared folder cannot be listed and
/// [`SyncError::Store`] if the handled set cannot be read.
pub async fn read_status(settings: &SyncSettings) -> Result<StatusReport, SyncError> {
    let newest = if tokio::fs::try_exists(&settings.shared_folder).await.unwrap_or(false) {
        newest_artifact(&settings.shared_folder).await?
    } else {
        None
    };

    let state_file = settings.state_file.clone();
    let handled = tokio::task::spawn_blocking(move || load_handled_set(&state_file))
        .await
        .map_err(|err| StoreError::Task(err.to_string()))??;

    Ok(StatusReport {
        local_wallpaper: settings.local_wallpaper.clone(),
        local_wallpaper_exists: tokio::fs::try_exists(&settings.local_wallpaper)
            .await
            .unwrap_or(false),
        shared_folder: settings.shared_folder.clone(),
        state_file: settings.state_file.clone(),
        newest_handled: newest.as_ref().is_some_and(|id| handled.contains(id)),
        newest_artifact: newest,
        handled_count: handled.len(),
    })
}

/// Installs the Ctrl-C and `SIGTERM` handlers and returns a future that
/// resolves once either signal arrives.
///
/// The handlers are registered before this returns, so a signal received
/// during the startup pass still shuts the daemon down gracefully. Must be
/// called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if a handler cannot be registered.
#[cfg(unix)]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => tracing::debug!("received Ctrl-C"),
            _ = terminate.recv() => tracing::debug!("received SIGTERM"),
        }
    })
}

/// Installs the Ctrl-C handler and returns a future that resolves once it
/// fires.
///
/// # Errors
///
/// Returns an error if the handler cannot be registered.
#[cfg(windows)]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;

    Ok(async move {
        ctrl_c.recv().await;
        tracing::debug!("received Ctrl-C");
    })
}

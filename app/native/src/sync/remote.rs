//! Converging the local desktop to the newest artifact in the shared folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::SyncError;
use super::artifact::ArtifactId;
use super::bridge::WallpaperSetter;
use super::handled::HandledStore;

/// Result of one remote reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The shared folder holds no artifacts.
    NoArtifacts,
    /// The newest artifact was already handled on this node.
    AlreadyHandled(ArtifactId),
    /// The newest artifact is older than one this node already handled.
    Superseded(ArtifactId),
    /// The newest artifact disappeared between the scan and the apply.
    Vanished(ArtifactId),
    /// The newest artifact was applied and marked as handled.
    Applied(ArtifactId),
}

/// Lists the artifacts in `folder`, ignoring every other entry.
///
/// # Errors
///
/// Returns [`SyncError::Scan`] if the directory cannot be read.
pub async fn list_artifacts(folder: &Path) -> Result<Vec<ArtifactId>, SyncError> {
    let scan_err = |source| SyncError::Scan { path: folder.to_path_buf(), source };

    let mut entries = tokio::fs::read_dir(folder).await.map_err(scan_err)?;
    let mut artifacts = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(scan_err)? {
        let name = entry.file_name();
        let Some(id) = name.to_str().and_then(ArtifactId::parse) else {
            continue;
        };
        // Symlinks are followed; directories that happen to match are not artifacts.
        match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_file() => artifacts.push(id),
            _ => tracing::trace!(entry = %id, "skipping non-file entry"),
        }
    }

    Ok(artifacts)
}

/// Returns the newest artifact in `folder`, if any.
///
/// # Errors
///
/// Returns [`SyncError::Scan`] if the directory cannot be read.
pub async fn newest_artifact(folder: &Path) -> Result<Option<ArtifactId>, SyncError> {
    Ok(list_artifacts(folder).await?.into_iter().max())
}

/// Watches the shared folder and applies artifacts coming from other nodes.
pub struct RemoteWatcher<S> {
    shared_folder: PathBuf,
    store: Arc<HandledStore>,
    setter: S,
    /// Serializes passes so two of them can never both apply one artifact.
    pass: Mutex<()>,
}

impl<S: WallpaperSetter> RemoteWatcher<S> {
    /// Creates a watcher over `shared_folder`, applying through `setter`.
    #[must_use]
    pub fn new(shared_folder: impl Into<PathBuf>, store: Arc<HandledStore>, setter: S) -> Self {
        Self { shared_folder: shared_folder.into(), store, setter, pass: Mutex::new(()) }
    }

    /// The shared folder.
    #[must_use]
    pub fn shared_folder(&self) -> &Path { &self.shared_folder }

    /// The configured setter.
    #[must_use]
    pub const fn setter(&self) -> &S { &self.setter }

    /// Runs one reconciliation pass.
    ///
    /// The artifact is marked as handled only after the setter reports
    /// success, so a failed apply is retried by the next pass instead of being
    /// skipped forever.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Scan`] if the shared folder cannot be listed,
    /// [`SyncError::Apply`] if the setter failed, and [`SyncError::Store`] if
    /// the wallpaper was applied but the mark could not be persisted.
    pub async fn run_cycle(&self) -> Result<ReconcileOutcome, SyncError> {
        let _pass = self.pass.lock().await;

        let Some(newest) = newest_artifact(&self.shared_folder).await? else {
            tracing::debug!("shared folder has no artifacts yet");
            return Ok(ReconcileOutcome::NoArtifacts);
        };

        self.reconcile(newest).await
    }

    /// Applies `candidate` unless it is handled, superseded or gone.
    ///
    /// Callers hold the pass lock.
    async fn reconcile(&self, candidate: ArtifactId) -> Result<ReconcileOutcome, SyncError> {
        {
            let handled = self.store.lock().await;
            if handled.contains(&candidate) {
                tracing::debug!(artifact = %candidate, "newest artifact already handled");
                return Ok(ReconcileOutcome::AlreadyHandled(candidate));
            }
            if let Some(latest) = handled.newest().filter(|latest| **latest > candidate) {
                tracing::debug!(
                    artifact = %candidate,
                    handled = %latest,
                    "newest artifact is older than a handled one"
                );
                return Ok(ReconcileOutcome::Superseded(candidate));
            }
        }

        let path = self.shared_folder.join(candidate.as_str());
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!(artifact = %candidate, "artifact vanished before it could be applied");
            return Ok(ReconcileOutcome::Vanished(candidate));
        }

        self.setter
            .apply(&path)
            .await
            .map_err(|source| SyncError::Apply { id: candidate.clone(), source })?;

        self.store.mark(&candidate).await?;
        tracing::info!(artifact = %candidate, "applied wallpaper from shared folder");

        Ok(ReconcileOutcome::Applied(candidate))
    }
}

//! Publishing local wallpaper changes to the shared folder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;

use super::SyncError;
use super::artifact::ArtifactId;
use super::handled::HandledStore;
use super::retry::RetryPolicy;

/// Result of one local cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The background file was not there (mid-replace, or never set).
    SourceMissing,
    /// A new artifact was minted, marked and copied into the shared folder.
    Published(ArtifactId),
}

/// Watches the local background file and publishes each change once.
pub struct LocalWatcher {
    source: PathBuf,
    shared_folder: PathBuf,
    store: Arc<HandledStore>,
    retry: RetryPolicy,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime { chrono::Local::now().naive_local() }

impl LocalWatcher {
    /// Creates a watcher publishing `source` into `shared_folder`.
    #[must_use]
    pub fn new(
        source: impl Into<PathBuf>,
        shared_folder: impl Into<PathBuf>,
        store: Arc<HandledStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source: source.into(),
            shared_folder: shared_folder.into(),
            store,
            retry,
            clock: local_now,
        }
    }

    /// Replaces the clock used to mint identifiers.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// The local background file.
    #[must_use]
    pub fn source(&self) -> &Path { &self.source }

    /// Runs one publish cycle.
    ///
    /// The new identifier is durably marked as handled before a single byte
    /// reaches the shared folder, so the remote watcher on this node can never
    /// mistake the artifact for a foreign change. If the copy then fails, the
    /// identifier stays marked and the publish is not retried by later cycles.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] if the handled mark could not be persisted
    /// (nothing is copied then) and [`SyncError::Publish`] if every copy
    /// attempt failed.
    pub async fn run_cycle(&self) -> Result<PublishOutcome, SyncError> {
        if !tokio::fs::try_exists(&self.source).await.unwrap_or(false) {
            tracing::debug!(path = %self.source.display(), "background file absent, skipping");
            return Ok(PublishOutcome::SourceMissing);
        }

        let id = self.claim_identifier().await?;
        tracing::debug!(artifact = %id, "marked as handled before publishing");

        let target = self.shared_folder.join(id.as_str());
        self.retry
            .run("publishing wallpaper", || copy_into_place(&self.source, &target))
            .await
            .map_err(|source| SyncError::Publish { id: id.clone(), source })?;

        tracing::info!(artifact = %id, "published local wallpaper");
        Ok(PublishOutcome::Published(id))
    }

    /// Mints a fresh identifier and marks it handled in one critical section.
    ///
    /// Identifiers already handled or already present in the shared folder get
    /// the next collision sequence.
    async fn claim_identifier(&self) -> Result<ArtifactId, SyncError> {
        let mut handled = self.store.lock().await;

        let mut id = ArtifactId::mint((self.clock)());
        while handled.contains(&id)
            || tokio::fs::try_exists(self.shared_folder.join(id.as_str())).await.unwrap_or(false)
        {
            id = id.next_sequence();
        }

        handled.insert(id.clone()).await?;
        Ok(id)
    }
}

/// Copies `source` to `target` through a hidden staging file.
///
/// The staging name never matches the artifact pattern, so other nodes only
/// ever see complete artifacts.
async fn copy_into_place(source: &Path, target: &Path) -> std::io::Result<()> {
    let file_name = target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let staging = target.with_file_name(format!(".{file_name}.partial"));

    let result = async {
        tokio::fs::copy(source, &staging).await?;
        tokio::fs::rename(&staging, target).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&staging).await;
    }
    result
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(14, 30, 0).unwrap()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        source: PathBuf,
        shared: PathBuf,
        store: Arc<HandledStore>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("background");
        let shared = dir.path().join("shared");
        std::fs::create_dir(&shared).unwrap();
        let store = Arc::new(HandledStore::open(dir.path().join("handled.json")).unwrap());
        Fixture { _dir: dir, source, shared, store }
    }

    fn watcher(f: &Fixture) -> LocalWatcher {
        LocalWatcher::new(&f.source, &f.shared, Arc::clone(&f.store), RetryPolicy::once())
            .with_clock(fixed_clock)
    }

    #[tokio::test]
    async fn missing_source_is_a_silent_no_op() {
        let f = fixture();
        let outcome = watcher(&f).run_cycle().await.unwrap();

        assert_eq!(outcome, PublishOutcome::SourceMissing);
        assert!(f.store.is_empty().await);
        assert_eq!(std::fs::read_dir(&f.shared).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn publishes_bytes_under_minted_identifier() {
        let f = fixture();
        std::fs::write(&f.source, b"sunset").unwrap();

        let outcome = watcher(&f).run_cycle().await.unwrap();
        let PublishOutcome::Published(id) = outcome else {
            panic!("expected a publish, got {outcome:?}");
        };

        assert_eq!(id.as_str(), "wallpaper-2024-06-15T14-30-00");
        assert_eq!(std::fs::read(f.shared.join(id.as_str())).unwrap(), b"sunset");
        assert!(f.store.contains(&id).await);
    }

    #[tokio::test]
    async fn leaves_no_staging_files_behind() {
        let f = fixture();
        std::fs::write(&f.source, b"sunset").unwrap();
        watcher(&f).run_cycle().await.unwrap();

        let names: Vec<String> = std::fs::read_dir(&f.shared)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["wallpaper-2024-06-15T14-30-00".to_string()]);
    }

    #[tokio::test]
    async fn same_second_changes_get_distinct_identifiers() {
        let f = fixture();
        std::fs::write(&f.source, b"one").unwrap();
        let w = watcher(&f);

        let first = w.run_cycle().await.unwrap();
        std::fs::write(&f.source, b"two").unwrap();
        let second = w.run_cycle().await.unwrap();

        let (PublishOutcome::Published(a), PublishOutcome::Published(b)) = (first, second) else {
            panic!("both cycles should publish");
        };
        assert_ne!(a, b);
        assert_eq!(b.as_str(), "wallpaper-2024-06-15T14-30-00-1");
        assert!(b > a);
        assert_eq!(std::fs::read(f.shared.join(b.as_str())).unwrap(), b"two");
    }

    #[tokio::test]
    async fn collision_with_foreign_artifact_is_avoided() {
        let f = fixture();
        std::fs::write(&f.source, b"mine").unwrap();
        // Another node published in the very same second.
        std::fs::write(f.shared.join("wallpaper-2024-06-15T14-30-00"), b"theirs").unwrap();

        let PublishOutcome::Published(id) = watcher(&f).run_cycle().await.unwrap() else {
            panic!("expected a publish");
        };

        assert_eq!(id.as_str(), "wallpaper-2024-06-15T14-30-00-1");
        assert_eq!(std::fs::read(f.shared.join("wallpaper-2024-06-15T14-30-00")).unwrap(), b"theirs");
    }

    #[tokio::test]
    async fn failed_publish_keeps_the_handled_mark() {
        let f = fixture();
        std::fs::write(&f.source, b"sunset").unwrap();
        std::fs::remove_dir(&f.shared).unwrap();

        let w = LocalWatcher::new(
            &f.source,
            &f.shared,
            Arc::clone(&f.store),
            RetryPolicy::new(3, Duration::from_millis(1)),
        )
        .with_clock(fixed_clock);

        let err = w.run_cycle().await.unwrap_err();
        let SyncError::Publish { id, .. } = err else {
            panic!("expected a publish error, got {err:?}");
        };

        assert!(f.store.contains(&id).await);
        let reopened = HandledStore::open(f.store.path()).unwrap();
        assert!(reopened.contains(&id).await);
    }
}

//! Durable record of the artifacts this node has already acted upon.
//!
//! The handled set is the only thing that stops a locally published wallpaper
//! from being re-applied by the remote watcher, so every mutation is persisted
//! before it becomes visible to callers.
//!
//! # On-disk format
//!
//! ```json
//! { "handledWallpapers": ["wallpaper-2024-06-15T14-30-00", "..."] }
//! ```
//!
//! Writes go to a temporary file in the same directory which is then renamed
//! over the previous one, so a crash mid-write leaves the old set intact.
//!
//! # Critical section
//!
//! [`HandledStore::lock`] hands out a guard that holds the store's async mutex.
//! Membership checks and insertions done through one guard form a single
//! logical step with respect to every other user of the store.

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use super::artifact::ArtifactId;

/// Errors that can occur while loading or persisting the handled set.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The state file exists but could not be read.
    #[error("failed to read handled set at {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    /// The state file exists but is not a valid handled-set document.
    #[error("handled set at {} is corrupt: {source}", path.display())]
    Corrupt { path: PathBuf, source: serde_json::Error },

    /// The new state could not be written.
    #[error("failed to persist handled set at {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    /// The blocking writer task was cancelled or panicked.
    #[error("handled set writer task failed: {0}")]
    Task(String),
}

/// Serialized form of the handled set.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct HandledFile {
    handled_wallpapers: Vec<String>,
}

/// Loads the handled set from `path` without any recovery.
///
/// A missing file is an empty set. Entries that are valid JSON strings but
/// not artifact identifiers are skipped with a warning.
///
/// # Errors
///
/// Returns [`StoreError::Read`] if the file cannot be read and
/// [`StoreError::Corrupt`] if it does not match the schema.
pub fn load_handled_set(path: &Path) -> Result<BTreeSet<ArtifactId>, StoreError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
        Err(source) => return Err(StoreError::Read { path: path.to_path_buf(), source }),
    };

    let file: HandledFile = serde_json::from_slice(&raw)
        .map_err(|source| StoreError::Corrupt { path: path.to_path_buf(), source })?;

    let mut set = BTreeSet::new();
    for entry in file.handled_wallpapers {
        match ArtifactId::parse(&entry) {
            Some(id) => {
                set.insert(id);
            }
            None => tracing::warn!(entry = %entry, "ignoring invalid entry in handled set"),
        }
    }

    Ok(set)
}

/// Writes `set` to `path` atomically.
fn write_handled_set(path: &Path, set: &[String]) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write { path: path.to_path_buf(), source };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let document = HandledFile { handled_wallpapers: set.to_vec() };
    let mut json = serde_json::to_vec_pretty(&document)
        .map_err(|err| write_err(io::Error::new(io::ErrorKind::InvalidData, err)))?;
    json.push(b'\n');

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&json).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|err| write_err(err.error))?;

    Ok(())
}

/// Moves an unreadable state file out of the way and returns where it went.
fn quarantine(path: &Path) -> io::Result<PathBuf> {
    let stamp = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
    let mut name = path.file_name().map(std::ffi::OsStr::to_os_string).unwrap_or_default();
    name.push(format!(".corrupt-{stamp}"));

    let target = path.with_file_name(name);
    std::fs::rename(path, &target)?;
    Ok(target)
}

/// Persistent, mutex-protected handled set.
#[derive(Debug)]
pub struct HandledStore {
    path: PathBuf,
    entries: Mutex<BTreeSet<ArtifactId>>,
}

impl HandledStore {
    /// Opens the store at `path`.
    ///
    /// A missing file starts an empty set. A corrupt file is renamed to
    /// `<name>.corrupt-<unix-seconds>` and the store starts empty, with a
    /// warning, so the bad data stays available for inspection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the file exists but cannot be read, or
    /// if a corrupt file cannot be quarantined.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let entries = match load_handled_set(&path) {
            Ok(entries) => entries,
            Err(StoreError::Corrupt { source, .. }) => {
                let moved_to = quarantine(&path)
                    .map_err(|source| StoreError::Read { path: path.clone(), source })?;
                tracing::warn!(
                    error = %source,
                    path = %path.display(),
                    moved_to = %moved_to.display(),
                    "handled set was corrupt; starting with an empty set"
                );
                BTreeSet::new()
            }
            Err(err) => return Err(err),
        };

        tracing::debug!(count = entries.len(), path = %path.display(), "loaded handled set");
        Ok(Self { path, entries: Mutex::new(entries) })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Enters the store's critical section.
    pub async fn lock(&self) -> HandledGuard<'_> {
        HandledGuard { path: &self.path, entries: self.entries.lock().await }
    }

    /// Returns whether `id` has been handled.
    pub async fn contains(&self, id: &ArtifactId) -> bool { self.lock().await.contains(id) }

    /// Marks `id` as handled and persists the set.
    ///
    /// Returns `false` if it was already present.
    ///
    /// # Errors
    ///
    /// Returns an error if the new set could not be persisted; the in-memory
    /// set is left unchanged in that case.
    pub async fn mark(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        self.lock().await.insert(id.clone()).await
    }

    /// Number of handled artifacts.
    pub async fn len(&self) -> usize { self.entries.lock().await.len() }

    /// Returns `true` if nothing has been handled yet.
    pub async fn is_empty(&self) -> bool { self.entries.lock().await.is_empty() }

    /// Snapshot of all handled identifiers, oldest first.
    pub async fn snapshot(&self) -> Vec<ArtifactId> {
        self.entries.lock().await.iter().cloned().collect()
    }
}

/// Exclusive access to the handled set.
pub struct HandledGuard<'a> {
    path: &'a Path,
    entries: MutexGuard<'a, BTreeSet<ArtifactId>>,
}

impl HandledGuard<'_> {
    /// Returns whether `id` has been handled.
    #[must_use]
    pub fn contains(&self, id: &ArtifactId) -> bool { self.entries.contains(id) }

    /// The greatest handled identifier.
    #[must_use]
    pub fn newest(&self) -> Option<&ArtifactId> { self.entries.last() }

    /// Inserts `id` and persists the set before returning.
    ///
    /// Returns `false` without touching the disk if `id` was already present.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting failed; `id` is not kept in memory then.
    pub async fn insert(&mut self, id: ArtifactId) -> Result<bool, StoreError> {
        if self.entries.contains(&id) {
            return Ok(false);
        }

        self.entries.insert(id.clone());
        let names: Vec<String> = self.entries.iter().map(|id| id.as_str().to_string()).collect();
        let path = self.path.to_path_buf();

        let result = tokio::task::spawn_blocking(move || write_handled_set(&path, &names))
            .await
            .map_err(|err| StoreError::Task(err.to_string()))
            .and_then(|inner| inner);

        if let Err(err) = result {
            self.entries.remove(&id);
            return Err(err);
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ArtifactId { ArtifactId::parse(name).unwrap() }

    #[tokio::test]
    async fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = HandledStore::open(dir.path().join("handled.json")).unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn mark_persists_in_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handled.json");
        let store = HandledStore::open(&path).unwrap();

        assert!(store.mark(&id("wallpaper-2024-06-15T14-30-00")).await.unwrap());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["handledWallpapers"][0], "wallpaper-2024-06-15T14-30-00");
    }

    #[tokio::test]
    async fn mark_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handled.json");
        let store = HandledStore::open(&path).unwrap();
        let x = id("wallpaper-2024-06-15T14-30-00");

        assert!(store.mark(&x).await.unwrap());
        assert!(!store.mark(&x).await.unwrap());
        assert_eq!(store.len().await, 1);
        assert_eq!(load_handled_set(&path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reopening_sees_previous_marks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("handled.json");

        {
            let store = HandledStore::open(&path).unwrap();
            store.mark(&id("wallpaper-2024-06-15T15-00-00")).await.unwrap();
            store.mark(&id("wallpaper-2024-06-15T14-30-00")).await.unwrap();
        }

        let store = HandledStore::open(&path).unwrap();
        assert!(store.contains(&id("wallpaper-2024-06-15T14-30-00")).await);
        assert_eq!(
            store.snapshot().await,
            vec![id("wallpaper-2024-06-15T14-30-00"), id("wallpaper-2024-06-15T15-00-00")]
        );
    }

    #[test]
    fn strict_load_rejects_wrong_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handled.json");

        for body in ["not json", "[]", r#"{"handled": []}"#, r#"{"handledWallpapers": [1]}"#] {
            std::fs::write(&path, body).unwrap();
            assert!(
                matches!(load_handled_set(&path), Err(StoreError::Corrupt { .. })),
                "{body} should be rejected"
            );
        }
    }

    #[test]
    fn strict_load_skips_invalid_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handled.json");
        std::fs::write(
            &path,
            r#"{"handledWallpapers": ["wallpaper-2024-06-15T14-30-00", "holiday.png"]}"#,
        )
        .unwrap();

        let set = load_handled_set(&path).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn corrupt_file_is_quarantined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handled.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let store = HandledStore::open(&path).unwrap();
        assert!(store.is_empty().await);
        assert!(!path.exists());

        let quarantined: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("handled.json.corrupt-"))
            .collect();
        assert_eq!(quarantined.len(), 1);
        assert_eq!(std::fs::read_to_string(quarantined[0].path()).unwrap(), "{ truncated");
    }

    #[tokio::test]
    async fn failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let state_dir = dir.path().join("state");
        std::fs::create_dir(&state_dir).unwrap();
        let store = HandledStore::open(state_dir.join("handled.json")).unwrap();

        // Replace the state directory with a regular file so nothing can be written.
        std::fs::remove_dir(&state_dir).unwrap();
        std::fs::write(&state_dir, b"").unwrap();

        let x = id("wallpaper-2024-06-15T14-30-00");
        assert!(matches!(store.mark(&x).await, Err(StoreError::Write { .. })));
        assert!(!store.contains(&x).await);
    }

    #[tokio::test]
    async fn guard_makes_check_and_insert_one_step() {
        let dir = tempfile::tempdir().unwrap();
        let store = HandledStore::open(dir.path().join("handled.json")).unwrap();
        let x = id("wallpaper-2024-06-15T14-30-00");

        let mut guard = store.lock().await;
        assert!(!guard.contains(&x));
        assert!(guard.insert(x.clone()).await.unwrap());
        assert!(guard.contains(&x));
        drop(guard);

        assert!(store.contains(&x).await);
    }

    #[tokio::test]
    async fn guard_reports_newest_handled() {
        let dir = tempfile::tempdir().unwrap();
        let store = HandledStore::open(dir.path().join("handled.json")).unwrap();
        assert!(store.lock().await.newest().is_none());

        store.mark(&id("wallpaper-2024-06-15T15-00-00")).await.unwrap();
        store.mark(&id("wallpaper-2024-06-15T14-30-00")).await.unwrap();

        let guard = store.lock().await;
        assert_eq!(guard.newest(), Some(&id("wallpaper-2024-06-15T15-00-00")));
    }
}

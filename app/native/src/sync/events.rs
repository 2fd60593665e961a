//! Typed change notifications for the two watch targets.
//!
//! `notify` delivers raw events on its own thread through a callback. This
//! module bridges them into a tokio channel and classifies each path into a
//! [`ChangeEvent`] for either the local background file or the shared folder.
//!
//! The local file is watched through its parent directory. Many tools replace
//! a file by writing a temporary file and renaming it over the original, which
//! a watch on the file itself would lose after the first replace.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Which watch target a notification belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// The local background file.
    Local,
    /// The shared folder.
    Remote,
}

impl std::fmt::Display for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// One classified filesystem notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// The target the change belongs to.
    pub source: ChangeSource,
    /// The path reported by the notification backend.
    pub path: PathBuf,
}

/// The directories and file name the stream cares about.
#[derive(Debug, Clone)]
pub struct WatchTargets {
    local_dir: PathBuf,
    local_name: OsString,
    shared_folder: PathBuf,
}

impl WatchTargets {
    /// Builds the targets for `local_file` and `shared_folder`.
    ///
    /// Existing directories are canonicalized so they compare equal to the
    /// paths reported by backends that resolve symlinks (`FSEvents` does).
    #[must_use]
    pub fn new(local_file: &Path, shared_folder: &Path) -> Self {
        let local_dir = local_file.parent().unwrap_or_else(|| Path::new("."));
        Self {
            local_dir: canonical_or_given(local_dir),
            local_name: local_file.file_name().map(OsString::from).unwrap_or_default(),
            shared_folder: canonical_or_given(shared_folder),
        }
    }

    /// Directory watched for the local background file.
    #[must_use]
    pub fn local_dir(&self) -> &Path { &self.local_dir }

    /// The shared folder.
    #[must_use]
    pub fn shared_folder(&self) -> &Path { &self.shared_folder }

    /// Maps a reported path to its watch target, if it has one.
    #[must_use]
    pub fn classify_path(&self, path: &Path) -> Option<ChangeSource> {
        let parent = path.parent()?;

        if parent == self.local_dir && path.file_name() == Some(self.local_name.as_os_str()) {
            return Some(ChangeSource::Local);
        }

        if parent == self.shared_folder || path == self.shared_folder {
            return Some(ChangeSource::Remote);
        }

        None
    }

    /// Classifies a raw `notify` event.
    ///
    /// Access events are ignored. Creates, modifies and removes all count as
    /// "possible change": a delete followed by a recreate must look the same
    /// as an in-place write once debounced.
    #[must_use]
    pub fn classify(&self, event: &notify::Event) -> Vec<ChangeEvent> {
        if matches!(event.kind, EventKind::Access(_)) {
            return Vec::new();
        }

        let mut changes: Vec<ChangeEvent> = Vec::new();
        for path in &event.paths {
            let Some(source) = self.classify_path(path) else {
                continue;
            };
            if changes.iter().any(|c| c.source == source) {
                continue;
            }
            changes.push(ChangeEvent { source, path: path.clone() });
        }

        changes
    }
}

fn canonical_or_given(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Stream of classified change notifications.
///
/// The stream is lazy and never restarts: once dropped, the underlying OS
/// watches are released. It ends only if the backend shuts down.
pub struct ChangeStream {
    receiver: mpsc::UnboundedReceiver<ChangeEvent>,
    /// Keeps the OS watches alive for as long as the stream exists.
    _watcher: RecommendedWatcher,
}

impl ChangeStream {
    /// Starts watching the local file's directory and the shared folder.
    ///
    /// Both directories must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be created or a directory cannot
    /// be watched.
    pub fn watch(targets: WatchTargets) -> notify::Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let classifier = targets.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            match res {
                Ok(event) => {
                    for change in classifier.classify(&event) {
                        // Receiver gone means we are shutting down.
                        let _ = sender.send(change);
                    }
                }
                Err(err) => tracing::warn!(error = %err, "filesystem watch error"),
            }
        })?;

        watcher.watch(&targets.local_dir, RecursiveMode::NonRecursive)?;
        if targets.shared_folder != targets.local_dir {
            watcher.watch(&targets.shared_folder, RecursiveMode::NonRecursive)?;
        }

        tracing::debug!(
            local_dir = %targets.local_dir.display(),
            shared_folder = %targets.shared_folder.display(),
            "watching for changes"
        );

        Ok(Self { receiver, _watcher: watcher })
    }

    /// Waits for the next change.
    ///
    /// Returns `None` once the backend has stopped.
    pub async fn next(&mut self) -> Option<ChangeEvent> { self.receiver.recv().await }
}

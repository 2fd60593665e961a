//! End-to-end tests for the wallpaper reconciler.
//!
//! Each test builds one or more "machines" that share a single folder in a
//! temporary directory. Every machine has its own background file, its own
//! handled set and a recording setter instead of a real desktop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use wallsync_lib::config::{ApplyConfig, SyncSettings};
use wallsync_lib::sync::{
    ApplyError, ArtifactId, HandledStore, LocalWatcher, PublishOutcome, ReconcileOutcome,
    RetryPolicy, SyncError, SyncService, WallpaperSetter, load_handled_set,
};

// ============================================================================
// Helpers
// ============================================================================

/// Records applied paths; clones share the same log.
#[derive(Clone, Default)]
struct Recorder {
    applied: Arc<Mutex<Vec<PathBuf>>>,
}

impl Recorder {
    fn applied_names(&self) -> Vec<String> {
        self.applied
            .lock()
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }
}

impl WallpaperSetter for Recorder {
    fn apply(&self, path: &Path) -> impl Future<Output = Result<(), ApplyError>> + Send {
        self.applied.lock().push(path.to_path_buf());
        std::future::ready(Ok(()))
    }
}

struct Machine {
    service: SyncService<Recorder>,
    recorder: Recorder,
}

impl Machine {
    fn new(root: &Path, name: &str, shared: &Path) -> Self {
        let recorder = Recorder::default();
        let settings = settings(root, name, shared);
        let service = SyncService::new(settings, recorder.clone()).unwrap();
        Self { service, recorder }
    }

    fn set_background(&self, bytes: &[u8]) {
        std::fs::write(&self.service.settings().local_wallpaper, bytes).unwrap();
    }

    async fn publish(&self) -> ArtifactId {
        match self.service.publish_once().await.unwrap() {
            PublishOutcome::Published(id) => id,
            PublishOutcome::SourceMissing => panic!("background file should exist"),
        }
    }
}

fn settings(root: &Path, name: &str, shared: &Path) -> SyncSettings {
    SyncSettings {
        local_wallpaper: root.join(name).join("background"),
        shared_folder: shared.to_path_buf(),
        state_file: root.join(name).join("state").join("handled.json"),
        debounce: Duration::from_millis(50),
        publish_retry: RetryPolicy::new(2, Duration::from_millis(10)),
        apply: ApplyConfig::default(),
    }
}

fn artifact(shared: &Path, name: &str) {
    std::fs::write(shared.join(name), name.as_bytes()).unwrap();
}

async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("timed out waiting for {what}");
}

// ============================================================================
// Loop prevention
// ============================================================================

#[tokio::test]
async fn locally_published_artifact_is_never_applied_locally() {
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("shared");
    let laptop = Machine::new(dir.path(), "laptop", &shared);

    laptop.set_background(b"mountains");
    let id = laptop.publish().await;

    let outcome = laptop.service.reconcile_once().await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::AlreadyHandled(id));
    assert!(laptop.recorder.applied_names().is_empty());
}

#[tokio::test]
async fn change_propagates_once_and_is_not_echoed_back() {
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("shared");
    let laptop = Machine::new(dir.path(), "laptop", &shared);
    let desktop = Machine::new(dir.path(), "desktop", &shared);

    laptop.set_background(b"mountains");
    let id = laptop.publish().await;

    assert_eq!(desktop.service.reconcile_once().await.unwrap(), ReconcileOutcome::Applied(id.clone()));
    assert_eq!(
        desktop.service.reconcile_once().await.unwrap(),
        ReconcileOutcome::AlreadyHandled(id.clone())
    );
    assert_eq!(desktop.recorder.applied_names(), vec![id.to_string()]);

    // The laptop sees its own artifact and leaves it alone.
    laptop.service.reconcile_once().await.unwrap();
    assert!(laptop.recorder.applied_names().is_empty());
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn newest_artifact_wins() {
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("shared");
    let desktop = Machine::new(dir.path(), "desktop", &shared);

    artifact(&shared, "wallpaper-2024-06-15T14-30-00");
    artifact(&shared, "wallpaper-2024-06-15T15-00-00");

    desktop.service.reconcile_once().await.unwrap();
    assert_eq!(desktop.recorder.applied_names(), vec!["wallpaper-2024-06-15T15-00-00"]);
}

#[tokio::test]
async fn consecutive_passes_apply_once_and_record_once() {
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("shared");
    let desktop = Machine::new(dir.path(), "desktop", &shared);
    artifact(&shared, "wallpaper-2024-06-15T15-00-00");

    desktop.service.reconcile_once().await.unwrap();
    desktop.service.reconcile_once().await.unwrap();

    assert_eq!(desktop.recorder.applied_names().len(), 1);
    let handled = load_handled_set(&desktop.service.settings().state_file).unwrap();
    assert_eq!(handled.len(), 1);
}

#[tokio::test]
async fn startup_catches_up_with_only_the_newest() {
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("shared");
    std::fs::create_dir_all(&shared).unwrap();
    artifact(&shared, "wallpaper-2024-06-15T13-00-00");
    artifact(&shared, "wallpaper-2024-06-15T14-00-00");
    artifact(&shared, "wallpaper-2024-06-15T15-00-00");

    let desktop = Machine::new(dir.path(), "desktop", &shared);
    desktop.service.run(std::future::ready(())).await.unwrap();

    assert_eq!(desktop.recorder.applied_names(), vec!["wallpaper-2024-06-15T15-00-00"]);
}

// ============================================================================
// Ordering
// ============================================================================

fn fixed_clock() -> chrono::NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(14, 30, 0).unwrap()
}

#[tokio::test]
async fn failed_publish_stays_marked_and_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("shared");
    let source = dir.path().join("background");
    let state = dir.path().join("handled.json");
    std::fs::write(&source, b"mountains").unwrap();

    let store = Arc::new(HandledStore::open(&state).unwrap());
    let watcher = LocalWatcher::new(&source, &shared, Arc::clone(&store), RetryPolicy::once())
        .with_clock(fixed_clock);

    // The shared folder does not exist yet, so every copy attempt fails.
    let Err(SyncError::Publish { id: failed, .. }) = watcher.run_cycle().await else {
        panic!("publishing into a missing folder should fail");
    };
    assert!(load_handled_set(&state).unwrap().contains(&failed));

    std::fs::create_dir_all(&shared).unwrap();
    let Ok(PublishOutcome::Published(next)) = watcher.run_cycle().await else {
        panic!("publishing should succeed once the folder exists");
    };

    assert_ne!(next, failed);
    assert!(!shared.join(failed.as_str()).exists());
    assert!(shared.join(next.as_str()).exists());
}

// ============================================================================
// Daemon
// ============================================================================

#[tokio::test]
async fn daemon_publishes_local_changes_and_applies_foreign_ones() {
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("shared");
    let recorder = Recorder::default();
    let settings = settings(dir.path(), "laptop", &shared);
    let background = settings.local_wallpaper.clone();

    let service = SyncService::new(settings, recorder.clone()).unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let daemon = tokio::spawn(service.run(async {
        let _ = stopped.await;
    }));

    // Give the watcher a moment to arm.
    tokio::time::sleep(Duration::from_millis(300)).await;

    std::fs::write(&background, b"mountains").unwrap();
    wait_for("the local change to be published", || {
        std::fs::read_dir(&shared)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .any(|e| ArtifactId::parse(&e.file_name().to_string_lossy()).is_some())
            })
            .unwrap_or(false)
    })
    .await;

    artifact(&shared, "wallpaper-2099-01-01T00-00-00");
    wait_for("the foreign artifact to be applied", || !recorder.applied_names().is_empty()).await;

    let _ = stop.send(());
    daemon.await.unwrap().unwrap();

    assert_eq!(recorder.applied_names(), vec!["wallpaper-2099-01-01T00-00-00"]);
}

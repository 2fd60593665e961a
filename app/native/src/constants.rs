//! Application-wide constants.

/// Name used for the config and state directories.
pub const APP_NAME: &str = "wallsync";

/// Prefix of every artifact in the shared folder.
pub const ARTIFACT_PREFIX: &str = "wallpaper-";

/// File name of the handled set inside the state directory.
pub const HANDLED_FILE_NAME: &str = "handled.json";

/// Default local background file.
pub const DEFAULT_LOCAL_WALLPAPER: &str = "~/.config/background";

/// Default shared folder.
pub const DEFAULT_SHARED_FOLDER: &str = "~/Sync/wallsync";

/// Default quiet period before a burst of events is acted upon (ms).
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Bounded retry defaults for publishing and for launching apply commands.
pub mod retry {
    /// Total attempts, including the first.
    pub const ATTEMPTS: u32 = 3;

    /// Base backoff, multiplied by the number of failed attempts (ms).
    pub const BACKOFF_MS: u64 = 250;
}

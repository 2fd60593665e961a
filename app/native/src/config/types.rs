//! Configuration types for wallsync.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::{
    APP_NAME, DEFAULT_DEBOUNCE_MS, DEFAULT_LOCAL_WALLPAPER, DEFAULT_SHARED_FOLDER, retry,
};
use crate::platform::path::expand_and_resolve;
use crate::state::default_state_file;
use crate::sync::RetryPolicy;

/// How the wallpaper is applied on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApplyBackend {
    /// Run the configured `commands`.
    Command,
    /// Use the platform wallpaper API.
    Native,
}

impl Default for ApplyBackend {
    fn default() -> Self {
        if cfg!(target_os = "linux") { Self::Command } else { Self::Native }
    }
}

/// Retry settings for copying an artifact into the shared folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PublishConfig {
    /// Total copy attempts, including the first.
    /// Default: 3
    pub retries: u32,

    /// Base backoff in milliseconds, multiplied by the number of failed attempts.
    /// Default: 250
    pub backoff_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self { Self { retries: retry::ATTEMPTS, backoff_ms: retry::BACKOFF_MS } }
}

impl PublishConfig {
    /// The retry policy described by this section.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.backoff_ms))
    }
}

/// How an artifact from another machine is applied as the wallpaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplyConfig {
    /// `command` or `native`.
    /// Default: `command` on Linux, `native` elsewhere.
    pub backend: ApplyBackend,

    /// Commands run in order by the `command` backend. Each command is a
    /// program followed by its arguments. `{path}` is replaced by the absolute
    /// artifact path and `{uri}` by its `file://` URI.
    /// Default on Linux: set GNOME's `picture-uri` and `picture-uri-dark`.
    pub commands: Vec<Vec<String>>,

    /// Total launch attempts per command, including the first.
    /// Default: 3
    pub retries: u32,

    /// Base backoff in milliseconds between launch attempts.
    /// Default: 250
    pub backoff_ms: u64,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            backend: ApplyBackend::default(),
            commands: default_apply_commands(),
            retries: retry::ATTEMPTS,
            backoff_ms: retry::BACKOFF_MS,
        }
    }
}

impl ApplyConfig {
    /// The retry policy for launching commands.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.backoff_ms))
    }
}

/// GNOME's light and dark background keys.
fn default_apply_commands() -> Vec<Vec<String>> {
    if !cfg!(target_os = "linux") {
        return Vec::new();
    }

    ["picture-uri", "picture-uri-dark"]
        .into_iter()
        .map(|key| {
            ["gsettings", "set", "org.gnome.desktop.background", key, "{uri}"]
                .into_iter()
                .map(str::to_string)
                .collect()
        })
        .collect()
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// The local background file to publish.
    /// Default: `~/.config/background`
    pub local_wallpaper: String,

    /// The directory synchronized across machines.
    /// Default: `~/Sync/wallsync`
    pub shared_folder: String,

    /// Where this machine records the artifacts it has handled.
    /// Default: `<local data dir>/wallsync/handled.json`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,

    /// Quiet period in milliseconds before a burst of changes is acted upon.
    /// Default: 500
    pub debounce_ms: u64,

    /// Publishing retries.
    pub publish: PublishConfig,

    /// Applying wallpapers from other machines.
    pub apply: ApplyConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            local_wallpaper: DEFAULT_LOCAL_WALLPAPER.to_string(),
            shared_folder: DEFAULT_SHARED_FOLDER.to_string(),
            state_file: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            publish: PublishConfig::default(),
            apply: ApplyConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Resolves the configuration into absolute settings.
    ///
    /// Relative paths are resolved against `base_dir`, normally the directory
    /// of the configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a path is empty or the `command`
    /// backend has no commands.
    pub fn resolve(&self, base_dir: &Path) -> Result<SyncSettings, ConfigError> {
        let local_wallpaper = resolve_path("localWallpaper", &self.local_wallpaper, base_dir)?;
        let shared_folder = resolve_path("sharedFolder", &self.shared_folder, base_dir)?;
        let state_file = match &self.state_file {
            Some(path) => resolve_path("stateFile", path, base_dir)?,
            None => default_state_file(),
        };

        if self.apply.backend == ApplyBackend::Command
            && self.apply.commands.iter().all(Vec::is_empty)
        {
            return Err(ConfigError::Invalid(
                "apply.commands must contain at least one command for the command backend"
                    .to_string(),
            ));
        }

        if local_wallpaper.parent() == Some(shared_folder.as_path()) {
            return Err(ConfigError::Invalid(
                "localWallpaper must not live inside sharedFolder".to_string(),
            ));
        }

        Ok(SyncSettings {
            local_wallpaper,
            shared_folder,
            state_file,
            debounce: Duration::from_millis(self.debounce_ms),
            publish_retry: self.publish.retry_policy(),
            apply: self.apply.clone(),
        })
    }
}

fn resolve_path(field: &str, raw: &str, base_dir: &Path) -> Result<PathBuf, ConfigError> {
    let path = expand_and_resolve(raw, base_dir);
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }
    Ok(path)
}

/// Configuration with every path expanded and made absolute.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub local_wallpaper: PathBuf,
    pub shared_folder: PathBuf,
    pub state_file: PathBuf,
    pub debounce: Duration,
    pub publish_retry: RetryPolicy,
    pub apply: ApplyConfig,
}

/// Errors that can occur while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No configuration file was found in any of the expected locations.
    #[error(
        "no configuration file found, expected ~/.config/wallsync/config.jsonc or config.json"
    )]
    NotFound,

    /// An explicitly requested configuration file does not exist.
    #[error("configuration file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// The configuration file exists but could not be read.
    #[error("failed to read configuration file {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    /// The configuration file contains invalid JSON.
    #[error("failed to parse configuration file {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },

    /// The configuration parsed but describes an unusable setup.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration file names to search for (in priority order).
const CONFIG_FILE_NAMES: &[&str] = &["config.jsonc", "config.json"];

/// Returns the possible configuration file paths in priority order.
///
/// The function checks the following locations (both `.jsonc` and `.json` variants):
/// 1. `$XDG_CONFIG_HOME/wallsync/`, if set
/// 2. `~/.config/wallsync/`
/// 3. the platform config directory (`~/Library/Application Support/wallsync/` on macOS)
#[must_use]
pub fn config_paths() -> Vec<PathBuf> {
    let mut dirs_to_search = Vec::new();

    if let Some(xdg_config) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        dirs_to_search.push(PathBuf::from(xdg_config).join(APP_NAME));
    }
    if let Some(home) = dirs::home_dir() {
        dirs_to_search.push(home.join(".config").join(APP_NAME));
    }
    if let Some(config_dir) = dirs::config_dir() {
        dirs_to_search.push(config_dir.join(APP_NAME));
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for dir in dirs_to_search {
        for filename in CONFIG_FILE_NAMES {
            let path = dir.join(filename);
            // XDG_CONFIG_HOME is usually ~/.config itself
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }

    paths
}

/// Loads the configuration from the first available config file.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] if no configuration file exists, and the
/// errors of [`load_config_from_path`] for the first file that does.
pub fn load_config() -> Result<(SyncConfig, PathBuf), ConfigError> {
    for path in config_paths() {
        if path.exists() {
            return load_config_from_path(&path);
        }
    }

    Err(ConfigError::NotFound)
}

/// Loads the configuration from `path`.
///
/// Comments are stripped before parsing.
///
/// # Errors
///
/// Returns [`ConfigError::MissingFile`] if the file does not exist,
/// [`ConfigError::Io`] if it cannot be read and [`ConfigError::Parse`] if it
/// is not valid configuration JSON.
pub fn load_config_from_path(path: &Path) -> Result<(SyncConfig, PathBuf), ConfigError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::MissingFile(path.to_path_buf()));
        }
        Err(source) => return Err(ConfigError::Io { path: path.to_path_buf(), source }),
    };

    let reader = json_comments::StripComments::new(file);
    let config: SyncConfig = serde_json::from_reader(reader)
        .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

    Ok((config, path.to_path_buf()))
}

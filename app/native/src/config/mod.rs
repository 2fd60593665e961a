//! Configuration module for wallsync.
//!
//! The configuration file supports JSONC format (JSON with comments).
//! Both single-line (`//`) and multi-line (`/* */`) comments are allowed.

pub mod template;
pub mod types;

use std::path::{Path, PathBuf};

pub use types::{
    ApplyBackend, ApplyConfig, ConfigError, PublishConfig, SyncConfig, SyncSettings, config_paths,
    load_config, load_config_from_path,
};

/// A loaded configuration and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: SyncConfig,
    /// The file the configuration was read from, `None` when defaults are used.
    pub path: Option<PathBuf>,
}

impl LoadedConfig {
    /// Resolves the configuration against the directory of its file, or the
    /// current directory when running on defaults.
    ///
    /// # Errors
    ///
    /// See [`SyncConfig::resolve`].
    pub fn resolve(&self) -> Result<SyncSettings, ConfigError> {
        let base_dir = self
            .path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        self.config.resolve(&base_dir)
    }
}

/// Loads the configuration.
///
/// With `custom_path` set, that file must exist. Otherwise the search paths
/// are tried in order; when none exists a commented template is written at
/// the preferred location and the defaults are used.
///
/// # Errors
///
/// Returns an error if a configuration file exists but cannot be read or
/// parsed, or if `custom_path` does not exist.
pub fn load(custom_path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let result = custom_path.map_or_else(load_config, load_config_from_path);

    match result {
        Ok((config, path)) => {
            tracing::debug!(path = %path.display(), "loaded configuration");
            Ok(LoadedConfig { config, path: Some(path) })
        }
        Err(ConfigError::NotFound) => {
            create_default_config_file();
            Ok(LoadedConfig { config: SyncConfig::default(), path: None })
        }
        Err(err) => Err(err),
    }
}

/// Creates a template configuration file at the default location.
///
/// Failures are logged; the defaults are used either way.
fn create_default_config_file() {
    let Some(config_path) = config_paths().into_iter().next() else {
        tracing::debug!("no config path available for creating template");
        return;
    };

    if config_path.exists() {
        return;
    }

    match template::create_config_file(&config_path) {
        Ok(()) => {
            tracing::info!(path = %config_path.display(), "created default configuration file");
        }
        Err(err) => {
            tracing::debug!(
                error = %err,
                path = %config_path.display(),
                "failed to create default configuration file"
            );
        }
    }
}

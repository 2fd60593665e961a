//! Configuration template generation.
//!
//! Generates a commented configuration template with all available options.

use std::fs;
use std::path::Path;

/// Generates a configuration template with all options commented out.
#[must_use]
pub fn generate_config_template() -> String {
    r#"// wallsync Configuration File
// ===========================
// This file uses JSONC format (JSON with comments).
// All options below are commented out and show their default values.
// Uncomment and modify the options you want to configure.
//
// Run `wallsync schema` to get a JSON Schema for editor validation.

{
  // ============================================================================
  // Paths
  // ============================================================================
  // The local background file. Every change to it is published.
  // "localWallpaper": "~/.config/background",
  //
  // The directory your sync tool keeps identical on every machine.
  // "sharedFolder": "~/Sync/wallsync",
  //
  // Where this machine records the wallpapers it has already handled.
  // Defaults to the platform data directory (~/.local/share/wallsync on Linux).
  // "stateFile": "~/.local/share/wallsync/handled.json",

  // ============================================================================
  // Timing
  // ============================================================================
  // Quiet period in milliseconds before a burst of file events is acted upon.
  // "debounceMs": 500,

  // ============================================================================
  // Publishing
  // ============================================================================
  // "publish": {
  //   // Total attempts to copy a wallpaper into the shared folder
  //   "retries": 3,
  //
  //   // Base delay between attempts, multiplied by the attempt number
  //   "backoffMs": 250
  // },

  // ============================================================================
  // Applying
  // ============================================================================
  // "apply": {
  //   // "command" runs the commands below, "native" uses the platform API.
  //   // Defaults to "command" on Linux and "native" elsewhere.
  //   "backend": "command",
  //
  //   // Commands run in order; every one must succeed.
  //   // {path} is the absolute wallpaper path, {uri} its file:// URI.
  //   "commands": [
  //     ["gsettings", "set", "org.gnome.desktop.background", "picture-uri", "{uri}"],
  //     ["gsettings", "set", "org.gnome.desktop.background", "picture-uri-dark", "{uri}"]
  //   ],
  //
  //   // Total attempts to launch each command
  //   "retries": 3,
  //   "backoffMs": 250
  // }
}
"#
    .to_string()
}

/// Creates a configuration file with the template at the specified path.
///
/// Creates parent directories if they don't exist.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn create_config_file(path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, generate_config_template())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SyncConfig, load_config_from_path};

    #[test]
    fn test_template_mentions_every_option() {
        let template = generate_config_template();
        for key in [
            "localWallpaper",
            "sharedFolder",
            "stateFile",
            "debounceMs",
            "publish",
            "apply",
            "backend",
            "commands",
            "backoffMs",
        ] {
            assert!(template.contains(key), "template is missing {key}");
        }
    }

    #[test]
    fn test_template_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.jsonc");

        create_config_file(&path).unwrap();
        let (config, _) = load_config_from_path(&path).unwrap();

        assert_eq!(config, SyncConfig::default());
    }
}

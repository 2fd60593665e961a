//! State directory utilities.
//!
//! The handled set lives in `{data_local_dir}/wallsync/` (for example
//! `~/.local/share/wallsync/` on Linux), falling back to `/tmp/wallsync/` when
//! the platform has no data directory.

use std::path::PathBuf;

use crate::constants::{APP_NAME, HANDLED_FILE_NAME};

/// Returns the root state directory for the application.
#[must_use]
pub fn get_state_dir() -> PathBuf {
    dirs::data_local_dir()
        .map_or_else(|| std::env::temp_dir().join(APP_NAME), |data| data.join(APP_NAME))
}

/// Returns the default location of the handled set.
#[must_use]
pub fn default_state_file() -> PathBuf { get_state_dir().join(HANDLED_FILE_NAME) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dir_ends_with_app_name() {
        assert!(get_state_dir().ends_with(APP_NAME));
    }

    #[test]
    fn test_default_state_file_is_inside_state_dir() {
        let file = default_state_file();
        assert_eq!(file.parent(), Some(get_state_dir().as_path()));
        assert!(file.ends_with(HANDLED_FILE_NAME));
    }
}

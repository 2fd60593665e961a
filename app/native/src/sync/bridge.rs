//! Applying an artifact as the desktop background.
//!
//! The reconciler only needs one thing from the desktop: "set this file as the
//! wallpaper, and tell me whether it worked". [`WallpaperSetter`] is that seam.
//! Two implementations ship:
//!
//! - [`CommandSetter`] runs a list of external commands in order. On GNOME the
//!   default sets both the light and the dark variant, and the wallpaper only
//!   counts as applied when every command succeeded.
//! - [`NativeSetter`] goes through the `wallpaper` crate.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use super::retry::RetryPolicy;
use crate::config::{ApplyBackend, ApplyConfig};

/// Errors that can occur while applying a wallpaper.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// The artifact to apply does not exist.
    #[error("wallpaper file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// No command is configured for the command backend.
    #[error("no apply command configured")]
    NotConfigured,

    /// The program could not be started.
    #[error("failed to launch `{program}`: {source}")]
    Launch { program: String, source: io::Error },

    /// The program ran and reported failure.
    #[error("`{program}` exited with {status}: {stderr}")]
    Failed { program: String, status: std::process::ExitStatus, stderr: String },

    /// The platform wallpaper API failed.
    #[error("failed to set wallpaper: {0}")]
    Native(String),
}

/// Applies a file as the desktop background.
///
/// Implementations must only report success once the wallpaper is fully
/// applied; anything partial is a failure.
pub trait WallpaperSetter: Send + Sync {
    /// Applies the file at `path`, which is absolute.
    fn apply(&self, path: &Path) -> impl Future<Output = Result<(), ApplyError>> + Send;
}

/// Sets the wallpaper by running external commands.
///
/// Each command is a program followed by its arguments. In every argument,
/// `{path}` is replaced by the absolute artifact path and `{uri}` by its
/// `file://` URI.
#[derive(Debug, Clone)]
pub struct CommandSetter {
    commands: Vec<Vec<String>>,
    retry: RetryPolicy,
}

impl CommandSetter {
    /// Creates a setter running `commands` in order.
    ///
    /// Launch failures are retried according to `retry`; a command that runs
    /// and exits non-zero is not.
    #[must_use]
    pub fn new(commands: Vec<Vec<String>>, retry: RetryPolicy) -> Self {
        Self { commands: commands.into_iter().filter(|c| !c.is_empty()).collect(), retry }
    }

    /// The configured command templates.
    #[must_use]
    pub fn commands(&self) -> &[Vec<String>] { &self.commands }

    async fn run_one(&self, template: &[String], path: &Path) -> Result<(), ApplyError> {
        let argv = expand_template(template, path);
        let Some((program, args)) = argv.split_first() else {
            return Err(ApplyError::NotConfigured);
        };

        let output = self
            .retry
            .run(&format!("launching `{program}`"), || {
                let mut command = tokio::process::Command::new(program);
                command.args(args).stdin(Stdio::null());
                async move {
                    command
                        .output()
                        .await
                        .map_err(|source| ApplyError::Launch { program: program.clone(), source })
                }
            })
            .await?;

        if !output.status.success() {
            return Err(ApplyError::Failed {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::debug!(program = %program, "apply command succeeded");
        Ok(())
    }
}

impl WallpaperSetter for CommandSetter {
    fn apply(&self, path: &Path) -> impl Future<Output = Result<(), ApplyError>> + Send {
        async move {
            if self.commands.is_empty() {
                return Err(ApplyError::NotConfigured);
            }
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(ApplyError::FileNotFound(path.to_path_buf()));
            }

            for command in &self.commands {
                self.run_one(command, path).await?;
            }

            Ok(())
        }
    }
}

/// Substitutes `{path}` and `{uri}` in every argument.
fn expand_template(template: &[String], path: &Path) -> Vec<String> {
    let path_str = path.display().to_string();
    let uri = file_uri(path);
    template.iter().map(|arg| arg.replace("{path}", &path_str).replace("{uri}", &uri)).collect()
}

/// Builds a `file://` URI for an absolute path, percent-encoding what needs it.
fn file_uri(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut uri = String::with_capacity(raw.len() + 7);
    uri.push_str("file://");
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'/' | b'-' | b'_' | b'.' | b'~' => {
                uri.push(char::from(byte));
            }
            _ => uri.push_str(&format!("%{byte:02X}")),
        }
    }
    uri
}

/// Sets the wallpaper through the platform API of the `wallpaper` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSetter;

impl WallpaperSetter for NativeSetter {
    fn apply(&self, path: &Path) -> impl Future<Output = Result<(), ApplyError>> + Send {
        let path = path.to_path_buf();
        async move {
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Err(ApplyError::FileNotFound(path));
            }

            let path_str = path.display().to_string();
            tokio::task::spawn_blocking(move || {
                wallpaper::set_from_path(&path_str).map_err(|err| ApplyError::Native(err.to_string()))
            })
            .await
            .map_err(|err| ApplyError::Native(err.to_string()))?
        }
    }
}

/// The setter selected by configuration.
#[derive(Debug, Clone)]
pub enum Setter {
    /// External commands.
    Command(CommandSetter),
    /// Platform API.
    Native(NativeSetter),
}

impl Setter {
    /// Builds the setter described by `config`.
    #[must_use]
    pub fn from_config(config: &ApplyConfig) -> Self {
        match config.backend {
            ApplyBackend::Command => {
                Self::Command(CommandSetter::new(config.commands.clone(), config.retry_policy()))
            }
            ApplyBackend::Native => Self::Native(NativeSetter),
        }
    }
}

impl WallpaperSetter for Setter {
    fn apply(&self, path: &Path) -> impl Future<Output = Result<(), ApplyError>> + Send {
        async move {
            match self {
                Self::Command(setter) => setter.apply(path).await,
                Self::Native(setter) => setter.apply(path).await,
            }
        }
    }
}

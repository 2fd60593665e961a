//! Config CLI commands.
//!
//! Commands for managing the wallsync configuration file.

use std::path::{Path, PathBuf};

use clap::Subcommand;

use crate::config::config_paths;
use crate::config::template::{create_config_file, generate_config_template};
use crate::error::WallsyncError;

/// Config management commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum ConfigCommands {
    /// Initialize a new configuration file with all options documented.
    ///
    /// Creates a new configuration file at the default location with all
    /// available options commented out.
    #[command(
        name = "init",
        after_long_help = r#"Examples:
  wallsync config init              # Create config at default location
  wallsync config init --force      # Overwrite existing config
  wallsync config init --path ~/my-config.jsonc  # Create at custom path
  wallsync config init --stdout     # Print template to stdout"#
    )]
    Init {
        /// Overwrite existing configuration file if it exists.
        #[arg(long, short)]
        force: bool,

        /// Custom path for the configuration file.
        /// If not specified, uses ~/.config/wallsync/config.jsonc
        #[arg(long, short, value_name = "PATH")]
        path: Option<PathBuf>,

        /// Print the configuration template to stdout instead of writing to a file.
        #[arg(long)]
        stdout: bool,
    },

    /// Show the path to the configuration file.
    ///
    /// Displays the paths where wallsync looks for configuration files,
    /// and indicates which one is in use (if any).
    Path,
}

/// Execute config subcommands.
///
/// `custom_config` is the global `--config` flag; when set it is the only
/// path `config path` reports.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cmd: &ConfigCommands, custom_config: Option<&Path>) -> Result<(), WallsyncError> {
    match cmd {
        ConfigCommands::Init { force, path, stdout } => {
            if *stdout {
                println!("{}", generate_config_template());
                Ok(())
            } else {
                init_config(*force, path.as_deref().or(custom_config))
            }
        }
        ConfigCommands::Path => {
            show_config_path(custom_config);
            Ok(())
        }
    }
}

/// Initialize a new configuration file.
fn init_config(force: bool, custom_path: Option<&Path>) -> Result<(), WallsyncError> {
    let config_path = custom_path.map_or_else(
        || config_paths().into_iter().next().unwrap_or_else(|| PathBuf::from("config.jsonc")),
        Path::to_path_buf,
    );

    if config_path.exists() && !force {
        return Err(WallsyncError::InvalidArguments(format!(
            "Configuration file already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        )));
    }

    create_config_file(&config_path)?;

    println!("Configuration file created at: {}", config_path.display());
    println!("\nAll options are commented out by default.");
    println!("Edit the file and uncomment the options you want to configure.");

    Ok(())
}

/// Show the configuration file path.
fn show_config_path(custom_config: Option<&Path>) {
    if let Some(path) = custom_config {
        let marker = if path.exists() { " (active)" } else { " (missing)" };
        println!("{}{marker}", path.display());
        return;
    }

    println!("Configuration file search paths (in priority order):\n");

    let mut found_config = false;
    for (i, path) in config_paths().iter().enumerate() {
        let exists = path.exists();
        let marker = if exists && !found_config {
            found_config = true;
            " (active)"
        } else if exists {
            " (exists)"
        } else {
            ""
        };

        println!("  {}. {}{}", i + 1, path.display(), marker);
    }

    if !found_config {
        println!("\nNo configuration file found.");
        println!("Run 'wallsync config init' to create one.");
    }
}

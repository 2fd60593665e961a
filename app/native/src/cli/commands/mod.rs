//! CLI command definitions using Clap.
//!
//! - `config_cmd` - Configuration file commands
//! - `sync` - The daemon and its one-shot counterparts

use std::io;
use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Generator, Shell, generate};

use crate::error::WallsyncError;
use crate::schema;

pub mod config_cmd;
pub mod sync;

pub use config_cmd::ConfigCommands;

/// Application version from Cargo.toml.
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// wallsync - keeps the desktop wallpaper in sync across machines.
///
/// Watches the local background file and a shared folder. Local changes are
/// published into the folder; the newest wallpaper published by another
/// machine is applied here.
#[derive(Parser, Debug)]
#[command(name = "wallsync")]
#[command(author, version = APP_VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to a custom configuration file.
    ///
    /// Overrides the default configuration file search paths.
    /// Supports JSONC format (JSON with comments).
    #[arg(long, short, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level. `RUST_LOG` takes precedence when set.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
#[command(next_display_order = None)]
pub enum Commands {
    /// Run the sync daemon (the default).
    ///
    /// Applies the newest wallpaper from the shared folder once, then watches
    /// both the local background file and the shared folder until Ctrl-C or
    /// SIGTERM.
    Run,

    /// Apply the newest wallpaper from the shared folder, if not yet handled.
    Reconcile,

    /// Publish the local background file into the shared folder.
    Publish,

    /// Print the sync state as JSON.
    ///
    /// Shows the resolved paths, the newest wallpaper in the shared folder and
    /// whether this machine has handled it.
    Status,

    /// Configuration file management commands.
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Output the configuration JSON Schema.
    ///
    /// Can be redirected to a file for use with editors that support JSON
    /// Schema validation.
    Schema,

    /// Generate shell completions.
    ///
    /// Usage:
    ///   eval "$(wallsync completions --shell zsh)"
    ///   wallsync completions --shell fish > ~/.config/fish/completions/wallsync.fish
    #[command(verbatim_doc_comment)]
    Completions {
        /// The shell to generate completions for.
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Whether debug logging was requested.
    #[must_use]
    pub const fn verbose(&self) -> bool { self.verbose }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command execution fails.
    pub fn execute(&self) -> Result<(), WallsyncError> {
        let config = self.config.as_deref();

        match &self.command {
            None | Some(Commands::Run) => sync::execute_run(config),
            Some(Commands::Reconcile) => sync::execute_reconcile(config),
            Some(Commands::Publish) => sync::execute_publish(config),
            Some(Commands::Status) => sync::execute_status(config),
            Some(Commands::Config(cmd)) => config_cmd::execute(cmd, config),

            Some(Commands::Schema) => {
                println!("{}", schema::generate_schema_json());
                Ok(())
            }

            Some(Commands::Completions { shell }) => {
                Self::print_completions(*shell);
                Ok(())
            }
        }
    }

    /// Print shell completions to stdout.
    fn print_completions<G: Generator>(generator: G) {
        let mut cmd = Self::command();
        generate(generator, &mut cmd, "wallsync", &mut io::stdout());
    }
}

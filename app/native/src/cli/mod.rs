//! CLI module for wallsync.
//!
//! Parses the command line, sets up logging and dispatches to the command.

mod commands;
mod output;

use clap::Parser;
pub use commands::Cli;

use crate::error::WallsyncError;
use crate::logging;

/// Runs the CLI.
///
/// Parses command-line arguments and executes the appropriate command.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn run() -> Result<(), WallsyncError> {
    let cli = Cli::parse();
    logging::init(cli.verbose());
    cli.execute()
}

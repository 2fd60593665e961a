#![allow(clippy::multiple_crate_versions)]

//! wallsync - keeps the desktop wallpaper in sync across machines.
//!
//! Without a subcommand the binary runs the sync daemon; see `wallsync --help`
//! for the one-shot commands.

fn main() {
    if let Err(err) = wallsync_lib::cli::run() {
        eprintln!("wallsync: {err}");
        std::process::exit(1);
    }
}

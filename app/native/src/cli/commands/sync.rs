//! Sync CLI commands.
//!
//! The daemon (`run`) and its one-shot counterparts (`reconcile`, `publish`)
//! build a [`SyncService`] from the configuration. `status` only reads.

use std::io::IsTerminal;
use std::path::Path;

use crate::cli::output::print_highlighted_json;
use crate::config;
use crate::error::WallsyncError;
use crate::sync::{
    PublishOutcome, ReconcileOutcome, Setter, SyncService, read_status, shutdown_signal,
};

/// Builds the current-thread runtime every async command runs on.
fn runtime() -> Result<tokio::runtime::Runtime, WallsyncError> {
    Ok(tokio::runtime::Builder::new_current_thread().enable_all().build()?)
}

/// Loads the configuration and prepares the reconciler.
fn prepare(config_path: Option<&Path>) -> Result<SyncService<Setter>, WallsyncError> {
    let loaded = config::load(config_path)?;
    let settings = loaded.resolve()?;
    let setter = Setter::from_config(&settings.apply);
    Ok(SyncService::new(settings, setter)?)
}

/// Runs the daemon until Ctrl-C or `SIGTERM`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the reconciler cannot
/// start. Failures of individual sync cycles are only logged.
pub fn execute_run(config_path: Option<&Path>) -> Result<(), WallsyncError> {
    let service = prepare(config_path)?;
    runtime()?.block_on(async {
        let shutdown = shutdown_signal()?;
        service.run(shutdown).await?;
        Ok::<(), WallsyncError>(())
    })
}

/// Runs one remote pass and reports what happened.
///
/// # Errors
///
/// Returns an error if the pass failed.
pub fn execute_reconcile(config_path: Option<&Path>) -> Result<(), WallsyncError> {
    let service = prepare(config_path)?;
    let outcome = runtime()?.block_on(service.reconcile_once())?;

    match outcome {
        ReconcileOutcome::NoArtifacts => println!("No wallpapers in the shared folder yet."),
        ReconcileOutcome::AlreadyHandled(id) => println!("Already up to date ({id})."),
        ReconcileOutcome::Superseded(id) => {
            println!("Skipped {id}: a newer wallpaper was already handled.");
        }
        ReconcileOutcome::Vanished(id) => println!("{id} disappeared before it could be applied."),
        ReconcileOutcome::Applied(id) => println!("Applied {id}."),
    }

    Ok(())
}

/// Runs one local pass and reports what happened.
///
/// # Errors
///
/// Returns an error if the pass failed.
pub fn execute_publish(config_path: Option<&Path>) -> Result<(), WallsyncError> {
    let service = prepare(config_path)?;
    let outcome = runtime()?.block_on(service.publish_once())?;

    match outcome {
        PublishOutcome::SourceMissing => println!(
            "Nothing to publish: {} does not exist.",
            service.settings().local_wallpaper.display()
        ),
        PublishOutcome::Published(id) => println!("Published {id}."),
    }

    Ok(())
}

/// Prints the reconciler state as JSON.
///
/// # Errors
///
/// Returns an error if the shared folder cannot be listed.
pub fn execute_status(config_path: Option<&Path>) -> Result<(), WallsyncError> {
    let settings = config::load(config_path)?.resolve()?;
    let report = runtime()?.block_on(read_status(&settings))?;
    let value = serde_json::to_value(&report)?;

    if std::io::stdout().is_terminal() {
        print_highlighted_json(&value);
    } else {
        println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
    }

    Ok(())
}

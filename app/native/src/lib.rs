//! wallsync - keeps the desktop wallpaper in sync across machines.
//!
//! Every machine watches its local background file and a folder that some
//! external tool (Syncthing, Dropbox, a network share) keeps identical across
//! machines. A local change is published into the folder as a timestamped
//! artifact; the newest artifact published by another machine is applied
//! locally. A per-machine handled set guarantees that no change is ever
//! echoed back to the machine it came from.
//!
//! The [`sync`] module holds the reconciler; [`cli`] is the `wallsync` binary.

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod platform;
pub mod schema;
pub mod state;
pub mod sync;

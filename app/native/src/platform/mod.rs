//! Platform helpers.
//!
//! - [`path`] - Tilde expansion and path resolution

pub mod path;

pub use path::{expand, expand_and_resolve};

//! Configuration for avatar sheet runs
//!
//! Provides types and parsing for the optional `avatars.toml` file and the
//! command-line overrides layered on top of it.

pub mod loader;
pub mod schema;

pub use loader::*;
pub use schema::*;

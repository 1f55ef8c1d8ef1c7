//! Avatar Sheet - builds the team avatar sprite sheet for the FRC map
//!
//! This library provides functionality to:
//! - Download team avatars from the paginated FRC events API
//! - Fall back to a previous run's sheet for teams without a current avatar
//! - Stitch every avatar into one square sprite sheet plus a location manifest

pub mod avatar;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod legacy;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod spritesheet;

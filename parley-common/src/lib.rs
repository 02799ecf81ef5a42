//! Shared infrastructure for the Parley backend.
//!
//! Provides the unified configuration file (`~/.parley/config.json` with
//! environment overrides) and structured logging setup used by the server.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;

pub use config::Config;
pub use logging::init_logging;

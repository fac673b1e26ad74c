//! Core types for the AirSim control plane.
//!
//! Holds the error taxonomy, the command-line surface, the immutable
//! per-invocation configuration and the `settings.json` document store.

pub mod cli;
pub mod config;
pub mod error;
pub mod path;
pub mod settings;

pub use config::AppConfig;
pub use error::{Result, SimError};

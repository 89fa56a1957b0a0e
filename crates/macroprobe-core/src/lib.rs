//! macroprobe core
//!
//! Core types, configuration and error handling shared by the scanner,
//! the probe engine and the command-line front end.

pub mod config;
pub mod error;
pub mod location;
pub mod types;

pub use config::{Config, ProbeConfig, ScanConfig, ToolchainConfig, DEFAULT_SENTINEL};
pub use error::{Error, Result};
pub use location::Location;
pub use types::*;

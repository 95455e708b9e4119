//! # orgmatch common library
//!
//! Shared code for the orgmatch workspace:
//! - Error type used by configuration and storage layers
//! - Configuration file discovery and TOML loading
//! - Tracing subscriber initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};

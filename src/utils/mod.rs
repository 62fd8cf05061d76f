//! Utility module with helper functions
//!
//! This module provides:
//! - Configuration handling
//! - Logging setup

mod config;
mod logging;

pub use config::Config;
pub use logging::setup_logging;

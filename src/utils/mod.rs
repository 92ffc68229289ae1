//! Utility modules

pub mod config;

pub use config::{ClientConfig, ConfigError};

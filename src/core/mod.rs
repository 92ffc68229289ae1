//! Core types and constants shared by every layer

pub mod types;
pub mod constants;

pub use types::*;
pub use constants::*;

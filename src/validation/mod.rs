//! Configuration and input validation

pub mod bounds;

pub use bounds::{validate_bounds, Axis, BoundsWarning, ValidationResult};

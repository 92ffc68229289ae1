//! Map-space algorithms

pub mod projection;
pub mod movement;

pub use projection::{project, GeoProjector};
pub use movement::{distance_m, local_displacement, MovementFilter};

//! Roster decoding and the shared position store

pub mod parser;
pub mod registry;

pub use parser::{LocationPayload, ParseError, RosterParser};
pub use registry::{PlayerRegistry, RegistrySnapshot};

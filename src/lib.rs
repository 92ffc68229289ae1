//! Multiplayer map position sharing
//!
//! Each client reports its device location to a position server and polls
//! the full player roster, then projects every position onto a fixed-bounds
//! map image. The server is authoritative for the local player's position
//! once it has confirmed one; until then the latest device sample, and
//! before that the map centre, stand in.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod transport;
pub mod api;

// Re-export commonly used types
pub use crate::core::{GeoPoint, MapBounds, NormalizedPoint, PlayerId, PlayerPosition, SyncResult};
pub use algorithms::{project, GeoProjector, MovementFilter};
pub use processing::{PlayerRegistry, RegistrySnapshot, RosterParser};
pub use validation::{validate_bounds, BoundsWarning, ValidationResult};
pub use utils::{ClientConfig, ConfigError};
pub use transport::{HttpTransport, MockTransport, PositionTransport, ServerReply, TransportError};
pub use api::{
    CancelToken, ChannelLocationSource, ImageRect, LocationReporter, LocationSource,
    LocationStatus, LocationSyncPoller, MapSession, RenderFrame, ReplayLocationSource,
    ReportOutcome, SessionError, SubscriptionError, SyncError, TickOutcome,
};

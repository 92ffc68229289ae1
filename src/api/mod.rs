//! Client-facing API
//!
//! Background workers (roster poller, location reporter, location consumer)
//! and the [`MapSession`] that owns them.

pub mod cancel;
pub mod poller;
pub mod render;
pub mod reporter;
pub mod session;
pub mod subscription;
pub mod types;

// Re-export commonly used API types
pub use cancel::CancelToken;
pub use poller::{LocationSyncPoller, SyncWaker};
pub use render::{ImageRect, RenderFrame, SelfSource};
pub use reporter::LocationReporter;
pub use session::{LocationStatus, MapSession, SessionError, SessionStats};
pub use subscription::{
    ChannelLocationSource, LocationFeed, LocationSource, LocationSubscription,
    ReplayLocationSource, SubscriptionError,
};
pub use types::{
    ApiResult, PollerState, PollerStats, ReportOutcome, ReporterStats, SyncError, TickOutcome,
};

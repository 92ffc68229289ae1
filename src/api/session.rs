//! One client session: registry, poller, reporter and location consumer
//! wired together and torn down as a unit.

use crate::algorithms::movement::MovementFilter;
use crate::algorithms::projection::GeoProjector;
use crate::api::cancel::CancelToken;
use crate::api::poller::LocationSyncPoller;
use crate::api::render::RenderFrame;
use crate::api::reporter::LocationReporter;
use crate::api::subscription::{LocationSource, SubscriptionError};
use crate::api::types::{PollerStats, ReporterStats};
use crate::core::{GeoPoint, PlayerId};
use crate::processing::registry::PlayerRegistry;
use crate::transport::{HttpTransport, PositionTransport, TransportError};
use crate::utils::config::{ClientConfig, ConfigError};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Errors that prevent a session from starting
#[derive(Debug)]
pub enum SessionError {
    Config(ConfigError),
    Transport(TransportError),
    /// A background thread could not be started
    Spawn { details: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Config(e) => write!(f, "Invalid configuration: {}", e),
            SessionError::Transport(e) => write!(f, "Transport setup failed: {}", e),
            SessionError::Spawn { details } => write!(f, "Failed to start session thread: {}", details),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Config(e) => Some(e),
            SessionError::Transport(e) => Some(e),
            SessionError::Spawn { .. } => None,
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(error: ConfigError) -> Self {
        SessionError::Config(error)
    }
}

impl From<TransportError> for SessionError {
    fn from(error: TransportError) -> Self {
        SessionError::Transport(error)
    }
}

/// State of the device location feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    /// No source attached yet
    Inactive,
    Active,
    PermissionDenied,
    Unavailable,
    /// The source stopped delivering samples
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub poller: PollerStats,
    pub reporter: ReporterStats,
    pub location: LocationStatus,
}

struct Consumer {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

pub struct MapSession {
    config: ClientConfig,
    registry: Arc<PlayerRegistry>,
    projector: GeoProjector,
    poller: Arc<LocationSyncPoller>,
    reporter: Arc<LocationReporter>,
    poller_cancel: CancelToken,
    poller_handle: Option<JoinHandle<()>>,
    consumer: Option<Consumer>,
    location_status: Arc<Mutex<LocationStatus>>,
}

impl MapSession {
    /// Validate `config`, then start polling the server through `transport`.
    ///
    /// Bounds warnings are logged and do not stop the session.
    pub fn start(
        config: &ClientConfig,
        player_id: PlayerId,
        transport: Arc<dyn PositionTransport>,
    ) -> Result<Self, SessionError> {
        let warnings = config.validate().into_result()?;
        for warning in &warnings {
            warn!(%warning, "map bounds accepted with warning");
        }
        let projector = GeoProjector::new(config.bounds)?;

        let registry = Arc::new(PlayerRegistry::new(
            player_id.clone(),
            config.default_center_point(),
        ));
        let poller = Arc::new(LocationSyncPoller::new(
            Arc::clone(&transport),
            Arc::clone(&registry),
        ));
        let reporter = Arc::new(
            LocationReporter::new(
                transport,
                player_id.clone(),
                config.report_workers,
                config.max_queued_reports,
            )
            .with_sync_waker(poller.waker()),
        );

        let poller_cancel = CancelToken::new();
        let poller_handle = poller
            .spawn(config.poll_interval(), poller_cancel.clone())
            .map_err(|e| SessionError::Spawn {
                details: e.to_string(),
            })?;

        info!(
            player_id = %player_id,
            poll_interval_ms = config.poll_interval_ms,
            "map session started"
        );

        Ok(Self {
            config: config.clone(),
            registry,
            projector,
            poller,
            reporter,
            poller_cancel,
            poller_handle: Some(poller_handle),
            consumer: None,
            location_status: Arc::new(Mutex::new(LocationStatus::Inactive)),
        })
    }

    /// Start a session against the configured HTTP server
    pub fn connect(config: &ClientConfig, platform_id: Option<&str>) -> Result<Self, SessionError> {
        let transport = HttpTransport::new(
            config.effective_server_base(),
            config.connect_timeout(),
            config.read_timeout(),
        )?;
        Self::start(config, config.resolve_player_id(platform_id), Arc::new(transport))
    }

    /// Subscribe to `source` and feed its samples to the registry and the
    /// reporter. Replaces any previously attached source.
    ///
    /// On `PermissionDenied` the session keeps polling and the self position
    /// stays on the server value or the default centre.
    pub fn attach_location_source(
        &mut self,
        source: &dyn LocationSource,
    ) -> Result<(), SubscriptionError> {
        self.stop_consumer();

        let subscription = match source.subscribe(self.config.location_interval()) {
            Ok(subscription) => subscription,
            Err(e) => {
                let status = match e {
                    SubscriptionError::PermissionDenied => LocationStatus::PermissionDenied,
                    SubscriptionError::Unavailable { .. } => LocationStatus::Unavailable,
                };
                self.set_location_status(status);
                warn!(error = %e, "location updates unavailable, showing server or default position");
                return Err(e);
            }
        };

        let cancel = subscription.cancel_token();
        let registry = Arc::clone(&self.registry);
        let reporter = Arc::clone(&self.reporter);
        let status = Arc::clone(&self.location_status);
        let mut filter = self.config.min_movement_m.map(MovementFilter::new);

        self.set_location_status(LocationStatus::Active);
        let handle = thread::Builder::new()
            .name("location-consumer".into())
            .spawn(move || {
                for point in subscription {
                    if let Some(filter) = filter.as_mut() {
                        if !filter.accept(&point) {
                            debug!(lat = point.lat, lon = point.lon, "sample within movement threshold, ignored");
                            continue;
                        }
                    }
                    registry.record_local_sample(point);
                    reporter.submit(point);
                }
                let mut status = status.lock().unwrap_or_else(PoisonError::into_inner);
                if *status == LocationStatus::Active {
                    *status = LocationStatus::Ended;
                }
                debug!("location consumer stopped");
            })
            .map_err(|e| {
                cancel.cancel();
                self.set_location_status(LocationStatus::Unavailable);
                error!(error = %e, "failed to start location consumer");
                SubscriptionError::Unavailable {
                    reason: e.to_string(),
                }
            })?;

        self.consumer = Some(Consumer { cancel, handle });
        Ok(())
    }

    pub fn location_status(&self) -> LocationStatus {
        *self
            .location_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_location_status(&self, status: LocationStatus) {
        *self
            .location_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn local_id(&self) -> &PlayerId {
        self.registry.local_id()
    }

    pub fn registry(&self) -> &Arc<PlayerRegistry> {
        &self.registry
    }

    pub fn projector(&self) -> &GeoProjector {
        &self.projector
    }

    pub fn self_position(&self) -> GeoPoint {
        self.registry.resolve_self_position()
    }

    /// Current frame for the view. Never blocks on the network.
    pub fn render_frame(&self) -> RenderFrame {
        RenderFrame::from_snapshot(
            &self.registry.snapshot(),
            &self.projector,
            self.registry.default_center(),
        )
    }

    /// Ask for a roster sync now instead of at the next period
    pub fn request_sync(&self) {
        self.poller.request_sync();
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            poller: self.poller.stats(),
            reporter: self.reporter.stats(),
            location: self.location_status(),
        }
    }

    fn stop_consumer(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.cancel.cancel();
            if consumer.handle.join().is_err() {
                error!("location consumer panicked");
            }
        }
    }

    /// Stop every background thread and wait for queued reports.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.stop_consumer();
        if let Some(handle) = self.poller_handle.take() {
            self.poller_cancel.cancel();
            if handle.join().is_err() {
                error!("roster poller panicked");
            }
            self.reporter.wait_idle();
            info!("map session stopped");
        }
    }
}

impl Drop for MapSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::render::SelfSource;
    use crate::api::subscription::{ChannelLocationSource, ReplayLocationSource};
    use crate::core::{MapBounds, PlayerPosition};
    use crate::transport::MockTransport;
    use std::time::{Duration, Instant};

    fn fast_config() -> ClientConfig {
        ClientConfig {
            poll_interval_ms: 20,
            location_interval_ms: 5,
            ..ClientConfig::default()
        }
    }

    fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_roster_example_end_to_end() {
        let transport = Arc::new(MockTransport::new());
        transport.seed_player("me", 41.789, 2.765);
        transport.seed_player("p1", 41.7885, 2.7635);

        let mut session =
            MapSession::start(&fast_config(), PlayerId::new("me"), transport.clone()).unwrap();
        assert!(wait_until(|| session.registry().snapshot().sync_generation >= 1));

        let snapshot = session.registry().snapshot();
        assert_eq!(snapshot.others.len(), 1);
        assert_eq!(
            snapshot.others.get(&PlayerId::new("p1")),
            Some(&PlayerPosition::new("p1", 41.7885, 2.7635))
        );
        assert_eq!(
            snapshot.self_confirmed,
            Some(PlayerPosition::new("me", 41.789, 2.765))
        );

        let frame = session.render_frame();
        assert_eq!(frame.self_source, SelfSource::Server);
        assert!(frame.self_point.is_in_unit_square());
        assert!(frame.others.contains_key(&PlayerId::new("p1")));

        session.shutdown();
        assert_eq!(transport.max_in_flight_fetches(), 1);
    }

    #[test]
    fn test_permission_denied_keeps_polling() {
        let transport = Arc::new(MockTransport::new());
        transport.seed_player("p1", 41.7885, 2.7635);
        let mut session =
            MapSession::start(&fast_config(), PlayerId::new("me"), transport.clone()).unwrap();

        let (source, _feed) = ChannelLocationSource::new();
        source.set_permission_granted(false);
        assert_eq!(
            session.attach_location_source(&source),
            Err(SubscriptionError::PermissionDenied)
        );
        assert_eq!(session.location_status(), LocationStatus::PermissionDenied);

        assert!(wait_until(|| session.registry().remote_player_count() == 1));
        let frame = session.render_frame();
        assert_eq!(frame.self_source, SelfSource::Default);
        assert_eq!(session.self_position(), session.config.default_center_point());
        session.shutdown();
    }

    #[test]
    fn test_samples_are_recorded_reported_and_confirmed() {
        let transport = Arc::new(MockTransport::new());
        let mut session =
            MapSession::start(&fast_config(), PlayerId::new("me"), transport.clone()).unwrap();

        let source = ReplayLocationSource::new(vec![GeoPoint::new(41.789, 2.765)]);
        session.attach_location_source(&source).unwrap();

        // The mock server stores the report, so a later sync confirms it
        assert!(wait_until(|| session.registry().snapshot().self_confirmed.is_some()));
        assert_eq!(session.self_position(), GeoPoint::new(41.789, 2.765));
        assert_eq!(session.registry().snapshot().local_samples, 1);

        session.shutdown();
        assert_eq!(transport.posted().len(), 1);
        assert_eq!(session.stats().reporter.sent, 1);
        assert_eq!(session.location_status(), LocationStatus::Ended);
    }

    #[test]
    fn test_movement_filter_gates_samples() {
        let transport = Arc::new(MockTransport::new());
        let config = ClientConfig {
            min_movement_m: Some(5.0),
            ..fast_config()
        };
        let mut session = MapSession::start(&config, PlayerId::new("me"), transport.clone()).unwrap();

        let (source, feed) = ChannelLocationSource::new();
        session.attach_location_source(&source).unwrap();

        let start = GeoPoint::new(41.789, 2.765);
        // Roughly 1 m north, then roughly 100 m north
        feed.push(start);
        feed.push(GeoPoint::new(41.789009, 2.765));
        feed.push(GeoPoint::new(41.7899, 2.765));

        assert!(wait_until(|| session.registry().snapshot().local_samples == 2));
        session.shutdown();
        assert_eq!(session.registry().snapshot().local_samples, 2);
        assert_eq!(transport.posted().len(), 2);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ClientConfig {
            bounds: MapBounds::new(41.79, 41.79, 2.76, 2.77),
            ..ClientConfig::default()
        };
        let result = MapSession::start(&config, PlayerId::new("me"), Arc::new(MockTransport::new()));
        assert!(matches!(result, Err(SessionError::Config(ConfigError::DegenerateBounds { .. }))));

        let strict = ClientConfig {
            strict_axes: true,
            ..ClientConfig::default()
        };
        assert!(MapSession::start(&strict, PlayerId::new("me"), Arc::new(MockTransport::new())).is_err());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let transport = Arc::new(MockTransport::new());
        let mut session = MapSession::start(&fast_config(), PlayerId::new("me"), transport).unwrap();
        session.shutdown();
        session.shutdown();
        let frame = session.render_frame();
        assert!(frame.self_point.is_in_unit_square());
    }
}

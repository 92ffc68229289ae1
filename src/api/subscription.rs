//! Location sample subscriptions
//!
//! The platform location provider is modelled as a [`LocationSource`] that
//! hands out a cancellable stream of [`GeoPoint`] samples. Two sources ship
//! with the crate: a channel-fed one for hosts that push samples themselves,
//! and a replay source that plays back a fixed track.

use crate::api::cancel::CancelToken;
use crate::core::GeoPoint;
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Why no samples will flow
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionError {
    /// The user has not granted location access
    PermissionDenied,
    /// The provider cannot start (already subscribed, no hardware, ...)
    Unavailable { reason: String },
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionError::PermissionDenied => write!(f, "Location permission denied"),
            SubscriptionError::Unavailable { reason } => {
                write!(f, "Location provider unavailable: {}", reason)
            }
        }
    }
}

impl std::error::Error for SubscriptionError {}

/// Provider of device location samples
pub trait LocationSource {
    /// Start delivering samples no more often than `min_interval`
    fn subscribe(&self, min_interval: Duration) -> Result<LocationSubscription, SubscriptionError>;
}

/// Stream of samples that ends when cancelled or when the provider stops
#[derive(Debug)]
pub struct LocationSubscription {
    samples: Receiver<GeoPoint>,
    cancel: CancelToken,
}

impl LocationSubscription {
    pub fn new(samples: Receiver<GeoPoint>, cancel: CancelToken) -> Self {
        Self { samples, cancel }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block for the next sample; `None` once cancelled or exhausted
    pub fn next_sample(&self) -> Option<GeoPoint> {
        if self.cancel.is_cancelled() {
            return None;
        }
        select! {
            recv(self.cancel.receiver()) -> _ => None,
            recv(self.samples) -> sample => sample.ok(),
        }
    }
}

impl Iterator for LocationSubscription {
    type Item = GeoPoint;

    fn next(&mut self) -> Option<GeoPoint> {
        self.next_sample()
    }
}

/// Whether pushed samples may reach a subscriber
#[derive(Debug)]
struct FeedGate {
    permission_granted: AtomicBool,
    subscribed: AtomicBool,
}

impl FeedGate {
    fn is_open(&self) -> bool {
        self.permission_granted.load(Ordering::SeqCst) && self.subscribed.load(Ordering::SeqCst)
    }
}

/// Pushes samples into a [`ChannelLocationSource`]
#[derive(Debug, Clone)]
pub struct LocationFeed {
    sender: Sender<GeoPoint>,
    gate: Arc<FeedGate>,
}

impl LocationFeed {
    /// Returns false if the sample was discarded: permission is denied, no
    /// subscriber is attached yet, or the subscription side is gone.
    pub fn push(&self, point: GeoPoint) -> bool {
        if !self.gate.is_open() {
            debug!(lat = point.lat, lon = point.lon, "no active subscriber, sample discarded");
            return false;
        }
        self.sender.send(point).is_ok()
    }
}

/// Source fed by the host through a [`LocationFeed`]. Supports a single
/// subscription, matching one provider callback per view. Samples pushed
/// while permission is denied or before `subscribe` are never delivered.
#[derive(Debug)]
pub struct ChannelLocationSource {
    receiver: Mutex<Option<Receiver<GeoPoint>>>,
    gate: Arc<FeedGate>,
}

impl ChannelLocationSource {
    pub fn new() -> (Self, LocationFeed) {
        let (sender, receiver) = unbounded();
        let gate = Arc::new(FeedGate {
            permission_granted: AtomicBool::new(true),
            subscribed: AtomicBool::new(false),
        });
        let source = Self {
            receiver: Mutex::new(Some(receiver)),
            gate: Arc::clone(&gate),
        };
        (source, LocationFeed { sender, gate })
    }

    /// Mirror the platform permission state
    pub fn set_permission_granted(&self, granted: bool) {
        self.gate.permission_granted.store(granted, Ordering::SeqCst);
    }
}

impl LocationSource for ChannelLocationSource {
    fn subscribe(&self, _min_interval: Duration) -> Result<LocationSubscription, SubscriptionError> {
        if !self.gate.permission_granted.load(Ordering::SeqCst) {
            return Err(SubscriptionError::PermissionDenied);
        }
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| SubscriptionError::Unavailable {
                reason: "source already has a subscriber".to_string(),
            })?;
        let stale = receiver.try_iter().count();
        if stale > 0 {
            debug!(stale, "discarded samples queued before subscription");
        }
        self.gate.subscribed.store(true, Ordering::SeqCst);
        Ok(LocationSubscription::new(receiver, CancelToken::new()))
    }
}

/// Plays back a recorded track, one point per interval
#[derive(Debug, Clone)]
pub struct ReplayLocationSource {
    track: Vec<GeoPoint>,
    repeat: bool,
}

impl ReplayLocationSource {
    pub fn new(track: Vec<GeoPoint>) -> Self {
        Self {
            track,
            repeat: false,
        }
    }

    /// Start over from the first point after the last one
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }
}

impl LocationSource for ReplayLocationSource {
    fn subscribe(&self, min_interval: Duration) -> Result<LocationSubscription, SubscriptionError> {
        if self.track.is_empty() {
            return Err(SubscriptionError::Unavailable {
                reason: "replay track is empty".to_string(),
            });
        }

        let (sender, receiver) = unbounded();
        let cancel = CancelToken::new();
        let track = self.track.clone();
        let repeat = self.repeat;
        let player_cancel = cancel.clone();

        thread::Builder::new()
            .name("location-replay".into())
            .spawn(move || {
                let count = if repeat { usize::MAX } else { track.len() };
                let mut first = true;
                for point in track.iter().cycle().take(count) {
                    if !first {
                        select! {
                            recv(player_cancel.receiver()) -> _ => break,
                            default(min_interval) => {}
                        }
                    }
                    first = false;
                    if player_cancel.is_cancelled() || sender.send(*point).is_err() {
                        break;
                    }
                }
                debug!("location replay finished");
            })
            .map_err(|e| {
                warn!(error = %e, "failed to start location replay");
                SubscriptionError::Unavailable {
                    reason: e.to_string(),
                }
            })?;

        Ok(LocationSubscription::new(receiver, cancel))
    }
}

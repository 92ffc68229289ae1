//! Recurring roster sync
//!
//! The poller fetches the full roster, splits out the local player and
//! applies the result to the registry. Cycles never overlap: the timer is
//! rearmed only after a cycle finishes, and a `tick` that finds a cycle in
//! flight is skipped. Report-triggered syncs go through the same loop via
//! [`SyncWaker`], so one session never has two roster fetches in flight.

use crate::api::cancel::CancelToken;
use crate::api::types::{ApiResult, PollerState, PollerStats, SyncError, TickOutcome};
use crate::core::SyncResult;
use crate::processing::parser::RosterParser;
use crate::processing::registry::PlayerRegistry;
use crate::transport::PositionTransport;
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Asks a running poller for an immediate cycle. Requests made while one is
/// already pending are coalesced.
#[derive(Debug, Clone)]
pub struct SyncWaker {
    sender: Sender<()>,
    stopped: Arc<AtomicBool>,
}

impl SyncWaker {
    /// Returns false once the poller loop has exited or the poller is gone
    pub fn wake(&self) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            return false;
        }
        match self.sender.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Releases the in-flight flag even if a cycle unwinds
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct LocationSyncPoller {
    transport: Arc<dyn PositionTransport>,
    registry: Arc<PlayerRegistry>,
    parser: RosterParser,
    state: Mutex<PollerState>,
    in_flight: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    stopped: Arc<AtomicBool>,
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    cycles_skipped: AtomicU64,
}

impl LocationSyncPoller {
    pub fn new(transport: Arc<dyn PositionTransport>, registry: Arc<PlayerRegistry>) -> Self {
        let parser = RosterParser::new(registry.local_id().clone());
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            transport,
            registry,
            parser,
            state: Mutex::new(PollerState::Idle),
            in_flight: AtomicBool::new(false),
            wake_tx,
            wake_rx,
            stopped: Arc::new(AtomicBool::new(false)),
            cycles_completed: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> PollerStats {
        PollerStats {
            cycles_completed: self.cycles_completed.load(Ordering::SeqCst),
            cycles_failed: self.cycles_failed.load(Ordering::SeqCst),
            cycles_skipped: self.cycles_skipped.load(Ordering::SeqCst),
        }
    }

    pub fn waker(&self) -> SyncWaker {
        SyncWaker {
            sender: self.wake_tx.clone(),
            stopped: Arc::clone(&self.stopped),
        }
    }

    /// Ask the running loop for an immediate cycle
    pub fn request_sync(&self) {
        self.waker().wake();
    }

    #[cfg(test)]
    pub(crate) fn has_pending_wake(&self) -> bool {
        !self.wake_rx.is_empty()
    }

    fn set_state(&self, state: PollerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Fetch and decode the roster without touching the registry
    pub fn fetch_roster(&self) -> ApiResult<SyncResult> {
        let reply = self.transport.fetch_roster()?;
        if !reply.is_success() {
            return Err(SyncError::ServerRejected {
                status: reply.status,
                body: reply.body,
            });
        }
        Ok(self.parser.parse(&reply.body)?)
    }

    /// Run one full cycle on the calling thread
    pub fn tick(&self) -> TickOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.cycles_skipped.fetch_add(1, Ordering::SeqCst);
            debug!("sync cycle already in flight, skipping tick");
            return TickOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);

        self.set_state(PollerState::Fetching);
        let outcome = match self.fetch_roster() {
            Ok(result) => {
                self.set_state(PollerState::Applying);
                let remote_players = result.others.len();
                let self_confirmed = result.self_position.is_some();
                if !self_confirmed {
                    debug!("roster has no entry for the local player, keeping fallback");
                }
                self.registry.apply_sync(result);
                self.cycles_completed.fetch_add(1, Ordering::SeqCst);
                TickOutcome::Applied {
                    remote_players,
                    self_confirmed,
                }
            }
            Err(error) => {
                self.set_state(PollerState::Failed);
                self.cycles_failed.fetch_add(1, Ordering::SeqCst);
                if error.is_recoverable() {
                    warn!(error = %error, "roster sync failed, registry left unchanged");
                } else {
                    error!(error = %error, "roster sync cannot succeed until the transport is rebuilt");
                }
                TickOutcome::Failed(error)
            }
        };
        self.set_state(PollerState::Idle);
        outcome
    }

    /// Cycle every `interval` on a dedicated thread until `cancel` fires.
    ///
    /// The first cycle starts immediately. Cancellation never interrupts a
    /// fetch already in flight; it only prevents the next one.
    pub fn spawn(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancelToken,
    ) -> io::Result<JoinHandle<()>> {
        let poller = Arc::clone(self);
        self.stopped.store(false, Ordering::SeqCst);
        thread::Builder::new()
            .name("roster-poller".into())
            .spawn(move || poller.run(interval, cancel))
    }

    fn run(&self, interval: Duration, cancel: CancelToken) {
        info!(interval_ms = interval.as_millis() as u64, "roster poller started");
        loop {
            if cancel.is_cancelled() {
                break;
            }
            self.tick();
            if cancel.is_cancelled() {
                break;
            }
            select! {
                recv(cancel.receiver()) -> _ => break,
                recv(self.wake_rx) -> _ => debug!("immediate sync requested"),
                default(interval) => {}
            }
        }
        self.stopped.store(true, Ordering::SeqCst);
        // Requests made before the flag flipped are moot now
        while self.wake_rx.try_recv().is_ok() {}
        info!("roster poller stopped");
    }
}

//! Outbound location reports
//!
//! Each sample is posted on a small fixed worker pool so the location
//! source is never blocked by the network. Failures are logged and dropped;
//! the next sample is the retry. A successful report wakes the poller so the
//! server-confirmed self position refreshes without waiting a full period.

use crate::api::poller::SyncWaker;
use crate::api::types::{ReportOutcome, ReporterStats};
use crate::core::{GeoPoint, PlayerId};
use crate::processing::parser::LocationPayload;
use crate::transport::PositionTransport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use threadpool::ThreadPool;
use tracing::{debug, error, warn};

/// State shared with pool workers
struct ReporterCore {
    transport: Arc<dyn PositionTransport>,
    player_id: PlayerId,
    on_sent: Mutex<Option<SyncWaker>>,
    sent: AtomicU64,
    failed: AtomicU64,
}

impl ReporterCore {
    fn report(&self, point: GeoPoint) -> ReportOutcome {
        let payload = LocationPayload {
            player_id: self.player_id.as_str().to_string(),
            lat: point.lat,
            lng: point.lon,
        };

        let outcome = match self.transport.post_location(&payload) {
            Ok(reply) if reply.is_success() => ReportOutcome::Sent {
                status: reply.status,
            },
            Ok(reply) => ReportOutcome::ServerRejected {
                code: reply.status,
                body: reply.body,
            },
            Err(error) => ReportOutcome::TransportError(error),
        };

        match &outcome {
            ReportOutcome::Sent { status } => {
                self.sent.fetch_add(1, Ordering::SeqCst);
                debug!(status, lat = point.lat, lon = point.lon, "location reported");
            }
            ReportOutcome::ServerRejected { code, body } => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                if body.is_empty() {
                    error!(status = code, "location report rejected");
                } else {
                    error!(status = code, body = %body, "location report rejected");
                }
            }
            ReportOutcome::TransportError(error) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                error!(
                    error = %error,
                    recoverable = error.is_recoverable(),
                    "location report failed"
                );
            }
        }

        if outcome.is_sent() {
            let waker = self.on_sent.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(waker) = waker.as_ref() {
                if !waker.wake() {
                    debug!("poller stopped, skipping follow-up sync");
                }
            }
        }

        outcome
    }
}

pub struct LocationReporter {
    core: Arc<ReporterCore>,
    pool: Mutex<ThreadPool>,
    max_queued: usize,
    dropped: AtomicU64,
}

impl LocationReporter {
    /// `workers` bounds concurrent posts; samples arriving while
    /// `max_queued` posts are already waiting are dropped.
    pub fn new(
        transport: Arc<dyn PositionTransport>,
        player_id: PlayerId,
        workers: usize,
        max_queued: usize,
    ) -> Self {
        Self {
            core: Arc::new(ReporterCore {
                transport,
                player_id,
                on_sent: Mutex::new(None),
                sent: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            pool: Mutex::new(
                threadpool::Builder::new()
                    .num_threads(workers.max(1))
                    .thread_name("location-reporter".into())
                    .build(),
            ),
            max_queued,
            dropped: AtomicU64::new(0),
        }
    }

    /// Wake `waker` after every successful report
    pub fn with_sync_waker(self, waker: SyncWaker) -> Self {
        self.set_sync_waker(waker);
        self
    }

    /// Replace the waker; applies to reports already queued as well
    pub fn set_sync_waker(&self, waker: SyncWaker) {
        *self
            .core
            .on_sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(waker);
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.core.player_id
    }

    /// Post one sample on the calling thread
    pub fn report(&self, point: GeoPoint) -> ReportOutcome {
        self.core.report(point)
    }

    /// Queue a sample for a pool worker. Returns false if it was dropped.
    pub fn submit(&self, point: GeoPoint) -> bool {
        let pool = self.pool.lock().unwrap_or_else(PoisonError::into_inner);
        if pool.queued_count() >= self.max_queued {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            warn!(
                queued = pool.queued_count(),
                "report queue full, dropping location sample"
            );
            return false;
        }

        let core = Arc::clone(&self.core);
        pool.execute(move || {
            core.report(point);
        });
        true
    }

    /// Block until every queued report has finished
    pub fn wait_idle(&self) {
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        pool.join();
    }

    pub fn stats(&self) -> ReporterStats {
        ReporterStats {
            sent: self.core.sent.load(Ordering::SeqCst),
            failed: self.core.failed.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::poller::LocationSyncPoller;
    use crate::processing::registry::PlayerRegistry;
    use crate::transport::{MockTransport, ServerReply, TransportError};
    use std::time::{Duration, Instant};

    fn reporter(transport: &Arc<MockTransport>) -> LocationReporter {
        LocationReporter::new(transport.clone(), PlayerId::new("me"), 2, 4)
    }

    #[test]
    fn test_report_posts_payload() {
        let transport = Arc::new(MockTransport::new());
        let outcome = reporter(&transport).report(GeoPoint::new(41.789, 2.765));

        assert_eq!(outcome, ReportOutcome::Sent { status: 201 });
        assert_eq!(
            transport.posted(),
            vec![LocationPayload {
                player_id: "me".to_string(),
                lat: 41.789,
                lng: 2.765,
            }]
        );
    }

    #[test]
    fn test_failures_are_classified() {
        let transport = Arc::new(MockTransport::new());
        transport.push_post_reply(Ok(ServerReply::new(422, "missing jugador_id")));
        transport.push_post_reply(Err(TransportError::Connect {
            url: "mock".to_string(),
            details: "refused".to_string(),
        }));
        let reporter = reporter(&transport);

        assert_eq!(
            reporter.report(GeoPoint::new(1.0, 2.0)),
            ReportOutcome::ServerRejected {
                code: 422,
                body: "missing jugador_id".to_string()
            }
        );
        assert!(matches!(
            reporter.report(GeoPoint::new(1.0, 2.0)),
            ReportOutcome::TransportError(TransportError::Connect { .. })
        ));
        assert_eq!(reporter.stats().failed, 2);
        assert_eq!(reporter.stats().sent, 0);
    }

    #[test]
    fn test_submit_does_not_block_caller() {
        let transport = Arc::new(MockTransport::new().with_latency(Duration::from_millis(200)));
        let reporter = reporter(&transport);

        let start = Instant::now();
        assert!(reporter.submit(GeoPoint::new(1.0, 2.0)));
        assert!(start.elapsed() < Duration::from_millis(100));

        reporter.wait_idle();
        assert_eq!(transport.posted().len(), 1);
        assert_eq!(reporter.stats().sent, 1);
    }

    #[test]
    fn test_full_queue_drops_samples() {
        let transport = Arc::new(MockTransport::new().with_latency(Duration::from_millis(100)));
        let reporter = LocationReporter::new(transport.clone(), PlayerId::new("me"), 1, 1);

        let accepted = (0..10)
            .filter(|i| reporter.submit(GeoPoint::new(*i as f64, 0.0)))
            .count();
        reporter.wait_idle();

        // One running, one queued at most while the burst arrives
        assert!(accepted <= 2, "accepted {}", accepted);
        assert_eq!(reporter.stats().dropped as usize, 10 - accepted);
        assert_eq!(transport.posted().len(), accepted);
    }

    #[test]
    fn test_only_successful_reports_wake_poller() {
        let transport = Arc::new(MockTransport::new());
        let registry = Arc::new(PlayerRegistry::new(
            PlayerId::new("me"),
            GeoPoint::new(0.0, 0.0),
        ));
        let poller = LocationSyncPoller::new(transport.clone(), registry);
        let reporter = reporter(&transport).with_sync_waker(poller.waker());

        transport.push_post_reply(Ok(ServerReply::new(500, "")));
        reporter.report(GeoPoint::new(41.789, 2.765));
        assert!(!poller.has_pending_wake());

        reporter.report(GeoPoint::new(41.789, 2.765));
        assert!(poller.has_pending_wake());
        assert_eq!(reporter.stats().sent, 1);
    }

    #[test]
    fn test_waker_set_while_reports_are_queued_is_used() {
        let transport = Arc::new(MockTransport::new().with_latency(Duration::from_millis(50)));
        let registry = Arc::new(PlayerRegistry::new(
            PlayerId::new("me"),
            GeoPoint::new(0.0, 0.0),
        ));
        let poller = LocationSyncPoller::new(transport.clone(), registry);
        let reporter = reporter(&transport);

        // A worker holds a clone of the shared core while the waker is set
        assert!(reporter.submit(GeoPoint::new(41.789, 2.765)));
        reporter.set_sync_waker(poller.waker());
        reporter.wait_idle();

        assert_eq!(reporter.stats().sent, 1);
        assert!(poller.has_pending_wake());
    }

    #[test]
    fn test_report_after_poller_stopped_still_counts_as_sent() {
        let transport = Arc::new(MockTransport::new());
        let registry = Arc::new(PlayerRegistry::new(
            PlayerId::new("me"),
            GeoPoint::new(0.0, 0.0),
        ));
        let poller = Arc::new(LocationSyncPoller::new(transport.clone(), registry));
        let reporter = reporter(&transport).with_sync_waker(poller.waker());

        let cancel = crate::api::cancel::CancelToken::new();
        let handle = poller.spawn(Duration::from_secs(60), cancel.clone()).unwrap();
        cancel.cancel();
        handle.join().unwrap();

        assert!(reporter.report(GeoPoint::new(41.789, 2.765)).is_sent());
        assert!(!poller.has_pending_wake());
    }
}

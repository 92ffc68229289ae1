//! Mock transport for testing and offline runs
//!
//! Behaves like a minimal position server: posted locations are stored per
//! player and returned by the roster fetch. Scripted replies, queued with
//! `push_post_reply`/`push_roster_reply`, take priority over that behavior
//! and are consumed in order.

use crate::processing::parser::LocationPayload;
use crate::transport::{PositionTransport, ServerReply, TransportResult};
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// In-process stand-in for the position server
#[derive(Debug, Default)]
pub struct MockTransport {
    roster: Mutex<BTreeMap<String, (f64, f64)>>,
    post_replies: Mutex<VecDeque<TransportResult<ServerReply>>>,
    roster_replies: Mutex<VecDeque<TransportResult<ServerReply>>>,
    posted: Mutex<Vec<LocationPayload>>,
    latency: Mutex<Duration>,
    fetch_count: AtomicUsize,
    in_flight_fetches: AtomicUsize,
    max_in_flight_fetches: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every call
    pub fn with_latency(self, latency: Duration) -> Self {
        self.set_latency(latency);
        self
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Put a player on the simulated server's roster
    pub fn seed_player(&self, id: &str, lat: f64, lng: f64) {
        self.roster
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), (lat, lng));
    }

    pub fn remove_player(&self, id: &str) {
        self.roster
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn push_post_reply(&self, reply: TransportResult<ServerReply>) {
        self.post_replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    pub fn push_roster_reply(&self, reply: TransportResult<ServerReply>) {
        self.roster_replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Every payload received so far, in arrival order
    pub fn posted(&self) -> Vec<LocationPayload> {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Highest number of roster fetches observed running at once
    pub fn max_in_flight_fetches(&self) -> usize {
        self.max_in_flight_fetches.load(Ordering::SeqCst)
    }

    fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if !latency.is_zero() {
            thread::sleep(latency);
        }
    }

    fn roster_body(&self) -> String {
        let roster = self.roster.lock().unwrap_or_else(PoisonError::into_inner);
        let entries: Vec<_> = roster
            .iter()
            .map(|(id, (lat, lng))| json!({ "jugador_id": id, "lat": lat, "lng": lng }))
            .collect();
        serde_json::Value::Array(entries).to_string()
    }
}

impl PositionTransport for MockTransport {
    fn post_location(&self, payload: &LocationPayload) -> TransportResult<ServerReply> {
        self.simulate_latency();
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(payload.clone());

        let scripted = self
            .post_replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(reply) = scripted {
            return reply;
        }

        self.seed_player(&payload.player_id, payload.lat, payload.lng);
        Ok(ServerReply::new(201, ""))
    }

    fn fetch_roster(&self) -> TransportResult<ServerReply> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_fetches.fetch_max(now, Ordering::SeqCst);

        self.simulate_latency();

        let scripted = self
            .roster_replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let reply = match scripted {
            Some(reply) => reply,
            None => Ok(ServerReply::ok(self.roster_body())),
        };

        self.in_flight_fetches.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::parser::parse_entries;
    use crate::transport::TransportError;

    fn payload(id: &str, lat: f64, lng: f64) -> LocationPayload {
        LocationPayload {
            player_id: id.to_string(),
            lat,
            lng,
        }
    }

    #[test]
    fn test_posted_locations_appear_in_roster() {
        let transport = MockTransport::new();
        transport.seed_player("p1", 41.7885, 2.7635);

        let reply = transport.post_location(&payload("me", 41.789, 2.765)).unwrap();
        assert!(reply.is_success());

        let roster = transport.fetch_roster().unwrap();
        let entries = parse_entries(&roster.body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(transport.posted(), vec![payload("me", 41.789, 2.765)]);
    }

    #[test]
    fn test_scripted_replies_take_priority_in_order() {
        let transport = MockTransport::new();
        transport.push_roster_reply(Ok(ServerReply::new(503, "busy")));
        transport.push_roster_reply(Err(TransportError::Timeout {
            url: "mock".to_string(),
            timeout_ms: 5000,
        }));

        assert_eq!(transport.fetch_roster().unwrap().status, 503);
        assert!(transport.fetch_roster().is_err());
        assert_eq!(transport.fetch_roster().unwrap(), ServerReply::ok("[]"));
        assert_eq!(transport.fetch_count(), 3);
    }

    #[test]
    fn test_rejected_post_does_not_update_roster() {
        let transport = MockTransport::new();
        transport.push_post_reply(Ok(ServerReply::new(400, "bad payload")));

        let reply = transport.post_location(&payload("me", 1.0, 2.0)).unwrap();
        assert_eq!(reply.status, 400);
        assert_eq!(transport.fetch_roster().unwrap().body, "[]");
    }

    #[test]
    fn test_removed_player_leaves_roster() {
        let transport = MockTransport::new();
        transport.seed_player("p1", 41.7885, 2.7635);
        transport.seed_player("p2", 41.789, 2.764);
        transport.remove_player("p2");

        let entries = parse_entries(&transport.fetch_roster().unwrap().body).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id.as_str(), "p1");
    }
}

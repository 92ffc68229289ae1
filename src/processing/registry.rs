//! Shared store of player positions
//!
//! One registry is owned per session and shared by reference between the
//! location consumer, the sync poller and the render path. Writers hold the
//! lock only for the in-memory update; parsing and network I/O happen before
//! the lock is taken, so readers never wait on a fetch.

use crate::core::{GeoPoint, PlayerId, PlayerPosition, SyncResult};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Registry contents at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySnapshot {
    /// Remote players, never including the local id
    pub others: BTreeMap<PlayerId, PlayerPosition>,
    /// Local position as last confirmed by the server
    pub self_confirmed: Option<PlayerPosition>,
    /// Latest raw device sample
    pub self_last_local: Option<GeoPoint>,
    /// Number of syncs applied so far
    pub sync_generation: u64,
    /// Number of local samples recorded so far
    pub local_samples: u64,
}

impl RegistrySnapshot {
    fn empty() -> Self {
        Self {
            others: BTreeMap::new(),
            self_confirmed: None,
            self_last_local: None,
            sync_generation: 0,
            local_samples: 0,
        }
    }

    /// Confirmed, else local, else `default_center`
    pub fn resolve_self_position(&self, default_center: GeoPoint) -> GeoPoint {
        self.self_confirmed
            .as_ref()
            .map(|confirmed| confirmed.position)
            .or(self.self_last_local)
            .unwrap_or(default_center)
    }
}

/// Thread-safe player position store
#[derive(Debug)]
pub struct PlayerRegistry {
    local_id: PlayerId,
    default_center: GeoPoint,
    state: RwLock<RegistrySnapshot>,
}

impl PlayerRegistry {
    pub fn new(local_id: PlayerId, default_center: GeoPoint) -> Self {
        Self {
            local_id,
            default_center,
            state: RwLock::new(RegistrySnapshot::empty()),
        }
    }

    pub fn local_id(&self) -> &PlayerId {
        &self.local_id
    }

    pub fn default_center(&self) -> GeoPoint {
        self.default_center
    }

    /// Overwrite the latest raw device sample
    pub fn record_local_sample(&self, point: GeoPoint) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.self_last_local = Some(point);
        state.local_samples += 1;
    }

    /// Replace the remote roster wholesale.
    ///
    /// An entry carrying the local id is treated as a self confirmation even
    /// if the caller left it in `others`. A result without a self entry keeps
    /// the previous confirmation.
    pub fn apply_sync(&self, result: SyncResult) {
        let mut confirmed = result.self_position;
        let mut others = BTreeMap::new();
        for player in result.others {
            if player.id == self.local_id {
                warn!(player_id = %player.id, "local id found among remote players, treating as self");
                confirmed = Some(player);
            } else {
                others.insert(player.id.clone(), player);
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.others = others;
        if let Some(confirmed) = confirmed {
            state.self_confirmed = Some(confirmed);
        }
        state.sync_generation += 1;
        debug!(
            generation = state.sync_generation,
            remote_players = state.others.len(),
            self_confirmed = state.self_confirmed.is_some(),
            "roster applied"
        );
    }

    /// Authoritative self position: confirmed, else local, else default
    pub fn resolve_self_position(&self) -> GeoPoint {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.resolve_self_position(self.default_center)
    }

    /// Owned copy of the current state
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn remote_player_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .others
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::Arc;
    use std::thread;

    fn registry() -> PlayerRegistry {
        PlayerRegistry::new(PlayerId::new("me"), GeoPoint::new(41.7893, 2.7670))
    }

    #[test]
    fn test_self_position_precedence() {
        let registry = registry();
        assert_eq!(registry.resolve_self_position(), GeoPoint::new(41.7893, 2.7670));

        registry.record_local_sample(GeoPoint::new(41.7889, 2.7651));
        assert_eq!(registry.resolve_self_position(), GeoPoint::new(41.7889, 2.7651));

        registry.apply_sync(SyncResult {
            others: vec![],
            self_position: Some(PlayerPosition::new("me", 41.789, 2.765)),
        });
        assert_eq!(registry.resolve_self_position(), GeoPoint::new(41.789, 2.765));

        // Newer local samples never override a server confirmation
        registry.record_local_sample(GeoPoint::new(41.7, 2.7));
        assert_eq!(registry.resolve_self_position(), GeoPoint::new(41.789, 2.765));
    }

    #[test]
    fn test_sync_replaces_roster_wholesale() {
        let registry = registry();
        registry.apply_sync(SyncResult {
            others: vec![
                PlayerPosition::new("p1", 1.0, 1.0),
                PlayerPosition::new("p2", 2.0, 2.0),
            ],
            self_position: None,
        });
        assert_eq!(registry.remote_player_count(), 2);

        registry.apply_sync(SyncResult {
            others: vec![PlayerPosition::new("p3", 3.0, 3.0)],
            self_position: None,
        });

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.others.len(), 1);
        assert!(snapshot.others.contains_key(&PlayerId::new("p3")));
        assert_eq!(snapshot.sync_generation, 2);
    }

    #[test]
    fn test_missing_self_entry_keeps_last_confirmation() {
        let registry = registry();
        registry.apply_sync(SyncResult {
            others: vec![],
            self_position: Some(PlayerPosition::new("me", 5.0, 6.0)),
        });
        registry.apply_sync(SyncResult::default());

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.self_confirmed.map(|p| p.position),
            Some(GeoPoint::new(5.0, 6.0))
        );
    }

    #[test]
    fn test_local_id_never_lands_in_others() {
        let registry = registry();
        registry.apply_sync(SyncResult {
            others: vec![
                PlayerPosition::new("me", 7.0, 8.0),
                PlayerPosition::new("p1", 1.0, 1.0),
            ],
            self_position: None,
        });

        let snapshot = registry.snapshot();
        assert!(!snapshot.others.contains_key(&PlayerId::new("me")));
        assert_eq!(
            snapshot.self_confirmed.map(|p| p.position),
            Some(GeoPoint::new(7.0, 8.0))
        );
    }

    #[test]
    fn test_concurrent_interleavings_keep_state_consistent() {
        const WRITERS: usize = 4;
        const OPS_PER_WRITER: usize = 500;

        let registry = Arc::new(registry());
        let mut handles = Vec::new();
        let mut expected_samples = 0u64;
        let mut expected_syncs = 0u64;

        // Pre-roll the random schedules so the expected counters are known
        let mut rng = rand::thread_rng();
        let schedules: Vec<Vec<bool>> = (0..WRITERS)
            .map(|_| (0..OPS_PER_WRITER).map(|_| rng.gen_bool(0.5)).collect())
            .collect();
        for schedule in &schedules {
            for &is_sync in schedule {
                if is_sync {
                    expected_syncs += 1;
                } else {
                    expected_samples += 1;
                }
            }
        }

        for (writer, schedule) in schedules.into_iter().enumerate() {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for (op, is_sync) in schedule.into_iter().enumerate() {
                    // Every roster is homogeneous: all entries share one tag
                    let tag = (writer * OPS_PER_WRITER + op) as f64;
                    if is_sync {
                        registry.apply_sync(SyncResult {
                            others: (0..5)
                                .map(|i| PlayerPosition::new(format!("p{}", i), tag, tag))
                                .chain(std::iter::once(PlayerPosition::new("me", tag, tag)))
                                .collect(),
                            self_position: None,
                        });
                    } else {
                        registry.record_local_sample(GeoPoint::new(tag, tag));
                    }
                }
            }));
        }

        let reader = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    let snapshot = registry.snapshot();
                    assert!(!snapshot.others.contains_key(&PlayerId::new("me")));
                    let tags: Vec<f64> = snapshot.others.values().map(|p| p.position.lat).collect();
                    if let Some(first) = tags.first() {
                        assert_eq!(tags.len(), 5);
                        assert!(tags.iter().all(|t| t == first), "mixed roster {:?}", tags);
                    }
                }
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        reader.join().unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.local_samples, expected_samples);
        assert_eq!(snapshot.sync_generation, expected_syncs);
        assert!(!snapshot.others.contains_key(&PlayerId::new("me")));
    }
}

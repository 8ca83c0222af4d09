//! Coalescing of concurrent misses for the same key.
//!
//! The first request to miss on a key becomes the leader and holds a
//! [`FlightGuard`] until its cache write has finished. Requests that miss on
//! the same key meanwhile wait for the guard to drop, then read the store again.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

/// Upper bound on how long a follower waits for its leader.
const FOLLOWER_WAIT: Duration = Duration::from_secs(10);

#[derive(Clone, Default)]
pub struct SingleFlight {
    inflight: Arc<DashMap<String, watch::Receiver<()>>>,
}

pub enum Flight {
    Leader(FlightGuard),
    Follower(watch::Receiver<()>),
}

/// Held by the leader; dropping it releases every follower.
pub struct FlightGuard {
    key: String,
    inflight: Arc<DashMap<String, watch::Receiver<()>>>,
    _done: watch::Sender<()>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
    }
}

impl std::fmt::Debug for SingleFlight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.inflight.len())
            .finish()
    }
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, key: &str) -> Flight {
        match self.inflight.entry(key.to_string()) {
            Entry::Occupied(existing) => Flight::Follower(existing.get().clone()),
            Entry::Vacant(slot) => {
                let (done, waiter) = watch::channel(());
                slot.insert(waiter);
                Flight::Leader(FlightGuard {
                    key: key.to_string(),
                    inflight: Arc::clone(&self.inflight),
                    _done: done,
                })
            }
        }
    }

    /// Number of keys with a leader in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

/// Wait until the leader releases its guard (or the wait bound elapses).
pub async fn wait_for_leader(mut waiter: watch::Receiver<()>) {
    // `changed` errors once the sender is dropped, which is the release signal.
    let _ = tokio::time::timeout(FOLLOWER_WAIT, waiter.changed()).await;
}

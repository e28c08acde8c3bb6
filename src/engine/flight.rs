//! Per-key single-flight coordination.
//!
//! At most one resolution runs per canonical name per process. The leader
//! holds the key's async lock while it resolves and populates the cache;
//! followers queue on the same lock and re-check the cache once admitted,
//! so they observe the leader's record without a second fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::CanonicalName;

/// Registry of in-flight resolution locks, keyed by canonical name.
#[derive(Debug, Default)]
pub struct FlightGroup {
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FlightGroup {
    /// The resolution lock for one canonical name.
    ///
    /// Callers lock it across their cache-check-and-resolve sequence and
    /// call [`FlightGroup::release`] once done.
    pub fn lock_for(&self, name: &CanonicalName) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock();
        inflight
            .entry(name.as_str().to_owned())
            .or_default()
            .clone()
    }

    /// Drop the key's lock entry once no other resolution holds it.
    ///
    /// Followers still queued keep their `Arc` and finish normally; later
    /// callers simply mint a fresh entry.
    pub fn release(&self, name: &CanonicalName) {
        let mut inflight = self.inflight.lock();
        if let Some(entry) = inflight.get(name.as_str()) {
            // One reference in the map, one held by the caller.
            if Arc::strong_count(entry) <= 2 {
                inflight.remove(name.as_str());
            }
        }
    }

    /// Number of keys currently tracked (tests).
    pub fn tracked(&self) -> usize {
        self.inflight.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;

    fn name(raw: &str) -> CanonicalName {
        canonicalize(raw).expect("test name canonicalizes")
    }

    #[tokio::test]
    async fn test_same_key_shares_one_lock() {
        let flights = FlightGroup::default();
        let a = flights.lock_for(&name("water"));
        let b = flights.lock_for(&name("water"));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let flights = FlightGroup::default();
        let water = flights.lock_for(&name("water"));
        let glycerin = flights.lock_for(&name("glycerin"));

        let _held = water.lock().await;
        // A different key's lock is immediately available.
        assert!(glycerin.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_release_cleans_up_idle_entries() {
        let flights = FlightGroup::default();
        let lock = flights.lock_for(&name("water"));
        {
            let _guard = lock.lock().await;
        }
        drop(lock);
        // The caller's Arc is dropped; lock_for + release from a second
        // caller removes the idle entry.
        let second = flights.lock_for(&name("water"));
        drop(second);
        flights.release(&name("water"));
        assert_eq!(flights.tracked(), 0);
    }
}

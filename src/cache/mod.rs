//! In-process cache tier (L1).
//!
//! Sharded TTL map with bounded size, shared by all concurrent resolutions.
//! Two key spaces live side by side: `"<provider>:<name>"` for per-provider
//! facts and `"record:<name>"` for aggregated records. Expired entries are
//! transparent misses. Eviction removes expired entries first, then the
//! least-recently-used, once a shard exceeds its share of `max_entries`.
//!
//! Writers on one shard never block readers of other shards; counters are
//! plain atomic increments.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::types::{CanonicalName, IngredientFact, IngredientRecord, ProviderId};

/// Shard count; keys are distributed by hash.
const SHARD_COUNT: usize = 16;

/// A cached fact or record.
#[derive(Debug, Clone)]
pub enum CacheValue {
    /// One provider's cached answer.
    Fact(IngredientFact),
    /// A cached aggregated record.
    Record(IngredientRecord),
}

#[derive(Debug, Clone)]
struct Entry {
    value: CacheValue,
    expires_at: Instant,
    last_access: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Hit/miss/eviction counters, split by key class.
#[derive(Debug, Default)]
struct Counters {
    record_hits: AtomicU64,
    record_misses: AtomicU64,
    fact_hits: AtomicU64,
    fact_misses: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time cache statistics for the health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Live entries across all shards (including not-yet-swept expired ones).
    pub size: usize,
    /// Total hits across both key classes.
    pub hits: u64,
    /// Total misses across both key classes.
    pub misses: u64,
    /// Entries evicted by TTL sweep or LRU pressure.
    pub evictions: u64,
    /// Hits on `record:` keys only.
    pub record_hits: u64,
    /// Misses on `record:` keys only.
    pub record_misses: u64,
}

/// Sharded in-process TTL cache.
pub struct TtlCache {
    shards: Vec<RwLock<HashMap<String, Entry>>>,
    per_shard_cap: usize,
    default_ttl: Duration,
    counters: Counters,
}

impl std::fmt::Debug for TtlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("size", &self.len())
            .field("per_shard_cap", &self.per_shard_cap)
            .finish_non_exhaustive()
    }
}

impl TtlCache {
    /// Create a cache bounded to roughly `max_entries` with the given
    /// default TTL.
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        let per_shard_cap = (max_entries / SHARD_COUNT).max(1);
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            shards,
            per_shard_cap,
            default_ttl,
            counters: Counters::default(),
        }
    }

    fn shard_for(&self, key: &str) -> &RwLock<HashMap<String, Entry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = usize::try_from(hasher.finish()).unwrap_or(0) % SHARD_COUNT;
        &self.shards[index]
    }

    fn key_for_fact(provider: ProviderId, name: &CanonicalName) -> String {
        format!("{}:{}", provider.as_str(), name.as_str())
    }

    fn key_for_record(name: &CanonicalName) -> String {
        format!("record:{}", name.as_str())
    }

    /// Look up a cached aggregated record.
    pub fn get_record(&self, name: &CanonicalName) -> Option<IngredientRecord> {
        match self.get_at(&Self::key_for_record(name), Instant::now(), true) {
            Some(CacheValue::Record(record)) => Some(record),
            _ => None,
        }
    }

    /// Cache an aggregated record under the default TTL.
    pub fn put_record(&self, record: IngredientRecord) {
        self.insert_at(
            Self::key_for_record(&record.canonical_name),
            CacheValue::Record(record),
            self.default_ttl,
            Instant::now(),
        );
    }

    /// Look up a cached per-provider fact.
    pub fn get_fact(&self, provider: ProviderId, name: &CanonicalName) -> Option<IngredientFact> {
        match self.get_at(&Self::key_for_fact(provider, name), Instant::now(), false) {
            Some(CacheValue::Fact(fact)) => Some(fact),
            _ => None,
        }
    }

    /// Cache a provider fact under the provider's TTL.
    pub fn put_fact(&self, fact: IngredientFact, ttl: Duration) {
        self.insert_at(
            Self::key_for_fact(fact.provider, &fact.name),
            CacheValue::Fact(fact),
            ttl,
            Instant::now(),
        );
    }

    /// Clock-explicit lookup; expired entries are removed and counted as
    /// misses.
    fn get_at(&self, key: &str, now: Instant, is_record: bool) -> Option<CacheValue> {
        let mut shard = self.shard_for(key).write();
        let mut expired = false;
        let hit = match shard.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.last_access = now;
                Some(entry.value.clone())
            }
            Some(_) => {
                expired = true;
                None
            }
            None => None,
        };
        if expired {
            shard.remove(key);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }
        let (hits, misses) = if is_record {
            (&self.counters.record_hits, &self.counters.record_misses)
        } else {
            (&self.counters.fact_hits, &self.counters.fact_misses)
        };
        if hit.is_some() {
            hits.fetch_add(1, Ordering::Relaxed);
        } else {
            misses.fetch_add(1, Ordering::Relaxed);
        }
        hit
    }

    /// Clock-explicit insert with TTL-then-LRU eviction.
    fn insert_at(&self, key: String, value: CacheValue, ttl: Duration, now: Instant) {
        let mut shard = self.shard_for(&key).write();
        shard.insert(
            key,
            Entry {
                value,
                expires_at: now.checked_add(ttl).unwrap_or(now),
                last_access: now,
            },
        );

        if shard.len() <= self.per_shard_cap {
            return;
        }

        // TTL sweep first.
        let expired: Vec<String> = shard
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in expired {
            shard.remove(&k);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }

        // Then LRU until within budget.
        while shard.len() > self.per_shard_cap {
            let oldest = shard
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    shard.remove(&k);
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                }
                None => break,
            }
        }
    }

    /// Live entry count across all shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the counters for the health report.
    pub fn stats(&self) -> CacheStats {
        let record_hits = self.counters.record_hits.load(Ordering::Relaxed);
        let record_misses = self.counters.record_misses.load(Ordering::Relaxed);
        let fact_hits = self.counters.fact_hits.load(Ordering::Relaxed);
        let fact_misses = self.counters.fact_misses.load(Ordering::Relaxed);
        CacheStats {
            size: self.len(),
            hits: record_hits.saturating_add(fact_hits),
            misses: record_misses.saturating_add(fact_misses),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            record_hits,
            record_misses,
        }
    }
}

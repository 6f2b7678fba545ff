// src/services/cache.rs
use log::debug;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Time-boxed memo of fetch results. Entries older than the TTL are treated
/// as absent and dropped on the next insert.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Lookup against an explicit clock reading.
    pub fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        match self.entries.get(key) {
            Some((stored, value)) if now.saturating_duration_since(*stored) < self.ttl => {
                Some(value.clone())
            }
            Some(_) => {
                debug!("cache entry expired");
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (stored, _)| now.saturating_duration_since(*stored) < ttl);
        self.entries.insert(key, (now, value));
    }

    pub fn clear(&mut self) {
        debug!("clearing {} cache entries", self.entries.len());
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

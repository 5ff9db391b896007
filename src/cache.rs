//! In-memory key/value cache with lazy TTL expiry and optional LRU bound.
//!
//! Every component that memoizes upstream results owns one of these behind a
//! `tokio::sync::Mutex`. Expiry is checked on read; nothing is swept in the
//! background.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Option<Duration>,
    last_used: u64,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.inserted_at) < ttl,
            None => true,
        }
    }
}

pub struct TtlCache<K, V> {
    entries: HashMap<K, Entry<V>>,
    ttl: Option<Duration>,
    max_entries: Option<usize>,
    clock: u64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// `ttl = None` keeps entries for the lifetime of the process.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            max_entries: None,
            clock: 0,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let fresh = self.entries.get(key)?.is_fresh(now);
        if !fresh {
            self.entries.remove(key);
            return None;
        }

        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(key).map(|entry| {
            entry.last_used = clock;
            entry.value.clone()
        })
    }

    /// Freshness check that does not count as a use for LRU purposes.
    pub fn contains_fresh(&self, key: &K) -> bool {
        self.contains_fresh_at(key, Instant::now())
    }

    pub fn contains_fresh_at(&self, key: &K, now: Instant) -> bool {
        self.entries
            .get(key)
            .map(|entry| entry.is_fresh(now))
            .unwrap_or(false)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, self.ttl, Instant::now());
    }

    /// Insert with a TTL that overrides the cache default for this entry only.
    pub fn insert_with_ttl(&mut self, key: K, value: V, ttl: Option<Duration>) {
        self.insert_at(key, value, ttl, Instant::now());
    }

    pub fn insert_at(&mut self, key: K, value: V, ttl: Option<Duration>, now: Instant) {
        if !self.entries.contains_key(&key) {
            self.make_room(now);
        }

        self.clock += 1;
        self.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                ttl,
                last_used: self.clock,
            },
        );
    }

    /// Drop every entry that is stale at `now`. Returns how many were removed.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(now));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn make_room(&mut self, now: Instant) {
        let Some(max) = self.max_entries else {
            return;
        };
        if self.entries.len() < max {
            return;
        }

        self.purge_expired(now);
        while self.entries.len() >= max {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

//! Bounded, TTL-aware response cache.
//!
//! # Design
//! Expiry is checked lazily: `get` treats an entry whose deadline has passed as
//! a miss and drops it, so a stale value is never returned even if no sweep has
//! run. `clear_expired` is the eager sweep. At capacity the oldest-inserted
//! entry is evicted (FIFO). Overwriting a key re-queues it as newest.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;

/// A cached value with its insertion time and deadline.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    /// `None` when the TTL does not fit in an `Instant`; such entries never
    /// expire.
    pub expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Per-entry view exposed through `CacheStats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntryStats {
    pub key: String,
    pub age_ms: u64,
    /// `None` for entries that never expire.
    pub ttl_remaining_ms: Option<u64>,
}

/// Usage counters for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub entries: Vec<CacheEntryStats>,
}

#[derive(Debug)]
pub struct CacheStore<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// Insertion order, oldest first.
    order: VecDeque<String>,
    max_size: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_size,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits += 1;
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.remove_entry(key);
            self.expirations += 1;
        }
        self.misses += 1;
        None
    }

    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        if self.max_size == 0 {
            return;
        }
        let key = key.into();
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else {
            while self.entries.len() >= self.max_size {
                let Some(oldest) = self.order.pop_front() else {
                    break;
                };
                self.entries.remove(&oldest);
                self.evictions += 1;
            }
        }

        let now = Instant::now();
        self.order.push_back(key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now.checked_add(ttl),
            },
        );
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    /// Remove every entry whose key contains `pattern`. Returns the count.
    pub fn delete_matching(&mut self, pattern: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|k| k.contains(pattern))
            .cloned()
            .collect();
        for key in &doomed {
            self.remove_entry(key);
        }
        doomed.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Eagerly drop every stale entry. Returns the count removed.
    pub fn clear_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let entries = &self.entries;
        self.order.retain(|k| entries.contains_key(k));
        let removed = before - self.entries.len();
        self.expirations += removed as u64;
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self
            .order
            .iter()
            .filter_map(|key| {
                self.entries.get(key).map(|entry| CacheEntryStats {
                    key: key.clone(),
                    age_ms: now.saturating_duration_since(entry.inserted_at).as_millis() as u64,
                    ttl_remaining_ms: entry
                        .expires_at
                        .map(|deadline| deadline.saturating_duration_since(now).as_millis() as u64),
                })
            })
            .collect();

        CacheStats {
            size: self.entries.len(),
            max_size: self.max_size,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            expirations: self.expirations,
            entries,
        }
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
            true
        } else {
            false
        }
    }
}

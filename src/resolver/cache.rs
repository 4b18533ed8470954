//! Time-bounded cache of resolved stream addresses

use dashmap::DashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    resolved: String,
    resolved_at: Instant,
}

/// One row of [`RedirectCache::stats`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStat {
    pub url: String,
    pub resolved: String,
    pub age: Duration,
}

/// Concurrent map of original URL to resolved URL. Expired entries are
/// treated as absent and evicted on lookup.
#[derive(Debug)]
pub struct RedirectCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl RedirectCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, url: &str) -> Option<String> {
        match self.entries.get(url) {
            Some(entry) if entry.resolved_at.elapsed() < self.ttl => return Some(entry.resolved.clone()),
            Some(_) => {}
            None => return None,
        }
        // The shard guard from `get` is released here, so this cannot deadlock
        self.entries
            .remove_if(url, |_, entry| entry.resolved_at.elapsed() >= self.ttl);
        None
    }

    /// Last writer wins
    pub fn insert(&self, url: &str, resolved: &str) {
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                resolved: resolved.to_string(),
                resolved_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Evict expired entries, returning how many were dropped
    pub fn clear_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.resolved_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> Vec<CacheStat> {
        let mut stats: Vec<CacheStat> = self
            .entries
            .iter()
            .map(|entry| CacheStat {
                url: entry.key().clone(),
                resolved: entry.value().resolved.clone(),
                age: entry.value().resolved_at.elapsed(),
            })
            .collect();
        stats.sort_by(|a, b| a.url.cmp(&b.url));
        stats
    }
}

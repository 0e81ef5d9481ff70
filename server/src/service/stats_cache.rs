//! Short-lived cache of container resource samples

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::domain::container::ContainerStats;

/// A cached sample
#[derive(Debug, Clone)]
pub struct CachedStats {
    pub stats: ContainerStats,
    pub sampled_at: DateTime<Utc>,
    cached_at: Instant,
}

/// Cache introspection
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub expired_entries: usize,
    pub ttl_secs: u64,
}

/// Most recent sample per container, expiring after `ttl`
pub struct StatsCache {
    entries: DashMap<String, CachedStats>,
    ttl: Duration,
}

impl StatsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Fresh sample for `container_id`, if any
    pub fn get(&self, container_id: &str) -> Option<CachedStats> {
        self.entries
            .get(container_id)
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.value().clone())
    }

    pub fn insert(&self, container_id: &str, stats: ContainerStats, sampled_at: DateTime<Utc>) {
        self.entries.insert(
            container_id.to_string(),
            CachedStats {
                stats,
                sampled_at,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop expired entries, returning how many were removed
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.cached_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let expired_entries = self
            .entries
            .iter()
            .filter(|entry| entry.cached_at.elapsed() >= self.ttl)
            .count();

        CacheStats {
            entries: self.entries.len(),
            expired_entries,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

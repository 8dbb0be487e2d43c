//! Memoization of resolved unit prices.
//!
//! The cache only accelerates lookups: every caller must produce the same
//! result with [`NoopCacheStore`] in its place.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::domain::options::{normalize_key, CostCategory};
use crate::domain::product::ProductId;
use crate::domain::tier::TierKey;
use crate::pricing::resolvers::ResolvedPrice;

pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CacheKey {
    Option { category: CostCategory, option_key: String, tier: TierKey, generation: u64 },
    Product { product_id: ProductId, tier: TierKey, generation: u64 },
}

impl CacheKey {
    pub fn option(category: CostCategory, option_key: &str, tier: TierKey) -> Self {
        if category == CostCategory::BlankCap {
            return Self::product(option_key, tier);
        }
        Self::Option { category, option_key: normalize_key(option_key), tier, generation: 0 }
    }

    pub fn product(name: &str, tier: TierKey) -> Self {
        Self::Product { product_id: ProductId::from_name(name), tier, generation: 0 }
    }

    /// Scopes the key to one catalog generation.
    pub fn in_generation(mut self, catalog_generation: u64) -> Self {
        match &mut self {
            Self::Option { generation, .. } | Self::Product { generation, .. } => {
                *generation = catalog_generation;
            }
        }
        self
    }

    pub fn generation(&self) -> u64 {
        match self {
            Self::Option { generation, .. } | Self::Product { generation, .. } => *generation,
        }
    }

    pub fn category(&self) -> CostCategory {
        match self {
            Self::Option { category, .. } => *category,
            Self::Product { .. } => CostCategory::BlankCap,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Option { category, option_key, tier, generation } => {
                write!(f, "{category}:{option_key}:{tier}@{generation}")
            }
            Self::Product { product_id, tier, generation } => {
                write!(f, "product:{}:{tier}@{generation}", product_id.0)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
}

impl CacheStats {
    fn new(hits: u64, misses: u64, size: usize) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 { 0.0 } else { hits as f64 / lookups as f64 };
        Self { hits, misses, hit_rate, size }
    }
}

pub trait CacheStore: Send + Sync {
    /// Expired entries count as misses.
    fn get(&self, key: &CacheKey) -> Option<ResolvedPrice>;
    fn set(&self, key: CacheKey, value: ResolvedPrice, ttl: Duration);
    /// Returns how many entries were evicted.
    fn invalidate_by_category(&self, category: CostCategory) -> usize;
    fn clear(&self);
    fn stats(&self) -> CacheStats;

    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    value: ResolvedPrice,
    expires_at: Instant,
}

/// Concurrent map behind a read-mostly lock. Hit and miss counters are atomics
/// so reads never take the write lock unless an entry has expired.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Option<ResolvedPrice> {
        let now = Instant::now();
        let expired = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => {
                    self.record(true);
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
                entries.remove(key);
            }
        }
        self.record(false);
        None
    }

    fn set(&self, key: CacheKey, value: ResolvedPrice, ttl: Duration) {
        let entry = CacheEntry { value, expires_at: Instant::now() + ttl };
        self.entries.write().unwrap_or_else(PoisonError::into_inner).insert(key, entry);
    }

    fn invalidate_by_category(&self, category: CostCategory) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| key.category() != category);
        before - entries.len()
    }

    fn clear(&self) {
        self.entries.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn stats(&self) -> CacheStats {
        let size = self.entries.read().unwrap_or_else(PoisonError::into_inner).len();
        CacheStats::new(self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed), size)
    }
}

/// Stores nothing. Used when caching is disabled and as a test double.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopCacheStore;

impl CacheStore for NoopCacheStore {
    fn get(&self, _key: &CacheKey) -> Option<ResolvedPrice> {
        None
    }

    fn set(&self, _key: CacheKey, _value: ResolvedPrice, _ttl: Duration) {}

    fn invalidate_by_category(&self, _category: CostCategory) -> usize {
        0
    }

    fn clear(&self) {}

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

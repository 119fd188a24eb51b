//! Bounded-staleness cache for rendered pages.
//!
//! A cached value is served until it is older than the cache's TTL. The next request after
//! that renders it again. This gives soft freshness only: content edited in the CMS shows up
//! at most one TTL later. Expired entries are evicted, and the number of entries is capped.

use std::future::Future;
use std::time::Duration;

use anyhow::anyhow;
use moka::future::Cache;

/// Default entry cap. Unknown slugs produce not-found pages that are cached too.
pub const DEFAULT_MAX_ENTRIES: u64 = 1000;

pub struct PageCache<V> {
    ttl: Duration,
    entries: Cache<String, V>,
}

impl<V: Clone + Send + Sync + 'static> PageCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_max_entries(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_max_entries(ttl: Duration, max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        PageCache { ttl, entries }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value, if it's still fresh.
    pub async fn get_fresh(&self, key: &str) -> Option<V> {
        self.entries.get(key).await
    }

    pub async fn insert(&self, key: impl Into<String>, value: V) {
        self.entries.insert(key.into(), value).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.invalidate(key).await;
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
    }

    /// Approximate number of entries, including expired ones not evicted yet.
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Runs pending evictions now rather than on later cache activity.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    /// Returns the fresh cached value, or awaits `init` and caches its result. Errors aren't
    /// cached. Concurrent misses on the same key share a single `init`.
    pub async fn try_get_with<Fut>(&self, key: &str, init: Fut) -> anyhow::Result<V>
    where
        Fut: Future<Output = anyhow::Result<V>>,
    {
        self.entries
            .try_get_with_by_ref(key, init)
            .await
            .map_err(|err| anyhow!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_expiry() {
        let cache = PageCache::new(Duration::from_millis(50));
        cache.insert("/", "home".to_string()).await;
        assert_eq!(Some("home".to_string()), cache.get_fresh("/").await);
        assert_eq!(None, cache.get_fresh("/about").await);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(None, cache.get_fresh("/").await);

        cache.run_pending_tasks().await;
        assert_eq!(0, cache.entry_count());
    }

    #[tokio::test]
    async fn test_entries_are_capped() {
        let cache = PageCache::with_max_entries(Duration::from_secs(60), 10);
        for i in 0..1000 {
            cache.insert(format!("/posts/random-{}", i), i).await;
        }

        // Evictions are batched
        for _ in 0..5 {
            cache.run_pending_tasks().await;
        }
        assert!(cache.entry_count() <= 10, "{} entries", cache.entry_count());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = PageCache::new(Duration::from_secs(60));
        cache.insert("/", 1).await;
        cache.insert("/about", 2).await;

        cache.invalidate("/").await;
        assert_eq!(None, cache.get_fresh("/").await);
        assert_eq!(Some(2), cache.get_fresh("/about").await);

        cache.clear();
        assert_eq!(None, cache.get_fresh("/about").await);
    }

    #[tokio::test]
    async fn test_try_get_with() -> anyhow::Result<()> {
        let cache = PageCache::new(Duration::from_secs(60));

        let v = cache.try_get_with("/", async { anyhow::Ok(1) }).await?;
        assert_eq!(1, v);

        // Fresh: not computed again
        let v = cache.try_get_with("/", async { anyhow::Ok(2) }).await?;
        assert_eq!(1, v);

        // Errors are not cached
        let res = cache.try_get_with("/x", async { Err(anyhow!("boom")) }).await;
        assert_eq!("boom", res.unwrap_err().to_string());
        assert_eq!(None, cache.get_fresh("/x").await);
        Ok(())
    }
}

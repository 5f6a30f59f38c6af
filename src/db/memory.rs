use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::store::CacheStore;
use crate::{
    error::AppResult,
    models::{TitleId, TitleMetadata},
    services::providers::MetadataStore,
};

/// Rows returned by a reference-title lookup, matching the Postgres store
const TITLE_MATCH_LIMIT: usize = 10;

/// Writes between sweeps of expired cache entries
const SWEEP_INTERVAL: u64 = 256;

/// In-process cache honouring TTLs
///
/// Used when Redis is disabled and in tests. Entries expire lazily on read, and
/// every [`SWEEP_INTERVAL`] writes all expired entries are dropped.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
    writes: Arc<AtomicU64>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .values()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>> {
        // A panic while holding the lock leaves the map intact
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCache {
    async fn get_raw(&self, key: &str) -> AppResult<Option<String>> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set_raw(&self, key: String, value: String, ttl_secs: u64) {
        let now = Instant::now();
        let expires_at = now + Duration::from_secs(ttl_secs);
        let sweep = (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0;

        let mut entries = self.lock();
        if sweep {
            let before = entries.len();
            entries.retain(|_, (_, expires)| *expires > now);
            tracing::debug!(evicted = before - entries.len(), "Swept expired cache entries");
        }
        entries.insert(key, (value, expires_at));
    }
}

/// Metadata store over a fixed set of titles
///
/// Mirrors [`PgMetadataStore`](crate::db::PgMetadataStore) lookups without a database.
#[derive(Clone, Default)]
pub struct MemoryCatalog {
    titles: Arc<HashMap<TitleId, TitleMetadata>>,
}

impl MemoryCatalog {
    pub fn new(titles: impl IntoIterator<Item = TitleMetadata>) -> Self {
        Self {
            titles: Arc::new(titles.into_iter().map(|meta| (meta.id, meta)).collect()),
        }
    }
}

#[async_trait::async_trait]
impl MetadataStore for MemoryCatalog {
    async fn get(&self, id: TitleId) -> AppResult<Option<TitleMetadata>> {
        Ok(self.titles.get(&id).cloned())
    }

    async fn titles_matching(&self, text: &str) -> AppResult<Vec<(TitleId, String)>> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let prefix: String = needle.chars().take(4).collect();

        let mut matches: Vec<&TitleMetadata> = self
            .titles
            .values()
            .filter(|meta| {
                let title = meta.title.to_lowercase();
                title.contains(&needle) || title.chars().take(4).collect::<String>() == prefix
            })
            .collect();
        matches.sort_by(|a, b| {
            b.popularity
                .total_cmp(&a.popularity)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(matches
            .into_iter()
            .take(TITLE_MATCH_LIMIT)
            .map(|meta| (meta.id, meta.title.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CacheKey;
    use crate::models::MediaType;
    use std::sync::Arc;

    fn rerank_key(intent: &str) -> CacheKey {
        CacheKey::Rerank {
            intent: intent.to_string(),
            candidates: "c".to_string(),
        }
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());

        let retrieved: Option<Vec<String>> =
            cache.get_from_cache(&rerank_key("missing")).await.unwrap();
        assert_eq!(retrieved, None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let key = rerank_key("hit");
        let value = vec!["item1".to_string(), "item2".to_string()];

        cache.set_in_background(&key, &value, 60);

        let retrieved: Option<Vec<String>> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, Some(value));
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let memory = MemoryCache::new();
        let cache: Arc<dyn CacheStore> = Arc::new(memory.clone());
        let key = rerank_key("expired");

        cache.set_in_background(&key, &"value", 0);

        let retrieved: Option<String> = cache.get_from_cache(&key).await.unwrap();
        assert_eq!(retrieved, None);
        assert!(memory.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entries_reclaimed_on_write() {
        let memory = MemoryCache::new();
        let cache: Arc<dyn CacheStore> = Arc::new(memory.clone());

        for i in 0..SWEEP_INTERVAL - 1 {
            cache.set_in_background(&rerank_key(&format!("stale-{}", i)), &i, 0);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;

        let fresh = rerank_key("fresh");
        cache.set_in_background(&fresh, &"value", 60);

        assert_eq!(memory.lock().len(), 1);
        let retrieved: Option<String> = cache.get_from_cache(&fresh).await.unwrap();
        assert_eq!(retrieved, Some("value".to_string()));
    }

    fn title(id: i64, name: &str, popularity: f64) -> TitleMetadata {
        TitleMetadata {
            id: TitleId(id),
            title: name.to_string(),
            media_type: MediaType::Movie,
            overview: None,
            genres: Vec::new(),
            release_year: None,
            vote_average: None,
            vote_count: 0,
            popularity,
            runtime: None,
            original_language: None,
            adult: false,
            tone_tags: Vec::new(),
            keywords: Vec::new(),
            streaming_providers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_catalog_get_many_skips_unknown() {
        let catalog = MemoryCatalog::new(vec![title(1, "Heat", 10.0)]);

        let found = catalog.get_many(&[TitleId(1), TitleId(2)]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key(&TitleId(1)));
    }

    #[tokio::test]
    async fn test_catalog_titles_matching_orders_by_popularity() {
        let catalog = MemoryCatalog::new(vec![
            title(1, "Alien", 40.0),
            title(2, "Aliens", 55.0),
            title(3, "Heat", 20.0),
        ]);

        let matches = catalog.titles_matching("alien").await.unwrap();
        assert_eq!(
            matches,
            vec![(TitleId(2), "Aliens".to_string()), (TitleId(1), "Alien".to_string())]
        );
    }
}

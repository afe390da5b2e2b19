//! In-process [`CacheStore`] with lazy expiry.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{CacheError, CacheStore};

/// Expiry used when `now + ttl` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// `HashMap` cache behind an async `RwLock`. Expired entries are dropped
/// when read or overwritten.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

/// Removes `key` only if the stored entry is still expired at `now`.
fn evict_expired(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) -> bool {
    if entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
        entries.remove(key);
        return true;
    }
    false
}

impl MemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // A concurrent `set` may have refreshed the entry since the read.
        let mut entries = self.entries.write().await;
        evict_expired(&mut entries, key, Instant::now());
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: expiry(Instant::now(), ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(u64::try_from(before.saturating_sub(entries.len())).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn set_then_get() {
        let cache = MemoryCache::new();
        let _ = cache.set("a", "1".to_string(), HOUR).await;
        assert_eq!(cache.get("a").await.ok().flatten().as_deref(), Some("1"));
        assert_eq!(cache.get("b").await.ok().flatten(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = MemoryCache::new();
        let _ = cache.set("a", "1".to_string(), Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get("a").await.ok().flatten(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn huge_ttl_does_not_overflow() {
        let cache = MemoryCache::new();
        assert!(cache.set("a", "1".to_string(), Duration::MAX).await.is_ok());
        assert_eq!(cache.get("a").await.ok().flatten().as_deref(), Some("1"));
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_spares_an_entry_refreshed_after_expiry() {
        let now = Instant::now();
        let mut entries = HashMap::new();
        entries.insert(
            "a".to_string(),
            Entry {
                value: "fresh".to_string(),
                expires_at: expiry(now, HOUR),
            },
        );
        assert!(!evict_expired(&mut entries, "a", now));
        assert_eq!(entries.get("a").map(|e| e.value.as_str()), Some("fresh"));

        tokio::time::advance(HOUR).await;
        assert!(evict_expired(&mut entries, "a", Instant::now()));
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn delete_prefix_only_touches_matching_keys() {
        let cache = MemoryCache::new();
        for key in ["gifts:event:1:list", "gifts:event:1:top", "gifts:event:2:list"] {
            let _ = cache.set(key, String::new(), HOUR).await;
        }
        assert_eq!(cache.delete_prefix("gifts:event:1").await.ok(), Some(2));
        assert_eq!(cache.len().await, 1);
    }
}

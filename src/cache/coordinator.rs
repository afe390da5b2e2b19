//! Read-through caching and retried invalidation publishing.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use super::CacheStore;
use crate::config::InvalidationSettings;
use crate::domain::{EventId, InvalidationEvent, MessageBroker, UserId};
use crate::error::GatewayError;

/// Final state of a background invalidation publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The broker accepted the message.
    Delivered {
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// Every attempt failed; the message was dropped.
    Dropped {
        /// Attempts made.
        attempts: u32,
    },
}

/// Mediates between the services, the cache and the message broker.
#[derive(Debug, Clone)]
pub struct CacheCoordinator {
    cache: Arc<dyn CacheStore>,
    broker: Arc<dyn MessageBroker>,
    settings: InvalidationSettings,
}

impl CacheCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        cache: Arc<dyn CacheStore>,
        broker: Arc<dyn MessageBroker>,
        settings: InvalidationSettings,
    ) -> Self {
        Self {
            cache,
            broker,
            settings,
        }
    }

    /// Cache key of an event's supply list.
    #[must_use]
    pub fn supplies_key(event_id: EventId) -> String {
        format!("event:supplies:{event_id}")
    }

    /// Cache key of the gift list `user` sees for an event.
    #[must_use]
    pub fn gifts_key(event_id: EventId, user: UserId) -> String {
        format!("gifts:event:{event_id}:user:{user}")
    }

    /// Prefix shared by every viewer's gift list of an event.
    #[must_use]
    pub fn gifts_prefix(event_id: EventId) -> String {
        format!("gifts:event:{event_id}:")
    }

    /// Returns the cached value under `key`, or runs `load`, caches its
    /// result for the configured TTL and returns it.
    ///
    /// Cache failures and undecodable entries count as misses.
    ///
    /// # Errors
    ///
    /// Returns whatever `load` returns.
    pub async fn read_through<T, F, Fut>(&self, key: &str, load: F) -> Result<T, GatewayError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    tracing::debug!(key, "cache hit");
                    return Ok(value);
                }
                Err(e) => tracing::warn!(key, error = %e, "discarding undecodable cache entry"),
            },
            Ok(None) => tracing::debug!(key, "cache miss"),
            Err(e) => tracing::warn!(key, error = %e, "cache read failed"),
        }

        let value = load().await?;
        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(key, raw, self.settings.cache_ttl).await {
                    tracing::warn!(key, error = %e, "cache write failed");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "cache value not serializable"),
        }
        Ok(value)
    }

    /// Evicts `key` locally, then publishes an invalidation for `event_id`
    /// in the background.
    ///
    /// The returned handle resolves once the publish was delivered or
    /// dropped; callers are free to ignore it.
    pub async fn invalidate(&self, key: &str, event_id: EventId) -> JoinHandle<PublishOutcome> {
        if let Err(e) = self.cache.delete(key).await {
            tracing::warn!(key, error = %e, "cache eviction failed");
        }
        self.publish(key, event_id)
    }

    /// Evicts every key under `prefix` locally, then publishes an
    /// invalidation for `event_id` in the background.
    pub async fn invalidate_prefix(
        &self,
        prefix: &str,
        event_id: EventId,
    ) -> JoinHandle<PublishOutcome> {
        match self.cache.delete_prefix(prefix).await {
            Ok(evicted) => tracing::debug!(prefix, evicted, "cache prefix evicted"),
            Err(e) => tracing::warn!(prefix, error = %e, "cache prefix eviction failed"),
        }
        self.publish(prefix, event_id)
    }

    fn publish(&self, key: &str, event_id: EventId) -> JoinHandle<PublishOutcome> {
        let payload = InvalidationEvent::new(key, event_id).to_payload();
        let broker = Arc::clone(&self.broker);
        let topic = self.settings.topic.clone();
        let max_attempts = self.settings.max_attempts;
        let base_delay = self.settings.base_delay;
        tokio::spawn(async move {
            publish_with_retry(broker.as_ref(), &topic, &payload, max_attempts, base_delay).await
        })
    }
}

/// Publishes `payload`, retrying with exponential backoff.
///
/// The wait before retry `n` (1-based) is `base_delay * 2^(n-1)`. At least
/// one attempt is always made.
pub async fn publish_with_retry(
    broker: &dyn MessageBroker,
    topic: &str,
    payload: &serde_json::Value,
    max_attempts: u32,
    base_delay: Duration,
) -> PublishOutcome {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match broker.publish(topic, payload).await {
            Ok(()) => {
                tracing::debug!(topic, attempt, "invalidation published");
                return PublishOutcome::Delivered { attempts: attempt };
            }
            Err(e) if attempt < max_attempts => {
                let delay = backoff(base_delay, attempt);
                tracing::warn!(
                    topic,
                    attempt,
                    retry_in_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "invalidation publish failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(topic, attempts = attempt, error = %e, "invalidation dropped");
                return PublishOutcome::Dropped { attempts: attempt };
            }
        }
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::{CacheError, MemoryCache};
    use crate::domain::{BrokerError, EventBus};

    /// Fails the first `failures` publishes and records delivery times.
    #[derive(Debug)]
    struct FlakyBroker {
        failures: u32,
        calls: AtomicU32,
        seen: Mutex<Vec<tokio::time::Instant>>,
    }

    impl FlakyBroker {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MessageBroker for FlakyBroker {
        async fn publish(&self, _: &str, _: &serde_json::Value) -> Result<(), BrokerError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(tokio::time::Instant::now());
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(BrokerError::Unavailable("down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Debug)]
    struct BrokenCache;

    #[async_trait]
    impl CacheStore for BrokenCache {
        async fn get(&self, _: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("no route".to_string()))
        }
        async fn set(&self, _: &str, _: String, _: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("no route".to_string()))
        }
        async fn delete(&self, _: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("no route".to_string()))
        }
        async fn delete_prefix(&self, _: &str) -> Result<u64, CacheError> {
            Err(CacheError::Unavailable("no route".to_string()))
        }
    }

    fn coordinator(cache: Arc<dyn CacheStore>, broker: Arc<dyn MessageBroker>) -> CacheCoordinator {
        CacheCoordinator::new(cache, broker, InvalidationSettings::default())
    }

    #[test]
    fn backoff_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff(base, 1), Duration::from_millis(100));
        assert_eq!(backoff(base, 2), Duration::from_millis(200));
        assert_eq!(backoff(base, 3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let coord = coordinator(cache, Arc::new(EventBus::new(16)));
        let loads = AtomicU32::new(0);

        for _ in 0..2 {
            let value = coord
                .read_through("k", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, GatewayError>(vec![1_u32, 2, 3])
                })
                .await;
            assert_eq!(value.ok(), Some(vec![1, 2, 3]));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn broken_cache_falls_back_to_loader() {
        let coord = coordinator(Arc::new(BrokenCache), Arc::new(EventBus::new(16)));
        let value = coord
            .read_through("k", || async { Ok::<_, GatewayError>(7_u32) })
            .await;
        assert_eq!(value.ok(), Some(7));
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss() {
        let cache = Arc::new(MemoryCache::new());
        let _ = cache.set("k", "not json".to_string(), Duration::from_secs(60)).await;
        let coord = coordinator(Arc::clone(&cache) as Arc<dyn CacheStore>, Arc::new(EventBus::new(16)));
        let value = coord
            .read_through("k", || async { Ok::<_, GatewayError>(5_u32) })
            .await;
        assert_eq!(value.ok(), Some(5));
        assert_eq!(cache.get("k").await.ok().flatten().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn loader_errors_propagate() {
        let coord = coordinator(Arc::new(MemoryCache::new()), Arc::new(EventBus::new(16)));
        let value: Result<u32, _> = coord
            .read_through("k", || async { Err(GatewayError::not_found("event", "x")) })
            .await;
        assert!(matches!(value, Err(GatewayError::NotFound { .. })));
    }

    #[tokio::test]
    async fn invalidate_evicts_and_publishes() {
        let cache = Arc::new(MemoryCache::new());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let coord = coordinator(Arc::clone(&cache) as Arc<dyn CacheStore>, Arc::new(bus));
        let event_id = EventId::new();
        let key = CacheCoordinator::supplies_key(event_id);
        let _ = cache.set(&key, "[]".to_string(), Duration::from_secs(60)).await;

        let handle = coord.invalidate(&key, event_id).await;
        assert_eq!(cache.get(&key).await.ok().flatten(), None);
        assert_eq!(handle.await.ok(), Some(PublishOutcome::Delivered { attempts: 1 }));

        let Ok(message) = rx.recv().await else {
            panic!("invalidation should reach subscribers");
        };
        assert_eq!(message.topic, "cache.invalidate");
        assert_eq!(
            message.payload.get("key").and_then(|v| v.as_str()),
            Some(key.as_str())
        );
    }

    #[tokio::test]
    async fn invalidate_prefix_evicts_every_viewer() {
        let cache = Arc::new(MemoryCache::new());
        let coord = coordinator(
            Arc::clone(&cache) as Arc<dyn CacheStore>,
            Arc::new(EventBus::new(16)),
        );
        let event_id = EventId::new();
        let other = EventId::new();
        for key in [
            CacheCoordinator::gifts_key(event_id, UserId::new()),
            CacheCoordinator::gifts_key(event_id, UserId::new()),
            CacheCoordinator::gifts_key(other, UserId::new()),
        ] {
            let _ = cache.set(&key, "{}".to_string(), Duration::from_secs(60)).await;
        }

        let handle = coord
            .invalidate_prefix(&CacheCoordinator::gifts_prefix(event_id), event_id)
            .await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(handle.await.ok(), Some(PublishOutcome::Delivered { attempts: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn publish_retries_with_exponential_backoff() {
        let broker = Arc::new(FlakyBroker::new(2));
        let outcome = publish_with_retry(
            broker.as_ref(),
            "cache.invalidate",
            &serde_json::json!({}),
            3,
            Duration::from_millis(100),
        )
        .await;
        assert_eq!(outcome, PublishOutcome::Delivered { attempts: 3 });

        let Ok(seen) = broker.seen.lock() else {
            panic!("poisoned");
        };
        let gaps: Vec<Duration> = seen.windows(2).filter_map(|w| match w {
            [a, b] => Some(b.duration_since(*a)),
            _ => None,
        }).collect();
        assert_eq!(gaps, vec![Duration::from_millis(100), Duration::from_millis(200)]);
    }

    #[tokio::test(start_paused = true)]
    async fn publish_gives_up_after_max_attempts() {
        let broker = Arc::new(FlakyBroker::new(u32::MAX));
        let outcome = publish_with_retry(
            broker.as_ref(),
            "cache.invalidate",
            &serde_json::json!({}),
            3,
            Duration::from_millis(100),
        )
        .await;
        assert_eq!(outcome, PublishOutcome::Dropped { attempts: 3 });
        assert_eq!(broker.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_survives_broken_cache_and_broker() {
        let coord = coordinator(Arc::new(BrokenCache), Arc::new(FlakyBroker::new(u32::MAX)));
        let handle = coord.invalidate("event:supplies:x", EventId::new()).await;
        assert_eq!(handle.await.ok(), Some(PublishOutcome::Dropped { attempts: 3 }));
    }
}

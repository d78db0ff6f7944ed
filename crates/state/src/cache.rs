use std::sync::Arc;
use std::time::{Duration, Instant};

use chatrouter_core::ExecuteResponse;
use moka::Expiry;
use moka::future::Cache;

#[derive(Clone)]
struct CachedEntry {
    response: ExecuteResponse,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, CachedEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Fingerprint-keyed response cache with single-flight coalescing (spec.md
/// §4.5). Built on `moka`'s `try_get_with`, which guarantees at most one
/// computation runs per key even under concurrent callers (thundering-herd
/// protection) -- the same technique the embedding cache uses for provider
/// calls.
pub struct ResponseCache {
    cache: Cache<String, CachedEntry>,
}

impl ResponseCache {
    /// `max_entries` bounds cache size (spec.md §4.5: "LRU bound on entry
    /// count"); `moka` evicts by an approximate-LRU (TinyLFU) policy rather
    /// than strict LRU, which is an acceptable substitution here.
    #[must_use]
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }

    /// Fetch the cached response for `fingerprint`, or run `compute` if
    /// absent. Concurrent callers for the same fingerprint coalesce onto a
    /// single `compute` invocation and all observe its result (spec.md
    /// §4.5: "at most one adapter execution is in progress ... late
    /// arrivals await the in-flight result").
    ///
    /// `compute` returns `(response, ttl)`; a `ttl` of zero is treated as
    /// "do not cache" and the entry is evicted immediately after this call
    /// returns.
    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: &str,
        compute: F,
    ) -> Result<ExecuteResponse, Arc<String>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(ExecuteResponse, Duration), String>>,
    {
        let key = fingerprint.to_string();
        let entry = self
            .cache
            .try_get_with(key.clone(), async move {
                let (response, ttl) = compute().await?;
                Ok::<CachedEntry, String>(CachedEntry { response, ttl })
            })
            .await?;

        if entry.ttl.is_zero() {
            self.cache.invalidate(&key).await;
        }
        Ok(entry.response)
    }

    /// Explicit invalidation hook exposed to adapters (spec.md §4.5:
    /// "explicit invalidation hook exposed to adapters for 'this response
    /// should not be cached'").
    pub async fn invalidate(&self, fingerprint: &str) {
        self.cache.invalidate(fingerprint).await;
    }

    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn concurrent_misses_coalesce_into_one_compute() {
        let cache = Arc::new(ResponseCache::new(100));
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("fp-1", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok((ExecuteResponse::success("ok", vec![]), Duration::from_secs(30)))
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_ttl_is_not_retained() {
        let cache = ResponseCache::new(100);
        cache
            .get_or_compute("fp-2", || async move {
                Ok((ExecuteResponse::success("ok", vec![]), Duration::ZERO))
            })
            .await
            .unwrap();
        cache.cache.run_pending_tasks().await;
        assert_eq!(cache.entry_count(), 0);
    }
}

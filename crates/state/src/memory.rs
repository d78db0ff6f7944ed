use std::time::Duration;

use async_trait::async_trait;
use chatrouter_core::CommunityId;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::StateError;
use crate::key::{KeyKind, StateKey};
use crate::store::{CasResult, StateStore};

struct Entry {
    value: String,
    version: u64,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

struct BucketRecord {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

/// Process-local `StateStore` backed by a `DashMap`. The default backend
/// for a single router replica (spec.md §4.4: "buckets are process-local by
/// default"); a production deployment with multiple replicas would swap
/// this for a Redis- or DynamoDB-backed implementation.
#[derive(Default)]
pub struct InMemoryStateStore {
    entries: DashMap<String, Entry>,
    buckets: DashMap<String, BucketRecord>,
}

impl InMemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn expiry(ttl: Option<Duration>) -> Option<DateTime<Utc>> {
        ttl.and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d)
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn check_and_set(
        &self,
        key: &StateKey,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, StateError> {
        let canonical = key.canonical();
        let mut created = false;
        self.entries
            .entry(canonical)
            .and_modify(|entry| {
                if entry.is_expired() {
                    *entry = Entry {
                        value: value.to_string(),
                        version: entry.version + 1,
                        expires_at: Self::expiry(ttl),
                    };
                    created = true;
                }
            })
            .or_insert_with(|| {
                created = true;
                Entry {
                    value: value.to_string(),
                    version: 1,
                    expires_at: Self::expiry(ttl),
                }
            });
        Ok(created)
    }

    async fn get(&self, key: &StateKey) -> Result<Option<String>, StateError> {
        let canonical = key.canonical();
        match self.entries.get(&canonical) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &StateKey, value: &str, ttl: Option<Duration>) -> Result<(), StateError> {
        let canonical = key.canonical();
        let version = self.entries.get(&canonical).map_or(1, |e| e.version + 1);
        self.entries.insert(
            canonical,
            Entry {
                value: value.to_string(),
                version,
                expires_at: Self::expiry(ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &StateKey) -> Result<bool, StateError> {
        Ok(self.entries.remove(&key.canonical()).is_some())
    }

    async fn increment(&self, key: &StateKey, delta: i64, ttl: Option<Duration>) -> Result<i64, StateError> {
        let canonical = key.canonical();
        let mut new_value = 0i64;
        self.entries
            .entry(canonical)
            .and_modify(|entry| {
                let current: i64 = entry.value.parse().unwrap_or(0);
                new_value = current + delta;
                entry.value = new_value.to_string();
                entry.version += 1;
            })
            .or_insert_with(|| {
                new_value = delta;
                Entry {
                    value: delta.to_string(),
                    version: 1,
                    expires_at: Self::expiry(ttl),
                }
            });
        Ok(new_value)
    }

    async fn compare_and_swap(
        &self,
        key: &StateKey,
        expected_version: u64,
        new_value: &str,
        ttl: Option<Duration>,
    ) -> Result<CasResult, StateError> {
        let canonical = key.canonical();
        let mut result = CasResult::Ok;
        self.entries
            .entry(canonical)
            .and_modify(|entry| {
                if entry.version == expected_version {
                    entry.value = new_value.to_string();
                    entry.version += 1;
                    entry.expires_at = Self::expiry(ttl);
                } else {
                    result = CasResult::Conflict {
                        current_value: Some(entry.value.clone()),
                        current_version: entry.version,
                    };
                }
            })
            .or_insert_with(|| {
                if expected_version != 0 {
                    result = CasResult::Conflict {
                        current_value: None,
                        current_version: 0,
                    };
                }
                Entry {
                    value: new_value.to_string(),
                    version: 1,
                    expires_at: Self::expiry(ttl),
                }
            });
        Ok(result)
    }

    async fn scan(
        &self,
        community: &CommunityId,
        kind: KeyKind,
    ) -> Result<Vec<(String, String)>, StateError> {
        let prefix = format!("{community}:{kind}:");
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(&prefix) && !e.value().is_expired())
            .map(|e| (e.key().clone(), e.value().value.clone()))
            .collect())
    }

    async fn try_consume_token(
        &self,
        key: &StateKey,
        capacity: u64,
        refill_per_second: f64,
    ) -> Result<bool, StateError> {
        let canonical = key.canonical();
        let now = Utc::now();
        let mut consumed = false;
        self.buckets
            .entry(canonical)
            .and_modify(|bucket| {
                let elapsed = (now - bucket.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
                bucket.tokens = (bucket.tokens + elapsed * refill_per_second).min(capacity as f64);
                bucket.last_refill = now;
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    consumed = true;
                }
            })
            .or_insert_with(|| {
                let tokens = capacity as f64;
                consumed = tokens >= 1.0;
                BucketRecord {
                    tokens: if consumed { tokens - 1.0 } else { tokens },
                    last_refill: now,
                }
            });
        Ok(consumed)
    }

    async fn refund_token(&self, key: &StateKey, capacity: u64) -> Result<(), StateError> {
        let canonical = key.canonical();
        let now = Utc::now();
        self.buckets
            .entry(canonical)
            .and_modify(|bucket| {
                bucket.tokens = (bucket.tokens + 1.0).min(capacity as f64);
            })
            .or_insert_with(|| BucketRecord {
                tokens: (capacity as f64).min(1.0),
                last_refill: now,
            });
        Ok(())
    }
}

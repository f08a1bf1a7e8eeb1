//! In-memory counter store
//!
//! Single-process stand-in for the shared fast counter tier. Every
//! operation holds the map lock for its whole duration, which gives the
//! same atomicity the contract demands from a networked backend.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::counter::{CounterStore, QuotaDecrement};
use crate::domain::DomainError;

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(at) => now >= at,
            None => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn live_value(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) -> Option<i64> {
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value),
            None => None,
        }
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment_by(
        &self,
        key: &str,
        delta: i64,
        ttl: Option<Duration>,
    ) -> Result<i64, DomainError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match Self::live_value(&mut entries, key, now) {
            Some(value) => {
                let new_value = value.saturating_add(delta);
                if let Some(entry) = entries.get_mut(key) {
                    entry.value = new_value;
                }
                Ok(new_value)
            }
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: delta,
                        expires_at: ttl.map(|t| now + t),
                    },
                );
                Ok(delta)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, DomainError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        Ok(Self::live_value(&mut entries, key, now))
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<i64>>, DomainError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .map(|key| Self::live_value(&mut entries, key, now))
            .collect())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: i64,
        ttl: Option<Duration>,
    ) -> Result<bool, DomainError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if Self::live_value(&mut entries, key, now).is_some() {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: ttl.map(|t| now + t),
            },
        );
        Ok(true)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: i64,
        new: i64,
    ) -> Result<bool, DomainError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match Self::live_value(&mut entries, key, now) {
            Some(value) if value == expected => {
                if let Some(entry) = entries.get_mut(key) {
                    entry.value = new;
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn decrement_if_positive(&self, key: &str) -> Result<QuotaDecrement, DomainError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        match Self::live_value(&mut entries, key, now) {
            Some(value) if value > 0 => {
                let remaining = value - 1;
                if let Some(entry) = entries.get_mut(key) {
                    entry.value = remaining;
                }
                Ok(QuotaDecrement::Applied { remaining })
            }
            Some(_) => Ok(QuotaDecrement::Exhausted),
            None => Ok(QuotaDecrement::Missing),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), DomainError> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_increment_and_get() {
        let store = InMemoryCounterStore::new();

        assert_eq!(store.increment_by("c", 1, None).await.unwrap(), 1);
        assert_eq!(store.increment_by("c", 2, None).await.unwrap(), 3);
        assert_eq!(store.get("c").await.unwrap(), Some(3));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = InMemoryCounterStore::new();

        store
            .increment_by("short", 1, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(store.get("short").await.unwrap(), Some(1));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let store = InMemoryCounterStore::new();

        assert!(store.set_if_absent("q", 10, None).await.unwrap());
        assert!(!store.set_if_absent("q", 99, None).await.unwrap());
        assert_eq!(store.get("q").await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = InMemoryCounterStore::new();
        store.set_if_absent("q", 5, None).await.unwrap();

        assert!(store.compare_and_swap("q", 5, 8).await.unwrap());
        assert!(!store.compare_and_swap("q", 5, 9).await.unwrap());
        assert!(!store.compare_and_swap("missing", 0, 1).await.unwrap());
        assert_eq!(store.get("q").await.unwrap(), Some(8));
    }

    #[tokio::test]
    async fn test_decrement_if_positive() {
        let store = InMemoryCounterStore::new();
        store.set_if_absent("q", 1, None).await.unwrap();

        assert_eq!(
            store.decrement_if_positive("q").await.unwrap(),
            QuotaDecrement::Applied { remaining: 0 }
        );
        assert_eq!(
            store.decrement_if_positive("q").await.unwrap(),
            QuotaDecrement::Exhausted
        );
        assert_eq!(
            store.decrement_if_positive("missing").await.unwrap(),
            QuotaDecrement::Missing
        );
    }

    #[tokio::test]
    async fn test_concurrent_decrements_never_go_negative() {
        let store = Arc::new(InMemoryCounterStore::new());
        store.set_if_absent("q", 50, None).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..100 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.decrement_if_positive("q").await.unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), QuotaDecrement::Applied { .. }) {
                applied += 1;
            }
        }

        assert_eq!(applied, 50);
        assert_eq!(store.get("q").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_multi_get() {
        let store = InMemoryCounterStore::new();
        store.increment_by("a", 1, None).await.unwrap();
        store.increment_by("b", 2, None).await.unwrap();

        let values = store
            .multi_get(&["a".to_string(), "missing".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(values, vec![Some(1), None, Some(2)]);
    }
}

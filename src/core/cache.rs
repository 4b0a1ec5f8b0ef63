//! Model caching keyed by model identifier.
//!
//! Resolving a classifier can mean downloading weights and building the
//! network, so every resolved classifier is kept for the lifetime of the
//! cache. Values are expected to be cheap clones (the pipelines hold their
//! model behind an `Arc`), so a cache hit hands out a clone that shares the
//! loaded weights.

use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;

/// A cache of resolved models, keyed by identifier.
///
/// The cache is an ordinary value owned by whoever resolves models; there is
/// no process-wide instance.
pub struct ModelCache<M> {
    cache: Mutex<HashMap<String, M>>,
}

impl<M: Clone> ModelCache<M> {
    /// Create a new empty model cache.
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Get a cached model or create it with `loader`.
    ///
    /// The loader only runs when `key` has no entry. A failed load leaves the
    /// cache untouched, so the next call for the same key tries again.
    pub async fn get_or_create_async<F, Fut>(&self, key: &str, loader: F) -> anyhow::Result<M>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<M>>,
    {
        {
            let cache = self.cache.lock().await;
            if let Some(model) = cache.get(key) {
                return Ok(model.clone());
            }
        }

        let model = loader().await?;

        {
            let mut cache = self.cache.lock().await;
            cache.insert(key.to_string(), model.clone());
        }

        Ok(model)
    }

    /// Whether a model is cached under `key`.
    pub async fn contains(&self, key: &str) -> bool {
        self.cache.lock().await.contains_key(key)
    }

    /// Get the number of cached models.
    pub async fn len(&self) -> usize {
        let cache = self.cache.lock().await;
        cache.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.lock().await;
        cache.is_empty()
    }
}

impl<M: Clone> Default for ModelCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct TestModel {
        id: String,
    }

    #[tokio::test]
    async fn test_cache_returns_same_instance() {
        let cache = ModelCache::new();

        let model1 = cache
            .get_or_create_async("test-model", || async {
                Ok(TestModel {
                    id: "original".to_string(),
                })
            })
            .await
            .unwrap();

        let model2 = cache
            .get_or_create_async("test-model", || async {
                // This should not be called
                Ok(TestModel {
                    id: "new".to_string(),
                })
            })
            .await
            .unwrap();

        assert_eq!(model1.id, model2.id);
        assert_eq!(model1.id, "original");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_are_independent() {
        let cache = ModelCache::new();

        for key in ["a", "b"] {
            cache
                .get_or_create_async(key, || async {
                    Ok(TestModel {
                        id: key.to_string(),
                    })
                })
                .await
                .unwrap();
        }

        assert_eq!(cache.len().await, 2);
        assert!(cache.contains("a").await);
        assert!(cache.contains("b").await);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache: ModelCache<TestModel> = ModelCache::new();

        let first = cache
            .get_or_create_async("flaky", || async { anyhow::bail!("download failed") })
            .await;
        assert!(first.is_err());
        assert!(cache.is_empty().await);

        let second = cache
            .get_or_create_async("flaky", || async {
                Ok(TestModel {
                    id: "recovered".to_string(),
                })
            })
            .await
            .unwrap();
        assert_eq!(second.id, "recovered");
        assert!(cache.contains("flaky").await);
    }
}

//! Process-wide model cache.
//!
//! Maps a `ModelId` to its loaded `ModelEntry`. Each id owns a slot holding a
//! `tokio::sync::OnceCell`, so concurrent misses for the same id share one
//! load while misses for different ids proceed independently. A failed load
//! leaves the slot empty; the next request tries again.
//!
//! The number of loaded models is bounded: when a successful load pushes the
//! count above capacity, the least recently used other model is evicted.
//! In-flight translations keep their `Arc<ModelEntry>` alive after eviction.

use super::{ModelEntry, ModelLoader};
use crate::error::TranslateError;
use crate::metrics::TranslationMetrics;
use crate::routing::ModelId;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{error, info};

struct Slot {
    cell: OnceCell<Arc<ModelEntry>>,
    last_used: AtomicU64,
}

impl Slot {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            last_used: AtomicU64::new(0),
        }
    }
}

pub struct ModelCache {
    loader: Arc<dyn ModelLoader>,
    slots: DashMap<ModelId, Arc<Slot>>,
    capacity: usize,
    clock: AtomicU64,
    metrics: Arc<TranslationMetrics>,
}

impl ModelCache {
    /// Create a cache that keeps at most `capacity` loaded models.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(loader: Arc<dyn ModelLoader>, capacity: usize) -> Self {
        Self::with_metrics(loader, capacity, Arc::new(TranslationMetrics::new()))
    }

    pub fn with_metrics(
        loader: Arc<dyn ModelLoader>,
        capacity: usize,
        metrics: Arc<TranslationMetrics>,
    ) -> Self {
        assert!(capacity > 0, "model cache capacity must be at least 1");
        Self {
            loader,
            slots: DashMap::new(),
            capacity,
            clock: AtomicU64::new(0),
            metrics,
        }
    }

    /// Return the loaded entry for `model_id`, loading it on first use.
    ///
    /// Callers racing on an uncached id wait for the single in-flight load and
    /// then all receive the same entry.
    pub async fn ensure_loaded(&self, model_id: &ModelId) -> Result<Arc<ModelEntry>, TranslateError> {
        // Clone the slot out so no map guard is held across the await below
        let slot = self
            .slots
            .entry(model_id.clone())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone();
        slot.last_used.store(self.tick(), Ordering::Relaxed);

        if let Some(entry) = slot.cell.get() {
            self.metrics.record_cache_hit();
            return Ok(Arc::clone(entry));
        }
        self.metrics.record_cache_miss();

        let entry = slot
            .cell
            .get_or_try_init(|| async {
                info!("📦 Loading model: {}", model_id);
                let started = Instant::now();
                self.metrics.record_model_load();

                match self.loader.load(model_id).await {
                    Ok(entry) => {
                        info!(
                            "✓ Model {} loaded in {:.1}s",
                            model_id,
                            started.elapsed().as_secs_f32()
                        );
                        Ok(Arc::new(entry))
                    }
                    Err(cause) => {
                        error!("🔥 Model load failed for {}: {:#}", model_id, cause);
                        self.metrics.record_model_load_failure();
                        Err(cause)
                    }
                }
            })
            .await
            .map_err(|cause| TranslateError::ModelLoad {
                model_id: model_id.clone(),
                stage: None,
                cause,
            })?
            .clone();

        self.evict_over_capacity(model_id);
        Ok(entry)
    }

    /// Whether `model_id` is currently loaded.
    pub fn contains(&self, model_id: &ModelId) -> bool {
        self.slots
            .get(model_id)
            .map(|slot| slot.cell.initialized())
            .unwrap_or(false)
    }

    /// Number of loaded models.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every loaded model.
    ///
    /// Slots with a load still in flight are kept, so their waiters and any
    /// later caller share that one load.
    pub fn clear(&self) {
        self.slots.retain(|_, slot| !slot.cell.initialized());
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn evict_over_capacity(&self, keep: &ModelId) {
        loop {
            // Snapshot first; removing while iterating would deadlock the shard
            let loaded: Vec<(ModelId, u64)> = self
                .slots
                .iter()
                .filter(|slot| slot.value().cell.initialized())
                .map(|slot| {
                    (
                        slot.key().clone(),
                        slot.value().last_used.load(Ordering::Relaxed),
                    )
                })
                .collect();

            if loaded.len() <= self.capacity {
                return;
            }

            let victim = loaded
                .into_iter()
                .filter(|(id, _)| id != keep)
                .min_by_key(|(_, last_used)| *last_used);

            match victim {
                Some((id, _)) => {
                    info!("Evicting least recently used model: {}", id);
                    self.slots.remove(&id);
                    self.metrics.record_eviction();
                }
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::mock::{MockLoader, MockMode};
    use std::time::Duration;

    fn id(name: &str) -> ModelId {
        ModelId::new(name)
    }

    // ==================== Hit / Miss Tests ====================

    #[tokio::test]
    async fn test_second_call_returns_same_entry_with_one_load() {
        let loader = Arc::new(MockLoader::identity());
        let cache = ModelCache::new(loader.clone(), 16);

        let first = cache.ensure_loaded(&id("a")).await.unwrap();
        let second = cache.ensure_loaded(&id("a")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.load_count(), 1);
        assert!(cache.contains(&id("a")));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_hits_and_misses_are_recorded() {
        let metrics = Arc::new(TranslationMetrics::new());
        let cache = ModelCache::with_metrics(Arc::new(MockLoader::identity()), 16, metrics.clone());

        cache.ensure_loaded(&id("a")).await.unwrap();
        cache.ensure_loaded(&id("a")).await.unwrap();
        cache.ensure_loaded(&id("a")).await.unwrap();

        assert_eq!(metrics.cache_misses(), 1);
        assert_eq!(metrics.cache_hits(), 2);
        assert_eq!(metrics.model_loads(), 1);
    }

    #[tokio::test]
    async fn test_different_ids_load_separately() {
        let loader = Arc::new(MockLoader::identity());
        let cache = ModelCache::new(loader.clone(), 16);

        let a = cache.ensure_loaded(&id("a")).await.unwrap();
        let b = cache.ensure_loaded(&id("b")).await.unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.id(), &id("a"));
        assert_eq!(b.id(), &id("b"));
        assert_eq!(loader.load_count(), 2);
    }

    // ==================== Failure Tests ====================

    #[tokio::test]
    async fn test_failed_load_is_not_cached_and_retries() {
        let loader = Arc::new(MockLoader::identity().failing_on(id("bad")));
        let metrics = Arc::new(TranslationMetrics::new());
        let cache = ModelCache::with_metrics(loader.clone(), 16, metrics.clone());

        for _ in 0..3 {
            let err = cache.ensure_loaded(&id("bad")).await.unwrap_err();
            match err {
                TranslateError::ModelLoad { model_id, stage, .. } => {
                    assert_eq!(model_id, id("bad"));
                    assert_eq!(stage, None);
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(loader.loads_of(&id("bad")), 3);
        assert_eq!(metrics.model_load_failures(), 3);
        assert!(!cache.contains(&id("bad")));
        assert!(cache.is_empty());
    }

    // ==================== Concurrency Tests ====================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_trigger_exactly_one_load() {
        let loader = Arc::new(MockLoader::identity().with_delay(Duration::from_millis(100)));
        let cache = Arc::new(ModelCache::new(loader.clone(), 16));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.ensure_loaded(&ModelId::new("shared")).await })
            })
            .collect();

        let entries: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.expect("task panicked").expect("load failed"))
            .collect();

        assert_eq!(loader.load_count(), 1);
        assert!(entries.iter().all(|entry| Arc::ptr_eq(entry, &entries[0])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_keys_do_not_block_each_other() {
        let loader = Arc::new(MockLoader::identity().with_delay(Duration::from_millis(200)));
        let cache = Arc::new(ModelCache::new(loader.clone(), 16));

        let started = std::time::Instant::now();
        let (a_id, b_id) = (id("a"), id("b"));
        let (a, b) = tokio::join!(cache.ensure_loaded(&a_id), cache.ensure_loaded(&b_id));
        a.unwrap();
        b.unwrap();

        // Two serialized loads would take at least 400ms
        assert!(started.elapsed() < Duration::from_millis(390));
        assert_eq!(loader.load_count(), 2);
    }

    // ==================== Eviction Tests ====================

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let loader = Arc::new(MockLoader::identity());
        let metrics = Arc::new(TranslationMetrics::new());
        let cache = ModelCache::with_metrics(loader.clone(), 2, metrics.clone());

        cache.ensure_loaded(&id("a")).await.unwrap();
        cache.ensure_loaded(&id("b")).await.unwrap();
        // Touch "a" so "b" becomes the oldest
        cache.ensure_loaded(&id("a")).await.unwrap();
        cache.ensure_loaded(&id("c")).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&id("a")));
        assert!(!cache.contains(&id("b")));
        assert!(cache.contains(&id("c")));
        assert_eq!(metrics.evictions(), 1);

        // Evicted model loads again on next use
        cache.ensure_loaded(&id("b")).await.unwrap();
        assert_eq!(loader.loads_of(&id("b")), 2);
    }

    #[tokio::test]
    async fn test_evicted_entry_stays_usable_by_holder() {
        let cache = ModelCache::new(Arc::new(MockLoader::new(MockMode::Identity)), 1);

        let held = cache.ensure_loaded(&id("a")).await.unwrap();
        cache.ensure_loaded(&id("b")).await.unwrap();

        assert!(!cache.contains(&id("a")));
        assert_eq!(held.id(), &id("a"));
        let decoded = held.tokenizer().decode(&[104, 105]).unwrap();
        assert_eq!(decoded, "hi");
    }

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let loader = Arc::new(MockLoader::identity());
        let cache = ModelCache::new(loader.clone(), 16);

        cache.ensure_loaded(&id("a")).await.unwrap();
        cache.clear();
        assert!(cache.is_empty());

        cache.ensure_loaded(&id("a")).await.unwrap();
        assert_eq!(loader.load_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_clear_keeps_in_flight_load() {
        let loader = Arc::new(MockLoader::identity().with_delay(Duration::from_millis(200)));
        let cache = Arc::new(ModelCache::new(loader.clone(), 16));

        let first = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.ensure_loaded(&ModelId::new("m")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.clear();

        let second = cache.ensure_loaded(&id("m")).await.unwrap();
        let first = first.await.expect("task panicked").unwrap();

        assert_eq!(loader.load_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(cache.contains(&id("m")));
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn test_zero_capacity_panics() {
        ModelCache::new(Arc::new(MockLoader::identity()), 0);
    }
}

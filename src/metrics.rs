//! Translation metrics and observability module.
//!
//! Counters for model cache behaviour, model loads and completed translations.
//! One instance is created at startup and shared by the cache and the service.

use crate::routing::TranslationMethod;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Translation pipeline counters.
#[derive(Debug, Default)]
pub struct TranslationMetrics {
    /// Number of times a model was already loaded
    cache_hits: AtomicUsize,

    /// Number of times a model was not loaded yet
    cache_misses: AtomicUsize,

    /// Number of model load attempts
    model_loads: AtomicUsize,

    /// Number of model load attempts that failed
    model_load_failures: AtomicUsize,

    /// Number of models evicted to stay within capacity
    evictions: AtomicUsize,

    translations_same: AtomicUsize,
    translations_direct: AtomicUsize,
    translations_bridge: AtomicUsize,

    /// Number of requests that failed inside the pipeline
    translation_failures: AtomicUsize,
}

impl TranslationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit (model already loaded).
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss (model not loaded yet).
    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_model_load(&self) {
        self.model_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_model_load_failure(&self) {
        self.model_load_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful translation.
    pub fn record_translation(&self, method: TranslationMethod) {
        let counter = match method {
            TranslationMethod::Same => &self.translations_same,
            TranslationMethod::Direct => &self.translations_direct,
            TranslationMethod::Bridge => &self.translations_bridge,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_translation_failure(&self) {
        self.translation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn model_loads(&self) -> usize {
        self.model_loads.load(Ordering::Relaxed)
    }

    pub fn model_load_failures(&self) -> usize {
        self.model_load_failures.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> usize {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn translations(&self, method: TranslationMethod) -> usize {
        match method {
            TranslationMethod::Same => self.translations_same.load(Ordering::Relaxed),
            TranslationMethod::Direct => self.translations_direct.load(Ordering::Relaxed),
            TranslationMethod::Bridge => self.translations_bridge.load(Ordering::Relaxed),
        }
    }

    pub fn translation_failures(&self) -> usize {
        self.translation_failures.load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let total_cache_queries = hits + misses;
        let cache_hit_rate = if total_cache_queries > 0 {
            (hits as f64 / total_cache_queries as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            model_loads: self.model_loads(),
            model_load_failures: self.model_load_failures(),
            evictions: self.evictions(),
            translations: TranslationCounts {
                same: self.translations(TranslationMethod::Same),
                direct: self.translations(TranslationMethod::Direct),
                bridge: self.translations(TranslationMethod::Bridge),
            },
            translation_failures: self.translation_failures(),
        }
    }
}

/// Metrics report containing current translation statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,

    pub model_loads: usize,
    pub model_load_failures: usize,
    pub evictions: usize,
    pub translations: TranslationCounts,
    pub translation_failures: usize,
}

/// Successful translations per method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationCounts {
    pub same: usize,
    pub direct: usize,
    pub bridge: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Counter Tests ====================

    #[test]
    fn test_record_cache_hit() {
        let metrics = TranslationMetrics::new();

        assert_eq!(metrics.cache_hits(), 0);
        metrics.record_cache_hit();
        assert_eq!(metrics.cache_hits(), 1);
        metrics.record_cache_hit();
        assert_eq!(metrics.cache_hits(), 2);
    }

    #[test]
    fn test_record_translation_per_method() {
        let metrics = TranslationMetrics::new();

        metrics.record_translation(TranslationMethod::Bridge);
        metrics.record_translation(TranslationMethod::Bridge);
        metrics.record_translation(TranslationMethod::Direct);

        assert_eq!(metrics.translations(TranslationMethod::Bridge), 2);
        assert_eq!(metrics.translations(TranslationMethod::Direct), 1);
        assert_eq!(metrics.translations(TranslationMethod::Same), 0);
    }

    // ==================== Report Tests ====================

    #[test]
    fn test_report_empty() {
        let report = TranslationMetrics::new().report();

        assert_eq!(report.cache_hits, 0);
        assert_eq!(report.cache_misses, 0);
        assert_eq!(report.cache_hit_rate, 0.0);
        assert_eq!(report.model_loads, 0);
        assert_eq!(report.translation_failures, 0);
    }

    #[test]
    fn test_report_cache_hit_rate() {
        let metrics = TranslationMetrics::new();

        // 3 hits, 1 miss = 75% hit rate
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        let report = metrics.report();
        assert_eq!(report.cache_hits, 3);
        assert_eq!(report.cache_misses, 1);
        assert_eq!(report.cache_hit_rate, 75.0);
    }

    #[test]
    fn test_report_serialization() {
        let metrics = TranslationMetrics::new();
        metrics.record_model_load();
        metrics.record_model_load_failure();
        metrics.record_translation(TranslationMethod::Same);

        let json = serde_json::to_value(metrics.report()).expect("Should serialize");
        assert_eq!(json["model_loads"], 1);
        assert_eq!(json["model_load_failures"], 1);
        assert_eq!(json["translations"]["same"], 1);
        assert_eq!(json["translations"]["bridge"], 0);
    }
}

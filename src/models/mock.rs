//! Mock models for testing
//!
//! Deterministic, artifact-free doubles for exercising the cache, the chunked
//! translator and the bridge without downloading or running real models.
//!
//! `CharTokenizer` maps every character to its code point, so an `EchoModel`
//! reproduces its input text exactly.
//!
//! # Example
//!
//! ```ignore
//! use pivot_translate::models::{MockLoader, MockMode, ModelCache};
//!
//! let loader = Arc::new(MockLoader::new(MockMode::Identity));
//! let cache = ModelCache::new(loader.clone(), 16);
//! cache.ensure_loaded(&id).await?;
//! assert_eq!(loader.load_count(), 1);
//! ```

use super::{GenerationConfig, ModelEntry, ModelLoader, Seq2SeqModel, Seq2SeqTokenizer};
use crate::routing::ModelId;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Behaviour of the models a `MockLoader` produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockMode {
    /// Output equals input
    Identity,

    /// Output is the input with its characters reversed (per chunk)
    Reverse,

    /// Generation always fails with the given message
    FailGeneration(String),
}

/// One token per character, token id = code point.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharTokenizer;

impl Seq2SeqTokenizer for CharTokenizer {
    fn encode(&self, text: &str, max_length: usize) -> Result<Vec<u32>> {
        Ok(text.chars().take(max_length).map(u32::from).collect())
    }

    fn decode(&self, ids: &[u32]) -> Result<String> {
        ids.iter()
            .map(|&id| char::from_u32(id).ok_or_else(|| anyhow!("invalid token id {}", id)))
            .collect()
    }
}

/// Returns its input ids unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoModel;

impl Seq2SeqModel for EchoModel {
    fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> Result<Vec<u32>> {
        Ok(input_ids.iter().copied().take(config.max_length).collect())
    }
}

/// Returns its input ids in reverse order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseModel;

impl Seq2SeqModel for ReverseModel {
    fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> Result<Vec<u32>> {
        Ok(input_ids.iter().rev().copied().take(config.max_length).collect())
    }
}

/// Always fails.
#[derive(Debug, Clone)]
pub struct FailingModel {
    message: String,
}

impl FailingModel {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Seq2SeqModel for FailingModel {
    fn generate(&self, _input_ids: &[u32], _config: &GenerationConfig) -> Result<Vec<u32>> {
        bail!("{}", self.message)
    }
}

/// Loader producing mock entries and counting how often it ran.
#[derive(Debug)]
pub struct MockLoader {
    mode: MockMode,
    /// Simulated load latency
    delay: Duration,
    /// Models whose load fails
    failing: HashSet<ModelId>,
    /// Per-model mode overrides
    overrides: HashMap<ModelId, MockMode>,
    loads: AtomicUsize,
    loads_by_id: Mutex<HashMap<ModelId, usize>>,
}

impl MockLoader {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            failing: HashSet::new(),
            overrides: HashMap::new(),
            loads: AtomicUsize::new(0),
            loads_by_id: Mutex::new(HashMap::new()),
        }
    }

    pub fn identity() -> Self {
        Self::new(MockMode::Identity)
    }

    /// Sleep this long inside every load.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make loads of `model_id` fail.
    pub fn failing_on(mut self, model_id: ModelId) -> Self {
        self.failing.insert(model_id);
        self
    }

    /// Use a different mode for one model.
    pub fn with_mode_for(mut self, model_id: ModelId, mode: MockMode) -> Self {
        self.overrides.insert(model_id, mode);
        self
    }

    /// Total number of load attempts, failed ones included.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of load attempts for one model.
    pub fn loads_of(&self, model_id: &ModelId) -> usize {
        self.loads_by_id
            .lock()
            .map(|loads| loads.get(model_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn record_load(&self, model_id: &ModelId) {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut loads) = self.loads_by_id.lock() {
            *loads.entry(model_id.clone()).or_insert(0) += 1;
        }
    }
}

#[async_trait]
impl ModelLoader for MockLoader {
    async fn load(&self, model_id: &ModelId) -> Result<ModelEntry> {
        self.record_load(model_id);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.contains(model_id) {
            bail!("simulated load failure for {}", model_id);
        }

        let mode = self.overrides.get(model_id).unwrap_or(&self.mode);
        let model: Box<dyn Seq2SeqModel> = match mode {
            MockMode::Identity => Box::new(EchoModel),
            MockMode::Reverse => Box::new(ReverseModel),
            MockMode::FailGeneration(message) => Box::new(FailingModel::new(message.clone())),
        };

        Ok(ModelEntry::new(
            model_id.clone(),
            model,
            Box::new(CharTokenizer),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_tokenizer_roundtrip_unicode() {
        let tokenizer = CharTokenizer;
        let ids = tokenizer.encode("Merhaba dünya", 512).unwrap();
        assert_eq!(ids.len(), 13);
        assert_eq!(tokenizer.decode(&ids).unwrap(), "Merhaba dünya");
    }

    #[test]
    fn test_char_tokenizer_truncates() {
        let ids = CharTokenizer.encode("abcdef", 3).unwrap();
        assert_eq!(ids, vec![97, 98, 99]);
    }

    #[test]
    fn test_char_tokenizer_rejects_invalid_ids() {
        assert!(CharTokenizer.decode(&[0xD800]).is_err());
    }

    #[test]
    fn test_reverse_model() {
        let out = ReverseModel
            .generate(&[1, 2, 3], &GenerationConfig::default())
            .unwrap();
        assert_eq!(out, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_loader_counts_and_fails() {
        let bad = ModelId::new("bad");
        let good = ModelId::new("good");
        let loader = MockLoader::identity().failing_on(bad.clone());

        assert!(loader.load(&good).await.is_ok());
        assert!(loader.load(&bad).await.is_err());
        assert!(loader.load(&bad).await.is_err());

        assert_eq!(loader.load_count(), 3);
        assert_eq!(loader.loads_of(&good), 1);
        assert_eq!(loader.loads_of(&bad), 2);
    }

    #[tokio::test]
    async fn test_loader_mode_override() {
        let id = ModelId::new("broken");
        let loader = MockLoader::identity()
            .with_mode_for(id.clone(), MockMode::FailGeneration("boom".to_string()));

        let entry = loader.load(&id).await.unwrap();
        let err = entry
            .model()
            .generate(&[1], &GenerationConfig::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}

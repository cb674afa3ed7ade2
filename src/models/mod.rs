//! Pretrained sequence-to-sequence models and the process-wide model cache.
//!
//! A loaded model is a `ModelEntry`: a generator paired with its tokenizer.
//! Entries are produced by a `ModelLoader` and owned by the `ModelCache`,
//! which hands out shared, read-only `Arc<ModelEntry>` handles.
//!
//! - `cache`: lazily populated cache, at most one load in flight per model
//! - `beam`: beam search over per-step log-probabilities
//! - `fetch`: downloads model artifacts into the local models directory
//! - `marian`: Marian (OPUS-MT) loader; native inference behind the `candle` feature
//! - `mock`: deterministic test doubles

pub mod beam;
pub mod cache;
pub mod fetch;
pub mod marian;
pub mod mock;

pub use cache::ModelCache;
pub use fetch::ArtifactFetcher;
pub use marian::MarianLoader;
pub use mock::{MockLoader, MockMode};

use crate::routing::ModelId;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;

/// Fixed decoding parameters used for every chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    /// Maximum input and output length; also the chunk size in characters.
    pub max_length: usize,
    /// Beam search width.
    pub num_beams: usize,
    /// Stop as soon as `num_beams` hypotheses have finished.
    pub early_stopping: bool,
    /// Exponent applied to hypothesis length when scoring.
    pub length_penalty: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: 512,
            num_beams: 4,
            early_stopping: true,
            length_penalty: 0.6,
        }
    }
}

/// Converts between text and model token ids.
pub trait Seq2SeqTokenizer: Send + Sync {
    /// Encode one sequence, truncated to at most `max_length` ids.
    ///
    /// A single sequence is never padded; truncation keeps any end-of-sequence
    /// marker the model expects.
    fn encode(&self, text: &str, max_length: usize) -> Result<Vec<u32>>;

    /// Decode generated ids, skipping special tokens.
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

/// Runs generation for one encoded input.
pub trait Seq2SeqModel: Send + Sync {
    fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> Result<Vec<u32>>;
}

/// A loaded (model, tokenizer) pair. Immutable once built.
pub struct ModelEntry {
    id: ModelId,
    model: Box<dyn Seq2SeqModel>,
    tokenizer: Box<dyn Seq2SeqTokenizer>,
}

impl ModelEntry {
    pub fn new(
        id: ModelId,
        model: Box<dyn Seq2SeqModel>,
        tokenizer: Box<dyn Seq2SeqTokenizer>,
    ) -> Self {
        Self {
            id,
            model,
            tokenizer,
        }
    }

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    pub fn model(&self) -> &dyn Seq2SeqModel {
        self.model.as_ref()
    }

    pub fn tokenizer(&self) -> &dyn Seq2SeqTokenizer {
        self.tokenizer.as_ref()
    }
}

impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry").field("id", &self.id).finish()
    }
}

/// Builds a `ModelEntry` for a model id.
///
/// Loads are slow (artifact I/O, weight parsing); the cache guarantees a
/// loader is invoked at most once at a time for a given id.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self, model_id: &ModelId) -> Result<ModelEntry>;
}

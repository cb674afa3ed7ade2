//! Chunked translation of arbitrarily long text.
//!
//! Text is cut purely by position into pieces of at most `max_length`
//! characters; chunk `i` is characters `[i * max, (i + 1) * max)`. Word and
//! sentence boundaries are ignored on purpose, so a word straddling a boundary
//! is translated in two halves. Each chunk is encoded, generated and decoded on
//! its own, and the decoded chunks are joined with a single space.

use crate::error::TranslateError;
use crate::models::{GenerationConfig, ModelEntry};
use anyhow::Context;
use tracing::debug;

/// Split `text` into consecutive slices of at most `max_chars` characters.
///
/// Counts Unicode scalar values, never splitting inside a character. Empty
/// text yields no chunks.
///
/// # Panics
/// Panics if `max_chars` is 0.
pub fn split_chunks(text: &str, max_chars: usize) -> Vec<&str> {
    assert!(max_chars > 0, "chunk size must be at least 1");

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (offset, _) in text.char_indices() {
        if count == max_chars {
            chunks.push(&text[start..offset]);
            start = offset;
            count = 0;
        }
        count += 1;
    }

    if start < text.len() {
        chunks.push(&text[start..]);
    }

    chunks
}

/// Runs a loaded model over text chunk by chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkedTranslator {
    config: GenerationConfig,
}

impl ChunkedTranslator {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    /// Translate `text` with `entry`.
    ///
    /// Any chunk failure aborts the whole call; partial output is discarded.
    pub fn translate(&self, text: &str, entry: &ModelEntry) -> Result<String, TranslateError> {
        let chunks = split_chunks(text, self.config.max_length);
        debug!(
            "Translating {} chars in {} chunk(s) with {}",
            text.chars().count(),
            chunks.len(),
            entry.id()
        );

        let mut translated = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let output = self
                .translate_chunk(chunk, entry)
                .with_context(|| format!("chunk {} of {}", index + 1, chunks.len()))
                .map_err(|cause| TranslateError::Translation { stage: None, cause })?;
            translated.push(output);
        }

        Ok(translated.join(" "))
    }

    fn translate_chunk(&self, chunk: &str, entry: &ModelEntry) -> anyhow::Result<String> {
        let input_ids = entry
            .tokenizer()
            .encode(chunk, self.config.max_length)
            .context("Failed to encode input")?;

        let output_ids = entry
            .model()
            .generate(&input_ids, &self.config)
            .context("Generation failed")?;

        entry
            .tokenizer()
            .decode(&output_ids)
            .context("Failed to decode output")
    }
}

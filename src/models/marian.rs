//! Marian (OPUS-MT) model loader.
//!
//! Artifacts are fetched into the models directory, then the encoder-decoder
//! and its SentencePiece tokenizer are built on the blocking pool. Native
//! inference needs the `candle` cargo feature; without it a load fetches the
//! artifacts and then fails with an explanatory error.

use super::{ArtifactFetcher, ModelEntry, ModelLoader};
use crate::routing::ModelId;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// SentencePiece word-boundary marker.
const WORD_BOUNDARY: char = '\u{2581}';

pub const EOS_TOKEN: &str = "</s>";
pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";

/// Join decoded SentencePiece pieces into plain text.
#[cfg_attr(not(feature = "candle"), allow(dead_code))]
fn join_pieces<'a>(pieces: impl IntoIterator<Item = &'a str>) -> String {
    let joined: String = pieces.into_iter().collect();
    joined.replace(WORD_BOUNDARY, " ").trim().to_string()
}

pub struct MarianLoader {
    fetcher: ArtifactFetcher,
}

impl MarianLoader {
    pub fn new(fetcher: ArtifactFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ModelLoader for MarianLoader {
    async fn load(&self, model_id: &ModelId) -> Result<ModelEntry> {
        let dir = self
            .fetcher
            .ensure_local(model_id)
            .await
            .with_context(|| format!("Failed to fetch artifacts for {}", model_id))?;

        let model_id = model_id.clone();
        tokio::task::spawn_blocking(move || build_entry(model_id, dir))
            .await
            .context("Model build task panicked")?
    }
}

#[cfg(feature = "candle")]
fn build_entry(model_id: ModelId, dir: PathBuf) -> Result<ModelEntry> {
    candle_impl::build(model_id, &dir)
}

#[cfg(not(feature = "candle"))]
fn build_entry(model_id: ModelId, dir: PathBuf) -> Result<ModelEntry> {
    anyhow::bail!(
        "Cannot run {} from {}: built without the `candle` feature",
        model_id,
        display(&dir)
    )
}

fn display(dir: &Path) -> String {
    dir.display().to_string()
}

#[cfg(feature = "candle")]
mod candle_impl {
    use super::{display, join_pieces, EOS_TOKEN, PAD_TOKEN, UNK_TOKEN};
    use crate::models::beam::beam_search;
    use crate::models::{GenerationConfig, ModelEntry, Seq2SeqModel, Seq2SeqTokenizer};
    use crate::routing::ModelId;
    use anyhow::{anyhow, Context, Result};
    use candle_core::{DType, Device, IndexOp, Tensor, D};
    use candle_nn::VarBuilder;
    use candle_transformers::models::marian::{Config, MTModel};
    use sentencepiece::SentencePieceProcessor;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;
    use tracing::debug;

    pub fn build(model_id: ModelId, dir: &Path) -> Result<ModelEntry> {
        let device = Device::Cpu;

        let config: Config = serde_json::from_str(
            &std::fs::read_to_string(dir.join("config.json"))
                .with_context(|| format!("Failed to read config.json in {}", display(dir)))?,
        )
        .context("Failed to parse Marian config.json")?;

        let tensors = candle_core::safetensors::load(dir.join("model.safetensors"), &device)
            .context("Failed to load model.safetensors")?;
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let model = MTModel::new(&config, vb).context("Failed to build Marian model")?;

        let tokenizer = MarianTokenizer::open(dir)?;
        debug!(
            "Built {} ({} encoder / {} decoder layers, vocab {})",
            model_id,
            config.encoder_layers,
            config.decoder_layers,
            tokenizer.vocab.len()
        );

        let generator = MarianGenerator {
            model: Mutex::new(model),
            device,
            decoder_start_token_id: config.decoder_start_token_id,
            eos_token_id: config.eos_token_id,
            pad_token_id: config.pad_token_id,
        };

        Ok(ModelEntry::new(
            model_id,
            Box::new(generator),
            Box::new(tokenizer),
        ))
    }

    struct MarianTokenizer {
        spm: SentencePieceProcessor,
        vocab: HashMap<String, u32>,
        pieces: HashMap<u32, String>,
        eos_id: u32,
        unk_id: u32,
        pad_id: Option<u32>,
    }

    impl MarianTokenizer {
        fn open(dir: &Path) -> Result<Self> {
            let spm = SentencePieceProcessor::open(dir.join("source.spm"))
                .map_err(|e| anyhow!("Failed to open source.spm: {}", e))?;

            let vocab: HashMap<String, u32> = serde_json::from_str(
                &std::fs::read_to_string(dir.join("vocab.json")).context("Failed to read vocab.json")?,
            )
            .context("Failed to parse vocab.json")?;

            let eos_id = *vocab
                .get(EOS_TOKEN)
                .ok_or_else(|| anyhow!("vocab.json has no {} token", EOS_TOKEN))?;
            let unk_id = *vocab
                .get(UNK_TOKEN)
                .ok_or_else(|| anyhow!("vocab.json has no {} token", UNK_TOKEN))?;
            let pad_id = vocab.get(PAD_TOKEN).copied();
            let pieces = vocab.iter().map(|(piece, id)| (*id, piece.clone())).collect();

            Ok(Self {
                spm,
                vocab,
                pieces,
                eos_id,
                unk_id,
                pad_id,
            })
        }
    }

    impl Seq2SeqTokenizer for MarianTokenizer {
        fn encode(&self, text: &str, max_length: usize) -> Result<Vec<u32>> {
            let pieces = self
                .spm
                .encode(text)
                .map_err(|e| anyhow!("SentencePiece encoding failed: {}", e))?;

            let mut ids: Vec<u32> = pieces
                .iter()
                .map(|p| self.vocab.get(&p.piece).copied().unwrap_or(self.unk_id))
                .collect();
            ids.truncate(max_length.saturating_sub(1));
            ids.push(self.eos_id);
            Ok(ids)
        }

        fn decode(&self, ids: &[u32]) -> Result<String> {
            let pieces = ids
                .iter()
                .filter(|&&id| id != self.eos_id && id != self.unk_id && Some(id) != self.pad_id)
                .filter_map(|id| self.pieces.get(id).map(String::as_str));
            Ok(join_pieces(pieces))
        }
    }

    struct MarianGenerator {
        // Decoding mutates the KV cache
        model: Mutex<MTModel>,
        device: Device,
        decoder_start_token_id: u32,
        eos_token_id: u32,
        pad_token_id: u32,
    }

    impl Seq2SeqModel for MarianGenerator {
        fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> Result<Vec<u32>> {
            let mut model = self
                .model
                .lock()
                .map_err(|_| anyhow!("Marian model lock poisoned"))?;

            let input = Tensor::new(input_ids, &self.device)?.unsqueeze(0)?;
            model.reset_kv_cache();
            let encoder_xs = model.encoder().forward(&input, 0)?;

            let pad = self.pad_token_id as usize;
            beam_search(
                self.decoder_start_token_id,
                self.eos_token_id,
                config,
                |sequences| {
                    model.reset_kv_cache();
                    let batch = sequences.len();
                    let seq_len = sequences[0].len();
                    let flat: Vec<u32> = sequences.iter().flatten().copied().collect();
                    let decoder_input = Tensor::from_vec(flat, (batch, seq_len), &self.device)?;
                    let encoder_batch = Tensor::cat(&vec![&encoder_xs; batch], 0)?;

                    let logits = model.decode(&decoder_input, &encoder_batch, 0)?;
                    let last = logits.i((.., seq_len - 1, ..))?;
                    let logprobs = candle_nn::ops::log_softmax(&last, D::Minus1)?
                        .to_dtype(DType::F32)?
                        .to_vec2::<f32>()?;

                    Ok(logprobs
                        .into_iter()
                        .map(|mut row| {
                            if let Some(p) = row.get_mut(pad) {
                                *p = f32::NEG_INFINITY;
                            }
                            row
                        })
                        .collect())
                },
            )
        }
    }
}

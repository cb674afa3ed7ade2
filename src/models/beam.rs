//! Beam search decoding.
//!
//! Model-agnostic: the caller supplies a step function that, given the active
//! decoder sequences, returns one row of log-probabilities over the vocabulary
//! per sequence. Hypothesis scores are `sum_logprobs / len^length_penalty`,
//! where `len` counts the decoder start token but not the end-of-sequence token.

use super::GenerationConfig;
use anyhow::{ensure, Result};
use std::cmp::Ordering;

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    score: f32,
}

/// Finished hypotheses, best `capacity` kept.
struct Finished {
    capacity: usize,
    length_penalty: f32,
    hypotheses: Vec<Hypothesis>,
}

impl Finished {
    fn new(capacity: usize, length_penalty: f32) -> Self {
        Self {
            capacity,
            length_penalty,
            hypotheses: Vec::with_capacity(capacity + 1),
        }
    }

    fn normalize(&self, sum_logprobs: f32, len: usize) -> f32 {
        sum_logprobs / (len as f32).powf(self.length_penalty)
    }

    fn add(&mut self, tokens: Vec<u32>, sum_logprobs: f32) {
        let score = self.normalize(sum_logprobs, tokens.len());
        self.hypotheses.push(Hypothesis { tokens, score });
        self.hypotheses.sort_by(|a, b| descending(a.score, b.score));
        self.hypotheses.truncate(self.capacity);
    }

    fn is_full(&self) -> bool {
        self.hypotheses.len() >= self.capacity
    }

    fn worst_score(&self) -> f32 {
        self.hypotheses
            .last()
            .map(|h| h.score)
            .unwrap_or(f32::NEG_INFINITY)
    }

    fn best(self) -> Option<Hypothesis> {
        self.hypotheses.into_iter().next()
    }
}

fn descending(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Run beam search from `start_token` until `eos_token` or `config.max_length`.
///
/// Returns the best hypothesis without the start token and without the
/// end-of-sequence token.
pub fn beam_search<F>(
    start_token: u32,
    eos_token: u32,
    config: &GenerationConfig,
    mut step: F,
) -> Result<Vec<u32>>
where
    F: FnMut(&[Vec<u32>]) -> Result<Vec<Vec<f32>>>,
{
    let num_beams = config.num_beams.max(1);
    let max_length = config.max_length.max(2);

    let mut beams = vec![(vec![start_token], 0.0f32)];
    let mut finished = Finished::new(num_beams, config.length_penalty);
    let mut done = false;

    while !beams.is_empty() {
        let cur_len = beams[0].0.len();
        if cur_len >= max_length {
            break;
        }

        let sequences: Vec<Vec<u32>> = beams.iter().map(|(tokens, _)| tokens.clone()).collect();
        let logprobs = step(&sequences)?;
        ensure!(
            logprobs.len() == beams.len(),
            "step returned {} rows for {} beams",
            logprobs.len(),
            beams.len()
        );

        // (beam index, token, cumulative log-probability)
        let mut candidates: Vec<(usize, u32, f32)> = Vec::new();
        for (beam_idx, row) in logprobs.iter().enumerate() {
            let base = beams[beam_idx].1;
            for (token, &lp) in row.iter().enumerate() {
                if lp.is_finite() {
                    candidates.push((beam_idx, token as u32, base + lp));
                }
            }
        }
        candidates.sort_by(|a, b| descending(a.2, b.2));
        candidates.truncate(2 * num_beams);

        let mut next_beams = Vec::with_capacity(num_beams);
        for (rank, &(beam_idx, token, sum)) in candidates.iter().enumerate() {
            if token == eos_token {
                if rank < num_beams {
                    finished.add(beams[beam_idx].0.clone(), sum);
                }
            } else {
                let mut tokens = beams[beam_idx].0.clone();
                tokens.push(token);
                next_beams.push((tokens, sum));
            }
            if next_beams.len() == num_beams {
                break;
            }
        }

        if finished.is_full() {
            if config.early_stopping {
                done = true;
            } else {
                let best_active = next_beams
                    .iter()
                    .map(|(_, sum)| finished.normalize(*sum, cur_len + 1))
                    .fold(f32::NEG_INFINITY, f32::max);
                done = best_active <= finished.worst_score();
            }
        }

        beams = next_beams;
        if done {
            break;
        }
    }

    if !done {
        for (tokens, sum) in beams {
            finished.add(tokens, sum);
        }
    }

    let best = finished
        .best()
        .map(|h| h.tokens)
        .unwrap_or_else(|| vec![start_token]);
    Ok(best.into_iter().skip(1).collect())
}

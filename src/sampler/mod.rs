//! Grammar Sampling
//!
//! Rejection sampling of legal grammars from a weight vector: each parameter
//! is set to 1 independently with its weight as probability, and candidates
//! are redrawn until one is legal in the domain.
//!
//! The expected number of draws is 1 / P(legal candidate); it is unbounded in
//! principle as the weights concentrate on an illegal corner of the space, so
//! the loop carries an iteration cap and reports a stall instead of spinning
//! forever.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use crate::domain::DomainIndex;
use crate::grammar::toggled;
use crate::types::{GrammarId, DEFAULT_MAX_SAMPLE_ATTEMPTS, NUM_PARAMS};

// ==================== Errors ====================

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// No legal grammar was drawn within the attempt cap. Recoverable: the
    /// caller may retry, widen the weights, or abandon the trial.
    #[error("sampler stalled: no legal grammar after {attempts} draws")]
    Stalled { attempts: usize },
}

// ==================== Sampler ====================

/// Stochastic source of legal grammars. Owns its RNG; seedable for
/// reproducible runs.
#[derive(Clone, Debug)]
pub struct GrammarSampler {
    rng: ChaCha8Rng,
    max_attempts: usize,
}

impl GrammarSampler {
    /// Creates a sampler seeded from the system clock.
    pub fn new() -> Self {
        Self::with_seed(seed_from_time())
    }

    /// Creates a sampler with a fixed seed (for reproducibility).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            max_attempts: DEFAULT_MAX_SAMPLE_ATTEMPTS,
        }
    }

    /// Overrides the rejection-sampling attempt cap.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Draws one candidate grammar from the weights, without any legality
    /// check. Parameter `i` is set with probability `weights[i]`.
    pub fn draw_candidate(&mut self, weights: &[f64; NUM_PARAMS]) -> GrammarId {
        let mut grammar = 0;
        for (index, &weight) in weights.iter().enumerate() {
            if self.rng.gen::<f64>() < weight {
                grammar = toggled(index, grammar);
            }
        }
        grammar
    }

    /// Draws candidates until one is legal in `domain`, up to the attempt
    /// cap.
    pub fn sample(
        &mut self,
        weights: &[f64; NUM_PARAMS],
        domain: &DomainIndex,
    ) -> Result<GrammarId, SamplerError> {
        for _ in 0..self.max_attempts {
            let candidate = self.draw_candidate(weights);
            if domain.is_legal(candidate) {
                return Ok(candidate);
            }
        }
        warn!(attempts = self.max_attempts, "grammar sampler stalled");
        Err(SamplerError::Stalled {
            attempts: self.max_attempts,
        })
    }
}

impl Default for GrammarSampler {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn seed_from_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(42)
}

// ==================== Tests ====================

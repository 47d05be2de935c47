//! Variational Learner
//!
//! The learner maintains a vector of weights (one per parameter, each in the
//! open interval (0, 1), all initialized to 0.5). For every input sentence it
//! samples a hypothesis grammar from the weights, tests whether that grammar
//! licenses the sentence, and lets the active update policy nudge the
//! weights.
//!
//! A weight of 0.8 for parameter 3 means an 80% chance of picking a grammar
//! with parameter 3 set to 1; parameters are set independently.
//!
//! The update policies are data-described rather than a class hierarchy: one
//! enum selects the branch (success/failure), the per-parameter skip
//! predicate, and the rate applied to ambiguous evidence.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::DomainIndex;
use crate::grammar::{complement, grammar_from_bits, param_value};
use crate::relevance::{RelevanceString, RelevanceTable};
use crate::sampler::{seed_from_time, GrammarSampler, SamplerError};
use crate::types::{
    GrammarId, ParamMark, SentenceId, DEFAULT_CONSERVATIVE_RATE, DEFAULT_CONVERGENCE_THRESHOLD,
    DEFAULT_LEARNING_RATE, DEFAULT_MAX_SAMPLE_ATTEMPTS, DEFAULT_SENTENCE_BUDGET, NUM_PARAMS,
    WEIGHT_MARGIN,
};

// ==================== Errors ====================

#[derive(Debug, thiserror::Error)]
pub enum LearnerError {
    #[error("target language is empty")]
    EmptyTargetLanguage,

    #[error(transparent)]
    Sampler(#[from] SamplerError),
}

// ==================== Weights ====================

/// The learner's belief state: one scalar per parameter, kept strictly
/// inside (0, 1).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weights([f64; NUM_PARAMS]);

impl Weights {
    /// The uninformed starting point: every weight at 0.5.
    pub fn uniform() -> Self {
        Self([0.5; NUM_PARAMS])
    }

    /// Builds a weight vector, clamping each value into the open interval.
    pub fn new(values: [f64; NUM_PARAMS]) -> Self {
        let mut weights = Self(values);
        for i in 0..NUM_PARAMS {
            weights.0[i] = clamp_open(weights.0[i]);
        }
        weights
    }

    pub fn get(&self, index: usize) -> f64 {
        self.0[index]
    }

    pub fn as_array(&self) -> &[f64; NUM_PARAMS] {
        &self.0
    }

    /// Multiplicative reward toward bit `bit` for parameter `index`:
    /// toward 1 when the bit is set, toward 0 when it is not. The update
    /// asymptotically approaches but never reaches the endpoints; the clamp
    /// guards against float drift over long runs.
    pub fn reward(&mut self, index: usize, bit: u8, rate: f64) {
        let w = self.0[index];
        let updated = if bit == 1 {
            w + rate * (1.0 - w)
        } else {
            w - rate * w
        };
        self.0[index] = clamp_open(updated);
    }

    /// True iff every weight is within `threshold` of either endpoint.
    pub fn converged(&self, threshold: f64) -> bool {
        self.0.iter().all(|&w| w.min(1.0 - w) < threshold)
    }

    /// Rounds each weight to the nearest bit and returns the resulting
    /// grammar.
    pub fn best_guess(&self) -> GrammarId {
        let bits: Vec<u8> = self.0.iter().map(|&w| u8::from(w >= 0.5)).collect();
        grammar_from_bits(&bits)
    }
}

fn clamp_open(w: f64) -> f64 {
    w.clamp(WEIGHT_MARGIN, 1.0 - WEIGHT_MARGIN)
}

// ==================== Update policies ====================

/// Pluggable weight-update rule applied after each licensing test.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum UpdatePolicy {
    /// Reward every parameter on a successful parse; failures are ignored.
    RewardOnly,
    /// As `RewardOnly`, but parameters marked irrelevant for the sentence
    /// are skipped.
    RelevantRewardOnly,
    /// As `RelevantRewardOnly`, with ambiguous parameters updated at a
    /// reduced rate.
    SkepticalRewardOnly { conservative_rate: f64 },
    /// Ignore successes; on failure, apply the reward rule to the
    /// bit-complement of the hypothesis (push away from every bit).
    PunishOnly,
}

impl UpdatePolicy {
    /// Skeptical policy with the conventional conservative rate.
    pub fn skeptical() -> Self {
        UpdatePolicy::SkepticalRewardOnly {
            conservative_rate: DEFAULT_CONSERVATIVE_RATE,
        }
    }

    /// Whether this policy consults per-sentence relevance marks.
    pub fn needs_relevance(&self) -> bool {
        matches!(
            self,
            UpdatePolicy::RelevantRewardOnly | UpdatePolicy::SkepticalRewardOnly { .. }
        )
    }

    /// Applies one update step for hypothesis grammar `hypothesis`, given
    /// whether the parse succeeded and the sentence's relevance marks (if
    /// any).
    pub fn apply(
        &self,
        weights: &mut Weights,
        hypothesis: GrammarId,
        parsed: bool,
        relevance: Option<&RelevanceString>,
        rate: f64,
    ) {
        match *self {
            UpdatePolicy::RewardOnly => {
                if parsed {
                    reward_all(weights, hypothesis, rate);
                }
            }
            UpdatePolicy::RelevantRewardOnly => {
                if parsed {
                    reward_marked(weights, hypothesis, relevance, rate, rate);
                }
            }
            UpdatePolicy::SkepticalRewardOnly { conservative_rate } => {
                if parsed {
                    reward_marked(weights, hypothesis, relevance, rate, conservative_rate);
                }
            }
            UpdatePolicy::PunishOnly => {
                if !parsed {
                    reward_all(weights, complement(hypothesis), rate);
                }
            }
        }
    }
}

fn reward_all(weights: &mut Weights, grammar: GrammarId, rate: f64) {
    for index in 0..NUM_PARAMS {
        weights.reward(index, param_value(index, grammar), rate);
    }
}

fn reward_marked(
    weights: &mut Weights,
    grammar: GrammarId,
    relevance: Option<&RelevanceString>,
    rate: f64,
    conservative_rate: f64,
) {
    let Some(relevance) = relevance else {
        // No marks for this sentence: treat every parameter as relevant.
        reward_all(weights, grammar, rate);
        return;
    };
    for index in 0..NUM_PARAMS {
        let effective_rate = match relevance.get(index) {
            ParamMark::Irrelevant => continue,
            ParamMark::Ambiguous => conservative_rate,
            ParamMark::Zero | ParamMark::One => rate,
        };
        weights.reward(index, param_value(index, grammar), effective_rate);
    }
}

// ==================== Configuration ====================

/// Learner configuration options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LearnerOptions {
    /// Multiplicative learning rate (default: 0.0005)
    pub learning_rate: Option<f64>,
    /// Convergence threshold on the weights (default: 0.02)
    pub convergence_threshold: Option<f64>,
    /// Sentence budget before a trial is declared exhausted (default: 50000)
    pub sentence_budget: Option<usize>,
    /// Cap on rejection-sampling draws per hypothesis (default: 100000)
    pub max_sample_attempts: Option<usize>,
    /// Random seed for reproducibility (optional)
    pub seed: Option<u64>,
}

impl Default for LearnerOptions {
    fn default() -> Self {
        Self {
            learning_rate: Some(DEFAULT_LEARNING_RATE),
            convergence_threshold: Some(DEFAULT_CONVERGENCE_THRESHOLD),
            sentence_budget: Some(DEFAULT_SENTENCE_BUDGET),
            max_sample_attempts: Some(DEFAULT_MAX_SAMPLE_ATTEMPTS),
            seed: None,
        }
    }
}

// ==================== Learner ====================

/// How a learning run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// All weights crossed the convergence threshold.
    Converged,
    /// The sentence budget ran out first.
    Exhausted,
}

/// Summary of one completed run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub sentences_consumed: usize,
}

/// One variational learner: trial-local weights, a grammar sampler, and an
/// update policy, all driven by sentences from a fixed target language.
pub struct Learner<'a> {
    domain: &'a DomainIndex,
    relevance: Option<&'a RelevanceTable>,
    policy: UpdatePolicy,
    sampler: GrammarSampler,
    sentence_rng: ChaCha8Rng,
    weights: Weights,
    learning_rate: f64,
    threshold: f64,
    budget: usize,
    consumed: usize,
}

impl<'a> Learner<'a> {
    pub fn new(
        domain: &'a DomainIndex,
        relevance: Option<&'a RelevanceTable>,
        policy: UpdatePolicy,
        options: &LearnerOptions,
    ) -> Self {
        if policy.needs_relevance() && relevance.is_none() {
            warn!(?policy, "policy consults relevance marks but no table was provided");
        }
        let seed = options.seed.unwrap_or_else(seed_from_time);
        let max_attempts = options
            .max_sample_attempts
            .unwrap_or(DEFAULT_MAX_SAMPLE_ATTEMPTS);
        Self {
            domain,
            relevance,
            policy,
            sampler: GrammarSampler::with_seed(seed).with_max_attempts(max_attempts),
            // Separate stream for sentence selection so grammar draws and
            // sentence draws do not interleave on one generator.
            sentence_rng: ChaCha8Rng::seed_from_u64(seed ^ 0x5157_5345_4e54_534du64),
            weights: Weights::uniform(),
            learning_rate: options.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE),
            threshold: options
                .convergence_threshold
                .unwrap_or(DEFAULT_CONVERGENCE_THRESHOLD),
            budget: options.sentence_budget.unwrap_or(DEFAULT_SENTENCE_BUDGET),
            consumed: 0,
        }
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn sentences_consumed(&self) -> usize {
        self.consumed
    }

    pub fn converged(&self) -> bool {
        self.weights.converged(self.threshold)
    }

    /// Rounds the current weights to the nearest grammar.
    pub fn best_guess(&self) -> GrammarId {
        self.weights.best_guess()
    }

    /// Samples one hypothesis grammar from the current weights.
    pub fn sample_hypothesis(&mut self) -> Result<GrammarId, SamplerError> {
        self.sampler.sample(self.weights.as_array(), self.domain)
    }

    /// Processes one sentence known to exist in the target language: sample
    /// a hypothesis, test licensing, apply the update policy. Returns
    /// whether the hypothesis parsed the sentence.
    pub fn consume(&mut self, sentence: SentenceId) -> Result<bool, SamplerError> {
        let hypothesis = self.sample_hypothesis()?;
        let parsed = self.domain.licenses(hypothesis, sentence);
        let relevance = self.relevance.and_then(|table| table.get(sentence));
        self.policy
            .apply(&mut self.weights, hypothesis, parsed, relevance, self.learning_rate);
        self.consumed += 1;
        Ok(parsed)
    }

    /// Draws sentences uniformly with replacement from `target_language`
    /// until the weights converge or the sentence budget is exhausted.
    pub fn run(&mut self, target_language: &[SentenceId]) -> Result<RunSummary, LearnerError> {
        if target_language.is_empty() {
            return Err(LearnerError::EmptyTargetLanguage);
        }
        while !self.converged() && self.consumed < self.budget {
            let sentence = target_language[self.sentence_rng.gen_range(0..target_language.len())];
            self.consume(sentence)?;
        }
        let status = if self.converged() {
            RunStatus::Converged
        } else {
            RunStatus::Exhausted
        };
        debug!(?status, sentences = self.consumed, "learning run finished");
        Ok(RunSummary {
            status,
            sentences_consumed: self.consumed,
        })
    }
}

// ==================== Tests ====================

//! Trial Running and Aggregation
//!
//! A trial is one independent learning run: fresh weights, its own random
//! stream, one target grammar. Trials are embarrassingly parallel once the
//! shared domain index is built, so batches can run sequentially or on the
//! rayon thread pool; each trial derives an independent seed so parallel
//! outcomes stay uncorrelated.

use std::io::Write;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::DomainIndex;
use crate::grammar::grammar_string;
use crate::learner::{Learner, LearnerError, LearnerOptions, RunStatus, UpdatePolicy};
use crate::relevance::RelevanceTable;
use crate::sampler::seed_from_time;
use crate::types::{GrammarId, SentenceId, NUM_PARAMS};

// ==================== Errors ====================

#[derive(Debug, thiserror::Error)]
pub enum TrialError {
    #[error("target grammar {0} is not a legal grammar in this domain")]
    IllegalTarget(GrammarId),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ==================== Outcomes ====================

/// One row of trial output, for downstream analysis.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrialOutcome {
    /// Target grammar the trial tried to learn
    pub target: GrammarId,
    /// Trial index within its batch
    pub trial: usize,
    /// Sentences consumed before the run ended
    pub sentences: usize,
    /// Final hypothesis grammar sampled from the converged weights
    pub hypothesis: GrammarId,
    /// Bit-string rendering of the final hypothesis
    pub hypothesis_bits: String,
    /// Final weight vector
    pub weights: Vec<f64>,
    /// Whether the weights converged before the budget ran out
    pub converged: bool,
    /// Wall-clock duration of the trial in seconds
    pub elapsed_secs: f64,
}

impl TrialOutcome {
    /// Renders the outcome as one tab-separated row (see [`write_tsv`]).
    pub fn tsv_row(&self) -> String {
        let weights: Vec<String> = self.weights.iter().map(|w| w.to_string()).collect();
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.6}",
            self.target,
            self.trial,
            self.sentences,
            self.hypothesis,
            self.hypothesis_bits,
            weights.join("\t"),
            self.converged,
            self.elapsed_secs
        )
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Aggregated outcomes for one target grammar. Trials that failed (for
/// example a stalled sampler) are counted but abort only themselves.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TargetReport {
    pub target: GrammarId,
    pub outcomes: Vec<TrialOutcome>,
    pub failed_trials: usize,
}

impl TargetReport {
    pub fn converged_trials(&self) -> usize {
        self.outcomes.iter().filter(|o| o.converged).count()
    }

    /// Mean sentence count over completed trials; `None` when every trial
    /// failed.
    pub fn mean_sentences(&self) -> Option<f64> {
        if self.outcomes.is_empty() {
            return None;
        }
        let total: usize = self.outcomes.iter().map(|o| o.sentences).sum();
        Some(total as f64 / self.outcomes.len() as f64)
    }
}

/// Writes outcomes as tab-separated rows with a header. The sink is borrowed
/// exclusively, so concurrent producers must hand their outcomes to a single
/// writer.
pub fn write_tsv<W: Write>(outcomes: &[TrialOutcome], sink: &mut W) -> Result<(), TrialError> {
    let weight_cols: Vec<String> = (0..NUM_PARAMS).map(|i| format!("w{}", i)).collect();
    writeln!(
        sink,
        "target\ttrial\tsentences\thypothesis\thypothesis_bits\t{}\tconverged\telapsed_secs",
        weight_cols.join("\t")
    )?;
    for outcome in outcomes {
        writeln!(sink, "{}", outcome.tsv_row())?;
    }
    Ok(())
}

// ==================== Runner ====================

/// Repeats independent learning trials for one or more target grammars.
pub struct TrialRunner<'a> {
    domain: &'a DomainIndex,
    relevance: Option<&'a RelevanceTable>,
    policy: UpdatePolicy,
    options: LearnerOptions,
    trials: usize,
    base_seed: u64,
}

impl<'a> TrialRunner<'a> {
    pub fn new(
        domain: &'a DomainIndex,
        relevance: Option<&'a RelevanceTable>,
        policy: UpdatePolicy,
        options: LearnerOptions,
        trials: usize,
    ) -> Self {
        let base_seed = options.seed.unwrap_or_else(seed_from_time);
        Self {
            domain,
            relevance,
            policy,
            options,
            trials,
            base_seed,
        }
    }

    /// Runs the configured number of trials for `target`, sequentially.
    pub fn run_target(&self, target: GrammarId) -> Result<TargetReport, TrialError> {
        let language = self.target_language(target)?;
        let results: Vec<Result<TrialOutcome, LearnerError>> = (0..self.trials)
            .map(|trial| self.run_one(target, &language, trial))
            .collect();
        Ok(self.collect_report(target, results))
    }

    /// Runs the trials for `target` on the rayon thread pool. Each trial
    /// owns its weights and random stream, so the only shared state is the
    /// read-only domain.
    pub fn run_target_parallel(&self, target: GrammarId) -> Result<TargetReport, TrialError> {
        let language = self.target_language(target)?;
        let results: Vec<Result<TrialOutcome, LearnerError>> = (0..self.trials)
            .into_par_iter()
            .map(|trial| self.run_one(target, &language, trial))
            .collect();
        Ok(self.collect_report(target, results))
    }

    /// Runs every target in order, sequentially per target.
    pub fn run_targets(&self, targets: &[GrammarId]) -> Result<Vec<TargetReport>, TrialError> {
        targets.iter().map(|&t| self.run_target(t)).collect()
    }

    fn target_language(&self, target: GrammarId) -> Result<Vec<SentenceId>, TrialError> {
        let language = self.domain.language_sorted(target);
        if language.is_empty() {
            return Err(TrialError::IllegalTarget(target));
        }
        Ok(language)
    }

    fn run_one(
        &self,
        target: GrammarId,
        language: &[SentenceId],
        trial: usize,
    ) -> Result<TrialOutcome, LearnerError> {
        let options = LearnerOptions {
            seed: Some(trial_seed(self.base_seed, target, trial)),
            ..self.options.clone()
        };
        let mut learner = Learner::new(self.domain, self.relevance, self.policy, &options);

        let start = Instant::now();
        let summary = learner.run(language)?;
        let hypothesis = learner.sample_hypothesis()?;
        let elapsed_secs = start.elapsed().as_secs_f64();

        Ok(TrialOutcome {
            target,
            trial,
            sentences: summary.sentences_consumed,
            hypothesis,
            hypothesis_bits: grammar_string(hypothesis),
            weights: learner.weights().as_array().to_vec(),
            converged: summary.status == RunStatus::Converged,
            elapsed_secs,
        })
    }

    fn collect_report(
        &self,
        target: GrammarId,
        results: Vec<Result<TrialOutcome, LearnerError>>,
    ) -> TargetReport {
        let mut outcomes = Vec::with_capacity(results.len());
        let mut failed_trials = 0;
        for result in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    failed_trials += 1;
                    warn!(grammar = target, %err, "trial aborted");
                }
            }
        }
        info!(
            grammar = target,
            completed = outcomes.len(),
            failed = failed_trials,
            "target batch finished"
        );
        TargetReport {
            target,
            outcomes,
            failed_trials,
        }
    }
}

/// Derives an independent per-trial seed from the batch seed (splitmix64
/// finalizer over the batch seed, target, and trial index).
fn trial_seed(base: u64, target: GrammarId, trial: usize) -> u64 {
    let mut z = base
        .wrapping_add(u64::from(target).wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add((trial as u64 + 1).wrapping_mul(0xBF58_476D_1CE4_E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::ALL_ONES;
    use crate::types::StructureId;

    fn two_grammar_domain() -> DomainIndex {
        let triples: Vec<(GrammarId, SentenceId, StructureId)> =
            vec![(0, 10, 1), (0, 11, 1), (ALL_ONES, 12, 1)];
        DomainIndex::from_triples(triples)
    }

    fn fast_options(seed: u64) -> LearnerOptions {
        LearnerOptions {
            learning_rate: Some(0.01),
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_run_target_produces_one_outcome_per_trial() {
        let domain = two_grammar_domain();
        let runner = TrialRunner::new(&domain, None, UpdatePolicy::RewardOnly, fast_options(42), 3);
        let report = runner.run_target(0).unwrap();
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failed_trials, 0);
        assert_eq!(report.converged_trials(), 3);
        for (i, outcome) in report.outcomes.iter().enumerate() {
            assert_eq!(outcome.trial, i);
            assert_eq!(outcome.target, 0);
            assert_eq!(outcome.hypothesis, 0);
            assert_eq!(outcome.hypothesis_bits, "0000000000000");
            assert_eq!(outcome.weights.len(), NUM_PARAMS);
            assert!(outcome.converged);
        }
        assert!(report.mean_sentences().unwrap() > 0.0);
    }

    #[test]
    fn test_illegal_target_is_rejected() {
        let domain = two_grammar_domain();
        let runner = TrialRunner::new(&domain, None, UpdatePolicy::RewardOnly, fast_options(42), 2);
        assert!(matches!(runner.run_target(7), Err(TrialError::IllegalTarget(7))));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        // Per-trial seeds depend only on (base seed, target, trial index),
        // so the execution schedule cannot change the outcomes.
        let domain = two_grammar_domain();
        let runner = TrialRunner::new(&domain, None, UpdatePolicy::RewardOnly, fast_options(42), 4);
        let sequential = runner.run_target(0).unwrap();
        let parallel = runner.run_target_parallel(0).unwrap();
        assert_eq!(sequential.outcomes.len(), parallel.outcomes.len());
        for (a, b) in sequential.outcomes.iter().zip(&parallel.outcomes) {
            assert_eq!(a.sentences, b.sentences);
            assert_eq!(a.hypothesis, b.hypothesis);
            assert_eq!(a.weights, b.weights);
        }
    }

    #[test]
    fn test_trial_seeds_are_distinct() {
        let mut seeds = Vec::new();
        for target in [0u16, 611] {
            for trial in 0..50 {
                seeds.push(trial_seed(42, target, trial));
            }
        }
        seeds.sort_unstable();
        seeds.dedup();
        assert_eq!(seeds.len(), 100, "per-trial seeds must not collide");
    }

    #[test]
    fn test_run_targets_covers_each_target() {
        let domain = two_grammar_domain();
        let runner = TrialRunner::new(&domain, None, UpdatePolicy::RewardOnly, fast_options(1), 2);
        let reports = runner.run_targets(&[0, ALL_ONES]).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].target, 0);
        assert_eq!(reports[1].target, ALL_ONES);
    }

    #[test]
    fn test_write_tsv_shape() {
        let domain = two_grammar_domain();
        let runner = TrialRunner::new(&domain, None, UpdatePolicy::RewardOnly, fast_options(5), 2);
        let report = runner.run_target(0).unwrap();
        let mut buffer = Vec::new();
        write_tsv(&report.outcomes, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3, "header plus one row per trial");
        let header_cols = lines[0].split('\t').count();
        for row in &lines[1..] {
            assert_eq!(row.split('\t').count(), header_cols, "ragged row: {}", row);
        }
        assert!(lines[0].starts_with("target\ttrial\tsentences"));
    }

    #[test]
    fn test_outcome_json_round_trip() {
        let outcome = TrialOutcome {
            target: 611,
            trial: 0,
            sentences: 1234,
            hypothesis: 611,
            hypothesis_bits: grammar_string(611),
            weights: vec![0.01; NUM_PARAMS],
            converged: true,
            elapsed_secs: 0.5,
        };
        let parsed: TrialOutcome = serde_json::from_str(&outcome.to_json()).unwrap();
        assert_eq!(parsed.target, 611);
        assert_eq!(parsed.weights.len(), NUM_PARAMS);
    }

    #[test]
    fn test_stalled_trials_abort_only_themselves() {
        // A domain whose only legal grammar is far from the forced corner:
        // with a tiny attempt cap the sampler can stall, but the report
        // still accounts for every trial.
        let domain = two_grammar_domain();
        let options = LearnerOptions {
            learning_rate: Some(0.01),
            max_sample_attempts: Some(1),
            seed: Some(42),
            ..Default::default()
        };
        let runner = TrialRunner::new(&domain, None, UpdatePolicy::RewardOnly, options, 3);
        let report = runner.run_target(0).unwrap();
        assert_eq!(report.outcomes.len() + report.failed_trials, 3);
    }
}

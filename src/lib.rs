//! # colag-vl - Variational Language Learner over the CoLAG domain
//!
//! This crate simulates language acquisition under the Variational Learning
//! model. A learner maintains probabilistic weights over 13 binary syntactic
//! parameters and updates them based on whether randomly sampled hypothesis
//! grammars license sentences drawn from a target language. The domain is
//! the CoLAG database: for the fixed 13-parameter space it enumerates every
//! legal grammar (3072 of the 8192 possible assignments in the reference
//! corpus) and the sentences each licenses.
//!
//! ## Module structure
//!
//! - [`grammar`] - bit-level grammar helpers (the canonical parameter/bit
//!   convention lives here)
//! - [`domain`] - the immutable grammar/sentence licensing index
//! - [`relevance`] - per-sentence parameter relevance classification
//! - [`sampler`] - rejection sampling of legal grammars from a weight vector
//! - [`learner`] - weight vector, update policies, and the learning loop
//! - [`trial`] - repeated independent trials and tabular output
//! - [`types`] - shared constants and identifiers
//!
//! ## Usage example
//!
//! ```rust
//! use colag_vl::{DomainIndex, Learner, LearnerOptions, RunStatus, UpdatePolicy};
//!
//! // A toy domain with two legal grammars: 0 licenses {10, 11},
//! // 8191 licenses {12}.
//! let domain = DomainIndex::from_triples(vec![
//!     (0, 10, 1),
//!     (0, 11, 1),
//!     (8191, 12, 1),
//! ]);
//!
//! let options = LearnerOptions {
//!     learning_rate: Some(0.01),
//!     seed: Some(42),
//!     ..Default::default()
//! };
//! let mut learner = Learner::new(&domain, None, UpdatePolicy::RewardOnly, &options);
//! let summary = learner.run(&domain.language_sorted(0)).unwrap();
//! assert_eq!(summary.status, RunStatus::Converged);
//! assert_eq!(learner.best_guess(), 0);
//! ```

// ============================================================================
// Module declarations
// ============================================================================

pub mod domain;
pub mod grammar;
pub mod learner;
pub mod relevance;
pub mod sampler;
pub mod trial;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use domain::{DomainError, DomainIndex};
pub use learner::{
    Learner, LearnerError, LearnerOptions, RunStatus, RunSummary, UpdatePolicy, Weights,
};
pub use relevance::{
    RelevanceClassifier, RelevanceError, RelevanceString, RelevanceTable, SymbolConvention,
    WitnessRule,
};
pub use sampler::{GrammarSampler, SamplerError};
pub use trial::{write_tsv, TargetReport, TrialError, TrialOutcome, TrialRunner};
pub use types::{
    GrammarId, ParamMark, SentenceId, StructureId, NUM_GRAMMARS, NUM_PARAMS,
    REFERENCE_GRAMMAR_COUNT, REFERENCE_SENTENCE_COUNT,
};

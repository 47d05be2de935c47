//! Common Types and Constants
//!
//! Shared data structures and constants used across all modules.

use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Number of binary syntactic parameters in the domain
pub const NUM_PARAMS: usize = 13;

/// Total number of parameter assignments (2^13)
pub const NUM_GRAMMARS: usize = 1 << NUM_PARAMS;

/// Default multiplicative learning rate
pub const DEFAULT_LEARNING_RATE: f64 = 0.0005;

/// Default conservative learning rate for ambiguous evidence
pub const DEFAULT_CONSERVATIVE_RATE: f64 = 0.0001;

/// Default convergence threshold: all weights within this distance of 0 or 1
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 0.02;

/// Default number of sentences consumed before a trial is declared exhausted
pub const DEFAULT_SENTENCE_BUDGET: usize = 50_000;

/// Default cap on rejection-sampling draws before the sampler reports a stall
pub const DEFAULT_MAX_SAMPLE_ATTEMPTS: usize = 100_000;

/// Weights live in the open interval (0, 1); this margin guards against
/// floating-point drift onto the endpoints
pub const WEIGHT_MARGIN: f64 = 1e-12;

/// Grammar count of the reference corpus
pub const REFERENCE_GRAMMAR_COUNT: usize = 3072;

/// Sentence count of the reference corpus
pub const REFERENCE_SENTENCE_COUNT: usize = 48077;

// ==================== Identifiers ====================

/// A grammar: a full 13-parameter assignment, bit-encoded in [0, 8192)
pub type GrammarId = u16;

/// An abstract surface form licensed by one or more grammars
pub type SentenceId = u32;

/// Distinguishes distinct parses of the same (grammar, sentence) pair
pub type StructureId = u32;

// ==================== Relevance marks ====================

/// How one parameter's value relates to a sentence's licensability.
///
/// - `Zero` / `One`: every licensing grammar agrees on this value.
/// - `Irrelevant`: licensors disagree, and toggling the parameter alone never
///   escapes the licensing set through a legal grammar; the parameter is
///   immaterial to parseability.
/// - `Ambiguous`: licensors disagree, and some licensor has a legal single-bit
///   neighbor that does not license the sentence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamMark {
    Zero,
    One,
    Irrelevant,
    Ambiguous,
}

impl ParamMark {
    /// Definite mark for a bit value.
    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 {
            ParamMark::Zero
        } else {
            ParamMark::One
        }
    }

    /// Returns the bit value for definite marks, `None` otherwise.
    pub fn definite_bit(&self) -> Option<u8> {
        match self {
            ParamMark::Zero => Some(0),
            ParamMark::One => Some(1),
            _ => None,
        }
    }

    pub fn is_definite(&self) -> bool {
        self.definite_bit().is_some()
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(NUM_PARAMS, 13);
        assert_eq!(NUM_GRAMMARS, 8192);
        assert!(DEFAULT_CONSERVATIVE_RATE < DEFAULT_LEARNING_RATE);
        assert!(WEIGHT_MARGIN > 0.0);
        assert!(WEIGHT_MARGIN < DEFAULT_CONVERGENCE_THRESHOLD);
    }

    #[test]
    fn test_param_mark_from_bit() {
        assert_eq!(ParamMark::from_bit(0), ParamMark::Zero);
        assert_eq!(ParamMark::from_bit(1), ParamMark::One);
    }

    #[test]
    fn test_param_mark_definite() {
        assert_eq!(ParamMark::Zero.definite_bit(), Some(0));
        assert_eq!(ParamMark::One.definite_bit(), Some(1));
        assert_eq!(ParamMark::Irrelevant.definite_bit(), None);
        assert_eq!(ParamMark::Ambiguous.definite_bit(), None);
        assert!(ParamMark::Zero.is_definite());
        assert!(!ParamMark::Ambiguous.is_definite());
    }
}

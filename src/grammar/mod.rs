//! Grammar Bit Arithmetic
//!
//! A grammar is a 13-parameter binary assignment encoded as an integer.
//!
//! Canonical bit convention: parameter `i` occupies bit `12 - i` of the
//! integer, so the 13-character bit string produced by [`grammar_string`]
//! reads parameters left to right in index order. Every component that
//! touches parameter indices (classifier, sampler, weight updates, printing)
//! shares this convention; the tests below pin it down.

use rand::Rng;

use crate::types::{GrammarId, NUM_PARAMS};

/// The all-ones grammar (every parameter set to 1)
pub const ALL_ONES: GrammarId = (1 << NUM_PARAMS as u16) - 1;

/// Returns the value (0 or 1) of parameter `index` in `grammar`.
pub fn param_value(index: usize, grammar: GrammarId) -> u8 {
    debug_assert!(index < NUM_PARAMS);
    ((grammar >> (NUM_PARAMS - 1 - index)) & 1) as u8
}

/// Returns `grammar` with parameter `index` toggled.
pub fn toggled(index: usize, grammar: GrammarId) -> GrammarId {
    debug_assert!(index < NUM_PARAMS);
    grammar ^ (1 << (NUM_PARAMS - 1 - index))
}

/// Returns the grammar with every parameter flipped.
pub fn complement(grammar: GrammarId) -> GrammarId {
    grammar ^ ALL_ONES
}

/// Renders a grammar as its 13-character bit string, parameter 0 first.
pub fn grammar_string(grammar: GrammarId) -> String {
    format!("{:013b}", grammar)
}

/// Folds a slice of 13 bit values (parameter 0 first) back into a grammar.
pub fn grammar_from_bits(bits: &[u8]) -> GrammarId {
    debug_assert_eq!(bits.len(), NUM_PARAMS);
    bits.iter()
        .fold(0, |acc, &bit| (acc << 1) | GrammarId::from(bit & 1))
}

/// Number of parameters on which two grammars differ.
pub fn hamming_distance(g1: GrammarId, g2: GrammarId) -> u32 {
    (g1 ^ g2).count_ones()
}

/// Toggles each parameter independently with probability `rate`.
pub fn mutate<R: Rng>(rng: &mut R, rate: f64, grammar: GrammarId) -> GrammarId {
    let mut result = grammar;
    for index in 0..NUM_PARAMS {
        if rng.gen::<f64>() < rate {
            result = toggled(index, result);
        }
    }
    result
}

// ==================== Tests ====================

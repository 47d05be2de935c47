//! Relevance Classification
//!
//! For each sentence, every parameter is summarized by a [`ParamMark`]: a
//! definite 0/1 when all licensing grammars agree on it, irrelevant when
//! toggling it alone never escapes the licensing set through a legal grammar,
//! and ambiguous when some licensor has a legal single-bit neighbor that
//! fails to license the sentence.
//!
//! Two historical text conventions exist for the non-definite marks; both are
//! supported as explicit [`SymbolConvention`]s applied only when parsing or
//! rendering strings. Internally everything works on typed marks, so files in
//! either convention interoperate.

use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, Write};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{DomainError, DomainIndex};
use crate::grammar::{param_value, toggled};
use crate::types::{GrammarId, ParamMark, SentenceId, NUM_PARAMS};

// ==================== Errors ====================

#[derive(Debug, thiserror::Error)]
pub enum RelevanceError {
    #[error("relevance string must be {expected} characters, got {found}")]
    BadLength { expected: usize, found: usize },

    #[error("invalid relevance mark {0:?}")]
    BadMark(char),

    #[error("malformed relevance row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ==================== Symbol conventions ====================

/// Which character denotes "irrelevant" versus "ambiguous" in rendered
/// relevance strings. Source corpora disagree, so the choice is explicit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolConvention {
    /// `~` marks irrelevant parameters, `*` marks ambiguous ones.
    #[default]
    TildeIrrelevant,
    /// `*` marks irrelevant parameters, `~` marks ambiguous ones.
    StarIrrelevant,
}

impl SymbolConvention {
    pub fn render(&self, mark: ParamMark) -> char {
        match (self, mark) {
            (_, ParamMark::Zero) => '0',
            (_, ParamMark::One) => '1',
            (SymbolConvention::TildeIrrelevant, ParamMark::Irrelevant) => '~',
            (SymbolConvention::TildeIrrelevant, ParamMark::Ambiguous) => '*',
            (SymbolConvention::StarIrrelevant, ParamMark::Irrelevant) => '*',
            (SymbolConvention::StarIrrelevant, ParamMark::Ambiguous) => '~',
        }
    }

    pub fn interpret(&self, c: char) -> Result<ParamMark, RelevanceError> {
        match (self, c) {
            (_, '0') => Ok(ParamMark::Zero),
            (_, '1') => Ok(ParamMark::One),
            (SymbolConvention::TildeIrrelevant, '~') => Ok(ParamMark::Irrelevant),
            (SymbolConvention::TildeIrrelevant, '*') => Ok(ParamMark::Ambiguous),
            (SymbolConvention::StarIrrelevant, '*') => Ok(ParamMark::Irrelevant),
            (SymbolConvention::StarIrrelevant, '~') => Ok(ParamMark::Ambiguous),
            (_, other) => Err(RelevanceError::BadMark(other)),
        }
    }
}

// ==================== Relevance strings ====================

/// Per-sentence summary of how each of the 13 parameters relates to the
/// sentence's licensability, in canonical parameter order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceString {
    marks: [ParamMark; NUM_PARAMS],
}

impl RelevanceString {
    pub fn new(marks: [ParamMark; NUM_PARAMS]) -> Self {
        Self { marks }
    }

    pub fn get(&self, index: usize) -> ParamMark {
        self.marks[index]
    }

    pub fn marks(&self) -> &[ParamMark; NUM_PARAMS] {
        &self.marks
    }

    /// True when every parameter carries a definite 0/1 mark.
    pub fn is_fully_definite(&self) -> bool {
        self.marks.iter().all(|m| m.is_definite())
    }

    /// True when every definite mark agrees with the corresponding parameter
    /// of `grammar`.
    pub fn matches_grammar(&self, grammar: GrammarId) -> bool {
        self.marks.iter().enumerate().all(|(i, mark)| {
            mark.definite_bit()
                .map_or(true, |bit| bit == param_value(i, grammar))
        })
    }

    pub fn render(&self, convention: SymbolConvention) -> String {
        self.marks.iter().map(|&m| convention.render(m)).collect()
    }

    pub fn parse(s: &str, convention: SymbolConvention) -> Result<Self, RelevanceError> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != NUM_PARAMS {
            return Err(RelevanceError::BadLength {
                expected: NUM_PARAMS,
                found: chars.len(),
            });
        }
        let mut marks = [ParamMark::Irrelevant; NUM_PARAMS];
        for (i, &c) in chars.iter().enumerate() {
            marks[i] = convention.interpret(c)?;
        }
        Ok(Self { marks })
    }
}

impl fmt::Display for RelevanceString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(SymbolConvention::default()))
    }
}

// ==================== Witness strategies ====================

/// Which legal single-bit neighbors count as evidence that a disagreeing
/// parameter is ambiguous rather than irrelevant. The plain minimal-pair rule
/// is the default; the other two make historically competing definitions
/// explicit. On a fully consistent domain all three coincide, because a
/// grammar whose language contains (or equals) a licensor's language must
/// itself license the sentence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessRule {
    /// Any legal neighbor outside the licensing set is a witness.
    #[default]
    InDomain,
    /// Neighbors whose language strictly contains the licensor's language are
    /// not admitted as witnesses.
    ExcludingSupersets,
    /// Neighbors weakly equivalent to the licensor (identical language) are
    /// not admitted as witnesses.
    ExcludingWeakEquivalents,
}

impl WitnessRule {
    /// Whether `witness` may serve as an ambiguity witness against
    /// `licensor`. Legality and non-membership in the licensing set are
    /// checked by the caller.
    pub fn admits(&self, domain: &DomainIndex, licensor: GrammarId, witness: GrammarId) -> bool {
        match self {
            WitnessRule::InDomain => true,
            WitnessRule::ExcludingSupersets => {
                let licensor_language = domain.language(licensor);
                let witness_language = domain.language(witness);
                !(witness_language.len() > licensor_language.len()
                    && licensor_language.is_subset(witness_language))
            }
            WitnessRule::ExcludingWeakEquivalents => {
                domain.language(licensor) != domain.language(witness)
            }
        }
    }
}

// ==================== Classifier ====================

/// Computes relevance strings from the full licensing-grammar set of a
/// sentence. The result depends only on that set, never on the order the
/// corpus listed its triples.
#[derive(Clone, Copy, Debug, Default)]
pub struct RelevanceClassifier {
    witness_rule: WitnessRule,
}

impl RelevanceClassifier {
    pub fn new(witness_rule: WitnessRule) -> Self {
        Self { witness_rule }
    }

    pub fn witness_rule(&self) -> WitnessRule {
        self.witness_rule
    }

    /// Classifies one sentence. Errors only when the sentence is unknown to
    /// the domain.
    pub fn classify(
        &self,
        domain: &DomainIndex,
        sentence: SentenceId,
    ) -> Result<RelevanceString, DomainError> {
        let licensors = domain.licensors(sentence)?;

        // Definite marks where all licensors agree; tentatively irrelevant
        // elsewhere.
        let mut marks = [ParamMark::Irrelevant; NUM_PARAMS];
        for (index, mark) in marks.iter_mut().enumerate() {
            let mut seen_zero = false;
            let mut seen_one = false;
            for &grammar in licensors {
                if param_value(index, grammar) == 1 {
                    seen_one = true;
                } else {
                    seen_zero = true;
                }
                if seen_zero && seen_one {
                    break;
                }
            }
            *mark = match (seen_zero, seen_one) {
                (true, false) => ParamMark::Zero,
                (false, true) => ParamMark::One,
                _ => ParamMark::Irrelevant,
            };
        }

        // A tentative mark becomes ambiguous as soon as one licensor has an
        // admissible legal minimal pair outside the licensing set.
        for index in 0..NUM_PARAMS {
            if marks[index] != ParamMark::Irrelevant {
                continue;
            }
            for &grammar in licensors {
                let neighbor = toggled(index, grammar);
                if domain.is_legal(neighbor)
                    && !licensors.contains(&neighbor)
                    && self.witness_rule.admits(domain, grammar, neighbor)
                {
                    marks[index] = ParamMark::Ambiguous;
                    break;
                }
            }
        }

        Ok(RelevanceString::new(marks))
    }

    /// Classifies every sentence in the domain in parallel.
    pub fn classify_all(&self, domain: &DomainIndex) -> Result<RelevanceTable, DomainError> {
        let sentences: Vec<SentenceId> = domain.sentences().collect();
        let entries = sentences
            .into_par_iter()
            .map(|sentence| Ok((sentence, self.classify(domain, sentence)?)))
            .collect::<Result<HashMap<_, _>, DomainError>>()?;
        debug!(sentences = entries.len(), "relevance table computed");
        Ok(RelevanceTable { entries })
    }
}

// ==================== Relevance table ====================

/// Sentence id -> relevance string, either computed by the classifier or
/// ingested from a precomputed file. Read-only once built.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RelevanceTable {
    entries: HashMap<SentenceId, RelevanceString>,
}

impl RelevanceTable {
    /// Loads `sentenceId <whitespace> 13-char-string` rows, interpreting
    /// marks under `convention`.
    pub fn from_reader<R: BufRead>(
        reader: R,
        convention: SymbolConvention,
    ) -> Result<Self, RelevanceError> {
        let mut entries = HashMap::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (sid, marks) = match (fields.next(), fields.next()) {
                (Some(sid), Some(marks)) => (sid, marks),
                _ => {
                    return Err(RelevanceError::MalformedRow {
                        line: lineno + 1,
                        reason: "expected sentence id and relevance string".to_string(),
                    })
                }
            };
            let sentence: SentenceId =
                sid.parse().map_err(|_| RelevanceError::MalformedRow {
                    line: lineno + 1,
                    reason: format!("invalid sentence id {:?}", sid),
                })?;
            entries.insert(sentence, RelevanceString::parse(marks, convention)?);
        }
        Ok(Self { entries })
    }

    /// Writes `sentenceId \t string` rows sorted by sentence id.
    pub fn write_to<W: Write>(
        &self,
        sink: &mut W,
        convention: SymbolConvention,
    ) -> Result<(), RelevanceError> {
        let mut sentences: Vec<SentenceId> = self.entries.keys().copied().collect();
        sentences.sort_unstable();
        for sentence in sentences {
            writeln!(sink, "{}\t{}", sentence, self.entries[&sentence].render(convention))?;
        }
        Ok(())
    }

    pub fn get(&self, sentence: SentenceId) -> Option<&RelevanceString> {
        self.entries.get(&sentence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==================== Tests ====================

//! CoLAG Domain Index
//!
//! The domain is a combinatorial database enumerating, for the fixed
//! 13-parameter space, every legal grammar and the sentences each licenses.
//! It is built once from (grammar, sentence, structure) triples and is
//! read-only afterwards, so it can be shared freely across threads.
//!
//! Core queries:
//! - `is_legal(g)`: O(1) membership in the legal-grammar set
//! - `licenses(g, s)`: O(1); false (not an error) for grammars with no entries
//! - `language(g)`: licensed sentence set; empty for illegal grammars
//! - `licensors(s)`: fails only for sentence ids the corpus never saw

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use tracing::info;

use crate::types::{GrammarId, SentenceId, StructureId, NUM_GRAMMARS};

// ==================== Errors ====================

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// The corpus never mentioned this sentence id. Distinct from an empty
    /// licensor set, which cannot occur for a known sentence.
    #[error("unknown sentence id {0}")]
    UnknownSentence(SentenceId),

    #[error("malformed corpus row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("corpus shape mismatch: {0}")]
    CorpusShape(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ==================== Domain index ====================

/// Immutable bidirectional index between grammars and the sentences they
/// license.
#[derive(Clone, Debug)]
pub struct DomainIndex {
    /// grammar -> licensed sentences
    languages: HashMap<GrammarId, HashSet<SentenceId>>,
    /// sentence -> licensing grammars
    licensors: HashMap<SentenceId, HashSet<GrammarId>>,
    /// Returned by `language` for grammars with no entries.
    empty_language: HashSet<SentenceId>,
}

impl DomainIndex {
    /// Builds the index from (grammar, sentence, structure) triples, in any
    /// order. Structure ids distinguish parses of the same pair; duplicates
    /// collapse via set semantics.
    pub fn from_triples<I>(triples: I) -> Self
    where
        I: IntoIterator<Item = (GrammarId, SentenceId, StructureId)>,
    {
        let mut languages: HashMap<GrammarId, HashSet<SentenceId>> = HashMap::new();
        let mut licensors: HashMap<SentenceId, HashSet<GrammarId>> = HashMap::new();

        for (grammar, sentence, _structure) in triples {
            languages.entry(grammar).or_default().insert(sentence);
            licensors.entry(sentence).or_default().insert(grammar);
        }

        let index = Self {
            languages,
            licensors,
            empty_language: HashSet::new(),
        };
        info!(
            grammars = index.grammar_count(),
            sentences = index.sentence_count(),
            "domain index built"
        );
        index
    }

    /// Loads the index from tab-separated rows of
    /// `grammarId \t sentenceId \t structureId`.
    ///
    /// Fails fast on the first malformed row; no partial domain escapes.
    pub fn from_tsv_reader<R: BufRead>(reader: R) -> Result<Self, DomainError> {
        let mut triples = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            triples.push(parse_triple(line, lineno + 1)?);
        }
        Ok(Self::from_triples(triples))
    }

    /// O(1) legality check: a grammar is legal iff it licenses at least one
    /// sentence in the corpus.
    pub fn is_legal(&self, grammar: GrammarId) -> bool {
        self.languages.contains_key(&grammar)
    }

    /// Whether `grammar` licenses `sentence`. False, never an error, for
    /// grammars with no entries.
    pub fn licenses(&self, grammar: GrammarId, sentence: SentenceId) -> bool {
        self.languages
            .get(&grammar)
            .map_or(false, |language| language.contains(&sentence))
    }

    /// The set of sentences licensed by `grammar`; empty for illegal grammars.
    pub fn language(&self, grammar: GrammarId) -> &HashSet<SentenceId> {
        self.languages.get(&grammar).unwrap_or(&self.empty_language)
    }

    /// The language of `grammar` as a sorted list, convenient for
    /// deterministic uniform sampling.
    pub fn language_sorted(&self, grammar: GrammarId) -> Vec<SentenceId> {
        let mut sentences: Vec<SentenceId> = self.language(grammar).iter().copied().collect();
        sentences.sort_unstable();
        sentences
    }

    /// The set of grammars licensing `sentence`. Non-empty for every known
    /// sentence; errors only for ids the corpus never saw.
    pub fn licensors(&self, sentence: SentenceId) -> Result<&HashSet<GrammarId>, DomainError> {
        self.licensors
            .get(&sentence)
            .ok_or(DomainError::UnknownSentence(sentence))
    }

    /// Iterates over the legal grammar ids, in arbitrary order.
    pub fn grammars(&self) -> impl Iterator<Item = GrammarId> + '_ {
        self.languages.keys().copied()
    }

    /// Iterates over the known sentence ids, in arbitrary order.
    pub fn sentences(&self) -> impl Iterator<Item = SentenceId> + '_ {
        self.licensors.keys().copied()
    }

    pub fn grammar_count(&self) -> usize {
        self.languages.len()
    }

    pub fn sentence_count(&self) -> usize {
        self.licensors.len()
    }

    /// Checks the index against expected corpus dimensions, e.g.
    /// 3072 grammars and 48077 sentences for the reference corpus.
    pub fn verify_counts(&self, grammars: usize, sentences: usize) -> Result<(), DomainError> {
        if self.grammar_count() != grammars {
            return Err(DomainError::CorpusShape(format!(
                "expected {} grammars, found {}",
                grammars,
                self.grammar_count()
            )));
        }
        if self.sentence_count() != sentences {
            return Err(DomainError::CorpusShape(format!(
                "expected {} sentences, found {}",
                sentences,
                self.sentence_count()
            )));
        }
        Ok(())
    }
}

fn parse_triple(line: &str, lineno: usize) -> Result<(GrammarId, SentenceId, StructureId), DomainError> {
    let mut fields = line.split('\t');
    let mut next_field = |name: &str| {
        fields.next().ok_or_else(|| DomainError::MalformedRow {
            line: lineno,
            reason: format!("missing {} column", name),
        })
    };

    let grammar: GrammarId = parse_field(next_field("grammar")?, "grammar", lineno)?;
    let sentence: SentenceId = parse_field(next_field("sentence")?, "sentence", lineno)?;
    let structure: StructureId = parse_field(next_field("structure")?, "structure", lineno)?;

    if (grammar as usize) >= NUM_GRAMMARS {
        return Err(DomainError::MalformedRow {
            line: lineno,
            reason: format!("grammar id {} out of range", grammar),
        });
    }
    Ok((grammar, sentence, structure))
}

fn parse_field<T: std::str::FromStr>(raw: &str, name: &str, lineno: usize) -> Result<T, DomainError> {
    raw.trim().parse().map_err(|_| DomainError::MalformedRow {
        line: lineno,
        reason: format!("invalid {} id {:?}", name, raw),
    })
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn small_domain() -> DomainIndex {
        DomainIndex::from_triples(vec![
            (0, 10, 1),
            (0, 11, 1),
            (4096, 10, 2),
            (4096, 12, 1),
            (1, 13, 1),
        ])
    }

    #[test]
    fn test_legality_and_counts() {
        let domain = small_domain();
        assert!(domain.is_legal(0));
        assert!(domain.is_legal(4096));
        assert!(domain.is_legal(1));
        assert!(!domain.is_legal(2));
        assert_eq!(domain.grammar_count(), 3);
        assert_eq!(domain.sentence_count(), 4);
        for g in domain.grammars() {
            assert!(domain.is_legal(g));
            assert!((g as usize) < NUM_GRAMMARS);
        }
    }

    #[test]
    fn test_licenses() {
        let domain = small_domain();
        assert!(domain.licenses(0, 10));
        assert!(domain.licenses(0, 11));
        assert!(!domain.licenses(0, 12));
        // Illegal grammar: false, not an error.
        assert!(!domain.licenses(2, 10));
    }

    #[test]
    fn test_language_empty_for_illegal_grammar() {
        let domain = small_domain();
        assert!(domain.language(2).is_empty());
        assert_eq!(domain.language(0).len(), 2);
        assert_eq!(domain.language_sorted(0), vec![10, 11]);
    }

    #[test]
    fn test_licensors_consistent_with_licenses() {
        let domain = small_domain();
        for s in domain.sentences() {
            let licensors = domain.licensors(s).expect("known sentence");
            assert!(!licensors.is_empty(), "licensor set must be non-empty");
            for g in domain.grammars() {
                assert_eq!(domain.licenses(g, s), licensors.contains(&g));
            }
        }
    }

    #[test]
    fn test_unknown_sentence_is_distinct_error() {
        let domain = small_domain();
        match domain.licensors(999) {
            Err(DomainError::UnknownSentence(999)) => {}
            other => panic!("expected UnknownSentence, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_duplicates_collapse() {
        let domain = DomainIndex::from_triples(vec![
            (0, 10, 1),
            (0, 10, 1),
            (0, 10, 2), // same pair, different parse
        ]);
        assert_eq!(domain.language(0).len(), 1);
        assert_eq!(domain.licensors(10).unwrap().len(), 1);
    }

    #[test]
    fn test_from_tsv_reader() {
        let tsv = "0\t10\t1\n0\t11\t1\n4096\t10\t2\n";
        let domain = DomainIndex::from_tsv_reader(Cursor::new(tsv)).unwrap();
        assert_eq!(domain.grammar_count(), 2);
        assert!(domain.licenses(0, 11));
    }

    #[test]
    fn test_malformed_row_fails_fast() {
        let tsv = "0\t10\t1\nnot-a-number\t11\t1\n";
        match DomainIndex::from_tsv_reader(Cursor::new(tsv)) {
            Err(DomainError::MalformedRow { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected MalformedRow, got {:?}", other.map(|d| d.grammar_count())),
        }
    }

    #[test]
    fn test_missing_column_fails() {
        let tsv = "0\t10\n";
        assert!(matches!(
            DomainIndex::from_tsv_reader(Cursor::new(tsv)),
            Err(DomainError::MalformedRow { line: 1, .. })
        ));
    }

    #[test]
    fn test_grammar_out_of_range_fails() {
        let tsv = "8192\t10\t1\n";
        assert!(matches!(
            DomainIndex::from_tsv_reader(Cursor::new(tsv)),
            Err(DomainError::MalformedRow { line: 1, .. })
        ));
    }

    #[test]
    fn test_verify_counts() {
        let domain = small_domain();
        assert!(domain.verify_counts(3, 4).is_ok());
        assert!(matches!(
            domain.verify_counts(3072, 4),
            Err(DomainError::CorpusShape(_))
        ));
        assert!(matches!(
            domain.verify_counts(3, 48077),
            Err(DomainError::CorpusShape(_))
        ));
    }
}

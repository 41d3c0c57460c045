//! Term-at-a-time evaluation: every leaf is materialized into a sorted doc-id
//! accumulator and accumulators are merged per operator.

use super::intersect::{difference, has_consecutive_run, intersect_linear, intersect_with_skips, union};
use super::parser::Expr;
use crate::index::{DocId, InvertedIndex, Position, SkipTable, TermEntry};

pub(crate) struct TermAtATime<'a> {
    index: &'a InvertedIndex,
    /// Accumulator length at which AND switches to skip intersection.
    skip_threshold: Option<usize>,
}

impl<'a> TermAtATime<'a> {
    pub(crate) fn new(index: &'a InvertedIndex) -> Self {
        let config = &index.config;
        let skip_threshold = config.uses_skip_pointers().then_some(config.skip_threshold);
        Self { index, skip_threshold }
    }

    pub(crate) fn evaluate(&self, expr: &Expr) -> Vec<DocId> {
        match expr {
            Expr::Term(term) => self.index.term(term).map(TermEntry::doc_ids).unwrap_or_default(),
            Expr::Phrase(words) => phrase_matches(self.index, words),
            Expr::And(l, r) => self.intersect(&self.evaluate(l), &self.evaluate(r)),
            Expr::Or(l, r) => union(&self.evaluate(l), &self.evaluate(r)),
            Expr::Not(e) => difference(&self.index.all_docs, &self.evaluate(e)),
        }
    }

    fn intersect(&self, a: &[DocId], b: &[DocId]) -> Vec<DocId> {
        match self.skip_threshold {
            Some(min) if a.len() >= min && b.len() >= min => {
                // Accumulators are transient, so their skip tables are too.
                intersect_with_skips(a, &SkipTable::build(a.len()), b, &SkipTable::build(b.len()))
            }
            _ => intersect_linear(a, b),
        }
    }
}

/// Documents holding `words` at consecutive positions.
pub(crate) fn phrase_matches(index: &InvertedIndex, words: &[String]) -> Vec<DocId> {
    let Some(entries) = words.iter().map(|w| index.term(w)).collect::<Option<Vec<_>>>() else {
        return Vec::new();
    };
    let Some((first, rest)) = entries.split_first() else {
        return Vec::new();
    };
    let candidates = rest
        .iter()
        .fold(first.doc_ids(), |acc, entry| intersect_linear(&acc, &entry.doc_ids()));

    candidates
        .into_iter()
        .filter(|&doc| {
            let lists: Option<Vec<&[Position]>> = entries
                .iter()
                .map(|e| e.posting(doc).map(|p| p.positions.as_slice()))
                .collect();
            lists.is_some_and(|lists| has_consecutive_run(&lists))
        })
        .collect()
}

//! Query parsing and evaluation over a built [`InvertedIndex`].

mod daat;
pub mod intersect;
pub mod parser;
pub mod ranking;
mod taat;

pub use parser::{parse_query, Expr};
pub use ranking::{rank, SearchHit};

use crate::config::QueryProc;
use crate::index::{DocId, InvertedIndex};
use daat::DocAtATime;
use taat::TermAtATime;

/// Maps a raw query word onto the vocabulary the index was built with.
pub trait TermNormalizer: Send + Sync {
    fn normalize(&self, word: &str) -> String;
}

/// Default normalizer: lowercase only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lowercase;

impl TermNormalizer for Lowercase {
    fn normalize(&self, word: &str) -> String {
        word.to_lowercase()
    }
}

impl<F> TermNormalizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn normalize(&self, word: &str) -> String {
        self(word)
    }
}

pub struct QueryEngine<'a> {
    index: &'a InvertedIndex,
}

impl<'a> QueryEngine<'a> {
    pub fn new(index: &'a InvertedIndex) -> Self {
        Self { index }
    }

    /// Matching doc ids in ascending order.
    pub fn evaluate(&self, expr: &Expr, strategy: QueryProc) -> Vec<DocId> {
        let docs = match strategy {
            QueryProc::TermAtATime => TermAtATime::new(self.index).evaluate(expr),
            QueryProc::DocAtATime => DocAtATime::new(self.index).evaluate(expr),
        };
        tracing::debug!(query = %expr, ?strategy, hits = docs.len(), "evaluated query");
        docs
    }

    /// Boolean matches scored by tf-idf over the query's positive terms,
    /// truncated to `top_k`.
    pub fn rank(&self, expr: &Expr, strategy: QueryProc, top_k: usize) -> Vec<SearchHit> {
        let matches = self.evaluate(expr, strategy);
        let mut hits = rank(self.index, &expr.positive_terms(), &matches);
        hits.truncate(top_k);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_index, SourceDocument};
    use crate::config::{IndexConfig, Optimization};

    fn index(config: IndexConfig) -> InvertedIndex {
        let docs = vec![
            SourceDocument::new(1, "", "the cat sat on the mat".split(' ')),
            SourceDocument::new(2, "", "the dog sat on the log".split(' ')),
            SourceDocument::new(3, "", "a cat and a dog".split(' ')),
        ];
        build_index(config, docs).unwrap()
    }

    fn both(engine: &QueryEngine<'_>, query: &str) -> Vec<DocId> {
        let expr = parse_query(query).unwrap();
        let taat = engine.evaluate(&expr, QueryProc::TermAtATime);
        let daat = engine.evaluate(&expr, QueryProc::DocAtATime);
        assert_eq!(taat, daat, "strategies disagree on {query}");
        taat
    }

    #[test]
    fn boolean_operators() {
        for opt in [Optimization::None, Optimization::SkipPointers] {
            let idx = index(IndexConfig::default().with_optimization(opt).with_skip_threshold(2));
            let engine = QueryEngine::new(&idx);
            assert_eq!(both(&engine, r#""cat" AND "dog""#), vec![3]);
            assert_eq!(both(&engine, r#""cat" OR "dog""#), vec![1, 2, 3]);
            assert_eq!(both(&engine, r#"NOT "cat""#), vec![2]);
            assert_eq!(both(&engine, r#""sat" AND NOT ("mat" OR "log")"#), Vec::<DocId>::new());
            assert_eq!(both(&engine, r#""missing" OR "mat""#), vec![1]);
            assert_eq!(both(&engine, r#"NOT "missing""#), vec![1, 2, 3]);
        }
    }

    #[test]
    fn phrases_need_adjacent_positions() {
        let idx = index(IndexConfig::default());
        let engine = QueryEngine::new(&idx);
        assert_eq!(both(&engine, r#""the cat""#), vec![1]);
        assert_eq!(both(&engine, r#""sat on the""#), vec![1, 2]);
        assert_eq!(both(&engine, r#""cat dog""#), Vec::<DocId>::new());
        assert_eq!(both(&engine, r#""dog sat" OR "a cat""#), vec![2, 3]);
    }

    #[test]
    fn ranking_ignores_negated_terms_and_truncates() {
        let idx = index(IndexConfig::default());
        let engine = QueryEngine::new(&idx);
        let expr = parse_query(r#""cat" OR "dog""#).unwrap();
        let hits = engine.rank(&expr, QueryProc::DocAtATime, 2);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);

        let expr = parse_query(r#"NOT "cat""#).unwrap();
        let hits = engine.rank(&expr, QueryProc::TermAtATime, 10);
        assert_eq!(hits, vec![SearchHit { doc_id: 2, score: 0.0 }]);
    }

    #[test]
    fn closures_act_as_normalizers() {
        let upper = |w: &str| w.to_uppercase();
        assert_eq!(upper.normalize("cat"), "CAT");
        assert_eq!(Lowercase.normalize("CaT"), "cat");
    }
}

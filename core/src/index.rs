use crate::config::IndexConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type DocId = u32;
pub type Position = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocMeta {
    pub title: String,
    pub content: String,
    /// Number of tokens indexed for this document (title and content).
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    /// Stored explicitly when the index keeps word counts.
    pub term_freq: Option<u32>,
    pub positions: Vec<Position>, // ascending, unique
}

impl Posting {
    pub fn tf(&self) -> u32 {
        self.term_freq.unwrap_or(self.positions.len() as u32)
    }
}

/// Forward jumps over a postings list, addressed by index into the list.
///
/// With step `s = floor(sqrt(len))`, the posting at index `k * s` may jump to
/// index `(k + 1) * s` when that index is inside the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipTable {
    step: u32,
    targets: Vec<u32>,
}

impl SkipTable {
    pub fn build(len: usize) -> Self {
        let step = (len as f64).sqrt().floor() as usize;
        if step < 2 {
            return Self { step: step as u32, targets: Vec::new() };
        }
        let targets = (1..)
            .map(|k| k * step)
            .take_while(|&t| t < len)
            .map(|t| t as u32)
            .collect();
        Self { step: step as u32, targets }
    }

    pub fn step(&self) -> usize {
        self.step as usize
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Index reachable by a skip from `idx`, if `idx` carries a pointer.
    pub fn target(&self, idx: usize) -> Option<usize> {
        if self.targets.is_empty() || self.step == 0 || idx % self.step as usize != 0 {
            return None;
        }
        self.targets.get(idx / self.step as usize).map(|&t| t as usize)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub df: u32,
    pub postings: Vec<Posting>, // sorted by doc_id
    pub skips: Option<SkipTable>,
}

impl TermEntry {
    pub fn doc_ids(&self) -> Vec<DocId> {
        self.postings.iter().map(|p| p.doc_id).collect()
    }

    pub fn posting(&self, doc_id: DocId) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| &self.postings[i])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub num_docs: u32,
    pub doc_lengths: BTreeMap<DocId, u32>,
}

impl CollectionStats {
    pub fn average_length(&self) -> f64 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        let total: u64 = self.doc_lengths.values().map(|&l| l as u64).sum();
        total as f64 / self.doc_lengths.len() as f64
    }
}

/// A fully built, immutable index.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    pub config: IndexConfig,
    pub dictionary: HashMap<String, TermEntry>,
    pub docs: BTreeMap<DocId, DocMeta>,
    pub stats: CollectionStats,
    /// Every indexed doc id, ascending. Universe for NOT.
    pub all_docs: Vec<DocId>,
}

impl InvertedIndex {
    pub fn new(config: IndexConfig) -> Self {
        Self { config, ..Self::default() }
    }

    pub fn term(&self, term: &str) -> Option<&TermEntry> {
        self.dictionary.get(term)
    }

    pub fn df(&self, term: &str) -> u32 {
        self.dictionary.get(term).map(|e| e.df).unwrap_or(0)
    }

    pub fn num_docs(&self) -> u32 {
        self.stats.num_docs
    }

    pub fn num_terms(&self) -> usize {
        self.dictionary.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_table_uses_sqrt_step() {
        let table = SkipTable::build(10);
        assert_eq!(table.step(), 3);
        assert_eq!(table.target(0), Some(3));
        assert_eq!(table.target(3), Some(6));
        assert_eq!(table.target(6), Some(9));
        assert_eq!(table.target(9), None);
        assert_eq!(table.target(4), None);
    }

    #[test]
    fn short_lists_have_no_skips() {
        for len in 0..4 {
            let table = SkipTable::build(len);
            assert!(table.is_empty());
            assert_eq!(table.target(0), None);
        }
    }

    #[test]
    fn posting_lookup_by_doc_id() {
        let entry = TermEntry {
            df: 2,
            postings: vec![
                Posting { doc_id: 2, term_freq: None, positions: vec![0, 4] },
                Posting { doc_id: 9, term_freq: Some(1), positions: vec![3] },
            ],
            skips: None,
        };
        assert_eq!(entry.posting(2).map(Posting::tf), Some(2));
        assert_eq!(entry.posting(9).map(Posting::tf), Some(1));
        assert!(entry.posting(5).is_none());
    }
}

use crate::index::{DocId, InvertedIndex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f32,
}

/// `1 + ln(tf)`, zero for absent terms.
pub fn tf_weight(tf: u32) -> f32 {
    if tf > 0 {
        1.0 + (tf as f32).ln()
    } else {
        0.0
    }
}

/// `ln(N / df)`, zero for unknown terms.
pub fn idf_weight(num_docs: u32, df: u32) -> f32 {
    if df == 0 || num_docs == 0 {
        0.0
    } else {
        (num_docs as f32 / df as f32).ln()
    }
}

/// Score `candidates` by summed tf-idf over `terms`; best first, ties by
/// ascending doc id.
pub fn rank(index: &InvertedIndex, terms: &[&str], candidates: &[DocId]) -> Vec<SearchHit> {
    let n = index.num_docs();
    let weighted: Vec<_> = terms
        .iter()
        .filter_map(|t| index.term(t))
        .map(|entry| (entry, idf_weight(n, entry.df)))
        .collect();

    let mut hits: Vec<SearchHit> = candidates
        .iter()
        .map(|&doc_id| {
            let score = weighted
                .iter()
                .map(|(entry, idf)| entry.posting(doc_id).map_or(0.0, |p| tf_weight(p.tf()) * idf))
                .sum();
            SearchHit { doc_id, score }
        })
        .collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
    hits
}

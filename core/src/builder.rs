//! Single-pass construction of an [`InvertedIndex`] from pre-normalized token
//! streams.

use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::index::{CollectionStats, DocId, DocMeta, InvertedIndex, Position, Posting, SkipTable, TermEntry};
use std::collections::{BTreeMap, HashMap};

/// A document as handed to the builder: raw title/content for the document
/// store and the normalized tokens of title followed by content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub doc_id: DocId,
    pub title: String,
    pub content: String,
    pub tokens: Vec<String>,
}

impl SourceDocument {
    pub fn new<I, T>(doc_id: DocId, title: impl Into<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            doc_id,
            title: title.into(),
            content: String::new(),
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

pub struct IndexBuilder {
    config: IndexConfig,
    postings: HashMap<String, Vec<Posting>>,
    docs: BTreeMap<DocId, DocMeta>,
    last_doc: Option<DocId>,
    in_order: bool,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Self {
        Self { config, postings: HashMap::new(), docs: BTreeMap::new(), last_doc: None, in_order: true }
    }

    pub fn num_docs(&self) -> usize {
        self.docs.len()
    }

    pub fn add_document(&mut self, doc: SourceDocument) -> Result<()> {
        if self.docs.contains_key(&doc.doc_id) {
            return Err(IndexError::DuplicateDocument(doc.doc_id));
        }
        if self.last_doc.is_some_and(|last| doc.doc_id < last) {
            self.in_order = false;
        }
        self.last_doc = Some(doc.doc_id);

        let mut positions: HashMap<&str, Vec<Position>> = HashMap::new();
        for (pos, term) in doc.tokens.iter().enumerate() {
            positions.entry(term.as_str()).or_default().push(pos as Position);
        }
        let store_tf = self.config.stores_term_freqs();
        for (term, positions) in positions {
            let term_freq = store_tf.then_some(positions.len() as u32);
            self.postings
                .entry(term.to_string())
                .or_default()
                .push(Posting { doc_id: doc.doc_id, term_freq, positions });
        }

        let length = doc.tokens.len() as u32;
        self.docs.insert(doc.doc_id, DocMeta { title: doc.title, content: doc.content, length });
        Ok(())
    }

    pub fn finish(self) -> InvertedIndex {
        let use_skips = self.config.uses_skip_pointers();
        let in_order = self.in_order;
        let dictionary = self
            .postings
            .into_iter()
            .map(|(term, mut postings)| {
                if !in_order {
                    postings.sort_by_key(|p| p.doc_id);
                }
                let skips = use_skips.then(|| SkipTable::build(postings.len()));
                let entry = TermEntry { df: postings.len() as u32, postings, skips };
                (term, entry)
            })
            .collect();

        let doc_lengths = self.docs.iter().map(|(&id, meta)| (id, meta.length)).collect();
        let stats = CollectionStats { num_docs: self.docs.len() as u32, doc_lengths };
        let all_docs = self.docs.keys().copied().collect();
        InvertedIndex { config: self.config, dictionary, docs: self.docs, stats, all_docs }
    }
}

/// Build an index from a document stream, failing on the first duplicate id.
pub fn build_index<I>(config: IndexConfig, documents: I) -> Result<InvertedIndex>
where
    I: IntoIterator<Item = SourceDocument>,
{
    let mut builder = IndexBuilder::new(config);
    for doc in documents {
        builder.add_document(doc)?;
    }
    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexInfo, Optimization};

    fn doc(id: DocId, text: &str) -> SourceDocument {
        SourceDocument::new(id, format!("doc{id}"), text.split_whitespace())
    }

    #[test]
    fn positions_span_the_whole_token_stream() {
        let index = build_index(IndexConfig::default(), vec![doc(1, "the cat sat on the mat")]).unwrap();
        let the = index.term("the").unwrap();
        assert_eq!(the.df, 1);
        assert_eq!(the.postings[0].positions, vec![0, 4]);
        assert_eq!(the.postings[0].term_freq, None);
        assert_eq!(the.postings[0].tf(), 2);
        assert_eq!(index.stats.doc_lengths[&1], 6);
    }

    #[test]
    fn out_of_order_documents_are_sorted() {
        let docs = vec![doc(7, "a b"), doc(2, "a"), doc(5, "b a")];
        let index = build_index(IndexConfig::default(), docs).unwrap();
        assert_eq!(index.term("a").unwrap().doc_ids(), vec![2, 5, 7]);
        assert_eq!(index.term("b").unwrap().doc_ids(), vec![5, 7]);
        assert_eq!(index.all_docs, vec![2, 5, 7]);
    }

    #[test]
    fn duplicate_doc_id_is_rejected() {
        let err = build_index(IndexConfig::default(), vec![doc(1, "a"), doc(1, "b")]).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateDocument(1)));
    }

    #[test]
    fn granularity_and_skips_follow_config() {
        let config = IndexConfig::default()
            .with_info(IndexInfo::WordCount)
            .with_optimization(Optimization::SkipPointers);
        let docs: Vec<_> = (0..16).map(|i| doc(i, "x x y")).collect();
        let index = build_index(config, docs).unwrap();
        let x = index.term("x").unwrap();
        assert_eq!(x.df, 16);
        assert!(x.postings.iter().all(|p| p.term_freq == Some(2)));
        assert_eq!(x.skips.as_ref().map(SkipTable::step), Some(4));
    }
}

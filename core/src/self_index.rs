//! The index handle: owns one namespace of a datastore and walks the
//! `Empty -> Building -> Ready` lifecycle.
//!
//! A failed build puts back whatever was there before it started, so an index
//! that was `Ready` stays `Ready` with its old contents.

use crate::builder::{build_index, SourceDocument};
use crate::config::{IndexConfig, QueryProc};
use crate::error::{IndexError, Result};
use crate::index::{DocId, DocMeta, InvertedIndex};
use crate::persist::{delete_index, load_index, save_index, MetaFile};
use crate::query::{parse_query, Expr, Lowercase, QueryEngine, SearchHit, TermNormalizer};
use crate::store::{open_store, Datastore};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Building,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub total_documents: u32,
    pub total_terms: u32,
    pub average_document_length: f64,
    pub encoded_postings_bytes: u64,
}

struct Loaded {
    index: InvertedIndex,
    meta: MetaFile,
}

#[derive(Default)]
struct Slot {
    current: Option<Arc<Loaded>>,
    building: bool,
}

pub struct SelfIndex<S = Box<dyn Datastore>> {
    name: String,
    config: IndexConfig,
    store: S,
    slot: RwLock<Slot>,
    normalizer: Box<dyn TermNormalizer>,
}

impl SelfIndex<Box<dyn Datastore>> {
    /// Open an index on the backend its configuration names, rooted at `root`.
    pub fn open<P: AsRef<Path>>(name: impl Into<String>, config: IndexConfig, root: P) -> Result<Self> {
        config.validate()?;
        let store = open_store(config.datastore, root)?;
        Self::new(name, config, store)
    }
}

impl<S: Datastore> SelfIndex<S> {
    pub fn new(name: impl Into<String>, config: IndexConfig, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            store,
            slot: RwLock::new(Slot::default()),
            normalizer: Box::new(Lowercase),
        })
    }

    /// Replace the query-side normalizer; it should mirror whatever produced
    /// the document tokens.
    pub fn with_normalizer(mut self, normalizer: impl TermNormalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn identifier(&self) -> String {
        self.config.identifier()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn state(&self) -> IndexState {
        let slot = self.slot.read();
        if slot.building {
            IndexState::Building
        } else if slot.current.is_some() {
            IndexState::Ready
        } else {
            IndexState::Empty
        }
    }

    /// Index `documents` and persist the result, replacing the current
    /// contents only once everything has been committed.
    pub fn build<I>(&self, documents: I) -> Result<()>
    where
        I: IntoIterator<Item = SourceDocument>,
    {
        let previous = {
            let mut slot = self.slot.write();
            if slot.building {
                return Err(IndexError::BuildInProgress(self.name.clone()));
            }
            slot.building = true;
            slot.current.take()
        };
        tracing::info!(index = %self.name, config = %self.config, "build started");

        let result = build_index(self.config, documents).and_then(|index| {
            let meta = save_index(&self.store, &self.name, &index)?;
            Ok(Arc::new(Loaded { index, meta }))
        });

        let mut slot = self.slot.write();
        slot.building = false;
        match result {
            Ok(loaded) => {
                tracing::info!(
                    index = %self.name,
                    num_docs = loaded.meta.num_docs,
                    num_terms = loaded.meta.num_terms,
                    "build finished"
                );
                slot.current = Some(loaded);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(index = %self.name, error = %e, "build failed, keeping previous state");
                slot.current = previous;
                Err(e)
            }
        }
    }

    /// Re-open the index last committed under this name.
    pub fn load(&self) -> Result<()> {
        let mut slot = self.slot.write();
        if slot.building {
            return Err(IndexError::BuildInProgress(self.name.clone()));
        }
        let (index, meta) =
            load_index(&self.store, &self.name)?.ok_or_else(|| IndexError::NotIndexed(self.name.clone()))?;
        if meta.config != self.config {
            return Err(IndexError::InvalidConfig(format!(
                "index '{}' was built as {} but opened as {}",
                self.name, meta.config, self.config
            )));
        }
        slot.current = Some(Arc::new(Loaded { index, meta }));
        Ok(())
    }

    /// Drop the persisted namespace and return to `Empty`.
    pub fn delete(&self) -> Result<()> {
        let mut slot = self.slot.write();
        if slot.building {
            return Err(IndexError::BuildInProgress(self.name.clone()));
        }
        delete_index(&self.store, &self.name)?;
        slot.current = None;
        tracing::info!(index = %self.name, "index deleted");
        Ok(())
    }

    fn ready(&self) -> Result<Arc<Loaded>> {
        let slot = self.slot.read();
        match &slot.current {
            Some(loaded) if !slot.building => Ok(Arc::clone(loaded)),
            _ => Err(IndexError::NotIndexed(self.name.clone())),
        }
    }

    /// Parse `query` and normalize its leaf terms.
    pub fn parse(&self, query: &str) -> Result<Expr> {
        let expr = parse_query(query)?;
        Ok(expr.map_terms(&|w: &str| self.normalizer.normalize(w)))
    }

    /// Boolean search with the configured strategy.
    pub fn search(&self, query: &str) -> Result<Vec<DocId>> {
        self.search_with(query, self.config.query_proc)
    }

    pub fn search_with(&self, query: &str, strategy: QueryProc) -> Result<Vec<DocId>> {
        let expr = self.parse(query)?;
        self.evaluate(&expr, strategy)
    }

    /// Evaluate an already normalized expression.
    pub fn evaluate(&self, expr: &Expr, strategy: QueryProc) -> Result<Vec<DocId>> {
        let loaded = self.ready()?;
        Ok(QueryEngine::new(&loaded.index).evaluate(expr, strategy))
    }

    pub fn search_ranked(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let expr = self.parse(query)?;
        let loaded = self.ready()?;
        Ok(QueryEngine::new(&loaded.index).rank(&expr, self.config.query_proc, top_k))
    }

    /// Ranked hits as a JSON array of `{"doc_id", "score"}` objects.
    pub fn query_json(&self, query: &str, top_k: usize) -> Result<String> {
        let hits = self.search_ranked(query, top_k)?;
        Ok(serde_json::to_string(&hits)?)
    }

    pub fn indexed_documents(&self) -> Result<Vec<DocId>> {
        Ok(self.ready()?.index.all_docs.clone())
    }

    pub fn document(&self, doc_id: DocId) -> Result<Option<DocMeta>> {
        Ok(self.ready()?.index.docs.get(&doc_id).cloned())
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let loaded = self.ready()?;
        Ok(IndexStats {
            total_documents: loaded.index.num_docs(),
            total_terms: loaded.index.num_terms() as u32,
            average_document_length: loaded.index.stats.average_length(),
            encoded_postings_bytes: loaded.meta.postings_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn docs() -> Vec<SourceDocument> {
        vec![
            SourceDocument::new(1, "one", ["the", "cat", "sat"]).with_content("the cat sat"),
            SourceDocument::new(2, "two", ["the", "dog"]),
        ]
    }

    #[test]
    fn lifecycle_moves_from_empty_to_ready() {
        let index = SelfIndex::new("t", IndexConfig::default(), MemoryStore::new()).unwrap();
        assert_eq!(index.state(), IndexState::Empty);
        assert!(matches!(index.search(r#""cat""#), Err(IndexError::NotIndexed(_))));

        index.build(docs()).unwrap();
        assert_eq!(index.state(), IndexState::Ready);
        assert_eq!(index.search(r#""CAT""#).unwrap(), vec![1]);
        assert_eq!(index.indexed_documents().unwrap(), vec![1, 2]);
        assert_eq!(index.document(1).unwrap().map(|d| d.content), Some("the cat sat".to_string()));
        assert_eq!(index.document(7).unwrap(), None);

        index.delete().unwrap();
        assert_eq!(index.state(), IndexState::Empty);
    }

    #[test]
    fn stats_describe_the_current_build() {
        let index = SelfIndex::new("t", IndexConfig::default(), MemoryStore::new()).unwrap();
        index.build(docs()).unwrap();
        let stats = index.stats().unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.total_terms, 4);
        assert!((stats.average_document_length - 2.5).abs() < 1e-9);
        assert!(stats.encoded_postings_bytes > 0);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = IndexConfig::default().with_skip_threshold(1);
        assert!(matches!(
            SelfIndex::new("t", config, MemoryStore::new()),
            Err(IndexError::InvalidConfig(_))
        ));
    }

    #[test]
    fn query_json_serializes_hits() {
        let index = SelfIndex::new("t", IndexConfig::default(), MemoryStore::new()).unwrap();
        index.build(docs()).unwrap();
        let json = index.query_json(r#""cat""#, DEFAULT_TOP_K).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["doc_id"], 1);
        assert_eq!(value.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn custom_normalizer_applies_to_query_terms() {
        let index = SelfIndex::new("t", IndexConfig::default(), MemoryStore::new())
            .unwrap()
            .with_normalizer(|w: &str| w.trim_end_matches('s').to_lowercase());
        index.build(docs()).unwrap();
        assert_eq!(index.search(r#""Cats""#).unwrap(), vec![1]);
    }
}

//! Persisted layout of an index inside one datastore namespace.
//!
//! ```text
//! meta.json            MetaFile, written last: the commit point
//! g<gen>/stats         CollectionStats
//! g<gen>/doc/<doc_id>  DocMeta
//! g<gen>/term/<term>   StoredTerm (codec-encoded postings)
//! ```
//!
//! Every build writes a fresh generation. Until `meta.json` names it, readers
//! keep seeing the previous one.

use crate::codec::Codec;
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::index::{CollectionStats, DocId, DocMeta, InvertedIndex, Posting, SkipTable, TermEntry};
use crate::store::Datastore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const FORMAT_VERSION: u32 = 1;
const META_KEY: &str = "meta.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub generation: u64,
    pub num_docs: u32,
    pub num_terms: u32,
    /// Total size of the encoded postings values.
    pub postings_bytes: u64,
    pub config: IndexConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTerm {
    df: u32,
    doc_ids: Vec<u8>,
    term_freqs: Option<Vec<u8>>,
    positions: Vec<Vec<u8>>,
    skips: Option<SkipTable>,
}

struct GenerationKeys {
    prefix: String,
}

impl GenerationKeys {
    fn new(generation: u64) -> Self {
        Self { prefix: format!("g{generation}/") }
    }

    fn stats(&self) -> String {
        format!("{}stats", self.prefix)
    }

    fn doc_prefix(&self) -> String {
        format!("{}doc/", self.prefix)
    }

    fn doc(&self, doc_id: DocId) -> String {
        format!("{}doc/{doc_id}", self.prefix)
    }

    fn term_prefix(&self) -> String {
        format!("{}term/", self.prefix)
    }

    fn term(&self, term: &str) -> String {
        format!("{}term/{term}", self.prefix)
    }
}

pub fn encode_term(codec: &Codec, entry: &TermEntry) -> Result<Vec<u8>> {
    let doc_ids: Vec<u32> = entry.postings.iter().map(|p| p.doc_id).collect();
    let term_freqs = if entry.postings.iter().all(|p| p.term_freq.is_some()) && !entry.postings.is_empty() {
        let tfs: Vec<u32> = entry.postings.iter().map(Posting::tf).collect();
        Some(codec.encode_counts(&tfs)?)
    } else {
        None
    };
    let positions = entry
        .postings
        .iter()
        .map(|p| codec.encode(&p.positions))
        .collect::<Result<Vec<_>>>()?;
    let stored = StoredTerm {
        df: entry.df,
        doc_ids: codec.encode(&doc_ids)?,
        term_freqs,
        positions,
        skips: entry.skips.clone(),
    };
    Ok(bincode::serialize(&stored)?)
}

pub fn decode_term(codec: &Codec, bytes: &[u8]) -> Result<TermEntry> {
    let stored: StoredTerm = bincode::deserialize(bytes)?;
    let doc_ids = codec.decode(&stored.doc_ids)?;
    if doc_ids.len() != stored.df as usize || stored.positions.len() != doc_ids.len() {
        return Err(IndexError::codec(format!(
            "postings record is inconsistent: df {}, {} doc ids, {} position lists",
            stored.df,
            doc_ids.len(),
            stored.positions.len()
        )));
    }
    let term_freqs = match &stored.term_freqs {
        Some(bytes) => {
            let tfs = codec.decode_counts(bytes)?;
            if tfs.len() != doc_ids.len() {
                return Err(IndexError::codec("term frequency count does not match postings"));
            }
            Some(tfs)
        }
        None => None,
    };
    if !strictly_increasing(&doc_ids) {
        return Err(IndexError::codec("postings doc ids are not strictly increasing"));
    }
    let mut postings = Vec::with_capacity(doc_ids.len());
    for (i, (doc_id, positions)) in doc_ids.into_iter().zip(&stored.positions).enumerate() {
        let positions = codec.decode(positions)?;
        if !strictly_increasing(&positions) {
            return Err(IndexError::codec(format!("positions of doc {doc_id} are not strictly increasing")));
        }
        let term_freq = term_freqs.as_ref().map(|tfs| tfs[i]);
        if term_freq.is_some_and(|tf| tf as usize != positions.len()) {
            return Err(IndexError::codec(format!("term frequency of doc {doc_id} disagrees with its positions")));
        }
        postings.push(Posting { doc_id, term_freq, positions });
    }
    // Skip tables are derived from the list length alone.
    if let Some(skips) = &stored.skips {
        if *skips != SkipTable::build(postings.len()) {
            return Err(IndexError::codec("skip table does not match postings length"));
        }
    }
    Ok(TermEntry { df: stored.df, postings, skips: stored.skips })
}

fn strictly_increasing(values: &[u32]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

pub fn load_meta<S: Datastore + ?Sized>(store: &S, namespace: &str) -> Result<Option<MetaFile>> {
    match store.get(namespace, META_KEY)? {
        Some(bytes) => {
            let meta: MetaFile = serde_json::from_slice(&bytes)?;
            if meta.version > FORMAT_VERSION {
                return Err(IndexError::codec(format!(
                    "index format version {} is newer than supported {FORMAT_VERSION}",
                    meta.version
                )));
            }
            Ok(Some(meta))
        }
        None => Ok(None),
    }
}

/// Persist `index` as a new generation and commit it. On failure every key
/// of the new generation is removed and the previous commit stays current.
pub fn save_index<S: Datastore + ?Sized>(store: &S, namespace: &str, index: &InvertedIndex) -> Result<MetaFile> {
    let previous = load_meta(store, namespace)?;
    let generation = previous.as_ref().map_or(0, |m| m.generation + 1);
    let keys = GenerationKeys::new(generation);

    // Leftovers from an aborted attempt whose cleanup failed.
    for key in store.scan_prefix(namespace, &keys.prefix)? {
        store.delete(namespace, &key)?;
    }

    let mut written = Vec::new();
    let meta = match write_generation(store, namespace, index, generation, &keys, &mut written) {
        Ok(meta) => meta,
        Err(e) => {
            rollback(store, namespace, &written);
            return Err(e);
        }
    };
    let meta_bytes = serde_json::to_vec_pretty(&meta)?;
    if let Err(e) = store.flush().and_then(|_| store.put(namespace, META_KEY, &meta_bytes)) {
        rollback(store, namespace, &written);
        return Err(e);
    }
    if let Err(e) = store.flush() {
        tracing::warn!(namespace, generation, error = %e, "failed to flush commit record");
    }

    if let Some(prev) = previous {
        purge_generation(store, namespace, prev.generation);
    }
    tracing::info!(namespace, generation, num_docs = meta.num_docs, num_terms = meta.num_terms, "index committed");
    Ok(meta)
}

fn write_generation<S: Datastore + ?Sized>(
    store: &S,
    namespace: &str,
    index: &InvertedIndex,
    generation: u64,
    keys: &GenerationKeys,
    written: &mut Vec<String>,
) -> Result<MetaFile> {
    let codec = Codec::new(index.config.compression);
    let mut put = |key: String, value: &[u8]| -> Result<()> {
        store.put(namespace, &key, value)?;
        written.push(key);
        Ok(())
    };

    put(keys.stats(), &bincode::serialize(&index.stats)?)?;
    for (&doc_id, meta) in &index.docs {
        put(keys.doc(doc_id), &bincode::serialize(meta)?)?;
    }
    let mut postings_bytes = 0u64;
    for (term, entry) in &index.dictionary {
        let bytes = encode_term(&codec, entry)?;
        postings_bytes += bytes.len() as u64;
        put(keys.term(term), &bytes)?;
    }

    Ok(MetaFile {
        version: FORMAT_VERSION,
        generation,
        num_docs: index.stats.num_docs,
        num_terms: index.dictionary.len() as u32,
        postings_bytes,
        config: index.config,
    })
}

fn rollback<S: Datastore + ?Sized>(store: &S, namespace: &str, written: &[String]) {
    tracing::info!(namespace, keys = written.len(), "rolling back partially written generation");
    for key in written {
        if let Err(e) = store.delete(namespace, key) {
            tracing::warn!(namespace, key = key.as_str(), error = %e, "failed to remove key during rollback");
        }
    }
}

fn purge_generation<S: Datastore + ?Sized>(store: &S, namespace: &str, generation: u64) {
    let prefix = GenerationKeys::new(generation).prefix;
    let keys = match store.scan_prefix(namespace, &prefix) {
        Ok(keys) => keys,
        Err(e) => {
            tracing::warn!(namespace, generation, error = %e, "failed to list stale generation");
            return;
        }
    };
    for key in keys {
        if let Err(e) = store.delete(namespace, &key) {
            tracing::warn!(namespace, key = key.as_str(), error = %e, "failed to remove stale key");
        }
    }
}

/// Load the committed index of `namespace`, or `None` if nothing was ever
/// committed there.
pub fn load_index<S: Datastore + ?Sized>(store: &S, namespace: &str) -> Result<Option<(InvertedIndex, MetaFile)>> {
    let Some(meta) = load_meta(store, namespace)? else {
        return Ok(None);
    };
    let keys = GenerationKeys::new(meta.generation);
    let codec = Codec::new(meta.config.compression);

    let stats_bytes = store
        .get(namespace, &keys.stats())?
        .ok_or_else(|| IndexError::Persistence(format!("{namespace}: committed generation has no stats record")))?;
    let stats: CollectionStats = bincode::deserialize(&stats_bytes)?;

    let mut docs = BTreeMap::new();
    let doc_prefix = keys.doc_prefix();
    for key in store.scan_prefix(namespace, &doc_prefix)? {
        let doc_id: DocId = key[doc_prefix.len()..]
            .parse()
            .map_err(|_| IndexError::codec(format!("malformed document key '{key}'")))?;
        let bytes = store
            .get(namespace, &key)?
            .ok_or_else(|| IndexError::Persistence(format!("{namespace}: key '{key}' vanished during load")))?;
        let doc: DocMeta = bincode::deserialize(&bytes)?;
        docs.insert(doc_id, doc);
    }

    let mut dictionary = HashMap::new();
    let term_prefix = keys.term_prefix();
    for key in store.scan_prefix(namespace, &term_prefix)? {
        let bytes = store
            .get(namespace, &key)?
            .ok_or_else(|| IndexError::Persistence(format!("{namespace}: key '{key}' vanished during load")))?;
        dictionary.insert(key[term_prefix.len()..].to_string(), decode_term(&codec, &bytes)?);
    }

    if docs.len() != meta.num_docs as usize || dictionary.len() != meta.num_terms as usize {
        return Err(IndexError::Persistence(format!(
            "{namespace}: generation {} is incomplete ({} docs, {} terms; expected {} and {})",
            meta.generation,
            docs.len(),
            dictionary.len(),
            meta.num_docs,
            meta.num_terms
        )));
    }

    let all_docs = docs.keys().copied().collect();
    tracing::info!(namespace, generation = meta.generation, num_docs = meta.num_docs, "index loaded");
    let index = InvertedIndex { config: meta.config, dictionary, docs, stats, all_docs };
    Ok(Some((index, meta)))
}

pub fn delete_index<S: Datastore + ?Sized>(store: &S, namespace: &str) -> Result<()> {
    store.drop_namespace(namespace)
}

/// Namespaces holding a committed index.
pub fn list_indices<S: Datastore + ?Sized>(store: &S) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for ns in store.namespaces()? {
        if store.exists(&ns, META_KEY)? {
            names.push(ns);
        }
    }
    Ok(names)
}

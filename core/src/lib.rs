//! A configurable positional inverted index: build from pre-tokenized
//! documents, persist through a pluggable key-value store and answer boolean,
//! phrase and tf-idf ranked queries.

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod self_index;
pub mod store;

pub use builder::{build_index, IndexBuilder, SourceDocument};
pub use config::{Compression, DataStore, IndexConfig, IndexInfo, Optimization, QueryProc};
pub use error::{IndexError, Result};
pub use index::{DocId, DocMeta, InvertedIndex, Position, Posting, TermEntry};
pub use persist::list_indices;
pub use query::{parse_query, Expr, SearchHit, TermNormalizer};
pub use self_index::{IndexState, IndexStats, SelfIndex, DEFAULT_TOP_K};
pub use store::{Datastore, FileStore, MemoryStore};

#[cfg(feature = "sled")]
pub use store::SledStore;

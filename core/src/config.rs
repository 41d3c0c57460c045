//! Index configuration: a fixed record of enumerated choices selected when an
//! index is created and persisted alongside it.

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much per-posting information is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexInfo {
    Boolean,
    WordCount,
    TfIdf,
}

/// Backend the index is persisted through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataStore {
    Memory,
    /// Plain files, one per key.
    Custom,
    /// Embedded key-value store.
    Db,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compression {
    None,
    VarByte,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryProc {
    TermAtATime,
    DocAtATime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Optimization {
    None,
    SkipPointers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub info: IndexInfo,
    pub datastore: DataStore,
    pub compression: Compression,
    pub query_proc: QueryProc,
    pub optimization: Optimization,
    /// Minimum accumulator length at which term-at-a-time AND switches to
    /// skip-pointer intersection. Only consulted with `Optimization::SkipPointers`.
    pub skip_threshold: usize,
}

pub const DEFAULT_SKIP_THRESHOLD: usize = 32;

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            info: IndexInfo::Boolean,
            datastore: DataStore::Memory,
            compression: Compression::None,
            query_proc: QueryProc::TermAtATime,
            optimization: Optimization::None,
            skip_threshold: DEFAULT_SKIP_THRESHOLD,
        }
    }
}

impl IndexConfig {
    pub fn new(
        info: IndexInfo,
        datastore: DataStore,
        compression: Compression,
        query_proc: QueryProc,
        optimization: Optimization,
    ) -> Self {
        Self { info, datastore, compression, query_proc, optimization, skip_threshold: DEFAULT_SKIP_THRESHOLD }
    }

    pub fn with_info(mut self, info: IndexInfo) -> Self {
        self.info = info;
        self
    }

    pub fn with_datastore(mut self, datastore: DataStore) -> Self {
        self.datastore = datastore;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_query_proc(mut self, query_proc: QueryProc) -> Self {
        self.query_proc = query_proc;
        self
    }

    pub fn with_optimization(mut self, optimization: Optimization) -> Self {
        self.optimization = optimization;
        self
    }

    pub fn with_skip_threshold(mut self, skip_threshold: usize) -> Self {
        self.skip_threshold = skip_threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.skip_threshold < 2 {
            return Err(IndexError::InvalidConfig(format!(
                "skip_threshold must be at least 2, got {}",
                self.skip_threshold
            )));
        }
        #[cfg(not(feature = "sled"))]
        if self.datastore == DataStore::Db {
            return Err(IndexError::InvalidConfig("embedded kv backend not compiled in (feature `sled`)".into()));
        }
        Ok(())
    }

    pub fn uses_skip_pointers(&self) -> bool {
        self.optimization == Optimization::SkipPointers
    }

    pub fn stores_term_freqs(&self) -> bool {
        self.info >= IndexInfo::WordCount
    }

    /// Short label such as `SelfIndex-v1.3121D`.
    pub fn identifier(&self) -> String {
        let x = match self.info {
            IndexInfo::Boolean => 1,
            IndexInfo::WordCount => 2,
            IndexInfo::TfIdf => 3,
        };
        let y = match self.datastore {
            DataStore::Memory => 0,
            DataStore::Custom => 1,
            DataStore::Db => 2,
        };
        let z = match self.compression {
            Compression::None => 0,
            Compression::VarByte => 1,
            Compression::Generic => 2,
        };
        let i = match self.optimization {
            Optimization::None => 0,
            Optimization::SkipPointers => 1,
        };
        let q = match self.query_proc {
            QueryProc::TermAtATime => 'T',
            QueryProc::DocAtATime => 'D',
        };
        format!("SelfIndex-v1.{x}{y}{z}{i}{q}")
    }
}

impl fmt::Display for IndexConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

fn unknown(kind: &str, value: &str) -> IndexError {
    IndexError::InvalidConfig(format!("unknown {kind} '{value}'"))
}

impl FromStr for IndexInfo {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BOOLEAN" => Ok(IndexInfo::Boolean),
            "WORDCOUNT" => Ok(IndexInfo::WordCount),
            "TFIDF" => Ok(IndexInfo::TfIdf),
            _ => Err(unknown("index info", s)),
        }
    }
}

impl FromStr for DataStore {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "MEMORY" => Ok(DataStore::Memory),
            "CUSTOM" | "FILE" => Ok(DataStore::Custom),
            "DB1" | "SLED" => Ok(DataStore::Db),
            _ => Err(unknown("datastore", s)),
        }
    }
}

impl FromStr for Compression {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Compression::None),
            "CODE" | "VARBYTE" => Ok(Compression::VarByte),
            "CLIB" | "GENERIC" => Ok(Compression::Generic),
            _ => Err(unknown("compression", s)),
        }
    }
}

impl FromStr for QueryProc {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TERMATAT" | "TAAT" | "TERM_AT_A_TIME" => Ok(QueryProc::TermAtATime),
            "DOCATAT" | "DAAT" | "DOC_AT_A_TIME" => Ok(QueryProc::DocAtATime),
            _ => Err(unknown("query strategy", s)),
        }
    }
}

impl FromStr for Optimization {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "NULL" | "NONE" => Ok(Optimization::None),
            "SKIPPING" | "SKIP_POINTERS" => Ok(Optimization::SkipPointers),
            _ => Err(unknown("optimization", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_harness_flag_names() {
        assert_eq!("TFIDF".parse::<IndexInfo>().unwrap(), IndexInfo::TfIdf);
        assert_eq!("CODE".parse::<Compression>().unwrap(), Compression::VarByte);
        assert_eq!("clib".parse::<Compression>().unwrap(), Compression::Generic);
        assert_eq!("DOCatat".parse::<QueryProc>().unwrap(), QueryProc::DocAtATime);
        assert_eq!("Skipping".parse::<Optimization>().unwrap(), Optimization::SkipPointers);
        assert_eq!("DB1".parse::<DataStore>().unwrap(), DataStore::Db);
        assert!("zip".parse::<Compression>().is_err());
    }

    #[test]
    fn identifier_encodes_every_choice() {
        let config = IndexConfig::new(
            IndexInfo::TfIdf,
            DataStore::Custom,
            Compression::Generic,
            QueryProc::DocAtATime,
            Optimization::SkipPointers,
        );
        assert_eq!(config.identifier(), "SelfIndex-v1.3121D");
        assert_eq!(IndexConfig::default().identifier(), "SelfIndex-v1.1000T");
    }

    #[test]
    fn rejects_degenerate_skip_threshold() {
        assert!(IndexConfig::default().with_skip_threshold(1).validate().is_err());
        assert!(IndexConfig::default().validate().is_ok());
    }
}

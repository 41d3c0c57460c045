use crate::DocId;
use thiserror::Error;

/// Errors surfaced by building, persisting and querying an index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("query syntax error at position {position}: {message}")]
    QuerySyntax { position: usize, message: String },

    #[error("duplicate document id {0}")]
    DuplicateDocument(DocId),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("index '{0}' has not completed a build")]
    NotIndexed(String),

    #[error("index '{0}' is already being built")]
    BuildInProgress(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        IndexError::QuerySyntax { position, message: message.into() }
    }

    pub(crate) fn codec(message: impl Into<String>) -> Self {
        IndexError::Codec(message.into())
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::Persistence(e.to_string())
    }
}

#[cfg(feature = "sled")]
impl From<sled::Error> for IndexError {
    fn from(e: sled::Error) -> Self {
        IndexError::Persistence(e.to_string())
    }
}

impl From<bincode::Error> for IndexError {
    fn from(e: bincode::Error) -> Self {
        IndexError::Codec(e.to_string())
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::Codec(e.to_string())
    }
}

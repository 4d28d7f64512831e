use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The postings store, dictionary, norm table or meta file is missing.
    #[error("index not built: {0} is missing (run build then merge first)")]
    IndexNotBuilt(PathBuf),

    #[error("no block files found in {0}")]
    NoBlocks(PathBuf),

    #[error("no documents found while merging blocks")]
    EmptyCorpus,

    #[error("no stopword list available (custom list: {custom:?}, builtin fallback disabled)")]
    StopwordsUnavailable { custom: Option<PathBuf> },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The query pipeline would preprocess text differently from the build.
    #[error("query pipeline does not match the index: {0}")]
    PipelineMismatch(String),

    /// Persisted document count disagrees with the norm table.
    #[error("index is inconsistent: meta reports {meta_docs} documents, norm table has {norm_docs}")]
    Inconsistent { meta_docs: u64, norm_docs: u64 },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Error::Json { path: path.into(), source }
    }
}

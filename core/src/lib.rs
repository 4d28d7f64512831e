//! Disk-based tf-idf retrieval: text preprocessing, SPIMI block construction,
//! block merging into a term-sorted postings store, and cosine top-k queries.

use serde::{Deserialize, Serialize};

pub mod error;
pub mod merge;
pub mod persist;
pub mod query;
pub mod spimi;
pub mod stemmer;
pub mod stopwords;
pub mod tokenizer;

pub use error::{Error, Result};
pub use merge::{merge_blocks, MergeReport};
pub use query::{QueryEngine, QueryOutcome, ScoredDoc};
pub use spimi::{build_blocks, BuildReport};
pub use tokenizer::{Pipeline, PipelineConfig};

/// Caller-supplied document identifier, unique across the corpus.
pub type DocId = String;

/// One item of the document stream fed to the block builder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<DocId>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: Some(text.into()) }
    }
}

/// A weighted entry in a term's postings list. Encoded on disk as `[doc_id, weight]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(DocId, f64)", into = "(DocId, f64)")]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f64, // tf-idf, not normalized by the document norm
}

impl From<(DocId, f64)> for Posting {
    fn from((doc_id, weight): (DocId, f64)) -> Self {
        Self { doc_id, weight }
    }
}

impl From<Posting> for (DocId, f64) {
    fn from(p: Posting) -> Self {
        (p.doc_id, p.weight)
    }
}

/// One line of the postings store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingsRecord {
    pub term: String,
    pub df: u32,
    pub postings: Vec<Posting>,
}

/// Location of a term's postings record inside the postings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabEntry {
    pub df: u32,
    pub offset: u64,
    pub length: u64,
}

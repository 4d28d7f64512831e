use serde::Serialize;
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::merge::{idf, tf_weight};
use crate::persist::{self, IndexPaths};
use crate::tokenizer::Pipeline;
use crate::{DocId, Posting, PostingsRecord, VocabEntry};

#[derive(Debug, Clone, Serialize)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
}

// Ranking order: higher score first, then lower doc id. `Greater` means ranks higher.
impl Ord for ScoredDoc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score).then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScoredDoc {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredDoc {}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryOutcome {
    /// Best first, at most k entries.
    pub results: Vec<ScoredDoc>,
    /// Number of documents with a nonzero score before top-k selection.
    pub candidates: usize,
    pub elapsed_s: f64,
    pub bytes_read: u64,
}

/// Fixed-capacity selection of the best `k` documents.
struct TopK {
    k: usize,
    heap: BinaryHeap<Reverse<ScoredDoc>>,
}

impl TopK {
    /// `expected` bounds the preallocation; `k` itself may be arbitrarily large.
    fn new(k: usize, expected: usize) -> Self {
        Self { k, heap: BinaryHeap::with_capacity(k.min(expected)) }
    }

    fn offer(&mut self, candidate: ScoredDoc) {
        if self.k == 0 {
            return;
        }
        if self.heap.len() < self.k {
            self.heap.push(Reverse(candidate));
        } else if let Some(mut worst) = self.heap.peek_mut() {
            if candidate > worst.0 {
                *worst = Reverse(candidate);
            }
        }
    }

    fn into_sorted(self) -> Vec<ScoredDoc> {
        // ascending Reverse == best first
        self.heap.into_sorted_vec().into_iter().map(|Reverse(d)| d).collect()
    }
}

fn check_pipeline(paths: &IndexPaths, pipeline: &Pipeline) -> Result<()> {
    let built = persist::load_pipeline_config(paths)?;
    if built.stemmer != pipeline.config().stemmer {
        return Err(Error::PipelineMismatch(format!(
            "index stemmed with {:?}, query pipeline uses {:?}",
            built.stemmer,
            pipeline.config().stemmer
        )));
    }
    let stopwords = persist::load_stopwords(paths)?;
    if &stopwords != pipeline.stopwords() {
        return Err(Error::PipelineMismatch(format!(
            "index built with {} stopwords, query pipeline has {} (sets differ)",
            stopwords.len(),
            pipeline.stopwords().len()
        )));
    }
    Ok(())
}

/// Read-only view over a merged index. The dictionary and norm table are held
/// in memory; postings are fetched per term by offset and length.
pub struct QueryEngine {
    pipeline: Pipeline,
    postings_path: PathBuf,
    vocab: HashMap<String, VocabEntry>,
    doc_norms: HashMap<DocId, f64>,
    num_docs: u64,
}

impl QueryEngine {
    /// Open a merged index. `pipeline` must use the stemmer and the stopword
    /// set the index was built with; see [`Pipeline::for_index`].
    pub fn open(paths: &IndexPaths, pipeline: Pipeline) -> Result<Self> {
        let required = [
            paths.postings(),
            paths.vocab(),
            paths.doc_norms(),
            paths.meta(),
            paths.pipeline(),
            paths.stopwords(),
        ];
        for path in required {
            if !path.exists() {
                return Err(Error::IndexNotBuilt(path));
            }
        }
        check_pipeline(paths, &pipeline)?;
        let vocab = persist::load_vocab(paths)?;
        let doc_norms = persist::load_doc_norms(paths)?;
        let meta = persist::load_meta(paths)?;
        if meta.num_docs != doc_norms.len() as u64 {
            return Err(Error::Inconsistent { meta_docs: meta.num_docs, norm_docs: doc_norms.len() as u64 });
        }
        tracing::info!(terms = vocab.len(), num_docs = meta.num_docs, "index loaded");
        Ok(Self { pipeline, postings_path: paths.postings(), vocab, doc_norms, num_docs: meta.num_docs })
    }

    pub fn num_docs(&self) -> u64 { self.num_docs }

    pub fn num_terms(&self) -> usize { self.vocab.len() }

    pub fn pipeline(&self) -> &Pipeline { &self.pipeline }

    pub fn vocab_entry(&self, term: &str) -> Option<&VocabEntry> { self.vocab.get(term) }

    /// Rank documents by cosine similarity against `text`, keeping the best `k`.
    pub fn query(&self, text: &str, k: usize) -> Result<QueryOutcome> {
        let start = Instant::now();
        let tokens = self.pipeline.preprocess(text);
        if tokens.is_empty() {
            return Ok(QueryOutcome::default());
        }

        // ordered so the floating-point accumulation is reproducible
        let mut q_tf: BTreeMap<String, u64> = BTreeMap::new();
        for t in tokens {
            *q_tf.entry(t).or_insert(0) += 1;
        }

        let mut accum: HashMap<DocId, f64> = HashMap::new();
        let mut q_sq_sum = 0.0f64;
        let mut bytes_read = 0u64;
        for (term, tf) in &q_tf {
            let Some(entry) = self.vocab.get(term) else { continue };
            let q_w = tf_weight(*tf) * idf(self.num_docs, u64::from(entry.df));
            q_sq_sum += q_w * q_w;

            let (postings, read) = self.read_postings(term, entry)?;
            bytes_read += read;
            for Posting { doc_id, weight } in postings {
                *accum.entry(doc_id).or_insert(0.0) += q_w * weight;
            }
        }

        let q_norm = if q_sq_sum > 0.0 { q_sq_sum.sqrt() } else { 1.0 };
        let mut top = TopK::new(k, accum.len());
        let mut candidates = 0usize;
        for (doc_id, dot) in accum {
            if dot == 0.0 {
                continue;
            }
            let doc_norm = self.doc_norms.get(&doc_id).copied().unwrap_or(0.0);
            if doc_norm == 0.0 {
                continue;
            }
            candidates += 1;
            top.offer(ScoredDoc { doc_id, score: dot / (q_norm * doc_norm) });
        }

        let results = top.into_sorted();
        let elapsed_s = start.elapsed().as_secs_f64();
        tracing::debug!(query = text, hits = results.len(), candidates, bytes_read, elapsed_s, "query evaluated");
        Ok(QueryOutcome { results, candidates, elapsed_s, bytes_read })
    }

    /// Fetch one postings record by seek + read. A record that is truncated,
    /// unparsable or filed under a different term yields no postings; the
    /// returned byte count is what was actually read.
    fn read_postings(&self, term: &str, entry: &VocabEntry) -> Result<(Vec<Posting>, u64)> {
        let path = &self.postings_path;
        let mut f = File::open(path).map_err(|e| Error::io(path, e))?;
        f.seek(SeekFrom::Start(entry.offset)).map_err(|e| Error::io(path, e))?;
        let mut buf = Vec::with_capacity(entry.length as usize);
        f.take(entry.length).read_to_end(&mut buf).map_err(|e| Error::io(path, e))?;
        let read = buf.len() as u64;

        if read < entry.length {
            tracing::warn!(term, offset = entry.offset, expected = entry.length, read, "truncated postings record, skipping");
            return Ok((Vec::new(), read));
        }
        match serde_json::from_slice::<PostingsRecord>(&buf) {
            Ok(record) if record.term == term => Ok((record.postings, read)),
            Ok(record) => {
                tracing::warn!(term, found = %record.term, offset = entry.offset, "postings record belongs to another term, skipping");
                Ok((Vec::new(), read))
            }
            Err(err) => {
                tracing::warn!(term, offset = entry.offset, error = %err, "corrupt postings record, skipping");
                Ok((Vec::new(), read))
            }
        }
    }
}

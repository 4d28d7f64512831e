use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::persist::{self, IndexPaths, MetaFile, FORMAT_VERSION};
use crate::{DocId, Posting, PostingsRecord, VocabEntry};

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub num_docs: u64,
    pub num_terms: u64,
    pub blocks_merged: usize,
    pub postings_bytes: u64,
    pub postings_path: PathBuf,
    pub vocab_path: PathBuf,
    pub doc_norms_path: PathBuf,
    pub meta_path: PathBuf,
}

/// `1 + log10(tf)` for tf >= 1, else 0.
pub fn tf_weight(tf: u64) -> f64 {
    if tf == 0 { 0.0 } else { 1.0 + (tf as f64).log10() }
}

/// `log10(n / df)`, 0 when df is 0.
pub fn idf(n: u64, df: u64) -> f64 {
    if df == 0 { 0.0 } else { (n as f64 / df as f64).log10() }
}

/// Merge every block in `blocks_dir` into the postings store, term dictionary,
/// document norm table and meta file under `out`.
///
/// Outputs are staged next to their final paths and renamed into place only
/// once all of them are complete.
pub fn merge_blocks(blocks_dir: &Path, out: &IndexPaths) -> Result<MergeReport> {
    let blocks = persist::list_blocks(blocks_dir)?;
    if blocks.is_empty() {
        return Err(Error::NoBlocks(blocks_dir.to_path_buf()));
    }

    // term -> doc -> cumulative tf
    let mut term_doc_tf: BTreeMap<String, BTreeMap<DocId, u64>> = BTreeMap::new();
    let mut doc_ids: BTreeSet<DocId> = BTreeSet::new();
    for (block_id, path) in &blocks {
        let block = persist::load_block(path)?;
        tracing::debug!(block_id, terms = block.len(), "merging block");
        for (term, postings) in block {
            let docs = term_doc_tf.entry(term).or_default();
            for (doc_id, tf) in postings {
                *docs.entry(doc_id.clone()).or_insert(0) += u64::from(tf);
                doc_ids.insert(doc_id);
            }
        }
    }

    let n = doc_ids.len() as u64;
    if n == 0 {
        return Err(Error::EmptyCorpus);
    }

    persist::ensure_dir(&out.root)?;
    let postings_tmp = persist::staging_path(&out.postings());
    let mut writer = persist::create_file(&postings_tmp)?;
    let mut vocab: BTreeMap<String, VocabEntry> = BTreeMap::new();
    let mut doc_sq_sums: HashMap<DocId, f64> = HashMap::new();
    let mut offset: u64 = 0;

    for (term, docs) in term_doc_tf {
        let df = docs.len() as u32;
        let term_idf = idf(n, u64::from(df));
        let mut postings = Vec::with_capacity(docs.len());
        for (doc_id, tf) in docs {
            let weight = tf_weight(tf) * term_idf;
            *doc_sq_sums.entry(doc_id.clone()).or_insert(0.0) += weight * weight;
            postings.push(Posting { doc_id, weight });
        }

        let record = PostingsRecord { term, df, postings };
        let mut line = serde_json::to_vec(&record).map_err(|e| Error::json(&postings_tmp, e))?;
        line.push(b'\n');
        writer.write_all(&line).map_err(|e| Error::io(&postings_tmp, e))?;

        let length = line.len() as u64;
        vocab.insert(record.term, VocabEntry { df, offset, length });
        offset += length;
    }
    writer.flush().map_err(|e| Error::io(&postings_tmp, e))?;
    drop(writer);

    let doc_norms: BTreeMap<DocId, f64> = doc_sq_sums.into_iter().map(|(d, sq)| (d, sq.sqrt())).collect();
    let meta = MetaFile {
        num_docs: n,
        num_terms: vocab.len() as u64,
        created_at: persist::now_rfc3339(),
        version: FORMAT_VERSION,
    };

    let vocab_tmp = persist::staging_path(&out.vocab());
    let norms_tmp = persist::staging_path(&out.doc_norms());
    let meta_tmp = persist::staging_path(&out.meta());
    persist::write_json(&vocab_tmp, &vocab)?;
    persist::write_json(&norms_tmp, &doc_norms)?;
    persist::write_json(&meta_tmp, &meta)?;

    persist::rename(&postings_tmp, &out.postings())?;
    persist::rename(&vocab_tmp, &out.vocab())?;
    persist::rename(&norms_tmp, &out.doc_norms())?;
    persist::rename(&meta_tmp, &out.meta())?;

    tracing::info!(num_docs = n, num_terms = meta.num_terms, blocks = blocks.len(), bytes = offset, "merge complete");

    Ok(MergeReport {
        num_docs: n,
        num_terms: meta.num_terms,
        blocks_merged: blocks.len(),
        postings_bytes: offset,
        postings_path: out.postings(),
        vocab_path: out.vocab(),
        doc_norms_path: out.doc_norms(),
        meta_path: out.meta(),
    })
}

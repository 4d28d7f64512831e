use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::persist::{self, Block, DocStats, IndexPaths};
use crate::tokenizer::Pipeline;
use crate::{DocId, Document};

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub blocks_dir: PathBuf,
    pub block_paths: Vec<PathBuf>,
    pub docs_indexed: usize,
    pub docs_skipped: usize,
    pub doc_stats_path: PathBuf,
}

impl BuildReport {
    pub fn blocks_written(&self) -> usize { self.block_paths.len() }
}

/// Run the document stream through the pipeline and write blocks of at most
/// `block_doc_limit` documents each under `paths.blocks_dir()`.
///
/// Documents that preprocess to nothing are skipped. At least one block file
/// is always written, even for an empty stream. Block files left over from a
/// previous build are removed first. The pipeline config and the resolved
/// stopword set are saved alongside so queries are preprocessed the same way.
pub fn build_blocks<I>(pipeline: &Pipeline, paths: &IndexPaths, docs: I, block_doc_limit: usize) -> Result<BuildReport>
where
    I: IntoIterator<Item = Document>,
{
    if block_doc_limit == 0 {
        return Err(Error::InvalidConfig("block_doc_limit must be at least 1".into()));
    }
    clear_stale_blocks(paths)?;

    let mut block: Block = Block::new();
    let mut docs_in_block = 0usize;
    let mut block_paths: Vec<PathBuf> = Vec::new();
    let mut doc_stats: BTreeMap<DocId, DocStats> = BTreeMap::new();
    let mut docs_skipped = 0usize;

    for doc in docs {
        let tokens = pipeline.preprocess(doc.text.as_deref().unwrap_or(""));
        if tokens.is_empty() {
            docs_skipped += 1;
            continue;
        }

        let mut tf_counts: HashMap<String, u32> = HashMap::new();
        for term in tokens {
            *tf_counts.entry(term).or_insert(0) += 1;
        }
        let len: u32 = tf_counts.values().sum();
        let raw_tf_norm = tf_counts.values().map(|&tf| f64::from(tf).powi(2)).sum::<f64>().sqrt();
        doc_stats.insert(doc.id.clone(), DocStats { len, raw_tf_norm });

        for (term, tf) in tf_counts {
            block.entry(term).or_default().push((doc.id.clone(), tf));
        }

        docs_in_block += 1;
        if docs_in_block >= block_doc_limit {
            flush_block(paths, &mut block, &mut block_paths, docs_in_block)?;
            docs_in_block = 0;
        }
    }

    if docs_in_block > 0 || block_paths.is_empty() {
        flush_block(paths, &mut block, &mut block_paths, docs_in_block)?;
    }

    persist::save_doc_stats(paths, &doc_stats)?;
    persist::save_pipeline_config(paths, pipeline.config())?;
    persist::save_stopwords(paths, pipeline.stopwords())?;
    tracing::info!(
        docs_indexed = doc_stats.len(),
        docs_skipped,
        blocks = block_paths.len(),
        "block build complete"
    );

    Ok(BuildReport {
        blocks_dir: paths.blocks_dir(),
        block_paths,
        docs_indexed: doc_stats.len(),
        docs_skipped,
        doc_stats_path: paths.doc_stats(),
    })
}

fn flush_block(paths: &IndexPaths, block: &mut Block, block_paths: &mut Vec<PathBuf>, docs: usize) -> Result<()> {
    let block_id = block_paths.len() as u32;
    let path = persist::save_block(paths, block_id, block)?;
    tracing::debug!(block_id, docs, terms = block.len(), "wrote block");
    block_paths.push(path);
    block.clear();
    Ok(())
}

fn clear_stale_blocks(paths: &IndexPaths) -> Result<()> {
    for (block_id, path) in persist::list_blocks(&paths.blocks_dir())? {
        tracing::warn!(block_id, path = %path.display(), "removing block from previous build");
        fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
    }
    Ok(())
}

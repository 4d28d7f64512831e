use crate::error::{Error, Result};
use crate::tokenizer::PipelineConfig;
use crate::{DocId, VocabEntry};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

/// Raw term counts of one block: term -> [(doc_id, tf)].
pub type Block = BTreeMap<String, Vec<(DocId, u32)>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    /// N used for idf at merge time.
    pub num_docs: u64,
    pub num_terms: u64,
    pub created_at: String,
    pub version: u32,
}

/// Diagnostic statistics recorded while building blocks. `raw_tf_norm` is the
/// L2 norm of raw counts and is never used for scoring; see `doc_norms.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocStats {
    pub len: u32,
    pub raw_tf_norm: f64,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn blocks_dir(&self) -> PathBuf { self.root.join("blocks") }
    pub fn block(&self, block_id: u32) -> PathBuf { self.blocks_dir().join(format!("block_{block_id}.json")) }
    pub fn doc_stats(&self) -> PathBuf { self.root.join("doc_stats.json") }
    pub fn postings(&self) -> PathBuf { self.root.join("inverted.jsonl") }
    pub fn vocab(&self) -> PathBuf { self.root.join("vocab.json") }
    pub fn doc_norms(&self) -> PathBuf { self.root.join("doc_norms.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn pipeline(&self) -> PathBuf { self.root.join("pipeline.json") }
    pub fn stopwords(&self) -> PathBuf { self.root.join("stopwords.json") }
}

/// Sibling path used while an output is being written.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn ensure_dir(dir: &Path) -> Result<()> {
    create_dir_all(dir).map_err(|e| Error::io(dir, e))
}

pub fn create_file(path: &Path) -> Result<BufWriter<File>> {
    File::create(path).map(BufWriter::new).map_err(|e| Error::io(path, e))
}

pub fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| Error::io(to, e))
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut f = create_file(path)?;
    serde_json::to_writer(&mut f, value).map_err(|e| Error::json(path, e))?;
    f.flush().map_err(|e| Error::io(path, e))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = File::open(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_reader(BufReader::new(f)).map_err(|e| Error::json(path, e))
}

pub fn save_block(paths: &IndexPaths, block_id: u32, block: &Block) -> Result<PathBuf> {
    ensure_dir(&paths.blocks_dir())?;
    let path = paths.block(block_id);
    write_json(&path, block)?;
    Ok(path)
}

pub fn load_block(path: &Path) -> Result<Block> {
    read_json(path)
}

fn parse_block_id(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix("block_")?.strip_suffix(".json")?.parse().ok()
}

/// Block files in `dir` ordered by numeric block id. Other files are ignored.
pub fn list_blocks(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let mut blocks = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if let Some(id) = parse_block_id(&path) {
            blocks.push((id, path));
        }
    }
    blocks.sort_by_key(|(id, _)| *id);
    Ok(blocks)
}

pub fn save_doc_stats(paths: &IndexPaths, stats: &BTreeMap<DocId, DocStats>) -> Result<()> {
    ensure_dir(&paths.root)?;
    write_json(&paths.doc_stats(), stats)
}

pub fn load_doc_stats(paths: &IndexPaths) -> Result<HashMap<DocId, DocStats>> {
    read_json(&paths.doc_stats())
}

pub fn load_vocab(paths: &IndexPaths) -> Result<HashMap<String, VocabEntry>> {
    read_json(&paths.vocab())
}

pub fn load_doc_norms(paths: &IndexPaths) -> Result<HashMap<DocId, f64>> {
    read_json(&paths.doc_norms())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    read_json(&paths.meta())
}

pub fn save_pipeline_config(paths: &IndexPaths, config: &PipelineConfig) -> Result<()> {
    ensure_dir(&paths.root)?;
    let path = paths.pipeline();
    let json = serde_json::to_string_pretty(config).map_err(|e| Error::json(&path, e))?;
    fs::write(&path, json).map_err(|e| Error::io(&path, e))
}

/// The pipeline config recorded at build time.
pub fn load_pipeline_config(paths: &IndexPaths) -> Result<PipelineConfig> {
    let path = paths.pipeline();
    if !path.exists() {
        return Err(Error::IndexNotBuilt(path));
    }
    read_json(&path)
}

/// Stopword set resolved at build time, stored sorted.
pub fn save_stopwords(paths: &IndexPaths, stopwords: &HashSet<String>) -> Result<()> {
    ensure_dir(&paths.root)?;
    let sorted: BTreeSet<&String> = stopwords.iter().collect();
    write_json(&paths.stopwords(), &sorted)
}

pub fn load_stopwords(paths: &IndexPaths) -> Result<HashSet<String>> {
    read_json(&paths.stopwords())
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into())
}

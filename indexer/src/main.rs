use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use index_core::persist::IndexPaths;
use index_core::stemmer::StemmerKind;
use index_core::{build_blocks, merge_blocks, Document, Pipeline, PipelineConfig, QueryEngine};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_doc_id(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: RawId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "body")]
    text: Option<String>,
}

impl From<InputDoc> for Document {
    fn from(doc: InputDoc) -> Self {
        let parts: Vec<String> = [doc.title, doc.text].into_iter().flatten().filter(|s| !s.trim().is_empty()).collect();
        let text = if parts.is_empty() { None } else { Some(parts.join(" ")) };
        Document { id: doc.id.into_doc_id(), text }
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build, merge and query a blocked tf-idf index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Preprocess documents from JSON/JSONL files or a directory into index blocks
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Documents per block
        #[arg(long, default_value_t = 1000)]
        block_size: usize,
        /// Custom stopword list, one word per line
        #[arg(long)]
        stopwords: Option<PathBuf>,
        /// Fail instead of using the bundled Spanish stopwords
        #[arg(long, default_value_t = false)]
        no_builtin_stopwords: bool,
        /// Stemmer: snowball or suffix
        #[arg(long, default_value = "snowball")]
        stemmer: StemmerKind,
        /// Merge the blocks right after building them
        #[arg(long, default_value_t = false)]
        merge: bool,
    },
    /// Merge blocks into the postings store, dictionary and norm table
    Merge {
        /// Index directory
        #[arg(long)]
        index: String,
    },
    /// Run a ranked query against a merged index
    Query {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: String,
        /// Number of results
        #[arg(long, default_value_t = 10)]
        k: usize,
        /// Print the outcome as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Query text
        text: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, block_size, stopwords, no_builtin_stopwords, stemmer, merge } => {
            let config = PipelineConfig { stopwords_path: stopwords, builtin_stopwords: !no_builtin_stopwords, stemmer };
            build_index(&input, &output, block_size, config, merge)
        }
        Commands::Merge { index } => {
            let paths = IndexPaths::new(&index);
            let report = merge_blocks(&paths.blocks_dir(), &paths)?;
            println!("merged {} blocks: {} documents, {} terms", report.blocks_merged, report.num_docs, report.num_terms);
            Ok(())
        }
        Commands::Query { index, k, json, text } => run_query(&index, k, json, &text),
    }
}

fn build_index(input: &str, output: &str, block_size: usize, config: PipelineConfig, merge: bool) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    let paths = IndexPaths::new(output);
    let mut docs = DocumentStream::new(collect_input_files(Path::new(input)));
    let report = build_blocks(&pipeline, &paths, &mut docs, block_size)?;
    let loaded = docs.finish()?;
    tracing::info!(docs = loaded, input, "read documents");
    println!(
        "wrote {} blocks: {} documents indexed, {} skipped",
        report.blocks_written(),
        report.docs_indexed,
        report.docs_skipped
    );

    if merge {
        let merged = merge_blocks(&paths.blocks_dir(), &paths)?;
        println!("merged {} documents, {} terms", merged.num_docs, merged.num_terms);
    }
    Ok(())
}

fn run_query(index: &str, k: usize, json: bool, text: &str) -> Result<()> {
    let paths = IndexPaths::new(index);
    let engine = QueryEngine::open(&paths, Pipeline::for_index(&paths)?)?;
    let outcome = engine.query(text, k)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    println!("Top-{k} results ({:.4}s, {} bytes read)", outcome.elapsed_s, outcome.bytes_read);
    for (rank, hit) in outcome.results.iter().enumerate() {
        println!("{:>3}. {}\t{:.6}", rank + 1, hit.doc_id, hit.score);
    }
    Ok(())
}

fn collect_input_files(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    files
}

type DocLines = Box<dyn Iterator<Item = Result<Document>>>;

/// Documents read lazily from the input files, one JSONL line at a time.
/// A `.json` file holds one object or an array and is parsed whole.
///
/// Iteration stops at the first error, which is kept in `error` so the caller
/// can report it after handing the stream to the block builder.
struct DocumentStream {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<DocLines>,
    error: Option<anyhow::Error>,
    loaded: usize,
}

impl DocumentStream {
    fn new(files: Vec<PathBuf>) -> Self {
        Self { files: files.into_iter(), current: None, error: None, loaded: 0 }
    }

    fn finish(self) -> Result<usize> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.loaded),
        }
    }
}

impl Iterator for DocumentStream {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        if self.error.is_some() {
            return None;
        }
        loop {
            if let Some(lines) = self.current.as_mut() {
                match lines.next() {
                    Some(Ok(doc)) => {
                        self.loaded += 1;
                        return Some(doc);
                    }
                    Some(Err(e)) => {
                        self.error = Some(e);
                        self.current = None;
                        return None;
                    }
                    None => self.current = None,
                }
            }
            let file = self.files.next()?;
            let opened = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                read_jsonl(&file)
            } else {
                read_json(&file)
            };
            match opened {
                Ok(lines) => self.current = Some(lines),
                Err(e) => {
                    self.error = Some(e);
                    return None;
                }
            }
        }
    }
}

fn read_jsonl(file: &Path) -> Result<DocLines> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let name = file.display().to_string();
    let lines = BufReader::new(f).lines().enumerate().filter_map(move |(lineno, line)| {
        let parsed = line
            .with_context(|| format!("reading {name}"))
            .and_then(|line| {
                if line.trim().is_empty() {
                    return Ok(None);
                }
                let doc: InputDoc =
                    serde_json::from_str(&line).with_context(|| format!("{}:{}", name, lineno + 1))?;
                Ok(Some(Document::from(doc)))
            });
        parsed.transpose()
    });
    Ok(Box::new(lines))
}

fn read_json(file: &Path) -> Result<DocLines> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let reader = BufReader::new(f);
    let json: serde_json::Value =
        serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    let values = match json {
        serde_json::Value::Array(arr) => arr,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => {
            tracing::warn!(file = %file.display(), "ignoring JSON that is neither an object nor an array");
            Vec::new()
        }
    };
    let name = file.display().to_string();
    let docs = values.into_iter().map(move |v| {
        let doc: InputDoc = serde_json::from_value(v).with_context(|| format!("document in {name}"))?;
        Ok(Document::from(doc))
    });
    Ok(Box::new(docs))
}

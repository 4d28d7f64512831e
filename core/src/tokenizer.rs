use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::persist::{self, IndexPaths};
use crate::stemmer::{self, Stem, StemmerKind};
use crate::stopwords;

lazy_static! {
    static ref NON_ALNUM: Regex = Regex::new(r"[^a-z0-9\s]").expect("valid regex");
}

/// Preprocessing settings. The same config must be used to build and to query an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Custom stopword list, one word per line.
    #[serde(default)]
    pub stopwords_path: Option<PathBuf>,
    /// Allow the bundled Spanish list when no custom list can be read.
    #[serde(default = "default_true")]
    pub builtin_stopwords: bool,
    #[serde(default)]
    pub stemmer: StemmerKind,
}

fn default_true() -> bool { true }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { stopwords_path: None, builtin_stopwords: true, stemmer: StemmerKind::default() }
    }
}

/// Latin letters with no canonical decomposition, spelled out in ASCII.
fn fold_letter(c: char) -> Option<&'static str> {
    match c {
        'ß' => Some("ss"),
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        'ø' => Some("o"),
        'đ' | 'ð' => Some("d"),
        'ł' => Some("l"),
        'þ' => Some("th"),
        'ı' => Some("i"),
        _ => None,
    }
}

/// Strip diacritics, lowercase, replace anything outside `[a-z0-9\s]` with a
/// space and collapse whitespace.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut folded = String::with_capacity(text.len());
    let letters = text.nfkd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase);
    for c in letters {
        match fold_letter(c) {
            Some(ascii) => folded.push_str(ascii),
            None => folded.push(c),
        }
    }
    let cleaned = NON_ALNUM.replace_all(&folded, " ");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text).split_whitespace().map(str::to_string).collect()
}

/// Text pipeline with its stopword set and stemmer resolved up front.
pub struct Pipeline {
    config: PipelineConfig,
    stopwords: HashSet<String>,
    stemmer: Box<dyn Stem>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let custom = config.stopwords_path.as_deref();
        let stopwords = stopwords::load(custom, config.builtin_stopwords)?;
        let stemmer = stemmer::for_kind(config.stemmer);
        tracing::debug!(stopwords = stopwords.len(), stemmer = ?config.stemmer, "text pipeline ready");
        Ok(Self { config, stopwords, stemmer })
    }

    /// Pipeline with an already resolved stopword set.
    pub fn with_stopwords(config: PipelineConfig, stopwords: HashSet<String>) -> Self {
        let stemmer = stemmer::for_kind(config.stemmer);
        Self { config, stopwords, stemmer }
    }

    /// Rebuild the pipeline an index was built with, using the stopword set
    /// saved next to it rather than re-reading the configured list.
    pub fn for_index(paths: &IndexPaths) -> Result<Self> {
        let config = persist::load_pipeline_config(paths)?;
        if !paths.stopwords().exists() {
            return Err(Error::IndexNotBuilt(paths.stopwords()));
        }
        let stopwords = persist::load_stopwords(paths)?;
        tracing::debug!(
            stopwords = stopwords.len(),
            stemmer = ?config.stemmer,
            "index pipeline restored"
        );
        Ok(Self::with_stopwords(config, stopwords))
    }

    pub fn config(&self) -> &PipelineConfig { &self.config }

    pub fn stopwords(&self) -> &HashSet<String> { &self.stopwords }

    pub fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }

    pub fn remove_stopwords(&self, tokens: Vec<String>) -> Vec<String> {
        tokens.into_iter().filter(|t| !self.is_stopword(t)).collect()
    }

    pub fn stem(&self, tokens: Vec<String>) -> Vec<String> {
        tokens.iter().map(|t| self.stemmer.stem(t)).collect()
    }

    /// normalize -> tokenize -> remove stopwords -> stem.
    pub fn preprocess(&self, text: &str) -> Vec<String> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return tokens;
        }
        self.stem(self.remove_stopwords(tokens))
    }
}

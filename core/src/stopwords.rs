use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::tokenizer::normalize;

/// Spanish list bundled with the crate, used when no custom list is configured.
const BUILTIN_SPANISH: &str = include_str!("../resources/stopwords_es.txt");

/// Resolve the stopword set: the custom list if it can be read, else the
/// bundled list if allowed. Every word is passed through [`normalize`] so
/// lookups agree with tokenized text.
pub fn load(custom: Option<&Path>, builtin_fallback: bool) -> Result<HashSet<String>> {
    if let Some(path) = custom {
        match fs::read_to_string(path) {
            Ok(text) => {
                let words = parse_word_list(&text);
                tracing::debug!(path = %path.display(), words = words.len(), "loaded custom stopwords");
                return Ok(words);
            }
            Err(err) if builtin_fallback => {
                tracing::warn!(path = %path.display(), error = %err, "custom stopwords unreadable, using builtin list");
            }
            Err(_) => {
                return Err(Error::StopwordsUnavailable { custom: Some(path.to_path_buf()) });
            }
        }
    }
    if !builtin_fallback {
        return Err(Error::StopwordsUnavailable { custom: None });
    }
    Ok(parse_word_list(BUILTIN_SPANISH))
}

/// One word per line; blank lines and `#` comments are ignored.
pub fn parse_word_list(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .flat_map(|l| normalize(l).split(' ').map(str::to_string).collect::<Vec<_>>())
        .filter(|w| !w.is_empty())
        .collect()
}

use rust_stemmers::{Algorithm, Stemmer as SnowballImpl};
use serde::{Deserialize, Serialize};

/// Which stemmer a pipeline uses. Fixed when the pipeline is constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StemmerKind {
    /// Snowball rules for Spanish.
    #[default]
    Snowball,
    /// Table-driven suffix stripping.
    Suffix,
}

impl std::str::FromStr for StemmerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snowball" => Ok(StemmerKind::Snowball),
            "suffix" => Ok(StemmerKind::Suffix),
            other => Err(format!("unknown stemmer '{other}' (expected snowball or suffix)")),
        }
    }
}

pub trait Stem: Send + Sync {
    fn stem(&self, token: &str) -> String;
}

pub struct SnowballStemmer(SnowballImpl);

impl SnowballStemmer {
    pub fn spanish() -> Self {
        Self(SnowballImpl::create(Algorithm::Spanish))
    }
}

impl Stem for SnowballStemmer {
    fn stem(&self, token: &str) -> String {
        self.0.stem(token).into_owned()
    }
}

// Accent-stripped, longest first within each table.
const NOUN_ADJ_SUFFIXES: &[&str] = &[
    "amientos", "imientos", "aciones", "amiento", "imiento", "idades", "istas", "acion", "anzas",
    "ancia", "ibles", "mente", "idad", "ismo", "ista", "able",
];
const VERB_SUFFIXES: &[&str] = &[
    "iendo", "ando", "aria", "eria", "iria", "ado", "ido", "are", "ere", "ire", "ar", "er", "ir",
];

const MIN_WORD_CHARS: usize = 5;
const MIN_STEM_CHARS: usize = 3;

/// Heuristic Spanish stemmer: strips the first matching noun/adjective
/// suffix, otherwise the first matching verb ending.
#[derive(Debug, Default, Clone, Copy)]
pub struct SuffixStemmer;

impl SuffixStemmer {
    fn strip<'a>(word: &'a str, suffixes: &[&str]) -> Option<&'a str> {
        suffixes.iter().find_map(|s| {
            let stem = word.strip_suffix(s)?;
            (stem.chars().count() >= MIN_STEM_CHARS).then_some(stem)
        })
    }
}

impl Stem for SuffixStemmer {
    fn stem(&self, token: &str) -> String {
        if token.chars().count() < MIN_WORD_CHARS {
            return token.to_string();
        }
        Self::strip(token, NOUN_ADJ_SUFFIXES)
            .or_else(|| Self::strip(token, VERB_SUFFIXES))
            .unwrap_or(token)
            .to_string()
    }
}

pub fn for_kind(kind: StemmerKind) -> Box<dyn Stem> {
    match kind {
        StemmerKind::Snowball => Box::new(SnowballStemmer::spanish()),
        StemmerKind::Suffix => Box::new(SuffixStemmer),
    }
}

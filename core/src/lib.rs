//! Rhyme highlighting core engine.
//! Groups words by a surface-letter approximation of their rhyme sound and
//! keeps highlight spans for those groups in sync with a document that is
//! being edited.

use std::{sync::Arc, time::Duration};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod group;
pub mod highlight;
pub mod phonetic;
pub mod scheduler;
pub mod session;
pub mod tokenize;

pub use group::{group_by_ending, PatternFilter, RhymeGroups};
pub use highlight::{
    find_occurrences, highlight_spans, DocumentStats, HighlightApplier, HighlightSpan,
    HighlightUpdate, Styling,
};
pub use phonetic::{phonetic_ending, words_rhyme};
pub use scheduler::{AnalysisState, DebounceScheduler};
pub use session::{AnalysisJob, ApplyOutcome, EditorSession};
pub use tokenize::tokenize;

/// Top-level configuration for the detector and highlighting pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RhymeConfig {
    /// Quiet period after the last edit before analysis runs.
    pub debounce_ms: u64,
    pub min_word_length: usize,
    /// Groups larger than this are treated as noise.
    pub max_group_size: usize,
    /// Inflectional endings suppressed once their group grows past the threshold.
    pub common_suffixes: Vec<String>,
    pub common_suffix_threshold: usize,
    /// Highlight colors as `#rrggbb`; groups cycle through them in key order.
    pub palette: Vec<String>,
    pub highlighting: bool,
}

impl Default for RhymeConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            min_word_length: 3,
            max_group_size: 15,
            common_suffixes: vec![
                "e".into(),
                "s".into(),
                "ed".into(),
                "er".into(),
                "ly".into(),
                "ing".into(),
                "ion".into(),
                "tion".into(),
            ],
            common_suffix_threshold: 8,
            palette: vec![
                "#dc2626".into(),
                "#2563eb".into(),
                "#16a34a".into(),
                "#ea580c".into(),
                "#9333ea".into(),
                "#0ea5e9".into(),
                "#db2777".into(),
                "#ca8a04".into(),
            ],
            highlighting: true,
        }
    }
}

impl RhymeConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color regex"));

/// Rejected configuration values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("palette must contain at least one color")]
    EmptyPalette,
    #[error("invalid palette color `{0}`, expected #rrggbb")]
    InvalidColor(String),
    #[error("min_word_length must be at least 1")]
    ZeroMinWordLength,
    #[error("max_group_size must be at least 2, got {0}")]
    MaxGroupSizeTooSmall(usize),
}

/// Groups found in one exact snapshot of a document.
///
/// The text is kept alongside the groups so the result can never be applied
/// to a document it was not computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    text: Arc<str>,
    groups: RhymeGroups,
}

impl AnalysisResult {
    pub fn new(text: impl Into<Arc<str>>, groups: RhymeGroups) -> Self {
        Self {
            text: text.into(),
            groups,
        }
    }

    /// A result with no rhymes, used when analysis of `text` failed.
    pub fn empty(text: impl Into<Arc<str>>) -> Self {
        Self::new(text, RhymeGroups::new())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn groups(&self) -> &RhymeGroups {
        &self.groups
    }

    pub fn into_groups(self) -> RhymeGroups {
        self.groups
    }

    /// Sum of group sizes.
    pub fn rhyme_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Detector encapsulates a validated configuration for reuse across passes.
#[derive(Debug, Clone)]
pub struct RhymeDetector {
    config: RhymeConfig,
    filter: PatternFilter,
}

impl RhymeDetector {
    pub fn new(config: RhymeConfig) -> Result<Self, ConfigError> {
        if config.palette.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        if let Some(bad) = config.palette.iter().find(|c| !HEX_COLOR_RE.is_match(c)) {
            return Err(ConfigError::InvalidColor(bad.clone()));
        }
        if config.min_word_length == 0 {
            return Err(ConfigError::ZeroMinWordLength);
        }
        if config.max_group_size < 2 {
            return Err(ConfigError::MaxGroupSizeTooSmall(config.max_group_size));
        }
        let filter = PatternFilter::new(
            config.max_group_size,
            &config.common_suffixes,
            config.common_suffix_threshold,
        );
        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &RhymeConfig {
        &self.config
    }

    pub fn palette_len(&self) -> usize {
        self.config.palette.len()
    }

    /// Color for a palette index, wrapping around the palette.
    pub fn color(&self, palette_index: usize) -> &str {
        &self.config.palette[palette_index % self.config.palette.len()]
    }

    pub fn tokens(&self, text: &str) -> Vec<String> {
        tokenize(text, self.config.min_word_length)
    }

    /// Run tokenize, group and filter over `text`.
    pub fn find_rhymes(&self, text: &str) -> RhymeGroups {
        let tokens = self.tokens(text);
        let groups = group_by_ending(tokens.as_slice());
        log::trace!(
            "{} tokens formed {} raw rhyme groups",
            tokens.len(),
            groups.len()
        );
        self.filter.apply(groups)
    }

    /// Analyse a snapshot, pairing the groups with the text they came from.
    pub fn analyze(&self, text: impl Into<Arc<str>>) -> AnalysisResult {
        let text = text.into();
        let groups = self.find_rhymes(&text);
        AnalysisResult { text, groups }
    }

    pub fn words_rhyme(&self, first: &str, second: &str) -> bool {
        words_rhyme(first, second)
    }
}

impl Default for RhymeDetector {
    fn default() -> Self {
        let config = RhymeConfig::default();
        let filter = PatternFilter::new(
            config.max_group_size,
            &config.common_suffixes,
            config.common_suffix_threshold,
        );
        Self { config, filter }
    }
}

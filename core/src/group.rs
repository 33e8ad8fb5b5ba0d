//! Bucketing tokens by phonetic key and pruning noisy buckets.

use std::collections::{BTreeMap, HashSet};

use crate::phonetic::phonetic_ending;

/// Minimum key length worth grouping on.
pub const MIN_KEY_LENGTH: usize = 2;

/// Phonetic key to member words in first-seen order.
///
/// Keyed by a `BTreeMap` so iteration (and therefore palette assignment and
/// overlap resolution) is always in key order.
pub type RhymeGroups = BTreeMap<String, Vec<String>>;

/// Group `tokens` by phonetic ending, keeping only buckets with two or more members.
pub fn group_by_ending<S: AsRef<str>>(tokens: &[S]) -> RhymeGroups {
    let mut buckets: RhymeGroups = BTreeMap::new();
    for token in tokens {
        let token: &str = token.as_ref();
        let Some(key) = phonetic_ending(token) else {
            continue;
        };
        if key.chars().count() < MIN_KEY_LENGTH {
            continue;
        }
        let bucket = buckets.entry(key).or_default();
        if !bucket.iter().any(|w| w == token) {
            bucket.push(token.to_string());
        }
    }
    buckets.retain(|_, words| words.len() >= 2);
    buckets
}

/// Drops groups judged to be false positives.
///
/// Each predicate looks only at a group's own key and size, so the order in
/// which they run does not change the outcome.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    max_group_size: usize,
    common_suffixes: HashSet<String>,
    common_suffix_threshold: usize,
}

impl PatternFilter {
    pub fn new<I, S>(max_group_size: usize, common_suffixes: I, common_suffix_threshold: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            max_group_size,
            common_suffixes: common_suffixes
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .collect(),
            common_suffix_threshold,
        }
    }

    /// Whether a group with this key and size survives filtering.
    pub fn keeps(&self, key: &str, size: usize) -> bool {
        if size > self.max_group_size {
            return false;
        }
        if key.chars().count() < MIN_KEY_LENGTH {
            return false;
        }
        !(self.common_suffixes.contains(key) && size > self.common_suffix_threshold)
    }

    pub fn apply(&self, mut groups: RhymeGroups) -> RhymeGroups {
        let before = groups.len();
        groups.retain(|key, words| self.keeps(key, words.len()));
        log::trace!("pattern filter kept {} of {} groups", groups.len(), before);
        groups
    }
}

//! Mapping rhyme groups back onto the live document.

use aho_corasick::AhoCorasickBuilder;
use serde::{Deserialize, Serialize};

use crate::group::RhymeGroups;
use crate::AnalysisResult;

/// A styled range of the document, in UTF-8 byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub start: usize,
    pub len: usize,
    pub palette_index: usize,
}

impl HighlightSpan {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Counters shown by the status display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub words: usize,
    pub chars: usize,
    pub rhymes: usize,
}

impl DocumentStats {
    pub fn compute(text: &str, groups: &RhymeGroups) -> Self {
        Self {
            words: text.split_whitespace().count(),
            chars: text.chars().count(),
            rhymes: groups.values().map(Vec::len).sum(),
        }
    }
}

/// Per-byte styling of a document: `None` is the default style, otherwise a palette index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Styling {
    cells: Vec<Option<usize>>,
}

impl Styling {
    /// Reset every byte of a document of `len` bytes to the default style.
    pub fn reset(&mut self, len: usize) {
        self.cells.clear();
        self.cells.resize(len, None);
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Apply a span, overwriting whatever styling the range had. Out-of-range bytes are ignored.
    pub fn apply(&mut self, span: &HighlightSpan) {
        let end = span.end().min(self.cells.len());
        let start = span.start.min(end);
        for cell in &mut self.cells[start..end] {
            *cell = Some(span.palette_index);
        }
    }

    pub fn style_at(&self, offset: usize) -> Option<usize> {
        self.cells.get(offset).copied().flatten()
    }

    pub fn is_unstyled(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Maximal runs of identical non-default styling, in document order.
    pub fn runs(&self) -> Vec<HighlightSpan> {
        let mut runs: Vec<HighlightSpan> = Vec::new();
        for (offset, cell) in self.cells.iter().enumerate() {
            let Some(palette_index) = *cell else {
                continue;
            };
            match runs.last_mut() {
                Some(last) if last.end() == offset && last.palette_index == palette_index => {
                    last.len += 1;
                }
                _ => runs.push(HighlightSpan {
                    start: offset,
                    len: 1,
                    palette_index,
                }),
            }
        }
        runs
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Whether `[start, end)` sits on word boundaries within `text`.
fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before_ok = text[..start]
        .chars()
        .next_back()
        .map_or(true, |c| !is_word_char(c));
    let after_ok = text[end..].chars().next().map_or(true, |c| !is_word_char(c));
    before_ok && after_ok
}

/// Every whole-word, ASCII case-insensitive occurrence of any of `words` in `text`.
///
/// Returned as `(start, len)` pairs sorted by position. Matches may overlap
/// when the words themselves overlap.
pub fn find_occurrences<S: AsRef<str>>(text: &str, words: &[S]) -> Vec<(usize, usize)> {
    let patterns: Vec<&str> = words
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter(|w| !w.is_empty())
        .collect();
    if patterns.is_empty() || text.is_empty() {
        return Vec::new();
    }
    let matcher = AhoCorasickBuilder::new()
        .ascii_case_insensitive(true)
        .build(&patterns);
    let mut found: Vec<(usize, usize)> = matcher
        .find_overlapping_iter(text)
        .filter(|m| {
            text.is_char_boundary(m.start())
                && text.is_char_boundary(m.end())
                && on_word_boundary(text, m.start(), m.end())
        })
        .map(|m| (m.start(), m.end() - m.start()))
        .collect();
    found.sort_unstable();
    found.dedup();
    found
}

/// Highlight spans for `groups` over `text`, in application order.
///
/// Groups are visited in key order and the n-th group gets palette index
/// `n % palette_len`. Applying the spans in order yields the final styling;
/// where groups overlap the later one wins.
pub fn highlight_spans(text: &str, groups: &RhymeGroups, palette_len: usize) -> Vec<HighlightSpan> {
    let palette_len = palette_len.max(1);
    let mut spans = Vec::new();
    for (counter, words) in groups.values().enumerate() {
        let palette_index = counter % palette_len;
        spans.extend(
            find_occurrences(text, words.as_slice())
                .into_iter()
                .map(|(start, len)| HighlightSpan {
                    start,
                    len,
                    palette_index,
                }),
        );
    }
    spans
}

/// Outcome of a successful application: what the renderer and status display consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightUpdate {
    pub spans: Vec<HighlightSpan>,
    pub stats: DocumentStats,
}

/// Applies analysis results to a document's styling, refusing stale ones.
#[derive(Debug, Clone, Copy)]
pub struct HighlightApplier {
    palette_len: usize,
}

impl HighlightApplier {
    pub fn new(palette_len: usize) -> Self {
        Self {
            palette_len: palette_len.max(1),
        }
    }

    pub fn palette_len(&self) -> usize {
        self.palette_len
    }

    /// Apply `result` to `styling` if it was computed from `live_text`.
    ///
    /// Returns `None` without touching `styling` when the result is stale.
    pub fn apply(
        &self,
        result: &AnalysisResult,
        live_text: &str,
        styling: &mut Styling,
    ) -> Option<HighlightUpdate> {
        if result.text() != live_text {
            log::debug!(
                "discarding stale analysis ({} bytes analysed, {} bytes live)",
                result.text().len(),
                live_text.len()
            );
            return None;
        }
        styling.reset(live_text.len());
        let spans = highlight_spans(live_text, result.groups(), self.palette_len);
        for span in &spans {
            styling.apply(span);
        }
        Some(HighlightUpdate {
            spans,
            stats: DocumentStats::compute(live_text, result.groups()),
        })
    }
}

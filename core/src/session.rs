//! Control-side state for one edited document.
//!
//! [`EditorSession`] owns the document text, its styling and the debounce
//! scheduler. It never runs the pipeline itself: [`EditorSession::poll`] hands
//! out an [`AnalysisJob`] for a worker, and the worker's result comes back
//! through [`EditorSession::complete`] on the same context that owns the text.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    AnalysisResult, AnalysisState, DebounceScheduler, DocumentStats, HighlightApplier,
    HighlightSpan, HighlightUpdate, RhymeDetector, RhymeGroups, Styling,
};

/// Immutable snapshot plus everything needed to analyse it off the control context.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    snapshot: Arc<str>,
    detector: Arc<RhymeDetector>,
}

impl AnalysisJob {
    pub fn snapshot(&self) -> &Arc<str> {
        &self.snapshot
    }

    pub fn run(self) -> AnalysisResult {
        self.detector.analyze(self.snapshot)
    }
}

/// What happened to a completed analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(HighlightUpdate),
    /// The document changed after the snapshot was taken; nothing was touched.
    Stale,
    /// Highlighting was switched off while the pass ran.
    Disabled,
}

pub struct EditorSession {
    detector: Arc<RhymeDetector>,
    applier: HighlightApplier,
    scheduler: DebounceScheduler,
    text: String,
    styling: Styling,
    groups: RhymeGroups,
    spans: Vec<HighlightSpan>,
    enabled: bool,
}

impl EditorSession {
    pub fn new(detector: Arc<RhymeDetector>) -> Self {
        let applier = HighlightApplier::new(detector.palette_len());
        let scheduler = DebounceScheduler::new(detector.config().debounce());
        let enabled = detector.config().highlighting;
        Self {
            detector,
            applier,
            scheduler,
            text: String::new(),
            styling: Styling::default(),
            groups: RhymeGroups::new(),
            spans: Vec::new(),
            enabled,
        }
    }

    pub fn detector(&self) -> &Arc<RhymeDetector> {
        &self.detector
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> AnalysisState {
        self.scheduler.state()
    }

    pub fn debounce(&self) -> Duration {
        self.scheduler.delay()
    }

    pub fn styling(&self) -> &Styling {
        &self.styling
    }

    /// Spans of the last applied result, in application order.
    pub fn spans(&self) -> &[HighlightSpan] {
        &self.spans
    }

    pub fn groups(&self) -> &RhymeGroups {
        &self.groups
    }

    pub fn highlighting_enabled(&self) -> bool {
        self.enabled
    }

    /// When the driver should next call [`Self::poll`].
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.deadline()
    }

    /// Live counters: words and characters of the current text, rhymes of the last applied pass.
    pub fn stats(&self) -> DocumentStats {
        let mut stats = DocumentStats::compute(&self.text, &RhymeGroups::new());
        stats.rhymes = self.groups.values().map(Vec::len).sum();
        stats
    }

    /// Replace the document with freshly loaded text.
    pub fn load(&mut self, text: impl Into<String>, now: Instant) {
        self.styling.reset(0);
        self.spans.clear();
        self.groups.clear();
        self.edit(text, now);
    }

    /// Replace the whole document text after an edit.
    pub fn edit(&mut self, text: impl Into<String>, now: Instant) {
        self.text = text.into();
        if self.enabled {
            self.scheduler.on_edit(now);
        }
    }

    /// Start a pass if the debounce deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<AnalysisJob> {
        if !self.enabled || !self.scheduler.fire_if_due(now) {
            return None;
        }
        log::debug!("starting analysis of {} bytes", self.text.len());
        Some(AnalysisJob {
            snapshot: Arc::from(self.text.as_str()),
            detector: Arc::clone(&self.detector),
        })
    }

    /// Accept the result of the running pass.
    pub fn complete(&mut self, result: AnalysisResult, now: Instant) -> ApplyOutcome {
        let outcome = if !self.enabled {
            ApplyOutcome::Disabled
        } else {
            match self.applier.apply(&result, &self.text, &mut self.styling) {
                Some(update) => {
                    self.spans = update.spans.clone();
                    self.groups = result.into_groups();
                    ApplyOutcome::Applied(update)
                }
                None => ApplyOutcome::Stale,
            }
        };
        self.scheduler.on_complete(now);
        if !self.enabled {
            self.scheduler.cancel_pending();
        }
        outcome
    }

    /// Switch highlighting on or off. Turning it off clears all styling at once.
    pub fn set_highlighting_enabled(&mut self, enabled: bool, now: Instant) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            self.scheduler.on_edit(now);
        } else {
            self.scheduler.cancel_pending();
            self.styling.reset(self.text.len());
            self.spans.clear();
            self.groups.clear();
        }
    }
}

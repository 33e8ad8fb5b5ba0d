//! Debounce state machine coordinating edits with background analysis.
//!
//! The scheduler owns no timer: callers pass the current instant into every
//! transition and sleep until [`DebounceScheduler::deadline`].

use std::time::{Duration, Instant};

/// Lifecycle of the analysis pass for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisState {
    Idle,
    /// Timer armed; fires at the deadline unless another edit re-arms it.
    Scheduled { deadline: Instant },
    /// Snapshot taken, pipeline executing off the control context.
    Running,
    /// An edit arrived while running; a fresh pass is due on completion.
    RunningWithPendingEdit,
}

impl AnalysisState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            AnalysisState::Running | AnalysisState::RunningWithPendingEdit
        )
    }
}

#[derive(Debug, Clone)]
pub struct DebounceScheduler {
    delay: Duration,
    state: AnalysisState,
}

impl DebounceScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: AnalysisState::Idle,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> AnalysisState {
        self.state
    }

    /// Instant at which the armed timer fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            AnalysisState::Scheduled { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Record an edit. Restarts the quiet period, or marks the running pass as outdated.
    pub fn on_edit(&mut self, now: Instant) {
        self.state = match self.state {
            AnalysisState::Idle | AnalysisState::Scheduled { .. } => AnalysisState::Scheduled {
                deadline: now + self.delay,
            },
            AnalysisState::Running | AnalysisState::RunningWithPendingEdit => {
                AnalysisState::RunningWithPendingEdit
            }
        };
    }

    /// Fire the timer if its deadline has passed. Returns `true` when a pass should start.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.state {
            AnalysisState::Scheduled { deadline } if now >= deadline => {
                self.state = AnalysisState::Running;
                true
            }
            _ => false,
        }
    }

    /// Record completion of the running pass.
    ///
    /// Returns `true` when an edit was missed and the timer has been re-armed.
    pub fn on_complete(&mut self, now: Instant) -> bool {
        match self.state {
            AnalysisState::Running => {
                self.state = AnalysisState::Idle;
                false
            }
            AnalysisState::RunningWithPendingEdit => {
                log::debug!("edit arrived during analysis, re-arming");
                self.state = AnalysisState::Scheduled {
                    deadline: now + self.delay,
                };
                true
            }
            AnalysisState::Idle | AnalysisState::Scheduled { .. } => {
                log::warn!("analysis completed while {:?}", self.state);
                false
            }
        }
    }

    /// Drop any armed timer. A running pass still completes through [`Self::on_complete`].
    pub fn cancel_pending(&mut self) {
        self.state = match self.state {
            AnalysisState::Scheduled { .. } => AnalysisState::Idle,
            AnalysisState::RunningWithPendingEdit => AnalysisState::Running,
            other => other,
        };
    }
}

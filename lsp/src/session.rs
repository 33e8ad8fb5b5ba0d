//! Per-document control task.
//!
//! Each open document gets one tokio task that owns its [`EditorSession`].
//! Edits arrive over a channel, the debounce deadline is awaited with
//! `sleep_until`, analysis runs on the blocking pool, and its completion is
//! received back on this same task before any styling is touched.

use std::sync::Arc;

use rhyme_core::{
    AnalysisResult, ApplyOutcome, DocumentStats, EditorSession, HighlightUpdate, RhymeDetector,
};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};

/// Messages from the server to a document's control task.
#[derive(Debug)]
pub enum SessionEvent {
    Edit {
        text: String,
        version: i32,
    },
    SetHighlighting(bool),
    /// Swap in a new detector. `highlighting` is the client's toggle, if it set one;
    /// otherwise the detector's own config decides.
    Reconfigure {
        detector: Arc<RhymeDetector>,
        highlighting: Option<bool>,
    },
}

/// A fresh set of highlights ready for the client.
#[derive(Debug, Clone)]
pub struct Published {
    pub version: i32,
    pub text: Arc<str>,
    /// Detector whose palette the span indices refer to.
    pub detector: Arc<RhymeDetector>,
    pub update: HighlightUpdate,
}

/// What a control task reports back to the server.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Replaces every highlight previously sent for the document.
    Highlights(Published),
    /// Live counters after an edit.
    Stats { version: i32, stats: DocumentStats },
}

/// Sender side of a running control task. Dropping it stops the task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
    pub fn spawn(
        detector: Arc<RhymeDetector>,
        text: String,
        version: i32,
        out: mpsc::UnboundedSender<Outbound>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut session = EditorSession::new(detector);
        session.load(text, Instant::now().into_std());
        let task = tokio::spawn(run(session, version, rx, out));
        (Self { tx }, task)
    }

    /// Returns `false` once the task has stopped.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

struct InFlight {
    snapshot: Arc<str>,
    /// Session generation the pass was started for.
    generation: u64,
    task: JoinHandle<AnalysisResult>,
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn join(in_flight: &mut Option<InFlight>) -> Result<AnalysisResult, JoinError> {
    match in_flight {
        Some(flight) => (&mut flight.task).await,
        None => std::future::pending().await,
    }
}

/// Feed a finished pass back into the session.
///
/// A pass that failed counts as finding no rhymes in its snapshot and still
/// goes through the staleness check.
fn settle(
    session: &mut EditorSession,
    snapshot: Arc<str>,
    joined: Result<AnalysisResult, JoinError>,
    now: std::time::Instant,
) -> ApplyOutcome {
    let result = joined.unwrap_or_else(|err| {
        log::warn!("rhyme analysis failed, treating as no rhymes: {err}");
        AnalysisResult::empty(snapshot)
    });
    session.complete(result, now)
}

fn cleared(session: &EditorSession, version: i32) -> Outbound {
    Outbound::Highlights(Published {
        version,
        text: Arc::from(session.text()),
        detector: Arc::clone(session.detector()),
        update: HighlightUpdate {
            spans: Vec::new(),
            stats: session.stats(),
        },
    })
}

async fn run(
    mut session: EditorSession,
    mut version: i32,
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
    out: mpsc::UnboundedSender<Outbound>,
) {
    let mut in_flight: Option<InFlight> = None;
    let mut generation: u64 = 0;
    loop {
        let deadline = session.next_deadline().map(Instant::from_std);
        tokio::select! {
            event = rx.recv() => {
                let now = Instant::now().into_std();
                let reply = match event {
                    Some(SessionEvent::Edit { text, version: v }) => {
                        version = v;
                        session.edit(text, now);
                        Some(Outbound::Stats { version, stats: session.stats() })
                    }
                    Some(SessionEvent::SetHighlighting(enabled)) => {
                        session.set_highlighting_enabled(enabled, now);
                        (!enabled).then(|| cleared(&session, version))
                    }
                    Some(SessionEvent::Reconfigure { detector, highlighting }) => {
                        let text = session.text().to_string();
                        let enabled = highlighting.unwrap_or(detector.config().highlighting);
                        session = EditorSession::new(detector);
                        session.set_highlighting_enabled(enabled, now);
                        session.load(text, now);
                        // A pass already running finishes, but its result is dropped.
                        generation += 1;
                        (!enabled).then(|| cleared(&session, version))
                    }
                    None => break,
                };
                if let Some(reply) = reply {
                    if out.send(reply).is_err() {
                        break;
                    }
                }
            }
            _ = wait_for(deadline), if deadline.is_some() && in_flight.is_none() => {
                if let Some(job) = session.poll(Instant::now().into_std()) {
                    let snapshot = Arc::clone(job.snapshot());
                    let task = tokio::task::spawn_blocking(move || job.run());
                    in_flight = Some(InFlight { snapshot, generation, task });
                }
            }
            joined = join(&mut in_flight), if in_flight.is_some() => {
                let Some(flight) = in_flight.take() else {
                    continue;
                };
                if flight.generation != generation {
                    log::debug!("dropping analysis started under a previous configuration");
                    continue;
                }
                match settle(&mut session, flight.snapshot, joined, Instant::now().into_std()) {
                    ApplyOutcome::Applied(update) => {
                        let published = Published {
                            version,
                            text: Arc::from(session.text()),
                            detector: Arc::clone(session.detector()),
                            update,
                        };
                        if out.send(Outbound::Highlights(published)).is_err() {
                            break;
                        }
                    }
                    ApplyOutcome::Stale => log::debug!("dropped stale highlights for version {version}"),
                    ApplyOutcome::Disabled => {}
                }
            }
        }
    }
}

//! Batch runs over a list of identifiers
//!
//! Instruments are analysed independently with bounded concurrency. A failure
//! for one identifier is recorded and the run continues. Reports keep the
//! input order. Cancellation stops new analyses from starting; the ones
//! already running finish and are reported.

use crate::analyzer::{InstrumentAnalyzer, InstrumentReport};
use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use futures::{StreamExt, future, stream};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// Lifecycle of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Running,
    /// Every launched identifier produced a report
    Completed,
    /// At least one identifier failed
    PartiallyFailed,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BatchState::Idle => "idle",
            BatchState::Running => "running",
            BatchState::Completed => "completed",
            BatchState::PartiallyFailed => "partially failed",
        })
    }
}

/// An identifier that produced no report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Raw identifier as given
    pub identifier: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id: Uuid,
    pub state: BatchState,
    pub reports: Vec<InstrumentReport>,
    pub failures: Vec<FailureRecord>,
    /// Identifiers never started because the run was cancelled
    pub skipped: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    /// Identifiers that were started
    pub fn attempted(&self) -> usize {
        self.reports.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.state == BatchState::Completed && !self.cancelled
    }
}

/// Drives an [`InstrumentAnalyzer`] over a batch
pub struct BatchOrchestrator {
    analyzer: InstrumentAnalyzer,
    concurrency: usize,
    state: watch::Sender<BatchState>,
}

impl BatchOrchestrator {
    /// `concurrency` is clamped to at least 1
    pub fn new(analyzer: InstrumentAnalyzer, concurrency: usize) -> Self {
        let (state, _) = watch::channel(BatchState::Idle);
        Self {
            analyzer,
            concurrency: concurrency.max(1),
            state,
        }
    }

    pub fn state(&self) -> BatchState {
        *self.state.borrow()
    }

    /// Receiver that sees every state transition
    pub fn subscribe(&self) -> watch::Receiver<BatchState> {
        self.state.subscribe()
    }

    /// Analyse every identifier
    pub async fn run<S: AsRef<str>>(&self, identifiers: &[S]) -> BatchSummary {
        let (_never, cancel) = watch::channel(false);
        self.run_until(identifiers, cancel).await
    }

    /// Analyse identifiers until `cancel` turns true
    pub async fn run_until<S: AsRef<str>>(
        &self,
        identifiers: &[S],
        cancel: watch::Receiver<bool>,
    ) -> BatchSummary {
        let run_id = Uuid::new_v4();
        let span = info_span!("batch", %run_id);
        self.execute(run_id, identifiers, cancel).instrument(span).await
    }

    async fn execute<S: AsRef<str>>(
        &self,
        run_id: Uuid,
        identifiers: &[S],
        cancel: watch::Receiver<bool>,
    ) -> BatchSummary {
        self.state.send_replace(BatchState::Running);
        let started_at = Utc::now();
        info!(
            "Starting batch of {} identifiers with concurrency {}",
            identifiers.len(),
            self.concurrency
        );

        let analyzer = &self.analyzer;
        let outcomes: Vec<_> = stream::iter(identifiers.iter().map(AsRef::as_ref))
            .take_while(|_| future::ready(!*cancel.borrow()))
            .map(|raw| async move { (raw, analyzer.analyze(raw).await) })
            .buffered(self.concurrency)
            .collect()
            .await;

        let skipped = identifiers.len() - outcomes.len();
        let mut reports = Vec::new();
        let mut failures = Vec::new();
        for (raw, outcome) in outcomes {
            match outcome {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!("Analysis of {:?} failed: {}", raw, e);
                    failures.push(FailureRecord {
                        identifier: raw.to_string(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let state = if failures.is_empty() {
            BatchState::Completed
        } else {
            BatchState::PartiallyFailed
        };
        self.state.send_replace(state);

        let cancelled = skipped > 0;
        if cancelled {
            warn!("Batch cancelled, {} identifiers skipped", skipped);
        }
        info!(
            "Batch {}: {} reports, {} failures",
            state,
            reports.len(),
            failures.len()
        );

        BatchSummary {
            run_id,
            state,
            reports,
            failures,
            skipped,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

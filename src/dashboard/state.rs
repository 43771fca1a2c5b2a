//! Presentation states and the pure transition rules between them.
//!
//! Effects (network calls) live in the [`Dashboard`](super::Dashboard)
//! driver; everything here is synchronous and deterministic.

use std::sync::Arc;

use crate::models::{ResultPayload, RunOutcome, RunStatus};
use crate::pipeline::acquire::Acquisition;
use crate::pipeline::derive::{derive, DerivedSeries};

/// A payload together with its derived chart series
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyView {
    pub payload: Arc<ResultPayload>,
    pub series: Arc<DerivedSeries>,
}

impl ReadyView {
    pub fn new(payload: Arc<ResultPayload>) -> Self {
        let series = Arc::new(derive(&payload));
        Self { payload, series }
    }
}

/// Log and error of the latest run, shown alongside whatever view is active
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub log: Vec<String>,
    pub error: Option<String>,
}

impl RunReport {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        Self {
            log: outcome.log.clone(),
            error: outcome.error().map(str::to_string),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.log.is_empty() && self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Loading,
    Empty {
        report: Option<RunReport>,
    },
    Ready {
        view: ReadyView,
        report: Option<RunReport>,
    },
    Running {
        previous: Option<ReadyView>,
    },
    /// Acquisition itself faulted
    Error {
        message: String,
    },
    /// A run failed; `previous` keeps the last good view on screen
    ErrorWithLog {
        report: RunReport,
        previous: Option<ReadyView>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    /// A run is already pending; repeat invocations are disabled
    RunInFlight,
    /// Results are still loading
    Busy,
    NotAllowed { state: &'static str },
}

impl std::fmt::Display for DashboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DashboardError::RunInFlight => write!(f, "a run is already in progress"),
            DashboardError::Busy => write!(f, "results are still loading"),
            DashboardError::NotAllowed { state } => {
                write!(f, "action not available while {}", state)
            }
        }
    }
}

impl std::error::Error for DashboardError {}

/// What the driver must do once a run has finished
#[derive(Debug, Clone, PartialEq)]
pub enum RunResolution {
    Settled(ViewState),
    /// The job succeeded but returned no inline results
    Reacquire {
        report: RunReport,
        previous: Option<ReadyView>,
    },
}

impl ViewState {
    pub fn kind(&self) -> &'static str {
        match self {
            ViewState::Loading => "loading",
            ViewState::Empty { .. } => "empty",
            ViewState::Ready { .. } => "ready",
            ViewState::Running { .. } => "running",
            ViewState::Error { .. } => "error",
            ViewState::ErrorWithLog { .. } => "error_with_log",
        }
    }

    /// The data currently on screen, if any. Running and failed runs keep
    /// showing the last good view.
    pub fn visible_view(&self) -> Option<&ReadyView> {
        match self {
            ViewState::Ready { view, .. } => Some(view),
            ViewState::Running { previous } | ViewState::ErrorWithLog { previous, .. } => {
                previous.as_ref()
            }
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            ViewState::Empty { report } | ViewState::Ready { report, .. } => report.as_ref(),
            ViewState::ErrorWithLog { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ViewState::Running { .. })
    }

    pub fn can_run(&self) -> bool {
        self.begin_run().is_ok()
    }

    pub fn begin_run(&self) -> Result<ViewState, DashboardError> {
        match self {
            ViewState::Running { .. } => Err(DashboardError::RunInFlight),
            ViewState::Loading => Err(DashboardError::Busy),
            _ => Ok(ViewState::Running {
                previous: self.visible_view().cloned(),
            }),
        }
    }

    /// "Check again": only when nothing valid is on screen
    pub fn begin_check(&self) -> Result<ViewState, DashboardError> {
        match self {
            ViewState::Empty { .. }
            | ViewState::Error { .. }
            | ViewState::ErrorWithLog { previous: None, .. } => Ok(ViewState::Loading),
            ViewState::Running { .. } => Err(DashboardError::RunInFlight),
            ViewState::Loading => Err(DashboardError::Busy),
            other => Err(DashboardError::NotAllowed { state: other.kind() }),
        }
    }

    /// Initial load. Only the untouched `Loading` state qualifies; once a
    /// mount has started, later loads go through "check again".
    pub fn begin_mount(&self, mounted: bool) -> Result<ViewState, DashboardError> {
        match self {
            ViewState::Loading if !mounted => Ok(ViewState::Loading),
            ViewState::Loading => Err(DashboardError::Busy),
            ViewState::Running { .. } => Err(DashboardError::RunInFlight),
            other => Err(DashboardError::NotAllowed { state: other.kind() }),
        }
    }

    pub fn after_acquire(acquisition: Acquisition, report: Option<RunReport>) -> ViewState {
        match acquisition {
            Acquisition::Found { payload, .. } => Self::display(payload, report),
            Acquisition::NotFound => ViewState::Empty { report },
        }
    }

    /// A zero-sample payload is valid but has nothing to chart
    fn display(payload: Arc<ResultPayload>, report: Option<RunReport>) -> ViewState {
        if payload.is_empty() {
            ViewState::Empty { report }
        } else {
            ViewState::Ready {
                view: ReadyView::new(payload),
                report,
            }
        }
    }

    pub fn after_run(previous: Option<ReadyView>, outcome: &RunOutcome) -> RunResolution {
        let report = RunReport::from_outcome(outcome);
        match &outcome.status {
            RunStatus::Failed { .. } => {
                RunResolution::Settled(ViewState::ErrorWithLog { report, previous })
            }
            RunStatus::Completed {
                results: Some(payload),
            } => RunResolution::Settled(Self::display(payload.clone(), Some(report))),
            RunStatus::Completed { results: None } => {
                RunResolution::Reacquire { report, previous }
            }
        }
    }

    /// Settle a re-acquisition that followed a successful run without inline
    /// results. Nothing found keeps the previous view when there is one.
    pub fn after_reacquire(
        acquisition: Acquisition,
        report: RunReport,
        previous: Option<ReadyView>,
    ) -> ViewState {
        match (acquisition, previous) {
            (found @ Acquisition::Found { .. }, _) => Self::after_acquire(found, Some(report)),
            (Acquisition::NotFound, Some(view)) => ViewState::Ready {
                view,
                report: Some(report),
            },
            (Acquisition::NotFound, None) => ViewState::Empty {
                report: Some(report),
            },
        }
    }
}

//! Dashboard driver
//!
//! Owns the results cache, the acquisition service and the run orchestrator,
//! and moves a [`ViewState`] through its transitions. Methods take `&self` so
//! a UI loop can share one instance; the state check and the switch into
//! `Loading`/`Running` happen under one lock, so only one acquisition or run
//! is ever in flight.

pub mod state;

use futures_util::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::num::NonZeroU32;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info};

use crate::pipeline::acquire::{Acquisition, AcquisitionService};
use crate::pipeline::cache::ResultsCache;
use crate::pipeline::orchestrator::RunOrchestrator;
use crate::pipeline::transport::ResultsTransport;

pub use state::{DashboardError, ReadyView, RunReport, RunResolution, ViewState};

pub struct Dashboard {
    acquisition: AcquisitionService,
    orchestrator: RunOrchestrator,
    session: Mutex<Session>,
}

struct Session {
    view: ViewState,
    /// Set by the first transition out of the initial `Loading`
    mounted: bool,
}

impl Dashboard {
    pub fn new(transport: Arc<dyn ResultsTransport>, cache: Arc<ResultsCache>) -> Self {
        Self {
            acquisition: AcquisitionService::new(transport.clone(), cache.clone()),
            orchestrator: RunOrchestrator::new(transport, cache),
            session: Mutex::new(Session {
                view: ViewState::Loading,
                mounted: false,
            }),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> ViewState {
        self.session.lock().view.clone()
    }

    pub fn cache(&self) -> &Arc<ResultsCache> {
        self.acquisition.cache()
    }

    /// Initial load, once per dashboard. Served from the cache while it is fresh.
    pub async fn mount(&self) -> Result<ViewState, DashboardError> {
        self.enter(|view, mounted| view.begin_mount(mounted))?;
        let next = match self.guarded_acquire(false).await {
            Ok(acquisition) => ViewState::after_acquire(acquisition, None),
            Err(message) => ViewState::Error { message },
        };
        Ok(self.settle(next))
    }

    /// Explicit re-check from an empty or failed state. Always hits the network.
    pub async fn check_again(&self) -> Result<ViewState, DashboardError> {
        let left = self.enter(|view, _| view.begin_check())?;
        let report = left.report().cloned();
        let next = match self.guarded_acquire(true).await {
            Ok(acquisition) => ViewState::after_acquire(acquisition, report),
            Err(message) => ViewState::Error { message },
        };
        Ok(self.settle(next))
    }

    /// Trigger a model run and fold its outcome into the view.
    pub async fn run(&self, episodes: NonZeroU32) -> Result<ViewState, DashboardError> {
        let left = self.enter(|view, _| view.begin_run())?;
        let previous = left.visible_view().cloned();

        let outcome = self.orchestrator.run(episodes).await;

        let next = match ViewState::after_run(previous, &outcome) {
            RunResolution::Settled(next) => next,
            RunResolution::Reacquire { report, previous } => {
                info!("Run returned no inline results; re-acquiring");
                match self.guarded_acquire(true).await {
                    Ok(acquisition) => ViewState::after_reacquire(acquisition, report, previous),
                    Err(message) => ViewState::ErrorWithLog {
                        report: RunReport {
                            log: report.log,
                            error: Some(message),
                        },
                        previous,
                    },
                }
            }
        };
        Ok(self.settle(next))
    }

    /// Check and switch in one critical section. Returns the state that was left.
    fn enter(
        &self,
        transition: impl FnOnce(&ViewState, bool) -> Result<ViewState, DashboardError>,
    ) -> Result<ViewState, DashboardError> {
        let mut session = self.session.lock();
        let next = transition(&session.view, session.mounted)?;
        info!(from = session.view.kind(), to = next.kind(), "view state transition");
        session.mounted = true;
        Ok(std::mem::replace(&mut session.view, next))
    }

    fn settle(&self, next: ViewState) -> ViewState {
        let mut session = self.session.lock();
        info!(from = session.view.kind(), to = next.kind(), "view state transition");
        session.view = next.clone();
        next
    }

    /// Acquisition never fails by contract; a panic underneath it is caught
    /// here so it cannot take the UI down.
    async fn guarded_acquire(&self, fresh: bool) -> Result<Acquisition, String> {
        let acquire = async {
            if fresh {
                self.acquisition.refresh().await
            } else {
                self.acquisition.acquire().await
            }
        };
        AssertUnwindSafe(acquire).catch_unwind().await.map_err(|panic| {
            let message = panic_message(panic.as_ref());
            error!(error = %message, "💥 Results acquisition faulted");
            message
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "results acquisition panicked".to_string()
    }
}

//! TD3 Dashboard Library
//!
//! Acquires the trading agent's results, runs the remote training job,
//! validates payloads and derives aligned chart series for display.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod models;
pub mod pipeline;

pub use dashboard::{Dashboard, DashboardError, ReadyView, RunReport, ViewState};
pub use models::{Bar, Metrics, ResultPayload, RunFailureKind, RunOutcome, RunStatus};

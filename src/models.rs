use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Headline performance numbers reported by the trading agent
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub sharpe_ratio: f64,
    pub return_pct: f64,
    pub max_drawdown_pct: f64,
    pub final_portfolio_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction_accuracy_pct: Option<f64>,
}

/// One trading day's open/high/low/close
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Canonical, validated model results.
///
/// Only the normalizer constructs this type, so every instance satisfies the
/// alignment invariant: `bars`, `portfolio_history`, `actions` and
/// `positions` all have the same length and sample `i` of each describes the
/// same trading day. Replaced wholesale, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    metrics: Metrics,
    #[serde(rename = "ohlc")]
    bars: Vec<Bar>,
    portfolio_history: Vec<f64>,
    actions: Vec<f64>,
    positions: Vec<f64>,
}

impl ResultPayload {
    pub(crate) fn from_parts(
        metrics: Metrics,
        bars: Vec<Bar>,
        portfolio_history: Vec<f64>,
        actions: Vec<f64>,
        positions: Vec<f64>,
    ) -> Self {
        debug_assert!(
            bars.len() == portfolio_history.len()
                && bars.len() == actions.len()
                && bars.len() == positions.len()
        );
        Self {
            metrics,
            bars,
            portfolio_history,
            actions,
            positions,
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Portfolio value per sample. Element 0 is the basis for relative
    /// comparison; producers normalize it to 1.0 but that is not enforced.
    pub fn portfolio_history(&self) -> &[f64] {
        &self.portfolio_history
    }

    /// Raw controller output per sample, clamped to [-1, 1]
    pub fn actions(&self) -> &[f64] {
        &self.actions
    }

    /// Realized held position per sample, clamped to [-1, 1]
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Number of aligned samples
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Why a run did not produce usable results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunFailureKind {
    /// The request never got a response (connect refused, timeout, ...)
    Transport,
    /// A response arrived but its body was not the expected shape
    Protocol,
    /// The job itself reported failure
    Remote,
    /// The job succeeded but its inline results failed validation
    MalformedResults,
}

impl RunFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunFailureKind::Transport => "transport",
            RunFailureKind::Protocol => "protocol",
            RunFailureKind::Remote => "remote",
            RunFailureKind::MalformedResults => "malformed_results",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// `results` is `None` when the job persisted its output elsewhere and
    /// the caller has to re-acquire.
    Completed {
        results: Option<Arc<ResultPayload>>,
    },
    Failed {
        kind: RunFailureKind,
        error: String,
    },
}

/// Result of a single run invocation. Discarded once surfaced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub log: Vec<String>,
    pub status: RunStatus,
}

impl RunOutcome {
    pub fn completed(log: Vec<String>, results: Option<Arc<ResultPayload>>) -> Self {
        Self {
            log,
            status: RunStatus::Completed { results },
        }
    }

    pub fn failed(log: Vec<String>, kind: RunFailureKind, error: impl Into<String>) -> Self {
        Self {
            log,
            status: RunStatus::Failed {
                kind,
                error: error.into(),
            },
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.status, RunStatus::Completed { .. })
    }

    pub fn results(&self) -> Option<&Arc<ResultPayload>> {
        match &self.status {
            RunStatus::Completed { results } => results.as_ref(),
            RunStatus::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Completed { .. } => None,
            RunStatus::Failed { error, .. } => Some(error.as_str()),
        }
    }

    pub fn failure_kind(&self) -> Option<RunFailureKind> {
        match &self.status {
            RunStatus::Completed { .. } => None,
            RunStatus::Failed { kind, .. } => Some(*kind),
        }
    }
}

/// Body of `POST /api/run-td3` as the job service sends it.
///
/// `results` stays untyped here; it goes through the normalizer like any
/// other source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponseWire {
    pub success: bool,
    #[serde(default)]
    pub log: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResponseWire {
    pub fn failure(log: Vec<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            log,
            results: None,
            error: Some(error.into()),
        }
    }
}

/// Body of the run request
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunRequest {
    pub episodes: u32,
}

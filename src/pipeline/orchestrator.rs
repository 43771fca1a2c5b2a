//! Run orchestration: trigger the remote training job once, wait for its
//! single terminal reply, and reconcile it into a [`RunOutcome`].
//!
//! Fresh inline results are normalized and published straight into the
//! results cache so no follow-up fetch is needed. Upstream faults of any kind
//! come back as a failed outcome with a renderable log.

use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{info, warn};

use super::cache::{ResultsCache, AGENT_RESULTS_KEY};
use super::normalize::normalize;
use super::transport::{RawReply, ResultsTransport};
use crate::models::{RunFailureKind, RunOutcome, RunResponseWire};

pub const INVALID_RESPONSE: &str = "Invalid response from server";
pub const MALFORMED_RESULTS: &str = "Malformed results";
pub const RUN_FAILED: &str = "Run failed";

pub struct RunOrchestrator {
    transport: Arc<dyn ResultsTransport>,
    cache: Arc<ResultsCache>,
    key: String,
}

impl RunOrchestrator {
    pub fn new(transport: Arc<dyn ResultsTransport>, cache: Arc<ResultsCache>) -> Self {
        Self {
            transport,
            cache,
            key: AGENT_RESULTS_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub async fn run(&self, episodes: NonZeroU32) -> RunOutcome {
        info!(episodes = episodes.get(), "🧠 Triggering model run");

        let reply = match self.transport.trigger_run(episodes.get()).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Run request failed");
                return RunOutcome::failed(Vec::new(), RunFailureKind::Transport, format!("{:#}", e));
            }
        };

        let outcome = self.reconcile(reply);
        match outcome.error() {
            None => info!(
                log_lines = outcome.log.len(),
                inline_results = outcome.results().is_some(),
                "✅ Run completed"
            ),
            Some(error) => warn!(
                kind = outcome.failure_kind().map(|k| k.as_str()),
                error,
                log_lines = outcome.log.len(),
                "Run failed"
            ),
        }
        outcome
    }

    fn reconcile(&self, reply: RawReply) -> RunOutcome {
        let wire: RunResponseWire = match serde_json::from_str(&reply.body) {
            Ok(wire) => wire,
            Err(_) => {
                let line = if reply.body.is_empty() {
                    format!("HTTP {}", reply.status)
                } else {
                    reply.body
                };
                return RunOutcome::failed(vec![line], RunFailureKind::Protocol, INVALID_RESPONSE);
            }
        };

        if !wire.success {
            let error = wire
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| RUN_FAILED.to_string());
            return RunOutcome::failed(wire.log, RunFailureKind::Remote, error);
        }

        let Some(raw) = wire.results else {
            // The job persisted its output elsewhere; whatever is cached is stale.
            self.cache.invalidate(&self.key);
            return RunOutcome::completed(wire.log, None);
        };

        match normalize(&raw) {
            Ok(payload) => {
                let payload = Arc::new(payload);
                self.cache.put(&self.key, payload.clone());
                RunOutcome::completed(wire.log, Some(payload))
            }
            Err(e) => {
                warn!(check = ?e.check(), error = %e, "Inline run results rejected");
                RunOutcome::failed(wire.log, RunFailureKind::MalformedResults, MALFORMED_RESULTS)
            }
        }
    }
}

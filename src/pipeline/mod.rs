//! Model-results pipeline: acquisition, run orchestration, validation and
//! series derivation.

pub mod acquire;
pub mod cache;
pub mod derive;
pub mod normalize;
pub mod orchestrator;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use acquire::{Acquisition, AcquisitionService, Origin};
pub use cache::{ResultsCache, AGENT_RESULTS_KEY};
pub use derive::{derive, metric_cards, DerivedSeries, EquityPoint, IndexedBar, MetricCard, SignalPoint};
pub use normalize::{normalize, ValidationCheck, ValidationError};
pub use orchestrator::RunOrchestrator;
pub use transport::{HttpResultsClient, RawReply, ResultSource, ResultsTransport};

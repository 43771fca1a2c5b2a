//! Results acquisition: cache, then primary endpoint, then static artifact.
//!
//! Never fails past this boundary. Anything unusable (network error, bad
//! status, malformed body, validation failure) falls through to the next
//! tier, and exhausting both network tiers yields [`Acquisition::NotFound`].

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cache::{ResultsCache, AGENT_RESULTS_KEY};
use super::normalize::normalize;
use super::transport::{ResultSource, ResultsTransport};
use crate::models::ResultPayload;

/// Where an acquired payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Cache,
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Acquisition {
    Found {
        payload: Arc<ResultPayload>,
        origin: Origin,
    },
    NotFound,
}

impl Acquisition {
    pub fn payload(&self) -> Option<&Arc<ResultPayload>> {
        match self {
            Acquisition::Found { payload, .. } => Some(payload),
            Acquisition::NotFound => None,
        }
    }
}

pub struct AcquisitionService {
    transport: Arc<dyn ResultsTransport>,
    cache: Arc<ResultsCache>,
    key: String,
}

impl AcquisitionService {
    pub fn new(transport: Arc<dyn ResultsTransport>, cache: Arc<ResultsCache>) -> Self {
        Self::with_key(transport, cache, AGENT_RESULTS_KEY)
    }

    pub fn with_key(
        transport: Arc<dyn ResultsTransport>,
        cache: Arc<ResultsCache>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            cache,
            key: key.into(),
        }
    }

    pub fn cache(&self) -> &Arc<ResultsCache> {
        &self.cache
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serve from the cache while fresh, otherwise go to the network.
    pub async fn acquire(&self) -> Acquisition {
        if let Some(payload) = self.cache.get_fresh(&self.key) {
            debug!(key = %self.key, "results served from cache");
            return Acquisition::Found {
                payload,
                origin: Origin::Cache,
            };
        }
        self.refresh().await
    }

    /// Go to the network regardless of cache state. A hit reseeds the cache.
    pub async fn refresh(&self) -> Acquisition {
        for source in [ResultSource::Primary, ResultSource::Fallback] {
            if let Some(payload) = self.try_source(source).await {
                let payload = Arc::new(payload);
                self.cache.put(&self.key, payload.clone());
                info!(
                    source = source.as_str(),
                    samples = payload.len(),
                    "📊 Results acquired"
                );
                let origin = match source {
                    ResultSource::Primary => Origin::Primary,
                    ResultSource::Fallback => Origin::Fallback,
                };
                return Acquisition::Found { payload, origin };
            }
        }

        warn!(key = %self.key, "No usable results from primary or fallback source");
        Acquisition::NotFound
    }

    async fn try_source(&self, source: ResultSource) -> Option<ResultPayload> {
        let raw = match self.transport.fetch(source).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(source = source.as_str(), error = %e, "Results fetch failed");
                return None;
            }
        };
        match normalize(&raw) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(
                    source = source.as_str(),
                    check = ?e.check(),
                    error = %e,
                    "Results payload rejected"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::{raw_payload, FakeTransport, FetchReply};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn service(transport: Arc<FakeTransport>) -> AcquisitionService {
        AcquisitionService::new(transport, ResultsCache::new(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_primary_success() {
        let transport = FakeTransport::new();
        transport.set_primary(FetchReply::Json(raw_payload(4)));
        let svc = service(transport.clone());

        match svc.acquire().await {
            Acquisition::Found { payload, origin } => {
                assert_eq!(origin, Origin::Primary);
                assert_eq!(payload.len(), 4);
            }
            Acquisition::NotFound => panic!("expected payload"),
        }
        assert_eq!(transport.fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_on_primary_status_error() {
        let transport = FakeTransport::new();
        transport.set_primary(FetchReply::Fail("GET /api/td3-results 404".to_string()));
        transport.set_fallback(FetchReply::Json(raw_payload(2)));
        let svc = service(transport.clone());

        let acq = svc.acquire().await;
        assert!(matches!(
            acq,
            Acquisition::Found {
                origin: Origin::Fallback,
                ..
            }
        ));
        assert_eq!(acq.payload().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_on_primary_validation_error() {
        let transport = FakeTransport::new();
        let mut bad = raw_payload(3);
        bad["actions"] = json!([0.1]);
        transport.set_primary(FetchReply::Json(bad));
        transport.set_fallback(FetchReply::Json(raw_payload(3)));
        let svc = service(transport);

        assert!(matches!(
            svc.acquire().await,
            Acquisition::Found {
                origin: Origin::Fallback,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_not_found_when_both_fail() {
        let transport = FakeTransport::new();
        transport.set_fallback(FetchReply::Json(json!({"error": "nope"})));
        let svc = service(transport.clone());

        assert_eq!(svc.acquire().await, Acquisition::NotFound);
        assert_eq!(transport.primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.fallback_calls.load(Ordering::SeqCst), 1);
        assert!(svc.cache().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_acquire_uses_cache() {
        let transport = FakeTransport::new();
        transport.set_primary(FetchReply::Json(raw_payload(1)));
        let svc = service(transport.clone());

        svc.acquire().await;
        let second = svc.acquire().await;
        assert!(matches!(
            second,
            Acquisition::Found {
                origin: Origin::Cache,
                ..
            }
        ));
        assert_eq!(transport.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_cache() {
        let transport = FakeTransport::new();
        transport.set_primary(FetchReply::Json(raw_payload(1)));
        let svc = service(transport.clone());

        svc.acquire().await;
        transport.set_primary(FetchReply::Json(raw_payload(6)));
        let refreshed = svc.refresh().await;
        assert_eq!(refreshed.payload().unwrap().len(), 6);
        assert_eq!(transport.fetch_calls(), 2);
        assert_eq!(svc.acquire().await.payload().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let transport = FakeTransport::new();
        let svc = service(transport.clone());

        assert_eq!(svc.acquire().await, Acquisition::NotFound);
        transport.set_primary(FetchReply::Json(raw_payload(2)));
        assert!(svc.acquire().await.payload().is_some());
    }
}

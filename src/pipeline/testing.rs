//! Test fixtures: sample payloads and a scripted in-memory transport.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use super::normalize::normalize;
use super::transport::{RawReply, ResultSource, ResultsTransport};
use crate::models::ResultPayload;

/// Well-formed raw payload with `n` aligned samples
pub fn raw_payload(n: usize) -> Value {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date");
    let bars: Vec<Value> = (0..n)
        .map(|i| {
            json!({
                "date": (start + Duration::days(i as i64)).format("%Y-%m-%d").to_string(),
                "open": 100.0 + i as f64,
                "high": 102.0 + i as f64,
                "low": 99.0 + i as f64,
                "close": 101.0 + i as f64,
            })
        })
        .collect();
    json!({
        "metrics": {
            "sharpeRatio": 1.2,
            "returnPct": 8.5,
            "maxDrawdownPct": -4.1,
            "finalPortfolioValue": 1.085,
            "directionAccuracyPct": 54.0,
        },
        "ohlc": bars,
        "portfolioHistory": (0..n).map(|i| 1.0 + i as f64 * 0.01).collect::<Vec<_>>(),
        "actions": vec![0.3; n],
        "positions": vec![0.2; n],
    })
}

pub fn payload(n: usize) -> ResultPayload {
    normalize(&raw_payload(n)).expect("fixture payload is valid")
}

/// Run endpoint body for a successful run
pub fn run_body(results: Option<Value>) -> String {
    json!({
        "success": true,
        "log": ["Episode 1/3", "Exported results"],
        "results": results,
    })
    .to_string()
}

#[derive(Clone)]
pub enum FetchReply {
    Json(Value),
    Fail(String),
}

#[derive(Clone)]
pub enum RunReply {
    Reply(RawReply),
    Fail(String),
}

/// Scripted transport with call counters
pub struct FakeTransport {
    primary: Mutex<FetchReply>,
    fallback: Mutex<FetchReply>,
    run: Mutex<RunReply>,
    pub primary_calls: AtomicUsize,
    pub fallback_calls: AtomicUsize,
    pub run_calls: AtomicUsize,
    panic_on_fetch: AtomicBool,
    run_gate: Mutex<Option<Arc<Notify>>>,
    pub run_started: Notify,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    pub fetch_started: Notify,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            primary: Mutex::new(FetchReply::Fail("404 Not Found".to_string())),
            fallback: Mutex::new(FetchReply::Fail("404 Not Found".to_string())),
            run: Mutex::new(RunReply::Fail("connection refused".to_string())),
            primary_calls: AtomicUsize::new(0),
            fallback_calls: AtomicUsize::new(0),
            run_calls: AtomicUsize::new(0),
            panic_on_fetch: AtomicBool::new(false),
            run_gate: Mutex::new(None),
            run_started: Notify::new(),
            fetch_gate: Mutex::new(None),
            fetch_started: Notify::new(),
        })
    }

    pub fn set_primary(&self, reply: FetchReply) {
        *self.primary.lock() = reply;
    }

    pub fn set_fallback(&self, reply: FetchReply) {
        *self.fallback.lock() = reply;
    }

    pub fn set_run(&self, reply: RunReply) {
        *self.run.lock() = reply;
    }

    pub fn set_run_reply(&self, status: u16, body: impl Into<String>) {
        self.set_run(RunReply::Reply(RawReply {
            status,
            body: body.into(),
        }));
    }

    /// Hold every run until the returned handle is notified
    pub fn gate_runs(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.run_gate.lock() = Some(gate.clone());
        gate
    }

    /// Hold every fetch until the returned handle is notified
    pub fn gate_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.fetch_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn panic_on_fetch(&self, on: bool) {
        self.panic_on_fetch.store(on, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.primary_calls.load(Ordering::SeqCst) + self.fallback_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultsTransport for FakeTransport {
    async fn fetch(&self, source: ResultSource) -> Result<Value> {
        if self.panic_on_fetch.load(Ordering::SeqCst) {
            panic!("transport exploded");
        }
        let reply = match source {
            ResultSource::Primary => {
                self.primary_calls.fetch_add(1, Ordering::SeqCst);
                self.primary.lock().clone()
            }
            ResultSource::Fallback => {
                self.fallback_calls.fetch_add(1, Ordering::SeqCst);
                self.fallback.lock().clone()
            }
        };
        self.fetch_started.notify_one();
        let gate = self.fetch_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match reply {
            FetchReply::Json(v) => Ok(v),
            FetchReply::Fail(msg) => Err(anyhow::anyhow!(msg)),
        }
    }

    async fn trigger_run(&self, _episodes: u32) -> Result<RawReply> {
        self.run_calls.fetch_add(1, Ordering::SeqCst);
        self.run_started.notify_one();
        let gate = self.run_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.run.lock().clone() {
            RunReply::Reply(reply) => Ok(reply),
            RunReply::Fail(msg) => Err(anyhow::anyhow!(msg)),
        }
    }
}

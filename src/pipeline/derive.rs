//! Series derivation
//!
//! Projects one canonical payload into the three chart views. All three
//! share the same index/date axis so a multi-panel view lines up sample for
//! sample without re-joining. Pure and total over any valid payload.

use chrono::Datelike;
use serde::Serialize;

use super::normalize::parse_bar_date;
use crate::models::{Bar, Metrics, ResultPayload};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedBar {
    pub index: usize,
    #[serde(flatten)]
    pub bar: Bar,
}

/// Portfolio value at one sample. Values are passed through untouched: the
/// producer normalizes to a 1.0 basis at index 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub index: usize,
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalPoint {
    pub index: usize,
    pub date: String,
    pub action: f64,
    pub position: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedSeries {
    pub bars: Vec<IndexedBar>,
    pub equity_curve: Vec<EquityPoint>,
    pub signal_series: Vec<SignalPoint>,
}

impl DerivedSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

pub fn derive(payload: &ResultPayload) -> DerivedSeries {
    let bars = payload.bars();

    let indexed_bars = bars
        .iter()
        .enumerate()
        .map(|(index, bar)| IndexedBar {
            index,
            bar: bar.clone(),
        })
        .collect();

    let equity_curve = payload
        .portfolio_history()
        .iter()
        .enumerate()
        .map(|(index, &value)| EquityPoint {
            index,
            date: axis_label(bars, index),
            value,
        })
        .collect();

    let signal_series = payload
        .actions()
        .iter()
        .zip(payload.positions())
        .enumerate()
        .map(|(index, (&action, &position))| SignalPoint {
            index,
            date: axis_label(bars, index),
            action,
            position,
        })
        .collect();

    DerivedSeries {
        bars: indexed_bars,
        equity_curve,
        signal_series,
    }
}

/// Date of sample `index`, or the bare index when no bar exists for it
fn axis_label(bars: &[Bar], index: usize) -> String {
    bars.get(index)
        .map(|b| b.date.clone())
        .unwrap_or_else(|| index.to_string())
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Short axis label, e.g. `2024-01-02` -> `Jan 2`. Unparsable input is
/// returned unchanged.
pub fn short_date_label(date: &str) -> String {
    match parse_bar_date(date) {
        Some(d) => format!("{} {}", MONTHS[d.month0() as usize], d.day()),
        None => date.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Gain,
    Loss,
    Warn,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCard {
    pub label: &'static str,
    pub value: String,
    pub tone: Tone,
}

/// Headline metric strip. Direction accuracy appears only when reported.
pub fn metric_cards(metrics: &Metrics) -> Vec<MetricCard> {
    let gain_or_loss = |positive: bool| if positive { Tone::Gain } else { Tone::Loss };

    let mut cards = vec![
        MetricCard {
            label: "Sharpe Ratio",
            value: format!("{:.3}", metrics.sharpe_ratio),
            tone: Tone::Neutral,
        },
        MetricCard {
            label: "Return %",
            value: format!(
                "{}{}%",
                if metrics.return_pct >= 0.0 { "+" } else { "" },
                metrics.return_pct
            ),
            tone: gain_or_loss(metrics.return_pct >= 0.0),
        },
        MetricCard {
            label: "Max Drawdown %",
            value: format!("{}%", metrics.max_drawdown_pct),
            tone: Tone::Warn,
        },
        MetricCard {
            label: "Final Portfolio Value",
            value: format!("{:.4}", metrics.final_portfolio_value),
            tone: Tone::Neutral,
        },
    ];

    if let Some(accuracy) = metrics.direction_accuracy_pct {
        cards.push(MetricCard {
            label: "Direction Accuracy",
            value: format!("{:.1}%", accuracy),
            tone: gain_or_loss(accuracy >= 50.0),
        });
    }

    cards
}

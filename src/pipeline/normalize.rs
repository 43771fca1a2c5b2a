//! Result payload normalizer
//!
//! Every source (live run, primary endpoint, static artifact) hands its raw
//! JSON to [`normalize`]. Checks run in a fixed order and stop at the first
//! failure; callers treat any [`ValidationError`] as "source unusable".

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::models::{Bar, Metrics, ResultPayload};

/// Which stage of validation rejected a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationCheck {
    Metrics,
    SeriesShape,
    Bars,
    Signals,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    NotAnObject,
    MissingMetrics,
    InvalidMetric { field: &'static str },
    DirectionAccuracyOutOfRange(f64),
    MissingSeries { name: &'static str },
    LengthMismatch {
        bars: usize,
        portfolio_history: usize,
        actions: usize,
        positions: usize,
    },
    InvalidPortfolioValue { index: usize },
    InvalidBar { index: usize, reason: String },
    NonChronological { index: usize },
    NonFiniteSignal { series: &'static str, index: usize },
}

impl ValidationError {
    pub fn check(&self) -> ValidationCheck {
        match self {
            ValidationError::NotAnObject
            | ValidationError::MissingMetrics
            | ValidationError::InvalidMetric { .. }
            | ValidationError::DirectionAccuracyOutOfRange(_) => ValidationCheck::Metrics,
            ValidationError::MissingSeries { .. }
            | ValidationError::LengthMismatch { .. }
            | ValidationError::InvalidPortfolioValue { .. } => ValidationCheck::SeriesShape,
            ValidationError::InvalidBar { .. } | ValidationError::NonChronological { .. } => {
                ValidationCheck::Bars
            }
            ValidationError::NonFiniteSignal { .. } => ValidationCheck::Signals,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::NotAnObject => write!(f, "payload is not a JSON object"),
            ValidationError::MissingMetrics => write!(f, "metrics object missing"),
            ValidationError::InvalidMetric { field } => {
                write!(f, "metric {} missing or not a finite number", field)
            }
            ValidationError::DirectionAccuracyOutOfRange(v) => {
                write!(f, "directionAccuracyPct {} outside [0, 100]", v)
            }
            ValidationError::MissingSeries { name } => {
                write!(f, "series {} missing or not an array", name)
            }
            ValidationError::LengthMismatch {
                bars,
                portfolio_history,
                actions,
                positions,
            } => write!(
                f,
                "series lengths differ: ohlc={} portfolioHistory={} actions={} positions={}",
                bars, portfolio_history, actions, positions
            ),
            ValidationError::InvalidPortfolioValue { index } => {
                write!(f, "portfolioHistory[{}] is not a finite number", index)
            }
            ValidationError::InvalidBar { index, reason } => {
                write!(f, "ohlc[{}] invalid: {}", index, reason)
            }
            ValidationError::NonChronological { index } => {
                write!(f, "ohlc[{}] date precedes the previous bar", index)
            }
            ValidationError::NonFiniteSignal { series, index } => {
                write!(f, "{}[{}] is not a finite number", series, index)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a raw results object and convert it into the canonical shape.
pub fn normalize(raw: &Value) -> Result<ResultPayload, ValidationError> {
    let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    // 1. metrics
    let metrics = normalize_metrics(obj)?;

    // 2. series shape
    let bars_raw = series(obj, &["ohlc", "bars"], "ohlc")?;
    let portfolio_raw = series(obj, &["portfolioHistory"], "portfolioHistory")?;
    let actions_raw = series(obj, &["actions"], "actions")?;
    let positions_raw = series(obj, &["positions"], "positions")?;

    let n = bars_raw.len();
    if portfolio_raw.len() != n || actions_raw.len() != n || positions_raw.len() != n {
        return Err(ValidationError::LengthMismatch {
            bars: n,
            portfolio_history: portfolio_raw.len(),
            actions: actions_raw.len(),
            positions: positions_raw.len(),
        });
    }

    let portfolio_history = portfolio_raw
        .iter()
        .enumerate()
        .map(|(index, v)| finite(v).ok_or(ValidationError::InvalidPortfolioValue { index }))
        .collect::<Result<Vec<f64>, _>>()?;

    // 3. bars
    let mut bars = Vec::with_capacity(n);
    let mut prev_date: Option<NaiveDate> = None;
    for (index, raw_bar) in bars_raw.iter().enumerate() {
        let (bar, date) = normalize_bar(index, raw_bar)?;
        if prev_date.is_some_and(|prev| date < prev) {
            return Err(ValidationError::NonChronological { index });
        }
        prev_date = Some(date);
        bars.push(bar);
    }

    // 4. signals
    let actions = clamp_signals("actions", actions_raw)?;
    let positions = clamp_signals("positions", positions_raw)?;

    Ok(ResultPayload::from_parts(
        metrics,
        bars,
        portfolio_history,
        actions,
        positions,
    ))
}

/// Parse a bar date: `YYYY-MM-DD`, optionally followed by a time component
/// introduced by `T` or a space.
pub fn parse_bar_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10)?;
    let rest = &raw[10..];
    if !rest.is_empty() && !rest.starts_with('T') && !rest.starts_with(' ') {
        return None;
    }
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn normalize_metrics(obj: &Map<String, Value>) -> Result<Metrics, ValidationError> {
    let metrics = obj
        .get("metrics")
        .and_then(Value::as_object)
        .ok_or(ValidationError::MissingMetrics)?;

    let required = |field: &'static str| -> Result<f64, ValidationError> {
        metrics
            .get(field)
            .and_then(finite)
            .ok_or(ValidationError::InvalidMetric { field })
    };

    let sharpe_ratio = required("sharpeRatio")?;
    let return_pct = required("returnPct")?;
    let max_drawdown_pct = required("maxDrawdownPct")?;
    let final_portfolio_value = required("finalPortfolioValue")?;

    let direction_accuracy_pct = match metrics.get("directionAccuracyPct") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let pct = finite(v).ok_or(ValidationError::InvalidMetric {
                field: "directionAccuracyPct",
            })?;
            if !(0.0..=100.0).contains(&pct) {
                return Err(ValidationError::DirectionAccuracyOutOfRange(pct));
            }
            Some(pct)
        }
    };

    Ok(Metrics {
        sharpe_ratio,
        return_pct,
        max_drawdown_pct,
        final_portfolio_value,
        direction_accuracy_pct,
    })
}

fn series<'a>(
    obj: &'a Map<String, Value>,
    keys: &[&str],
    name: &'static str,
) -> Result<&'a Vec<Value>, ValidationError> {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .and_then(Value::as_array)
        .ok_or(ValidationError::MissingSeries { name })
}

fn normalize_bar(index: usize, raw: &Value) -> Result<(Bar, NaiveDate), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidBar { index, reason };

    let obj = raw
        .as_object()
        .ok_or_else(|| invalid("not an object".to_string()))?;

    let date_str = obj
        .get("date")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("date missing".to_string()))?;
    let date = parse_bar_date(date_str)
        .ok_or_else(|| invalid(format!("unparsable date {:?}", date_str)))?;

    let price = |field: &str| -> Result<f64, ValidationError> {
        obj.get(field)
            .and_then(finite)
            .ok_or_else(|| invalid(format!("{} missing or not a finite number", field)))
    };

    let bar = Bar {
        date: date_str.to_string(),
        open: price("open")?,
        high: price("high")?,
        low: price("low")?,
        close: price("close")?,
    };
    Ok((bar, date))
}

fn clamp_signals(series: &'static str, raw: &[Value]) -> Result<Vec<f64>, ValidationError> {
    raw.iter()
        .enumerate()
        .map(|(index, v)| {
            finite(v)
                .map(|x| x.clamp(-1.0, 1.0))
                .ok_or(ValidationError::NonFiniteSignal { series, index })
        })
        .collect()
}

#[inline]
fn finite(v: &Value) -> Option<f64> {
    v.as_f64().filter(|x| x.is_finite())
}

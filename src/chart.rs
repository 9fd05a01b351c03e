//! Time-series alignment: merges per-entity metric samples into one
//! chartable matrix with a common time axis.
//!
//! Pure functions over the aggregator's state; nothing here does I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::{MetricName, MetricSeries, MetricVisibility, MetricsSnapshot};

/// Alignment error types.
#[derive(Error, Debug)]
pub enum AlignError {
    #[error("malformed sample timestamp: {0:?}")]
    Timestamp(String),
}

/// Row key: sample time truncated to whole seconds.
///
/// Same-second samples from different entities land on the same row.
/// The derived ordering is the lexicographic (hour, minute, second)
/// comparison the row sort relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeKey {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl TimeKey {
    pub const ZERO: TimeKey = TimeKey {
        hour: 0,
        minute: 0,
        second: 0,
    };
}

/// One chart row: a time key plus one slot per column.
///
/// `None` marks "no data" for that column at that time; it is distinct
/// from a measured value of zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatrixRow {
    pub key: TimeKey,
    pub values: Vec<Option<f64>>,
}

/// Aligned chart payload: column labels plus rows, most recent first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedMatrix {
    pub columns: Vec<String>,
    pub rows: Vec<MatrixRow>,
}

impl AlignedMatrix {
    /// Minimal "no data" payload, so a chart consumer always has
    /// something renderable.
    pub fn placeholder() -> Self {
        Self {
            columns: vec![String::new()],
            rows: vec![MatrixRow {
                key: TimeKey::ZERO,
                values: vec![Some(0.0)],
            }],
        }
    }
}

/// Align every visible (entity, metric) series onto a common time axis.
///
/// Only entities present in both maps contribute. Values are scaled to
/// percentages. Rows come out in descending time-key order. An empty
/// selection yields [`AlignedMatrix::placeholder`].
pub fn align(
    snapshot: &MetricsSnapshot,
    visibility: &BTreeMap<String, MetricVisibility>,
) -> Result<AlignedMatrix, AlignError> {
    let mut columns: Vec<String> = Vec::new();
    let mut plan: Vec<(&MetricSeries, Vec<MetricName>)> = Vec::new();

    for (id, series) in snapshot {
        let Some(flags) = visibility.get(id) else {
            continue;
        };
        let metrics: Vec<MetricName> = MetricName::ALL
            .into_iter()
            .filter(|metric| flags.get(*metric))
            .collect();
        if metrics.is_empty() {
            continue;
        }

        let alias = shortest(&series.aliases);
        for metric in &metrics {
            columns.push(format!("{} - {}", alias, metric.wire_name()));
        }
        plan.push((series, metrics));
    }

    if columns.is_empty() {
        return Ok(AlignedMatrix::placeholder());
    }

    let width = columns.len();
    let mut grouped: BTreeMap<TimeKey, Vec<Option<f64>>> = BTreeMap::new();

    let mut offset = 0;
    for (series, metrics) in &plan {
        for sample in &series.stats {
            let key = parse_time_key(&sample.timestamp)?;
            let slots = grouped.entry(key).or_insert_with(|| vec![None; width]);
            for (i, metric) in metrics.iter().enumerate() {
                slots[offset + i] = Some(sample.value(*metric) * 100.0);
            }
        }
        offset += metrics.len();
    }

    let rows = grouped
        .into_iter()
        .rev()
        .map(|(key, values)| MatrixRow { key, values })
        .collect();

    Ok(AlignedMatrix { columns, rows })
}

/// Shortest display name; first occurrence wins a length tie.
/// Empty alias lists resolve to an empty label.
pub fn shortest(aliases: &[String]) -> &str {
    aliases
        .iter()
        .min_by_key(|alias| alias.len())
        .map(String::as_str)
        .unwrap_or("")
}

/// Parse a sample timestamp into its second-resolution row key.
///
/// The backend relays timestamps both with and without an offset or
/// fractional seconds; anything else is rejected, never coerced.
fn parse_time_key(timestamp: &str) -> Result<TimeKey, AlignError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(time_key_of(parsed.with_timezone(&Utc)));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, format) {
            return Ok(time_key_of(DateTime::from_naive_utc_and_offset(naive, Utc)));
        }
    }

    Err(AlignError::Timestamp(timestamp.to_string()))
}

fn time_key_of(instant: DateTime<Utc>) -> TimeKey {
    TimeKey {
        hour: instant.hour(),
        minute: instant.minute(),
        second: instant.second(),
    }
}

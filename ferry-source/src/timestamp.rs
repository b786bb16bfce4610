//! Timestamp normalization.
//!
//! Upstreams report update times as epoch seconds, epoch milliseconds, or
//! ISO-8601 strings with fractional seconds. All of them collapse to a UTC
//! instant with whole-second precision, which is also what the history ledger
//! stores.

use chrono::{DateTime, NaiveDateTime, Utc};
use ferry_core::error::{FerryError, Result};
use serde::Deserialize;

/// On-disk rendering used by the history ledger.
pub const LEDGER_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Epoch values longer than this many digits are milliseconds.
const SECONDS_DIGITS: usize = 10;

/// A timestamp as an upstream API serialized it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(i64),
    Text(String),
}

impl RawTimestamp {
    pub fn normalize(&self) -> Result<DateTime<Utc>> {
        match self {
            RawTimestamp::Epoch(value) => from_epoch(*value),
            RawTimestamp::Text(text) => parse(text),
        }
    }
}

pub fn epoch_zero() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

/// Interpret an epoch value, scaling milliseconds down to seconds.
pub fn from_epoch(value: i64) -> Result<DateTime<Utc>> {
    let seconds = if value.unsigned_abs().to_string().len() > SECONDS_DIGITS {
        value / 1000
    } else {
        value
    };
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| FerryError::Source(format!("Epoch timestamp out of range: {}", value)))
}

/// Parse either a run of digits (epoch) or an ISO-8601 timestamp.
pub fn parse(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        let value: i64 = text
            .parse()
            .map_err(|e| FerryError::Source(format!("Invalid epoch '{}': {}", text, e)))?;
        return from_epoch(value);
    }

    let parsed = DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .map_err(|e| FerryError::Source(format!("Invalid timestamp '{}': {}", text, e)))?;
    Ok(truncate_to_seconds(parsed))
}

pub fn format_ledger(dt: &DateTime<Utc>) -> String {
    dt.format(LEDGER_FORMAT).to_string()
}

pub fn parse_ledger(text: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), LEDGER_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| FerryError::Ledger(format!("Invalid ledger timestamp '{}': {}", text, e)))
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}

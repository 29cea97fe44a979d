//! Date and timestamp normalization with chrono.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use super::TypeHandler;
use crate::meta::Column;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATE_INPUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y", "%m/%d/%Y"];
const DATETIME_INPUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse any accepted timestamp form. Offsets are converted to UTC.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    DATETIME_INPUTS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
        .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_INPUTS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| {
            // a timestamp passed where a date is expected
            text.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok())
        })
}

fn text_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

/// `Date` → `YYYY-MM-DD`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DateHandler;

impl TypeHandler for DateHandler {
    fn serialize_value(&self, value: &Value, _column: &Column) -> Value {
        text_of(value)
            .and_then(parse_date)
            .map(|d| Value::String(d.format(DATE_FORMAT).to_string()))
            .unwrap_or(Value::Null)
    }

    fn parse_value(&self, value: &Value, column: &Column) -> Value {
        self.serialize_value(value, column)
    }
}

/// `DateTime` and the system timestamps → `YYYY-MM-DD HH:MM:SS` (UTC).
#[derive(Debug, Default, Clone, Copy)]
pub struct DateTimeHandler;

impl TypeHandler for DateTimeHandler {
    fn serialize_value(&self, value: &Value, _column: &Column) -> Value {
        text_of(value)
            .and_then(parse_datetime)
            .map(|d| Value::String(d.format(DATETIME_FORMAT).to_string()))
            .unwrap_or(Value::Null)
    }

    fn parse_value(&self, value: &Value, column: &Column) -> Value {
        self.serialize_value(value, column)
    }
}

//! `Duration` columns store whole seconds and display by `meta.duration`:
//!
//! | meta.duration | format |
//! |---|---|
//! | 0 | `h:mm` |
//! | 1 | `h:mm:ss` |
//! | 2 | `h:mm:ss.s` |
//! | 3 | `h:mm:ss.ss` |
//! | 4 | `h:mm:ss.sss` |

use serde_json::Value;

use super::number::number_value;
use super::TypeHandler;
use crate::meta::Column;

#[derive(Debug, Default, Clone, Copy)]
pub struct DurationHandler;

impl DurationHandler {
    fn format_index(column: &Column) -> i64 {
        column.meta_i64("duration").unwrap_or(0).clamp(0, 4)
    }

    /// Parse `h:mm`, `h:mm:ss` or `h:mm:ss.fff` into seconds.
    ///
    /// A bare number is read as minutes for the `h:mm` format and as seconds
    /// otherwise.
    pub fn to_seconds(text: &str, format: i64) -> Option<f64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if !text.contains(':') {
            let n: f64 = text.parse().ok().filter(|f: &f64| f.is_finite())?;
            return Some(if format == 0 { n * 60.0 } else { n });
        }

        let parts: Vec<&str> = text.split(':').collect();
        let (h, m, s) = match parts.as_slice() {
            [h, m] => (*h, *m, "0"),
            [h, m, s] => (*h, *m, *s),
            _ => return None,
        };
        let hours: f64 = h.trim().parse().ok()?;
        let minutes: f64 = m.trim().parse().ok()?;
        let seconds: f64 = s.trim().parse().ok()?;
        if minutes < 0.0 || seconds < 0.0 {
            return None;
        }
        let sign = if h.trim_start().starts_with('-') { -1.0 } else { 1.0 };
        Some(sign * (hours.abs() * 3600.0 + minutes * 60.0 + seconds))
    }

    /// Format seconds for display.
    pub fn from_seconds(total: f64, format: i64) -> String {
        let sign = if total < 0.0 { "-" } else { "" };
        let total = total.abs();
        let hours = (total / 3600.0).floor();
        let minutes = ((total - hours * 3600.0) / 60.0).floor();
        let seconds = total - hours * 3600.0 - minutes * 60.0;
        match format {
            0 => {
                let minutes = (total / 60.0).round() - hours * 60.0;
                format!("{sign}{}:{:02}", hours as i64, minutes as i64)
            }
            1 => format!(
                "{sign}{}:{:02}:{:02}",
                hours as i64,
                minutes as i64,
                seconds.round() as i64
            ),
            n => {
                let digits = (n - 1) as usize;
                let width = digits + 3;
                format!(
                    "{sign}{}:{:02}:{:0width$.digits$}",
                    hours as i64, minutes as i64, seconds
                )
            }
        }
    }
}

impl TypeHandler for DurationHandler {
    fn serialize_value(&self, value: &Value, column: &Column) -> Value {
        match value {
            Value::Number(n) => n.as_f64().map(number_value).unwrap_or(Value::Null),
            Value::String(s) => Self::to_seconds(s, Self::format_index(column))
                .map(number_value)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn parse_value(&self, value: &Value, _column: &Column) -> Value {
        match value {
            Value::Number(_) => value.clone(),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .map(number_value)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    fn parse_plain_cell_value(&self, value: &Value, column: &Column) -> String {
        match self.parse_value(value, column) {
            Value::Number(n) => n
                .as_f64()
                .map(|f| Self::from_seconds(f, Self::format_index(column)))
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}

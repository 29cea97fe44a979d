//! Numeric handlers.

use serde_json::{Number, Value};

use super::{plain_text, TypeHandler};
use crate::meta::Column;

/// Parse a user-supplied value as a finite float, keeping only characters
/// accepted by `keep`.
fn to_f64(value: &Value, keep: impl Fn(char) -> bool) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| keep(*c)).collect();
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

fn numeric_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E' | '+')
}

/// Integral floats become JSON integers so `3.0` and `3` compare equal.
pub(crate) fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Insert `,` thousands separators into the integral part.
fn group_thousands(f: f64) -> String {
    let text = number_value(f).to_string();
    let (int_part, frac) = match text.split_once('.') {
        Some((i, d)) => (i.to_string(), Some(d.to_string())),
        None => (text, None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => ("", int_part),
    };
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac {
        Some(d) => format!("{sign}{grouped}.{d}"),
        None => format!("{sign}{grouped}"),
    }
}

/// `Number`. Honours `meta.isLocaleString` on display.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumberHandler;

impl TypeHandler for NumberHandler {
    fn serialize_value(&self, value: &Value, column: &Column) -> Value {
        let locale = column.meta_bool("isLocaleString");
        let parsed = if locale {
            to_f64(value, |c| c != ',' && !c.is_whitespace())
        } else {
            to_f64(value, |c| !c.is_whitespace())
        };
        parsed.map(number_value).unwrap_or(Value::Null)
    }

    fn parse_value(&self, value: &Value, column: &Column) -> Value {
        let Some(f) = to_f64(value, numeric_char) else {
            return Value::Null;
        };
        if column.meta_bool("isLocaleString") {
            Value::String(group_thousands(f))
        } else {
            number_value(f)
        }
    }
}

/// `Decimal`, displayed with `meta.precision` fraction digits (default 1).
#[derive(Debug, Default, Clone, Copy)]
pub struct DecimalHandler;

impl DecimalHandler {
    fn precision(column: &Column) -> usize {
        column
            .meta_i64("precision")
            .map(|p| p.clamp(0, 8) as usize)
            .unwrap_or(1)
    }
}

impl TypeHandler for DecimalHandler {
    fn serialize_value(&self, value: &Value, _column: &Column) -> Value {
        to_f64(value, |c| c != ',' && !c.is_whitespace())
            .map(number_value)
            .unwrap_or(Value::Null)
    }

    fn parse_value(&self, value: &Value, column: &Column) -> Value {
        match to_f64(value, numeric_char) {
            Some(f) => Value::String(format!("{:.*}", Self::precision(column), f)),
            None => Value::Null,
        }
    }
}

/// `Currency`. Symbols and grouping are stripped on input.
#[derive(Debug, Default, Clone, Copy)]
pub struct CurrencyHandler;

impl TypeHandler for CurrencyHandler {
    fn serialize_value(&self, value: &Value, _column: &Column) -> Value {
        to_f64(value, |c| c.is_ascii_digit() || c == '.' || c == '-')
            .map(number_value)
            .unwrap_or(Value::Null)
    }

    fn parse_value(&self, value: &Value, _column: &Column) -> Value {
        to_f64(value, numeric_char)
            .map(number_value)
            .unwrap_or(Value::Null)
    }

    fn parse_plain_cell_value(&self, value: &Value, column: &Column) -> String {
        let Some(f) = to_f64(value, numeric_char) else {
            return String::new();
        };
        let code = column
            .meta_value("currency_code")
            .map(|v| plain_text(&v))
            .unwrap_or_else(|| "USD".to_string());
        format!("{code} {:.2}", f)
    }
}

/// `Percent`. A trailing `%` is accepted on input.
#[derive(Debug, Default, Clone, Copy)]
pub struct PercentHandler;

impl TypeHandler for PercentHandler {
    fn serialize_value(&self, value: &Value, _column: &Column) -> Value {
        to_f64(value, |c| c != '%' && !c.is_whitespace())
            .map(number_value)
            .unwrap_or(Value::Null)
    }

    fn parse_value(&self, value: &Value, _column: &Column) -> Value {
        to_f64(value, |c| c != '%')
            .map(number_value)
            .unwrap_or(Value::Null)
    }

    fn parse_plain_cell_value(&self, value: &Value, column: &Column) -> String {
        match self.parse_value(value, column) {
            Value::Null => String::new(),
            v => format!("{v}%"),
        }
    }
}

/// `Rating`, clamped to `0..=meta.max` (default 5).
#[derive(Debug, Default, Clone, Copy)]
pub struct RatingHandler;

impl RatingHandler {
    fn clamp(value: &Value, column: &Column) -> Value {
        let max = column.meta_i64("max").unwrap_or(5).max(1);
        match to_f64(value, numeric_char) {
            Some(f) => Value::from((f.round() as i64).clamp(0, max)),
            None => Value::Null,
        }
    }
}

impl TypeHandler for RatingHandler {
    fn serialize_value(&self, value: &Value, column: &Column) -> Value {
        Self::clamp(value, column)
    }

    fn parse_value(&self, value: &Value, column: &Column) -> Value {
        Self::clamp(value, column)
    }
}

/// `Year`, integral only.
#[derive(Debug, Default, Clone, Copy)]
pub struct YearHandler;

impl TypeHandler for YearHandler {
    fn serialize_value(&self, value: &Value, _column: &Column) -> Value {
        match to_f64(value, |c| !c.is_whitespace()) {
            Some(f) if f.fract() == 0.0 => Value::from(f as i64),
            _ => Value::Null,
        }
    }

    fn parse_value(&self, value: &Value, column: &Column) -> Value {
        self.serialize_value(value, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::UiType;
    use serde_json::json;

    fn column(uidt: UiType, meta: Value) -> Column {
        Column::new("c", "C", "c", uidt).with_meta(meta)
    }

    #[test]
    fn test_number_locale_string() {
        let col = column(UiType::Number, json!({"isLocaleString": true}));
        assert_eq!(NumberHandler.serialize_value(&json!("1,234,567"), &col), json!(1234567));
        assert_eq!(NumberHandler.parse_value(&json!(1234567), &col), json!("1,234,567"));
        assert_eq!(NumberHandler.parse_value(&json!(-1234.5), &col), json!("-1,234.5"));
    }

    #[test]
    fn test_number_rejects_garbage() {
        let col = column(UiType::Number, Value::Null);
        assert_eq!(NumberHandler.serialize_value(&json!("abc"), &col), Value::Null);
        assert_eq!(NumberHandler.serialize_value(&json!("NaN"), &col), Value::Null);
        assert_eq!(NumberHandler.serialize_value(&json!(""), &col), Value::Null);
        assert_eq!(NumberHandler.serialize_value(&json!(" 12 "), &col), json!(12));
    }

    #[test]
    fn test_decimal_precision() {
        let col = column(UiType::Decimal, json!({"precision": 3}));
        assert_eq!(DecimalHandler.parse_value(&json!(1.5), &col), json!("1.500"));
        let col = column(UiType::Decimal, Value::Null);
        assert_eq!(DecimalHandler.parse_value(&json!(2), &col), json!("2.0"));
    }

    #[test]
    fn test_currency_strips_symbols() {
        let col = column(UiType::Currency, json!({"currency_code": "EUR"}));
        assert_eq!(CurrencyHandler.serialize_value(&json!("$1,050.25"), &col), json!(1050.25));
        assert_eq!(CurrencyHandler.parse_plain_cell_value(&json!(3), &col), "EUR 3.00");
    }

    #[test]
    fn test_percent() {
        let col = column(UiType::Percent, Value::Null);
        assert_eq!(PercentHandler.serialize_value(&json!("45%"), &col), json!(45));
        assert_eq!(PercentHandler.parse_plain_cell_value(&json!(45), &col), "45%");
    }

    #[test]
    fn test_rating_clamps_to_max() {
        let col = column(UiType::Rating, json!({"max": 10}));
        assert_eq!(RatingHandler.serialize_value(&json!(12), &col), json!(10));
        let col = column(UiType::Rating, Value::Null);
        assert_eq!(RatingHandler.serialize_value(&json!("7"), &col), json!(5));
        assert_eq!(RatingHandler.serialize_value(&json!(-1), &col), json!(0));
    }

    #[test]
    fn test_year() {
        let col = column(UiType::Year, Value::Null);
        assert_eq!(YearHandler.serialize_value(&json!("2024"), &col), json!(2024));
        assert_eq!(YearHandler.serialize_value(&json!("2024.5"), &col), Value::Null);
    }
}

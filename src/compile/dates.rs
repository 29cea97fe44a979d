//! Relative date sub-operations resolved against the compile clock.

use chrono::{DateTime, Days, Months, NaiveDate, Utc};
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::meta::ComparisonSubOp;
use crate::types::parse_date;

fn day_count(value: &Value) -> QueryResult<Option<u64>> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    text.parse::<u64>()
        .map(Some)
        .map_err(|_| QueryError::InvalidFilter(format!("'{text}' is not a number of days")))
}

fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

fn shift_months(date: NaiveDate, months: i32) -> Option<NaiveDate> {
    if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    }
}

/// The day a comparison sub-op points at.
///
/// `Ok(None)` means the filter carries no usable value and is skipped.
pub(crate) fn resolve_day(
    sub_op: ComparisonSubOp,
    value: &Value,
    now: DateTime<Utc>,
) -> QueryResult<Option<NaiveDate>> {
    use ComparisonSubOp::*;

    let today = now.date_naive();
    let day = match sub_op {
        Today => Some(today),
        Tomorrow => shift_days(today, 1),
        Yesterday => shift_days(today, -1),
        OneWeekAgo => shift_days(today, -7),
        OneWeekFromNow => shift_days(today, 7),
        OneMonthAgo => shift_months(today, -1),
        OneMonthFromNow => shift_months(today, 1),
        DaysAgo => match day_count(value)? {
            Some(n) => shift_days(today, -(n as i64)),
            None => return Ok(None),
        },
        DaysFromNow => match day_count(value)? {
            Some(n) => shift_days(today, n as i64),
            None => return Ok(None),
        },
        ExactDate => match value {
            Value::String(s) if !s.trim().is_empty() => Some(parse_date(s).ok_or_else(|| {
                QueryError::InvalidFilter(format!("'{s}' is not a date"))
            })?),
            _ => return Ok(None),
        },
        other => {
            return Err(QueryError::InvalidFilter(format!(
                "sub-operation '{}' needs the isWithin operator",
                other.as_str()
            )))
        }
    };
    Ok(day)
}

/// Inclusive `(from, to)` day range of an `isWithin` sub-op.
pub(crate) fn resolve_range(
    sub_op: ComparisonSubOp,
    value: &Value,
    now: DateTime<Utc>,
) -> QueryResult<Option<(NaiveDate, NaiveDate)>> {
    use ComparisonSubOp::*;

    let today = now.date_naive();
    let (past, edge) = match sub_op {
        PastWeek => (true, shift_days(today, -7)),
        PastMonth => (true, shift_months(today, -1)),
        PastYear => (true, shift_months(today, -12)),
        NextWeek => (false, shift_days(today, 7)),
        NextMonth => (false, shift_months(today, 1)),
        NextYear => (false, shift_months(today, 12)),
        PastNumberOfDays => match day_count(value)? {
            Some(n) => (true, shift_days(today, -(n as i64))),
            None => return Ok(None),
        },
        NextNumberOfDays => match day_count(value)? {
            Some(n) => (false, shift_days(today, n as i64)),
            None => return Ok(None),
        },
        other => {
            return Err(QueryError::InvalidFilter(format!(
                "sub-operation '{}' is not a range",
                other.as_str()
            )))
        }
    };
    Ok(edge.map(|edge| if past { (edge, today) } else { (today, edge) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 31, 15, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fixed_offsets() {
        use ComparisonSubOp::*;
        assert_eq!(resolve_day(Today, &Value::Null, now()).unwrap(), Some(day(2024, 3, 31)));
        assert_eq!(resolve_day(Tomorrow, &Value::Null, now()).unwrap(), Some(day(2024, 4, 1)));
        assert_eq!(resolve_day(OneWeekAgo, &Value::Null, now()).unwrap(), Some(day(2024, 3, 24)));
        // month arithmetic clamps to the last day
        assert_eq!(resolve_day(OneMonthAgo, &Value::Null, now()).unwrap(), Some(day(2024, 2, 29)));
    }

    #[test]
    fn test_day_counts() {
        use ComparisonSubOp::*;
        assert_eq!(resolve_day(DaysAgo, &json!("10"), now()).unwrap(), Some(day(2024, 3, 21)));
        assert_eq!(resolve_day(DaysFromNow, &json!(1), now()).unwrap(), Some(day(2024, 4, 1)));
        assert_eq!(resolve_day(DaysAgo, &json!(""), now()).unwrap(), None);
        assert!(resolve_day(DaysAgo, &json!("ten"), now()).is_err());
    }

    #[test]
    fn test_exact_date() {
        assert_eq!(
            resolve_day(ComparisonSubOp::ExactDate, &json!("2024/01/05"), now()).unwrap(),
            Some(day(2024, 1, 5))
        );
    }

    #[test]
    fn test_ranges() {
        use ComparisonSubOp::*;
        assert_eq!(
            resolve_range(PastWeek, &Value::Null, now()).unwrap(),
            Some((day(2024, 3, 24), day(2024, 3, 31)))
        );
        assert_eq!(
            resolve_range(NextNumberOfDays, &json!(3), now()).unwrap(),
            Some((day(2024, 3, 31), day(2024, 4, 3)))
        );
        assert!(resolve_range(Today, &Value::Null, now()).is_err());
    }
}

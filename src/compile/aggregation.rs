//! Footer aggregations.
//!
//! Which aggregations a column offers depends on its type family:
//!
//! | family     | types                          | aggregations                                   |
//! |------------|--------------------------------|------------------------------------------------|
//! | common     | every type                     | count, empty/filled/unique counts and percents |
//! | numerical  | numbers, rollups, link counts  | avg, min, max, sum, stddev, range, median      |
//! | boolean    | Checkbox                       | checked/unchecked counts and percents          |
//! | date       | Date, DateTime, system times   | earliest, latest, day range, month range       |
//! | attachment | Attachment                     | total attachment size                          |
//!
//! Every result except `earliestDate`/`latestDate` is wrapped in
//! `COALESCE(.., 0)` so an empty table aggregates to zero.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{QueryError, QueryResult};
use crate::meta::{Column, Model, UiType};
use crate::sql::{
    avg, case_when, coalesce, count_distinct, count_star, func, lit_bool, lit_float, lit_int,
    lit_str, max, min, sum, Dialect, Expr, ExprExt, Query, SelectExpr, SqlDialect,
};

use super::context::CompileContext;
use super::value::column_value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Aggregation {
    #[default]
    None,
    Count,
    CountEmpty,
    CountFilled,
    CountUnique,
    PercentEmpty,
    PercentFilled,
    PercentUnique,
    Avg,
    Max,
    Min,
    Sum,
    StandardDeviation,
    Range,
    Median,
    Checked,
    Unchecked,
    PercentChecked,
    PercentUnchecked,
    EarliestDate,
    LatestDate,
    DateRange,
    MonthRange,
    AttachmentSize,
}

const COMMON: [Aggregation; 8] = [
    Aggregation::None,
    Aggregation::Count,
    Aggregation::CountEmpty,
    Aggregation::CountFilled,
    Aggregation::CountUnique,
    Aggregation::PercentEmpty,
    Aggregation::PercentFilled,
    Aggregation::PercentUnique,
];

const NUMERICAL: [Aggregation; 7] = [
    Aggregation::Avg,
    Aggregation::Max,
    Aggregation::Min,
    Aggregation::Sum,
    Aggregation::StandardDeviation,
    Aggregation::Range,
    Aggregation::Median,
];

const BOOLEAN: [Aggregation; 4] = [
    Aggregation::Checked,
    Aggregation::Unchecked,
    Aggregation::PercentChecked,
    Aggregation::PercentUnchecked,
];

const DATE: [Aggregation; 4] = [
    Aggregation::EarliestDate,
    Aggregation::LatestDate,
    Aggregation::DateRange,
    Aggregation::MonthRange,
];

const ATTACHMENT: [Aggregation; 1] = [Aggregation::AttachmentSize];

impl Aggregation {
    pub const ALL: [Aggregation; 24] = [
        Aggregation::None,
        Aggregation::Count,
        Aggregation::CountEmpty,
        Aggregation::CountFilled,
        Aggregation::CountUnique,
        Aggregation::PercentEmpty,
        Aggregation::PercentFilled,
        Aggregation::PercentUnique,
        Aggregation::Avg,
        Aggregation::Max,
        Aggregation::Min,
        Aggregation::Sum,
        Aggregation::StandardDeviation,
        Aggregation::Range,
        Aggregation::Median,
        Aggregation::Checked,
        Aggregation::Unchecked,
        Aggregation::PercentChecked,
        Aggregation::PercentUnchecked,
        Aggregation::EarliestDate,
        Aggregation::LatestDate,
        Aggregation::DateRange,
        Aggregation::MonthRange,
        Aggregation::AttachmentSize,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Aggregation::None => "none",
            Aggregation::Count => "count",
            Aggregation::CountEmpty => "countEmpty",
            Aggregation::CountFilled => "countFilled",
            Aggregation::CountUnique => "countUnique",
            Aggregation::PercentEmpty => "percentEmpty",
            Aggregation::PercentFilled => "percentFilled",
            Aggregation::PercentUnique => "percentUnique",
            Aggregation::Avg => "avg",
            Aggregation::Max => "max",
            Aggregation::Min => "min",
            Aggregation::Sum => "sum",
            Aggregation::StandardDeviation => "standardDeviation",
            Aggregation::Range => "range",
            Aggregation::Median => "median",
            Aggregation::Checked => "checked",
            Aggregation::Unchecked => "unchecked",
            Aggregation::PercentChecked => "percentChecked",
            Aggregation::PercentUnchecked => "percentUnchecked",
            Aggregation::EarliestDate => "earliestDate",
            Aggregation::LatestDate => "latestDate",
            Aggregation::DateRange => "dateRange",
            Aggregation::MonthRange => "monthRange",
            Aggregation::AttachmentSize => "attachmentSize",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aggregation::ALL
            .iter()
            .copied()
            .find(|agg| agg.as_str() == s)
            .ok_or_else(|| format!("unknown aggregation: {s}"))
    }
}

/// Aggregations legal for a column type: the common set plus its family.
pub fn available_aggregations(uidt: UiType) -> Vec<Aggregation> {
    let family: &[Aggregation] = if uidt == UiType::Checkbox {
        &BOOLEAN
    } else if uidt.is_date() {
        &DATE
    } else if uidt == UiType::Attachment {
        &ATTACHMENT
    } else if uidt.is_numeric() {
        &NUMERICAL
    } else {
        &[]
    };
    COMMON.iter().chain(family).copied().collect()
}

pub fn validate(uidt: UiType, aggregation: Aggregation) -> bool {
    available_aggregations(uidt).contains(&aggregation)
}

/// Compile `aggregation` of `column` over the rows selected by `source`.
///
/// Legality is checked before any SQL is built. `Ok(None)` is returned for
/// [`Aggregation::None`].
pub fn compile_aggregation<'a>(
    aggregation: Aggregation,
    column: &'a Column,
    model: &'a Model,
    alias: &str,
    source: &Query,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Option<SelectExpr>> {
    if !validate(column.uidt, aggregation) {
        return Err(QueryError::AggregationNotAvailable {
            aggregation: aggregation.to_string(),
            uidt: column.uidt.to_string(),
        });
    }
    if aggregation == Aggregation::None {
        return Ok(None);
    }

    let value = column_value(column, model, alias, ctx)?;
    let dialect = ctx.dialect;
    // SQL Server cannot aggregate over a subquery.
    if dialect == Dialect::TSql && aggregation != Aggregation::Count && value.has_subquery() {
        return Err(QueryError::NotImplemented(format!(
            "{aggregation} over computed column '{}' is not supported on {dialect}",
            column.title
        )));
    }
    let empty = is_empty(column.uidt, value.clone());
    let filled = is_filled(column.uidt, value.clone());

    let expr = match aggregation {
        Aggregation::None => return Ok(None),
        Aggregation::Count => count_star(),
        Aggregation::CountEmpty => count_where(dialect, empty),
        Aggregation::CountFilled => count_where(dialect, filled),
        Aggregation::CountUnique => unique(filled, value),
        Aggregation::PercentEmpty => percent(count_where(dialect, empty)),
        Aggregation::PercentFilled => percent(count_where(dialect, filled)),
        Aggregation::PercentUnique => percent(unique(filled, value)),

        Aggregation::Avg => avg(value),
        Aggregation::Max => max(value),
        Aggregation::Min => min(value),
        Aggregation::Sum => sum(value),
        Aggregation::Range => max(value.clone()).sub(min(value)),
        Aggregation::StandardDeviation => match dialect.stddev_function() {
            Some(name) => func(name, vec![value]),
            None => func(
                "SQRT",
                vec![avg(value.clone().mul(value.clone()))
                    .sub(avg(value.clone()).mul(avg(value)))],
            ),
        },
        Aggregation::Median => dialect.median(value, source).ok_or_else(|| {
            QueryError::NotImplemented(format!("median is not supported on {dialect}"))
        })?,

        Aggregation::Checked => count_where(dialect, value.eq(lit_bool(true))),
        Aggregation::Unchecked => count_where(dialect, unchecked(value)),
        Aggregation::PercentChecked => percent(count_where(dialect, value.eq(lit_bool(true)))),
        Aggregation::PercentUnchecked => percent(count_where(dialect, unchecked(value))),

        Aggregation::EarliestDate => min(value),
        Aggregation::LatestDate => max(value),
        Aggregation::DateRange => dialect.date_range_days(max(value.clone()), min(value)),
        Aggregation::MonthRange => dialect.month_range(max(value.clone()), min(value)),

        Aggregation::AttachmentSize => {
            let per_row = dialect.attachment_size(value).ok_or_else(|| {
                QueryError::NotImplemented(format!("attachment size is not supported on {dialect}"))
            })?;
            sum(per_row)
        }
    };

    let expr = match aggregation {
        Aggregation::EarliestDate | Aggregation::LatestDate => expr,
        _ => coalesce(vec![expr, lit_int(0)]),
    };
    ctx.log_aliases("aggregation");
    Ok(Some(expr.alias(&column.id)))
}

// =============================================================================
// Building blocks
// =============================================================================

/// How a type stores "no value".
enum EmptySentinel {
    Null,
    Zero,
    EmptyString,
}

fn sentinel(uidt: UiType) -> EmptySentinel {
    match uidt {
        UiType::Rating => EmptySentinel::Zero,
        uidt if uidt.blank_is_null_only() => EmptySentinel::Null,
        UiType::Checkbox
        | UiType::Formula
        | UiType::Lookup
        | UiType::LinkToAnotherRecord
        | UiType::Button => EmptySentinel::Null,
        _ => EmptySentinel::EmptyString,
    }
}

fn is_empty(uidt: UiType, value: Expr) -> Expr {
    match sentinel(uidt) {
        EmptySentinel::Null => value.is_null(),
        EmptySentinel::Zero => value.clone().is_null().or(value.eq(lit_int(0))),
        EmptySentinel::EmptyString => value.clone().is_null().or(value.eq(lit_str(""))),
    }
}

fn is_filled(uidt: UiType, value: Expr) -> Expr {
    match sentinel(uidt) {
        EmptySentinel::Null => value.is_not_null(),
        EmptySentinel::Zero => value.clone().is_not_null().and(value.ne(lit_int(0))),
        EmptySentinel::EmptyString => value.clone().is_not_null().and(value.ne(lit_str(""))),
    }
}

fn unchecked(value: Expr) -> Expr {
    value.clone().eq(lit_bool(false)).or(value.is_null())
}

/// Rows matching `condition`.
fn count_where(dialect: Dialect, condition: Expr) -> Expr {
    if dialect.supports_aggregate_filter() {
        Expr::FilteredAggregate {
            function: Box::new(count_star()),
            filter: Box::new(condition),
        }
    } else {
        sum(case_when(vec![(condition, lit_int(1))], Some(lit_int(0))))
    }
}

/// Distinct filled values.
fn unique(filled: Expr, value: Expr) -> Expr {
    count_distinct(case_when(vec![(filled, value)], None))
}

fn percent(count: Expr) -> Expr {
    count
        .mul(lit_float(100.0))
        .div(func("NULLIF", vec![count_star(), lit_int(0)]))
}

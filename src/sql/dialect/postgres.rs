//! PostgreSQL SQL dialect.
//!
//! PostgreSQL features used by the compilers:
//! - ANSI identifier quoting (`"`)
//! - Native boolean type (true/false)
//! - ILIKE for case-insensitive matching
//! - FILTER clause for aggregates
//! - PERCENTILE_CONT ... WITHIN GROUP for medians
//! - `->>` JSON text extraction

use super::helpers;
use super::{Dialect, SqlDialect};
use crate::sql::expr::{cast, func, lit_float, lit_int, lit_str, raw_sql, Expr, ExprExt};
use crate::sql::query::Query;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn kind(&self) -> Dialect {
        Dialect::Postgres
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn supports_ilike(&self) -> bool {
        true
    }

    fn supports_aggregate_filter(&self) -> bool {
        true
    }

    fn stddev_function(&self) -> Option<&'static str> {
        Some("STDDEV_POP")
    }

    fn median(&self, expr: Expr, _source: &Query) -> Option<Expr> {
        Some(Expr::WithinGroup {
            function: Box::new(func("PERCENTILE_CONT", vec![lit_float(0.5)])),
            order_by: Box::new(expr),
        })
    }

    fn date_range_days(&self, max: Expr, min: Expr) -> Expr {
        cast(max, "DATE").sub(cast(min, "DATE"))
    }

    fn month_range(&self, max: Expr, min: Expr) -> Expr {
        let age = func("AGE", vec![max, min]);
        func("DATE_PART", vec![lit_str("year"), age.clone()])
            .mul(lit_int(12))
            .add(func("DATE_PART", vec![lit_str("month"), age]))
    }

    fn attachment_size(&self, expr: Expr) -> Option<Expr> {
        let attachments = expr.to_sql(Dialect::Postgres);
        Some(raw_sql(&format!(
            "(SELECT COALESCE(SUM(CAST(obj ->> 'size' AS BIGINT)), 0) \
             FROM JSONB_ARRAY_ELEMENTS(CAST({attachments} AS JSONB)) AS elem(obj))"
        )))
    }

    fn string_agg(&self, expr: Expr) -> Expr {
        cast(func("JSON_AGG", vec![expr]), "TEXT")
    }

    fn date_only(&self, expr: Expr) -> Expr {
        cast(expr, "DATE")
    }

    fn json_extract(&self, expr: Expr, key: &str) -> Expr {
        let text = cast(expr, "JSONB").json_text(lit_str(key));
        func("BTRIM", vec![text, lit_str("\"")])
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_postgres(name)
    }
}

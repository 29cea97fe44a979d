//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Boolean is TINYINT(1), returns 1/0
//! - `||` is logical OR by default (use CONCAT())
//! - Backslash escapes inside string literals
//! - No NULLS FIRST/LAST (NULL sorts lowest)
//! - Case-insensitive default collations, so equality goes through BINARY

use super::helpers;
use super::{Dialect, SqlDialect};
use crate::sql::expr::{cast, func, lit_str, raw_sql, Expr};
use crate::sql::query::Query;

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn kind(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_backslash(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn supports_concat_operator(&self) -> bool {
        false
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn stddev_function(&self) -> Option<&'static str> {
        Some("STDDEV_POP")
    }

    fn median(&self, expr: Expr, source: &Query) -> Option<Expr> {
        Some(helpers::median_by_row_number(
            Dialect::MySql,
            expr,
            source,
            helpers::half_floor,
        ))
    }

    fn date_range_days(&self, max: Expr, min: Expr) -> Expr {
        func("TIMESTAMPDIFF", vec![raw_sql("DAY"), min, max])
    }

    fn month_range(&self, max: Expr, min: Expr) -> Expr {
        func(
            "PERIOD_DIFF",
            vec![
                func("DATE_FORMAT", vec![max, lit_str("%Y%m")]),
                func("DATE_FORMAT", vec![min, lit_str("%Y%m")]),
            ],
        )
    }

    fn attachment_size(&self, expr: Expr) -> Option<Expr> {
        let attachments = expr.to_sql(Dialect::MySql);
        Some(raw_sql(&format!(
            "(SELECT COALESCE(SUM(jt.size), 0) FROM JSON_TABLE({attachments}, '$[*]' \
             COLUMNS(size BIGINT PATH '$.size')) AS jt)"
        )))
    }

    fn string_agg(&self, expr: Expr) -> Expr {
        cast(func("JSON_ARRAYAGG", vec![expr]), "NCHAR")
    }

    fn cast_to_text(&self, expr: Expr) -> Expr {
        cast(expr, "CHAR")
    }

    fn text_sort_key(&self, expr: Expr) -> Expr {
        func("CONCAT", vec![expr])
    }

    fn case_sensitive(&self, expr: Expr) -> Expr {
        cast(expr, "BINARY")
    }

    fn json_extract(&self, expr: Expr, key: &str) -> Expr {
        func(
            "JSON_UNQUOTE",
            vec![func("JSON_EXTRACT", vec![expr, lit_str(&format!("$.{key}"))])],
        )
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_mysql(name)
    }
}

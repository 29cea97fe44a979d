//! T-SQL (SQL Server / Azure SQL) dialect.
//!
//! T-SQL has significant differences from ANSI:
//! - Square bracket identifier quoting (`[name]`)
//! - No boolean literals; BIT columns compare with 1/0
//! - OFFSET FETCH for pagination (requires ORDER BY)
//! - N'...' prefix for Unicode strings
//! - String concatenation with `+`
//! - No NULLS FIRST/LAST before 2022 (NULL sorts lowest)

use super::helpers;
use super::{Dialect, SqlDialect};
use crate::sql::expr::{cast, func, lit_str, raw_sql, Expr};
use crate::sql::query::Query;
use crate::sql::token::TokenStream;

/// T-SQL (SQL Server) dialect.
#[derive(Debug, Clone, Copy)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn kind(&self) -> Dialect {
        Dialect::TSql
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_bracket(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        // N prefix only when the literal needs it
        if !s.is_ascii() {
            helpers::quote_string_unicode(s)
        } else {
            helpers::quote_string_single(s)
        }
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_tsql(limit, offset)
    }

    fn requires_order_by_for_offset(&self) -> bool {
        true
    }

    fn concat_operator(&self) -> &'static str {
        "+"
    }

    fn supports_nulls_ordering(&self) -> bool {
        // 2022+ only
        false
    }

    fn stddev_function(&self) -> Option<&'static str> {
        Some("STDEVP")
    }

    fn median(&self, _expr: Expr, _source: &Query) -> Option<Expr> {
        None
    }

    fn date_range_days(&self, max: Expr, min: Expr) -> Expr {
        func("DATEDIFF", vec![raw_sql("DAY"), min, max])
    }

    fn month_range(&self, max: Expr, min: Expr) -> Expr {
        func("DATEDIFF", vec![raw_sql("MONTH"), min, max])
    }

    fn string_agg(&self, expr: Expr) -> Expr {
        func("STRING_AGG", vec![expr, lit_str(super::LOOKUP_SEPARATOR)])
    }

    fn cast_to_text(&self, expr: Expr) -> Expr {
        cast(expr, "NVARCHAR(MAX)")
    }

    fn text_sort_key(&self, expr: Expr) -> Expr {
        cast(expr, "VARCHAR(MAX)")
    }

    fn date_only(&self, expr: Expr) -> Expr {
        cast(expr, "DATE")
    }

    fn json_extract(&self, expr: Expr, key: &str) -> Expr {
        func("JSON_VALUE", vec![expr, lit_str(&format!("$.{key}"))])
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_tsql(name)
    }
}

//! SQLite SQL dialect.
//!
//! SQLite specifics:
//! - ANSI identifier quoting (`"`)
//! - No boolean type; true/false are stored as 1/0
//! - NULLS FIRST/LAST since 3.30
//! - JSON1 functions (`json_extract`, `json_each`) are built in
//! - Dates are text, so day/month arithmetic goes through JULIANDAY and STRFTIME

use super::helpers;
use super::{Dialect, SqlDialect};
use crate::sql::expr::{cast, func, lit_int, lit_str, raw_sql, Expr, ExprExt};

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

fn year_month_index(date: Expr) -> Expr {
    cast(func("STRFTIME", vec![lit_str("%Y"), date.clone()]), "INTEGER")
        .mul(lit_int(12))
        .add(cast(func("STRFTIME", vec![lit_str("%m"), date]), "INTEGER"))
        .paren()
}

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn kind(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    fn date_range_days(&self, max: Expr, min: Expr) -> Expr {
        cast(
            func("JULIANDAY", vec![max]).sub(func("JULIANDAY", vec![min])),
            "INTEGER",
        )
    }

    fn month_range(&self, max: Expr, min: Expr) -> Expr {
        year_month_index(max).sub(year_month_index(min))
    }

    fn attachment_size(&self, expr: Expr) -> Option<Expr> {
        let attachments = expr.to_sql(Dialect::Sqlite);
        Some(raw_sql(&format!(
            "(SELECT COALESCE(SUM(CAST(JSON_EXTRACT(je.value, '$.size') AS INTEGER)), 0) \
             FROM JSON_EACH({attachments}) AS je)"
        )))
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_sqlite(name)
    }
}

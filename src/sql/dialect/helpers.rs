//! Shared helper functions for SQL dialect implementations.
//!
//! This module provides reusable building blocks that dialects can compose
//! to implement the `SqlDialect` trait with minimal duplication.

use crate::sql::expr::{avg, func, lit_int, raw_sql, table_col, Expr, ExprExt};
use crate::sql::query::{Query, TableRef};
use crate::sql::token::{Token, TokenStream};

use super::Dialect;

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
/// Used by: MySQL
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets.
/// Used by: T-SQL (SQL Server, Azure SQL)
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

// =============================================================================
// String Quoting
// =============================================================================

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string for MySQL, where backslash is an escape character
/// unless `NO_BACKSLASH_ESCAPES` is set.
pub fn quote_string_backslash(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

/// Quote string with N prefix for Unicode (T-SQL).
pub fn quote_string_unicode(s: &str) -> String {
    format!("N'{}'", s.replace('\'', "''"))
}

// =============================================================================
// Boolean Formatting
// =============================================================================

/// Format boolean as literal true/false.
/// Used by: Postgres
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Format boolean as numeric 1/0.
/// Used by: T-SQL, MySQL, SQLite
pub fn format_bool_numeric(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// Emit LIMIT ... OFFSET ... (standard SQL).
/// Used by: Postgres, MySQL, SQLite
pub fn emit_limit_offset_standard(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    if let Some(lim) = limit {
        ts.push(Token::Limit)
            .space()
            .push(Token::LitInt(lim as i64));
    }

    if let Some(off) = offset {
        if limit.is_some() {
            ts.space();
        }
        ts.push(Token::Offset)
            .space()
            .push(Token::LitInt(off as i64));
    }

    ts
}

/// Emit OFFSET ... ROWS FETCH NEXT ... ROWS ONLY (T-SQL style).
/// Note: Requires ORDER BY clause in T-SQL
pub fn emit_limit_offset_tsql(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    let off = offset.unwrap_or(0);
    ts.push(Token::Offset)
        .space()
        .push(Token::LitInt(off as i64))
        .space()
        .push(Token::Rows);

    if let Some(lim) = limit {
        ts.space()
            .push(Token::Fetch)
            .space()
            .push(Token::Next)
            .space()
            .push(Token::LitInt(lim as i64))
            .space()
            .push(Token::Rows)
            .space()
            .push(Token::Only);
    }

    ts
}

// =============================================================================
// Function Remapping
// =============================================================================

/// Remap functions for Postgres dialect.
pub fn remap_function_postgres(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "LEN" => Some("LENGTH"),
        "NVL" => Some("COALESCE"),
        "IFNULL" => Some("COALESCE"),
        "ISNULL" => Some("COALESCE"),
        _ => None,
    }
}

/// Remap functions for MySQL dialect.
pub fn remap_function_mysql(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "LEN" => Some("CHAR_LENGTH"),
        "LENGTH" => Some("CHAR_LENGTH"),
        "NVL" => Some("IFNULL"),
        "ISNULL" => Some("IFNULL"),
        "SUBSTR" => Some("SUBSTRING"),
        _ => None,
    }
}

/// Remap functions for SQLite dialect.
pub fn remap_function_sqlite(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "LEN" => Some("LENGTH"),
        "NVL" => Some("IFNULL"),
        "ISNULL" => Some("IFNULL"),
        "SUBSTRING" => Some("SUBSTR"),
        _ => None,
    }
}

/// Remap functions for T-SQL dialect.
pub fn remap_function_tsql(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "LENGTH" => Some("LEN"),
        "SUBSTR" => Some("SUBSTRING"),
        "NVL" => Some("ISNULL"),
        "IFNULL" => Some("ISNULL"),
        _ => None,
    }
}

// =============================================================================
// Aggregates without a native function
// =============================================================================

/// Alias of the derived table used by [`median_by_row_number`].
pub const MEDIAN_ALIAS: &str = "__median";

/// Median over the rows of `source`, computed by numbering the non-null
/// values and averaging the one or two middle rows.
///
/// `half` turns `n` into `n / 2` rounded down for the dialect (`/` on integers
/// for SQLite and T-SQL, `FLOOR(n / 2)` for MySQL).
pub fn median_by_row_number(
    dialect: Dialect,
    expr: Expr,
    source: &Query,
    half: fn(Expr) -> Expr,
) -> Expr {
    let rendered = expr.to_sql(dialect);
    let mut numbered = Query::new()
        .select(vec![
            expr.clone().alias("v"),
            raw_sql(&format!("ROW_NUMBER() OVER (ORDER BY {rendered})")).alias("rn"),
            raw_sql("COUNT(*) OVER ()").alias("cnt"),
        ])
        .filter(expr.is_not_null());
    numbered.from = source.from.clone();
    numbered.joins = source.joins.clone();
    if let Some(existing) = &source.where_clause {
        numbered = numbered.filter(existing.clone().paren());
    }

    let count = table_col(MEDIAN_ALIAS, "cnt");
    let middle = Query::new()
        .select(vec![avg(table_col(MEDIAN_ALIAS, "v"))])
        .from(TableRef::derived(numbered, MEDIAN_ALIAS))
        .filter(table_col(MEDIAN_ALIAS, "rn").in_list(vec![
            half(count.clone().add(lit_int(1)).paren()),
            half(count.add(lit_int(2)).paren()),
        ]));

    Expr::Subquery(Box::new(middle))
}

/// Integer halving for engines where `/` on integers truncates.
pub fn half_truncating(n: Expr) -> Expr {
    n.div(lit_int(2))
}

/// Integer halving for MySQL, where `/` yields a decimal.
pub fn half_floor(n: Expr) -> Expr {
    func("FLOOR", vec![n.div(lit_int(2))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escaping() {
        assert_eq!(quote_double("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_backtick("a`b"), "`a``b`");
        assert_eq!(quote_bracket("a]b"), "[a]]b]");
    }

    #[test]
    fn test_mysql_string_escapes_backslash() {
        assert_eq!(quote_string_backslash(r"a\b'c"), r"'a\\b''c'");
    }

    #[test]
    fn test_limit_offset_standard() {
        let ts = emit_limit_offset_standard(Some(25), Some(50));
        assert_eq!(ts.serialize(Dialect::Postgres), "LIMIT 25 OFFSET 50");
    }

    #[test]
    fn test_limit_offset_tsql() {
        let ts = emit_limit_offset_tsql(Some(25), None);
        assert_eq!(
            ts.serialize(Dialect::TSql),
            "OFFSET 0 ROWS FETCH NEXT 25 ROWS ONLY"
        );
    }

    #[test]
    fn test_remap_len() {
        assert_eq!(remap_function_postgres("len"), Some("LENGTH"));
        assert_eq!(remap_function_mysql("LEN"), Some("CHAR_LENGTH"));
        assert_eq!(remap_function_sqlite("LEN"), Some("LENGTH"));
        assert_eq!(remap_function_tsql("LEN"), None);
        assert_eq!(remap_function_tsql("LENGTH"), Some("LEN"));
    }

    #[test]
    fn test_median_by_row_number_shape() {
        let source = Query::new().from(TableRef::new("orders").with_alias("__nc0"));
        let expr = median_by_row_number(
            Dialect::Sqlite,
            table_col("__nc0", "amount"),
            &source,
            half_truncating,
        );
        let sql = expr.to_sql(Dialect::Sqlite);
        assert!(sql.contains("ROW_NUMBER() OVER (ORDER BY \"__nc0\".\"amount\")"));
        assert!(sql.contains("AVG(\"__median\".\"v\")"));
        assert!(sql.contains("\"__nc0\".\"amount\" IS NOT NULL"));
    }
}

//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting: `"` (Postgres/SQLite), `` ` `` (MySQL), `[]` (T-SQL)
//! - Pagination: LIMIT/OFFSET vs OFFSET FETCH
//! - Boolean literals: true/false vs 1/0
//! - String concatenation: `||` vs `+` vs CONCAT()
//! - Text casts, JSON extraction and date truncation used by the compilers
//!
//! The compilers in [`crate::compile`] never branch on a dialect name; every
//! engine difference they need is a method here.
//!
//! # Usage
//!
//! ```ignore
//! use gridql::sql::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Postgres;
//! let quoted = dialect.quote_identifier("user");  // "user"
//! ```
//!
//! # Feature matrix
//!
//! | Feature | PostgreSQL | MySQL | SQLite | SQL Server |
//! |---------|-----------|-------|--------|------------|
//! | NULLS FIRST/LAST | ✓ | ❌ | 3.30+ | ❌ |
//! | ILIKE | ✓ | ❌ | ❌ | ❌ |
//! | FILTER clause | ✓ | ❌ | ❌ | ❌ |
//! | PERCENTILE_CONT | ✓ | ❌ | ❌ | ❌ |
//! | Window functions | ✓ | 8.0+ | 3.25+ | ✓ |
//!
//! Dialects without NULLS FIRST/LAST sort NULL lowest, which is what the sort
//! compiler asks for (`asc` → nulls first, `desc` → nulls last).

pub mod helpers;
mod mysql;
mod postgres;
mod sqlite;
mod tsql;

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;
pub use tsql::TSql;

use serde::{Deserialize, Serialize};

use super::expr::{cast, func, lit_str, Expr};
use super::query::Query;
use super::token::TokenStream;

/// Separator used when a dialect concatenates many looked-up values into one string.
pub const LOOKUP_SEPARATOR: &str = "___";

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Implementations handle dialect-specific syntax differences.
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// The enum value for this dialect, used to render nested fragments.
    fn kind(&self) -> Dialect;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    ///
    /// - Postgres/SQLite: `"identifier"`
    /// - MySQL: `` `identifier` ``
    /// - T-SQL: `[identifier]`
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// All dialects use single quotes with `''` for escaping.
    /// Override for Unicode prefix (T-SQL N'...') or backslash escapes (MySQL).
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    ///
    /// - Postgres: `true`/`false`
    /// - MySQL/SQLite/T-SQL: `1`/`0`
    fn format_bool(&self, b: bool) -> &'static str;

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET or equivalent pagination clause.
    ///
    /// - Postgres/MySQL/SQLite: `LIMIT n OFFSET m` (default)
    /// - T-SQL: `OFFSET m ROWS FETCH NEXT n ROWS ONLY` (override)
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    /// Whether this dialect requires ORDER BY for OFFSET/LIMIT.
    ///
    /// T-SQL requires ORDER BY when using OFFSET FETCH.
    fn requires_order_by_for_offset(&self) -> bool {
        false
    }

    // =========================================================================
    // Operators
    // =========================================================================

    /// String concatenation operator.
    ///
    /// - Postgres/SQLite: `||`
    /// - T-SQL: `+`
    /// - MySQL: `CONCAT()` (|| is OR by default)
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether this dialect supports the concat operator at all.
    ///
    /// MySQL uses `||` as logical OR by default.
    fn supports_concat_operator(&self) -> bool {
        true
    }

    /// Whether this dialect has a case-insensitive `ILIKE`.
    fn supports_ilike(&self) -> bool {
        false
    }

    // =========================================================================
    // NULLS Ordering
    // =========================================================================

    /// Whether this dialect supports NULLS FIRST/LAST in ORDER BY.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Whether this dialect supports `COUNT(*) FILTER (WHERE ...)`.
    fn supports_aggregate_filter(&self) -> bool {
        false
    }

    /// Population standard deviation function, if the dialect has one.
    ///
    /// `None` means the compiler derives it from `AVG(x * x) - AVG(x) * AVG(x)`.
    fn stddev_function(&self) -> Option<&'static str> {
        None
    }

    /// Median of `expr` over the rows selected by `source`.
    ///
    /// `None` means the dialect has no supported form.
    fn median(&self, expr: Expr, source: &Query) -> Option<Expr> {
        Some(helpers::median_by_row_number(
            self.kind(),
            expr,
            source,
            helpers::half_truncating,
        ))
    }

    /// Whole days between two date expressions.
    fn date_range_days(&self, max: Expr, min: Expr) -> Expr;

    /// Whole calendar months between two date expressions.
    fn month_range(&self, max: Expr, min: Expr) -> Expr;

    /// Sum of the `size` keys of a JSON attachment array, per row.
    ///
    /// The result is summed again by the caller. `None` means unsupported.
    fn attachment_size(&self, expr: Expr) -> Option<Expr> {
        let _ = expr;
        None
    }

    /// Aggregate many looked-up values into one sortable string.
    fn string_agg(&self, expr: Expr) -> Expr {
        func("GROUP_CONCAT", vec![expr, lit_str(LOOKUP_SEPARATOR)])
    }

    // =========================================================================
    // Casts and Extraction
    // =========================================================================

    /// Cast any expression to the dialect's text type.
    fn cast_to_text(&self, expr: Expr) -> Expr {
        cast(expr, "TEXT")
    }

    /// Normalise a select-type value before ordering.
    fn text_sort_key(&self, expr: Expr) -> Expr {
        expr
    }

    /// Make string equality case-sensitive where the default collation is not.
    fn case_sensitive(&self, expr: Expr) -> Expr {
        expr
    }

    /// Truncate a timestamp expression to its date part.
    fn date_only(&self, expr: Expr) -> Expr {
        func("DATE", vec![expr])
    }

    /// Extract `key` from a JSON object stored in `expr`, as text.
    fn json_extract(&self, expr: Expr, key: &str) -> Expr {
        func("JSON_EXTRACT", vec![expr, lit_str(&format!("$.{key}"))])
    }

    // =========================================================================
    // Function Remapping
    // =========================================================================

    /// Remap a function name for this dialect.
    ///
    /// Returns `Some(new_name)` if the function should be remapped, `None` to keep original.
    /// The input is matched case-insensitively.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
    #[serde(alias = "mssql")]
    TSql,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
            Dialect::TSql => &TSql,
        }
    }

    pub fn all() -> [Dialect; 4] {
        [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite, Dialect::TSql]
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mysql2" => Ok(Dialect::MySql),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "tsql" | "mssql" => Ok(Dialect::TSql),
            other => Err(format!("unknown dialect '{other}'")),
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn kind(&self) -> Dialect {
        *self
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn requires_order_by_for_offset(&self) -> bool {
        self.dialect().requires_order_by_for_offset()
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.dialect().supports_concat_operator()
    }

    fn supports_ilike(&self) -> bool {
        self.dialect().supports_ilike()
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }

    fn supports_aggregate_filter(&self) -> bool {
        self.dialect().supports_aggregate_filter()
    }

    fn stddev_function(&self) -> Option<&'static str> {
        self.dialect().stddev_function()
    }

    fn median(&self, expr: Expr, source: &Query) -> Option<Expr> {
        self.dialect().median(expr, source)
    }

    fn date_range_days(&self, max: Expr, min: Expr) -> Expr {
        self.dialect().date_range_days(max, min)
    }

    fn month_range(&self, max: Expr, min: Expr) -> Expr {
        self.dialect().month_range(max, min)
    }

    fn attachment_size(&self, expr: Expr) -> Option<Expr> {
        self.dialect().attachment_size(expr)
    }

    fn string_agg(&self, expr: Expr) -> Expr {
        self.dialect().string_agg(expr)
    }

    fn cast_to_text(&self, expr: Expr) -> Expr {
        self.dialect().cast_to_text(expr)
    }

    fn text_sort_key(&self, expr: Expr) -> Expr {
        self.dialect().text_sort_key(expr)
    }

    fn case_sensitive(&self, expr: Expr) -> Expr {
        self.dialect().case_sensitive(expr)
    }

    fn date_only(&self, expr: Expr) -> Expr {
        self.dialect().date_only(expr)
    }

    fn json_extract(&self, expr: Expr, key: &str) -> Expr {
        self.dialect().json_extract(expr, key)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

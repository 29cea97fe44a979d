//! SQL generation module.
//!
//! This module provides a type-safe SQL builder that generates multi-dialect SQL.
//! It includes:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations and the engine hooks the compilers call

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, SqlDialect, LOOKUP_SEPARATOR};
pub use expr::{
    always_false, avg, case_when, cast, coalesce, col, count, count_distinct,
    count_star, func, lit_bool, lit_float, lit_int, lit_null, lit_str, max, min, raw_sql, star,
    sum, table_col, BinaryOperator, Expr, ExprExt, Literal, UnaryOperator,
};
pub use query::{Join, JoinType, LimitOffset, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};

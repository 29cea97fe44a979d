//! Query builder - construct SQL queries with a fluent API.

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};

// =============================================================================
// Select Expression (column with optional alias)
// =============================================================================

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// Table Reference
// =============================================================================

/// A table reference: a named table (optionally schema-qualified) or a
/// derived table, with an optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
    pub alias: Option<String>,
    /// Set for `(SELECT ...) AS alias`; `table` is unused then.
    pub derived: Option<Box<Query>>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            schema: None,
            table: table.into(),
            alias: None,
            derived: None,
        }
    }

    /// `(SELECT ...) AS alias`
    pub fn derived(query: Query, alias: &str) -> Self {
        Self {
            schema: None,
            table: String::new(),
            alias: Some(alias.into()),
            derived: Some(Box::new(query)),
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match &self.derived {
            Some(query) => {
                ts.lparen();
                ts.append(&query.to_inline_tokens(dialect));
                ts.rparen();
            }
            None => {
                ts.push(Token::QualifiedIdent {
                    schema: self.schema.clone(),
                    name: self.table.clone(),
                });
            }
        }
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Expr,
}

impl Join {
    pub fn inner(table: TableRef, on: Expr) -> Self {
        Self {
            join_type: JoinType::Inner,
            table,
            on,
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
        };

        ts.space().push(Token::Join).space();
        ts.append(&self.table.to_tokens_for_dialect(dialect));
        ts.space().push(Token::On).space();
        ts.append(&self.on.to_tokens_for_dialect(dialect));

        ts
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// An ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
    pub nulls: Option<NullsOrder>,
}

impl OrderByExpr {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            dir: None,
            nulls: None,
        }
    }

    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Asc),
            nulls: None,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Desc),
            nulls: None,
        }
    }

    /// Direction plus the matching null placement: `asc` puts NULLs first,
    /// `desc` puts them last.
    pub fn directed(expr: Expr, dir: SortDir) -> Self {
        match dir {
            SortDir::Asc => Self::asc(expr).nulls_first(),
            SortDir::Desc => Self::desc(expr).nulls_last(),
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Convert to tokens for a specific dialect.
    ///
    /// Skips NULLS FIRST/LAST for dialects that don't support it; those
    /// dialects sort NULL lowest, which matches [`OrderByExpr::directed`].
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);

        if let Some(dir) = &self.dir {
            ts.space().push(match dir {
                SortDir::Asc => Token::Asc,
                SortDir::Desc => Token::Desc,
            });
        }

        if let Some(nulls) = &self.nulls {
            if dialect.supports_nulls_ordering() {
                ts.space().push(match nulls {
                    NullsOrder::First => Token::NullsFirst,
                    NullsOrder::Last => Token::NullsLast,
                });
            }
        }

        ts
    }
}

// =============================================================================
// LIMIT / OFFSET
// =============================================================================

/// LIMIT and OFFSET clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitOffset {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl LimitOffset {
    /// Convert to token stream using dialect-specific pagination.
    ///
    /// Delegates to `SqlDialect::emit_limit_offset()` for the actual formatting.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_limit_offset(self.limit, self.offset)
    }
}

// =============================================================================
// Query
// =============================================================================

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql()"]
pub struct Query {
    pub select: Vec<SelectExpr>,
    pub from: Option<TableRef>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit_offset: Option<LimitOffset>,
}

/// Layout used when rendering a query.
#[derive(Clone, Copy)]
enum Layout {
    /// One clause per line, select items indented.
    Pretty,
    /// Single line, for subqueries embedded in expressions.
    Inline,
}

impl Query {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SELECT list.
    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Set the FROM table.
    pub fn from(mut self, table: TableRef) -> Self {
        self.from = Some(table);
        self
    }

    /// Add a JOIN.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Set the ORDER BY clause.
    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_offset.get_or_insert_with(LimitOffset::default).limit = Some(limit);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, offset: u64) -> Self {
        self.limit_offset.get_or_insert_with(LimitOffset::default).offset = Some(offset);
        self
    }

    /// Convert to token stream for a specific dialect, one clause per line.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        self.render(dialect, Layout::Pretty)
    }

    /// Convert to a single-line token stream, for use inside parentheses.
    pub fn to_inline_tokens(&self, dialect: Dialect) -> TokenStream {
        self.render(dialect, Layout::Inline)
    }

    fn render(&self, dialect: Dialect, layout: Layout) -> TokenStream {
        let mut ts = TokenStream::new();
        let clause_break = |ts: &mut TokenStream| {
            match layout {
                Layout::Pretty => ts.newline(),
                Layout::Inline => ts.space(),
            };
        };

        // SELECT
        ts.push(Token::Select);

        // Columns
        for (i, select_expr) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma();
            }
            match layout {
                Layout::Pretty => {
                    ts.newline().indent(1);
                }
                Layout::Inline => {
                    ts.space();
                }
            }
            ts.append(&select_expr.to_tokens_for_dialect(dialect));
        }

        // FROM
        if let Some(from) = &self.from {
            clause_break(&mut ts);
            ts.push(Token::From).space();
            ts.append(&from.to_tokens_for_dialect(dialect));
        }

        // JOINs
        for join in &self.joins {
            clause_break(&mut ts);
            ts.append(&join.to_tokens_for_dialect(dialect));
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            clause_break(&mut ts);
            ts.push(Token::Where).space();
            ts.append(&where_clause.to_tokens_for_dialect(dialect));
        }

        // ORDER BY
        // T-SQL requires ORDER BY for OFFSET FETCH syntax.
        let needs_order_by_placeholder = dialect.requires_order_by_for_offset()
            && self.order_by.is_empty()
            && self.limit_offset.is_some();

        if !self.order_by.is_empty() {
            clause_break(&mut ts);
            ts.push(Token::OrderBy).space();
            for (i, order_expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order_expr.to_tokens_for_dialect(dialect));
            }
        } else if needs_order_by_placeholder {
            // Placeholder keeps OFFSET FETCH valid; row order is then unspecified.
            clause_break(&mut ts);
            ts.push(Token::OrderBy)
                .space()
                .lparen()
                .push(Token::Select)
                .space()
                .push(Token::Null)
                .rparen();
        }

        // LIMIT / OFFSET
        if let Some(lo) = &self.limit_offset {
            clause_break(&mut ts);
            ts.append(&lo.to_tokens(dialect));
        }

        ts
    }

    /// Generate SQL string for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

impl std::fmt::Display for Query {
    /// Formats the query using the default dialect (Postgres).
    ///
    /// For dialect-specific SQL, use [`Query::to_sql`] instead.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{col, table_col};
    use crate::sql::test_utils::validate_sql;
    use insta::assert_snapshot;

    fn orders() -> TableRef {
        TableRef::new("orders").with_alias("__nc0")
    }

    #[test]
    fn test_simple_select() {
        let q = Query::new()
            .select(vec![table_col("__nc0", "id"), table_col("__nc0", "title")])
            .from(orders());

        assert_snapshot!(q.to_sql(Dialect::Postgres), @r#"
        SELECT
          "__nc0"."id",
          "__nc0"."title"
        FROM "orders" AS "__nc0"
        "#);
    }

    #[test]
    fn test_filter_ands_conditions() {
        let q = Query::new()
            .select(vec![col("id")])
            .from(TableRef::new("orders"))
            .filter(col("amount").gt(100))
            .filter(col("status").eq("open"));

        let sql = q.to_sql(Dialect::Sqlite);
        assert!(sql.contains("WHERE \"amount\" > 100 AND \"status\" = 'open'"));
        validate_sql(&sql, Dialect::Sqlite).unwrap();
    }

    #[test]
    fn test_order_by_nulls_skipped_for_mysql() {
        let q = Query::new()
            .select(vec![col("id")])
            .from(TableRef::new("orders"))
            .order_by(vec![OrderByExpr::directed(col("amount"), SortDir::Desc)]);

        assert!(q.to_sql(Dialect::Postgres).contains("\"amount\" DESC NULLS LAST"));
        let mysql = q.to_sql(Dialect::MySql);
        assert!(mysql.contains("`amount` DESC"));
        assert!(!mysql.contains("NULLS"));
    }

    #[test]
    fn test_tsql_pagination_placeholder() {
        let q = Query::new()
            .select(vec![col("id")])
            .from(TableRef::new("orders"))
            .limit(25)
            .offset(50);

        let sql = q.to_sql(Dialect::TSql);
        assert!(sql.contains("ORDER BY (SELECT NULL)"));
        assert!(sql.ends_with("OFFSET 50 ROWS FETCH NEXT 25 ROWS ONLY"));
        validate_sql(&sql, Dialect::TSql).unwrap();
    }

    #[test]
    fn test_limit_offset_standard() {
        let q = Query::new()
            .select(vec![col("id")])
            .from(TableRef::new("orders"))
            .offset(10)
            .limit(5);
        assert!(q.to_sql(Dialect::MySql).ends_with("LIMIT 5 OFFSET 10"));
    }

    #[test]
    fn test_inner_join() {
        let q = Query::new()
            .select(vec![table_col("c", "name")])
            .from(TableRef::new("orders").with_alias("o"))
            .join(Join::inner(
                TableRef::new("customers").with_alias("c"),
                table_col("c", "id").eq(table_col("o", "customer_id")),
            ));

        let sql = q.to_sql(Dialect::Postgres);
        assert!(sql.contains("\nINNER JOIN \"customers\" AS \"c\" ON \"c\".\"id\" = \"o\".\"customer_id\""));
        validate_sql(&sql, Dialect::Postgres).unwrap();
    }

    #[test]
    fn test_derived_table() {
        let inner = Query::new().select(vec![col("id")]).from(TableRef::new("orders"));
        let q = Query::new()
            .select(vec![table_col("t", "id")])
            .from(TableRef::derived(inner, "t"));
        let sql = q.to_sql(Dialect::Sqlite);
        assert!(sql.contains("FROM (SELECT \"id\" FROM \"orders\") AS \"t\""));
        validate_sql(&sql, Dialect::Sqlite).unwrap();
    }
}

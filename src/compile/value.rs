//! The SQL value of any column, physical or computed.

use crate::error::{QueryError, QueryResult};
use crate::meta::{Column, Model, UiType};
use crate::sql::Expr;

use super::context::CompileContext;
use super::{field, lookup, rollup};

/// Expression producing `column`'s value for the row bound to `alias`.
///
/// Physical columns are plain references. Formula columns go through the
/// context's formula compiler; rollups, link counts and lookups become
/// correlated subselects.
pub fn column_value<'a>(
    column: &'a Column,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Expr> {
    match column.uidt {
        UiType::Formula | UiType::Button => {
            let Some(node) = column.formula() else {
                return Err(match column.uidt {
                    UiType::Button => QueryError::NotImplemented(format!(
                        "button column '{}' has no URL formula",
                        column.id
                    )),
                    _ => QueryError::formula(&column.id, "formula column without a formula"),
                });
            };
            let compiler = ctx.formula;
            compiler
                .compile(node, model, alias, ctx)
                .map_err(|err| match err {
                    QueryError::FormulaCompile { message, .. } => {
                        QueryError::formula(&column.id, message)
                    }
                    other => other,
                })
        }
        UiType::Rollup => rollup::rollup_value(column, model, alias, ctx),
        UiType::Links => rollup::links_count(column, model, alias, ctx),
        UiType::Lookup | UiType::LinkToAnotherRecord => {
            lookup::lookup_value(column, model, alias, ctx)
        }
        UiType::QrCode | UiType::Barcode => Err(QueryError::NotImplemented(format!(
            "{} column '{}' has no SQL value",
            column.uidt, column.id
        ))),
        _ => Ok(field(alias, column)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::testing::{orders, shop};
    use crate::sql::Dialect;

    fn value_sql(column_id: &str, dialect: Dialect) -> QueryResult<String> {
        let catalog = shop();
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog).with_dialect(dialect);
        let base = ctx.next_alias();
        let column = model.column(column_id).unwrap();
        column_value(column, model, &base, &mut ctx).map(|e| e.to_sql(dialect))
    }

    #[test]
    fn test_physical_column() {
        assert_eq!(value_sql("or_amount", Dialect::Postgres).unwrap(), "\"__nc0\".\"amount\"");
    }

    #[test]
    fn test_formula_column() {
        assert_eq!(
            value_sql("or_double", Dialect::Postgres).unwrap(),
            "\"__nc0\".\"amount\" * 2"
        );
    }

    #[test]
    fn test_rollup_is_correlated_aggregate() {
        insta::assert_snapshot!(
            value_sql("or_items_total", Dialect::Postgres).unwrap(),
            @r#"(SELECT SUM("__nc1"."amount") FROM "order_items" AS "__nc1" WHERE "__nc1"."order_id" = "__nc0"."id")"#
        );
    }

    #[test]
    fn test_links_count() {
        insta::assert_snapshot!(
            value_sql("or_item_count", Dialect::Sqlite).unwrap(),
            @r#"(SELECT COUNT(*) FROM "order_items" AS "__nc1" WHERE "__nc1"."order_id" = "__nc0"."id")"#
        );
    }

    #[test]
    fn test_belongs_to_lookup_is_scalar() {
        insta::assert_snapshot!(
            value_sql("or_country", Dialect::Postgres).unwrap(),
            @r#"(SELECT "__nc1"."country" FROM "customers" AS "__nc1" WHERE "__nc1"."id" = "__nc0"."customer_id")"#
        );
    }

    #[test]
    fn test_has_many_lookup_aggregates() {
        let sql = value_sql("or_item_names", Dialect::Sqlite).unwrap();
        assert!(sql.starts_with("(SELECT GROUP_CONCAT(\"__nc1\".\"name\", '___') FROM"));
        let sql = value_sql("or_tag_names", Dialect::Postgres).unwrap();
        assert!(sql.starts_with("(SELECT CAST(JSON_AGG(\"__nc1\".\"name\") AS TEXT) FROM \"order_tags\""));
    }

    #[test]
    fn test_nested_lookup_value() {
        let sql = value_sql("or_region", Dialect::Sqlite).unwrap();
        assert!(sql.contains("INNER JOIN \"regions\" AS \"__nc2\""));
        assert!(sql.starts_with("(SELECT \"__nc2\".\"name\""));
    }
}

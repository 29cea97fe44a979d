//! Sort lists to ORDER BY terms.

use crate::error::{QueryError, QueryResult};
use crate::meta::{Column, Model, Sort, UiType};
use crate::sql::{raw_sql, Expr, OrderByExpr, SqlDialect};

use super::context::CompileContext;
use super::{field, lookup, rollup, user, value};

/// Compile sorts in precedence order. Unresolvable entries are skipped in
/// lenient mode.
pub fn compile_sorts<'a>(
    sorts: &[Sort],
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Vec<OrderByExpr>> {
    let mut order_by = Vec::with_capacity(sorts.len());
    for sort in sorts {
        let compiled = compile_sort(sort, model, alias, ctx);
        if let Some(term) = ctx.recover(compiled, &sort.fk_column_id)? {
            order_by.push(term);
        }
    }
    ctx.log_aliases("sorts");
    Ok(order_by)
}

pub fn compile_sort<'a>(
    sort: &Sort,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<OrderByExpr> {
    let column = model
        .column(&sort.fk_column_id)
        .ok_or_else(|| QueryError::field_not_found(&sort.fk_column_id))?;
    let key = sort_key(column, model, alias, ctx)?;
    Ok(OrderByExpr::directed(key, sort.direction.into()))
}

fn sort_key<'a>(
    column: &'a Column,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Expr> {
    let key = match column.uidt {
        UiType::Rollup => rollup::rollup_value(column, model, alias, ctx)?,
        UiType::Links => rollup::links_count(column, model, alias, ctx)?,
        UiType::Formula | UiType::Button => match column.formula() {
            // Constant formulas give every row the same key.
            Some(node) if node.is_constant() => raw_sql("(SELECT NULL)"),
            _ => value::column_value(column, model, alias, ctx)?,
        },
        UiType::Lookup | UiType::LinkToAnotherRecord => {
            lookup::lookup_value(column, model, alias, ctx)?
        }
        UiType::SingleSelect | UiType::MultiSelect => {
            ctx.dialect.text_sort_key(field(alias, column))
        }
        uidt if uidt.is_user() => user::display_names(field(alias, column), ctx.users),
        _ if column.is_ai_prompt() => ctx.dialect.json_extract(field(alias, column), "value"),
        _ => field(alias, column),
    };
    Ok(key)
}

use crate::error::QueryResult;
use crate::meta::{Column, Model};
use crate::sql::{Expr, SqlDialect};

use super::context::CompileContext;
use super::relation::resolve_join;
use super::value::column_value;

/// The looked-up value of a Lookup or link column.
pub(crate) fn lookup_value<'a>(
    column: &'a Column,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Expr> {
    lookup_projection(column, model, alias, ctx).map(|(expr, _)| expr)
}

/// Like [`lookup_value`], also telling whether the value is a single row's.
///
/// A pure belongs-to chain yields at most one row and is selected directly;
/// anything crossing a has-many or many-to-many hop is folded with the
/// dialect's string aggregate.
pub(crate) fn lookup_projection<'a>(
    column: &'a Column,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<(Expr, bool)> {
    let plan = resolve_join(column, model, alias, ctx)?;
    let far = plan.model;
    let target = plan.target;
    let joined = plan.joined_alias.clone();
    let inner = ctx.nested(&column.id, |ctx| column_value(target, far, &joined, ctx))?;

    if plan.belongs_to_only {
        Ok((plan.correlated(inner), true))
    } else {
        Ok((plan.correlated(ctx.dialect.string_agg(inner)), false))
    }
}

use crate::error::{QueryError, QueryResult};
use crate::meta::{Column, Model, RollupFunction};
use crate::sql::{avg, count, count_distinct, count_star, max, min, sum, Expr};

use super::context::CompileContext;
use super::relation::resolve_join;
use super::value::column_value;

fn distinct(name: &str, expr: Expr) -> Expr {
    Expr::Function {
        name: name.into(),
        args: vec![expr],
        distinct: true,
    }
}

fn aggregate(function: RollupFunction, value: Expr) -> Expr {
    match function {
        RollupFunction::Count => count(value),
        RollupFunction::Min => min(value),
        RollupFunction::Max => max(value),
        RollupFunction::Avg => avg(value),
        RollupFunction::Sum => sum(value),
        RollupFunction::CountDistinct => count_distinct(value),
        RollupFunction::SumDistinct => distinct("SUM", value),
        RollupFunction::AvgDistinct => distinct("AVG", value),
    }
}

/// `(SELECT f(target) FROM related ... WHERE key = outer_key)`
pub(crate) fn rollup_value<'a>(
    column: &'a Column,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Expr> {
    let options = column
        .rollup()
        .ok_or_else(|| QueryError::unresolvable(&column.id, "rollup column without options"))?;
    let relation = model
        .column(&options.fk_relation_column_id)
        .ok_or_else(|| QueryError::field_not_found(&options.fk_relation_column_id))?;
    let plan = resolve_join(relation, model, alias, ctx)?;
    let target = plan
        .model
        .column(&options.fk_rollup_column_id)
        .ok_or_else(|| QueryError::field_not_found(&options.fk_rollup_column_id))?;

    let far = plan.model;
    let joined = plan.joined_alias.clone();
    let value = ctx.nested(&column.id, |ctx| column_value(target, far, &joined, ctx))?;
    Ok(plan.correlated(aggregate(options.rollup_function, value)))
}

/// Number of linked rows.
pub(crate) fn links_count<'a>(
    column: &'a Column,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Expr> {
    let plan = resolve_join(column, model, alias, ctx)?;
    Ok(plan.correlated(count_star()))
}

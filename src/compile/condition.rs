//! Filter trees to WHERE predicates.

use crate::error::{QueryError, QueryResult};
use crate::meta::{Filter, LogicalOp, Model};
use crate::sql::{Expr, ExprExt};

use super::context::CompileContext;
use super::leaf::compile_leaf;

/// Result of compiling a filter: a predicate, or nothing to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The filter constrains nothing (empty group, skipped leaf).
    Noop,
    Sql(Expr),
}

impl Predicate {
    pub fn into_expr(self) -> Option<Expr> {
        match self {
            Predicate::Noop => None,
            Predicate::Sql(expr) => Some(expr),
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Predicate::Noop)
    }
}

/// Compile a list of sibling filters, combined as an implicit AND group.
pub fn compile_filters<'a>(
    filters: &[Filter],
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Predicate> {
    let predicate = combine(filters, LogicalOp::And, model, alias, ctx)?;
    ctx.log_aliases("filters");
    Ok(predicate)
}

/// Compile one filter node (leaf or group).
pub fn compile_filter<'a>(
    filter: &Filter,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Predicate> {
    if filter.is_group {
        let group_op = filter.logical_op.unwrap_or(LogicalOp::And);
        return combine(&filter.children, group_op, model, alias, ctx);
    }

    let (Some(column_id), Some(op)) = (filter.fk_column_id.as_deref(), filter.comparison_op)
    else {
        return Ok(Predicate::Noop);
    };

    let compiled = match model.column(column_id) {
        Some(column) => compile_leaf(filter, op, column, model, alias, ctx),
        None => Err(QueryError::field_not_found(column_id)),
    };
    Ok(ctx
        .recover(compiled, column_id)?
        .unwrap_or(Predicate::Noop))
}

/// Combine children the way a flat `a OR b AND c` chain evaluates: runs of
/// AND/NOT terms bind first and the runs are OR-ed. A child's own operator
/// applies even to the first child; missing operators take the group's,
/// except that a NOT group's negation belongs to its parent.
fn combine<'a>(
    children: &[Filter],
    group_op: LogicalOp,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Predicate> {
    let default_op = match group_op {
        LogicalOp::Not => LogicalOp::And,
        op => op,
    };
    let mut runs: Vec<Expr> = Vec::new();
    let mut run: Option<Expr> = None;
    for child in children {
        let Predicate::Sql(expr) = compile_filter(child, model, alias, ctx)? else {
            continue;
        };
        let op = child.logical_op.unwrap_or(default_op);
        let term = match op {
            LogicalOp::Not => expr.not(),
            _ => expr,
        };
        run = Some(match run {
            None => term,
            Some(prev) if op == LogicalOp::Or => {
                runs.push(prev);
                term
            }
            Some(prev) => prev.and(term),
        });
    }
    runs.extend(run);
    Ok(runs
        .into_iter()
        .reduce(|a, b| a.or(b))
        .map_or(Predicate::Noop, Predicate::Sql))
}

//! Assembles list and aggregate queries from a request and its view.

use std::collections::HashSet;

use crate::compile::relation::table_ref;
use crate::compile::{
    column_value, compile_aggregation, compile_filters, compile_sorts, field, lookup_projection,
    CompileContext, Predicate,
};
use crate::config::PaginationSettings;
use crate::error::{QueryError, QueryResult};
use crate::meta::{Column, Filter, Model, Sort, UiType, View};
use crate::parse::{parse_sort, parse_where};
use crate::sql::{
    always_false, lit_int, lit_str, Expr, ExprExt, OrderByExpr, Query, SelectExpr, SortDir,
    LOOKUP_SEPARATOR,
};

use super::row::DisplayPrototype;
use super::{AggregationRequest, ListRequest};

/// Everything a plan is built from besides the model.
pub struct PlanInputs<'r> {
    pub request: &'r ListRequest,
    /// The request's view, already loaded.
    pub view: Option<&'r View>,
    pub pagination: &'r PaginationSettings,
}

impl PlanInputs<'_> {
    fn view_applies(&self) -> Option<&View> {
        self.view.filter(|_| !self.request.ignore_view_filter_sort)
    }
}

#[derive(Debug, Clone)]
pub struct ListPlan {
    pub query: Query,
    pub prototype: DisplayPrototype,
}

/// Build the paginated list SELECT.
pub fn build_list_query<'a>(
    model: &'a Model,
    inputs: &PlanInputs<'_>,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<ListPlan> {
    let alias = ctx.next_alias();
    let selected = selected_fields(model, &inputs.request.fields, ctx)?;
    let (select, prototype) = projection(model, &alias, selected.as_ref(), ctx)?;

    let query = Query::new().select(select).from(table_ref(model, &alias));
    let mut query = apply_filters(query, model, &alias, inputs, ctx)?;

    let order_by = ordering(model, &alias, inputs, ctx)?;
    if !order_by.is_empty() {
        query = query.order_by(order_by);
    }

    let request = inputs.request;
    if !request.ignore_pagination {
        query = query
            .limit(inputs.pagination.clamp(request.limit))
            .offset(request.offset.unwrap_or(0));
    }

    ctx.log_aliases("list");
    Ok(ListPlan { query, prototype })
}

/// Build the single-row aggregate SELECT under the list's filters.
///
/// Returns `None` when every requested aggregation is `None`.
pub fn build_aggregate_query<'a>(
    model: &'a Model,
    inputs: &PlanInputs<'_>,
    aggregations: &[AggregationRequest],
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Option<Query>> {
    let alias = ctx.next_alias();
    let source = Query::new().from(table_ref(model, &alias));
    let source = apply_filters(source, model, &alias, inputs, ctx)?;

    let mut select = Vec::new();
    for request in aggregations {
        let column = model
            .column(&request.column_id)
            .ok_or_else(|| QueryError::field_not_found(&request.column_id))?;
        let item = compile_aggregation(request.aggregation, column, model, &alias, &source, ctx)?;
        if let Some(item) = item {
            select.push(item);
        }
    }

    ctx.log_aliases("aggregate");
    if select.is_empty() {
        return Ok(None);
    }
    Ok(Some(source.select(select)))
}

// =============================================================================
// Projection
// =============================================================================

/// Column ids named by `fields`, or `None` to project every column.
/// Primary keys are always kept.
fn selected_fields(
    model: &Model,
    fields: &[String],
    ctx: &CompileContext<'_>,
) -> QueryResult<Option<HashSet<String>>> {
    if fields.is_empty() {
        return Ok(None);
    }
    let mut selected: HashSet<String> = model.primary_keys().iter().map(|c| c.id.clone()).collect();
    for name in fields {
        let column = model
            .column_by_alias(name)
            .ok_or_else(|| QueryError::field_not_found(name));
        if let Some(column) = ctx.recover(column, name)? {
            selected.insert(column.id.clone());
        }
    }
    Ok(Some(selected))
}

fn projection<'a>(
    model: &'a Model,
    alias: &str,
    selected: Option<&HashSet<String>>,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<(Vec<SelectExpr>, DisplayPrototype)> {
    let mut select = Vec::with_capacity(model.columns.len());
    let mut prototype = DisplayPrototype::new(&model.id);

    let wanted = model
        .columns
        .iter()
        .filter(|c| selected.map_or(true, |ids| ids.contains(&c.id)));
    for column in wanted {
        match column.uidt {
            UiType::Formula | UiType::Rollup | UiType::Links => {
                let value = column_value(column, model, alias, ctx);
                if let Some(expr) = ctx.recover(value, &column.id)? {
                    select.push(expr.alias(&column.title));
                    prototype.computed.push(column.title.clone());
                }
            }
            UiType::Lookup => {
                let value = lookup_projection(column, model, alias, ctx);
                if let Some((expr, single)) = ctx.recover(value, &column.id)? {
                    select.push(expr.alias(&column.title));
                    prototype.computed.push(column.title.clone());
                    if !single {
                        prototype.aggregated.push(column.title.clone());
                    }
                }
            }
            // links, buttons and codes have no scalar value of their own
            uidt if uidt.is_virtual() => {}
            _ => select.push(field(alias, column).alias(&column.title)),
        }
    }
    Ok((select, prototype))
}

// =============================================================================
// Filters
// =============================================================================

fn apply_filters<'a>(
    mut query: Query,
    model: &'a Model,
    alias: &str,
    inputs: &PlanInputs<'_>,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Query> {
    let request = inputs.request;

    let mut groups: Vec<Vec<Filter>> = Vec::with_capacity(4);
    if let Some(view) = inputs.view_applies() {
        groups.push(view.filters.clone());
    }
    groups.push(request.custom_conditions.clone());
    groups.push(request.filters.clone());
    if let Some(where_clause) = request.where_clause.as_deref() {
        groups.push(parse_where(where_clause, model, ctx.strictness)?);
    }

    for filters in &groups {
        if let Predicate::Sql(expr) = compile_filters(filters, model, alias, ctx)? {
            query = query.filter(expr.paren());
        }
    }

    if !request.pks.is_empty() {
        query = query.filter(pk_predicate(model, alias, &request.pks)?.paren());
    }
    Ok(query)
}

/// Rows whose primary key is one of `pks`. Composite keys are joined with
/// the lookup separator, in primary-key column order.
fn pk_predicate(model: &Model, alias: &str, pks: &[String]) -> QueryResult<Expr> {
    let keys = model.primary_keys();
    match keys.as_slice() {
        [] => Err(QueryError::InvalidFilter(format!(
            "model '{}' has no primary key",
            model.id
        ))),
        [key] => Ok(field(alias, key).in_list(pks.iter().map(|pk| pk_literal(key, pk)).collect())),
        keys => {
            let mut rows = Vec::with_capacity(pks.len());
            for pk in pks {
                let parts: Vec<&str> = pk.split(LOOKUP_SEPARATOR).collect();
                if parts.len() != keys.len() {
                    return Err(QueryError::InvalidFilter(format!(
                        "primary key '{pk}' has {} parts, expected {}",
                        parts.len(),
                        keys.len()
                    )));
                }
                let row = keys
                    .iter()
                    .zip(parts)
                    .map(|(key, part)| field(alias, key).eq(pk_literal(key, part)))
                    .reduce(|a, b| a.and(b));
                rows.extend(row.map(|r| r.paren()));
            }
            Ok(rows.into_iter().reduce(|a, b| a.or(b)).unwrap_or_else(always_false))
        }
    }
}

fn pk_literal(key: &Column, value: &str) -> Expr {
    match value.parse::<i64>() {
        Ok(n) if key.uidt.is_numeric() => lit_int(n),
        _ => lit_str(value),
    }
}

// =============================================================================
// Ordering
// =============================================================================

fn ordering<'a>(
    model: &'a Model,
    alias: &str,
    inputs: &PlanInputs<'_>,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Vec<OrderByExpr>> {
    let request = inputs.request;

    let sorts: Vec<Sort> = match request.sort.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(sort) => parse_sort(sort, model, ctx.strictness)?,
        None if !request.sorts.is_empty() => request.sorts.clone(),
        None => inputs
            .view_applies()
            .map(|view| view.sorts.clone())
            .unwrap_or_default(),
    };

    let mut order_by = compile_sorts(&sorts, model, alias, ctx)?;
    let sorted: HashSet<&str> = sorts.iter().map(|s| s.fk_column_id.as_str()).collect();

    if !request.skip_order_column {
        if let Some(order) = model.order_column().filter(|c| !sorted.contains(c.id.as_str())) {
            order_by.push(OrderByExpr::directed(field(alias, order), SortDir::Asc));
        }
    }

    let tiebreaker = model
        .auto_increment_pk()
        .or_else(|| model.created_time_column())
        .filter(|c| !sorted.contains(c.id.as_str()));
    if let Some(column) = tiebreaker {
        order_by.push(OrderByExpr::directed(field(alias, column), SortDir::Asc));
    }
    Ok(order_by)
}

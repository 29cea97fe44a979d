//! Join planning for links and lookups.
//!
//! A [`JoinPlan`] never joins into the outer query. It renders as a subquery
//! correlated on one key pair, so following a has-many or many-to-many link
//! cannot multiply the outer rows.

use crate::error::{QueryError, QueryResult};
use crate::meta::{Column, Model, RelationOptions, RelationType, UiType};
use crate::sql::{Expr, ExprExt, Join, Query, SelectExpr, TableRef};

use super::context::CompileContext;
use super::field;

/// The join topology behind a link or lookup column.
#[derive(Debug, Clone)]
pub struct JoinPlan<'a> {
    /// First table joined from the current alias.
    pub first: TableRef,
    /// Key on the current alias.
    pub outer_key: Expr,
    /// Matching key on `first`.
    pub inner_key: Expr,
    /// Further hops, in order.
    pub joins: Vec<Join>,
    /// Alias of the far-side model.
    pub joined_alias: String,
    /// The far-side model.
    pub model: &'a Model,
    /// The lookup target, or the display column of the related model for a
    /// plain link.
    pub target: &'a Column,
    /// Every hop is belongs-to, so at most one far-side row matches.
    pub belongs_to_only: bool,
}

impl<'a> JoinPlan<'a> {
    /// `SELECT <select> FROM first JOIN ...` without any predicate.
    pub fn base_query(&self, select: Vec<SelectExpr>) -> Query {
        let mut query = Query::new().select(select).from(self.first.clone());
        for join in &self.joins {
            query = query.join(join.clone());
        }
        query
    }

    /// `outer IN (SELECT inner FROM ... WHERE predicate AND inner IS NOT NULL)`.
    ///
    /// The negated form also keeps rows whose outer key is NULL, since they
    /// are linked to nothing.
    pub fn in_subquery(&self, predicate: Option<Expr>, negated: bool) -> Expr {
        let mut query = self.base_query(vec![SelectExpr::new(self.inner_key.clone())]);
        if let Some(predicate) = predicate {
            query = query.filter(predicate);
        }
        query = query.filter(self.inner_key.clone().is_not_null());

        if negated {
            self.outer_key
                .clone()
                .is_null()
                .or(self.outer_key.clone().not_in_subquery(query))
                .paren()
        } else {
            self.outer_key.clone().in_subquery(query)
        }
    }

    /// `(SELECT expr FROM ... WHERE inner = outer)`.
    pub fn correlated(&self, expr: Expr) -> Expr {
        Expr::Subquery(Box::new(self.correlated_query(expr)))
    }

    pub fn correlated_query(&self, expr: Expr) -> Query {
        self.base_query(vec![SelectExpr::new(expr)])
            .filter(self.inner_key.clone().eq(self.outer_key.clone()))
    }
}

pub(crate) fn table_ref(model: &Model, alias: &str) -> TableRef {
    let table = TableRef::new(&model.table_name).with_alias(alias);
    match &model.schema {
        Some(schema) => table.with_schema(schema),
        None => table,
    }
}

/// Accumulates hops; the first becomes the subquery's FROM.
struct Hops {
    first: Option<(TableRef, Expr, Expr)>,
    joins: Vec<Join>,
}

impl Hops {
    fn push(&mut self, table: TableRef, inner: Expr, outer: Expr) {
        if self.first.is_none() {
            self.first = Some((table, outer, inner));
        } else {
            self.joins.push(Join::inner(table, inner.eq(outer)));
        }
    }
}

/// Look up a column a relation names, in the model it must live in.
fn relation_column<'a>(model: &'a Model, id: &str, relation: &Column) -> QueryResult<&'a Column> {
    model.column(id).ok_or_else(|| {
        QueryError::unresolvable(
            &relation.id,
            format!("column '{id}' not found in model '{}'", model.id),
        )
    })
}

/// Resolve a LinkToAnotherRecord, Links or Lookup column of `model` into a
/// join plan starting at `current_alias`.
///
/// Lookup chains are followed hop by hop until the target is a plain or
/// computed column; each hop allocates fresh aliases from `ctx`.
pub fn resolve_join<'a>(
    column: &'a Column,
    model: &'a Model,
    current_alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<JoinPlan<'a>> {
    let catalog = ctx.catalog;
    let mut hops = Hops {
        first: None,
        joins: Vec::new(),
    };
    let mut belongs_to_only = true;
    let mut current = column;
    let mut current_model = model;
    let mut alias = current_alias.to_string();
    let mut depth = 0;

    loop {
        depth += 1;
        if depth > ctx.max_depth {
            return Err(QueryError::DepthExceeded {
                column: column.id.clone(),
                max_depth: ctx.max_depth,
            });
        }

        let (relation_col, lookup_target) = match current.uidt {
            UiType::Lookup => {
                let lookup = current.lookup().ok_or_else(|| {
                    QueryError::unresolvable(&current.id, "lookup column without options")
                })?;
                let relation_col = current_model
                    .column(&lookup.fk_relation_column_id)
                    .ok_or_else(|| QueryError::field_not_found(&lookup.fk_relation_column_id))?;
                (relation_col, Some(lookup.fk_lookup_column_id.as_str()))
            }
            _ => (current, None),
        };
        let relation = relation_col.relation().ok_or_else(|| {
            QueryError::unresolvable(&relation_col.id, "column is not a relation")
        })?;
        let related = catalog.require_model(&relation.fk_related_model_id, relation_col)?;

        let joined = ctx.next_alias();
        add_hop(
            &mut hops,
            relation,
            relation_col,
            current_model,
            &alias,
            related,
            &joined,
            ctx,
        )?;
        if relation.relation_type != RelationType::BelongsTo {
            belongs_to_only = false;
        }
        current_model = related;
        alias = joined;

        let target = match lookup_target {
            None => related.display_column().ok_or_else(|| {
                QueryError::unresolvable(
                    &relation_col.id,
                    format!("model '{}' has no display column", related.id),
                )
            })?,
            Some(id) => related
                .column(id)
                .ok_or_else(|| QueryError::field_not_found(id))?,
        };

        if lookup_target.is_some()
            && matches!(target.uidt, UiType::Lookup | UiType::LinkToAnotherRecord)
        {
            current = target;
            continue;
        }

        let Some((first, outer_key, inner_key)) = hops.first else {
            return Err(QueryError::unresolvable(&column.id, "empty join plan"));
        };
        return Ok(JoinPlan {
            first,
            outer_key,
            inner_key,
            joins: hops.joins,
            joined_alias: alias,
            model: current_model,
            target,
            belongs_to_only,
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn add_hop(
    hops: &mut Hops,
    relation: &RelationOptions,
    relation_col: &Column,
    current_model: &Model,
    current_alias: &str,
    related: &Model,
    joined: &str,
    ctx: &mut CompileContext<'_>,
) -> QueryResult<()> {
    match relation.relation_type {
        RelationType::BelongsTo => {
            let child = relation_column(current_model, &relation.fk_child_column_id, relation_col)?;
            let parent = relation_column(related, &relation.fk_parent_column_id, relation_col)?;
            hops.push(
                table_ref(related, joined),
                field(joined, parent),
                field(current_alias, child),
            );
        }
        RelationType::HasMany => {
            let child = relation_column(related, &relation.fk_child_column_id, relation_col)?;
            let parent = relation_column(current_model, &relation.fk_parent_column_id, relation_col)?;
            hops.push(
                table_ref(related, joined),
                field(joined, child),
                field(current_alias, parent),
            );
        }
        RelationType::ManyToMany => {
            let missing = || {
                QueryError::unresolvable(&relation_col.id, "many-to-many relation without junction")
            };
            let junction_id = relation.fk_mm_model_id.as_deref().ok_or_else(missing)?;
            let catalog = ctx.catalog;
            let junction = catalog.require_model(junction_id, relation_col)?;
            let mm_child_id = relation.fk_mm_child_column_id.as_deref().ok_or_else(missing)?;
            let mm_parent_id = relation.fk_mm_parent_column_id.as_deref().ok_or_else(missing)?;
            let mm_child = relation_column(junction, mm_child_id, relation_col)?;
            let mm_parent = relation_column(junction, mm_parent_id, relation_col)?;
            let child = relation_column(current_model, &relation.fk_child_column_id, relation_col)?;
            let parent = relation_column(related, &relation.fk_parent_column_id, relation_col)?;

            let junction_alias = ctx.next_alias();
            hops.push(
                table_ref(junction, &junction_alias),
                field(&junction_alias, mm_child),
                field(current_alias, child),
            );
            hops.push(
                table_ref(related, joined),
                field(joined, parent),
                field(&junction_alias, mm_parent),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::testing::{orders, shop};
    use crate::meta::Catalog;
    use crate::sql::{lit_str, test_utils::validate_sql, Dialect};

    fn plan_sql(column_id: &str) -> (String, String, bool) {
        let catalog = shop();
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog);
        let base = ctx.next_alias();
        let column = model.column(column_id).unwrap();
        let plan = resolve_join(column, model, &base, &mut ctx).unwrap();
        let sql = plan.correlated(plan.inner_key.clone()).to_sql(Dialect::Postgres);
        (sql, plan.target.id.clone(), plan.belongs_to_only)
    }

    #[test]
    fn test_belongs_to_hop() {
        let (sql, target, bt) = plan_sql("or_customer");
        assert_eq!(
            sql,
            "(SELECT \"__nc1\".\"id\" FROM \"customers\" AS \"__nc1\" WHERE \"__nc1\".\"id\" = \"__nc0\".\"customer_id\")"
        );
        assert_eq!(target, "cu_name");
        assert!(bt);
    }

    #[test]
    fn test_has_many_hop() {
        let (sql, target, bt) = plan_sql("or_items");
        assert!(sql.contains("FROM \"order_items\" AS \"__nc1\""));
        assert!(sql.contains("WHERE \"__nc1\".\"order_id\" = \"__nc0\".\"id\""));
        assert_eq!(target, "it_name");
        assert!(!bt);
    }

    #[test]
    fn test_many_to_many_uses_junction() {
        let catalog = shop();
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog);
        let base = ctx.next_alias();
        let plan = resolve_join(model.column("or_tags").unwrap(), model, &base, &mut ctx).unwrap();
        assert_eq!(plan.joined_alias, "__nc1");
        assert_eq!(plan.first.alias.as_deref(), Some("__nc2"));
        let sql = plan.in_subquery(Some(lit_str("x").eq(lit_str("x"))), false).to_sql(Dialect::Postgres);
        insta::assert_snapshot!(sql, @r#""__nc0"."id" IN (SELECT "__nc2"."order_id" FROM "order_tags" AS "__nc2" INNER JOIN "tags" AS "__nc1" ON "__nc1"."id" = "__nc2"."tag_id" WHERE 'x' = 'x' AND "__nc2"."order_id" IS NOT NULL)"#);
    }

    #[test]
    fn test_nested_lookup_chain() {
        let catalog = shop();
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog);
        let base = ctx.next_alias();
        let plan = resolve_join(model.column("or_region").unwrap(), model, &base, &mut ctx).unwrap();
        assert_eq!(plan.target.id, "rg_name");
        assert_eq!(plan.model.id, "md_regions");
        assert_eq!(plan.joins.len(), 1);
        assert!(plan.belongs_to_only);
        let sql = plan.correlated(crate::compile::field(&plan.joined_alias, plan.target));
        validate_sql(&format!("SELECT {}", sql.to_sql(Dialect::Sqlite)), Dialect::Sqlite).unwrap();
    }

    #[test]
    fn test_negated_in_subquery_keeps_unlinked_rows() {
        let catalog = shop();
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog);
        let base = ctx.next_alias();
        let plan = resolve_join(model.column("or_customer").unwrap(), model, &base, &mut ctx).unwrap();
        let sql = plan.in_subquery(None, true).to_sql(Dialect::Sqlite);
        assert!(sql.starts_with("(\"__nc0\".\"customer_id\" IS NULL OR \"__nc0\".\"customer_id\" NOT IN (SELECT"));
    }

    #[test]
    fn test_fresh_aliases_for_repeated_joins() {
        let catalog = shop();
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog);
        let base = ctx.next_alias();
        let a = resolve_join(model.column("or_country").unwrap(), model, &base, &mut ctx).unwrap();
        let b = resolve_join(model.column("or_customer").unwrap(), model, &base, &mut ctx).unwrap();
        assert_ne!(a.joined_alias, b.joined_alias);
    }

    #[test]
    fn test_dangling_related_model() {
        let mut file = crate::compile::testing::shop_file();
        file.models.retain(|m| m.id != "md_customers");
        let catalog = Catalog::from_models(file.models);
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog);
        let err = resolve_join(model.column("or_customer").unwrap(), model, "t", &mut ctx).unwrap_err();
        assert!(matches!(err, QueryError::UnresolvableRelation { .. }));
    }

    #[test]
    fn test_missing_lookup_target_is_field_not_found() {
        let mut file = crate::compile::testing::shop_file();
        for model in &mut file.models {
            model.columns.retain(|c| c.id != "cu_country");
        }
        let catalog = Catalog::from_models(file.models);
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog);
        let err = resolve_join(model.column("or_country").unwrap(), model, "t", &mut ctx).unwrap_err();
        assert!(err.is_field_not_found());
    }

    #[test]
    fn test_depth_bound() {
        let catalog = shop();
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog).with_max_depth(1);
        let err = resolve_join(model.column("or_region").unwrap(), model, "t", &mut ctx).unwrap_err();
        assert_eq!(
            err,
            QueryError::DepthExceeded {
                column: "or_region".into(),
                max_depth: 1
            }
        );
    }
}

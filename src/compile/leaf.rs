//! Leaf comparisons.
//!
//! Every negated operator is compiled as `NOT (positive)`; when the positive
//! form cannot match a `NULL` cell the negation adds `OR field IS NULL` so
//! that rows without a value still satisfy "is not ...".

use chrono::NaiveDate;
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::meta::{ComparisonOp, Column, Filter, Model, RelationType, UiType};
use crate::sql::{
    always_false, count_star, lit_bool, lit_float, lit_int, lit_str, Expr, ExprExt, SqlDialect,
};
use crate::types::{parse_date, CheckboxHandler};

use super::condition::Predicate;
use super::context::CompileContext;
use super::relation::resolve_join;
use super::{dates, field, user, value};

const DAY_FORMAT: &str = "%Y-%m-%d";

struct Cond {
    expr: Expr,
    /// Whether the condition can hold for a NULL cell.
    matches_null: bool,
}

impl Cond {
    fn strict(expr: Expr) -> Self {
        Self {
            expr,
            matches_null: false,
        }
    }

    fn nullable(expr: Expr) -> Self {
        Self {
            expr,
            matches_null: true,
        }
    }

    fn negated(self, operand: &Expr) -> Self {
        if self.matches_null {
            Cond::strict(self.expr.not())
        } else {
            Cond::nullable(self.expr.not().or(operand.clone().is_null()))
        }
    }
}

/// Compile one leaf filter on `column` of `model`, bound to `alias`.
pub(crate) fn compile_leaf<'a>(
    filter: &Filter,
    op: ComparisonOp,
    column: &'a Column,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Predicate> {
    match column.uidt {
        UiType::LinkToAnotherRecord | UiType::Lookup => {
            return relation_leaf(filter, op, column, model, alias, ctx)
        }
        UiType::Links if is_emptiness(op) => {
            return relation_leaf(filter, op, column, model, alias, ctx)
        }
        UiType::QrCode | UiType::Barcode => {
            return Err(QueryError::NotImplemented(format!(
                "filtering on {} column '{}'",
                column.uidt, column.id
            )))
        }
        UiType::Button if column.formula().is_none() => {
            return Err(QueryError::NotImplemented(format!(
                "filtering on button column '{}'",
                column.id
            )))
        }
        _ => {}
    }

    let operand = value::column_value(column, model, alias, ctx)?;
    let cond = match op.negated_form_of() {
        Some(positive) => positive_cond(filter, positive, column, &operand, ctx)?
            .map(|cond| cond.negated(&operand)),
        None => positive_cond(filter, op, column, &operand, ctx)?,
    };
    Ok(cond.map_or(Predicate::Noop, |cond| Predicate::Sql(cond.expr)))
}

fn is_emptiness(op: ComparisonOp) -> bool {
    matches!(
        op,
        ComparisonOp::Null
            | ComparisonOp::NotNull
            | ComparisonOp::Blank
            | ComparisonOp::NotBlank
            | ComparisonOp::Empty
            | ComparisonOp::NotEmpty
    )
}

// =============================================================================
// Relation leaves
// =============================================================================

fn relation_leaf<'a>(
    filter: &Filter,
    op: ComparisonOp,
    column: &'a Column,
    model: &'a Model,
    alias: &str,
    ctx: &mut CompileContext<'a>,
) -> QueryResult<Predicate> {
    if let (Some(relation), true) = (column.relation(), is_emptiness(op)) {
        let wants_empty = matches!(
            op,
            ComparisonOp::Null | ComparisonOp::Blank | ComparisonOp::Empty
        );
        let expr = match relation.relation_type {
            RelationType::BelongsTo => {
                let fk = model.column(&relation.fk_child_column_id).ok_or_else(|| {
                    QueryError::unresolvable(&column.id, "missing foreign key column")
                })?;
                let fk = field(alias, fk);
                if wants_empty {
                    fk.is_null()
                } else {
                    fk.is_not_null()
                }
            }
            RelationType::HasMany | RelationType::ManyToMany => {
                let plan = resolve_join(column, model, alias, ctx)?;
                let linked = plan.correlated(count_star());
                if wants_empty {
                    linked.eq(lit_int(0))
                } else {
                    linked.gt(lit_int(0))
                }
            }
        };
        return Ok(Predicate::Sql(expr));
    }

    // Remaining relation filters test the looked-up value of the related rows
    // and keep the rows whose key is (or is not) among the matches.
    let (inner_op, negated) = match op {
        ComparisonOp::Blank => (ComparisonOp::NotBlank, true),
        ComparisonOp::Null => (ComparisonOp::NotNull, true),
        ComparisonOp::Empty => (ComparisonOp::NotEmpty, true),
        ComparisonOp::NotBlank | ComparisonOp::NotNull | ComparisonOp::NotEmpty => (op, false),
        other => match other.negated_form_of() {
            Some(positive) => (positive, true),
            None => (other, false),
        },
    };

    let plan = resolve_join(column, model, alias, ctx)?;
    let far = plan.model;
    let target = plan.target;
    let joined = plan.joined_alias.clone();
    let inner_filter = Filter {
        fk_column_id: Some(target.id.clone()),
        comparison_op: Some(inner_op),
        ..filter.clone()
    };
    let inner = ctx.nested(&column.id, |ctx| {
        compile_leaf(&inner_filter, inner_op, target, far, &joined, ctx)
    })?;

    Ok(match inner {
        Predicate::Noop => Predicate::Noop,
        Predicate::Sql(pred) => Predicate::Sql(plan.in_subquery(Some(pred), negated)),
    })
}

// =============================================================================
// Positive operators
// =============================================================================

fn positive_cond(
    filter: &Filter,
    op: ComparisonOp,
    column: &Column,
    operand: &Expr,
    ctx: &CompileContext<'_>,
) -> QueryResult<Option<Cond>> {
    let f = operand.clone();
    let cond = match op {
        ComparisonOp::Eq => return eq_cond(filter, column, f, ctx),
        ComparisonOp::Like => like_cond(filter, column, f, ctx),
        ComparisonOp::Empty if column.uidt.blank_is_null_only() => Cond::nullable(f.is_null()),
        ComparisonOp::Empty => Cond::strict(f.eq(lit_str(""))),
        ComparisonOp::Null => Cond::nullable(f.is_null()),
        ComparisonOp::Blank => blank_cond(column, f),
        ComparisonOp::Checked => Cond::strict(f.eq(lit_bool(true))),
        ComparisonOp::AllOf | ComparisonOp::AnyOf => return Ok(list_cond(filter, op, f)),
        ComparisonOp::Gt
        | ComparisonOp::Lt
        | ComparisonOp::Gte
        | ComparisonOp::Lte
        | ComparisonOp::Ge
        | ComparisonOp::Le => return compare_cond(filter, op, column, f, ctx),
        ComparisonOp::In => return in_cond(filter, column, f, ctx),
        ComparisonOp::Is => return is_cond(filter, column, operand, ctx),
        ComparisonOp::Btw => return between_cond(filter, column, f, ctx),
        ComparisonOp::IsWithin => return within_cond(filter, column, f, ctx),
        negated => {
            return Err(QueryError::InvalidFilter(format!(
                "operator '{negated}' has no positive form"
            )))
        }
    };
    Ok(Some(cond))
}

fn blank_cond(column: &Column, f: Expr) -> Cond {
    let expr = match column.uidt {
        UiType::Attachment => f
            .clone()
            .is_null()
            .or(f.clone().eq(lit_str("[]")))
            .or(f.eq(lit_str("null"))),
        UiType::Json => f
            .clone()
            .is_null()
            .or(f.clone().eq(lit_str("{}")))
            .or(f.eq(lit_str("[]"))),
        UiType::Checkbox => f.clone().is_null().or(f.eq(lit_bool(false))),
        uidt if uidt.blank_is_null_only() || uidt == UiType::Formula => f.is_null(),
        _ => f.clone().is_null().or(f.eq(lit_str(""))),
    };
    Cond::nullable(expr)
}

fn eq_cond(
    filter: &Filter,
    column: &Column,
    f: Expr,
    ctx: &CompileContext<'_>,
) -> QueryResult<Option<Cond>> {
    let uidt = column.uidt;
    if uidt.is_date() {
        return date_cond(filter, ComparisonOp::Eq, f, ctx);
    }
    if filter.value_is_empty() {
        return Ok(Some(blank_cond(column, f)));
    }

    let cond = match uidt {
        UiType::Checkbox => {
            if CheckboxHandler::truthy(&filter.value) {
                Cond::strict(f.eq(lit_bool(true)))
            } else {
                Cond::nullable(f.clone().eq(lit_bool(false)).or(f.is_null()))
            }
        }
        UiType::Formula | UiType::Button => match number(&filter.value) {
            Some(n) => Cond::strict(f.eq(number_literal(n))),
            None => Cond::strict(f.eq(lit_str(&filter.value_text()))),
        },
        uidt if uidt.is_numeric() => match numeric(&filter.value, column, ctx) {
            Some(n) if uidt == UiType::Rating && n == 0.0 => {
                Cond::nullable(f.clone().eq(lit_int(0)).or(f.is_null()))
            }
            Some(n) => Cond::strict(f.eq(number_literal(n))),
            None if uidt == UiType::Id => Cond::strict(f.eq(lit_str(&filter.value_text()))),
            None => Cond::strict(always_false()),
        },
        uidt if uidt.is_user() => Cond::strict(f.eq(lit_str(&filter.value_text()))),
        _ => Cond::strict(
            ctx.dialect
                .case_sensitive(f)
                .eq(lit_str(&filter.value_text())),
        ),
    };
    Ok(Some(cond))
}

fn like_cond(filter: &Filter, column: &Column, f: Expr, ctx: &CompileContext<'_>) -> Cond {
    if filter.value_is_empty() {
        return match column.uidt {
            UiType::Attachment => blank_cond(column, f),
            _ => Cond::strict(f.is_not_null()),
        };
    }

    let text = filter.value_text();
    let pattern = if text.contains('%') {
        text
    } else {
        format!("%{text}%")
    };
    let target = if column.uidt.is_user() {
        user::display_names(f, ctx.users)
    } else {
        f
    };
    let expr = if ctx.dialect.supports_ilike() {
        ctx.dialect.cast_to_text(target).ilike(lit_str(&pattern))
    } else {
        target.like(lit_str(&pattern))
    };
    Cond::strict(expr)
}

fn list_cond(filter: &Filter, op: ComparisonOp, f: Expr) -> Option<Cond> {
    let items = list_items(&filter.value);
    if items.is_empty() {
        return None;
    }
    let wrapped = lit_str(",").concat(f).concat(lit_str(","));
    let expr = items
        .iter()
        .map(|item| wrapped.clone().like(lit_str(&format!("%,{item},%"))))
        .reduce(|acc, next| match op {
            ComparisonOp::AllOf => acc.and(next),
            _ => acc.or(next),
        })?;
    Some(Cond::strict(expr))
}

fn compare_cond(
    filter: &Filter,
    op: ComparisonOp,
    column: &Column,
    f: Expr,
    ctx: &CompileContext<'_>,
) -> QueryResult<Option<Cond>> {
    let uidt = column.uidt;
    if uidt.is_date() {
        return date_cond(filter, op, f, ctx);
    }
    if filter.value_is_empty() {
        return Ok(None);
    }

    let cond = match uidt {
        UiType::Formula | UiType::Button => match number(&filter.value) {
            Some(n) => Cond::strict(compare(op, f, number_literal(n))),
            None => Cond::strict(compare(op, f, lit_str(&filter.value_text()))),
        },
        uidt if uidt.is_numeric() => match numeric(&filter.value, column, ctx) {
            Some(n) => {
                let cmp = compare(op, f.clone(), number_literal(n));
                // Unrated rows count as zero.
                if uidt == UiType::Rating && zero_satisfies(op, n) {
                    Cond::nullable(cmp.or(f.is_null()))
                } else {
                    Cond::strict(cmp)
                }
            }
            None if uidt == UiType::Id => {
                Cond::strict(compare(op, f, lit_str(&filter.value_text())))
            }
            None => Cond::strict(always_false()),
        },
        _ => Cond::strict(compare(op, f, lit_str(&filter.value_text()))),
    };
    Ok(Some(cond))
}

fn compare(op: ComparisonOp, lhs: Expr, rhs: Expr) -> Expr {
    match op {
        ComparisonOp::Gt => lhs.gt(rhs),
        ComparisonOp::Lt => lhs.lt(rhs),
        ComparisonOp::Gte | ComparisonOp::Ge => lhs.gte(rhs),
        ComparisonOp::Lte | ComparisonOp::Le => lhs.lte(rhs),
        _ => lhs.eq(rhs),
    }
}

fn zero_satisfies(op: ComparisonOp, n: f64) -> bool {
    match op {
        ComparisonOp::Gt => 0.0 > n,
        ComparisonOp::Lt => 0.0 < n,
        ComparisonOp::Gte | ComparisonOp::Ge => 0.0 >= n,
        ComparisonOp::Lte | ComparisonOp::Le => 0.0 <= n,
        _ => n == 0.0,
    }
}

fn in_cond(
    filter: &Filter,
    column: &Column,
    f: Expr,
    ctx: &CompileContext<'_>,
) -> QueryResult<Option<Cond>> {
    let items = list_items(&filter.value);
    if items.is_empty() {
        return Ok(None);
    }
    let values = items
        .iter()
        .map(|item| {
            let raw = Value::String(item.clone());
            if column.uidt.is_numeric() {
                numeric(&raw, column, ctx).map_or_else(|| lit_str(item), number_literal)
            } else {
                lit_str(item)
            }
        })
        .collect();
    Ok(Some(Cond::strict(f.in_list(values))))
}

fn is_cond(
    filter: &Filter,
    column: &Column,
    operand: &Expr,
    ctx: &CompileContext<'_>,
) -> QueryResult<Option<Cond>> {
    let keyword = filter.value_text().trim().to_lowercase();
    let (op, negate) = match keyword.as_str() {
        "" => return Ok(None),
        "null" => (ComparisonOp::Null, false),
        "notnull" => (ComparisonOp::Null, true),
        "empty" => (ComparisonOp::Empty, false),
        "notempty" => (ComparisonOp::Empty, true),
        "blank" => (ComparisonOp::Blank, false),
        "notblank" => (ComparisonOp::Blank, true),
        "true" | "checked" => (ComparisonOp::Checked, false),
        "false" | "notchecked" => (ComparisonOp::Checked, true),
        other => {
            return Err(QueryError::InvalidFilter(format!(
                "'{other}' is not a valid value for the is operator"
            )))
        }
    };
    let cond = positive_cond(filter, op, column, operand, ctx)?;
    Ok(if negate {
        cond.map(|cond| cond.negated(operand))
    } else {
        cond
    })
}

fn between_cond(
    filter: &Filter,
    column: &Column,
    f: Expr,
    ctx: &CompileContext<'_>,
) -> QueryResult<Option<Cond>> {
    if filter.value_is_empty() {
        return Ok(None);
    }
    let bounds = list_items(&filter.value);
    let [low, high] = bounds.as_slice() else {
        return Err(QueryError::InvalidFilter(format!(
            "btw expects two bounds, got '{}'",
            filter.value_text()
        )));
    };

    let uidt = column.uidt;
    let expr = if uidt.is_date() {
        let low = day_literal(low)?;
        let high = day_literal(high)?;
        ctx.dialect.date_only(f).between(low, high)
    } else if uidt.is_numeric() || uidt == UiType::Formula {
        let bound = |text: &String| {
            number(&Value::String(text.clone()))
                .map(number_literal)
                .ok_or_else(|| QueryError::InvalidFilter(format!("'{text}' is not a number")))
        };
        f.between(bound(low)?, bound(high)?)
    } else {
        f.between(lit_str(low), lit_str(high))
    };
    Ok(Some(Cond::strict(expr)))
}

fn within_cond(
    filter: &Filter,
    column: &Column,
    f: Expr,
    ctx: &CompileContext<'_>,
) -> QueryResult<Option<Cond>> {
    if !column.uidt.is_date() {
        return Err(QueryError::InvalidFilter(format!(
            "isWithin needs a date column, '{}' is {}",
            column.id, column.uidt
        )));
    }
    let Some(sub_op) = filter.comparison_sub_op else {
        return Ok(None);
    };
    let Some((from, to)) = dates::resolve_range(sub_op, &filter.value, ctx.now)? else {
        return Ok(None);
    };
    Ok(Some(Cond::strict(
        ctx.dialect
            .date_only(f)
            .between(lit_day(from), lit_day(to)),
    )))
}

/// Calendar comparison at day granularity.
fn date_cond(
    filter: &Filter,
    op: ComparisonOp,
    f: Expr,
    ctx: &CompileContext<'_>,
) -> QueryResult<Option<Cond>> {
    let day = match filter.comparison_sub_op {
        Some(sub_op) => dates::resolve_day(sub_op, &filter.value, ctx.now)?,
        None if filter.value_is_empty() => None,
        None => Some(parse_day(&filter.value_text())?),
    };
    let Some(day) = day else {
        return Ok(None);
    };
    Ok(Some(Cond::strict(compare(
        op,
        ctx.dialect.date_only(f),
        lit_day(day),
    ))))
}

// =============================================================================
// Values
// =============================================================================

/// Array values, or comma separated text, trimmed and without empties.
fn list_items(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        other => vec![other.to_string()],
    };
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// The filter value normalized by the column's type handler.
fn numeric(value: &Value, column: &Column, ctx: &CompileContext<'_>) -> Option<f64> {
    number(&ctx.types.normalize(value, column))
}

fn number_literal(n: f64) -> Expr {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        lit_int(n as i64)
    } else {
        lit_float(n)
    }
}

fn parse_day(text: &str) -> QueryResult<NaiveDate> {
    parse_date(text.trim())
        .ok_or_else(|| QueryError::InvalidFilter(format!("'{text}' is not a date")))
}

fn day_literal(text: &str) -> QueryResult<Expr> {
    parse_day(text).map(lit_day)
}

fn lit_day(day: NaiveDate) -> Expr {
    lit_str(&day.format(DAY_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::testing::{orders, shop};
    use crate::meta::ComparisonSubOp;
    use crate::sql::test_utils::validate_sql;
    use crate::sql::Dialect;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn leaf_sql(filter: Filter, dialect: Dialect) -> QueryResult<Option<String>> {
        let catalog = shop();
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog)
            .with_dialect(dialect)
            .with_now(Utc.with_ymd_and_hms(2024, 3, 31, 15, 0, 0).unwrap());
        let alias = ctx.next_alias();
        let column = model.column(filter.fk_column_id.as_deref().unwrap()).unwrap();
        let op = filter.comparison_op.unwrap();
        let predicate = compile_leaf(&filter, op, column, model, &alias, &mut ctx)?;
        Ok(match predicate {
            Predicate::Noop => None,
            Predicate::Sql(expr) => Some(expr.to_sql(dialect)),
        })
    }

    fn sql(filter: Filter) -> String {
        leaf_sql(filter, Dialect::Postgres).unwrap().unwrap()
    }

    #[test]
    fn test_numeric_eq() {
        assert_eq!(
            sql(Filter::leaf("or_amount", ComparisonOp::Eq, "10")),
            "\"__nc0\".\"amount\" = 10"
        );
        assert_eq!(
            sql(Filter::leaf("or_amount", ComparisonOp::Eq, "abc")),
            "1 = 0"
        );
    }

    #[test]
    fn test_negation_keeps_null_rows() {
        assert_eq!(
            sql(Filter::leaf("or_amount", ComparisonOp::Neq, 10)),
            "NOT (\"__nc0\".\"amount\" = 10) OR \"__nc0\".\"amount\" IS NULL"
        );
        // blank already matches NULL, so the negation must not re-add it
        assert_eq!(
            sql(Filter::leaf("or_amount", ComparisonOp::NotBlank, Value::Null)),
            "NOT (\"__nc0\".\"amount\" IS NULL)"
        );
    }

    #[test]
    fn test_text_eq_and_blank() {
        assert_eq!(
            leaf_sql(Filter::leaf("or_title", ComparisonOp::Eq, "Mug"), Dialect::MySql)
                .unwrap()
                .unwrap(),
            "CAST(`__nc0`.`title` AS BINARY) = 'Mug'"
        );
        assert_eq!(
            sql(Filter::leaf("or_title", ComparisonOp::Eq, "")),
            "\"__nc0\".\"title\" IS NULL OR \"__nc0\".\"title\" = ''"
        );
    }

    #[test]
    fn test_checkbox() {
        assert_eq!(
            leaf_sql(Filter::leaf("or_paid", ComparisonOp::Eq, false), Dialect::Sqlite)
                .unwrap()
                .unwrap(),
            "\"__nc0\".\"paid\" = 0 OR \"__nc0\".\"paid\" IS NULL"
        );
        assert_eq!(
            sql(Filter::leaf("or_paid", ComparisonOp::Checked, Value::Null)),
            "\"__nc0\".\"paid\" = true"
        );
    }

    #[test]
    fn test_rating_null_counts_as_zero() {
        assert_eq!(
            sql(Filter::leaf("or_rating", ComparisonOp::Lt, 3)),
            "\"__nc0\".\"rating\" < 3 OR \"__nc0\".\"rating\" IS NULL"
        );
        assert_eq!(
            sql(Filter::leaf("or_rating", ComparisonOp::Gt, 3)),
            "\"__nc0\".\"rating\" > 3"
        );
    }

    #[test]
    fn test_like_wraps_pattern() {
        assert_eq!(
            sql(Filter::leaf("or_title", ComparisonOp::Like, "mug")),
            "CAST(\"__nc0\".\"title\" AS TEXT) ILIKE '%mug%'"
        );
        assert_eq!(
            leaf_sql(Filter::leaf("or_title", ComparisonOp::Like, "m%g"), Dialect::Sqlite)
                .unwrap()
                .unwrap(),
            "\"__nc0\".\"title\" LIKE 'm%g'"
        );
    }

    #[test]
    fn test_like_on_user_column_matches_names() {
        let catalog = shop();
        let file = crate::compile::testing::shop_file();
        let model = orders(&catalog);
        let mut ctx = CompileContext::new(&catalog)
            .with_dialect(Dialect::Sqlite)
            .with_users(&file.base_users);
        let alias = ctx.next_alias();
        let filter = Filter::leaf("or_owner", ComparisonOp::Like, "Ada");
        let column = model.column("or_owner").unwrap();
        let Predicate::Sql(expr) =
            compile_leaf(&filter, ComparisonOp::Like, column, model, &alias, &mut ctx).unwrap()
        else {
            panic!("expected a predicate");
        };
        assert!(expr.to_sql(Dialect::Sqlite).contains("REPLACE(REPLACE("));
    }

    #[test]
    fn test_anyof_and_allof() {
        assert_eq!(
            leaf_sql(Filter::leaf("or_labels", ComparisonOp::AnyOf, "a,b"), Dialect::Sqlite)
                .unwrap()
                .unwrap(),
            "',' || \"__nc0\".\"labels\" || ',' LIKE '%,a,%' OR ',' || \"__nc0\".\"labels\" || ',' LIKE '%,b,%'"
        );
        assert_eq!(
            leaf_sql(Filter::leaf("or_labels", ComparisonOp::AllOf, ""), Dialect::Sqlite).unwrap(),
            None
        );
    }

    #[test]
    fn test_in_and_between() {
        assert_eq!(
            sql(Filter::leaf("or_amount", ComparisonOp::In, "1, 2,3")),
            "\"__nc0\".\"amount\" IN (1, 2, 3)"
        );
        assert_eq!(
            sql(Filter::leaf("or_amount", ComparisonOp::Btw, json!([5, 10]))),
            "\"__nc0\".\"amount\" BETWEEN 5 AND 10"
        );
        assert!(matches!(
            leaf_sql(Filter::leaf("or_amount", ComparisonOp::Btw, "5"), Dialect::Postgres),
            Err(QueryError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_is_keywords() {
        assert_eq!(
            sql(Filter::leaf("or_title", ComparisonOp::Is, "null")),
            "\"__nc0\".\"title\" IS NULL"
        );
        assert!(matches!(
            leaf_sql(Filter::leaf("or_title", ComparisonOp::Is, "maybe"), Dialect::Postgres),
            Err(QueryError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_date_sub_ops() {
        let filter = Filter::leaf("or_date", ComparisonOp::Eq, Value::Null)
            .with_sub_op(ComparisonSubOp::Yesterday);
        assert_eq!(
            sql(filter),
            "CAST(\"__nc0\".\"order_date\" AS DATE) = '2024-03-30'"
        );

        let filter = Filter::leaf("or_date", ComparisonOp::IsWithin, Value::Null)
            .with_sub_op(ComparisonSubOp::PastWeek);
        assert_eq!(
            leaf_sql(filter, Dialect::Sqlite).unwrap().unwrap(),
            "DATE(\"__nc0\".\"order_date\") BETWEEN '2024-03-24' AND '2024-03-31'"
        );

        let filter = Filter::leaf("or_date", ComparisonOp::Gt, "")
            .with_sub_op(ComparisonSubOp::DaysAgo);
        assert_eq!(leaf_sql(filter, Dialect::Postgres).unwrap(), None);
    }

    #[test]
    fn test_belongs_to_emptiness_tests_foreign_key() {
        assert_eq!(
            sql(Filter::leaf("or_customer", ComparisonOp::Blank, Value::Null)),
            "\"__nc0\".\"customer_id\" IS NULL"
        );
    }

    #[test]
    fn test_has_many_emptiness_counts_children() {
        insta::assert_snapshot!(
            sql(Filter::leaf("or_items", ComparisonOp::NotBlank, Value::Null)),
            @r#"(SELECT COUNT(*) FROM "order_items" AS "__nc1" WHERE "__nc1"."order_id" = "__nc0"."id") > 0"#
        );
    }

    #[test]
    fn test_lookup_filter_uses_in_subquery() {
        insta::assert_snapshot!(
            sql(Filter::leaf("or_country", ComparisonOp::Eq, "US")),
            @r#""__nc0"."customer_id" IN (SELECT "__nc1"."id" FROM "customers" AS "__nc1" WHERE "__nc1"."country" = 'US' AND "__nc1"."id" IS NOT NULL)"#
        );
    }

    #[test]
    fn test_negated_lookup_filter() {
        let out = sql(Filter::leaf("or_item_names", ComparisonOp::NLike, "pen"));
        assert!(out.starts_with("(\"__nc0\".\"id\" IS NULL OR \"__nc0\".\"id\" NOT IN (SELECT"));
        assert!(out.contains("ILIKE '%pen%'"));
    }

    #[test]
    fn test_links_count_comparison() {
        insta::assert_snapshot!(
            sql(Filter::leaf("or_item_count", ComparisonOp::Gte, 2)),
            @r#"(SELECT COUNT(*) FROM "order_items" AS "__nc1" WHERE "__nc1"."order_id" = "__nc0"."id") >= 2"#
        );
    }

    #[test]
    fn test_leaves_parse_in_every_dialect() {
        let filters = [
            Filter::leaf("or_amount", ComparisonOp::Neq, 3),
            Filter::leaf("or_title", ComparisonOp::NLike, "x"),
            Filter::leaf("or_labels", ComparisonOp::NAllOf, "a,b"),
            Filter::leaf("or_tag_names", ComparisonOp::Eq, "red"),
            Filter::leaf("or_items_total", ComparisonOp::Gt, 100),
        ];
        for dialect in Dialect::all() {
            for filter in filters.clone() {
                let pred = leaf_sql(filter, dialect).unwrap().unwrap();
                validate_sql(&format!("SELECT 1 FROM t WHERE {pred}"), dialect).unwrap();
            }
        }
    }
}

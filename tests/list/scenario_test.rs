//! End-to-end list and aggregate requests against the shop fixture.

use gridql::compile::{compile_filters, compile_sorts, Aggregation, CompileContext, Predicate};
use gridql::list::{AggregationRequest, ListRequest, Orchestrator, Row, SqliteExecutor};
use gridql::meta::{
    Catalog, CatalogFile, ComparisonOp, Filter, InMemoryStore, LogicalOp, Sort,
};
use gridql::config::Settings;
use gridql::sql::Dialect;
use serde_json::json;

const SHOP_JSON: &str = include_str!("../fixtures/shop.json");
const SHOP_SQL: &str = include_str!("../fixtures/shop.sql");

fn orchestrator(dialect: Dialect) -> Orchestrator<InMemoryStore> {
    let mut settings = Settings::default();
    settings.compile.dialect = dialect;
    Orchestrator::new(InMemoryStore::from_json(SHOP_JSON).unwrap(), settings)
}

fn database() -> SqliteExecutor {
    let db = SqliteExecutor::in_memory().unwrap();
    db.execute_batch(SHOP_SQL).unwrap();
    db
}

fn catalog() -> Catalog {
    let file: CatalogFile = serde_json::from_str(SHOP_JSON).unwrap();
    Catalog::from_models(file.models)
}

fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter()
        .map(|r| r.get("Id").and_then(|v| v.as_i64()).unwrap())
        .collect()
}

/// Text of a top-level clause of a pretty-printed query.
fn clause<'s>(sql: &'s str, keyword: &str) -> &'s str {
    let start = sql.find(&format!("\n{keyword} ")).unwrap() + keyword.len() + 2;
    let rest = &sql[start..];
    &rest[..rest.find('\n').unwrap_or(rest.len())]
}

fn amount_over_100() -> Filter {
    Filter::group(
        LogicalOp::And,
        vec![Filter::leaf("or_amount", ComparisonOp::Gt, 100)],
    )
}

fn filter_sql(filters: &[Filter]) -> String {
    let catalog = catalog();
    let model = catalog.model("md_orders").unwrap();
    let mut ctx = CompileContext::new(&catalog).with_dialect(Dialect::Postgres);
    let alias = ctx.next_alias();
    match compile_filters(filters, model, &alias, &mut ctx).unwrap() {
        Predicate::Sql(expr) => expr.to_sql(Dialect::Postgres),
        Predicate::Noop => String::new(),
    }
}

#[tokio::test]
async fn test_number_filter_adds_no_joins() {
    assert_eq!(filter_sql(&[amount_over_100()]), r#""__nc0"."amount" > 100"#);

    let lists = orchestrator(Dialect::Postgres);
    let request = ListRequest::new("md_orders").with_filters(vec![amount_over_100()]);
    let sql = lists.list_query(&request).await.unwrap();
    assert_eq!(clause(&sql, "WHERE"), r#"("__nc0"."amount" > 100)"#);

    let rows = lists.list(&request, &database()).await.unwrap();
    assert_eq!(ids(&rows), vec![2, 3, 4]);
}

#[tokio::test]
async fn test_lookup_filter_joins_once() {
    let mut group = amount_over_100();
    group
        .children
        .push(Filter::leaf("or_country", ComparisonOp::Eq, "US"));

    assert_eq!(
        filter_sql(std::slice::from_ref(&group)),
        r#""__nc0"."amount" > 100 AND "__nc0"."customer_id" IN (SELECT "__nc1"."id" FROM "customers" AS "__nc1" WHERE "__nc1"."country" = 'US' AND "__nc1"."id" IS NOT NULL)"#
    );

    let lists = orchestrator(Dialect::Sqlite);
    let request = ListRequest::new("md_orders").with_filters(vec![group]);
    let sql = lists.list_query(&request).await.unwrap();
    assert_eq!(clause(&sql, "WHERE").matches("\"customers\"").count(), 1);

    let rows = lists.list(&request, &database()).await.unwrap();
    assert_eq!(ids(&rows), vec![3, 4]);
}

#[tokio::test]
async fn test_rollup_sort_orders_by_subselect() {
    let catalog = catalog();
    let model = catalog.model("md_orders").unwrap();
    let mut ctx = CompileContext::new(&catalog).with_dialect(Dialect::Postgres);
    let alias = ctx.next_alias();
    let terms = compile_sorts(&[Sort::desc("or_items_total")], model, &alias, &mut ctx).unwrap();
    assert_eq!(
        terms[0]
            .to_tokens_for_dialect(Dialect::Postgres)
            .serialize(Dialect::Postgres),
        r#"(SELECT SUM("__nc1"."amount") FROM "order_items" AS "__nc1" WHERE "__nc1"."order_id" = "__nc0"."id") DESC NULLS LAST"#
    );

    let lists = orchestrator(Dialect::Sqlite);
    let request = ListRequest::new("md_orders").with_sorts(vec![Sort::desc("or_items_total")]);
    let rows = lists.list(&request, &database()).await.unwrap();
    // orders without items sort last, then by the order column
    assert_eq!(ids(&rows), vec![3, 2, 1, 4, 5]);
    assert_eq!(rows[0].get("Items Total"), Some(&json!(350.0)));
    assert_eq!(rows[3].get("Items Total"), Some(&json!(null)));
}

#[tokio::test]
async fn test_count_unique_on_text() {
    let lists = orchestrator(Dialect::Sqlite);
    let request = ListRequest::new("md_orders");
    let aggregations = [AggregationRequest::new("or_title", Aggregation::CountUnique)];

    let sql = lists
        .aggregate_query(&request, &aggregations)
        .await
        .unwrap()
        .unwrap();
    insta::assert_snapshot!(sql, @r#"
    SELECT
      COALESCE(COUNT(DISTINCT CASE WHEN "__nc0"."title" IS NOT NULL AND "__nc0"."title" <> '' THEN "__nc0"."title" END), 0) AS "or_title"
    FROM "orders" AS "__nc0"
    "#);

    // titles are 'a', 'A', 'b', NULL and ''
    let row = lists
        .aggregate(&request, &aggregations, &database())
        .await
        .unwrap();
    assert_eq!(row.get("or_title"), Some(&json!(3)));
}

#[tokio::test]
async fn test_illegal_aggregation_fails_before_sql() {
    let lists = orchestrator(Dialect::Postgres);
    let aggregations = [AggregationRequest::new("or_amount", Aggregation::EarliestDate)];
    let err = lists
        .aggregate_query(&ListRequest::new("md_orders"), &aggregations)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "aggregation 'earliestDate' is not available for column type Number"
    );
}

#[tokio::test]
async fn test_where_and_sort_strings() {
    let lists = orchestrator(Dialect::Sqlite);
    let request = ListRequest::new("md_orders")
        .with_where("(Status,eq,open)~and((Paid,checked)~or(Rating,gte,4))")
        .with_sort("-Amount");
    let rows = lists.list(&request, &database()).await.unwrap();
    assert_eq!(ids(&rows), vec![3, 4, 1]);
}

#[tokio::test]
async fn test_custom_conditions_narrow_the_view() {
    let lists = orchestrator(Dialect::Sqlite);
    let request = ListRequest::new("md_orders")
        .with_view("vw_big")
        .with_custom_conditions(vec![Filter::leaf("or_status", ComparisonOp::Eq, "open")])
        .with_where("(amount,lt,300)");

    let sql = lists.list_query(&request).await.unwrap();
    assert_eq!(
        clause(&sql, "WHERE"),
        r#"("__nc0"."amount" > 100) AND ("__nc0"."status" = 'open') AND ("__nc0"."amount" < 300)"#
    );

    let rows = lists.list(&request, &database()).await.unwrap();
    assert_eq!(ids(&rows), vec![4]);
}

#[tokio::test]
async fn test_tiebreaker_is_stable_across_runs() {
    let lists = orchestrator(Dialect::Sqlite);
    let db = database();
    let request = ListRequest::new("md_orders")
        .with_sort("status")
        .without_order_column();

    let first = ids(&lists.list(&request, &db).await.unwrap());
    for _ in 0..3 {
        assert_eq!(ids(&lists.list(&request, &db).await.unwrap()), first);
    }
    // NULL status first, then 'closed', then the three 'open' rows by id
    assert_eq!(first, vec![5, 2, 1, 3, 4]);
}

#[tokio::test]
async fn test_view_round_trip_with_pagination() {
    let lists = orchestrator(Dialect::Sqlite);
    let request = ListRequest::new("md_orders")
        .with_view("vw_big")
        .with_limit(2)
        .with_offset(1);
    let rows = lists.list(&request, &database()).await.unwrap();
    assert_eq!(ids(&rows), vec![2, 4]);
    assert_eq!(rows[1].get("Region"), Some(&json!("NA")));
    assert_eq!(rows[0].get("Tag Names"), Some(&json!(null)));
}

//! Query-string filters executed against the shop fixture.

use std::collections::BTreeSet;

use gridql::compile::Strictness;
use gridql::config::Settings;
use gridql::error::QueryError;
use gridql::list::{ListRequest, Orchestrator, SqliteExecutor};
use gridql::meta::{CatalogFile, ComparisonOp, InMemoryStore, SortDirection};
use gridql::parse::{parse_sort, parse_where};

const SHOP_JSON: &str = include_str!("../fixtures/shop.json");
const SHOP_SQL: &str = include_str!("../fixtures/shop.sql");

const ALL_IDS: [i64; 5] = [1, 2, 3, 4, 5];

async fn matching(where_clause: &str) -> Vec<i64> {
    let lists = Orchestrator::new(InMemoryStore::from_json(SHOP_JSON).unwrap(), Settings::default());
    let db = SqliteExecutor::in_memory().unwrap();
    db.execute_batch(SHOP_SQL).unwrap();

    let request = ListRequest::new("md_orders")
        .with_where(where_clause)
        .with_strictness(Strictness::Strict);
    let rows = lists.list(&request, &db).await.unwrap();
    rows.iter()
        .map(|r| r.get("Id").and_then(|v| v.as_i64()).unwrap())
        .collect()
}

#[tokio::test]
async fn test_physical_columns() {
    assert_eq!(matching("(amount,in,50,400)").await, vec![1, 3]);
    assert_eq!(matching("(amount,btw,100,200)").await, vec![2, 4]);
    assert_eq!(matching("(title,blank)").await, vec![4, 5]);
    assert_eq!(matching("(Rating,eq,0)").await, vec![2, 4, 5]);
    assert_eq!(matching("(labels,anyof,rush)").await, vec![1, 4]);
    assert_eq!(matching("(paid,notchecked)").await, vec![2, 5]);
}

#[tokio::test]
async fn test_dates() {
    assert_eq!(matching("(Order Date,eq,exactDate,2024-02-10)").await, vec![2]);
    assert_eq!(matching("(Order Date,lt,exactDate,2024-03-01)").await, vec![1, 2]);
}

#[tokio::test]
async fn test_relations_and_lookups() {
    assert_eq!(matching("(Item Names,like,ink)").await, vec![1]);
    assert_eq!(matching("(Tag Names,eq,rush)").await, vec![1, 3]);
    // orders without a customer satisfy neq
    assert_eq!(matching("(Country,neq,US)").await, vec![2, 5]);
    assert_eq!(matching("(Items,blank)").await, vec![4, 5]);
}

#[tokio::test]
async fn test_users_match_display_names() {
    assert_eq!(matching("(Owner,like,ada)").await, vec![1, 4]);
}

#[tokio::test]
async fn test_groups() {
    assert_eq!(
        matching("(status,eq,open)~and((rating,gte,4)~or(amount,lt,100))").await,
        vec![1, 3]
    );
    assert_eq!(matching("(status,eq,open)~not(paid,checked)").await, Vec::<i64>::new());
}

#[tokio::test]
async fn test_leading_not_and_mixed_connectors() {
    assert_eq!(matching("~not(amount,eq,50)").await, vec![2, 3, 4]);
    // AND binds tighter than OR
    assert_eq!(
        matching("(paid,checked)~or(amount,eq,150)~and(amount,eq,150)").await,
        vec![1, 2, 3, 4]
    );
    assert_eq!(
        matching("(amount,eq,50)~or(status,eq,open)~and(rating,gte,4)~or(title,eq,A)").await,
        vec![1, 2, 3]
    );
}

/// Each operator and its negation split the rows, NULLs included, in two.
#[tokio::test]
async fn test_negated_operators_are_complements() {
    let cases: [(ComparisonOp, &str, Option<&str>); 13] = [
        (ComparisonOp::Eq, "amount", Some("150")),
        (ComparisonOp::Eq, "Rating", Some("0")),
        (ComparisonOp::Eq, "Country", Some("US")),
        (ComparisonOp::Like, "title", Some("a")),
        (ComparisonOp::Like, "Item Names", Some("ink")),
        (ComparisonOp::Empty, "title", None),
        (ComparisonOp::Null, "amount", None),
        (ComparisonOp::Blank, "title", None),
        (ComparisonOp::Blank, "Items", None),
        (ComparisonOp::Checked, "paid", None),
        (ComparisonOp::AllOf, "labels", Some("rush,gift")),
        (ComparisonOp::AnyOf, "labels", Some("rush")),
        (ComparisonOp::Btw, "amount", Some("100,200")),
    ];

    let negations: Vec<(ComparisonOp, ComparisonOp)> = ComparisonOp::ALL
        .iter()
        .filter_map(|&neg| neg.negated_form_of().map(|pos| (pos, neg)))
        .filter(|(pos, _)| *pos != ComparisonOp::Is)
        .collect();
    for (pos, neg) in &negations {
        assert!(
            cases.iter().any(|(op, _, _)| op == pos),
            "no case for {pos}/{neg}"
        );
    }

    let all: BTreeSet<i64> = ALL_IDS.into_iter().collect();
    for (op, field, value) in cases {
        let term = |op: ComparisonOp| match value {
            Some(value) => format!("({field},{},{value})", op.as_str()),
            None => format!("({field},{})", op.as_str()),
        };
        let positive: BTreeSet<i64> = matching(&term(op)).await.into_iter().collect();
        for (_, neg) in negations.iter().filter(|(pos, _)| *pos == op) {
            let negative: BTreeSet<i64> = matching(&term(*neg)).await.into_iter().collect();
            assert!(
                positive.is_disjoint(&negative),
                "{} and {} overlap: {positive:?} {negative:?}",
                term(op),
                term(*neg)
            );
            assert_eq!(
                positive.union(&negative).copied().collect::<BTreeSet<_>>(),
                all,
                "{} and {} miss rows",
                term(op),
                term(*neg)
            );
        }
    }
}

#[test]
fn test_strictness() {
    let file: CatalogFile = serde_json::from_str(SHOP_JSON).unwrap();
    let orders = file.models.iter().find(|m| m.id == "md_orders").unwrap();

    assert!(matches!(
        parse_where("(ghost,eq,1)", orders, Strictness::Strict),
        Err(QueryError::InvalidFilter(_))
    ));
    assert_eq!(
        parse_sort("-ghost", orders, Strictness::Strict),
        Err(QueryError::field_not_found("ghost"))
    );

    let sorts = parse_sort("-ghost,-Amount", orders, Strictness::Lenient).unwrap();
    assert_eq!(sorts.len(), 1);
    assert_eq!(sorts[0].fk_column_id, "or_amount");
    assert_eq!(sorts[0].direction, SortDirection::Desc);
}

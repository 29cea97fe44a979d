//! Every dialect renders the same request to SQL its own parser accepts.

use gridql::compile::Aggregation;
use gridql::config::Settings;
use gridql::list::{AggregationRequest, ListRequest, Orchestrator};
use gridql::meta::InMemoryStore;
use gridql::sql::test_utils::validate_sql;
use gridql::sql::Dialect;

const SHOP_JSON: &str = include_str!("../fixtures/shop.json");

const DIALECTS: [Dialect; 4] = [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite, Dialect::TSql];

fn orchestrator(dialect: Dialect) -> Orchestrator<InMemoryStore> {
    let mut settings = Settings::default();
    settings.compile.dialect = dialect;
    Orchestrator::new(InMemoryStore::from_json(SHOP_JSON).unwrap(), settings)
}

#[tokio::test]
async fn test_list_queries_parse() {
    let requests = [
        ListRequest::new("md_orders"),
        ListRequest::new("md_orders").with_view("vw_big").with_offset(50),
        ListRequest::new("md_orders")
            .with_where("(title,like,mug)~or((Country,eq,US)~and(Tag Names,neq,rush))")
            .with_sort("-Items Total,status,Owner"),
        ListRequest::new("md_orders")
            .with_where("(Order Date,gte,exactDate,2024-01-01)~and(labels,allof,rush,gift)")
            .with_pks(vec!["1".into(), "2".into()]),
    ];

    for dialect in DIALECTS {
        let lists = orchestrator(dialect);
        for request in &requests {
            let sql = lists.list_query(request).await.unwrap();
            if let Err(e) = validate_sql(&sql, dialect) {
                panic!("{dialect:?} rejected:\n{sql}\n{e}");
            }
        }
    }
}

#[tokio::test]
async fn test_pagination_syntax() {
    let request = ListRequest::new("md_orders").with_limit(10).with_offset(20);

    let sql = orchestrator(Dialect::Postgres).list_query(&request).await.unwrap();
    assert!(sql.ends_with("LIMIT 10 OFFSET 20"));

    let sql = orchestrator(Dialect::TSql).list_query(&request).await.unwrap();
    assert!(sql.ends_with("OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"));
}

#[tokio::test]
async fn test_aggregate_queries_parse() {
    let aggregations = [
        AggregationRequest::new("or_amount", Aggregation::Sum),
        AggregationRequest::new("or_amount", Aggregation::Range),
        AggregationRequest::new("or_paid", Aggregation::PercentChecked),
        AggregationRequest::new("or_date", Aggregation::EarliestDate),
        AggregationRequest::new("or_title", Aggregation::PercentEmpty),
    ];
    let request = ListRequest::new("md_orders").with_where("(amount,gt,10)");

    for dialect in DIALECTS {
        let sql = orchestrator(dialect)
            .aggregate_query(&request, &aggregations)
            .await
            .unwrap()
            .unwrap();
        if let Err(e) = validate_sql(&sql, dialect) {
            panic!("{dialect:?} rejected:\n{sql}\n{e}");
        }
    }
}

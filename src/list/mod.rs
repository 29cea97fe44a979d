//! List orchestration: from a request to rows.
//!
//! ```text
//! ListRequest ──▶ load metadata ──▶ plan (filters, sorts, tiebreaker, page)
//!                                        │
//!                                        ▼
//!                                 QueryExecutor ──▶ Vec<Row>
//!                                        │ error + formula column
//!                                        ▼
//!                          recompile with formula validation, once
//! ```

mod executor;
mod plan;
mod row;
mod sqlite;

pub use executor::{QueryExecutor, RawRow};
pub use plan::{build_aggregate_query, build_list_query, ListPlan, PlanInputs};
pub use row::{DisplayPrototype, Row};
pub use sqlite::SqliteExecutor;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::compile::{
    Aggregation, CompileContext, DefaultFormulaCompiler, FormulaCompiler, Strictness,
};
use crate::config::Settings;
use crate::error::{QueryError, QueryResult};
use crate::meta::{BaseUser, Catalog, Filter, MetadataStore, Model, Sort, View};
use crate::sql::Dialect;
use crate::types::TypeRegistry;

// =============================================================================
// Requests
// =============================================================================

/// One page request against a model, optionally through a view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListRequest {
    pub model_id: String,
    pub view_id: Option<String>,
    /// `where=` query-string expression.
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    /// `sort=` query-string expression; wins over `sorts`.
    pub sort: Option<String>,
    /// Caller-supplied conditions, applied after the view's filters.
    pub custom_conditions: Vec<Filter>,
    pub filters: Vec<Filter>,
    pub sorts: Vec<Sort>,
    /// Columns to project, by title, name or id. Empty selects all;
    /// primary keys are always projected.
    pub fields: Vec<String>,
    /// Restrict to these primary keys.
    pub pks: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub ignore_pagination: bool,
    pub ignore_view_filter_sort: bool,
    pub skip_order_column: bool,
    pub validate_formula: bool,
    /// Overrides the configured strictness.
    pub strictness: Option<Strictness>,
}

impl ListRequest {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_view(mut self, view_id: &str) -> Self {
        self.view_id = Some(view_id.to_string());
        self
    }

    pub fn with_where(mut self, where_clause: &str) -> Self {
        self.where_clause = Some(where_clause.to_string());
        self
    }

    pub fn with_sort(mut self, sort: &str) -> Self {
        self.sort = Some(sort.to_string());
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_custom_conditions(mut self, conditions: Vec<Filter>) -> Self {
        self.custom_conditions = conditions;
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_sorts(mut self, sorts: Vec<Sort>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn with_pks(mut self, pks: Vec<String>) -> Self {
        self.pks = pks;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = Some(strictness);
        self
    }

    pub fn with_formula_validation(mut self) -> Self {
        self.validate_formula = true;
        self
    }

    pub fn unpaginated(mut self) -> Self {
        self.ignore_pagination = true;
        self
    }

    pub fn ignoring_view(mut self) -> Self {
        self.ignore_view_filter_sort = true;
        self
    }

    pub fn without_order_column(mut self) -> Self {
        self.skip_order_column = true;
        self
    }
}

/// One requested aggregation; the result is keyed by `column_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationRequest {
    pub column_id: String,
    #[serde(default)]
    pub aggregation: Aggregation,
}

impl AggregationRequest {
    pub fn new(column_id: &str, aggregation: Aggregation) -> Self {
        Self {
            column_id: column_id.to_string(),
            aggregation,
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Metadata snapshot for one request.
struct Loaded {
    catalog: Catalog,
    view: Option<View>,
    users: Vec<BaseUser>,
}

impl Loaded {
    fn model(&self, model_id: &str) -> QueryResult<&Model> {
        self.catalog
            .model(model_id)
            .ok_or_else(|| QueryError::Metadata(format!("model '{model_id}' not found")))
    }
}

/// Compiles and runs list and aggregate requests.
///
/// # Example
///
/// ```ignore
/// let store = InMemoryStore::from_file("catalog.json")?;
/// let lists = Orchestrator::new(store, Settings::default());
/// let db = SqliteExecutor::open("data.db")?;
/// let rows = lists.list(&ListRequest::new("md_orders"), &db).await?;
/// ```
pub struct Orchestrator<S> {
    store: S,
    settings: Settings,
    formula: Box<dyn FormulaCompiler>,
    types: TypeRegistry,
}

impl<S: MetadataStore> Orchestrator<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        Self {
            store,
            settings,
            formula: Box::new(DefaultFormulaCompiler),
            types: TypeRegistry::standard(),
        }
    }

    pub fn with_formula_compiler(mut self, formula: impl FormulaCompiler + 'static) -> Self {
        self.formula = Box::new(formula);
        self
    }

    pub fn with_type_registry(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compile a list request to SQL in the configured dialect.
    pub async fn list_query(&self, request: &ListRequest) -> QueryResult<String> {
        let loaded = self.load(request).await?;
        let dialect = self.settings.compile.dialect;
        let plan = self.compile_list(&loaded, request, dialect, request.validate_formula)?;
        Ok(plan.query.to_sql(dialect))
    }

    /// Run a list request.
    ///
    /// A failure on a model with formula columns is retried once with formula
    /// validation, so the caller sees the formula error rather than a driver
    /// error. Every other failure is returned as is.
    pub async fn list(
        &self,
        request: &ListRequest,
        executor: &dyn QueryExecutor,
    ) -> QueryResult<Vec<Row>> {
        let request_id = Uuid::new_v4();
        info!(%request_id, model_id = %request.model_id, "list request started");

        let result = self.list_with_retry(request_id, request, executor).await;
        match &result {
            Ok(rows) => info!(%request_id, rows = rows.len(), "list request finished"),
            Err(err) => info!(%request_id, error = %err, "list request failed"),
        }
        result
    }

    async fn list_with_retry(
        &self,
        request_id: Uuid,
        request: &ListRequest,
        executor: &dyn QueryExecutor,
    ) -> QueryResult<Vec<Row>> {
        let loaded = self.load(request).await?;

        let first = self
            .attempt(&loaded, request, executor, request.validate_formula)
            .await;
        let err = match first {
            Ok(rows) => return Ok(rows),
            Err(err) => err,
        };
        if !self.should_retry(&loaded, request)? {
            return Err(err);
        }

        warn!(%request_id, error = %err, "list failed, retrying with formula validation");
        let retry = self.attempt(&loaded, request, executor, true).await;
        if let Err(err) = &retry {
            error!(%request_id, error = %err, "list retry with formula validation failed");
        }
        retry
    }

    async fn attempt(
        &self,
        loaded: &Loaded,
        request: &ListRequest,
        executor: &dyn QueryExecutor,
        validate_formula: bool,
    ) -> QueryResult<Vec<Row>> {
        let dialect = executor.dialect();
        let plan = self.compile_list(loaded, request, dialect, validate_formula)?;
        let sql = plan.query.to_sql(dialect);
        debug!(%sql, validate_formula, "executing list query");

        let model = loaded.model(&request.model_id)?;
        let prototype = Arc::new(plan.prototype);
        let rows = executor.fetch_rows(&sql).await?;
        Ok(rows
            .into_iter()
            .map(|values| Row::new(self.display_values(model, values), Arc::clone(&prototype)))
            .collect())
    }

    /// Stored values of physical columns to their display form.
    fn display_values(&self, model: &Model, mut values: RawRow) -> RawRow {
        for column in model.columns.iter().filter(|c| !c.uidt.is_virtual()) {
            if let Some(value) = values.get_mut(&column.title) {
                *value = self.types.parse_value(value, column);
            }
        }
        values
    }

    fn should_retry(&self, loaded: &Loaded, request: &ListRequest) -> QueryResult<bool> {
        Ok(!request.validate_formula
            && self.settings.list.retry_with_formula_validation
            && loaded.model(&request.model_id)?.has_formula())
    }

    /// Compile an aggregate request to SQL in the configured dialect.
    ///
    /// `None` when nothing is to be computed.
    pub async fn aggregate_query(
        &self,
        request: &ListRequest,
        aggregations: &[AggregationRequest],
    ) -> QueryResult<Option<String>> {
        let loaded = self.load(request).await?;
        let dialect = self.settings.compile.dialect;
        let query = self.compile_aggregate(&loaded, request, aggregations, dialect)?;
        Ok(query.map(|q| q.to_sql(dialect)))
    }

    /// Run an aggregate request. The result maps column ids to values and is
    /// empty when nothing was requested.
    pub async fn aggregate(
        &self,
        request: &ListRequest,
        aggregations: &[AggregationRequest],
        executor: &dyn QueryExecutor,
    ) -> QueryResult<RawRow> {
        let loaded = self.load(request).await?;
        let dialect = executor.dialect();
        let Some(query) = self.compile_aggregate(&loaded, request, aggregations, dialect)? else {
            return Ok(RawRow::new());
        };

        let sql = query.to_sql(dialect);
        debug!(%sql, "executing aggregate query");
        let mut rows = executor.fetch_rows(&sql).await?;
        Ok(rows.pop().unwrap_or_default())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn load(&self, request: &ListRequest) -> QueryResult<Loaded> {
        let depth = self.settings.compile.max_relation_depth;
        let catalog = self.store.load_catalog(&request.model_id, depth).await?;
        catalog.validate(depth)?;

        let view = match request.view_id.as_deref() {
            Some(view_id) => Some(self.load_view(view_id, &request.model_id).await?),
            None => None,
        };
        let users = self.store.base_users().await?;

        Ok(Loaded {
            catalog,
            view,
            users,
        })
    }

    async fn load_view(&self, view_id: &str, model_id: &str) -> QueryResult<View> {
        let mut view = self
            .store
            .get_view(view_id)
            .await?
            .ok_or_else(|| QueryError::Metadata(format!("view '{view_id}' not found")))?;
        if view.fk_model_id != model_id {
            return Err(QueryError::Metadata(format!(
                "view '{view_id}' belongs to model '{}', not '{model_id}'",
                view.fk_model_id
            )));
        }
        view.filters = self.store.view_filters(view_id).await?;
        view.sorts = self.store.view_sorts(view_id).await?;
        Ok(view)
    }

    fn context<'a>(
        &'a self,
        loaded: &'a Loaded,
        dialect: Dialect,
        strictness: Strictness,
    ) -> CompileContext<'a> {
        CompileContext::new(&loaded.catalog)
            .with_dialect(dialect)
            .with_strictness(strictness)
            .with_max_depth(self.settings.compile.max_relation_depth)
            .with_formula_compiler(self.formula.as_ref())
            .with_users(&loaded.users)
            .with_type_registry(&self.types)
    }

    fn compile_list(
        &self,
        loaded: &Loaded,
        request: &ListRequest,
        dialect: Dialect,
        validate_formula: bool,
    ) -> QueryResult<ListPlan> {
        let model = loaded.model(&request.model_id)?;
        let strictness = request
            .strictness
            .unwrap_or(self.settings.compile.strictness);
        let mut ctx = self
            .context(loaded, dialect, strictness)
            .with_formula_validation(validate_formula);
        let inputs = PlanInputs {
            request,
            view: loaded.view.as_ref(),
            pagination: &self.settings.pagination,
        };
        build_list_query(model, &inputs, &mut ctx)
    }

    fn compile_aggregate(
        &self,
        loaded: &Loaded,
        request: &ListRequest,
        aggregations: &[AggregationRequest],
        dialect: Dialect,
    ) -> QueryResult<Option<crate::sql::Query>> {
        let model = loaded.model(&request.model_id)?;
        let strictness = request.strictness.unwrap_or(Strictness::Strict);
        let mut ctx = self
            .context(loaded, dialect, strictness)
            .with_formula_validation(request.validate_formula);
        let inputs = PlanInputs {
            request,
            view: loaded.view.as_ref(),
            pagination: &self.settings.pagination,
        };
        build_aggregate_query(model, &inputs, aggregations, &mut ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::testing::SHOP_JSON;
    use crate::meta::{Column, ColumnOptions, FormulaNode, FormulaOptions, InMemoryStore, UiType};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SHOP_SQL: &str = include_str!("../../tests/fixtures/shop.sql");

    fn store() -> InMemoryStore {
        InMemoryStore::from_json(SHOP_JSON).unwrap()
    }

    fn database() -> SqliteExecutor {
        let db = SqliteExecutor::in_memory().unwrap();
        db.execute_batch(SHOP_SQL).unwrap();
        db
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter()
            .map(|r| r.get("Id").and_then(|v| v.as_i64()).unwrap())
            .collect()
    }

    struct CountingExecutor {
        inner: SqliteExecutor,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueryExecutor for CountingExecutor {
        fn dialect(&self) -> Dialect {
            self.inner.dialect()
        }

        async fn fetch_rows(&self, sql: &str) -> QueryResult<Vec<RawRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_rows(sql).await
        }
    }

    #[tokio::test]
    async fn test_list_through_view() {
        let lists = Orchestrator::new(store(), Settings::default());
        let request = ListRequest::new("md_orders").with_view("vw_big");
        let rows = lists.list(&request, &database()).await.unwrap();

        assert_eq!(ids(&rows), vec![3, 2, 4]);
        assert_eq!(rows[0].get("Double"), Some(&json!(800.0)));
        assert_eq!(rows[0].get("Items Total"), Some(&json!(350.0)));
        assert_eq!(rows[2].get("Country"), Some(&json!("US")));
        assert!(rows[0].is_computed("Double"));
    }

    #[tokio::test]
    async fn test_has_many_lookup_is_split() {
        let lists = Orchestrator::new(store(), Settings::default());
        let request = ListRequest::new("md_orders").with_pks(vec!["1".into(), "2".into()]);
        let rows = lists.list(&request, &database()).await.unwrap();

        assert_eq!(ids(&rows), vec![1, 2]);
        let mut names: Vec<_> = rows[0].get("Item Names").unwrap().as_array().unwrap().clone();
        names.sort_by_key(|v| v.to_string());
        assert_eq!(names, vec![json!("ink"), json!("pen")]);
        assert_eq!(rows[1].get("Item Names"), Some(&json!(["shade"])));
    }

    #[tokio::test]
    async fn test_selected_fields_in_display_form() {
        let lists = Orchestrator::new(store(), Settings::default());
        let request = ListRequest::new("md_orders")
            .with_fields(vec!["Amount".into(), "paid".into(), "or_rating".into()])
            .with_pks(vec!["2".into()]);
        let rows = lists.list(&request, &database()).await.unwrap();

        assert_eq!(rows.len(), 1);
        let values = rows[0].values();
        assert_eq!(values.len(), 4);
        assert_eq!(values.get("Id"), Some(&json!(2)));
        assert_eq!(values.get("Amount"), Some(&json!(150)));
        assert_eq!(values.get("Paid"), Some(&json!(false)));
        assert_eq!(values.get("Rating"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn test_pagination_is_clamped() {
        let mut settings = Settings::default();
        settings.pagination.max_limit = 2;
        let lists = Orchestrator::new(store(), settings);
        let request = ListRequest::new("md_orders").with_limit(50).with_offset(1);
        let rows = lists.list(&request, &database()).await.unwrap();
        assert_eq!(ids(&rows), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_unknown_view_is_metadata_error() {
        let lists = Orchestrator::new(store(), Settings::default());
        let request = ListRequest::new("md_orders").with_view("vw_nope");
        let err = lists.list(&request, &database()).await.unwrap_err();
        assert!(matches!(err, QueryError::Metadata(msg) if msg.contains("vw_nope")));
    }

    fn store_with_bad_formula() -> InMemoryStore {
        let mut orders = store_model("md_orders");
        orders.columns.push(
            Column::new("or_bad", "Bad", "", UiType::Formula).with_options(
                ColumnOptions::Formula(FormulaOptions {
                    formula: FormulaNode::call("FOO", vec![FormulaNode::column("or_amount")]),
                }),
            ),
        );
        store().with_model(orders)
    }

    fn store_model(id: &str) -> Model {
        serde_json::from_str::<crate::meta::CatalogFile>(SHOP_JSON)
            .unwrap()
            .models
            .into_iter()
            .find(|m| m.id == id)
            .unwrap()
    }

    #[tokio::test]
    async fn test_formula_failure_retries_with_validation() {
        let lists = Orchestrator::new(store_with_bad_formula(), Settings::default());
        let db = CountingExecutor {
            inner: database(),
            calls: AtomicUsize::new(0),
        };

        let err = lists.list(&ListRequest::new("md_orders"), &db).await.unwrap_err();
        // the first attempt reaches the database, the retry fails in the compiler
        assert_eq!(db.calls.load(Ordering::SeqCst), 1);
        assert_eq!(err, QueryError::formula("or_bad", "unknown function 'FOO'"));
    }

    #[tokio::test]
    async fn test_retry_can_be_disabled() {
        let mut settings = Settings::default();
        settings.list.retry_with_formula_validation = false;
        let lists = Orchestrator::new(store_with_bad_formula(), settings);

        let err = lists
            .list(&ListRequest::new("md_orders"), &database())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Execution(msg) if msg.contains("FOO")));
    }

    #[tokio::test]
    async fn test_aggregate() {
        let lists = Orchestrator::new(store(), Settings::default());
        let request = ListRequest::new("md_orders");
        let aggregations = [
            AggregationRequest::new("or_title", Aggregation::CountUnique),
            AggregationRequest::new("or_amount", Aggregation::Sum),
            AggregationRequest::new("or_paid", Aggregation::Checked),
        ];
        let row = lists.aggregate(&request, &aggregations, &database()).await.unwrap();
        assert_eq!(row.get("or_title"), Some(&json!(3)));
        assert_eq!(row.get("or_amount"), Some(&json!(720.0)));
        assert_eq!(row.get("or_paid"), Some(&json!(3)));

        let none = [AggregationRequest::new("or_title", Aggregation::None)];
        assert!(lists.aggregate(&request, &none, &database()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_aggregate_is_strict_by_default() {
        let lists = Orchestrator::new(store(), Settings::default());
        let request = ListRequest::new("md_orders").with_view("vw_stale");
        let aggregations = [AggregationRequest::new("or_amount", Aggregation::Sum)];
        assert_eq!(
            lists.aggregate_query(&request, &aggregations).await,
            Err(QueryError::field_not_found("cl_deleted"))
        );

        // the list itself degrades instead
        let sql = lists.list_query(&request).await.unwrap();
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_request_serde() {
        let request: ListRequest = serde_json::from_value(json!({
            "model_id": "md_orders",
            "where": "(amount,gt,5)",
            "limit": 10,
            "strictness": "strict"
        }))
        .unwrap();
        assert_eq!(
            request,
            ListRequest::new("md_orders")
                .with_where("(amount,gt,5)")
                .with_limit(10)
                .with_strictness(Strictness::Strict)
        );
    }
}

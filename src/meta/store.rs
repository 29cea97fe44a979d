//! The metadata seam: where models, views and users come from.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::debug;

use super::catalog::Catalog;
use super::column::ColumnOptions;
use super::filter::Filter;
use super::model::{BaseUser, Model, View};
use super::sort::Sort;
use crate::error::{QueryError, QueryResult};

/// Read-only access to persisted metadata.
///
/// Implementations back onto whatever registry holds the metadata; the
/// compilers only ever see the [`Catalog`] snapshot produced by
/// [`MetadataStore::load_catalog`].
///
/// # Example
///
/// ```ignore
/// async fn example(store: &impl MetadataStore) -> QueryResult<()> {
///     let catalog = store.load_catalog("md_orders", 32).await?;
///     let filters = store.view_filters("vw_default").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_model(&self, model_id: &str) -> QueryResult<Option<Model>>;

    async fn get_view(&self, view_id: &str) -> QueryResult<Option<View>>;

    /// Root filters of a view.
    async fn view_filters(&self, view_id: &str) -> QueryResult<Vec<Filter>>;

    /// Sort list of a view, in precedence order.
    async fn view_sorts(&self, view_id: &str) -> QueryResult<Vec<Sort>>;

    async fn base_users(&self) -> QueryResult<Vec<BaseUser>>;

    // =========================================================================
    // Batch operations (default implementations using parallel fetches)
    // =========================================================================

    /// Load `model_id` and every model reachable from it through relation
    /// options, one relation hop per round, for at most `max_depth` rounds.
    ///
    /// Models referenced but absent from the store are left out; the relation
    /// resolver reports them when a query actually needs them.
    async fn load_catalog(&self, model_id: &str, max_depth: usize) -> QueryResult<Catalog> {
        let root = self
            .get_model(model_id)
            .await?
            .ok_or_else(|| QueryError::Metadata(format!("model '{model_id}' not found")))?;

        let mut catalog = Catalog::new();
        let mut frontier = related_model_ids(&root);
        catalog.insert(root);

        for _ in 0..max_depth {
            frontier.retain(|id| !catalog.contains_model(id));
            frontier.sort_unstable();
            frontier.dedup();
            if frontier.is_empty() {
                break;
            }

            let futures: Vec<_> = frontier.iter().map(|id| self.get_model(id)).collect();
            let results = futures::future::join_all(futures).await;

            let mut next = Vec::new();
            for (id, result) in frontier.iter().zip(results) {
                match result? {
                    Some(model) => {
                        next.extend(related_model_ids(&model));
                        catalog.insert(model);
                    }
                    None => debug!(model_id = %id, "related model not found in store"),
                }
            }
            frontier = next;
        }

        debug!(model_id, models = catalog.len(), "catalog loaded");
        Ok(catalog)
    }
}

/// Models a model's relation columns point at, junctions included.
fn related_model_ids(model: &Model) -> Vec<String> {
    let mut ids = Vec::new();
    for column in &model.columns {
        if let Some(ColumnOptions::Relation(rel)) = &column.col_options {
            ids.push(rel.fk_related_model_id.clone());
            if let Some(mm) = &rel.fk_mm_model_id {
                ids.push(mm.clone());
            }
        }
    }
    ids
}

// =============================================================================
// In-memory store
// =============================================================================

/// On-disk JSON layout read by [`InMemoryStore::from_file`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub base_users: Vec<BaseUser>,
}

/// A store holding everything in memory, loaded from a JSON catalog file or
/// assembled in code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    models: HashMap<String, Model>,
    views: HashMap<String, View>,
    users: Vec<BaseUser>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog_file(file: CatalogFile) -> Self {
        let mut store = Self::new();
        for model in file.models {
            store = store.with_model(model);
        }
        for view in file.views {
            store = store.with_view(view);
        }
        store.with_users(file.base_users)
    }

    pub fn from_json(json: &str) -> QueryResult<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Ok(Self::from_catalog_file(file))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> QueryResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            QueryError::Metadata(format!("cannot read catalog '{}': {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn with_model(mut self, model: Model) -> Self {
        self.models.insert(model.id.clone(), model);
        self
    }

    pub fn with_view(mut self, view: View) -> Self {
        self.views.insert(view.id.clone(), view);
        self
    }

    pub fn with_users(mut self, users: Vec<BaseUser>) -> Self {
        self.users = users;
        self
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn get_model(&self, model_id: &str) -> QueryResult<Option<Model>> {
        Ok(self.models.get(model_id).cloned())
    }

    async fn get_view(&self, view_id: &str) -> QueryResult<Option<View>> {
        Ok(self.views.get(view_id).cloned())
    }

    async fn view_filters(&self, view_id: &str) -> QueryResult<Vec<Filter>> {
        Ok(self
            .views
            .get(view_id)
            .map(|v| v.filters.clone())
            .unwrap_or_default())
    }

    async fn view_sorts(&self, view_id: &str) -> QueryResult<Vec<Sort>> {
        Ok(self
            .views
            .get(view_id)
            .map(|v| v.sorts.clone())
            .unwrap_or_default())
    }

    async fn base_users(&self) -> QueryResult<Vec<BaseUser>> {
        Ok(self.users.clone())
    }
}

// =============================================================================
// Per-request cache
// =============================================================================

/// Memoizes another store for the lifetime of one request.
///
/// Create one per request and drop it afterwards; it never invalidates.
pub struct CachedStore<S> {
    inner: S,
    models: DashMap<String, Option<Model>>,
    views: DashMap<String, Option<View>>,
    users: OnceCell<Vec<BaseUser>>,
}

impl<S: MetadataStore> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            models: DashMap::new(),
            views: DashMap::new(),
            users: OnceCell::new(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cached_models(&self) -> usize {
        self.models.len()
    }
}

#[async_trait]
impl<S: MetadataStore> MetadataStore for CachedStore<S> {
    async fn get_model(&self, model_id: &str) -> QueryResult<Option<Model>> {
        if let Some(hit) = self.models.get(model_id) {
            return Ok(hit.value().clone());
        }
        let model = self.inner.get_model(model_id).await?;
        self.models.insert(model_id.to_string(), model.clone());
        Ok(model)
    }

    async fn get_view(&self, view_id: &str) -> QueryResult<Option<View>> {
        if let Some(hit) = self.views.get(view_id) {
            return Ok(hit.value().clone());
        }
        let view = self.inner.get_view(view_id).await?;
        self.views.insert(view_id.to_string(), view.clone());
        Ok(view)
    }

    async fn view_filters(&self, view_id: &str) -> QueryResult<Vec<Filter>> {
        Ok(self
            .get_view(view_id)
            .await?
            .map(|v| v.filters)
            .unwrap_or_default())
    }

    async fn view_sorts(&self, view_id: &str) -> QueryResult<Vec<Sort>> {
        Ok(self
            .get_view(view_id)
            .await?
            .map(|v| v.sorts)
            .unwrap_or_default())
    }

    async fn base_users(&self) -> QueryResult<Vec<BaseUser>> {
        self.users
            .get_or_try_init(|| self.inner.base_users())
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::column::{Column, RelationOptions, RelationType};
    use crate::meta::uitype::UiType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn relation(id: &str, rt: RelationType, related: &str, mm: Option<&str>) -> Column {
        Column::new(id, id, "", UiType::LinkToAnotherRecord).with_options(ColumnOptions::Relation(
            RelationOptions {
                relation_type: rt,
                fk_child_column_id: "x".into(),
                fk_parent_column_id: "y".into(),
                fk_related_model_id: related.into(),
                fk_mm_model_id: mm.map(String::from),
                fk_mm_child_column_id: None,
                fk_mm_parent_column_id: None,
            },
        ))
    }

    fn store() -> InMemoryStore {
        InMemoryStore::new()
            .with_model(
                Model::new("orders", "orders")
                    .with_column(relation("r1", RelationType::BelongsTo, "customers", None))
                    .with_column(relation("r2", RelationType::ManyToMany, "tags", Some("order_tags"))),
            )
            .with_model(
                Model::new("customers", "customers")
                    .with_column(relation("r3", RelationType::BelongsTo, "regions", None)),
            )
            .with_model(Model::new("tags", "tags"))
            .with_model(Model::new("order_tags", "order_tags"))
            .with_model(Model::new("regions", "regions"))
            .with_model(Model::new("unrelated", "unrelated"))
    }

    #[tokio::test]
    async fn test_load_catalog_walks_relations() {
        let catalog = store().load_catalog("orders", 32).await.unwrap();
        assert_eq!(catalog.len(), 5);
        assert!(catalog.contains_model("regions"));
        assert!(catalog.contains_model("order_tags"));
        assert!(!catalog.contains_model("unrelated"));
    }

    #[tokio::test]
    async fn test_load_catalog_respects_depth() {
        let catalog = store().load_catalog("orders", 1).await.unwrap();
        assert!(catalog.contains_model("customers"));
        assert!(!catalog.contains_model("regions"));
    }

    #[tokio::test]
    async fn test_load_catalog_missing_root() {
        let err = store().load_catalog("nope", 32).await.unwrap_err();
        assert!(matches!(err, QueryError::Metadata(_)));
    }

    #[tokio::test]
    async fn test_from_json() {
        let store = InMemoryStore::from_json(
            r#"{"models":[{"id":"m","table_name":"t","columns":[]}],
                "views":[{"id":"v","fk_model_id":"m","sorts":[{"fk_column_id":"c","direction":"desc"}]}]}"#,
        )
        .unwrap();
        assert!(store.get_model("m").await.unwrap().is_some());
        assert_eq!(store.view_sorts("v").await.unwrap().len(), 1);
        assert!(store.view_filters("missing").await.unwrap().is_empty());
    }

    struct CountingStore {
        inner: InMemoryStore,
        model_calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataStore for CountingStore {
        async fn get_model(&self, model_id: &str) -> QueryResult<Option<Model>> {
            self.model_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_model(model_id).await
        }
        async fn get_view(&self, view_id: &str) -> QueryResult<Option<View>> {
            self.inner.get_view(view_id).await
        }
        async fn view_filters(&self, view_id: &str) -> QueryResult<Vec<Filter>> {
            self.inner.view_filters(view_id).await
        }
        async fn view_sorts(&self, view_id: &str) -> QueryResult<Vec<Sort>> {
            self.inner.view_sorts(view_id).await
        }
        async fn base_users(&self) -> QueryResult<Vec<BaseUser>> {
            self.inner.base_users().await
        }
    }

    #[tokio::test]
    async fn test_cached_store_memoizes() {
        let cached = CachedStore::new(CountingStore {
            inner: store(),
            model_calls: AtomicUsize::new(0),
        });
        cached.load_catalog("orders", 32).await.unwrap();
        let first = cached.inner().model_calls.load(Ordering::SeqCst);
        cached.load_catalog("orders", 32).await.unwrap();
        assert_eq!(cached.inner().model_calls.load(Ordering::SeqCst), first);
        assert_eq!(cached.cached_models(), 5);
    }
}

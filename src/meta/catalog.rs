//! An immutable snapshot of every model reachable from the model under query.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::column::{Column, ColumnOptions};
use super::model::Model;
use crate::error::{QueryError, QueryResult};

/// Models keyed by id, with a column-id index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    models: HashMap<String, Model>,
    /// column id → owning model id
    column_index: HashMap<String, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_models(models: impl IntoIterator<Item = Model>) -> Self {
        let mut catalog = Self::new();
        for model in models {
            catalog.insert(model);
        }
        catalog
    }

    pub fn insert(&mut self, model: Model) {
        for column in &model.columns {
            self.column_index.insert(column.id.clone(), model.id.clone());
        }
        self.models.insert(model.id.clone(), model);
    }

    pub fn contains_model(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn model(&self, id: &str) -> Option<&Model> {
        self.models.get(id)
    }

    /// A column and the model it belongs to.
    pub fn column(&self, id: &str) -> Option<(&Model, &Column)> {
        let model = self.models.get(self.column_index.get(id)?)?;
        Some((model, model.column(id)?))
    }

    /// A model required by relation metadata of `column`.
    pub fn require_model(&self, id: &str, column: &Column) -> QueryResult<&Model> {
        self.model(id)
            .ok_or_else(|| QueryError::unresolvable(&column.id, format!("model '{id}' is missing")))
    }

    /// A column referenced by relation metadata of `column`.
    pub fn require_column(&self, id: &str, column: &Column) -> QueryResult<(&Model, &Column)> {
        self.column(id).ok_or_else(|| {
            QueryError::unresolvable(&column.id, format!("referenced column '{id}' is missing"))
        })
    }

    /// Reject metadata whose virtual columns read through each other in a
    /// cycle (lookup of a lookup of itself, a formula over a rollup of that
    /// formula, ...). Such chains would never reach a physical column.
    pub fn validate(&self, max_depth: usize) -> QueryResult<()> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for model in self.models.values() {
            for column in &model.columns {
                let id = column.id.as_str();
                let from = *nodes.entry(id).or_insert_with(|| graph.add_node(id));
                for target in dependencies(column) {
                    let to = *nodes.entry(target).or_insert_with(|| graph.add_node(target));
                    graph.add_edge(from, to, ());
                }
            }
        }

        for component in tarjan_scc(&graph) {
            let cyclic = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&idx| graph.contains_edge(idx, idx));
            if cyclic {
                let mut ids: Vec<&str> = component.iter().map(|&idx| graph[idx]).collect();
                ids.sort_unstable();
                return Err(QueryError::DepthExceeded {
                    column: ids[0].to_string(),
                    max_depth,
                });
            }
        }
        Ok(())
    }
}

/// Columns a virtual column reads through.
fn dependencies(column: &Column) -> Vec<&str> {
    match &column.col_options {
        Some(ColumnOptions::Lookup(l)) => {
            vec![l.fk_relation_column_id.as_str(), l.fk_lookup_column_id.as_str()]
        }
        Some(ColumnOptions::Rollup(r)) => {
            vec![r.fk_relation_column_id.as_str(), r.fk_rollup_column_id.as_str()]
        }
        _ => column
            .formula()
            .map(|f| f.referenced_columns())
            .unwrap_or_default(),
    }
}

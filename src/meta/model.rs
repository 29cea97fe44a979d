//! Models (tables), views and base users.

use serde::{Deserialize, Serialize};

use super::column::Column;
use super::filter::Filter;
use super::sort::Sort;
use super::uitype::UiType;

/// A table and its ordered columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub table_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Model {
    pub fn new(id: &str, table_name: &str) -> Self {
        Self {
            id: id.into(),
            table_name: table_name.into(),
            title: table_name.into(),
            schema: None,
            columns: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Resolve a user-supplied field reference: title, then column name, then id.
    pub fn column_by_alias(&self, alias: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.title == alias)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|c| !c.column_name.is_empty() && c.column_name == alias)
            })
            .or_else(|| self.column(alias))
    }

    pub fn primary_keys(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.pk).collect()
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.pk)
    }

    /// The column shown when a row is referenced from elsewhere.
    ///
    /// Falls back to the first primary key when no column is flagged `pv`.
    pub fn display_column(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.pv)
            .or_else(|| self.primary_key())
    }

    pub fn auto_increment_pk(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.pk && c.ai)
    }

    pub fn created_time_column(&self) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.system && c.uidt == UiType::CreatedTime)
    }

    pub fn order_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.uidt == UiType::Order)
    }

    pub fn has_formula(&self) -> bool {
        self.columns.iter().any(|c| c.uidt == UiType::Formula)
    }
}

/// A saved grid configuration over a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: String,
    pub fk_model_id: String,
    #[serde(default)]
    pub title: String,
    /// Root filter list, combined like an `and` group.
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sorts: Vec<Sort>,
}

/// A user with access to the base, used for id → name substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl BaseUser {
    /// Display name, or the email when none is set.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.email,
        }
    }
}

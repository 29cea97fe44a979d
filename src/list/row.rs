//! Result rows tagged with the virtual columns they carry.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::sql::LOOKUP_SEPARATOR;

/// Which projected columns of a model were computed rather than read.
///
/// One prototype is built per compiled query and shared by all its rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayPrototype {
    pub model_id: String,
    /// Titles of formula, rollup, links and lookup values.
    pub computed: Vec<String>,
    /// Titles of lookups aggregated into a single string per row.
    pub aggregated: Vec<String>,
}

impl DisplayPrototype {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_computed(&self, title: &str) -> bool {
        self.computed.iter().any(|t| t == title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    #[serde(flatten)]
    values: Map<String, Value>,
    #[serde(skip)]
    prototype: Arc<DisplayPrototype>,
}

impl Row {
    /// Wrap raw driver output. Aggregated lookup strings are split back into
    /// arrays.
    pub fn new(mut values: Map<String, Value>, prototype: Arc<DisplayPrototype>) -> Self {
        for title in &prototype.aggregated {
            if let Some(value) = values.get_mut(title) {
                *value = split_aggregate(value.take());
            }
        }
        Self { values, prototype }
    }

    pub fn get(&self, title: &str) -> Option<&Value> {
        self.values.get(title)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn prototype(&self) -> &DisplayPrototype {
        &self.prototype
    }

    pub fn is_computed(&self, title: &str) -> bool {
        self.prototype.is_computed(title)
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.values)
    }
}

// JSON array text from json_agg/JSON_ARRAYAGG, or a separator-joined list.
fn split_aggregate(value: Value) -> Value {
    let Value::String(text) = value else {
        return value;
    };
    if text.starts_with('[') {
        if let Ok(array @ Value::Array(_)) = serde_json::from_str::<Value>(&text) {
            return array;
        }
    }
    Value::Array(
        text.split(LOOKUP_SEPARATOR)
            .map(|part| Value::String(part.to_string()))
            .collect(),
    )
}

//! Column metadata and the type-specific options attached to virtual columns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::formula::FormulaNode;
use super::uitype::UiType;

/// A column of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub title: String,
    /// Physical column name. Empty for purely virtual columns.
    #[serde(default)]
    pub column_name: String,
    pub uidt: UiType,
    /// Type-specific settings, either an object or its JSON-encoded string.
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub pk: bool,
    #[serde(default)]
    pub ai: bool,
    #[serde(default)]
    pub rqd: bool,
    #[serde(default)]
    pub system: bool,
    /// Primary display value of its model.
    #[serde(default)]
    pub pv: bool,
    #[serde(default, alias = "colOptions", skip_serializing_if = "Option::is_none")]
    pub col_options: Option<ColumnOptions>,
}

impl Column {
    pub fn new(id: &str, title: &str, column_name: &str, uidt: UiType) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            column_name: column_name.into(),
            uidt,
            meta: Value::Null,
            pk: false,
            ai: false,
            rqd: false,
            system: false,
            pv: false,
            col_options: None,
        }
    }

    /// Auto-increment primary key.
    pub fn primary_key(mut self) -> Self {
        self.pk = true;
        self.ai = true;
        self
    }

    pub fn display(mut self) -> Self {
        self.pv = true;
        self
    }

    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_options(mut self, options: ColumnOptions) -> Self {
        self.col_options = Some(options);
        self
    }

    /// Read one key of `meta`, decoding a string-encoded meta first.
    pub fn meta_value(&self, key: &str) -> Option<Value> {
        match &self.meta {
            Value::Object(map) => map.get(key).cloned(),
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .ok()
                .and_then(|v| v.get(key).cloned()),
            _ => None,
        }
    }

    pub fn meta_bool(&self, key: &str) -> bool {
        match self.meta_value(key) {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
            Some(Value::String(s)) => s == "true",
            _ => false,
        }
    }

    pub fn meta_i64(&self, key: &str) -> Option<i64> {
        match self.meta_value(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// LongText column holding an AI prompt result as `{"value": ...}` JSON.
    pub fn is_ai_prompt(&self) -> bool {
        self.uidt == UiType::LongText && self.meta_bool("ai")
    }

    pub fn relation(&self) -> Option<&RelationOptions> {
        match &self.col_options {
            Some(ColumnOptions::Relation(r)) => Some(r),
            _ => None,
        }
    }

    pub fn lookup(&self) -> Option<&LookupOptions> {
        match &self.col_options {
            Some(ColumnOptions::Lookup(l)) => Some(l),
            _ => None,
        }
    }

    pub fn rollup(&self) -> Option<&RollupOptions> {
        match &self.col_options {
            Some(ColumnOptions::Rollup(r)) => Some(r),
            _ => None,
        }
    }

    /// The formula tree of a Formula column or a URL Button.
    pub fn formula(&self) -> Option<&FormulaNode> {
        match &self.col_options {
            Some(ColumnOptions::Formula(f)) => Some(&f.formula),
            Some(ColumnOptions::Button(ButtonOptions {
                button_type: ButtonType::Url,
                formula: Some(formula),
            })) => Some(formula),
            _ => None,
        }
    }
}

/// Options attached to virtual columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnOptions {
    Relation(RelationOptions),
    Lookup(LookupOptions),
    Rollup(RollupOptions),
    Formula(FormulaOptions),
    Button(ButtonOptions),
}

/// Relation cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationType {
    #[serde(rename = "hm")]
    HasMany,
    #[serde(rename = "bt")]
    BelongsTo,
    #[serde(rename = "mm")]
    ManyToMany,
}

/// Options of a LinkToAnotherRecord / Links column.
///
/// Column placement per type, for a relation column on model `M` pointing at
/// model `R`:
///
/// | type | `fk_child_column_id` | `fk_parent_column_id` |
/// |------|----------------------|-----------------------|
/// | hm   | FK column in `R`     | key column in `M`     |
/// | bt   | FK column in `M`     | key column in `R`     |
/// | mm   | key column in `M`    | key column in `R`     |
///
/// For mm the junction model holds `fk_mm_child_column_id` (pointing at `M`)
/// and `fk_mm_parent_column_id` (pointing at `R`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationOptions {
    #[serde(rename = "type")]
    pub relation_type: RelationType,
    pub fk_child_column_id: String,
    pub fk_parent_column_id: String,
    pub fk_related_model_id: String,
    #[serde(default)]
    pub fk_mm_model_id: Option<String>,
    #[serde(default)]
    pub fk_mm_child_column_id: Option<String>,
    #[serde(default)]
    pub fk_mm_parent_column_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupOptions {
    pub fk_relation_column_id: String,
    pub fk_lookup_column_id: String,
}

/// Aggregate applied by a Rollup column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RollupFunction {
    Count,
    Min,
    Max,
    Avg,
    Sum,
    CountDistinct,
    SumDistinct,
    AvgDistinct,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupOptions {
    pub fk_relation_column_id: String,
    pub fk_rollup_column_id: String,
    pub rollup_function: RollupFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaOptions {
    pub formula: FormulaNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonType {
    Url,
    Webhook,
    Script,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonOptions {
    #[serde(rename = "type")]
    pub button_type: ButtonType,
    #[serde(default)]
    pub formula: Option<FormulaNode>,
}

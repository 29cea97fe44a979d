//! Compilers from grid metadata to SQL fragments.
//!
//! ```text
//!            ┌──────────────┐
//! Filter ───▶│  condition   │──┐
//!            └──────┬───────┘  │
//!                   ▼          │      ┌───────────┐
//!            ┌──────────────┐  ├─────▶│ sql::Expr │
//! Sort ─────▶│     sort     │──┤      └───────────┘
//!            └──────┬───────┘  │
//!                   ▼          │
//!            ┌──────────────┐  │
//!            │ value/lookup │──┘   relation: join plans for links and lookups
//!            │ rollup/formula│
//!            └──────────────┘
//! ```
//!
//! Every entry point takes a [`CompileContext`], which owns the alias counter
//! for that compilation.

pub mod aggregation;
pub mod condition;
mod context;
mod dates;
pub mod formula;
mod leaf;
mod lookup;
pub mod relation;
mod rollup;
pub mod sort;
mod user;
mod value;

pub use aggregation::{available_aggregations, compile_aggregation, validate, Aggregation};
pub use condition::{compile_filter, compile_filters, Predicate};
pub use context::{AliasCounter, CompileContext, Strictness, DEFAULT_MAX_DEPTH};
pub use formula::{DefaultFormulaCompiler, FormulaCompiler};
pub(crate) use lookup::lookup_projection;
pub use relation::{resolve_join, JoinPlan};
pub use sort::{compile_sort, compile_sorts};
pub use value::column_value;

use serde_json::Value;

use crate::meta::Column;
use crate::sql::{lit_bool, lit_float, lit_int, lit_null, lit_str, table_col, Expr};

/// The physical column of `column` under `alias`.
pub(crate) fn field(alias: &str, column: &Column) -> Expr {
    let name = if column.column_name.is_empty() {
        &column.id
    } else {
        &column.column_name
    };
    table_col(alias, name)
}

/// A JSON value as a SQL literal. Arrays and objects become their JSON text.
pub(crate) fn literal(value: &Value) -> Expr {
    match value {
        Value::Null => lit_null(),
        Value::Bool(b) => lit_bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => lit_int(i),
            None => lit_float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => lit_str(s),
        other => lit_str(&other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::meta::{Catalog, CatalogFile, Model};

    pub const SHOP_JSON: &str = include_str!("../../tests/fixtures/shop.json");

    pub fn shop_file() -> CatalogFile {
        serde_json::from_str(SHOP_JSON).expect("fixture parses")
    }

    pub fn shop() -> Catalog {
        Catalog::from_models(shop_file().models)
    }

    pub fn orders(catalog: &Catalog) -> &Model {
        catalog.model("md_orders").expect("orders model")
    }
}

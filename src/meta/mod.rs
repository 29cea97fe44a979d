//! Read-only metadata snapshots consumed by the compilers.
//!
//! Everything here is loaded at the start of a request and never mutated
//! while a query is being compiled.

mod catalog;
mod column;
mod filter;
mod formula;
mod model;
mod sort;
mod store;
mod uitype;

pub use catalog::Catalog;
pub use column::{
    ButtonOptions, ButtonType, Column, ColumnOptions, FormulaOptions, LookupOptions,
    RelationOptions, RelationType, RollupFunction, RollupOptions,
};
pub use filter::{ComparisonOp, ComparisonSubOp, Filter, LogicalOp};
pub use formula::FormulaNode;
pub use model::{BaseUser, Model, View};
pub use sort::{Sort, SortDirection};
pub use store::{CachedStore, CatalogFile, InMemoryStore, MetadataStore};
pub use uitype::UiType;

//! # gridql
//!
//! Compiles grid metadata (virtual columns, view filters, view sorts) into
//! dialect-correct SELECT statements, and runs them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        MetadataStore (models, views, base users)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [load_catalog]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Catalog (read-only)                    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compile: conditions, sorts, aggregations]
//! ┌─────────────────────────────────────────────────────────┐
//! │             sql::Query (dialect-agnostic AST)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [list: QueryExecutor]
//! ┌─────────────────────────────────────────────────────────┐
//! │                        Rows                             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use gridql::prelude::*;
//!
//! let store = InMemoryStore::from_file("catalog.json")?;
//! let lists = Orchestrator::new(store, Settings::load()?);
//! let request = ListRequest::new("md_orders").with_where("(amount,gt,100)");
//! let sql = lists.list_query(&request).await?;
//! ```

pub mod compile;
pub mod config;
pub mod error;
pub mod list;
pub mod meta;
pub mod parse;
pub mod sql;
pub mod types;

pub use error::{QueryError, QueryResult};

/// The types most callers need.
pub mod prelude {
    pub use crate::compile::{Aggregation, CompileContext, Strictness};
    pub use crate::config::Settings;
    pub use crate::error::{QueryError, QueryResult};
    pub use crate::list::{
        AggregationRequest, ListRequest, Orchestrator, QueryExecutor, Row, SqliteExecutor,
    };
    pub use crate::meta::{
        CachedStore, Catalog, ComparisonOp, Filter, InMemoryStore, LogicalOp, MetadataStore,
        Sort,
    };
    pub use crate::sql::Dialect;
}

//! The execution seam between compiled SQL and a database driver.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::QueryResult;
use crate::sql::Dialect;

/// One result row as column label to JSON value.
pub type RawRow = Map<String, Value>;

/// Runs compiled SELECT statements.
///
/// The orchestrator awaits exactly one call per attempt; cancellation is the
/// caller's concern and should abort the underlying driver call.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// The SQL dialect this executor speaks.
    fn dialect(&self) -> Dialect;

    async fn fetch_rows(&self, sql: &str) -> QueryResult<Vec<RawRow>>;
}

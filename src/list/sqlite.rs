//! rusqlite-backed [`QueryExecutor`].

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::{Map, Number, Value};
use tracing::debug;

use super::executor::{QueryExecutor, RawRow};
use crate::error::{QueryError, QueryResult};
use crate::sql::Dialect;

/// Executes queries on a single SQLite connection.
///
/// Calls run on the blocking pool; the connection is shared behind a mutex,
/// so concurrent requests serialize on it.
#[derive(Clone)]
pub struct SqliteExecutor {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteExecutor {
    pub fn open<P: AsRef<Path>>(path: P) -> QueryResult<Self> {
        let conn = Connection::open(path).map_err(execution)?;
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> QueryResult<Self> {
        let conn = Connection::open_in_memory().map_err(execution)?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of statements, typically schema and seed data.
    pub fn execute_batch(&self, sql: &str) -> QueryResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(sql).map_err(execution)
    }

    fn lock(&self) -> QueryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| QueryError::Execution("sqlite connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_rows(&self, sql: &str) -> QueryResult<Vec<RawRow>> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();

        let rows = tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| QueryError::Execution("sqlite connection lock poisoned".to_string()))?;
            read_rows(&conn, &sql).map_err(execution)
        })
        .await
        .map_err(|e| QueryError::Execution(format!("sqlite task failed: {e}")))??;

        debug!(rows = rows.len(), "sqlite query finished");
        Ok(rows)
    }
}

fn read_rows(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<RawRow>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let rows = stmt.query_map([], |row| {
        let mut values = Map::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            values.insert(name.clone(), to_json(row.get_ref(i)?));
        }
        Ok(values)
    })?;
    rows.collect()
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            Value::String(String::from_utf8_lossy(t).into_owned())
        }
    }
}

fn execution(err: rusqlite::Error) -> QueryError {
    QueryError::Execution(err.to_string())
}

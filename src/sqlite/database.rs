/// Database (transaction unit)
///
/// Wraps one SQLite connection and its transaction state. `exec` and
/// `query` run inside the open transaction when there is one and in
/// autocommit mode otherwise; callers never need to know which.
use crate::core::error::lock_error;
use crate::core::{Result, SqlFrontError, Value};
use crate::registry::Named;
use crate::resultset::{ResultSet, Schema};
use rusqlite::{params_from_iter, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Represents database transaction states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No open transaction (autocommit mode)
    Idle,
    /// A transaction started by `begin` is open
    InTransaction,
}

impl Default for TransactionState {
    fn default() -> Self {
        TransactionState::Idle
    }
}

/// Where database files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Every database is a private in-memory SQLite database.
    Memory,
    /// Each database is `<dir>/<name>.db`.
    Directory(PathBuf),
}

impl StoreLocation {
    fn path_for(&self, name: &str) -> Result<Option<PathBuf>> {
        match self {
            StoreLocation::Memory => Ok(None),
            StoreLocation::Directory(dir) => {
                if name.is_empty() || name.contains(&['/', '\\'][..]) || name.starts_with('.') {
                    return Err(SqlFrontError::App(format!(
                        "invalid database name for file store: '{}'",
                        name
                    )));
                }
                Ok(Some(dir.join(format!("{}.db", name))))
            }
        }
    }
}

struct Inner {
    conn: Connection,
    state: TransactionState,
}

impl Inner {
    /// Re-reads the transaction state from SQLite, which may have rolled
    /// back on its own after an error.
    fn sync_state(&mut self) {
        if self.conn.is_autocommit() {
            self.state = TransactionState::Idle;
        }
    }
}

pub struct Database {
    name: String,
    path: Option<PathBuf>,
    inner: Mutex<Inner>,
}

impl Database {
    /// Opens a database in the given store.
    ///
    /// # Arguments
    ///
    /// * `name` - Database name, case-sensitive
    /// * `location` - In-memory or a directory of database files
    ///
    /// # Returns
    ///
    /// The opened database, or `Storage` if SQLite cannot open it.
    pub fn open(name: &str, location: &StoreLocation) -> Result<Self> {
        let path = location.path_for(name)?;
        let conn = match &path {
            Some(p) => Connection::open(p)?,
            None => Connection::open_in_memory()?,
        };
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        debug!(database = %name, path = ?path, "database opened");
        Ok(Database {
            name: name.to_string(),
            path,
            inner: Mutex::new(Inner {
                conn,
                state: TransactionState::Idle,
            }),
        })
    }

    pub fn open_in_memory(name: &str) -> Result<Self> {
        Database::open(name, &StoreLocation::Memory)
    }

    /// File backing this database, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.inner
            .lock()
            .map(|g| g.state)
            .unwrap_or(TransactionState::Idle)
    }

    /// Starts a transaction.
    ///
    /// A transaction that is still open is rolled back first: the last
    /// `begin` wins and there are no nested transactions.
    pub fn begin(&self) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_error("database"))?;
        inner.sync_state();
        if inner.state == TransactionState::InTransaction {
            warn!(database = %self.name, "begin while a transaction is open, rolling back the previous one");
            inner.conn.execute_batch("ROLLBACK")?;
            inner.state = TransactionState::Idle;
        }
        inner.conn.execute_batch("BEGIN")?;
        inner.state = TransactionState::InTransaction;
        Ok(())
    }

    /// Commits the open transaction; a no-op when idle.
    pub fn commit(&self) -> Result<()> {
        self.finish("COMMIT")
    }

    /// Rolls back the open transaction; a no-op when idle.
    pub fn rollback(&self) -> Result<()> {
        self.finish("ROLLBACK")
    }

    fn finish(&self, command: &str) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_error("database"))?;
        inner.sync_state();
        if inner.state == TransactionState::Idle {
            return Ok(());
        }
        let result = inner.conn.execute_batch(command);
        inner.sync_state();
        result?;
        inner.state = TransactionState::Idle;
        Ok(())
    }

    /// Runs a statement that returns no rows.
    ///
    /// # Returns
    ///
    /// The number of rows the statement changed.
    pub fn exec(&self, sql: &str) -> Result<usize> {
        self.exec_with_params(sql, &[])
    }

    /// Runs a statement with positional parameters.
    pub fn exec_with_params(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let mut inner = self.inner.lock().map_err(|_| lock_error("database"))?;
        debug!(database = %self.name, sql = %sql, "exec");
        let result = inner.conn.execute(sql, params_from_iter(params.iter()));
        inner.sync_state();
        Ok(result?)
    }

    /// Runs a query and returns its rows.
    ///
    /// Rows are fetched while the connection lock is held; the returned
    /// result set owns them and does not borrow the connection.
    pub fn query(&self, sql: &str) -> Result<ResultSet> {
        let mut inner = self.inner.lock().map_err(|_| lock_error("database"))?;
        debug!(database = %self.name, sql = %sql, "query");
        let result = Self::fetch(&inner.conn, sql);
        inner.sync_state();
        let (schema, rows) = result?;
        Ok(ResultSet::from_rows(schema, rows))
    }

    fn fetch(conn: &Connection, sql: &str) -> Result<(Schema, Vec<Vec<Value>>)> {
        let mut stmt = conn.prepare(sql)?;
        let schema = Schema::infer(
            stmt.columns()
                .iter()
                .map(|c| (c.name().to_string(), c.decl_type().map(|d| d.to_string()))),
        )?;
        let width = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut raw_rows = Vec::new();
        while let Some(row) = rows.next()? {
            let raw = (0..width)
                .map(|i| row.get_ref(i).map(Value::from))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raw_rows.push(raw);
        }
        Ok((schema, raw_rows))
    }

    /// True if a table with this name exists.
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        let inner = self.inner.lock().map_err(|_| lock_error("database"))?;
        let count: i64 = inner.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Column names and declared types of a table, in declaration order.
    pub fn table_columns(&self, table: &str) -> Result<Vec<(String, String)>> {
        let inner = self.inner.lock().map_err(|_| lock_error("database"))?;
        let mut stmt = inner
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if columns.is_empty() {
            return Err(SqlFrontError::TableNotExist(table.to_string()));
        }
        Ok(columns)
    }
}

impl Named for Database {
    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("state", &self.transaction_state())
            .finish()
    }
}

/// Quotes an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

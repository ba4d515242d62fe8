/// # Test Utilities Module
///
/// Fixtures shared by the unit and integration tests: sessions over each
/// backend, helpers that run SQL scripts and collect rows, and an
/// assertion macro for `SqlFrontError` variants.
use crate::core::{Result, Value};
use crate::executor::{Response, StatementExecutor};
use crate::memstore::MemStore;
use crate::query::Dialect;
use crate::session::Session;
use crate::sqlite::SqliteExecutor;
use std::sync::Arc;

/// Every backend, by name, each freshly created.
pub fn backends() -> Vec<(&'static str, Arc<dyn StatementExecutor>)> {
    vec![
        ("sqlite", Arc::new(SqliteExecutor::in_memory())),
        ("memstore", Arc::new(MemStore::new())),
    ]
}

/// A MySQL-dialect session over a fresh backend.
pub fn session_over(executor: Arc<dyn StatementExecutor>) -> Session {
    Session::new(executor, Dialect::MySql)
}

/// A session with database `shop` selected and `users (id, name)` created.
pub fn users_fixture(executor: Arc<dyn StatementExecutor>) -> Result<Session> {
    let mut session = session_over(executor);
    run_script(
        &mut session,
        &[
            "CREATE DATABASE shop",
            "CREATE TABLE users (id INTEGER, name TEXT)",
        ],
    )?;
    Ok(session)
}

/// Runs each statement in order, stopping at the first failure.
pub fn run_script(session: &mut Session, script: &[&str]) -> Result<Vec<Response>> {
    let mut responses = Vec::new();
    for sql in script {
        responses.extend(session.execute(sql)?);
    }
    Ok(responses)
}

/// Runs one query and returns its rows as plain values.
pub fn query_values(session: &mut Session, sql: &str) -> Result<Vec<Vec<Value>>> {
    let mut responses = session.execute(sql)?;
    let response = responses.pop().ok_or_else(|| {
        crate::core::SqlFrontError::App(format!("no statement in '{}'", sql))
    })?;
    let mut rs = response
        .into_result_set()
        .ok_or_else(|| crate::core::SqlFrontError::App(format!("'{}' returned no rows", sql)))?;
    Ok(rs.rows()?.into_iter().map(|r| r.into_values()).collect())
}

/// Affected-row count of a single mutation.
pub fn affected(session: &mut Session, sql: &str) -> Result<u64> {
    Ok(session.execute(sql)?.iter().map(|r| r.rows_affected()).sum())
}

#[macro_export]
macro_rules! assert_sqlfront_error {
    ($result:expr, $expected_type:ident, $context:expr) => {
        match $result {
            Err($crate::core::SqlFrontError::$expected_type { .. }) => {}
            Ok(_) => panic!("Expected {} error but got Ok in {}", stringify!($expected_type), $context),
            Err(other) => panic!("Expected {} but got {:?} in {}", stringify!($expected_type), other, $context),
        }
    };
}

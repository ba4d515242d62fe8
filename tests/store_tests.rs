//! File-backed SQLite store tests

use sqlfront::config::{load_config, StoreEngine};
use sqlfront::core::{SqlFrontError, Value};
use sqlfront::query::Dialect;
use sqlfront::server::build_executor;
use sqlfront::session::Session;
use sqlfront::sqlite::{SqliteExecutor, StoreLocation, TransactionState};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn file_session(dir: &TempDir) -> Session {
    let executor = SqliteExecutor::new(StoreLocation::Directory(dir.path().to_path_buf()));
    Session::new(Arc::new(executor), Dialect::MySql)
}

#[test]
fn test_database_file_lifecycle() {
    let dir = TempDir::new().unwrap();
    let mut session = file_session(&dir);
    session
        .execute("CREATE DATABASE shop; CREATE TABLE items (id INTEGER, label TEXT)")
        .unwrap();
    let path = dir.path().join("shop.db");
    assert!(path.exists());

    session.execute("DROP DATABASE shop").unwrap();
    assert!(!path.exists());
}

#[test]
fn test_rows_survive_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let mut session = file_session(&dir);
        session
            .execute(
                "CREATE DATABASE shop; CREATE TABLE items (id INTEGER, label TEXT); \
                 INSERT INTO items VALUES (1, 'pen')",
            )
            .unwrap();
    }

    let mut session = file_session(&dir);
    session.execute("CREATE DATABASE shop").unwrap();
    let mut responses = session.execute("SELECT label FROM items").unwrap();
    let mut rs = responses.pop().unwrap().into_result_set().unwrap();
    let rows = rs.rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("label"), Some(&Value::Text("pen".into())));
}

#[test]
fn test_transactions_on_file_store() {
    let dir = TempDir::new().unwrap();
    let executor = Arc::new(SqliteExecutor::new(StoreLocation::Directory(
        dir.path().to_path_buf(),
    )));
    let mut session = Session::new(executor.clone(), Dialect::PostgreSql);
    session
        .execute("CREATE DATABASE bank; CREATE TABLE acct (id INTEGER, balance INTEGER)")
        .unwrap();

    session.execute("BEGIN").unwrap();
    session.execute("INSERT INTO acct VALUES (1, 10)").unwrap();
    let db = executor.databases().lookup("bank").unwrap();
    assert_eq!(db.transaction_state(), TransactionState::InTransaction);
    session.execute("ROLLBACK").unwrap();
    assert_eq!(db.transaction_state(), TransactionState::Idle);

    let mut responses = session.execute("SELECT * FROM acct").unwrap();
    let mut rs = responses.pop().unwrap().into_result_set().unwrap();
    assert!(rs.rows().unwrap().is_empty());
}

#[test]
fn test_invalid_file_store_name() {
    let dir = TempDir::new().unwrap();
    let mut session = file_session(&dir);
    let err = session.execute("CREATE DATABASE `../escape`").unwrap_err();
    assert!(matches!(err, SqlFrontError::App(_)));
}

#[test]
fn test_executor_from_config_file() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    let config_path = dir.path().join("sqlfront.toml");
    fs::write(
        &config_path,
        format!(
            "[store]\nengine = \"sqlite\"\n\n[store.sqlite]\nmemory = false\npath = {:?}\n",
            data.to_string_lossy()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    assert_eq!(config.store.engine, StoreEngine::Sqlite);
    let executor = build_executor(&config.store).unwrap();
    assert!(data.is_dir());

    let mut session = Session::new(executor, Dialect::MySql);
    session.execute("CREATE DATABASE cfg").unwrap();
    assert!(data.join("cfg.db").exists());
}

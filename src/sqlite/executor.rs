/// SQLite statement executor
///
/// Routes every statement variant to a registered `Database`. Statements
/// are executed from their SQL text, so anything SQLite understands works
/// here; catalog conditions are checked up front to report the same
/// errors as the in-memory store.
use super::database::{quote_ident, Database, StoreLocation};
use crate::conn::ConnContext;
use crate::core::{DataType, Result, SqlFrontError, Value};
use crate::executor::{current_database, Response, StatementExecutor};
use crate::query::{
    AlterTable, CopyData, CopyFrom, CreateDatabase, CreateTable, Delete, DropDatabase, DropTable,
    Insert, Select, Update,
};
use crate::registry::Registry;
use crate::resultset::{Column, ResultSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Translates SQLite catalog failures into the shared taxonomy.
fn classify(err: SqlFrontError) -> SqlFrontError {
    if let SqlFrontError::Storage(rusqlite::Error::SqliteFailure(_, Some(msg))) = &err {
        if let Some(table) = msg.strip_prefix("no such table: ") {
            return SqlFrontError::TableNotExist(table.to_string());
        }
        if let Some(column) = msg.strip_prefix("no such column: ") {
            return SqlFrontError::ColumnNotExist(column.to_string());
        }
    }
    err
}

#[derive(Debug)]
pub struct SqliteExecutor {
    databases: Registry<Database>,
    location: StoreLocation,
}

impl SqliteExecutor {
    pub fn new(location: StoreLocation) -> Self {
        SqliteExecutor {
            databases: Registry::new(),
            location,
        }
    }

    pub fn in_memory() -> Self {
        SqliteExecutor::new(StoreLocation::Memory)
    }

    pub fn databases(&self) -> &Registry<Database> {
        &self.databases
    }

    fn database(&self, ctx: &ConnContext) -> Result<Arc<Database>> {
        self.databases.lookup(current_database(ctx)?)
    }

    fn copy_rows(
        &self,
        db: &Database,
        table: &str,
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<u64> {
        let columns = if columns.is_empty() {
            db.table_columns(table)?.into_iter().map(|(name, _)| name).collect()
        } else {
            columns.to_vec()
        };
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            placeholders.join(", ")
        );
        let mut inserted = 0u64;
        for row in rows {
            if row.len() != columns.len() {
                return Err(SqlFrontError::Conversion(format!(
                    "COPY row has {} fields, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            let params: Vec<Value> = row
                .iter()
                .map(|f| f.clone().map(Value::Text).unwrap_or(Value::Null))
                .collect();
            inserted += db.exec_with_params(&sql, &params).map_err(classify)? as u64;
        }
        Ok(inserted)
    }
}

impl Default for SqliteExecutor {
    fn default() -> Self {
        SqliteExecutor::in_memory()
    }
}

impl StatementExecutor for SqliteExecutor {
    fn begin(&self, ctx: &mut ConnContext) -> Result<()> {
        self.database(ctx)?.begin()
    }

    fn commit(&self, ctx: &mut ConnContext) -> Result<()> {
        self.database(ctx)?.commit()
    }

    fn rollback(&self, ctx: &mut ConnContext) -> Result<()> {
        self.database(ctx)?.rollback()
    }

    fn create_database(&self, ctx: &mut ConnContext, stmt: &CreateDatabase) -> Result<()> {
        if self.databases.contains(&stmt.name) {
            if stmt.if_not_exists {
                return Ok(());
            }
            return Err(SqlFrontError::DatabaseExists(stmt.name.clone()));
        }
        let db = Database::open(&stmt.name, &self.location)?;
        match self.databases.add(db) {
            Ok(_) => {}
            Err(SqlFrontError::DatabaseExists(_)) if stmt.if_not_exists => return Ok(()),
            Err(e) => return Err(e),
        }
        info!(database = %stmt.name, "database created");
        ctx.set_database(&stmt.name);
        Ok(())
    }

    fn database_names(&self) -> Result<Vec<String>> {
        self.databases.names()
    }

    fn drop_database(&self, ctx: &mut ConnContext, stmt: &DropDatabase) -> Result<()> {
        let db = match self.databases.lookup(&stmt.name) {
            Ok(db) => db,
            Err(_) if stmt.if_exists => return Ok(()),
            Err(e) => return Err(e),
        };
        self.databases.drop(&stmt.name)?;
        if ctx.database() == Some(stmt.name.as_str()) {
            ctx.clear_database();
        }
        let path = db.path().map(|p| p.to_path_buf());
        drop(db);
        if let Some(path) = path {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), "could not remove database file: {}", e);
                    return Err(SqlFrontError::Deletion(format!("database file {}", path.display())));
                }
            }
        }
        info!(database = %stmt.name, "database dropped");
        Ok(())
    }

    fn create_table(&self, ctx: &mut ConnContext, stmt: &CreateTable) -> Result<()> {
        let db = self.database(ctx)?;
        if db.table_exists(&stmt.name)? {
            if stmt.if_not_exists {
                return Ok(());
            }
            return Err(SqlFrontError::TableExists(stmt.name.clone()));
        }
        db.exec(&stmt.to_string()).map(|_| ()).map_err(classify)
    }

    fn alter_table(&self, ctx: &mut ConnContext, stmt: &AlterTable) -> Result<()> {
        let db = self.database(ctx)?;
        if !db.table_exists(&stmt.name)? {
            return Err(SqlFrontError::TableNotExist(stmt.name.clone()));
        }
        db.exec(&stmt.to_string()).map(|_| ()).map_err(classify)
    }

    fn drop_table(&self, ctx: &mut ConnContext, stmt: &DropTable) -> Result<()> {
        let db = self.database(ctx)?;
        for name in &stmt.names {
            if !db.table_exists(name)? {
                if stmt.if_exists {
                    continue;
                }
                return Err(SqlFrontError::TableNotExist(name.clone()));
            }
            db.exec(&format!("DROP TABLE {}", quote_ident(name)))
                .map_err(|_| SqlFrontError::Deletion(format!("table {}", name)))?;
        }
        Ok(())
    }

    fn insert(&self, ctx: &mut ConnContext, stmt: &Insert) -> Result<ResultSet> {
        let n = self.database(ctx)?.exec(&stmt.to_string()).map_err(classify)?;
        Ok(ResultSet::from_rows_affected(n as u64))
    }

    fn update(&self, ctx: &mut ConnContext, stmt: &Update) -> Result<ResultSet> {
        let n = self.database(ctx)?.exec(&stmt.to_string()).map_err(classify)?;
        Ok(ResultSet::from_rows_affected(n as u64))
    }

    fn delete(&self, ctx: &mut ConnContext, stmt: &Delete) -> Result<ResultSet> {
        let n = self.database(ctx)?.exec(&stmt.to_string()).map_err(classify)?;
        Ok(ResultSet::from_rows_affected(n as u64))
    }

    fn select(&self, ctx: &mut ConnContext, stmt: &Select) -> Result<ResultSet> {
        self.database(ctx)?.query(&stmt.to_string()).map_err(classify)
    }

    fn copy(&self, ctx: &mut ConnContext, stmt: &CopyFrom) -> Result<Response> {
        let db = self.database(ctx)?;
        let declared = db.table_columns(&stmt.table)?;
        if !stmt.rows.is_empty() {
            let n = self.copy_rows(&db, &stmt.table, &stmt.columns, &stmt.rows)?;
            return Ok(Response::ResultSet(ResultSet::from_rows_affected(n)));
        }
        let columns = if stmt.columns.is_empty() {
            declared
                .iter()
                .map(|(name, ty)| Column::new(name, DataType::from_column_type(ty)))
                .collect()
        } else {
            stmt.columns
                .iter()
                .map(|wanted| {
                    declared
                        .iter()
                        .find(|(name, _)| name == wanted)
                        .map(|(name, ty)| Column::new(name, DataType::from_column_type(ty)))
                        .ok_or_else(|| SqlFrontError::ColumnNotExist(wanted.clone()))
                })
                .collect::<Result<Vec<_>>>()?
        };
        Ok(Response::CopyIn {
            table: stmt.table.clone(),
            columns,
        })
    }

    fn copy_data(&self, ctx: &mut ConnContext, stmt: &CopyData) -> Result<ResultSet> {
        let db = self.database(ctx)?;
        let n = self.copy_rows(&db, &stmt.table, &stmt.columns, &stmt.rows)?;
        Ok(ResultSet::from_rows_affected(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{parse_one, Dialect, Statement};

    fn run(exec: &SqliteExecutor, ctx: &mut ConnContext, sql: &str) -> Result<Response> {
        let stmt = parse_one(sql, Dialect::Generic)?;
        exec.execute(ctx, &stmt)
    }

    fn setup() -> (SqliteExecutor, ConnContext) {
        let exec = SqliteExecutor::in_memory();
        let mut ctx = ConnContext::new();
        run(&exec, &mut ctx, "CREATE DATABASE shop").unwrap();
        run(&exec, &mut ctx, "CREATE TABLE users (id INTEGER, name TEXT)").unwrap();
        (exec, ctx)
    }

    #[test]
    fn test_create_database_selects_it() {
        let (exec, ctx) = setup();
        assert_eq!(ctx.database(), Some("shop"));
        assert_eq!(exec.databases().names().unwrap(), vec!["shop"]);
    }

    #[test]
    fn test_create_database_twice() {
        let (exec, mut ctx) = setup();
        let err = run(&exec, &mut ctx, "CREATE DATABASE shop").unwrap_err();
        assert!(matches!(err, SqlFrontError::DatabaseExists(_)));
        run(&exec, &mut ctx, "CREATE DATABASE IF NOT EXISTS shop").unwrap();
    }

    #[test]
    fn test_drop_database() {
        let (exec, mut ctx) = setup();
        run(&exec, &mut ctx, "DROP DATABASE shop").unwrap();
        assert_eq!(ctx.database(), None);
        let err = run(&exec, &mut ctx, "DROP DATABASE shop").unwrap_err();
        assert!(matches!(err, SqlFrontError::DatabaseNotExist(_)));
        run(&exec, &mut ctx, "DROP DATABASE IF EXISTS shop").unwrap();
    }

    #[test]
    fn test_insert_update_select() {
        let (exec, mut ctx) = setup();
        let resp = run(&exec, &mut ctx, "INSERT INTO users VALUES (1, 'a'), (2, 'b')").unwrap();
        assert_eq!(resp.rows_affected(), 2);

        let resp = run(&exec, &mut ctx, "UPDATE users SET name = 'z' WHERE id = 2").unwrap();
        assert_eq!(resp.rows_affected(), 1);
        let resp = run(&exec, &mut ctx, "UPDATE users SET name = 'z' WHERE id = 9").unwrap();
        assert_eq!(resp.rows_affected(), 0);

        let mut rs = run(&exec, &mut ctx, "SELECT * FROM users ORDER BY id")
            .unwrap()
            .into_result_set()
            .unwrap();
        let rows = rs.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("name"), Some(&Value::Text("z".into())));
    }

    #[test]
    fn test_table_errors() {
        let (exec, mut ctx) = setup();
        let err = run(&exec, &mut ctx, "CREATE TABLE users (id INTEGER)").unwrap_err();
        assert!(matches!(err, SqlFrontError::TableExists(_)));

        run(&exec, &mut ctx, "DROP TABLE users").unwrap();
        let err = run(&exec, &mut ctx, "SELECT * FROM users").unwrap_err();
        assert!(matches!(err, SqlFrontError::TableNotExist(_)));
        let err = run(&exec, &mut ctx, "DROP TABLE users").unwrap_err();
        assert!(matches!(err, SqlFrontError::TableNotExist(_)));
        run(&exec, &mut ctx, "DROP TABLE IF EXISTS users").unwrap();
    }

    #[test]
    fn test_transactions_through_dispatch() {
        let (exec, mut ctx) = setup();
        run(&exec, &mut ctx, "BEGIN").unwrap();
        run(&exec, &mut ctx, "INSERT INTO users VALUES (1, 'a')").unwrap();
        run(&exec, &mut ctx, "ROLLBACK").unwrap();
        // redundant transaction control is harmless
        run(&exec, &mut ctx, "ROLLBACK").unwrap();
        run(&exec, &mut ctx, "COMMIT").unwrap();

        let mut rs = run(&exec, &mut ctx, "SELECT * FROM users")
            .unwrap()
            .into_result_set()
            .unwrap();
        assert!(rs.rows().unwrap().is_empty());
    }

    #[test]
    fn test_use_is_lazy() {
        let (exec, mut ctx) = setup();
        run(&exec, &mut ctx, "USE nowhere").unwrap();
        assert_eq!(ctx.database(), Some("nowhere"));
        let err = run(&exec, &mut ctx, "SELECT * FROM users").unwrap_err();
        assert!(matches!(err, SqlFrontError::DatabaseNotExist(_)));
        run(&exec, &mut ctx, "USE shop").unwrap();
        run(&exec, &mut ctx, "SELECT * FROM users").unwrap();
    }

    #[test]
    fn test_unsupported_statements() {
        let (exec, mut ctx) = setup();
        let err = run(&exec, &mut ctx, "ALTER DATABASE shop READ ONLY").unwrap_err();
        assert!(matches!(err, SqlFrontError::NotImplemented(_)));
        let err = run(&exec, &mut ctx, "SELECT * FROM sqlite_master").unwrap_err();
        assert!(matches!(err, SqlFrontError::NotImplemented(_)));
    }

    #[test]
    fn test_copy_in_and_data() {
        let (exec, mut ctx) = setup();
        match run(&exec, &mut ctx, "COPY users (id, name) FROM STDIN").unwrap() {
            Response::CopyIn { table, columns } => {
                assert_eq!(table, "users");
                assert_eq!(columns.len(), 2);
                assert_eq!(columns[0].data_type, DataType::Integer);
            }
            other => panic!("Expected CopyIn, got {:?}", other),
        }
        let data = Statement::CopyData(CopyData {
            table: "users".to_string(),
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec![Some("1".to_string()), Some("a".to_string())],
                vec![Some("2".to_string()), None],
            ],
        });
        let resp = exec.execute(&mut ctx, &data).unwrap();
        assert_eq!(resp.rows_affected(), 2);

        let mut rs = run(&exec, &mut ctx, "SELECT id FROM users WHERE name IS NULL")
            .unwrap()
            .into_result_set()
            .unwrap();
        let rows = rs.rows().unwrap();
        assert_eq!(rows[0].get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_no_database_selected() {
        let exec = SqliteExecutor::in_memory();
        let mut ctx = ConnContext::new();
        let err = run(&exec, &mut ctx, "SELECT * FROM users").unwrap_err();
        assert!(matches!(err, SqlFrontError::NoDatabaseSelected));
    }
}

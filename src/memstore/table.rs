/// In-memory tables
///
/// A `MemDatabase` owns its tables; each `Table` guards its schema and rows
/// with its own `RwLock`, so writers on one table never contend with
/// readers or writers on another.
use crate::core::error::lock_error;
use crate::core::{Result, SqlFrontError, Value};
use crate::query::{ColumnDef, Expr};
use crate::registry::Named;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A stored row: values keyed by column name.
pub type MemRow = HashMap<String, Value>;

#[derive(Debug, Default)]
pub struct TableData {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<MemRow>,
}

impl TableData {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Value of `column` in `row`; a schema column the row lacks reads as NULL.
    pub fn resolve(&self, row: &MemRow, column: &str) -> Result<Value> {
        match row.get(column) {
            Some(v) => Ok(v.clone()),
            None if self.has_column(column) => Ok(Value::Null),
            None => Err(SqlFrontError::ColumnNotExist(column.to_string())),
        }
    }

    /// Evaluates an optional predicate against a row; no predicate matches.
    pub fn matches(&self, row: &MemRow, predicate: Option<&Expr>) -> Result<bool> {
        match predicate {
            None => Ok(true),
            Some(expr) => expr.matches(&|name: &str| self.resolve(row, name)),
        }
    }
}

#[derive(Debug)]
pub struct Table {
    data: RwLock<TableData>,
}

impl Table {
    pub fn new(name: &str, columns: Vec<ColumnDef>) -> Self {
        Table {
            data: RwLock::new(TableData {
                name: name.to_string(),
                columns,
                rows: Vec::new(),
            }),
        }
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, TableData>> {
        self.data.read().map_err(|_| lock_error("table"))
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, TableData>> {
        self.data.write().map_err(|_| lock_error("table"))
    }

    /// Appends rows under the table's write lock.
    pub fn insert(&self, rows: Vec<MemRow>) -> Result<usize> {
        let mut data = self.write()?;
        let n = rows.len();
        data.rows.extend(rows);
        Ok(n)
    }

    /// Applies assignments to every row matching the predicate.
    ///
    /// New values are computed for all rows before any is written, so a
    /// failing row leaves the table unchanged.
    ///
    /// # Returns
    ///
    /// The number of updated rows; zero matches is not an error.
    pub fn update(&self, assignments: &[(String, Expr)], predicate: Option<&Expr>) -> Result<usize> {
        let mut data = self.write()?;
        for (column, _) in assignments {
            if !data.has_column(column) {
                return Err(SqlFrontError::ColumnNotExist(column.clone()));
            }
        }
        let mut staged = Vec::new();
        for (i, row) in data.rows.iter().enumerate() {
            if !data.matches(row, predicate)? {
                continue;
            }
            // every assignment sees the row as it was before the update
            let new_values = assignments
                .iter()
                .map(|(column, expr)| {
                    let value = expr.eval(&|name: &str| data.resolve(row, name))?;
                    Ok((column.clone(), value))
                })
                .collect::<Result<Vec<_>>>()?;
            staged.push((i, new_values));
        }
        let updated = staged.len();
        for (i, new_values) in staged {
            data.rows[i].extend(new_values);
        }
        Ok(updated)
    }

    /// Removes every row matching the predicate; a failing row leaves the
    /// table unchanged.
    pub fn delete(&self, predicate: Option<&Expr>) -> Result<usize> {
        let mut data = self.write()?;
        let keep = data
            .rows
            .iter()
            .map(|row| data.matches(row, predicate).map(|m| !m))
            .collect::<Result<Vec<bool>>>()?;
        let before = data.rows.len();
        let mut keep = keep.into_iter();
        data.rows.retain(|_| keep.next().unwrap_or(true));
        Ok(before - data.rows.len())
    }
}

/// A database of the in-memory store.
#[derive(Debug)]
pub struct MemDatabase {
    name: String,
    tables: RwLock<HashMap<String, Arc<Table>>>,
}

impl MemDatabase {
    pub fn new(name: &str) -> Self {
        MemDatabase {
            name: name.to_string(),
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn create_table(&self, name: &str, columns: Vec<ColumnDef>) -> Result<Arc<Table>> {
        let mut tables = self.tables.write().map_err(|_| lock_error("catalog"))?;
        if tables.contains_key(name) {
            return Err(SqlFrontError::TableExists(name.to_string()));
        }
        let table = Arc::new(Table::new(name, columns));
        tables.insert(name.to_string(), Arc::clone(&table));
        Ok(table)
    }

    pub fn lookup_table(&self, name: &str) -> Result<Arc<Table>> {
        let tables = self.tables.read().map_err(|_| lock_error("catalog"))?;
        tables
            .get(name)
            .cloned()
            .ok_or_else(|| SqlFrontError::TableNotExist(name.to_string()))
    }

    /// Removes a table and all its rows; `false` if it was absent.
    pub fn drop_table(&self, name: &str) -> Result<bool> {
        let mut tables = self.tables.write().map_err(|_| lock_error("catalog"))?;
        Ok(tables.remove(name).is_some())
    }

    pub fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        let mut tables = self.tables.write().map_err(|_| lock_error("catalog"))?;
        if tables.contains_key(to) {
            return Err(SqlFrontError::TableExists(to.to_string()));
        }
        let table = tables
            .remove(from)
            .ok_or_else(|| SqlFrontError::TableNotExist(from.to_string()))?;
        table.write()?.name = to.to_string();
        tables.insert(to.to_string(), table);
        Ok(())
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let tables = self.tables.read().map_err(|_| lock_error("catalog"))?;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl Named for MemDatabase {
    fn name(&self) -> &str {
        &self.name
    }
}

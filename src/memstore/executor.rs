/// In-memory store executor
///
/// Implements every statement handler against `MemDatabase` tables. Used
/// when no SQLite store is configured.
use super::table::{MemDatabase, MemRow, Table, TableData};
use crate::conn::ConnContext;
use crate::core::{DataType, Result, SqlFrontError, Value};
use crate::executor::{current_database, Response, StatementExecutor};
use crate::query::{
    AlterOperation, AlterTable, ColumnDef, CopyData, CopyFrom, CreateDatabase, CreateTable,
    Delete, DropDatabase, DropTable, Expr, Insert, InsertSource, Select, Selector, Update,
};
use crate::registry::Registry;
use crate::resultset::{Column, ResultSet, Schema};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct MemStore {
    databases: Registry<MemDatabase>,
}

/// A resolved output column of a SELECT.
struct Projection {
    name: String,
    data_type: DataType,
    expr: Expr,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore {
            databases: Registry::new(),
        }
    }

    pub fn databases(&self) -> &Registry<MemDatabase> {
        &self.databases
    }

    fn database(&self, ctx: &ConnContext) -> Result<Arc<MemDatabase>> {
        self.databases.lookup(current_database(ctx)?)
    }

    /// Resolves the database and table a statement addresses.
    pub fn lookup_database_table(
        &self,
        ctx: &ConnContext,
        table: &str,
    ) -> Result<(Arc<MemDatabase>, Arc<Table>)> {
        let db = self.database(ctx)?;
        let table = db.lookup_table(table)?;
        Ok((db, table))
    }

    fn resolve_projection(data: &TableData, projection: &[Selector]) -> Result<Vec<Projection>> {
        let mut resolved = Vec::new();
        for selector in projection {
            match selector {
                Selector::Wildcard => {
                    resolved.extend(data.columns.iter().map(|c| Projection {
                        name: c.name.clone(),
                        data_type: c.data_type,
                        expr: Expr::Column(c.name.clone()),
                    }));
                }
                Selector::Expr { expr, .. } => {
                    let mut referenced = Vec::new();
                    expr.referenced_columns(&mut referenced);
                    for name in referenced {
                        if !data.has_column(name) {
                            return Err(SqlFrontError::ColumnNotExist(name.to_string()));
                        }
                    }
                    let data_type = match expr {
                        Expr::Column(name) => data
                            .column(name)
                            .map(|c| c.data_type)
                            .unwrap_or(DataType::Dynamic),
                        _ => DataType::Dynamic,
                    };
                    resolved.push(Projection {
                        name: selector.output_name(),
                        data_type,
                        expr: expr.clone(),
                    });
                }
            }
        }
        Ok(resolved)
    }

    fn insert_rows(
        table: &Table,
        columns: &[String],
        rows: Vec<Vec<Value>>,
    ) -> Result<usize> {
        let names: Vec<String> = if columns.is_empty() {
            table.read()?.columns.iter().map(|c| c.name.clone()).collect()
        } else {
            columns.to_vec()
        };
        let rows = rows
            .into_iter()
            .map(|values| {
                if values.len() != names.len() {
                    return Err(SqlFrontError::Conversion(format!(
                        "{} values for {} columns",
                        values.len(),
                        names.len()
                    )));
                }
                Ok(names.iter().cloned().zip(values).collect::<MemRow>())
            })
            .collect::<Result<Vec<_>>>()?;
        table.insert(rows)
    }

    fn copy_values(rows: &[Vec<Option<String>>]) -> Vec<Vec<Value>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|f| f.clone().map(Value::Text).unwrap_or(Value::Null))
                    .collect()
            })
            .collect()
    }
}

fn no_row(name: &str) -> Result<Value> {
    Err(SqlFrontError::ColumnNotExist(name.to_string()))
}

impl StatementExecutor for MemStore {
    fn begin(&self, _ctx: &mut ConnContext) -> Result<()> {
        Err(SqlFrontError::NotImplemented("Begin".to_string()))
    }

    fn commit(&self, _ctx: &mut ConnContext) -> Result<()> {
        Err(SqlFrontError::NotImplemented("Commit".to_string()))
    }

    fn rollback(&self, _ctx: &mut ConnContext) -> Result<()> {
        Err(SqlFrontError::NotImplemented("Rollback".to_string()))
    }

    fn create_database(&self, ctx: &mut ConnContext, stmt: &CreateDatabase) -> Result<()> {
        match self.databases.add(MemDatabase::new(&stmt.name)) {
            Ok(_) => {
                ctx.set_database(&stmt.name);
                Ok(())
            }
            Err(SqlFrontError::DatabaseExists(_)) if stmt.if_not_exists => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn database_names(&self) -> Result<Vec<String>> {
        self.databases.names()
    }

    fn drop_database(&self, ctx: &mut ConnContext, stmt: &DropDatabase) -> Result<()> {
        if let Err(e) = self.databases.lookup(&stmt.name) {
            return if stmt.if_exists { Ok(()) } else { Err(e) };
        }
        self.databases.drop(&stmt.name)?;
        if ctx.database() == Some(stmt.name.as_str()) {
            ctx.clear_database();
        }
        Ok(())
    }

    fn create_table(&self, ctx: &mut ConnContext, stmt: &CreateTable) -> Result<()> {
        let db = self.database(ctx)?;
        match db.create_table(&stmt.name, stmt.columns.clone()) {
            Ok(_) => Ok(()),
            Err(SqlFrontError::TableExists(_)) if stmt.if_not_exists => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn alter_table(&self, ctx: &mut ConnContext, stmt: &AlterTable) -> Result<()> {
        let (db, table) = self.lookup_database_table(ctx, &stmt.name)?;
        match &stmt.operation {
            AlterOperation::AddColumn(column) => {
                let mut data = table.write()?;
                if data.has_column(&column.name) {
                    return Err(SqlFrontError::App(format!(
                        "column '{}' already exists",
                        column.name
                    )));
                }
                data.columns.push(column.clone());
                Ok(())
            }
            AlterOperation::DropColumn { name, if_exists } => {
                let mut data = table.write()?;
                if !data.has_column(name) {
                    return if *if_exists {
                        Ok(())
                    } else {
                        Err(SqlFrontError::ColumnNotExist(name.clone()))
                    };
                }
                data.columns.retain(|c| &c.name != name);
                for row in data.rows.iter_mut() {
                    row.remove(name);
                }
                Ok(())
            }
            AlterOperation::RenameColumn { from, to } => {
                let mut data = table.write()?;
                if !data.has_column(from) {
                    return Err(SqlFrontError::ColumnNotExist(from.clone()));
                }
                for column in data.columns.iter_mut().filter(|c| &c.name == from) {
                    column.name = to.clone();
                }
                for row in data.rows.iter_mut() {
                    if let Some(v) = row.remove(from) {
                        row.insert(to.clone(), v);
                    }
                }
                Ok(())
            }
            AlterOperation::RenameTable(to) => db.rename_table(&stmt.name, to),
            AlterOperation::Other(op) => Err(SqlFrontError::NotImplemented(format!(
                "ALTER TABLE {}",
                op
            ))),
        }
    }

    fn drop_table(&self, ctx: &mut ConnContext, stmt: &DropTable) -> Result<()> {
        let db = self.database(ctx)?;
        for name in &stmt.names {
            if db.lookup_table(name).is_err() {
                if stmt.if_exists {
                    continue;
                }
                return Err(SqlFrontError::TableNotExist(name.clone()));
            }
            if !db.drop_table(name)? {
                return Err(SqlFrontError::Deletion(format!("table {}", name)));
            }
        }
        Ok(())
    }

    fn insert(&self, ctx: &mut ConnContext, stmt: &Insert) -> Result<ResultSet> {
        let (_, table) = self.lookup_database_table(ctx, &stmt.table)?;
        let rows = match &stmt.source_rows {
            InsertSource::Values(rows) => rows
                .iter()
                .map(|row| row.iter().map(|e| e.eval(&no_row)).collect::<Result<Vec<_>>>())
                .collect::<Result<Vec<_>>>()?,
            InsertSource::Query(_) => {
                return Err(SqlFrontError::NotImplemented("INSERT ... SELECT".to_string()))
            }
        };
        let n = Self::insert_rows(&table, &stmt.columns, rows)?;
        Ok(ResultSet::from_rows_affected(n as u64))
    }

    fn update(&self, ctx: &mut ConnContext, stmt: &Update) -> Result<ResultSet> {
        let (_, table) = self.lookup_database_table(ctx, &stmt.table)?;
        let n = table.update(&stmt.assignments, stmt.selection.as_ref())?;
        Ok(ResultSet::from_rows_affected(n as u64))
    }

    fn delete(&self, ctx: &mut ConnContext, stmt: &Delete) -> Result<ResultSet> {
        let (_, table) = self.lookup_database_table(ctx, &stmt.table)?;
        let n = table.delete(stmt.selection.as_ref())?;
        Ok(ResultSet::from_rows_affected(n as u64))
    }

    fn select(&self, ctx: &mut ConnContext, stmt: &Select) -> Result<ResultSet> {
        if stmt.from.is_empty() {
            return Err(SqlFrontError::NotImplemented(format!(
                "query without a FROM table '{}'",
                stmt
            )));
        }
        if stmt.from.len() > 1 {
            return Err(SqlFrontError::MultipleTableNotSupported(stmt.from.join(", ")));
        }
        if stmt.passthrough {
            return Err(SqlFrontError::NotImplemented(format!("query '{}'", stmt)));
        }
        let (_, table) = self.lookup_database_table(ctx, &stmt.from[0])?;
        let data = table.read()?;

        let projection = Self::resolve_projection(&data, &stmt.projection)?;
        let schema = Schema::new(
            projection
                .iter()
                .map(|p| Column::new(&p.name, p.data_type))
                .collect(),
        );

        // aggregate selectors have no evaluation path yet
        if stmt.has_aggregate() {
            debug!("aggregate selectors return no rows");
            return Ok(ResultSet::from_rows(schema, Vec::new()));
        }

        let mut matched: Vec<&MemRow> = Vec::new();
        for row in &data.rows {
            if data.matches(row, stmt.selection.as_ref())? {
                matched.push(row);
            }
        }

        if !stmt.order_by.is_empty() {
            let mut keyed = matched
                .into_iter()
                .map(|row| {
                    let keys = stmt
                        .order_by
                        .iter()
                        .map(|o| o.expr.eval(&|name: &str| data.resolve(row, name)))
                        .collect::<Result<Vec<_>>>()?;
                    Ok((keys, row))
                })
                .collect::<Result<Vec<_>>>()?;
            keyed.sort_by(|(a, _), (b, _)| {
                for (i, order) in stmt.order_by.iter().enumerate() {
                    let ord = a[i].sort_cmp(&b[i]);
                    let ord = if order.ascending { ord } else { ord.reverse() };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
            matched = keyed.into_iter().map(|(_, row)| row).collect();
        }

        let limit = stmt.limit.unwrap_or(usize::MAX);
        let rows = matched
            .into_iter()
            .skip(stmt.offset)
            .take(limit)
            .map(|row| {
                projection
                    .iter()
                    .map(|p| p.expr.eval(&|name: &str| data.resolve(row, name)))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ResultSet::from_rows(schema, rows))
    }

    fn copy(&self, ctx: &mut ConnContext, stmt: &CopyFrom) -> Result<Response> {
        let (_, table) = self.lookup_database_table(ctx, &stmt.table)?;
        if !stmt.rows.is_empty() {
            let n = Self::insert_rows(&table, &stmt.columns, Self::copy_values(&stmt.rows))?;
            return Ok(Response::ResultSet(ResultSet::from_rows_affected(n as u64)));
        }
        let data = table.read()?;
        let defs: Vec<&ColumnDef> = if stmt.columns.is_empty() {
            data.columns.iter().collect()
        } else {
            stmt.columns
                .iter()
                .map(|name| {
                    data.column(name)
                        .ok_or_else(|| SqlFrontError::ColumnNotExist(name.clone()))
                })
                .collect::<Result<Vec<_>>>()?
        };
        Ok(Response::CopyIn {
            table: stmt.table.clone(),
            columns: defs
                .into_iter()
                .map(|c| Column::new(&c.name, c.data_type))
                .collect(),
        })
    }

    fn copy_data(&self, ctx: &mut ConnContext, stmt: &CopyData) -> Result<ResultSet> {
        let (_, table) = self.lookup_database_table(ctx, &stmt.table)?;
        let n = Self::insert_rows(&table, &stmt.columns, Self::copy_values(&stmt.rows))?;
        Ok(ResultSet::from_rows_affected(n as u64))
    }
}

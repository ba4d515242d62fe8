/// Statement Dispatch Contract
///
/// `StatementExecutor` is the capability set both protocol front-ends call
/// into. A backend implements one handler per statement variant; `execute`
/// routes a parsed statement to the matching handler. Front-ends receive
/// either `Response::Ok`, a result set, or the handler's error unchanged.
use crate::conn::ConnContext;
use crate::core::{Result, SqlFrontError};
use crate::query::{
    AlterDatabase, AlterTable, CopyData, CopyFrom, CreateDatabase, CreateTable, Delete,
    DropDatabase, DropTable, Insert, Select, Statement, SystemSelect, Update, UseDatabase,
};
use crate::resultset::{Column, ResultSet};
use tracing::{debug, warn};

/// What a front-end sends back for one statement.
#[derive(Debug)]
pub enum Response {
    /// Statement completed without a payload.
    Ok,
    /// Rows of a query or the affected-row count of a mutation.
    ResultSet(ResultSet),
    /// The front-end should switch to COPY IN mode and stream rows for
    /// these target columns as `Statement::CopyData`.
    CopyIn { table: String, columns: Vec<Column> },
}

impl Response {
    /// Affected rows for mutations, 0 otherwise.
    pub fn rows_affected(&self) -> u64 {
        match self {
            Response::ResultSet(rs) => rs.rows_affected(),
            _ => 0,
        }
    }

    pub fn into_result_set(self) -> Option<ResultSet> {
        match self {
            Response::ResultSet(rs) => Some(rs),
            _ => None,
        }
    }
}

/// Returns the selected database or `NoDatabaseSelected`.
pub fn current_database(ctx: &ConnContext) -> Result<&str> {
    ctx.database().ok_or(SqlFrontError::NoDatabaseSelected)
}

pub trait StatementExecutor: Send + Sync {
    fn begin(&self, ctx: &mut ConnContext) -> Result<()>;
    fn commit(&self, ctx: &mut ConnContext) -> Result<()>;
    fn rollback(&self, ctx: &mut ConnContext) -> Result<()>;

    /// Selects the connection's current database.
    ///
    /// Existence is not checked here; the first statement that needs the
    /// database reports `DatabaseNotExist`.
    fn use_database(&self, ctx: &mut ConnContext, stmt: &UseDatabase) -> Result<()> {
        ctx.set_database(&stmt.name);
        Ok(())
    }

    fn create_database(&self, ctx: &mut ConnContext, stmt: &CreateDatabase) -> Result<()>;

    fn alter_database(&self, _ctx: &mut ConnContext, _stmt: &AlterDatabase) -> Result<()> {
        Err(SqlFrontError::NotImplemented("AlterDatabase".to_string()))
    }

    fn drop_database(&self, ctx: &mut ConnContext, stmt: &DropDatabase) -> Result<()>;
    /// Names of every registered database, sorted.
    fn database_names(&self) -> Result<Vec<String>>;
    fn create_table(&self, ctx: &mut ConnContext, stmt: &CreateTable) -> Result<()>;
    fn alter_table(&self, ctx: &mut ConnContext, stmt: &AlterTable) -> Result<()>;
    fn drop_table(&self, ctx: &mut ConnContext, stmt: &DropTable) -> Result<()>;
    fn insert(&self, ctx: &mut ConnContext, stmt: &Insert) -> Result<ResultSet>;
    fn update(&self, ctx: &mut ConnContext, stmt: &Update) -> Result<ResultSet>;
    fn delete(&self, ctx: &mut ConnContext, stmt: &Delete) -> Result<ResultSet>;
    fn select(&self, ctx: &mut ConnContext, stmt: &Select) -> Result<ResultSet>;

    /// Catalog and introspection queries.
    fn system_select(&self, _ctx: &mut ConnContext, _stmt: &SystemSelect) -> Result<ResultSet> {
        Err(SqlFrontError::NotImplemented("SystemSelect".to_string()))
    }

    /// Starts a bulk load; inline rows are applied immediately.
    fn copy(&self, ctx: &mut ConnContext, stmt: &CopyFrom) -> Result<Response>;

    /// Applies one batch of bulk-load rows.
    fn copy_data(&self, ctx: &mut ConnContext, stmt: &CopyData) -> Result<ResultSet>;

    /// Called by front-ends when SQL text fails to parse.
    fn parser_error(&self, ctx: &ConnContext, sql: &str, err: SqlFrontError) -> SqlFrontError {
        warn!(conn = %ctx.id(), sql = %sql, "parse failed: {}", err);
        err
    }

    /// Routes a statement to its handler.
    fn execute(&self, ctx: &mut ConnContext, stmt: &Statement) -> Result<Response> {
        debug!(conn = %ctx.id(), kind = stmt.kind(), "dispatching statement");
        match stmt {
            Statement::Begin => self.begin(ctx).map(|_| Response::Ok),
            Statement::Commit => self.commit(ctx).map(|_| Response::Ok),
            Statement::Rollback => self.rollback(ctx).map(|_| Response::Ok),
            Statement::Use(s) => self.use_database(ctx, s).map(|_| Response::Ok),
            Statement::CreateDatabase(s) => self.create_database(ctx, s).map(|_| Response::Ok),
            Statement::AlterDatabase(s) => self.alter_database(ctx, s).map(|_| Response::Ok),
            Statement::DropDatabase(s) => self.drop_database(ctx, s).map(|_| Response::Ok),
            Statement::CreateTable(s) => self.create_table(ctx, s).map(|_| Response::Ok),
            Statement::AlterTable(s) => self.alter_table(ctx, s).map(|_| Response::Ok),
            Statement::DropTable(s) => self.drop_table(ctx, s).map(|_| Response::Ok),
            Statement::Insert(s) => self.insert(ctx, s).map(Response::ResultSet),
            Statement::Update(s) => self.update(ctx, s).map(Response::ResultSet),
            Statement::Delete(s) => self.delete(ctx, s).map(Response::ResultSet),
            Statement::Select(s) => self.select(ctx, s).map(Response::ResultSet),
            Statement::SystemSelect(s) => self.system_select(ctx, s).map(Response::ResultSet),
            Statement::Copy(s) => self.copy(ctx, s),
            Statement::CopyData(s) => self.copy_data(ctx, s).map(Response::ResultSet),
        }
    }
}

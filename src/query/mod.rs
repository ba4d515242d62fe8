/// Statement Model
///
/// Typed representation of every statement a protocol front-end can hand
/// to the dispatcher. Statements parsed from SQL text keep their canonical
/// SQL in `source`, which the SQLite backend executes verbatim; statements
/// built in code are rendered from their typed fields instead.
pub mod expr;
pub mod parser;

pub use expr::{BinaryOp, Expr, UnaryOp};
pub use parser::{parse, parse_one, Dialect};

use crate::core::DataType;
use std::fmt;

/// Column definition of a CREATE TABLE or ALTER TABLE ADD COLUMN.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    /// Type name as written, e.g. `VARCHAR(20)`.
    pub declared_type: String,
    pub data_type: DataType,
    /// Column constraints as SQL, e.g. `NOT NULL`.
    pub constraints: Vec<String>,
}

impl ColumnDef {
    pub fn new(name: &str, declared_type: &str) -> Self {
        ColumnDef {
            name: name.to_string(),
            declared_type: declared_type.to_string(),
            data_type: DataType::from_column_type(declared_type),
            constraints: Vec::new(),
        }
    }
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.declared_type.is_empty() {
            write!(f, " {}", self.declared_type)?;
        }
        for c in &self.constraints {
            write!(f, " {}", c)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseDatabase {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateDatabase {
    pub name: String,
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterDatabase {
    pub name: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropDatabase {
    pub name: String,
    pub if_exists: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterOperation {
    AddColumn(ColumnDef),
    DropColumn { name: String, if_exists: bool },
    RenameColumn { from: String, to: String },
    RenameTable(String),
    /// Any other operation, kept as SQL.
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    pub name: String,
    pub operation: AlterOperation,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropTable {
    pub names: Vec<String>,
    pub if_exists: bool,
    pub source: Option<String>,
}

/// Where the rows of an INSERT come from.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    /// `INSERT ... SELECT`, kept as SQL.
    Query(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub source_rows: InsertSource,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, Expr)>,
    pub selection: Option<Expr>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub selection: Option<Expr>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Wildcard,
    Expr { expr: Expr, alias: Option<String> },
}

impl Selector {
    pub fn column(name: &str) -> Self {
        Selector::Expr {
            expr: Expr::column(name),
            alias: None,
        }
    }

    /// Output column name: the alias, the column name, or the expression text.
    pub fn output_name(&self) -> String {
        match self {
            Selector::Wildcard => "*".to_string(),
            Selector::Expr { alias: Some(alias), .. } => alias.clone(),
            Selector::Expr { expr: Expr::Column(name), .. } => name.clone(),
            Selector::Expr { expr, .. } => expr.to_string(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Wildcard => write!(f, "*"),
            Selector::Expr { expr, alias: Some(alias) } => write!(f, "{} AS {}", expr, alias),
            Selector::Expr { expr, alias: None } => write!(f, "{}", expr),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Every table named in FROM, joins included.
    pub from: Vec<String>,
    pub projection: Vec<Selector>,
    pub selection: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: usize,
    /// Set when the query uses features only the SQL backend can run
    /// (grouping, set operations, subqueries in FROM, ...).
    pub passthrough: bool,
    pub source: Option<String>,
}

impl Select {
    /// `SELECT * FROM <table>`
    pub fn all_from(table: &str) -> Self {
        Select {
            from: vec![table.to_string()],
            projection: vec![Selector::Wildcard],
            selection: None,
            order_by: Vec::new(),
            limit: None,
            offset: 0,
            passthrough: false,
            source: None,
        }
    }

    pub fn has_aggregate(&self) -> bool {
        self.projection.iter().any(|s| match s {
            Selector::Expr { expr, .. } => expr.is_aggregate(),
            Selector::Wildcard => false,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemSelect {
    pub source: String,
}

/// `COPY <table> [(columns)] FROM STDIN` with optional inline data.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyFrom {
    pub table: String,
    pub columns: Vec<String>,
    /// Inline tab-separated rows that followed the statement; `None` is NULL.
    pub rows: Vec<Vec<Option<String>>>,
}

/// A batch of rows streamed after a COPY IN response.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyData {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Every statement the dispatcher routes.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Begin,
    Commit,
    Rollback,
    Use(UseDatabase),
    CreateDatabase(CreateDatabase),
    AlterDatabase(AlterDatabase),
    DropDatabase(DropDatabase),
    CreateTable(CreateTable),
    AlterTable(AlterTable),
    DropTable(DropTable),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Select(Select),
    SystemSelect(SystemSelect),
    Copy(CopyFrom),
    CopyData(CopyData),
}

impl Statement {
    /// Short kind name used by logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Begin => "begin",
            Statement::Commit => "commit",
            Statement::Rollback => "rollback",
            Statement::Use(_) => "use",
            Statement::CreateDatabase(_) => "create_database",
            Statement::AlterDatabase(_) => "alter_database",
            Statement::DropDatabase(_) => "drop_database",
            Statement::CreateTable(_) => "create_table",
            Statement::AlterTable(_) => "alter_table",
            Statement::DropTable(_) => "drop_table",
            Statement::Insert(_) => "insert",
            Statement::Update(_) => "update",
            Statement::Delete(_) => "delete",
            Statement::Select(_) => "select",
            Statement::SystemSelect(_) => "system_select",
            Statement::Copy(_) => "copy",
            Statement::CopyData(_) => "copy_data",
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

fn render_where(f: &mut fmt::Formatter<'_>, selection: &Option<Expr>) -> fmt::Result {
    match selection {
        Some(expr) => write!(f, " WHERE {}", expr),
        None => Ok(()),
    }
}

impl fmt::Display for CreateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sql) = &self.source {
            return write!(f, "{}", sql);
        }
        write!(
            f,
            "CREATE TABLE {}{} ({})",
            if self.if_not_exists { "IF NOT EXISTS " } else { "" },
            self.name,
            join(&self.columns)
        )
    }
}

impl fmt::Display for AlterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sql) = &self.source {
            return write!(f, "{}", sql);
        }
        write!(f, "ALTER TABLE {} ", self.name)?;
        match &self.operation {
            AlterOperation::AddColumn(col) => write!(f, "ADD COLUMN {}", col),
            AlterOperation::DropColumn { name, .. } => write!(f, "DROP COLUMN {}", name),
            AlterOperation::RenameColumn { from, to } => {
                write!(f, "RENAME COLUMN {} TO {}", from, to)
            }
            AlterOperation::RenameTable(to) => write!(f, "RENAME TO {}", to),
            AlterOperation::Other(sql) => write!(f, "{}", sql),
        }
    }
}

impl fmt::Display for DropTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sql) = &self.source {
            return write!(f, "{}", sql);
        }
        write!(
            f,
            "DROP TABLE {}{}",
            if self.if_exists { "IF EXISTS " } else { "" },
            self.names.join(", ")
        )
    }
}

impl fmt::Display for Insert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sql) = &self.source {
            return write!(f, "{}", sql);
        }
        write!(f, "INSERT INTO {}", self.table)?;
        if !self.columns.is_empty() {
            write!(f, " ({})", self.columns.join(", "))?;
        }
        match &self.source_rows {
            InsertSource::Values(rows) => {
                let rendered: Vec<String> =
                    rows.iter().map(|r| format!("({})", join(r))).collect();
                write!(f, " VALUES {}", rendered.join(", "))
            }
            InsertSource::Query(sql) => write!(f, " {}", sql),
        }
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sql) = &self.source {
            return write!(f, "{}", sql);
        }
        let sets: Vec<String> = self
            .assignments
            .iter()
            .map(|(col, expr)| format!("{} = {}", col, expr))
            .collect();
        write!(f, "UPDATE {} SET {}", self.table, sets.join(", "))?;
        render_where(f, &self.selection)
    }
}

impl fmt::Display for Delete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sql) = &self.source {
            return write!(f, "{}", sql);
        }
        write!(f, "DELETE FROM {}", self.table)?;
        render_where(f, &self.selection)
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sql) = &self.source {
            return write!(f, "{}", sql);
        }
        write!(f, "SELECT {}", join(&self.projection))?;
        if !self.from.is_empty() {
            write!(f, " FROM {}", self.from.join(", "))?;
        }
        render_where(f, &self.selection)?;
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self
                .order_by
                .iter()
                .map(|o| format!("{}{}", o.expr, if o.ascending { "" } else { " DESC" }))
                .collect();
            write!(f, " ORDER BY {}", keys.join(", "))?;
        }
        match (self.limit, self.offset) {
            (Some(limit), 0) => write!(f, " LIMIT {}", limit),
            (Some(limit), offset) => write!(f, " LIMIT {} OFFSET {}", limit, offset),
            (None, 0) => Ok(()),
            (None, offset) => write!(f, " LIMIT -1 OFFSET {}", offset),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Begin => write!(f, "BEGIN"),
            Statement::Commit => write!(f, "COMMIT"),
            Statement::Rollback => write!(f, "ROLLBACK"),
            Statement::Use(s) => write!(f, "USE {}", s.name),
            Statement::CreateDatabase(s) => write!(
                f,
                "CREATE DATABASE {}{}",
                if s.if_not_exists { "IF NOT EXISTS " } else { "" },
                s.name
            ),
            Statement::AlterDatabase(s) => match &s.source {
                Some(sql) => write!(f, "{}", sql),
                None => write!(f, "ALTER DATABASE {}", s.name),
            },
            Statement::DropDatabase(s) => write!(
                f,
                "DROP DATABASE {}{}",
                if s.if_exists { "IF EXISTS " } else { "" },
                s.name
            ),
            Statement::CreateTable(s) => write!(f, "{}", s),
            Statement::AlterTable(s) => write!(f, "{}", s),
            Statement::DropTable(s) => write!(f, "{}", s),
            Statement::Insert(s) => write!(f, "{}", s),
            Statement::Update(s) => write!(f, "{}", s),
            Statement::Delete(s) => write!(f, "{}", s),
            Statement::Select(s) => write!(f, "{}", s),
            Statement::SystemSelect(s) => write!(f, "{}", s.source),
            Statement::Copy(s) => {
                write!(f, "COPY {}", s.table)?;
                if !s.columns.is_empty() {
                    write!(f, " ({})", s.columns.join(", "))?;
                }
                write!(f, " FROM STDIN")
            }
            Statement::CopyData(s) => write!(f, "-- COPY DATA {} ({} rows)", s.table, s.rows.len()),
        }
    }
}

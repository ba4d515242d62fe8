/// SQL text to statement conversion
///
/// Wraps `sqlparser` and converts its AST into the dispatcher's
/// `Statement` model. A few database-level forms the grammar crate does not
/// understand (`DROP DATABASE`, `ALTER DATABASE`) are recognized by a
/// keyword pre-scan before parsing.
use super::{
    AlterDatabase, AlterOperation, AlterTable, ColumnDef, CopyFrom, CreateDatabase, CreateTable,
    Delete, DropDatabase, DropTable, Insert, InsertSource, OrderBy, Select, Selector, Statement,
    SystemSelect, Update, UseDatabase,
};
use super::expr::{BinaryOp, Expr, UnaryOp};
use crate::core::{DataType, Result, SqlFrontError, Value};
use sqlparser::ast;
use sqlparser::dialect::{Dialect as SqlDialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use tracing::debug;

/// SQL dialect a front-end speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    PostgreSql,
    Generic,
}

impl Dialect {
    fn grammar(&self) -> Box<dyn SqlDialect> {
        match self {
            Dialect::MySql => Box::new(MySqlDialect {}),
            Dialect::PostgreSql => Box::new(PostgreSqlDialect {}),
            Dialect::Generic => Box::new(GenericDialect {}),
        }
    }
}

/// Catalog namespaces routed to `SystemSelect`.
const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "pg_catalog", "mysql", "performance_schema"];
const SYSTEM_TABLES: &[&str] = &["sqlite_master", "sqlite_schema", "sqlite_sequence"];

/// Parses SQL text into statements.
///
/// # Arguments
///
/// * `sql` - One or more `;`-separated statements
/// * `dialect` - Grammar used for parsing
pub fn parse(sql: &str, dialect: Dialect) -> Result<Vec<Statement>> {
    if let Some(stmt) = prescan_database_statement(sql)? {
        return Ok(vec![stmt]);
    }
    let grammar = dialect.grammar();
    if let Some((header, payload)) = split_copy_payload(sql) {
        // the grammar requires the terminating semicolon after STDIN
        let ast = Parser::parse_sql(grammar.as_ref(), &format!("{};", header))?;
        let mut stmts = ast
            .into_iter()
            .map(convert_statement)
            .collect::<Result<Vec<_>>>()?;
        if let Some(Statement::Copy(copy)) = stmts.last_mut() {
            copy.rows = parse_copy_rows(payload);
        }
        return Ok(stmts);
    }
    let ast = Parser::parse_sql(grammar.as_ref(), sql)?;
    debug!("parsed {} statement(s)", ast.len());
    ast.into_iter().map(convert_statement).collect()
}

/// Parses exactly one statement.
pub fn parse_one(sql: &str, dialect: Dialect) -> Result<Statement> {
    let mut stmts = parse(sql, dialect)?;
    match stmts.len() {
        1 => Ok(stmts.remove(0)),
        0 => Err(SqlFrontError::Parse("empty statement".to_string())),
        n => Err(SqlFrontError::Parse(format!("expected one statement, found {}", n))),
    }
}

fn prescan_database_statement(sql: &str) -> Result<Option<Statement>> {
    let text = sql.trim().trim_end_matches(';').trim();
    if text.contains(';') {
        return Ok(None);
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let upper: Vec<String> = words.iter().map(|w| w.to_uppercase()).collect();
    if upper.len() < 3 || upper[1] != "DATABASE" {
        return Ok(None);
    }
    match upper[0].as_str() {
        "DROP" => {
            let if_exists = upper.len() >= 5 && upper[2] == "IF" && upper[3] == "EXISTS";
            let rest = if if_exists { &words[4..] } else { &words[2..] };
            match rest {
                [name] => Ok(Some(Statement::DropDatabase(DropDatabase {
                    name: unquote(name),
                    if_exists,
                }))),
                _ => Err(SqlFrontError::Parse(format!("malformed DROP DATABASE: {}", text))),
            }
        }
        "ALTER" => Ok(Some(Statement::AlterDatabase(AlterDatabase {
            name: unquote(words[2]),
            source: Some(text.to_string()),
        }))),
        _ => Ok(None),
    }
}

/// Splits `COPY ... FROM STDIN; <rows>` into the statement and its data.
fn split_copy_payload(sql: &str) -> Option<(&str, &str)> {
    let trimmed = sql.trim_start();
    let head = trimmed.get(..4)?;
    if !head.eq_ignore_ascii_case("COPY") {
        return None;
    }
    let end = trimmed.find(';').unwrap_or(trimmed.len());
    let header = &trimmed[..end];
    if !header.to_uppercase().contains("STDIN") {
        return None;
    }
    Some((header, trimmed.get(end + 1..).unwrap_or("")))
}

/// Reads tab-separated COPY text rows up to the `\.` terminator.
pub fn parse_copy_rows(payload: &str) -> Vec<Vec<Option<String>>> {
    payload
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .take_while(|line| *line != "\\.")
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split('\t')
                .map(|field| {
                    if field == "\\N" {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect()
        })
        .collect()
}

fn unquote(name: &str) -> String {
    name.trim_matches(|c| c == '`' || c == '"' || c == '\'').to_string()
}

fn ident(id: &ast::Ident) -> String {
    id.value.clone()
}

/// Last component of a possibly qualified name.
fn object_name(name: &ast::ObjectName) -> String {
    name.0.last().map(ident).unwrap_or_default()
}

fn convert_statement(stmt: ast::Statement) -> Result<Statement> {
    let source = stmt.to_string();
    match stmt {
        ast::Statement::StartTransaction { .. } => Ok(Statement::Begin),
        ast::Statement::Commit { .. } => Ok(Statement::Commit),
        ast::Statement::Rollback { .. } => Ok(Statement::Rollback),
        ast::Statement::Use { db_name } => Ok(Statement::Use(UseDatabase {
            name: ident(&db_name),
        })),
        ast::Statement::CreateDatabase {
            db_name,
            if_not_exists,
            ..
        } => Ok(Statement::CreateDatabase(CreateDatabase {
            name: object_name(&db_name),
            if_not_exists,
        })),
        ast::Statement::CreateSchema {
            schema_name,
            if_not_exists,
        } => {
            let name = match schema_name {
                ast::SchemaName::Simple(name) | ast::SchemaName::NamedAuthorization(name, _) => {
                    object_name(&name)
                }
                ast::SchemaName::UnnamedAuthorization(id) => ident(&id),
            };
            Ok(Statement::CreateDatabase(CreateDatabase { name, if_not_exists }))
        }
        ast::Statement::CreateTable {
            name,
            columns,
            if_not_exists,
            ..
        } => Ok(Statement::CreateTable(CreateTable {
            name: object_name(&name),
            columns: columns.iter().map(convert_column).collect(),
            if_not_exists,
            source: Some(source),
        })),
        ast::Statement::AlterTable { name, operation } => Ok(Statement::AlterTable(AlterTable {
            name: object_name(&name),
            operation: convert_alter(operation),
            source: Some(source),
        })),
        ast::Statement::Drop {
            object_type,
            if_exists,
            names,
            ..
        } => match object_type {
            ast::ObjectType::Table => Ok(Statement::DropTable(DropTable {
                names: names.iter().map(object_name).collect(),
                if_exists,
                source: Some(source),
            })),
            ast::ObjectType::Schema => {
                let name = names.first().map(object_name).unwrap_or_default();
                Ok(Statement::DropDatabase(DropDatabase { name, if_exists }))
            }
            other => Err(SqlFrontError::NotImplemented(format!("DROP {}", other))),
        },
        ast::Statement::Insert {
            table_name,
            columns,
            source: query,
            ..
        } => {
            let source_rows = match *query.body {
                ast::SetExpr::Values(values) => InsertSource::Values(
                    values
                        .rows
                        .into_iter()
                        .map(|row| row.into_iter().map(convert_expr).collect())
                        .collect(),
                ),
                _ => InsertSource::Query(query.to_string()),
            };
            Ok(Statement::Insert(Insert {
                table: object_name(&table_name),
                columns: columns.iter().map(ident).collect(),
                source_rows,
                source: Some(source),
            }))
        }
        ast::Statement::Update {
            table,
            assignments,
            selection,
            ..
        } => Ok(Statement::Update(Update {
            table: relation_name(&table.relation),
            assignments: assignments
                .into_iter()
                .map(|a| {
                    let column = a.id.last().map(ident).unwrap_or_default();
                    (column, convert_expr(a.value))
                })
                .collect(),
            selection: selection.map(convert_expr),
            source: Some(source),
        })),
        ast::Statement::Delete {
            tables,
            from,
            selection,
            ..
        } => {
            let mut names: Vec<String> = from.iter().map(|t| relation_name(&t.relation)).collect();
            if names.is_empty() {
                names = tables.iter().map(object_name).collect();
            }
            if names.len() != 1 {
                return Err(SqlFrontError::MultipleTableNotSupported(names.join(", ")));
            }
            Ok(Statement::Delete(Delete {
                table: names.remove(0),
                selection: selection.map(convert_expr),
                source: Some(source),
            }))
        }
        ast::Statement::Query(query) => convert_query(*query, source),
        ast::Statement::Copy {
            source: copy_source,
            to,
            target,
            ..
        } => {
            let (table_name, columns) = match copy_source {
                ast::CopySource::Table { table_name, columns } if !to => (table_name, columns),
                _ => return Err(SqlFrontError::NotImplemented("COPY TO".to_string())),
            };
            if target != ast::CopyTarget::Stdin {
                return Err(SqlFrontError::NotImplemented(format!("COPY FROM {}", target)));
            }
            Ok(Statement::Copy(CopyFrom {
                table: object_name(&table_name),
                columns: columns.iter().map(ident).collect(),
                rows: Vec::new(),
            }))
        }
        other => Err(SqlFrontError::NotImplemented(format!("statement '{}'", other))),
    }
}

fn convert_column(col: &ast::ColumnDef) -> ColumnDef {
    let declared_type = col.data_type.to_string();
    ColumnDef {
        name: ident(&col.name),
        data_type: DataType::from_column_type(&declared_type),
        declared_type,
        constraints: col.options.iter().map(|o| o.to_string()).collect(),
    }
}

fn convert_alter(op: ast::AlterTableOperation) -> AlterOperation {
    match op {
        ast::AlterTableOperation::AddColumn { column_def, .. } => {
            AlterOperation::AddColumn(convert_column(&column_def))
        }
        ast::AlterTableOperation::DropColumn {
            column_name,
            if_exists,
            ..
        } => AlterOperation::DropColumn {
            name: ident(&column_name),
            if_exists,
        },
        ast::AlterTableOperation::RenameColumn {
            old_column_name,
            new_column_name,
        } => AlterOperation::RenameColumn {
            from: ident(&old_column_name),
            to: ident(&new_column_name),
        },
        ast::AlterTableOperation::RenameTable { table_name } => {
            AlterOperation::RenameTable(object_name(&table_name))
        }
        other => AlterOperation::Other(other.to_string()),
    }
}

fn relation_name(factor: &ast::TableFactor) -> String {
    match factor {
        ast::TableFactor::Table { name, .. } => object_name(name),
        other => other.to_string(),
    }
}

fn is_system_relation(factor: &ast::TableFactor) -> bool {
    match factor {
        ast::TableFactor::Table { name, .. } => {
            let parts: Vec<String> = name.0.iter().map(|i| i.value.to_lowercase()).collect();
            let schema_hit = parts.len() > 1 && SYSTEM_SCHEMAS.contains(&parts[0].as_str());
            let table_hit = parts
                .last()
                .map(|t| SYSTEM_TABLES.contains(&t.as_str()) || t.starts_with("pg_"))
                .unwrap_or(false);
            schema_hit || table_hit
        }
        _ => false,
    }
}

/// True for catalog probes such as `SELECT version()` or `SELECT @@version`.
fn is_system_projection(select: &ast::Select) -> bool {
    select.from.is_empty()
        && !select.projection.is_empty()
        && select.projection.iter().all(|item| match item {
            ast::SelectItem::UnnamedExpr(e) | ast::SelectItem::ExprWithAlias { expr: e, .. } => {
                match e {
                    ast::Expr::Function(_) => true,
                    ast::Expr::Identifier(id) => id.value.starts_with("@@"),
                    ast::Expr::CompoundIdentifier(ids) => {
                        ids.first().map(|i| i.value.starts_with("@@")).unwrap_or(false)
                    }
                    _ => false,
                }
            }
            _ => false,
        })
}

fn convert_query(query: ast::Query, source: String) -> Result<Statement> {
    let select = match query.body.as_ref() {
        ast::SetExpr::Select(select) => select.as_ref().clone(),
        _ => {
            return Ok(Statement::Select(passthrough_select(source)));
        }
    };

    let system = select
        .from
        .iter()
        .any(|t| is_system_relation(&t.relation) || t.joins.iter().any(|j| is_system_relation(&j.relation)));
    if system || is_system_projection(&select) {
        return Ok(Statement::SystemSelect(SystemSelect { source }));
    }

    let mut from = Vec::new();
    let mut passthrough = query.with.is_some()
        || select.distinct.is_some()
        || !select.group_by.is_empty()
        || select.having.is_some()
        || query.fetch.is_some();
    for table in &select.from {
        if !matches!(table.relation, ast::TableFactor::Table { .. }) {
            passthrough = true;
        }
        from.push(relation_name(&table.relation));
        for join in &table.joins {
            from.push(relation_name(&join.relation));
        }
    }

    let limit = match &query.limit {
        None => None,
        Some(expr) => match literal_usize(expr) {
            Some(n) => Some(n),
            None => {
                passthrough = true;
                None
            }
        },
    };
    let offset = match &query.offset {
        None => 0,
        Some(offset) => literal_usize(&offset.value).unwrap_or_else(|| {
            passthrough = true;
            0
        }),
    };

    let projection = select
        .projection
        .into_iter()
        .map(|item| match item {
            ast::SelectItem::Wildcard(_) | ast::SelectItem::QualifiedWildcard(_, _) => {
                Selector::Wildcard
            }
            ast::SelectItem::UnnamedExpr(expr) => Selector::Expr {
                expr: convert_expr(expr),
                alias: None,
            },
            ast::SelectItem::ExprWithAlias { expr, alias } => Selector::Expr {
                expr: convert_expr(expr),
                alias: Some(ident(&alias)),
            },
        })
        .collect();

    Ok(Statement::Select(Select {
        from,
        projection,
        selection: select.selection.map(convert_expr),
        order_by: query
            .order_by
            .into_iter()
            .map(|o| OrderBy {
                expr: convert_expr(o.expr),
                ascending: o.asc.unwrap_or(true),
            })
            .collect(),
        limit,
        offset,
        passthrough,
        source: Some(source),
    }))
}

fn passthrough_select(source: String) -> Select {
    Select {
        from: Vec::new(),
        projection: Vec::new(),
        selection: None,
        order_by: Vec::new(),
        limit: None,
        offset: 0,
        passthrough: true,
        source: Some(source),
    }
}

fn literal_usize(expr: &ast::Expr) -> Option<usize> {
    match expr {
        ast::Expr::Value(ast::Value::Number(n, _)) => n.parse().ok(),
        _ => None,
    }
}

/// Converts a grammar expression; unsupported shapes become `Expr::Raw`.
pub(crate) fn convert_expr(expr: ast::Expr) -> Expr {
    let raw = |e: &ast::Expr| Expr::Raw(e.to_string());
    match expr {
        ast::Expr::Identifier(id) => Expr::Column(id.value),
        ast::Expr::CompoundIdentifier(ids) => {
            Expr::Column(ids.last().map(ident).unwrap_or_default())
        }
        ast::Expr::Value(value) => convert_value(&value)
            .map(Expr::Literal)
            .unwrap_or_else(|| Expr::Raw(value.to_string())),
        ast::Expr::Nested(inner) => convert_expr(*inner),
        ast::Expr::IsNull(inner) => Expr::IsNull {
            expr: Box::new(convert_expr(*inner)),
            negated: false,
        },
        ast::Expr::IsNotNull(inner) => Expr::IsNull {
            expr: Box::new(convert_expr(*inner)),
            negated: true,
        },
        ast::Expr::InList { expr, list, negated } => Expr::InList {
            expr: Box::new(convert_expr(*expr)),
            list: list.into_iter().map(convert_expr).collect(),
            negated,
        },
        ast::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Expr::Between {
            expr: Box::new(convert_expr(*expr)),
            low: Box::new(convert_expr(*low)),
            high: Box::new(convert_expr(*high)),
            negated,
        },
        ast::Expr::Like {
            negated,
            expr,
            pattern,
            escape_char: None,
        } => Expr::Like {
            expr: Box::new(convert_expr(*expr)),
            pattern: Box::new(convert_expr(*pattern)),
            negated,
        },
        ast::Expr::UnaryOp { op, expr } => {
            let op = match op {
                ast::UnaryOperator::Not => UnaryOp::Not,
                ast::UnaryOperator::Minus => UnaryOp::Minus,
                ast::UnaryOperator::Plus => UnaryOp::Plus,
                other => return Expr::Raw(format!("{}{}", other, expr)),
            };
            Expr::Unary {
                op,
                expr: Box::new(convert_expr(*expr)),
            }
        }
        ast::Expr::BinaryOp { left, op, right } => match convert_binary_op(&op) {
            Some(op) => Expr::Binary {
                left: Box::new(convert_expr(*left)),
                op,
                right: Box::new(convert_expr(*right)),
            },
            None => Expr::Raw(format!("{} {} {}", left, op, right)),
        },
        ast::Expr::Function(func) => {
            if func.over.is_some() || func.distinct {
                return Expr::Raw(func.to_string());
            }
            let mut args = Vec::new();
            let mut wildcard = false;
            for arg in func.args {
                match arg {
                    ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(e)) => {
                        args.push(convert_expr(e))
                    }
                    ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Wildcard) => wildcard = true,
                    other => args.push(Expr::Raw(other.to_string())),
                }
            }
            Expr::Function {
                name: object_name(&func.name),
                args,
                wildcard,
            }
        }
        other => raw(&other),
    }
}

fn convert_binary_op(op: &ast::BinaryOperator) -> Option<BinaryOp> {
    Some(match op {
        ast::BinaryOperator::Plus => BinaryOp::Plus,
        ast::BinaryOperator::Minus => BinaryOp::Minus,
        ast::BinaryOperator::Multiply => BinaryOp::Multiply,
        ast::BinaryOperator::Divide => BinaryOp::Divide,
        ast::BinaryOperator::Modulo => BinaryOp::Modulo,
        ast::BinaryOperator::StringConcat => BinaryOp::Concat,
        ast::BinaryOperator::Eq => BinaryOp::Eq,
        ast::BinaryOperator::NotEq => BinaryOp::NotEq,
        ast::BinaryOperator::Lt => BinaryOp::Lt,
        ast::BinaryOperator::LtEq => BinaryOp::LtEq,
        ast::BinaryOperator::Gt => BinaryOp::Gt,
        ast::BinaryOperator::GtEq => BinaryOp::GtEq,
        ast::BinaryOperator::And => BinaryOp::And,
        ast::BinaryOperator::Or => BinaryOp::Or,
        _ => return None,
    })
}

fn convert_value(value: &ast::Value) -> Option<Value> {
    match value {
        ast::Value::Null => Some(Value::Null),
        ast::Value::Boolean(b) => Some(Value::Integer(if *b { 1 } else { 0 })),
        ast::Value::Number(n, _) => n
            .parse::<i64>()
            .map(Value::Integer)
            .ok()
            .or_else(|| n.parse::<f64>().map(Value::Real).ok()),
        ast::Value::SingleQuotedString(s)
        | ast::Value::DoubleQuotedString(s)
        | ast::Value::EscapedStringLiteral(s)
        | ast::Value::NationalStringLiteral(s) => Some(Value::Text(s.clone())),
        ast::Value::HexStringLiteral(hex) => decode_hex(hex).map(Value::Blob),
        _ => None,
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transaction_control() {
        assert_eq!(parse_one("BEGIN", Dialect::MySql).unwrap(), Statement::Begin);
        assert_eq!(
            parse_one("START TRANSACTION", Dialect::PostgreSql).unwrap(),
            Statement::Begin
        );
        assert_eq!(parse_one("COMMIT", Dialect::Generic).unwrap(), Statement::Commit);
        assert_eq!(parse_one("ROLLBACK", Dialect::Generic).unwrap(), Statement::Rollback);
    }

    #[test]
    fn test_parse_database_statements() {
        match parse_one("CREATE DATABASE IF NOT EXISTS shop", Dialect::MySql).unwrap() {
            Statement::CreateDatabase(s) => {
                assert_eq!(s.name, "shop");
                assert!(s.if_not_exists);
            }
            other => panic!("Expected CreateDatabase, got {:?}", other),
        }
        match parse_one("DROP DATABASE IF EXISTS shop;", Dialect::MySql).unwrap() {
            Statement::DropDatabase(s) => {
                assert_eq!(s.name, "shop");
                assert!(s.if_exists);
            }
            other => panic!("Expected DropDatabase, got {:?}", other),
        }
        match parse_one("ALTER DATABASE shop CHARACTER SET utf8", Dialect::MySql).unwrap() {
            Statement::AlterDatabase(s) => assert_eq!(s.name, "shop"),
            other => panic!("Expected AlterDatabase, got {:?}", other),
        }
        assert_eq!(
            parse_one("USE shop", Dialect::MySql).unwrap(),
            Statement::Use(UseDatabase {
                name: "shop".to_string()
            })
        );
    }

    #[test]
    fn test_parse_create_table() {
        let stmt = parse_one(
            "CREATE TABLE IF NOT EXISTS users (id INTEGER NOT NULL, name VARCHAR(20))",
            Dialect::Generic,
        )
        .unwrap();
        match stmt {
            Statement::CreateTable(t) => {
                assert_eq!(t.name, "users");
                assert!(t.if_not_exists);
                assert_eq!(t.columns.len(), 2);
                assert_eq!(t.columns[0].data_type, DataType::Integer);
                assert_eq!(t.columns[0].constraints, vec!["NOT NULL".to_string()]);
                assert_eq!(t.columns[1].data_type, DataType::Text);
            }
            other => panic!("Expected CreateTable, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert_values() {
        let stmt = parse_one(
            "INSERT INTO users (id, name) VALUES (1, 'a'), (2, NULL)",
            Dialect::Generic,
        )
        .unwrap();
        match stmt {
            Statement::Insert(insert) => {
                assert_eq!(insert.table, "users");
                assert_eq!(insert.columns, vec!["id", "name"]);
                match insert.source_rows {
                    InsertSource::Values(rows) => {
                        assert_eq!(rows.len(), 2);
                        assert_eq!(rows[0][1], Expr::Literal(Value::Text("a".to_string())));
                        assert_eq!(rows[1][1], Expr::Literal(Value::Null));
                    }
                    other => panic!("Expected VALUES, got {:?}", other),
                }
            }
            other => panic!("Expected Insert, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_select_paging() {
        let stmt = parse_one(
            "SELECT id, name AS n FROM users WHERE id > 1 ORDER BY id DESC LIMIT 2 OFFSET 1",
            Dialect::PostgreSql,
        )
        .unwrap();
        match stmt {
            Statement::Select(select) => {
                assert_eq!(select.from, vec!["users"]);
                assert_eq!(select.projection.len(), 2);
                assert_eq!(select.projection[1].output_name(), "n");
                assert_eq!(select.limit, Some(2));
                assert_eq!(select.offset, 1);
                assert!(!select.order_by[0].ascending);
                assert!(!select.passthrough);
                assert!(select.selection.is_some());
            }
            other => panic!("Expected Select, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_join_lists_every_table() {
        match parse_one("SELECT * FROM a JOIN b ON a.id = b.id", Dialect::Generic).unwrap() {
            Statement::Select(select) => assert_eq!(select.from, vec!["a", "b"]),
            other => panic!("Expected Select, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_system_selects() {
        for sql in [
            "SELECT * FROM information_schema.tables",
            "SELECT name FROM sqlite_master",
            "SELECT version()",
            "SELECT @@version_comment",
        ] {
            match parse_one(sql, Dialect::MySql).unwrap() {
                Statement::SystemSelect(_) => {}
                other => panic!("Expected SystemSelect for {}, got {:?}", sql, other),
            }
        }
    }

    #[test]
    fn test_parse_grouped_query_is_passthrough() {
        match parse_one("SELECT name, COUNT(*) FROM users GROUP BY name", Dialect::Generic).unwrap() {
            Statement::Select(select) => assert!(select.passthrough),
            other => panic!("Expected Select, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_update_and_delete() {
        match parse_one("UPDATE users SET name = 'b' WHERE id = 1", Dialect::Generic).unwrap() {
            Statement::Update(update) => {
                assert_eq!(update.table, "users");
                assert_eq!(update.assignments[0].0, "name");
            }
            other => panic!("Expected Update, got {:?}", other),
        }
        match parse_one("DELETE FROM users WHERE id = 1", Dialect::Generic).unwrap() {
            Statement::Delete(delete) => assert_eq!(delete.table, "users"),
            other => panic!("Expected Delete, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_drop_and_alter_table() {
        match parse_one("DROP TABLE IF EXISTS a, b", Dialect::Generic).unwrap() {
            Statement::DropTable(drop) => {
                assert_eq!(drop.names, vec!["a", "b"]);
                assert!(drop.if_exists);
            }
            other => panic!("Expected DropTable, got {:?}", other),
        }
        match parse_one("ALTER TABLE users ADD COLUMN age INTEGER", Dialect::Generic).unwrap() {
            Statement::AlterTable(alter) => match alter.operation {
                AlterOperation::AddColumn(col) => assert_eq!(col.name, "age"),
                other => panic!("Expected AddColumn, got {:?}", other),
            },
            other => panic!("Expected AlterTable, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_copy_from_stdin() {
        match parse_one("COPY users (id, name) FROM STDIN", Dialect::PostgreSql).unwrap() {
            Statement::Copy(copy) => {
                assert_eq!(copy.table, "users");
                assert_eq!(copy.columns, vec!["id", "name"]);
                assert!(copy.rows.is_empty());
            }
            other => panic!("Expected Copy, got {:?}", other),
        }

        let sql = "COPY users (id, name) FROM STDIN;\n1\talice\n2\t\\N\n\\.\n";
        match parse_one(sql, Dialect::PostgreSql).unwrap() {
            Statement::Copy(copy) => {
                assert_eq!(copy.rows.len(), 2);
                assert_eq!(copy.rows[0], vec![Some("1".to_string()), Some("alice".to_string())]);
                assert_eq!(copy.rows[1], vec![Some("2".to_string()), None]);
            }
            other => panic!("Expected Copy, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error() {
        match parse("SELEC oops", Dialect::Generic) {
            Err(SqlFrontError::Parse(_)) => {}
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }
}

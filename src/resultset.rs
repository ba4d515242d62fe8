/// Result Set Module
///
/// A result set is either a schema-carrying cursor over the rows of a query
/// or a bare affected-row count for a mutating statement. Raw backend values
/// are scanned into typed slots chosen from the inferred column types before
/// they are handed out as name-keyed rows.
use crate::core::{DataType, Result, SqlFrontError, Value};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// One result column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Column {
            name: name.to_string(),
            data_type,
        }
    }
}

/// Ordered column list of a row-returning statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Schema { columns }
    }

    /// Infers a schema from backend column metadata.
    ///
    /// # Arguments
    ///
    /// * `columns` - Column names paired with their declared type, if any
    ///
    /// # Returns
    ///
    /// The schema, or `UnsupportedType` for the first unmappable type name.
    pub fn infer<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Option<S>)>,
        S: AsRef<str>,
    {
        let columns = columns
            .into_iter()
            .map(|(name, declared)| {
                let data_type = DataType::infer(declared.as_ref().map(|d| d.as_ref()))?;
                Ok(Column::new(name.as_ref(), data_type))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// A materialized row: typed values keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.index_of(name).and_then(|i| self.values.get(i))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Projects the row into a name-keyed map.
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.schema
            .columns()
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.name.clone(), v.clone()))
            .collect()
    }

    /// Renders the row as a JSON object in column order.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut object = serde_json::Map::new();
        for (column, value) in self.schema.columns().iter().zip(self.values.iter()) {
            object.insert(column.name.clone(), serde_json::to_value(value)?);
        }
        Ok(serde_json::Value::Object(object))
    }
}

/// Source of raw backend rows behind a result set.
pub trait RowCursor: Send {
    /// Returns the next raw row, or `None` when exhausted.
    fn next_raw(&mut self) -> Result<Option<Vec<Value>>>;

    /// Releases backend resources.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Cursor over rows already fetched from the backend.
#[derive(Debug, Default)]
pub struct BufferedCursor {
    rows: VecDeque<Vec<Value>>,
}

impl BufferedCursor {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        BufferedCursor { rows: rows.into() }
    }
}

impl RowCursor for BufferedCursor {
    fn next_raw(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }
}

/// Response payload of a statement.
pub struct ResultSet {
    schema: Option<Arc<Schema>>,
    cursor: Option<Box<dyn RowCursor>>,
    current: Option<Vec<Value>>,
    rows_affected: u64,
    closed: bool,
}

impl ResultSet {
    /// Result of a mutating statement: a count and no schema.
    pub fn from_rows_affected(rows_affected: u64) -> Self {
        ResultSet {
            schema: None,
            cursor: None,
            current: None,
            rows_affected,
            closed: false,
        }
    }

    /// Result of a query backed by an arbitrary cursor.
    pub fn from_cursor(schema: Schema, cursor: Box<dyn RowCursor>) -> Self {
        ResultSet {
            schema: Some(Arc::new(schema)),
            cursor: Some(cursor),
            current: None,
            rows_affected: 0,
            closed: false,
        }
    }

    /// Result of a query whose rows are already in memory.
    pub fn from_rows(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        ResultSet::from_cursor(schema, Box::new(BufferedCursor::new(rows)))
    }

    /// Defined only for row-returning statements.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_deref()
    }

    /// 0 for queries, the backend count for mutations.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Advances to the next row.
    ///
    /// # Returns
    ///
    /// `Ok(true)` when a row is available, `Ok(false)` when exhausted (always
    /// for affected-count results), `CursorClosed` after `close()`.
    pub fn next(&mut self) -> Result<bool> {
        if self.closed {
            return Err(SqlFrontError::CursorClosed);
        }
        self.current = match self.cursor.as_mut() {
            Some(cursor) => cursor.next_raw()?,
            None => None,
        };
        Ok(self.current.is_some())
    }

    /// Materializes the current row.
    ///
    /// Each raw value is scanned into a slot typed by its column, then the
    /// slots are keyed by column name.
    pub fn row(&self) -> Result<Row> {
        if self.closed {
            return Err(SqlFrontError::CursorClosed);
        }
        let (schema, raw) = match (&self.schema, &self.current) {
            (Some(schema), Some(raw)) => (schema, raw),
            _ => return Err(SqlFrontError::App("no current row".to_string())),
        };
        let values = schema
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                raw.get(i)
                    .cloned()
                    .unwrap_or(Value::Null)
                    .scan(column.data_type)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Row {
            schema: Arc::clone(schema),
            values,
        })
    }

    /// Drains every remaining row, then closes the result set.
    pub fn rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while self.next()? {
            rows.push(self.row()?);
        }
        self.close()?;
        Ok(rows)
    }

    /// Releases the cursor. Safe to call any number of times.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.current = None;
        match self.cursor.take() {
            Some(mut cursor) => cursor.close(),
            None => Ok(()),
        }
    }
}

impl Drop for ResultSet {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("schema", &self.schema)
            .field("rows_affected", &self.rows_affected)
            .field("closed", &self.closed)
            .finish()
    }
}

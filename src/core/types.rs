/// Semantic data types and values
///
/// Every backend value that crosses the dispatch bridge is expressed with
/// the types in this module, so protocol front-ends never see SQLite or
/// in-memory store representations directly.
use crate::core::{Result, SqlFrontError};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Semantic column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataType {
    Integer,
    Real,
    Text,
    Blob,
    Numeric,
    Timestamp,
    DateTime,
    /// Columns without a declared type, e.g. computed expressions.
    Dynamic,
}

impl DataType {
    /// Classifies a declared column type for table schemas.
    ///
    /// Follows SQLite column affinity, so it never fails: anything that is
    /// not recognizably integer, text, blob or real becomes `Numeric`.
    pub fn from_column_type(declared: &str) -> DataType {
        let upper = declared.to_uppercase();
        if upper.contains("INT") {
            DataType::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            DataType::Text
        } else if upper.is_empty() || upper.contains("BLOB") || upper.contains("BINARY") {
            DataType::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            DataType::Real
        } else {
            DataType::Numeric
        }
    }

    /// Infers the result set type of a backend column.
    ///
    /// # Arguments
    ///
    /// * `declared` - The backend-reported declared type, `None` for expression columns
    ///
    /// # Returns
    ///
    /// The semantic type, or `SqlFrontError::UnsupportedType` for names that
    /// cannot be mapped.
    pub fn infer(declared: Option<&str>) -> Result<DataType> {
        let declared = match declared {
            Some(d) if !d.trim().is_empty() => d.trim().to_uppercase(),
            _ => return Ok(DataType::Dynamic),
        };
        if declared.contains("INT") {
            return Ok(DataType::Integer);
        }
        if ["REAL", "FLOAT", "DOUBLE", "NUMERIC", "DECIMAL"]
            .iter()
            .any(|p| declared.starts_with(p))
        {
            return Ok(DataType::Real);
        }
        if declared.starts_with("TEXT") || declared.starts_with("CLOB") || declared.contains("CHAR") {
            return Ok(DataType::Text);
        }
        if declared.starts_with("BLOB") || declared.starts_with("BINARY") || declared.starts_with("VARBINARY") {
            return Ok(DataType::Blob);
        }
        if declared.starts_with("TIMESTAMP") {
            return Ok(DataType::Timestamp);
        }
        if declared.starts_with("DATETIME") || declared.starts_with("DATE") {
            return Ok(DataType::DateTime);
        }
        Err(SqlFrontError::UnsupportedType(declared))
    }

    /// Returns the SQL spelling used when rendering DDL.
    pub fn sql_name(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Real => "REAL",
            DataType::Text => "TEXT",
            DataType::Blob => "BLOB",
            DataType::Numeric => "NUMERIC",
            DataType::Timestamp => "TIMESTAMP",
            DataType::DateTime => "DATETIME",
            DataType::Dynamic => "",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Dynamic => write!(f, "DYNAMIC"),
            other => write!(f, "{}", other.sql_name()),
        }
    }
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// A protocol-neutral SQL value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(r) => Some(*r as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(r) => Some(*r),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// SQL truthiness: NULL and zero are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Blob(b) => !b.is_empty(),
            Value::Timestamp(_) => true,
            other => other.as_f64().map(|f| f != 0.0).unwrap_or(false),
        }
    }

    /// Compares two values with SQL semantics; NULL compares as unknown.
    pub fn sql_cmp(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        Some(self.sort_cmp(other))
    }

    /// Total ordering used for sorting: NULL < numbers < text < blobs.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Text(b)) => parse_timestamp(b)
                .map(|b| a.cmp(&b))
                .unwrap_or(Ordering::Less),
            (Value::Text(a), Value::Timestamp(b)) => parse_timestamp(a)
                .map(|a| a.cmp(b))
                .unwrap_or(Ordering::Greater),
            (a, b) if a.rank() == 1 && b.rank() == 1 => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) | Value::Real(_) => 1,
            Value::Text(_) | Value::Timestamp(_) => 2,
            Value::Blob(_) => 3,
        }
    }

    /// Scans this raw value into a typed slot of the given type.
    ///
    /// NULL is accepted by every slot. `Dynamic` slots keep the raw value.
    pub fn scan(self, ty: DataType) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let conversion = |v: &Value| {
            SqlFrontError::Conversion(format!("cannot scan {:?} into {} slot", v, ty))
        };
        match ty {
            DataType::Integer => match &self {
                Value::Integer(_) => Ok(self),
                Value::Real(r) if r.fract() == 0.0 && *r >= i64::MIN as f64 && *r < i64::MAX as f64 => {
                    Ok(Value::Integer(*r as i64))
                }
                // a fractional part would be lost
                Value::Real(_) => Err(conversion(&self)),
                _ => self.as_i64().map(Value::Integer).ok_or_else(|| conversion(&self)),
            },
            DataType::Real | DataType::Numeric => {
                self.as_f64().map(Value::Real).ok_or_else(|| conversion(&self))
            }
            DataType::Text => match self {
                Value::Text(_) => Ok(self),
                Value::Blob(bytes) => String::from_utf8(bytes)
                    .map(Value::Text)
                    .map_err(|e| SqlFrontError::Conversion(e.to_string())),
                other => Ok(Value::Text(other.to_string())),
            },
            DataType::Blob => match self {
                Value::Blob(_) => Ok(self),
                other => Ok(Value::Blob(other.to_string().into_bytes())),
            },
            DataType::Timestamp | DataType::DateTime => match &self {
                Value::Timestamp(_) => Ok(self),
                Value::Text(s) => parse_timestamp(s)
                    .map(Value::Timestamp)
                    .ok_or_else(|| conversion(&self)),
                Value::Integer(secs) => chrono::DateTime::from_timestamp(*secs, 0)
                    .map(|dt| Value::Timestamp(dt.naive_utc()))
                    .ok_or_else(|| conversion(&self)),
                _ => Err(conversion(&self)),
            },
            DataType::Dynamic => Ok(self),
        }
    }

    /// Renders the value as a SQL literal.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(r) => format_real(*r),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Blob(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
                format!("X'{}'", hex)
            }
            Value::Timestamp(ts) => format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

fn format_real(r: f64) -> String {
    if r.fract() == 0.0 && r.is_finite() {
        format!("{:.1}", r)
    } else {
        r.to_string()
    }
}

/// Parses the timestamp spellings SQLite and the front-ends commonly emit.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", format_real(*r)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Blob(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(r) => Value::Real(r),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Timestamp(ts) => {
                ToSqlOutput::from(ts.format("%Y-%m-%d %H:%M:%S").to_string())
            }
        })
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

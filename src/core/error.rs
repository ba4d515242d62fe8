/// sqlfront Error Module
///
/// This module defines the error taxonomy shared by every layer of the
/// dispatch bridge. Statement handlers return these errors unchanged and the
/// protocol front-ends are responsible for encoding them on the wire.
use thiserror::Error;

/// Error type for the sqlfront dispatch bridge.
///
/// The variants cover:
/// - Registry and catalog conditions (already exists / does not exist)
/// - Unsupported statement forms and result materialization failures
/// - Authentication and certificate decisions
/// - Backend storage, configuration and I/O failures
/// - Aggregated lifecycle failures from the server orchestrator
#[derive(Error, Debug)]
pub enum SqlFrontError {
    /// A database with this name is already registered
    #[error("database '{0}' already exists")]
    DatabaseExists(String),

    /// No database with this name is registered
    #[error("database '{0}' does not exist")]
    DatabaseNotExist(String),

    /// A table with this name already exists in the current database
    #[error("table '{0}' already exists")]
    TableExists(String),

    /// The named table does not exist in the current database
    #[error("table '{0}' does not exist")]
    TableNotExist(String),

    /// A selector or assignment names a column missing from the schema
    #[error("column '{0}' does not exist")]
    ColumnNotExist(String),

    /// The connection has not selected a database yet
    #[error("no database selected")]
    NoDatabaseSelected,

    /// The statement form is recognized but not supported by this backend
    #[error("{0} is not implemented")]
    NotImplemented(String),

    /// SELECT with more than one table in its FROM clause
    #[error("multiple tables are not supported: {0}")]
    MultipleTableNotSupported(String),

    /// A backend column type that cannot be mapped to a semantic type
    #[error("unsupported data type: {0}")]
    UnsupportedType(String),

    /// Credential verification failed
    #[error("authentication failed for user '{0}'")]
    AuthenticationFailed(String),

    /// No peer certificate matched the configured common name patterns
    #[error("certificate rejected: {0}")]
    CertificateRejected(String),

    /// Iteration was attempted on a closed result set
    #[error("result set is closed")]
    CursorClosed,

    /// A value could not be converted to the requested type
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A registered object could not be removed
    #[error("could not delete {0}")]
    Deletion(String),

    /// SQL text could not be parsed into a statement
    #[error("parse error: {0}")]
    Parse(String),

    /// Errors reported by the embedded SQLite engine
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Configuration loading and validation errors
    #[error("configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML decoding errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Several lifecycle steps failed; every failure is kept
    #[error("{}", join_messages(.0))]
    Lifecycle(Vec<SqlFrontError>),

    /// Generic application errors for unexpected conditions
    #[error("application error: {0}")]
    App(String),
}

fn join_messages(errors: &[SqlFrontError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl SqlFrontError {
    /// Combines a list of failures into a single error.
    ///
    /// Returns `None` for an empty list and the error itself when there is
    /// only one, so callers never see a one-element `Lifecycle`.
    pub fn join(mut errors: Vec<SqlFrontError>) -> Option<SqlFrontError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(SqlFrontError::Lifecycle(errors)),
        }
    }

    /// True for the "already exists" family.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            SqlFrontError::DatabaseExists(_) | SqlFrontError::TableExists(_)
        )
    }

    /// True for the "does not exist" family.
    pub fn is_not_exist(&self) -> bool {
        matches!(
            self,
            SqlFrontError::DatabaseNotExist(_)
                | SqlFrontError::TableNotExist(_)
                | SqlFrontError::ColumnNotExist(_)
        )
    }
}

impl From<sqlparser::parser::ParserError> for SqlFrontError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        SqlFrontError::Parse(err.to_string())
    }
}

/// Shorthand used when a `Mutex` or `RwLock` is poisoned.
pub(crate) fn lock_error(what: &str) -> SqlFrontError {
    SqlFrontError::App(format!("Failed to acquire {} lock", what))
}

/// Type alias for Result to use SqlFrontError as the error type.
pub type Result<T> = std::result::Result<T, SqlFrontError>;

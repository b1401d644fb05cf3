//! Error types for post-fetch operations.

use std::fmt;

/// The primary error type for all postfetch operations.
#[derive(Debug)]
pub enum Error {
    /// Query execution errors raised by the backend or the query executor
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Configuration errors
    Config(ConfigError),
    /// A raw row did not match any supported result shape
    UnsupportedRowShape(RowShapeError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message (the usual way for a hook to fail)
    Custom(String),
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub table: Option<&'static str>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Table or row not found
    NotFound,
    /// More rows than the retrieval path allows
    MultipleRows,
    /// Unknown field or relation name
    InvalidField,
    /// Other backend error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub rust_type: Option<&'static str>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Describes a raw row that could not be classified.
#[derive(Debug, Clone)]
pub struct RowShapeError {
    /// Table of the model the query was built for.
    pub table: &'static str,
    /// The shape the query declared.
    pub expected: &'static str,
    /// What the row producer actually handed back.
    pub actual: String,
}

impl Error {
    /// Shorthand for a query error with the given kind.
    pub fn query(kind: QueryErrorKind, table: &'static str, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind,
            table: Some(table),
            message: message.into(),
            source: None,
        })
    }

    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Is this an unsupported-row-shape error?
    pub fn is_unsupported_row_shape(&self) -> bool {
        matches!(self, Error::UnsupportedRowShape(_))
    }

    /// The query error kind, if this is a query error.
    pub fn query_kind(&self) -> Option<QueryErrorKind> {
        match self {
            Error::Query(q) => Some(q.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Query(e) => {
                if let Some(table) = e.table {
                    write!(f, "Query error on '{}': {}", table, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::UnsupportedRowShape(e) => write!(f, "Unsupported row shape: {}", e),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for RowShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "query on '{}' expected {} rows, got {}",
            self.table, self.expected, self.actual
        )
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<RowShapeError> for Error {
    fn from(err: RowShapeError) -> Self {
        Error::UnsupportedRowShape(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for postfetch operations.
pub type Result<T> = std::result::Result<T, Error>;

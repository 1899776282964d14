//! Error types for table mapping operations.
//!
//! Provides a unified error type covering database access, declaration,
//! schema reconciliation, query translation and configuration failures.

use tablemap_core::{ConditionError, DeclarationError, ValueType};
use thiserror::Error;

/// Errors that can occur while mapping entity types to SQLite tables.
#[derive(Debug, Error)]
pub enum OrmError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Entity type declaration rejected at registration.
    #[error("declaration error: {0}")]
    DeclarationError(#[from] DeclarationError),

    /// Condition could not be translated or evaluated.
    #[error("translation error: {0}")]
    ConditionError(#[from] ConditionError),

    /// A live column disagrees with the declared column type.
    #[error(
        "column '{column}' in table '{table}' has type {found}, but the declared type is {expected}"
    )]
    SchemaConflict {
        table: String,
        column: String,
        expected: String,
        found: String,
    },

    /// Attempt to drop the row identity or a declared column.
    #[error("column '{column}' in table '{table}' cannot be dropped")]
    ColumnNotDroppable { table: String, column: String },

    /// Attempt to drop a table that is not procedural.
    #[error("table '{0}' is not procedural and cannot be dropped")]
    TableNotDroppable(String),

    /// A stored value could not be read as the column's value type.
    #[error("cannot read column '{column}' as {expected}: {reason}")]
    ConversionError {
        column: String,
        expected: ValueType,
        reason: String,
    },

    /// Database name contains characters other than alphanumerics and underscores.
    #[error("invalid database name '{0}': must contain only alphanumeric characters and underscores")]
    InvalidDatabaseName(String),

    /// Identifier cannot be quoted safely.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// No table mapping is registered for the entity type.
    #[error("no table mapping registered for type: {0}")]
    UnknownType(String),

    /// A procedural resource with the same name already exists.
    #[error("procedural resource already exists: {0}")]
    DuplicateResource(String),

    /// Index statement could not be parsed or applied.
    #[error("index error: {0}")]
    IndexError(String),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Convenience alias for results with [`OrmError`].
pub type Result<T> = std::result::Result<T, OrmError>;

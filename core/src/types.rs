//! Host value types, store column types, and the two-way mapping between them.
//!
//! Every mapped property declares a [`ValueType`]. The store persists it as
//! a [`ColumnType`] whose SQL keyword is written into `CREATE TABLE` and
//! `ALTER TABLE` statements, and parsed back from schema introspection.
//!
//! | Value type | Column keyword |
//! |------------|----------------|
//! | `Int16`    | `SMALLINT`     |
//! | `Int32`    | `INT`          |
//! | `Int64`    | `BIGINT`       |
//! | `Single`   | `SINGLE`       |
//! | `Double`   | `DOUBLE`       |
//! | `Decimal`  | `DECIMAL`      |
//! | `Byte`     | `TINYINT`      |
//! | `String`   | `TEXT`         |
//! | `Boolean`  | `BOOLEAN`      |
//! | `DateTime` | `DATETIME`     |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::validate::DeclarationError;

/// Value type of a mapped property.
///
/// Nullable properties use the same value type as their non-nullable
/// counterpart; nullability is tracked on the property descriptor.
///
/// # Examples
///
/// ```
/// use tablemap_core::{ColumnType, ValueType};
///
/// assert_eq!(ValueType::Int32.column_type(), ColumnType::Int);
/// assert!(ValueType::String.is_supported());
/// assert!(!ValueType::Unsupported.is_supported());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ValueType {
    /// Anything the store cannot persist. Never written to a table.
    #[default]
    Unsupported,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    Byte,
    String,
    Boolean,
    DateTime,
}

impl ValueType {
    /// All persistable value types.
    pub const SUPPORTED: [ValueType; 10] = [
        ValueType::Int16,
        ValueType::Int32,
        ValueType::Int64,
        ValueType::Single,
        ValueType::Double,
        ValueType::Decimal,
        ValueType::Byte,
        ValueType::String,
        ValueType::Boolean,
        ValueType::DateTime,
    ];

    /// Maps this value type to the column type it is stored as.
    pub const fn column_type(self) -> ColumnType {
        match self {
            ValueType::Int16 => ColumnType::SmallInt,
            ValueType::Int32 => ColumnType::Int,
            ValueType::Int64 => ColumnType::BigInt,
            ValueType::Single => ColumnType::Single,
            ValueType::Double => ColumnType::Double,
            ValueType::Decimal => ColumnType::Decimal,
            ValueType::Byte => ColumnType::TinyInt,
            ValueType::String => ColumnType::Text,
            ValueType::Boolean => ColumnType::Boolean,
            ValueType::DateTime => ColumnType::DateTime,
            ValueType::Unsupported => ColumnType::Unsupported,
        }
    }

    /// Returns `true` for every type except [`ValueType::Unsupported`].
    pub const fn is_supported(self) -> bool {
        !matches!(self, ValueType::Unsupported)
    }

    /// Returns `true` for the integer, floating point and decimal types.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::Int16
                | ValueType::Int32
                | ValueType::Int64
                | ValueType::Single
                | ValueType::Double
                | ValueType::Decimal
                | ValueType::Byte
        )
    }

    /// Stable name used when value types are listed or persisted.
    pub const fn name(self) -> &'static str {
        match self {
            ValueType::Int16 => "Int16",
            ValueType::Int32 => "Int32",
            ValueType::Int64 => "Int64",
            ValueType::Single => "Single",
            ValueType::Double => "Double",
            ValueType::Decimal => "Decimal",
            ValueType::Byte => "Byte",
            ValueType::String => "String",
            ValueType::Boolean => "Boolean",
            ValueType::DateTime => "DateTime",
            ValueType::Unsupported => "Unsupported",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Column type as declared in the store's schema.
///
/// Parsing is case-insensitive. Keywords the engine never writes parse
/// to an error through [`FromStr`], or to [`ColumnType::Unsupported`]
/// through [`ColumnType::parse_lossy`].
///
/// # Examples
///
/// ```
/// use tablemap_core::{ColumnType, ValueType};
///
/// let parsed: ColumnType = "bigint".parse().unwrap();
/// assert_eq!(parsed, ColumnType::BigInt);
/// assert_eq!(parsed.keyword(), "BIGINT");
/// assert_eq!(parsed.value_type(), ValueType::Int64);
/// assert_eq!(ColumnType::parse_lossy("BLOB"), ColumnType::Unsupported);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ColumnType {
    #[default]
    Unsupported,
    SmallInt,
    Int,
    BigInt,
    Single,
    Double,
    Decimal,
    TinyInt,
    Text,
    Boolean,
    DateTime,
}

impl ColumnType {
    /// Maps this column type back to the value type it holds.
    pub const fn value_type(self) -> ValueType {
        match self {
            ColumnType::SmallInt => ValueType::Int16,
            ColumnType::Int => ValueType::Int32,
            ColumnType::BigInt => ValueType::Int64,
            ColumnType::Single => ValueType::Single,
            ColumnType::Double => ValueType::Double,
            ColumnType::Decimal => ValueType::Decimal,
            ColumnType::TinyInt => ValueType::Byte,
            ColumnType::Text => ValueType::String,
            ColumnType::Boolean => ValueType::Boolean,
            ColumnType::DateTime => ValueType::DateTime,
            ColumnType::Unsupported => ValueType::Unsupported,
        }
    }

    /// The SQL keyword for this column type.
    pub const fn keyword(self) -> &'static str {
        match self {
            ColumnType::SmallInt => "SMALLINT",
            ColumnType::Int => "INT",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Single => "SINGLE",
            ColumnType::Double => "DOUBLE",
            ColumnType::Decimal => "DECIMAL",
            ColumnType::TinyInt => "TINYINT",
            ColumnType::Text => "TEXT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Unsupported => "UNSUPPORTED",
        }
    }

    /// Parses a keyword, mapping anything unknown to `Unsupported`.
    pub fn parse_lossy(keyword: &str) -> Self {
        keyword.parse().unwrap_or(ColumnType::Unsupported)
    }

    pub const fn is_supported(self) -> bool {
        !matches!(self, ColumnType::Unsupported)
    }
}

impl FromStr for ColumnType {
    type Err = DeclarationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SMALLINT" => Ok(ColumnType::SmallInt),
            "INT" => Ok(ColumnType::Int),
            "BIGINT" => Ok(ColumnType::BigInt),
            "SINGLE" => Ok(ColumnType::Single),
            "DOUBLE" => Ok(ColumnType::Double),
            "DECIMAL" => Ok(ColumnType::Decimal),
            "TINYINT" => Ok(ColumnType::TinyInt),
            "TEXT" => Ok(ColumnType::Text),
            "BOOLEAN" => Ok(ColumnType::Boolean),
            "DATETIME" => Ok(ColumnType::DateTime),
            _ => Err(DeclarationError::UnsupportedKeyword(s.to_string())),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl From<ValueType> for ColumnType {
    fn from(value_type: ValueType) -> Self {
        value_type.column_type()
    }
}

impl From<ColumnType> for ValueType {
    fn from(column_type: ColumnType) -> Self {
        column_type.value_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_for_every_supported_type() {
        for value_type in ValueType::SUPPORTED {
            assert_eq!(value_type.column_type().value_type(), value_type);
        }
    }

    #[test]
    fn test_keyword_round_trip() {
        for value_type in ValueType::SUPPORTED {
            let column_type = value_type.column_type();
            let parsed: ColumnType = column_type.keyword().parse().unwrap();
            assert_eq!(parsed, column_type);
        }
    }

    #[test]
    fn test_keyword_parsing_is_case_insensitive() {
        assert_eq!("text".parse::<ColumnType>().unwrap(), ColumnType::Text);
        assert_eq!("DateTime".parse::<ColumnType>().unwrap(), ColumnType::DateTime);
        assert_eq!(" tinyint ".parse::<ColumnType>().unwrap(), ColumnType::TinyInt);
    }

    #[test]
    fn test_unknown_keyword() {
        assert!("BLOB".parse::<ColumnType>().is_err());
        assert_eq!(ColumnType::parse_lossy("VARCHAR(20)"), ColumnType::Unsupported);
        assert_eq!(ColumnType::Unsupported.value_type(), ValueType::Unsupported);
    }

    #[test]
    fn test_unsupported_maps_to_unsupported() {
        assert_eq!(ValueType::Unsupported.column_type(), ColumnType::Unsupported);
        assert!(!ColumnType::Unsupported.is_supported());
    }
}

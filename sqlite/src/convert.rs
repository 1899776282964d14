//! Conversion between [`Value`]s and SQLite storage classes.
//!
//! Integers and booleans are stored as INTEGER, floats as REAL and
//! date-times as ISO-8601 TEXT. Decimals are bound as text, but a `DECIMAL`
//! column has NUMERIC affinity: SQLite keeps integral values as INTEGER and
//! converts the rest to REAL, which holds about 15 significant digits.
//! Reads are lenient about the storage class affinity chose for a value.

use std::str::FromStr;

use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tablemap_core::{DATETIME_FORMAT, Value, ValueType, parse_datetime};

use crate::error::{OrmError, Result};

/// Binds a [`Value`] as a statement parameter.
#[derive(Debug, Clone, Copy)]
pub struct SqlValue<'a>(pub &'a Value);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        let output = match self.0 {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Int16(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::Int32(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::Int64(v) => ToSqlOutput::Owned(Sql::Integer(*v)),
            Value::Byte(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::Boolean(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::Single(v) => ToSqlOutput::Owned(Sql::Real(f64::from(*v))),
            Value::Double(v) => ToSqlOutput::Owned(Sql::Real(*v)),
            Value::Decimal(v) => ToSqlOutput::Owned(Sql::Text(v.to_string())),
            Value::String(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::DateTime(v) => {
                ToSqlOutput::Owned(Sql::Text(v.format(DATETIME_FORMAT).to_string()))
            }
        };
        Ok(output)
    }
}

/// Coerces `value` to the column's value type where possible.
///
/// Values that cannot be coerced are bound as they are; SQLite columns
/// accept any storage class.
pub fn to_column_value(value: Value, value_type: ValueType) -> Value {
    match value.clone().coerce(value_type) {
        Some(coerced) => coerced,
        None => value,
    }
}

fn text(bytes: &[u8], column: &str, expected: ValueType) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| conversion(column, expected, e))
}

fn conversion(column: &str, expected: ValueType, reason: impl ToString) -> OrmError {
    OrmError::ConversionError {
        column: column.to_string(),
        expected,
        reason: reason.to_string(),
    }
}

/// Converts a REAL cell to a decimal, saturating at the decimal range.
fn decimal_from_real(f: f64) -> Option<Decimal> {
    if f.is_nan() {
        return None;
    }
    Some(Decimal::from_f64(f).unwrap_or(if f.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    }))
}

/// Reads a stored value as the column's value type.
///
/// NULL reads as [`Value::Null`] for every type. Columns of unsupported
/// type read as the natural value of their storage class.
pub fn read_value(raw: ValueRef<'_>, value_type: ValueType, column: &str) -> Result<Value> {
    let fail = |reason: &str| conversion(column, value_type, reason);

    if let ValueRef::Null = raw {
        return Ok(Value::Null);
    }
    if let ValueRef::Blob(_) = raw {
        return Err(fail("blob values are not supported"));
    }

    let natural = match raw {
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Double(f),
        ValueRef::Text(bytes) => Value::String(text(bytes, column, value_type)?),
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
    };

    let value = match value_type {
        ValueType::Unsupported => natural,
        ValueType::Decimal => match raw {
            ValueRef::Integer(i) => Value::Decimal(Decimal::from(i)),
            ValueRef::Real(f) => {
                Value::Decimal(decimal_from_real(f).ok_or_else(|| fail("NaN is not a decimal"))?)
            }
            ValueRef::Text(bytes) => {
                let text = text(bytes, column, value_type)?;
                Value::Decimal(Decimal::from_str(text.trim()).map_err(|e| fail(&e.to_string()))?)
            }
            _ => return Err(fail("unexpected storage class")),
        },
        ValueType::DateTime => match natural {
            Value::String(s) => {
                Value::DateTime(parse_datetime(&s).ok_or_else(|| fail("invalid date-time text"))?)
            }
            _ => return Err(fail("date-times are stored as text")),
        },
        ValueType::Boolean => match natural {
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => Value::Boolean(true),
                "0" | "false" => Value::Boolean(false),
                _ => return Err(fail("invalid boolean text")),
            },
            other => other
                .coerce(ValueType::Boolean)
                .ok_or_else(|| fail("invalid boolean"))?,
        },
        ValueType::Int16 | ValueType::Int32 | ValueType::Int64 | ValueType::Byte => {
            let integer = match natural {
                Value::String(s) => Value::Int64(s.trim().parse().map_err(|_| fail("invalid integer text"))?),
                Value::Double(f) if f.fract() == 0.0 => Value::Int64(f as i64),
                other => other,
            };
            integer
                .coerce(value_type)
                .ok_or_else(|| fail("integer out of range"))?
        }
        ValueType::Single | ValueType::Double => {
            let number = match natural {
                Value::String(s) => Value::Double(s.trim().parse().map_err(|_| fail("invalid number text"))?),
                other => other,
            };
            number
                .coerce(value_type)
                .ok_or_else(|| fail("invalid number"))?
        }
        ValueType::String => match natural {
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn round_trip(value: Value, keyword: &str, value_type: ValueType) -> Value {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&format!("CREATE TABLE t (v {keyword})"))
            .unwrap();
        conn.execute("INSERT INTO t (v) VALUES (?1)", [SqlValue(&value)])
            .unwrap();
        conn.query_row("SELECT v FROM t", [], |row| {
            Ok(read_value(row.get_ref(0)?, value_type, "v").unwrap())
        })
        .unwrap()
    }

    #[test]
    fn test_integers_and_booleans() {
        assert_eq!(round_trip(Value::Int16(-3), "SMALLINT", ValueType::Int16), Value::Int16(-3));
        assert_eq!(round_trip(Value::Byte(200), "TINYINT", ValueType::Byte), Value::Byte(200));
        assert_eq!(
            round_trip(Value::Boolean(true), "BOOLEAN", ValueType::Boolean),
            Value::Boolean(true)
        );
    }

    fn stored_decimal(text: &str) -> Decimal {
        let d = Decimal::from_str(text).unwrap();
        match round_trip(Value::Decimal(d), "DECIMAL", ValueType::Decimal) {
            Value::Decimal(read) => read,
            other => panic!("expected a decimal, got {other:?}"),
        }
    }

    #[test]
    fn test_decimal_integral_values_are_exact() {
        assert_eq!(stored_decimal("-42"), Decimal::from(-42));
        assert_eq!(stored_decimal("9223372036854775807"), Decimal::from(i64::MAX));
    }

    #[test]
    fn test_decimal_keeps_fifteen_significant_digits() {
        assert_eq!(stored_decimal("0.1"), Decimal::from_str("0.1").unwrap());
        assert_eq!(stored_decimal("10.50"), Decimal::from_str("10.5").unwrap());

        let long = Decimal::from_str("1.2345678901234567890123").unwrap();
        let read = stored_decimal("1.2345678901234567890123");
        assert!((read - long).abs() < Decimal::from_str("0.000000000000001").unwrap());
    }

    #[test]
    fn test_decimal_near_range_limit_saturates() {
        assert_eq!(stored_decimal("79228162514264337593543950335"), Decimal::MAX);
        assert_eq!(stored_decimal("-79228162514264337593543950335"), Decimal::MIN);
        assert_eq!(
            read_value(ValueRef::Real(1e40), ValueType::Decimal, "c").unwrap(),
            Value::Decimal(Decimal::MAX)
        );
    }

    #[test]
    fn test_datetime_is_iso_text() {
        let dt = chrono::NaiveDate::from_ymd_opt(2020, 1, 31)
            .unwrap()
            .and_hms_opt(23, 59, 1)
            .unwrap();
        assert_eq!(
            round_trip(Value::DateTime(dt), "DATETIME", ValueType::DateTime),
            Value::DateTime(dt)
        );
    }

    #[test]
    fn test_null_reads_as_null() {
        assert_eq!(round_trip(Value::Null, "INT", ValueType::Int32), Value::Null);
    }

    #[test]
    fn test_lenient_reads() {
        assert_eq!(
            read_value(ValueRef::Text(b"42"), ValueType::Int32, "c").unwrap(),
            Value::Int32(42)
        );
        assert_eq!(
            read_value(ValueRef::Integer(7), ValueType::String, "c").unwrap(),
            Value::from("7")
        );
        assert_eq!(
            read_value(ValueRef::Text(b"2024-05-06 07:08:09"), ValueType::DateTime, "c").unwrap(),
            Value::DateTime(
                chrono::NaiveDate::from_ymd_opt(2024, 5, 6)
                    .unwrap()
                    .and_hms_opt(7, 8, 9)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_out_of_range_is_error() {
        let err = read_value(ValueRef::Integer(70_000), ValueType::Int16, "c").unwrap_err();
        assert!(matches!(err, OrmError::ConversionError { .. }));
        assert!(read_value(ValueRef::Blob(&[1, 2]), ValueType::String, "c").is_err());
    }

    #[test]
    fn test_to_column_value() {
        assert_eq!(to_column_value(Value::Int32(3), ValueType::Int64), Value::Int64(3));
        assert_eq!(to_column_value(Value::from("x"), ValueType::Int32), Value::from("x"));
    }
}

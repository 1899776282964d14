//! Runtime values carried between entities, conditions and the store.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::types::ValueType;

/// Format used when date-times are written as text.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A single property or column value.
///
/// [`Value::Null`] stands for an absent value on both sides of the
/// mapping: an unset nullable property, or a NULL column.
///
/// # Examples
///
/// ```
/// use tablemap_core::{Value, ValueType};
///
/// let v = Value::from(42_i32);
/// assert_eq!(v.value_type(), Some(ValueType::Int32));
///
/// let none: Option<String> = None;
/// assert!(Value::from(none).is_null());
///
/// let back: i32 = Value::Int32(7).try_into().unwrap();
/// assert_eq!(back, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    #[default]
    Null,
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    Decimal(Decimal),
    Byte(u8),
    String(String),
    Boolean(bool),
    DateTime(NaiveDateTime),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Value type of this value, or `None` for [`Value::Null`].
    pub const fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::Int16(_) => Some(ValueType::Int16),
            Value::Int32(_) => Some(ValueType::Int32),
            Value::Int64(_) => Some(ValueType::Int64),
            Value::Single(_) => Some(ValueType::Single),
            Value::Double(_) => Some(ValueType::Double),
            Value::Decimal(_) => Some(ValueType::Decimal),
            Value::Byte(_) => Some(ValueType::Byte),
            Value::String(_) => Some(ValueType::String),
            Value::Boolean(_) => Some(ValueType::Boolean),
            Value::DateTime(_) => Some(ValueType::DateTime),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int16(v) => Some(i64::from(v)),
            Value::Int32(v) => Some(i64::from(v)),
            Value::Int64(v) => Some(v),
            Value::Byte(v) => Some(i64::from(v)),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Single(v) => Some(f64::from(v)),
            Value::Double(v) => Some(v),
            Value::Decimal(v) => v.to_f64(),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Compares two values of compatible types.
    ///
    /// Integers compare exactly, mixed integer/decimal pairs compare as
    /// decimals, and any pair involving a float compares as `f64`. Strings
    /// compare lexically, booleans as `false < true`, and date-times
    /// chronologically. Returns `None` for NULL or incompatible pairs.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), Value::Decimal(b)) => Some(a.cmp(b)),
            (Value::Decimal(a), b) if b.as_i64().is_some() => {
                b.as_i64().map(|b| a.cmp(&Decimal::from(b)))
            }
            (a, Value::Decimal(b)) if a.as_i64().is_some() => {
                a.as_i64().map(|a| Decimal::from(a).cmp(b))
            }
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
            },
        }
    }

    /// Converts this value to the given value type, if the conversion is lossless
    /// or a plain widening.
    ///
    /// Used when values read from untyped sources (dynamic members,
    /// condition literals) are bound to typed columns.
    pub fn coerce(self, target: ValueType) -> Option<Value> {
        if self.is_null() || self.value_type() == Some(target) {
            return Some(self);
        }
        let coerced = match target {
            ValueType::Int16 => Value::Int16(i16::try_from(self.as_i64()?).ok()?),
            ValueType::Int32 => Value::Int32(i32::try_from(self.as_i64()?).ok()?),
            ValueType::Int64 => Value::Int64(self.as_i64()?),
            ValueType::Byte => Value::Byte(u8::try_from(self.as_i64()?).ok()?),
            ValueType::Single => Value::Single(self.as_f64()? as f32),
            ValueType::Double => Value::Double(self.as_f64()?),
            ValueType::Decimal => match self {
                Value::Single(v) => Value::Decimal(Decimal::from_f32(v)?),
                Value::Double(v) => Value::Decimal(Decimal::from_f64(v)?),
                ref other => Value::Decimal(Decimal::from(other.as_i64()?)),
            },
            ValueType::Boolean => Value::Boolean(self.as_i64()? != 0),
            ValueType::String => Value::String(self.to_string()),
            ValueType::DateTime => match self {
                Value::String(s) => Value::DateTime(parse_datetime(&s)?),
                _ => return None,
            },
            ValueType::Unsupported => return None,
        };
        Some(coerced)
    }
}

/// Parses the text forms date-times are stored in.
///
/// Accepts the engine's own ISO-8601 form, the space separated form SQLite's
/// date functions produce, and plain dates.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        DATETIME_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    let text = text.trim().trim_end_matches('Z');
    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Single(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::DateTime(v) => write!(f, "{}", v.format(DATETIME_FORMAT)),
        }
    }
}

/// Error returned when a [`Value`] does not hold the requested host type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("expected a {expected} value, found {found:?}")]
pub struct ValueTypeMismatch {
    pub expected: ValueType,
    pub found: Value,
}

macro_rules! value_conversions {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl From<Option<$ty>> for Value {
                fn from(v: Option<$ty>) -> Self {
                    v.map_or(Value::Null, Value::$variant)
                }
            }

            impl TryFrom<Value> for $ty {
                type Error = ValueTypeMismatch;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    match value.clone().coerce(ValueType::$variant) {
                        Some(Value::$variant(v)) => Ok(v),
                        _ => Err(ValueTypeMismatch {
                            expected: ValueType::$variant,
                            found: value,
                        }),
                    }
                }
            }

            impl TryFrom<Value> for Option<$ty> {
                type Error = ValueTypeMismatch;

                fn try_from(value: Value) -> Result<Self, Self::Error> {
                    if value.is_null() {
                        return Ok(None);
                    }
                    <$ty>::try_from(value).map(Some)
                }
            }
        )*
    };
}

value_conversions! {
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Single,
    f64 => Double,
    Decimal => Decimal,
    u8 => Byte,
    String => String,
    bool => Boolean,
    NaiveDateTime => DateTime,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_mixed_integers() {
        assert_eq!(
            Value::Int16(3).compare(&Value::Int64(3)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Byte(2).compare(&Value::Int32(10)), Some(Ordering::Less));
    }

    #[test]
    fn test_compare_float_and_integer() {
        assert_eq!(
            Value::Double(2.5).compare(&Value::Int32(2)),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_compare_decimal_and_integer() {
        let d = Decimal::new(1050, 2); // 10.50
        assert_eq!(Value::Decimal(d).compare(&Value::Int32(10)), Some(Ordering::Greater));
        assert_eq!(Value::Int64(11).compare(&Value::Decimal(d)), Some(Ordering::Greater));
    }

    #[test]
    fn test_compare_incompatible_is_none() {
        assert_eq!(Value::from("a").compare(&Value::Int32(1)), None);
        assert_eq!(Value::Null.compare(&Value::Null), None);
    }

    #[test]
    fn test_coerce_narrowing_fails_out_of_range() {
        assert_eq!(Value::Int64(300).coerce(ValueType::Byte), None);
        assert_eq!(
            Value::Int64(200).coerce(ValueType::Byte),
            Some(Value::Byte(200))
        );
    }

    #[test]
    fn test_coerce_string_to_datetime() {
        let parsed = Value::from("2024-03-01 12:30:00").coerce(ValueType::DateTime);
        let expected = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(parsed, Some(Value::DateTime(expected)));
    }

    #[test]
    fn test_option_conversions() {
        let v: Option<i32> = Value::Null.try_into().unwrap();
        assert_eq!(v, None);
        let v: Option<i32> = Value::Int32(5).try_into().unwrap();
        assert_eq!(v, Some(5));
        assert!(i32::try_from(Value::from("x")).is_err());
    }

    #[test]
    fn test_datetime_display_round_trip() {
        let dt = chrono::NaiveDate::from_ymd_opt(2015, 8, 2)
            .unwrap()
            .and_hms_milli_opt(9, 15, 0, 250)
            .unwrap();
        let text = Value::DateTime(dt).to_string();
        assert_eq!(text, "2015-08-02T09:15:00.250");
        assert_eq!(parse_datetime(&text), Some(dt));
    }
}

//! Filter conditions and their in-memory evaluation.
//!
//! A request carries a conjunction of [`Condition`]s. Conditions over a
//! single known column are pushed down to the store; the rest are
//! evaluated after materialization with [`Condition::matches`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::Value;

/// Condition construction and evaluation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// Only `=` and `!=` may be used with a NULL operand.
    #[error("operator '{0}' cannot be used with null")]
    InvalidNullComparison(Operator),
    #[error("unknown comparison operator: {0}")]
    UnknownOperator(String),
    #[error("condition term cannot be empty")]
    EmptyTerm,
}

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    NotEquals,
    LessThan,
    GreaterThan,
    LessThanOrEquals,
    GreaterThanOrEquals,
}

impl Operator {
    /// The SQL symbol for this operator.
    pub const fn symbol(self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "<>",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessThanOrEquals => "<=",
            Operator::GreaterThanOrEquals => ">=",
        }
    }

    /// The SQL keyword used when comparing with NULL, if the operator allows it.
    pub const fn null_symbol(self) -> Option<&'static str> {
        match self {
            Operator::Equals => Some("IS"),
            Operator::NotEquals => Some("IS NOT"),
            _ => None,
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Operator::Equals => ordering == Ordering::Equal,
            Operator::NotEquals => ordering != Ordering::Equal,
            Operator::LessThan => ordering == Ordering::Less,
            Operator::GreaterThan => ordering == Ordering::Greater,
            Operator::LessThanOrEquals => ordering != Ordering::Greater,
            Operator::GreaterThanOrEquals => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" | "==" => Ok(Operator::Equals),
            "!=" | "<>" => Ok(Operator::NotEquals),
            "<" => Ok(Operator::LessThan),
            ">" => Ok(Operator::GreaterThan),
            "<=" => Ok(Operator::LessThanOrEquals),
            ">=" => Ok(Operator::GreaterThanOrEquals),
            other => Err(ConditionError::UnknownOperator(other.to_string())),
        }
    }
}

/// A dot-separated member path such as `Name` or `Owner.Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Term {
    parts: Vec<String>,
}

impl Term {
    pub fn parse(text: &str) -> Self {
        Self {
            parts: text.split('.').map(|p| p.trim().to_string()).collect(),
        }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// The only segment of a single-segment term.
    pub fn single(&self) -> Option<&str> {
        match self.parts.as_slice() {
            [only] if !only.is_empty() => Some(only),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(String::is_empty)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.parts.join("."))
    }
}

/// A single filter condition: `term operator value`.
///
/// # Examples
///
/// ```
/// use tablemap_core::{Condition, Operator, Value};
///
/// let c = Condition::new("Price", Operator::LessThan, 10_i32).unwrap();
/// assert!(c.matches(&Value::Int32(5)).unwrap());
/// assert!(!c.matches(&Value::Null).unwrap());
///
/// // NULL only compares with = and !=
/// assert!(Condition::new("Price", Operator::LessThan, Value::Null).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub term: Term,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    /// Creates a condition, rejecting ordering comparisons with NULL.
    pub fn new(term: &str, operator: Operator, value: impl Into<Value>) -> Result<Self, ConditionError> {
        let term = Term::parse(term);
        if term.is_empty() {
            return Err(ConditionError::EmptyTerm);
        }
        let condition = Self {
            term,
            operator,
            value: value.into(),
        };
        condition.check()?;
        Ok(condition)
    }

    /// Shorthand for an `=` condition.
    pub fn equals(term: &str, value: impl Into<Value>) -> Result<Self, ConditionError> {
        Self::new(term, Operator::Equals, value)
    }

    /// Checks the NULL rule. Conditions built field by field bypass [`new`](Self::new).
    pub fn check(&self) -> Result<(), ConditionError> {
        if self.value.is_null() && self.operator.null_symbol().is_none() {
            return Err(ConditionError::InvalidNullComparison(self.operator));
        }
        Ok(())
    }

    /// Evaluates the condition against an actual value.
    ///
    /// NULL equals only NULL. A non-NULL operand never satisfies an
    /// ordering comparison with a NULL or incomparable actual value, and
    /// always satisfies `!=`.
    pub fn matches(&self, actual: &Value) -> Result<bool, ConditionError> {
        self.check()?;
        if self.value.is_null() {
            return Ok(match self.operator {
                Operator::Equals => actual.is_null(),
                _ => !actual.is_null(),
            });
        }
        Ok(match actual.compare(&self.value) {
            Some(ordering) => self.operator.accepts(ordering),
            None => self.operator == Operator::NotEquals,
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.term, self.operator, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parsing() {
        assert_eq!("=".parse::<Operator>().unwrap(), Operator::Equals);
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::NotEquals);
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::NotEquals);
        assert_eq!(" >= ".parse::<Operator>().unwrap(), Operator::GreaterThanOrEquals);
        assert_eq!(
            "~".parse::<Operator>().unwrap_err(),
            ConditionError::UnknownOperator("~".into())
        );
    }

    #[test]
    fn test_term_single() {
        assert_eq!(Term::parse("Name").single(), Some("Name"));
        assert_eq!(Term::parse("Owner.Name").single(), None);
        assert_eq!(Term::parse("Owner.Name").to_string(), "Owner.Name");
    }

    #[test]
    fn test_empty_term_rejected() {
        assert_eq!(
            Condition::new("", Operator::Equals, 1_i32).unwrap_err(),
            ConditionError::EmptyTerm
        );
    }

    #[test]
    fn test_null_rule() {
        assert!(Condition::new("a", Operator::Equals, Value::Null).is_ok());
        assert!(Condition::new("a", Operator::NotEquals, Value::Null).is_ok());
        for op in [
            Operator::LessThan,
            Operator::GreaterThan,
            Operator::LessThanOrEquals,
            Operator::GreaterThanOrEquals,
        ] {
            assert_eq!(
                Condition::new("a", op, Value::Null).unwrap_err(),
                ConditionError::InvalidNullComparison(op)
            );
        }
    }

    #[test]
    fn test_matches_null_operand() {
        let is_null = Condition::equals("a", Value::Null).unwrap();
        assert!(is_null.matches(&Value::Null).unwrap());
        assert!(!is_null.matches(&Value::Int32(1)).unwrap());

        let not_null = Condition::new("a", Operator::NotEquals, Value::Null).unwrap();
        assert!(not_null.matches(&Value::Int32(1)).unwrap());
        assert!(!not_null.matches(&Value::Null).unwrap());
    }

    #[test]
    fn test_matches_ordering() {
        let c = Condition::new("a", Operator::GreaterThanOrEquals, 10_i64).unwrap();
        assert!(c.matches(&Value::Int32(10)).unwrap());
        assert!(c.matches(&Value::Double(10.5)).unwrap());
        assert!(!c.matches(&Value::Int16(9)).unwrap());
        assert!(!c.matches(&Value::Null).unwrap());
    }

    #[test]
    fn test_matches_incomparable() {
        let eq = Condition::equals("a", "x").unwrap();
        assert!(!eq.matches(&Value::Int32(1)).unwrap());
        let ne = Condition::new("a", Operator::NotEquals, "x").unwrap();
        assert!(ne.matches(&Value::Int32(1)).unwrap());
        assert!(ne.matches(&Value::Null).unwrap());
    }

    #[test]
    fn test_field_built_condition_is_checked() {
        let c = Condition {
            term: Term::parse("a"),
            operator: Operator::LessThan,
            value: Value::Null,
        };
        assert!(c.matches(&Value::Null).is_err());
    }
}

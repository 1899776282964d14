//! Query and DML translation.
//!
//! Conditions over a single known column become a parameterized `WHERE`
//! clause; everything else is left to post-filtering. Literals are always
//! bound as parameters, except NULL, which is rendered as `IS NULL` or
//! `IS NOT NULL`.

use tablemap_core::{Condition, ConditionError, DATETIME_FORMAT, Value};

use crate::error::Result;
use crate::mapping::ColumnMapping;
use crate::schema::quote_ident;

/// A rendered `WHERE` clause and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    /// `WHERE ...`, with parameters numbered from `?1`.
    pub sql: String,
    pub params: Vec<Value>,
}

/// Splits conditions into those the store can filter on and those that
/// must be evaluated after materialization.
///
/// A condition is pushed down when its term has exactly one segment and
/// `is_column` accepts it.
pub fn partition(
    conditions: &[Condition],
    is_column: impl Fn(&str) -> bool,
) -> (Vec<Condition>, Vec<Condition>) {
    conditions
        .iter()
        .cloned()
        .partition(|c| c.term.single().is_some_and(&is_column))
}

/// Builds a conjunctive `WHERE` clause.
///
/// Returns `None` for an empty condition set.
///
/// # Errors
///
/// Returns [`ConditionError::InvalidNullComparison`] when NULL is used with
/// an operator other than `=` or `!=`, and
/// [`InvalidIdentifier`](crate::OrmError::InvalidIdentifier) for terms that
/// cannot be quoted.
///
/// # Examples
///
/// ```
/// use tablemap_core::{Condition, Operator, Value};
/// use tablemap_sqlite::build_where_clause;
///
/// let conditions = vec![
///     Condition::new("Name", Operator::Equals, "Widget").unwrap(),
///     Condition::new("Deleted", Operator::Equals, Value::Null).unwrap(),
/// ];
/// let clause = build_where_clause(&conditions).unwrap().unwrap();
/// assert_eq!(clause.sql, r#"WHERE "Name" = ?1 AND "Deleted" IS NULL"#);
/// assert_eq!(clause.params, vec![Value::from("Widget")]);
///
/// assert!(build_where_clause(&[]).unwrap().is_none());
/// ```
pub fn build_where_clause(conditions: &[Condition]) -> Result<Option<WhereClause>> {
    if conditions.is_empty() {
        return Ok(None);
    }
    let mut parts = Vec::with_capacity(conditions.len());
    let mut params = Vec::new();
    for condition in conditions {
        let column = quote_ident(&condition.term.to_string())?;
        if condition.value.is_null() {
            let keyword = condition
                .operator
                .null_symbol()
                .ok_or(ConditionError::InvalidNullComparison(condition.operator))?;
            parts.push(format!("{column} {keyword} NULL"));
        } else {
            params.push(condition.value.clone());
            parts.push(format!(
                "{column} {} ?{}",
                condition.operator.symbol(),
                params.len()
            ));
        }
    }
    Ok(Some(WhereClause {
        sql: format!("WHERE {}", parts.join(" AND ")),
        params,
    }))
}

/// Renders a value as an SQL literal, for diagnostics.
///
/// Statements issued by the engine never embed literals; they bind
/// parameters instead.
///
/// # Examples
///
/// ```
/// use tablemap_core::Value;
/// use tablemap_sqlite::render_literal;
///
/// assert_eq!(render_literal(&Value::Null), "NULL");
/// assert_eq!(render_literal(&Value::Boolean(true)), "1");
/// assert_eq!(render_literal(&Value::from("it's")), "'it''s'");
/// ```
pub fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(v) => String::from(if *v { "1" } else { "0" }),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::DateTime(dt) => format!("DATETIME('{}')", dt.format(DATETIME_FORMAT)),
        other => other.to_string(),
    }
}

/// `SELECT rowid,* FROM <table> [WHERE ...]`
pub fn select_sql(table: &str, where_clause: Option<&WhereClause>) -> Result<String> {
    Ok(with_where(
        format!("SELECT rowid,* FROM {}", quote_ident(table)?),
        where_clause,
    ))
}

/// `SELECT rowid FROM <table> [WHERE ...]`
pub fn select_row_ids_sql(table: &str, where_clause: Option<&WhereClause>) -> Result<String> {
    Ok(with_where(
        format!("SELECT rowid FROM {}", quote_ident(table)?),
        where_clause,
    ))
}

/// `SELECT COUNT(rowid) FROM <table> [WHERE ...]`
pub fn count_sql(table: &str, where_clause: Option<&WhereClause>) -> Result<String> {
    Ok(with_where(
        format!("SELECT COUNT(rowid) FROM {}", quote_ident(table)?),
        where_clause,
    ))
}

/// `DELETE FROM <table> WHERE rowid = ?1`
pub fn delete_sql(table: &str) -> Result<String> {
    Ok(format!("DELETE FROM {} WHERE rowid = ?1", quote_ident(table)?))
}

fn with_where(sql: String, where_clause: Option<&WhereClause>) -> String {
    match where_clause {
        Some(clause) => format!("{sql} {}", clause.sql),
        None => sql,
    }
}

/// Parameter list for inserting one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertSpec {
    pub table: String,
    /// Transact mappings, in parameter order.
    pub mappings: Vec<ColumnMapping>,
}

impl InsertSpec {
    pub fn new<'a>(table: &str, mappings: impl IntoIterator<Item = &'a ColumnMapping>) -> Self {
        Self {
            table: table.to_string(),
            mappings: mappings.into_iter().cloned().collect(),
        }
    }

    /// `INSERT INTO <table> (<cols>) VALUES (?1, ...)`
    pub fn sql(&self) -> Result<String> {
        if self.mappings.is_empty() {
            return Ok(format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&self.table)?));
        }
        let columns = self
            .mappings
            .iter()
            .map(|m| quote_ident(m.name()))
            .collect::<Result<Vec<_>>>()?;
        let params: Vec<String> = (1..=self.mappings.len()).map(|i| format!("?{i}")).collect();
        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.table)?,
            columns.join(","),
            params.join(",")
        ))
    }
}

/// Parameter list for updating one entity by row identity.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSpec {
    pub table: String,
    /// Transact mappings, in parameter order. The row id is bound last.
    pub mappings: Vec<ColumnMapping>,
}

impl UpdateSpec {
    pub fn new<'a>(table: &str, mappings: impl IntoIterator<Item = &'a ColumnMapping>) -> Self {
        Self {
            table: table.to_string(),
            mappings: mappings.into_iter().cloned().collect(),
        }
    }

    /// `UPDATE <table> SET <col> = ?1, ... WHERE rowid = ?N`
    pub fn sql(&self) -> Result<String> {
        let assignments = self
            .mappings
            .iter()
            .enumerate()
            .map(|(i, m)| Ok(format!("{} = ?{}", quote_ident(m.name())?, i + 1)))
            .collect::<Result<Vec<_>>>()?;
        let row_id_param = self.mappings.len() + 1;
        if assignments.is_empty() {
            return Ok(format!(
                "UPDATE {} SET rowid = rowid WHERE rowid = ?{row_id_param}",
                quote_ident(&self.table)?
            ));
        }
        Ok(format!(
            "UPDATE {} SET {} WHERE rowid = ?{row_id_param}",
            quote_ident(&self.table)?,
            assignments.join(",")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmError;
    use tablemap_core::{Operator, TableKind, Term, ValueType};

    fn cond(term: &str, op: Operator, value: impl Into<Value>) -> Condition {
        Condition::new(term, op, value).unwrap()
    }

    #[test]
    fn test_null_renders_is_and_is_not() {
        let clause = build_where_clause(&[cond("A", Operator::Equals, Value::Null)])
            .unwrap()
            .unwrap();
        assert_eq!(clause.sql, r#"WHERE "A" IS NULL"#);
        assert!(clause.params.is_empty());

        let clause = build_where_clause(&[cond("A", Operator::NotEquals, Value::Null)])
            .unwrap()
            .unwrap();
        assert_eq!(clause.sql, r#"WHERE "A" IS NOT NULL"#);
    }

    #[test]
    fn test_null_with_ordering_is_error() {
        let bad = Condition {
            term: Term::parse("A"),
            operator: Operator::LessThan,
            value: Value::Null,
        };
        let err = build_where_clause(&[bad]).unwrap_err();
        assert!(matches!(
            err,
            OrmError::ConditionError(ConditionError::InvalidNullComparison(Operator::LessThan))
        ));
    }

    #[test]
    fn test_empty_conditions_have_no_where() {
        assert!(build_where_clause(&[]).unwrap().is_none());
        let sql = select_sql("T", None).unwrap();
        assert_eq!(sql, r#"SELECT rowid,* FROM "T""#);
        assert!(!sql.contains("WHERE"));
        assert_eq!(count_sql("T", None).unwrap(), r#"SELECT COUNT(rowid) FROM "T""#);
    }

    #[test]
    fn test_parameters_are_numbered_in_order() {
        let clause = build_where_clause(&[
            cond("A", Operator::GreaterThan, 1_i32),
            cond("B", Operator::Equals, Value::Null),
            cond("C", Operator::NotEquals, "x"),
        ])
        .unwrap()
        .unwrap();
        assert_eq!(
            clause.sql,
            r#"WHERE "A" > ?1 AND "B" IS NULL AND "C" <> ?2"#
        );
        assert_eq!(clause.params, vec![Value::Int32(1), Value::from("x")]);
    }

    #[test]
    fn test_quotes_in_values_are_bound_not_embedded() {
        let clause = build_where_clause(&[cond("Name", Operator::Equals, "O'Brien\"; --")])
            .unwrap()
            .unwrap();
        assert_eq!(clause.sql, r#"WHERE "Name" = ?1"#);
    }

    #[test]
    fn test_partition() {
        let conditions = vec![
            cond("name", Operator::Equals, "a"),
            cond("Owner.Name", Operator::Equals, "b"),
            cond("Missing", Operator::Equals, "c"),
        ];
        let (push, post) = partition(&conditions, |c| c.eq_ignore_ascii_case("Name"));
        assert_eq!(push.len(), 1);
        assert_eq!(push[0].term.to_string(), "name");
        assert_eq!(post.len(), 2);
    }

    #[test]
    fn test_render_literal() {
        let dt = chrono::NaiveDate::from_ymd_opt(2015, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(render_literal(&Value::DateTime(dt)), "DATETIME('2015-01-02T03:04:05')");
        assert_eq!(render_literal(&Value::Boolean(false)), "0");
        assert_eq!(render_literal(&Value::Double(1.5)), "1.5");
        assert_eq!(render_literal(&Value::Int16(-4)), "-4");
    }

    #[test]
    fn test_dml_specs() {
        let kind = TableKind::StaticDeclared;
        let mappings = [
            ColumnMapping::declared("Id", "Id", ValueType::Int32, kind),
            ColumnMapping::declared("Name", "Name", ValueType::String, kind),
        ];
        let insert = InsertSpec::new("Product", &mappings);
        assert_eq!(
            insert.sql().unwrap(),
            r#"INSERT INTO "Product" ("Id","Name") VALUES (?1,?2)"#
        );
        let update = UpdateSpec::new("Product", &mappings);
        assert_eq!(
            update.sql().unwrap(),
            r#"UPDATE "Product" SET "Id" = ?1,"Name" = ?2 WHERE rowid = ?3"#
        );
        assert_eq!(
            delete_sql("Product").unwrap(),
            r#"DELETE FROM "Product" WHERE rowid = ?1"#
        );
    }
}

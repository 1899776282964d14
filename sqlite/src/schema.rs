//! DDL generation and schema introspection.
//!
//! Every table and column name is written as a double-quoted identifier.
//! Names are checked by [`quote_ident`] first; entity declarations already
//! reject names that cannot be quoted.

use rusqlite::Connection;
use serde::Serialize;
use tablemap_core::{ColumnType, is_valid_identifier};
use tracing::debug;

use crate::error::{OrmError, Result};

/// Suffix of the temporary table a rebuild copies rows out of.
pub const TEMP_TABLE_SUFFIX: &str = "__TABLEMAP_TEMP";

/// Quotes an identifier.
///
/// # Errors
///
/// Returns [`OrmError::InvalidIdentifier`] for empty names and names
/// containing double quotes or control characters.
pub fn quote_ident(name: &str) -> Result<String> {
    if !is_valid_identifier(name) {
        return Err(OrmError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

/// Name of the temporary table used while rebuilding `table`.
pub fn temp_table_name(table: &str) -> String {
    format!("__{table}{TEMP_TABLE_SUFFIX}")
}

/// A column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    pub name: String,
    /// The declared type keyword, verbatim.
    pub keyword: String,
}

impl LiveColumn {
    pub fn column_type(&self) -> ColumnType {
        ColumnType::parse_lossy(&self.keyword)
    }
}

/// Generates a `CREATE TABLE` statement. The row identity column is implicit.
pub fn create_table_sql<'a>(
    table: &str,
    columns: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<String> {
    let columns = columns
        .into_iter()
        .map(|(name, keyword)| Ok(format!("{} {keyword}", quote_ident(name)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(format!(
        "CREATE TABLE {} ({})",
        quote_ident(table)?,
        columns.join(",")
    ))
}

pub fn add_column_sql(table: &str, column: &str, column_type: ColumnType) -> Result<String> {
    Ok(format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table)?,
        quote_ident(column)?,
        column_type.keyword()
    ))
}

pub fn drop_table_sql(table: &str) -> Result<String> {
    Ok(format!("DROP TABLE IF EXISTS {}", quote_ident(table)?))
}

/// Generates the statements that rebuild `table` with only `survivors`.
///
/// Rows keep their row identity.
pub fn rebuild_sql(table: &str, survivors: &[LiveColumn]) -> Result<Vec<String>> {
    let temp = temp_table_name(table);
    let names = survivors
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Result<Vec<_>>>()?;
    let mut copied = vec!["rowid".to_string()];
    copied.extend(names);
    let copied = copied.join(",");

    Ok(vec![
        drop_table_sql(&temp)?,
        format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(table)?,
            quote_ident(&temp)?
        ),
        create_table_sql(
            table,
            survivors
                .iter()
                .map(|c| (c.name.as_str(), c.keyword.as_str())),
        )?,
        format!(
            "INSERT INTO {} ({copied}) SELECT {copied} FROM {}",
            quote_ident(table)?,
            quote_ident(&temp)?
        ),
        drop_table_sql(&temp)?,
    ])
}

/// Reads the live columns of `table` in ordinal order.
///
/// A missing table has no columns.
pub fn table_info(conn: &Connection, table: &str) -> Result<Vec<LiveColumn>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table)?);
    debug!(sql = %sql, "introspecting table");
    let mut stmt = conn.prepare(&sql)?;
    let columns = stmt
        .query_map([], |row| {
            Ok(LiveColumn {
                name: row.get(1)?,
                keyword: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Returns `true` if `table` exists.
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    Ok(!table_info(conn, table)?.is_empty())
}

/// Lists user tables, leaving out SQLite internals and stale rebuild copies.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' \
         AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(tables
        .into_iter()
        .filter(|t| !t.ends_with(TEMP_TABLE_SUFFIX))
        .collect())
}

/// Runs one DDL statement, logging it.
pub(crate) fn execute_ddl(conn: &Connection, sql: &str) -> Result<()> {
    debug!(sql = %sql, "executing DDL");
    conn.execute_batch(sql)?;
    Ok(())
}

//! Index management.
//!
//! Indexes are not stored separately: they are reconstructed from the
//! `CREATE INDEX` statements SQLite keeps in `sqlite_master` each time they
//! are listed. Statements outside the grammar below (unique, partial or
//! expression indexes) are skipped when listing, but are kept intact when a
//! table is rebuilt.
//!
//! ```text
//! CREATE INDEX "name" ON "table" ("column" [ASC|DESC], ...)
//! ```

use std::sync::LazyLock;

use regex::Regex;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::error::{OrmError, Result};
use crate::registry::TableMappings;
use crate::schema::{quote_ident, table_exists};

static INDEX_SQL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^\s*CREATE +INDEX +"*(?<name>\w+)"* +ON +"*(?<table>[\w$]+)"* *\((?<columns>.+)\)\s*$"#)
        .expect("static regex must compile")
});

static INDEX_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+$").expect("static regex must compile"));

/// One indexed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    pub descending: bool,
}

impl IndexColumn {
    pub fn ascending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            descending: false,
        }
    }

    pub fn descending(name: &str) -> Self {
        Self {
            name: name.to_string(),
            descending: true,
        }
    }
}

/// An index on a mapped table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub table: String,
    /// Type name of the entity mapped to `table`, when one is registered.
    pub resource: Option<String>,
    pub columns: Vec<IndexColumn>,
}

impl IndexDescriptor {
    pub fn new(name: &str, table: &str, columns: Vec<IndexColumn>) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            resource: None,
            columns,
        }
    }

    /// Parses a stored `CREATE INDEX` statement.
    ///
    /// # Examples
    ///
    /// ```
    /// use tablemap_sqlite::IndexDescriptor;
    ///
    /// let index = IndexDescriptor::parse(r#"CREATE INDEX "by_name" ON "shop$Product" ("Name" DESC, "Id")"#).unwrap();
    /// assert_eq!(index.name, "by_name");
    /// assert_eq!(index.table, "shop$Product");
    /// assert_eq!(index.columns.len(), 2);
    /// assert!(index.columns[0].descending);
    /// assert!(!index.columns[1].descending);
    /// ```
    pub fn parse(sql: &str) -> Option<Self> {
        let captures = INDEX_SQL.captures(sql)?;
        let columns = captures["columns"]
            .split(',')
            .map(|column| {
                let mut tokens = column.split_whitespace();
                let name = tokens.next().unwrap_or_default().replace('"', "");
                let descending = tokens.any(|t| t.eq_ignore_ascii_case("desc"));
                IndexColumn { name, descending }
            })
            .collect::<Vec<_>>();
        if columns.iter().any(|c| c.name.is_empty()) {
            return None;
        }
        Some(Self::new(&captures["name"], &captures["table"], columns))
    }

    /// Returns `true` if the index covers `column`, ignoring case.
    pub fn references(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(column))
    }

    pub fn create_sql(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(OrmError::IndexError(format!(
                "index '{}' has no columns",
                self.name
            )));
        }
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let direction = if c.descending { "DESC" } else { "ASC" };
                Ok(format!("{} {direction}", quote_ident(&c.name)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(
            "CREATE INDEX {} ON {} ({})",
            quote_ident(&self.name)?,
            quote_ident(&self.table)?,
            columns.join(", ")
        ))
    }

    /// SQLite's `DROP INDEX` names the index only.
    pub fn drop_sql(&self) -> Result<String> {
        Ok(format!("DROP INDEX IF EXISTS {}", quote_ident(&self.name)?))
    }
}

fn query_indexes(conn: &Connection, table: Option<&str>) -> Result<Vec<IndexDescriptor>> {
    let mut stmt = conn.prepare(
        "SELECT sql FROM sqlite_master \
         WHERE type = 'index' AND sql IS NOT NULL \
         AND (?1 IS NULL OR tbl_name = ?1 COLLATE NOCASE) \
         ORDER BY name",
    )?;
    let statements = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(statements
        .iter()
        .filter_map(|sql| {
            let parsed = IndexDescriptor::parse(sql);
            if parsed.is_none() {
                warn!(sql = %sql, "skipping index outside the supported grammar");
            }
            parsed
        })
        .collect())
}

/// An index exactly as SQLite stores it.
///
/// Covers indexes outside the parsable grammar as well; `columns` lists the
/// table columns the index reads, without expression terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredIndex {
    pub name: String,
    pub sql: String,
    pub columns: Vec<String>,
}

/// Reads every explicitly created index on `table`.
pub(crate) fn stored_indexes(conn: &Connection, table: &str) -> Result<Vec<StoredIndex>> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master \
         WHERE type = 'index' AND sql IS NOT NULL \
         AND tbl_name = ?1 COLLATE NOCASE \
         ORDER BY name",
    )?;
    let indexes = stmt
        .query_map(params![table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut columns_stmt =
        conn.prepare("SELECT name FROM pragma_index_info(?1) ORDER BY seqno")?;
    indexes
        .into_iter()
        .map(|(name, sql)| -> Result<StoredIndex> {
            let columns = columns_stmt
                .query_map(params![name], |row| row.get::<_, Option<String>>(0))?
                .filter_map(|column| column.transpose())
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(StoredIndex { name, sql, columns })
        })
        .collect()
}

/// Lists the indexes on `table`.
pub fn table_indexes(conn: &Connection, table: &str) -> Result<Vec<IndexDescriptor>> {
    query_indexes(conn, Some(table))
}

pub fn create_index(conn: &Connection, index: &IndexDescriptor) -> Result<()> {
    let sql = index.create_sql()?;
    info!(index = %index.name, table = %index.table, "creating index");
    debug!(sql = %sql, "executing DDL");
    conn.execute_batch(&sql)?;
    Ok(())
}

pub fn drop_index(conn: &Connection, index: &IndexDescriptor) -> Result<()> {
    let sql = index.drop_sql()?;
    info!(index = %index.name, "dropping index");
    conn.execute_batch(&sql)?;
    Ok(())
}

/// Lists, creates and drops indexes on mapped tables.
pub struct IndexManager<'a> {
    database: &'a Database,
    mappings: &'a TableMappings,
}

impl<'a> IndexManager<'a> {
    pub fn new(database: &'a Database, mappings: &'a TableMappings) -> Self {
        Self { database, mappings }
    }

    fn with_resource(&self, mut index: IndexDescriptor) -> IndexDescriptor {
        index.resource = self.mappings.type_for_table(&index.table);
        index
    }

    /// Lists every parsable index in the store.
    pub fn list(&self) -> Result<Vec<IndexDescriptor>> {
        let conn = self.database.connect()?;
        Ok(query_indexes(&conn, None)?
            .into_iter()
            .map(|i| self.with_resource(i))
            .collect())
    }

    pub fn list_for_table(&self, table: &str) -> Result<Vec<IndexDescriptor>> {
        let conn = self.database.connect()?;
        Ok(table_indexes(&conn, table)?
            .into_iter()
            .map(|i| self.with_resource(i))
            .collect())
    }

    /// Creates an index.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::IndexError`] if the index name is not a plain
    /// word (letters, digits and `_`) or the table does not exist.
    pub fn create(&self, index: &IndexDescriptor) -> Result<()> {
        if !INDEX_NAME.is_match(&index.name) {
            return Err(OrmError::IndexError(format!(
                "invalid index name '{}': only letters, digits and '_' are allowed",
                index.name
            )));
        }
        let conn = self.database.connect()?;
        if !table_exists(&conn, &index.table)? {
            return Err(OrmError::IndexError(format!(
                "found no table '{}' to register index '{}' on",
                index.table, index.name
            )));
        }
        create_index(&conn, index)
    }

    /// Drops and re-creates an index in one transaction.
    pub fn rebuild(&self, index: &IndexDescriptor) -> Result<()> {
        self.database.transact(|tx| {
            drop_index(tx, index)?;
            create_index(tx, index)
        })
    }

    pub fn drop(&self, index: &IndexDescriptor) -> Result<()> {
        let conn = self.database.connect()?;
        drop_index(&conn, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unquoted_and_case_insensitive() {
        let index = IndexDescriptor::parse("create index ix on T(a asc,b)").unwrap();
        assert_eq!(index.name, "ix");
        assert_eq!(index.table, "T");
        assert_eq!(
            index.columns,
            vec![IndexColumn::ascending("a"), IndexColumn::ascending("b")]
        );
    }

    #[test]
    fn test_parse_rejects_other_statements() {
        assert!(IndexDescriptor::parse("CREATE UNIQUE INDEX u ON t (a)").is_none());
        assert!(IndexDescriptor::parse("CREATE TABLE t (a INT)").is_none());
    }

    #[test]
    fn test_create_sql_round_trip() {
        let index = IndexDescriptor::new(
            "by_name",
            "shop$Product",
            vec![IndexColumn::ascending("Name"), IndexColumn::descending("Id")],
        );
        let sql = index.create_sql().unwrap();
        assert_eq!(
            sql,
            r#"CREATE INDEX "by_name" ON "shop$Product" ("Name" ASC, "Id" DESC)"#
        );
        assert_eq!(IndexDescriptor::parse(&sql).unwrap(), index);
    }

    #[test]
    fn test_drop_sql_has_no_on_clause() {
        let index = IndexDescriptor::new("ix", "T", vec![IndexColumn::ascending("a")]);
        assert_eq!(index.drop_sql().unwrap(), r#"DROP INDEX IF EXISTS "ix""#);
    }

    #[test]
    fn test_references() {
        let index = IndexDescriptor::new("ix", "T", vec![IndexColumn::ascending("Name")]);
        assert!(index.references("NAME"));
        assert!(!index.references("Age"));
    }

    #[test]
    fn test_stored_indexes_include_unparsable() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"CREATE TABLE "T" ("a" INT UNIQUE, "b" TEXT, "c" INT);
               CREATE UNIQUE INDEX "ux-b" ON "T" ("b");
               CREATE INDEX "ix_bc" ON "T" ("b", "c" DESC) WHERE "c" > 0;
               CREATE INDEX "ix_expr" ON "T" (lower("b"));"#,
        )
        .unwrap();
        let stored = stored_indexes(&conn, "t").unwrap();
        let names: Vec<_> = stored.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ix_bc", "ix_expr", "ux-b"]);
        assert_eq!(stored[0].columns, vec!["b", "c"]);
        assert!(stored[1].columns.is_empty());
        assert!(stored[2].sql.starts_with("CREATE UNIQUE INDEX"));
    }

    #[test]
    fn test_table_indexes_skips_auto_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"CREATE TABLE "T" ("a" INT UNIQUE, "b" TEXT);
               CREATE TABLE "U" ("c" INT);
               CREATE INDEX "ix_b" ON "T" ("b" DESC);
               CREATE INDEX "ix_c" ON "U" ("c");"#,
        )
        .unwrap();
        let indexes = table_indexes(&conn, "t").unwrap();
        assert_eq!(indexes.len(), 1);
        assert_eq!(indexes[0].name, "ix_b");
        assert!(indexes[0].columns[0].descending);
        assert_eq!(query_indexes(&conn, None).unwrap().len(), 2);
    }
}

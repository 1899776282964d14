//! Table mappings and schema reconciliation.
//!
//! A [`TableMapping`] owns the column mappings of one entity type and keeps
//! them in step with the live table:
//!
//! - [`create`](TableMapping::create) issues `CREATE TABLE` when the table
//!   is missing, then reconciles.
//! - [`update`](TableMapping::update) pushes declared columns the live table
//!   lacks, refuses type conflicts, and pulls live columns the declaration
//!   does not know about as non-declared mappings.
//! - [`drop_columns`](TableMapping::drop_columns) rebuilds the table without
//!   the given dynamic columns, re-creating the indexes that survive.
//!
//! Mappings hold no per-instance state. Accessors are bound to entities by
//! the table handle at operation time.

use std::collections::HashSet;

use rusqlite::Connection;
use tablemap_core::{ColumnType, EntityType, ROW_ID, TableKind, ValueType};
use tracing::{debug, info, warn};

use crate::error::{OrmError, Result};
use crate::index;
use crate::schema::{
    LiveColumn, add_column_sql, create_table_sql, drop_table_sql, execute_ddl, rebuild_sql,
    table_exists, table_info,
};
use crate::translate::{InsertSpec, UpdateSpec};

/// Name reported for the implicit row identity column.
pub const ROW_ID_COLUMN: &str = "RowId";

/// Lifecycle state of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingState {
    #[default]
    Uninitialized,
    /// The table was created by this mapping and not yet reconciled.
    Created,
    /// The last reconciliation pass succeeded.
    Reconciled,
}

/// One physical column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub value_type: ValueType,
    pub is_row_identity: bool,
}

impl ColumnSpec {
    pub fn new(name: &str, value_type: ValueType) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            is_row_identity: false,
        }
    }

    pub fn row_identity() -> Self {
        Self {
            name: ROW_ID_COLUMN.to_string(),
            value_type: ValueType::Int64,
            is_row_identity: true,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        self.value_type.column_type()
    }
}

/// The property side of a column mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: String,
    pub value_type: ValueType,
    /// Declared on the entity type, as opposed to discovered in the live table.
    pub is_declared: bool,
}

/// Pairs one property with one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub property: PropertySpec,
    pub column: ColumnSpec,
    /// Excluded from hydration and DML.
    pub is_ignored: bool,
}

impl ColumnMapping {
    fn new(property: PropertySpec, column: ColumnSpec, kind: TableKind) -> Self {
        let is_ignored = !column.value_type.is_supported()
            || column.is_row_identity
            || (kind == TableKind::StaticDeclared && !property.is_declared);
        Self {
            property,
            column,
            is_ignored,
        }
    }

    /// A mapping for a declared property.
    pub fn declared(property: &str, column: &str, value_type: ValueType, kind: TableKind) -> Self {
        Self::new(
            PropertySpec {
                name: property.to_string(),
                value_type,
                is_declared: true,
            },
            ColumnSpec::new(column, value_type),
            kind,
        )
    }

    /// A mapping for a live column the declaration does not know about.
    pub fn discovered(column: &str, value_type: ValueType, kind: TableKind) -> Self {
        Self::new(
            PropertySpec {
                name: column.to_string(),
                value_type,
                is_declared: false,
            },
            ColumnSpec::new(column, value_type),
            kind,
        )
    }

    fn row_identity() -> Self {
        Self {
            property: PropertySpec {
                name: ROW_ID_COLUMN.to_string(),
                value_type: ValueType::Int64,
                is_declared: true,
            },
            column: ColumnSpec::row_identity(),
            is_ignored: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.column.name
    }

    pub fn is_declared(&self) -> bool {
        self.property.is_declared
    }

    fn has_name(&self, name: &str) -> bool {
        self.column.name.eq_ignore_ascii_case(name)
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Declared columns pushed to the live table.
    pub added: Vec<String>,
    /// Live columns newly absorbed as non-declared mappings.
    pub absorbed: Vec<String>,
}

impl Reconciliation {
    /// Returns `true` if the pass changed neither the table nor the mapping.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.absorbed.is_empty()
    }
}

/// Schema state for one mapped entity type.
#[derive(Debug, Clone)]
pub struct TableMapping {
    type_name: String,
    table_name: String,
    kind: TableKind,
    declared: Vec<ColumnMapping>,
    column_mappings: Vec<ColumnMapping>,
    sql_column_names: HashSet<String>,
    state: MappingState,
}

impl TableMapping {
    /// Creates an uninitialized mapping from declared column mappings.
    pub fn new(
        type_name: &str,
        table_name: &str,
        kind: TableKind,
        declared: Vec<ColumnMapping>,
    ) -> Self {
        let mut all = vec![ColumnMapping::row_identity()];
        all.extend(declared);
        let mut mapping = Self {
            type_name: type_name.to_string(),
            table_name: table_name.to_string(),
            kind,
            declared: all.clone(),
            column_mappings: Vec::new(),
            sql_column_names: HashSet::new(),
            state: MappingState::Uninitialized,
        };
        mapping.set_mappings(all);
        mapping
    }

    /// Creates an uninitialized mapping for an entity type.
    pub fn from_entity_type<E>(entity_type: &EntityType<E>) -> Self {
        let kind = entity_type.kind();
        let declared = entity_type
            .mapped_properties()
            .map(|p| ColumnMapping::declared(p.name(), p.column_name(), p.value_type(), kind))
            .collect();
        Self::new(entity_type.name(), entity_type.table_name(), kind, declared)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn is_declared(&self) -> bool {
        self.kind.is_declared()
    }

    pub fn state(&self) -> MappingState {
        self.state
    }

    /// Every column mapping, including the row identity and ignored columns.
    pub fn column_mappings(&self) -> &[ColumnMapping] {
        &self.column_mappings
    }

    /// Mappings that take part in hydration and DML.
    pub fn transact_mappings(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.column_mappings.iter().filter(|m| !m.is_ignored)
    }

    /// Names of every known column, row identity included.
    pub fn sql_column_names(&self) -> impl Iterator<Item = &str> {
        self.column_mappings.iter().map(ColumnMapping::name)
    }

    /// Returns `true` if `name` is a known column, ignoring case.
    pub fn has_column(&self, name: &str) -> bool {
        self.sql_column_names.contains(&name.to_lowercase())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMapping> {
        self.column_mappings.iter().find(|m| m.has_name(name))
    }

    pub fn insert_spec(&self) -> InsertSpec {
        InsertSpec::new(&self.table_name, self.transact_mappings())
    }

    pub fn update_spec(&self) -> UpdateSpec {
        UpdateSpec::new(&self.table_name, self.transact_mappings())
    }

    fn set_mappings(&mut self, mappings: Vec<ColumnMapping>) {
        self.sql_column_names = mappings.iter().map(|m| m.name().to_lowercase()).collect();
        self.column_mappings = mappings;
    }

    /// Returns `true` if the table exists.
    pub fn exists(&self, conn: &Connection) -> Result<bool> {
        table_exists(conn, &self.table_name)
    }

    /// Reads the live columns of the table.
    pub fn live_columns(&self, conn: &Connection) -> Result<Vec<LiveColumn>> {
        table_info(conn, &self.table_name)
    }

    /// Creates the table if it does not exist, then reconciles.
    ///
    /// `conn` must not be inside a transaction.
    pub fn create(&mut self, conn: &Connection) -> Result<Reconciliation> {
        if !self.exists(conn)? {
            let columns = self
                .declared
                .iter()
                .filter(|m| !m.is_ignored)
                .map(|m| (m.name(), m.column.column_type().keyword()));
            let sql = create_table_sql(&self.table_name, columns)?;
            info!(table = %self.table_name, kind = %self.kind, "creating table");
            execute_ddl(conn, &sql)?;
        }
        self.state = MappingState::Created;
        self.update(conn)
    }

    /// Reconciles the mapping with the live table.
    ///
    /// Idempotent: a second pass with no schema change in between issues no
    /// DDL and leaves the mappings unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::SchemaConflict`] when a live column has a type
    /// keyword other than the declared one. The table is left untouched.
    pub fn update(&mut self, conn: &Connection) -> Result<Reconciliation> {
        if self.state == MappingState::Uninitialized {
            return self.create(conn);
        }
        let mut report = Reconciliation::default();

        let tx = conn.unchecked_transaction()?;
        let mut live = table_info(&tx, &self.table_name)?;
        for declared in self.declared.iter().filter(|m| !m.is_ignored) {
            let expected = declared.column.column_type().keyword();
            match live.iter().find(|c| declared.has_name(&c.name)) {
                None => {
                    info!(table = %self.table_name, column = %declared.name(), "adding declared column");
                    execute_ddl(
                        &tx,
                        &add_column_sql(&self.table_name, declared.name(), declared.column.column_type())?,
                    )?;
                    report.added.push(declared.name().to_string());
                }
                Some(column) if !column.keyword.trim().eq_ignore_ascii_case(expected) => {
                    return Err(OrmError::SchemaConflict {
                        table: self.table_name.clone(),
                        column: column.name.clone(),
                        expected: expected.to_string(),
                        found: column.keyword.clone(),
                    });
                }
                Some(_) => {}
            }
        }
        tx.commit()?;
        if !report.added.is_empty() {
            live = table_info(conn, &self.table_name)?;
        }

        let mut mappings = self.declared.clone();
        for column in &live {
            if column.name.eq_ignore_ascii_case(ROW_ID)
                || mappings.iter().any(|m| m.has_name(&column.name))
            {
                continue;
            }
            if !self.has_column(&column.name) {
                report.absorbed.push(column.name.clone());
            }
            mappings.push(ColumnMapping::discovered(
                &column.name,
                column.column_type().value_type(),
                self.kind,
            ));
        }
        if !report.absorbed.is_empty() {
            info!(table = %self.table_name, columns = ?report.absorbed, "absorbed live columns");
        }

        self.set_mappings(mappings);
        self.state = MappingState::Reconciled;
        debug!(table = %self.table_name, columns = self.column_mappings.len(), "reconciled");
        Ok(report)
    }

    /// Adds dynamic columns to an elastic table, then reconciles.
    ///
    /// Columns that already exist, the row identity and unsupported types
    /// are skipped. Returns the names of the columns added.
    pub fn add_columns(&mut self, conn: &Connection, specs: &[ColumnSpec]) -> Result<Vec<String>> {
        if !self.kind.is_elastic() {
            return Err(tablemap_core::DeclarationError::NotElastic(self.type_name.clone()).into());
        }
        let mut added = Vec::new();
        let tx = conn.unchecked_transaction()?;
        for spec in specs {
            if spec.is_row_identity
                || spec.name.eq_ignore_ascii_case(ROW_ID)
                || self.has_column(&spec.name)
                || added.iter().any(|a: &String| a.eq_ignore_ascii_case(&spec.name))
            {
                continue;
            }
            if !spec.value_type.is_supported() {
                warn!(table = %self.table_name, column = %spec.name, "skipping column of unsupported type");
                continue;
            }
            info!(table = %self.table_name, column = %spec.name, value_type = %spec.value_type, "adding dynamic column");
            execute_ddl(&tx, &add_column_sql(&self.table_name, &spec.name, spec.column_type())?)?;
            added.push(spec.name.clone());
        }
        tx.commit()?;
        self.update(conn)?;
        Ok(added)
    }

    /// Drops dynamic columns by rebuilding the table.
    ///
    /// Names that match no column are skipped. Indexes that reference a
    /// dropped column are discarded. All others, including unique, partial
    /// and expression indexes, are re-created from their stored statements
    /// in the rebuild transaction, so a failure leaves the table as it was.
    /// Returns `false` if there was nothing to drop.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::ColumnNotDroppable`] for the row identity or a
    /// declared column, before anything is changed.
    pub fn drop_columns(&mut self, conn: &Connection, names: &[&str]) -> Result<bool> {
        let mut dropped: Vec<String> = Vec::new();
        for name in names {
            let not_droppable = || OrmError::ColumnNotDroppable {
                table: self.table_name.clone(),
                column: name.to_string(),
            };
            if name.eq_ignore_ascii_case(ROW_ID) {
                return Err(not_droppable());
            }
            match self.column(name) {
                None => debug!(table = %self.table_name, column = %name, "no such column to drop"),
                Some(m) if m.is_declared() => return Err(not_droppable()),
                Some(m) => dropped.push(m.name().to_string()),
            }
        }
        if dropped.is_empty() {
            return Ok(false);
        }
        let is_dropped = |name: &str| dropped.iter().any(|d| d.eq_ignore_ascii_case(name));

        let survivors: Vec<LiveColumn> = self
            .live_columns(conn)?
            .into_iter()
            .filter(|c| !is_dropped(&c.name))
            .collect();
        let (kept, omitted): (Vec<_>, Vec<_>) = index::stored_indexes(conn, &self.table_name)?
            .into_iter()
            .partition(|i| !i.columns.iter().any(|c| is_dropped(c)));
        for index in &omitted {
            warn!(index = %index.name, table = %self.table_name, "omitting index on dropped column");
        }

        info!(table = %self.table_name, columns = ?dropped, "rebuilding table");
        let mut statements = rebuild_sql(&self.table_name, &survivors)?;
        statements.extend(kept.into_iter().map(|i| i.sql));
        rebuild(conn, &statements)?;

        let remaining = self
            .column_mappings
            .iter()
            .filter(|m| !is_dropped(m.name()))
            .cloned()
            .collect();
        self.set_mappings(remaining);
        self.update(conn)?;
        Ok(true)
    }

    /// Drops the table of a procedural mapping.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::TableNotDroppable`] for declared mappings.
    pub fn drop_table(&mut self, conn: &Connection) -> Result<()> {
        if self.kind != TableKind::ElasticProcedural {
            return Err(OrmError::TableNotDroppable(self.table_name.clone()));
        }
        info!(table = %self.table_name, "dropping table");
        execute_ddl(conn, &drop_table_sql(&self.table_name)?)?;
        let declared = self.declared.clone();
        self.set_mappings(declared);
        self.state = MappingState::Uninitialized;
        Ok(())
    }
}

/// Runs the rebuild statements in one transaction with foreign keys off.
///
/// `PRAGMA foreign_keys` is a no-op inside a transaction, so it is switched
/// around the transaction and restored afterwards.
fn rebuild(conn: &Connection, statements: &[String]) -> Result<()> {
    let foreign_keys: bool = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA foreign_keys = OFF;")?;

    let result = (|| -> Result<()> {
        let tx = conn.unchecked_transaction()?;
        for sql in statements {
            execute_ddl(&tx, sql)?;
        }
        tx.commit()?;
        Ok(())
    })();

    if foreign_keys {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elastic() -> TableMapping {
        TableMapping::new(
            "test.Thing",
            "test$Thing",
            TableKind::ElasticDeclared,
            vec![
                ColumnMapping::declared("Id", "Id", ValueType::Int32, TableKind::ElasticDeclared),
                ColumnMapping::declared("Label", "Name", ValueType::String, TableKind::ElasticDeclared),
            ],
        )
    }

    fn names(mapping: &TableMapping) -> Vec<&str> {
        mapping.sql_column_names().collect()
    }

    #[test]
    fn test_new_mapping_has_row_identity() {
        let mapping = elastic();
        assert_eq!(names(&mapping), vec!["RowId", "Id", "Name"]);
        assert!(mapping.column("rowid").unwrap().is_ignored);
        assert_eq!(mapping.transact_mappings().count(), 2);
        assert_eq!(mapping.state(), MappingState::Uninitialized);
    }

    #[test]
    fn test_ignored_rules() {
        let static_extra =
            ColumnMapping::discovered("Extra", ValueType::String, TableKind::StaticDeclared);
        assert!(static_extra.is_ignored);
        let elastic_extra =
            ColumnMapping::discovered("Extra", ValueType::String, TableKind::ElasticDeclared);
        assert!(!elastic_extra.is_ignored);
        let unsupported =
            ColumnMapping::discovered("Blob", ValueType::Unsupported, TableKind::ElasticDeclared);
        assert!(unsupported.is_ignored);
    }

    #[test]
    fn test_create_and_idempotent_update() {
        let conn = Connection::open_in_memory().unwrap();
        let mut mapping = elastic();
        let first = mapping.create(&conn).unwrap();
        assert!(first.is_noop());
        assert_eq!(mapping.state(), MappingState::Reconciled);
        let live: Vec<_> = mapping.live_columns(&conn).unwrap();
        assert_eq!(live.len(), 2);

        let before = mapping.column_mappings().to_vec();
        let second = mapping.update(&conn).unwrap();
        assert!(second.is_noop());
        assert_eq!(mapping.column_mappings(), before.as_slice());
    }

    #[test]
    fn test_update_pushes_missing_declared_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(r#"CREATE TABLE "test$Thing" ("Id" INT)"#)
            .unwrap();
        let mut mapping = elastic();
        let report = mapping.create(&conn).unwrap();
        assert_eq!(report.added, vec!["Name"]);
        assert_eq!(mapping.live_columns(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_update_pulls_live_columns() {
        let conn = Connection::open_in_memory().unwrap();
        let mut mapping = elastic();
        mapping.create(&conn).unwrap();
        conn.execute_batch(r#"ALTER TABLE "test$Thing" ADD COLUMN "Color" TEXT"#)
            .unwrap();
        let report = mapping.update(&conn).unwrap();
        assert_eq!(report.absorbed, vec!["Color"]);
        let color = mapping.column("color").unwrap();
        assert!(!color.is_declared());
        assert!(!color.is_ignored);
        assert_eq!(color.column.value_type, ValueType::String);
        assert!(mapping.update(&conn).unwrap().is_noop());
    }

    #[test]
    fn test_schema_conflict() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(r#"CREATE TABLE "test$Thing" ("Id" TEXT)"#)
            .unwrap();
        let mut mapping = elastic();
        let err = mapping.create(&conn).unwrap_err();
        assert!(matches!(err, OrmError::SchemaConflict { ref column, .. } if column == "Id"));
        // The missing declared column was not pushed either
        assert_eq!(mapping.live_columns(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_keyword_comparison_ignores_case() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(r#"CREATE TABLE "test$Thing" ("Id" int, "Name" text)"#)
            .unwrap();
        let mut mapping = elastic();
        assert!(mapping.create(&conn).unwrap().is_noop());
    }

    #[test]
    fn test_add_columns() {
        let conn = Connection::open_in_memory().unwrap();
        let mut mapping = elastic();
        mapping.create(&conn).unwrap();
        let added = mapping
            .add_columns(
                &conn,
                &[
                    ColumnSpec::new("Weight", ValueType::Double),
                    ColumnSpec::new("name", ValueType::String),
                    ColumnSpec::new("Blob", ValueType::Unsupported),
                ],
            )
            .unwrap();
        assert_eq!(added, vec!["Weight"]);
        assert!(mapping.has_column("WEIGHT"));
        assert!(!mapping.has_column("Blob"));
    }

    #[test]
    fn test_add_columns_rejects_static_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let mut mapping = TableMapping::new(
            "test.Fixed",
            "test$Fixed",
            TableKind::StaticDeclared,
            vec![ColumnMapping::declared("A", "A", ValueType::Int32, TableKind::StaticDeclared)],
        );
        mapping.create(&conn).unwrap();
        let err = mapping
            .add_columns(&conn, &[ColumnSpec::new("B", ValueType::Int32)])
            .unwrap_err();
        assert!(matches!(err, OrmError::DeclarationError(_)));
    }

    #[test]
    fn test_drop_columns_rejects_declared_and_row_id() {
        let conn = Connection::open_in_memory().unwrap();
        let mut mapping = elastic();
        mapping.create(&conn).unwrap();
        for name in ["RowId", "Id", "name"] {
            let err = mapping.drop_columns(&conn, &[name]).unwrap_err();
            assert!(matches!(err, OrmError::ColumnNotDroppable { .. }));
        }
        assert_eq!(mapping.live_columns(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_drop_columns_unknown_is_noop() {
        let conn = Connection::open_in_memory().unwrap();
        let mut mapping = elastic();
        mapping.create(&conn).unwrap();
        assert!(!mapping.drop_columns(&conn, &["Nope"]).unwrap());
    }

    #[test]
    fn test_drop_dynamic_column() {
        let conn = Connection::open_in_memory().unwrap();
        let mut mapping = elastic();
        mapping.create(&conn).unwrap();
        mapping
            .add_columns(&conn, &[ColumnSpec::new("Color", ValueType::String)])
            .unwrap();
        conn.execute_batch(r#"INSERT INTO "test$Thing" ("Id","Name","Color") VALUES (1,'a','red')"#)
            .unwrap();

        assert!(mapping.drop_columns(&conn, &["COLOR"]).unwrap());
        assert!(!mapping.has_column("Color"));
        let live: Vec<_> = mapping
            .live_columns(&conn)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(live, vec!["Id", "Name"]);
        let name: String = conn
            .query_row(r#"SELECT "Name" FROM "test$Thing" WHERE "Id" = 1"#, [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "a");
    }

    fn index_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND sql IS NOT NULL ORDER BY name")
            .unwrap();
        stmt.query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_drop_column_keeps_unrelated_indexes_of_any_form() {
        let conn = Connection::open_in_memory().unwrap();
        let mut mapping = elastic();
        mapping.create(&conn).unwrap();
        mapping
            .add_columns(
                &conn,
                &[
                    ColumnSpec::new("Color", ValueType::String),
                    ColumnSpec::new("Size", ValueType::Int32),
                ],
            )
            .unwrap();
        conn.execute_batch(
            r#"CREATE UNIQUE INDEX "ux_id" ON "test$Thing" ("Id");
               CREATE INDEX "by-name" ON "test$Thing" ("Name" DESC);
               CREATE INDEX "ix_size" ON "test$Thing" ("Size") WHERE "Size" > 0;
               CREATE INDEX "ix_color" ON "test$Thing" ("Color", "Id");"#,
        )
        .unwrap();

        assert!(mapping.drop_columns(&conn, &["Color"]).unwrap());
        assert_eq!(index_names(&conn), vec!["by-name", "ix_size", "ux_id"]);

        // The unique index is still enforced after the rebuild
        conn.execute_batch(r#"INSERT INTO "test$Thing" ("Id") VALUES (1)"#)
            .unwrap();
        assert!(
            conn.execute_batch(r#"INSERT INTO "test$Thing" ("Id") VALUES (1)"#)
                .is_err()
        );
    }

    #[test]
    fn test_failed_index_recreation_rolls_back_drop() {
        let conn = Connection::open_in_memory().unwrap();
        let mut mapping = elastic();
        mapping.create(&conn).unwrap();
        mapping
            .add_columns(&conn, &[ColumnSpec::new("Color", ValueType::String)])
            .unwrap();
        // A partial index whose predicate reads the dropped column cannot be
        // re-created on the rebuilt table.
        conn.execute_batch(
            r#"CREATE INDEX "ix_named" ON "test$Thing" ("Name") WHERE "Color" IS NOT NULL;"#,
        )
        .unwrap();

        assert!(mapping.drop_columns(&conn, &["Color"]).is_err());
        assert!(mapping.has_column("Color"));
        let live: Vec<_> = mapping
            .live_columns(&conn)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(live, vec!["Id", "Name", "Color"]);
        assert_eq!(index_names(&conn), vec!["ix_named"]);
    }

    #[test]
    fn test_drop_table_only_for_procedural() {
        let conn = Connection::open_in_memory().unwrap();
        let mut mapping = elastic();
        mapping.create(&conn).unwrap();
        assert!(matches!(
            mapping.drop_table(&conn),
            Err(OrmError::TableNotDroppable(_))
        ));

        let mut procedural = TableMapping::new(
            "dyn.Bins",
            "dyn$Bins",
            TableKind::ElasticProcedural,
            vec![ColumnMapping::declared("Id", "Id", ValueType::Int32, TableKind::ElasticProcedural)],
        );
        procedural.create(&conn).unwrap();
        procedural.drop_table(&conn).unwrap();
        assert!(!procedural.exists(&conn).unwrap());
        assert_eq!(procedural.state(), MappingState::Uninitialized);
    }
}

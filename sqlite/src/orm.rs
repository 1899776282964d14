//! The engine entry point.

use tablemap_core::{DeclarationError, Entity, EntityType};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::db::Database;
use crate::definition::TableDefinition;
use crate::error::{OrmError, Result};
use crate::index::IndexManager;
use crate::mapping::{ColumnSpec, MappingState, Reconciliation, TableMapping};
use crate::registry::{TableMappings, lock};
use crate::table::Table;

/// A store together with the mappings registered against it.
#[derive(Debug)]
pub struct Orm {
    database: Database,
    mappings: TableMappings,
}

impl Orm {
    /// Opens the store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store
    /// directory cannot be created.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Ok(Self::new(Database::open(config)?))
    }

    pub fn new(database: Database) -> Self {
        Self {
            database,
            mappings: TableMappings::new(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn registry(&self) -> &TableMappings {
        &self.mappings
    }

    pub fn indexes(&self) -> IndexManager<'_> {
        IndexManager::new(&self.database, &self.mappings)
    }

    /// Registers an entity type and brings its table up to date.
    ///
    /// Creates the table if it does not exist, then reconciles. A type that
    /// is already registered is reconciled again. Registration and
    /// reconciliation of one type are serialized on its mapping's mutex, and
    /// concurrent callers share one mapping. Nothing is registered if the
    /// first reconciliation fails.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::SchemaConflict`] when a live column disagrees with
    /// a declared one, or a database error.
    pub fn ensure_schema<E: Entity>(&self, entity_type: &EntityType<E>) -> Result<Table<'_, E>> {
        let conn = self.database.connect()?;
        let type_name = entity_type.name();
        loop {
            let shared = self
                .mappings
                .get_or_insert_with(type_name, || TableMapping::from_entity_type(entity_type));
            let mut mapping = lock(&shared);
            // A failed first registration removes its entry while holding the lock
            if !self.mappings.holds(type_name, &shared) {
                continue;
            }
            let fresh = mapping.state() == MappingState::Uninitialized;
            match mapping.update(&conn) {
                Ok(report) if fresh => info!(
                    type_name = %type_name,
                    table = %mapping.table_name(),
                    added = report.added.len(),
                    absorbed = report.absorbed.len(),
                    "registered type"
                ),
                Ok(report) => {
                    debug!(type_name = %type_name, report = ?report, "reconciled registered type")
                }
                Err(e) => {
                    if fresh {
                        self.mappings.remove_if_same(type_name, &shared);
                    }
                    return Err(e);
                }
            }
            drop(mapping);
            return Ok(Table::new(self, entity_type.clone(), shared));
        }
    }

    /// Binds a registered entity type to its table.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UnknownType`] if the type is not registered.
    pub fn table<E: Entity>(&self, entity_type: &EntityType<E>) -> Result<Table<'_, E>> {
        let shared = self
            .mappings
            .get(entity_type.name())
            .ok_or_else(|| OrmError::UnknownType(entity_type.name().to_string()))?;
        Ok(Table::new(self, entity_type.clone(), shared))
    }

    /// Snapshots of every registered mapping, ordered by type name.
    pub fn mappings(&self) -> Vec<TableMapping> {
        self.mappings.all().iter().map(|m| lock(m).clone()).collect()
    }

    pub fn mapping(&self, type_name: &str) -> Option<TableMapping> {
        self.mappings.get(type_name).map(|m| lock(&m).clone())
    }

    /// Reconciles every registered mapping.
    pub fn update_all(&self) -> Result<Vec<(String, Reconciliation)>> {
        let conn = self.database.connect()?;
        self.mappings
            .all()
            .iter()
            .map(|shared| {
                let mut mapping = lock(shared);
                let report = mapping.update(&conn)?;
                Ok((mapping.type_name().to_string(), report))
            })
            .collect()
    }

    /// Definitions of every elastic mapping.
    pub fn definitions(&self) -> Vec<TableDefinition> {
        self.mappings()
            .iter()
            .filter(|m| m.kind().is_elastic())
            .map(TableDefinition::from_mapping)
            .collect()
    }

    pub fn definition(&self, type_name: &str) -> Option<TableDefinition> {
        self.mapping(type_name)
            .filter(|m| m.kind().is_elastic())
            .map(|m| TableDefinition::from_mapping(&m))
    }

    /// Applies an edited definition to its elastic table.
    ///
    /// Drops the listed columns first, then adds every defined column the
    /// table lacks. Returns `true` if the table changed.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UnknownType`] for an unregistered type,
    /// [`DeclarationError::NotElastic`] for a static one, and
    /// [`OrmError::ColumnNotDroppable`] when a declared column is dropped.
    pub fn update_definition(&self, definition: &TableDefinition) -> Result<bool> {
        let shared = self
            .mappings
            .get(&definition.type_name)
            .ok_or_else(|| OrmError::UnknownType(definition.type_name.clone()))?;
        let mut mapping = lock(&shared);
        if !mapping.kind().is_elastic() {
            return Err(DeclarationError::NotElastic(definition.type_name.clone()).into());
        }
        let conn = self.database.connect()?;

        let dropped: Vec<&str> = definition.dropped_columns.iter().map(String::as_str).collect();
        let mut changed = !dropped.is_empty() && mapping.drop_columns(&conn, &dropped)?;

        let specs: Vec<ColumnSpec> = definition
            .columns
            .iter()
            .filter(|(name, value_type)| {
                !mapping.has_column(name) && value_type.is_supported()
            })
            .map(|(name, value_type)| ColumnSpec::new(name, *value_type))
            .collect();
        if !specs.is_empty() {
            changed |= !mapping.add_columns(&conn, &specs)?.is_empty();
        }
        Ok(changed)
    }

    /// Drops dynamic columns from a registered elastic type.
    pub fn drop_columns(&self, type_name: &str, names: &[&str]) -> Result<bool> {
        let shared = self
            .mappings
            .get(type_name)
            .ok_or_else(|| OrmError::UnknownType(type_name.to_string()))?;
        let conn = self.database.connect()?;
        lock(&shared).drop_columns(&conn, names)
    }
}

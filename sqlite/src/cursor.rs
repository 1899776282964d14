//! Entity materialization.
//!
//! An [`EntityCursor`] walks a result set forward, building one entity per
//! row. It borrows the statement it reads from, so it only exists inside
//! [`Table::scan`](crate::Table::scan); the connection and statement are
//! released when the scan returns.

use rusqlite::{Row, Rows};
use tablemap_core::{Condition, Entity, EntityType, PropertyDescriptor, Value, ValueType};
use tracing::debug;

use crate::convert::read_value;
use crate::error::{OrmError, Result};
use crate::mapping::{ColumnMapping, TableMapping};

/// Reads and writes one mapped column on an entity.
pub(crate) enum Accessor<'a, E> {
    /// A declared property.
    Property(&'a PropertyDescriptor<E>),
    /// A dynamic member, by column name.
    Member(String),
}

impl<'a, E: Entity> Accessor<'a, E> {
    /// Binds a column mapping to the entity type.
    pub(crate) fn bind(entity_type: &'a EntityType<E>, mapping: &ColumnMapping) -> Self {
        match entity_type.property_by_column(mapping.name()) {
            Some(property) if mapping.is_declared() => Accessor::Property(property),
            _ => Accessor::Member(mapping.name().to_string()),
        }
    }

    pub(crate) fn get(&self, entity: &E) -> Value {
        match self {
            Accessor::Property(property) => property.get(entity),
            Accessor::Member(name) => entity
                .members()
                .and_then(|members| members.get(name))
                .cloned()
                .unwrap_or_default(),
        }
    }

    pub(crate) fn set(&self, entity: &mut E, value: Value) -> Result<()> {
        match self {
            Accessor::Property(property) => {
                property
                    .set(entity, value)
                    .map_err(|e| OrmError::ConversionError {
                        column: property.column_name().to_string(),
                        expected: e.expected,
                        reason: e.to_string(),
                    })
            }
            Accessor::Member(name) => {
                if let Some(members) = entity.members_mut() {
                    members.set(name, value);
                }
                Ok(())
            }
        }
    }
}

/// A transact mapping bound to a result column.
pub(crate) struct Binding<'a, E> {
    accessor: Accessor<'a, E>,
    column: String,
    index: usize,
    value_type: ValueType,
    is_declared: bool,
}

/// Binds the transact mappings to the result columns of `SELECT rowid,*`.
///
/// Column 0 holds the row identity. Mappings with no matching result
/// column are left unbound.
pub(crate) fn bind_columns<'a, E: Entity>(
    entity_type: &'a EntityType<E>,
    mapping: &TableMapping,
    column_names: &[&str],
) -> Vec<Binding<'a, E>> {
    mapping
        .transact_mappings()
        .filter_map(|m| {
            let index = column_names
                .iter()
                .skip(1)
                .position(|name| name.eq_ignore_ascii_case(m.name()))
                .map(|i| i + 1);
            if index.is_none() {
                debug!(table = %mapping.table_name(), column = %m.name(), "column missing from result set");
            }
            Some(Binding {
                accessor: Accessor::bind(entity_type, m),
                column: m.name().to_string(),
                index: index?,
                value_type: m.column.value_type,
                is_declared: m.is_declared(),
            })
        })
        .collect()
}

/// A forward-only cursor over materialized entities.
///
/// Yields only entities that satisfy every post-filter condition. To read
/// the rows again, run the scan again.
pub struct EntityCursor<'a, E: Entity> {
    rows: Rows<'a>,
    entity_type: &'a EntityType<E>,
    bindings: Vec<Binding<'a, E>>,
    post_filters: Vec<Condition>,
}

impl<'a, E: Entity> EntityCursor<'a, E> {
    pub(crate) fn new(
        rows: Rows<'a>,
        entity_type: &'a EntityType<E>,
        bindings: Vec<Binding<'a, E>>,
        post_filters: Vec<Condition>,
    ) -> Self {
        Self {
            rows,
            entity_type,
            bindings,
            post_filters,
        }
    }

    /// Conditions evaluated in memory for each row.
    pub fn post_filters(&self) -> &[Condition] {
        &self.post_filters
    }

    fn materialize(
        entity_type: &EntityType<E>,
        bindings: &[Binding<'a, E>],
        row: &Row<'_>,
    ) -> Result<E> {
        let mut entity = entity_type.construct();
        entity.set_row_id(row.get(0)?);
        for binding in bindings {
            let value = read_value(row.get_ref(binding.index)?, binding.value_type, &binding.column)?;
            // Declared properties keep their default for NULL
            if value.is_null() && binding.is_declared {
                continue;
            }
            binding.accessor.set(&mut entity, value)?;
        }
        Ok(entity)
    }

    fn accepts(&self, entity: &E) -> Result<bool> {
        for condition in &self.post_filters {
            let actual = self.entity_type.resolve(entity, &condition.term);
            if !condition.matches(&actual)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<E: Entity> Iterator for EntityCursor<'_, E> {
    type Item = Result<E>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entity = match self.rows.next() {
                Ok(Some(row)) => Self::materialize(self.entity_type, &self.bindings, row),
                Ok(None) => return None,
                Err(e) => return Some(Err(e.into())),
            };
            match entity.and_then(|e| self.accepts(&e).map(|keep| keep.then_some(e))) {
                Ok(Some(entity)) => return Some(Ok(entity)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

//! Typed access to one mapped table.

use rusqlite::params_from_iter;
use tablemap_core::{Condition, Entity, EntityType, Value};
use tracing::{debug, info};

use crate::convert::{SqlValue, to_column_value};
use crate::cursor::{Accessor, EntityCursor, bind_columns};
use crate::definition::TableDefinition;
use crate::error::Result;
use crate::mapping::{ColumnSpec, Reconciliation, TableMapping};
use crate::orm::Orm;
use crate::registry::{SharedMapping, lock};
use crate::translate::{
    WhereClause, build_where_clause, count_sql, delete_sql, partition, render_literal,
    select_row_ids_sql, select_sql,
};

/// A registered entity type bound to its table.
///
/// Obtained from [`Orm::ensure_schema`] or [`Orm::table`]. Every operation
/// takes a snapshot of the mapping when it starts, so concurrent schema
/// changes become visible to the next operation.
pub struct Table<'o, E: Entity> {
    orm: &'o Orm,
    entity_type: EntityType<E>,
    mapping: SharedMapping,
}

struct Query {
    table: String,
    clause: Option<WhereClause>,
    post_filters: Vec<Condition>,
}

fn rendered(clause: Option<&WhereClause>) -> Vec<String> {
    clause
        .map(|c| c.params.iter().map(render_literal).collect())
        .unwrap_or_default()
}

impl<'o, E: Entity> Table<'o, E> {
    pub(crate) fn new(orm: &'o Orm, entity_type: EntityType<E>, mapping: SharedMapping) -> Self {
        Self {
            orm,
            entity_type,
            mapping,
        }
    }

    pub fn entity_type(&self) -> &EntityType<E> {
        &self.entity_type
    }

    pub fn table_name(&self) -> &str {
        self.entity_type.table_name()
    }

    /// A snapshot of the current mapping.
    pub fn mapping(&self) -> TableMapping {
        lock(&self.mapping).clone()
    }

    /// Splits `conditions` and renders the pushed-down part.
    ///
    /// Pushed-down literals are coerced to the type of their column.
    fn prepare(&self, mapping: &TableMapping, conditions: &[Condition]) -> Result<Query> {
        let (pushdown, post_filters) = partition(conditions, |c| mapping.has_column(c));
        for condition in &post_filters {
            condition.check()?;
        }
        let pushdown: Vec<Condition> = pushdown
            .into_iter()
            .map(|mut c| {
                let column = c.term.single().and_then(|name| mapping.column(name));
                if let Some(column) = column {
                    c.value = to_column_value(c.value, column.column.value_type);
                }
                c
            })
            .collect();
        Ok(Query {
            table: mapping.table_name().to_string(),
            clause: build_where_clause(&pushdown)?,
            post_filters,
        })
    }

    /// Runs a query and hands the cursor to `f`.
    ///
    /// Conditions on known columns are filtered by SQLite; the rest are
    /// evaluated on each materialized entity. The connection is closed when
    /// `f` returns. To iterate again, scan again.
    ///
    /// # Errors
    ///
    /// Returns an error if the conditions cannot be translated, the query
    /// fails, or `f` fails.
    pub fn scan<R>(
        &self,
        conditions: &[Condition],
        f: impl FnOnce(&mut EntityCursor<'_, E>) -> Result<R>,
    ) -> Result<R> {
        let mapping = self.mapping();
        let query = self.prepare(&mapping, conditions)?;
        let sql = select_sql(&query.table, query.clause.as_ref())?;
        debug!(table = %query.table, sql = %sql, params = ?rendered(query.clause.as_ref()), "select");

        let conn = self.orm.database().connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let bindings = bind_columns(&self.entity_type, &mapping, &stmt.column_names());
        let params = query.clause.map(|c| c.params).unwrap_or_default();
        let rows = stmt.query(params_from_iter(params.iter().map(SqlValue)))?;
        let mut cursor = EntityCursor::new(rows, &self.entity_type, bindings, query.post_filters);
        f(&mut cursor)
    }

    /// Materializes every entity that matches `conditions`.
    pub fn select(&self, conditions: &[Condition]) -> Result<Vec<E>> {
        self.scan(conditions, |cursor| cursor.collect())
    }

    /// Row ids of the entities that match `conditions`.
    ///
    /// Only row ids are read when every condition can be pushed down.
    pub fn select_row_ids(&self, conditions: &[Condition]) -> Result<Vec<i64>> {
        let mapping = self.mapping();
        let query = self.prepare(&mapping, conditions)?;
        if !query.post_filters.is_empty() {
            return self.scan(conditions, |cursor| {
                cursor.map(|e| e.map(|e| e.row_id())).collect()
            });
        }
        let sql = select_row_ids_sql(&query.table, query.clause.as_ref())?;
        debug!(table = %query.table, sql = %sql, params = ?rendered(query.clause.as_ref()), "select row ids");
        let conn = self.orm.database().connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let params = query.clause.map(|c| c.params).unwrap_or_default();
        let ids = stmt
            .query_map(params_from_iter(params.iter().map(SqlValue)), |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Counts the entities that match `conditions`.
    pub fn count(&self, conditions: &[Condition]) -> Result<i64> {
        let mapping = self.mapping();
        let query = self.prepare(&mapping, conditions)?;
        if !query.post_filters.is_empty() {
            return self.scan(conditions, |cursor| {
                cursor.try_fold(0_i64, |n, entity| entity.map(|_| n + 1))
            });
        }
        let sql = count_sql(&query.table, query.clause.as_ref())?;
        debug!(table = %query.table, sql = %sql, params = ?rendered(query.clause.as_ref()), "count");
        let conn = self.orm.database().connect()?;
        let params = query.clause.map(|c| c.params).unwrap_or_default();
        let count = conn.query_row(&sql, params_from_iter(params.iter().map(SqlValue)), |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    /// Inserts `entities` in one transaction and assigns their row ids.
    ///
    /// Row ids are assigned only after the transaction commits. Returns the
    /// number of rows inserted.
    pub fn insert(&self, entities: &mut [E]) -> Result<usize> {
        let mapping = self.mapping();
        let spec = mapping.insert_spec();
        let sql = spec.sql()?;
        let accessors: Vec<_> = spec
            .mappings
            .iter()
            .map(|m| (Accessor::bind(&self.entity_type, m), m.column.value_type))
            .collect();
        debug!(table = %spec.table, sql = %sql, rows = entities.len(), "insert");

        let row_ids = self.orm.database().transact(|tx| {
            let mut stmt = tx.prepare(&sql)?;
            let mut row_ids = Vec::with_capacity(entities.len());
            for entity in entities.iter() {
                let values: Vec<Value> = accessors
                    .iter()
                    .map(|(accessor, value_type)| to_column_value(accessor.get(entity), *value_type))
                    .collect();
                stmt.execute(params_from_iter(values.iter().map(SqlValue)))?;
                row_ids.push(tx.last_insert_rowid());
            }
            Ok(row_ids)
        })?;
        for (entity, row_id) in entities.iter_mut().zip(&row_ids) {
            entity.set_row_id(*row_id);
        }
        Ok(row_ids.len())
    }

    /// Writes every transact column of `entities`, matched by row id.
    ///
    /// Returns the number of rows updated.
    pub fn update(&self, entities: &[E]) -> Result<usize> {
        let mapping = self.mapping();
        let spec = mapping.update_spec();
        let sql = spec.sql()?;
        let accessors: Vec<_> = spec
            .mappings
            .iter()
            .map(|m| (Accessor::bind(&self.entity_type, m), m.column.value_type))
            .collect();
        debug!(table = %spec.table, sql = %sql, rows = entities.len(), "update");

        self.orm.database().transact(|tx| {
            let mut stmt = tx.prepare(&sql)?;
            let mut count = 0;
            for entity in entities {
                let mut values: Vec<Value> = accessors
                    .iter()
                    .map(|(accessor, value_type)| to_column_value(accessor.get(entity), *value_type))
                    .collect();
                values.push(Value::Int64(entity.row_id()));
                count += stmt.execute(params_from_iter(values.iter().map(SqlValue)))?;
            }
            Ok(count)
        })
    }

    /// Deletes `entities` by row id. Returns the number of rows deleted.
    pub fn delete(&self, entities: &[E]) -> Result<usize> {
        let row_ids: Vec<i64> = entities.iter().map(Entity::row_id).collect();
        self.delete_row_ids(&row_ids)
    }

    /// Deletes every entity that matches `conditions`.
    pub fn delete_where(&self, conditions: &[Condition]) -> Result<usize> {
        let row_ids = self.select_row_ids(conditions)?;
        self.delete_row_ids(&row_ids)
    }

    fn delete_row_ids(&self, row_ids: &[i64]) -> Result<usize> {
        if row_ids.is_empty() {
            return Ok(0);
        }
        let sql = delete_sql(self.table_name())?;
        debug!(table = %self.table_name(), sql = %sql, rows = row_ids.len(), "delete");
        self.orm.database().transact(|tx| {
            let mut stmt = tx.prepare(&sql)?;
            let mut count = 0;
            for row_id in row_ids {
                count += stmt.execute([row_id])?;
            }
            Ok(count)
        })
    }

    /// Reconciles the mapping with the live table.
    pub fn update_schema(&self) -> Result<Reconciliation> {
        let conn = self.orm.database().connect()?;
        lock(&self.mapping).update(&conn)
    }

    /// Adds dynamic columns to an elastic table.
    pub fn add_columns(&self, specs: &[ColumnSpec]) -> Result<Vec<String>> {
        let conn = self.orm.database().connect()?;
        let added = lock(&self.mapping).add_columns(&conn, specs)?;
        if !added.is_empty() {
            info!(table = %self.table_name(), columns = ?added, "added columns");
        }
        Ok(added)
    }

    /// Drops dynamic columns from an elastic table.
    pub fn drop_columns(&self, names: &[&str]) -> Result<bool> {
        let conn = self.orm.database().connect()?;
        lock(&self.mapping).drop_columns(&conn, names)
    }

    /// The editable definition of an elastic table.
    pub fn definition(&self) -> Option<TableDefinition> {
        let mapping = self.mapping();
        mapping
            .kind()
            .is_elastic()
            .then(|| TableDefinition::from_mapping(&mapping))
    }
}

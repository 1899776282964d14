//! SQLite storage engine for mapped entity types.
//!
//! This crate binds [`EntityType`](tablemap_core::EntityType) descriptions
//! to SQLite tables, keeps each table's columns reconciled with its
//! declaration, translates conditions to parameterized SQL, and
//! materializes rows back into entities.
//!
//! # Architecture
//!
//! - **`mapping`**: per-type schema state and reconciliation (create,
//!   update, add columns, drop columns by rebuild)
//! - **`registry`**: the shared, lockable set of table mappings
//! - **`translate`**: condition partitioning and SQL generation
//! - **`table`**: typed select/insert/update/delete over one table
//! - **`index`**: index listing, creation and re-creation
//! - **`procedural`**: runtime-created elastic resources
//!
//! # Quick start
//!
//! ```no_run
//! use tablemap_core::{Condition, Entity, EntityType, Operator, PropertyDescriptor};
//! use tablemap_sqlite::{Orm, StoreConfig};
//!
//! #[derive(Default)]
//! struct Product {
//!     row_id: i64,
//!     id: i32,
//!     name: Option<String>,
//! }
//!
//! impl Entity for Product {
//!     fn row_id(&self) -> i64 { self.row_id }
//!     fn set_row_id(&mut self, row_id: i64) { self.row_id = row_id; }
//! }
//!
//! let product_type = EntityType::builder("shop.Product")
//!     .constructor(Product::default)
//!     .property(PropertyDescriptor::new("Id", |p: &Product| p.id, |p, v| p.id = v))
//!     .property(PropertyDescriptor::new("Name", |p: &Product| p.name.clone(), |p, v| p.name = v))
//!     .build()
//!     .unwrap();
//!
//! let orm = Orm::open(StoreConfig::new("data", "shop")).unwrap();
//! let products = orm.ensure_schema(&product_type).unwrap();
//!
//! products
//!     .insert(&mut [Product { id: 1, name: Some("Widget".into()), ..Default::default() }])
//!     .unwrap();
//!
//! let found = products
//!     .select(&[Condition::new("Id", Operator::Equals, 1).unwrap()])
//!     .unwrap();
//! assert_eq!(found.len(), 1);
//! ```

mod config;
mod convert;
mod cursor;
mod db;
mod definition;
mod error;
mod index;
mod mapping;
mod orm;
mod procedural;
mod registry;
mod schema;
mod table;
mod translate;

pub use config::StoreConfig;
pub use convert::{SqlValue, read_value, to_column_value};
pub use cursor::EntityCursor;
pub use db::Database;
pub use definition::TableDefinition;
pub use error::{OrmError, Result};
pub use index::{IndexColumn, IndexDescriptor, IndexManager, create_index, drop_index, table_indexes};
pub use mapping::{
    ColumnMapping, ColumnSpec, MappingState, PropertySpec, ROW_ID_COLUMN, Reconciliation,
    TableMapping,
};
pub use orm::Orm;
pub use procedural::{Method, PROCEDURAL_RESOURCE_TYPE, ProceduralFactory, ProceduralResource};
pub use registry::{SharedMapping, TableMappings, lock};
pub use schema::{LiveColumn, TEMP_TABLE_SUFFIX, list_tables, quote_ident, table_exists, table_info};
pub use table::Table;
pub use translate::{
    InsertSpec, UpdateSpec, WhereClause, build_where_clause, count_sql, delete_sql, partition,
    render_literal, select_row_ids_sql, select_sql,
};

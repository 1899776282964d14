//! Backend-independent model for mapping entity types to tables.
//!
//! This crate defines what the store binding needs to know about an
//! application's entities, without touching any database:
//!
//! - [`ValueType`] / [`ColumnType`]: host value types, column types and the
//!   two-way mapping between them.
//! - [`Value`]: a single property or column value.
//! - [`EntityType`]: an explicit, validated description of how an
//!   [`Entity`]'s properties map to columns.
//! - [`DynamicMembers`]: the case-insensitive member bag carried by
//!   elastic entities.
//! - [`Condition`]: one filter condition, with in-memory evaluation for
//!   conditions the store cannot filter on.
//!
//! Declaration problems are reported as [`DeclarationError`]s by
//! [`EntityTypeBuilder::build`].
//!
//! # Example
//!
//! ```
//! use tablemap_core::*;
//!
//! #[derive(Default)]
//! struct Product {
//!     row_id: i64,
//!     id: i32,
//!     name: String,
//! }
//!
//! impl Entity for Product {
//!     fn row_id(&self) -> i64 { self.row_id }
//!     fn set_row_id(&mut self, row_id: i64) { self.row_id = row_id; }
//! }
//!
//! let product = EntityType::builder("shop.Product")
//!     .table_name("Product")
//!     .constructor(Product::default)
//!     .property(PropertyDescriptor::new("Id", |p: &Product| p.id, |p, v| p.id = v))
//!     .property(PropertyDescriptor::new("Name", |p: &Product| p.name.clone(), |p, v| p.name = v))
//!     .build()
//!     .unwrap();
//!
//! let widget = Product { row_id: 0, id: 1, name: "Widget".into() };
//! let condition = Condition::equals("name", "Widget").unwrap();
//! assert!(condition.matches(&product.resolve(&widget, &condition.term)).unwrap());
//! ```

mod condition;
mod entity;
mod members;
mod types;
mod validate;
mod value;

pub use condition::{Condition, ConditionError, Operator, Term};
pub use entity::{
    Entity, EntityType, EntityTypeBuilder, Getter, Mapped, PropertyDescriptor, RESERVED_NAMESPACE,
    ROW_ID, Setter, TableKind, default_table_name,
};
pub use members::DynamicMembers;
pub use types::{ColumnType, ValueType};
pub use validate::{DeclarationError, is_valid_identifier, validate_entity_type};
pub use value::{DATETIME_FORMAT, Value, ValueTypeMismatch, parse_datetime};

//! Entity descriptors: the explicit, registration-time description of how an
//! entity's properties map to table columns.
//!
//! An [`EntityType`] is built once per entity, validated on
//! [`build`](EntityTypeBuilder::build), and never changes afterwards, so
//! inspecting it is pure and needs no cache invalidation.
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
//! assert_eq!(product_type.table_name(), "shop$Product");
//! assert_eq!(product_type.kind(), TableKind::StaticDeclared);
//! assert!(product_type.property("name").unwrap().is_nullable());
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::condition::Term;
use crate::members::DynamicMembers;
use crate::types::ValueType;
use crate::validate::{DeclarationError, validate_entity_type};
use crate::value::{Value, ValueTypeMismatch};

/// Name of the implicit row identity column.
pub const ROW_ID: &str = "rowid";

/// Namespace prefix reserved for the engine's own entity types.
pub const RESERVED_NAMESPACE: &str = "tablemap.";

/// An instance that can be stored in a mapped table.
///
/// Row identity is assigned by the store. Elastic entities additionally
/// expose a [`DynamicMembers`] bag for columns not known at compile time.
pub trait Entity: Send + 'static {
    fn row_id(&self) -> i64;

    fn set_row_id(&mut self, row_id: i64);

    /// Dynamic members, for elastic entities.
    fn members(&self) -> Option<&DynamicMembers> {
        None
    }

    fn members_mut(&mut self) -> Option<&mut DynamicMembers> {
        None
    }
}

/// Host types that map directly to a column.
///
/// `Option<T>` maps to the same value type as `T` and marks the property
/// nullable.
pub trait Mapped: Into<Value> + TryFrom<Value, Error = ValueTypeMismatch> {
    const VALUE_TYPE: ValueType;
    const NULLABLE: bool = false;
}

macro_rules! mapped {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Mapped for $ty {
                const VALUE_TYPE: ValueType = ValueType::$variant;
            }

            impl Mapped for Option<$ty> {
                const VALUE_TYPE: ValueType = ValueType::$variant;
                const NULLABLE: bool = true;
            }
        )*
    };
}

mapped! {
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    f32 => Single,
    f64 => Double,
    Decimal => Decimal,
    u8 => Byte,
    String => String,
    bool => Boolean,
    NaiveDateTime => DateTime,
}

/// Reads a property value from an entity.
pub type Getter<E> = Arc<dyn Fn(&E) -> Value + Send + Sync>;

/// Writes a property value into an entity.
pub type Setter<E> = Arc<dyn Fn(&mut E, Value) -> Result<(), ValueTypeMismatch> + Send + Sync>;

/// The kind of a table mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableKind {
    /// A declared entity bound to a table with a fixed set of columns.
    StaticDeclared,
    /// A declared entity that may carry dynamic members beyond its declared columns.
    ElasticDeclared,
    /// An elastic entity type created at runtime.
    ElasticProcedural,
}

impl TableKind {
    pub const fn is_elastic(self) -> bool {
        !matches!(self, TableKind::StaticDeclared)
    }

    pub const fn is_declared(self) -> bool {
        !matches!(self, TableKind::ElasticProcedural)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableKind::StaticDeclared => "StaticDeclared",
            TableKind::ElasticDeclared => "ElasticDeclared",
            TableKind::ElasticProcedural => "ElasticProcedural",
        };
        f.write_str(name)
    }
}

/// One declared property of an entity type.
pub struct PropertyDescriptor<E> {
    name: String,
    column_name: Option<String>,
    value_type: ValueType,
    nullable: bool,
    ignored: bool,
    getter: Option<Getter<E>>,
    setter: Option<Setter<E>>,
}

impl<E> Clone for PropertyDescriptor<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            column_name: self.column_name.clone(),
            value_type: self.value_type,
            nullable: self.nullable,
            ignored: self.ignored,
            getter: self.getter.clone(),
            setter: self.setter.clone(),
        }
    }
}

impl<E> fmt::Debug for PropertyDescriptor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("column_name", &self.column_name)
            .field("value_type", &self.value_type)
            .field("nullable", &self.nullable)
            .field("ignored", &self.ignored)
            .field("readable", &self.getter.is_some())
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

impl<E: 'static> PropertyDescriptor<E> {
    /// Declares a property from a typed getter/setter pair.
    ///
    /// The value type and nullability follow from `T`.
    pub fn new<T, G, S>(name: &str, get: G, set: S) -> Self
    where
        T: Mapped,
        G: Fn(&E) -> T + Send + Sync + 'static,
        S: Fn(&mut E, T) + Send + Sync + 'static,
    {
        let getter: Getter<E> = Arc::new(move |entity| get(entity).into());
        let setter: Setter<E> = Arc::new(move |entity, value| {
            set(entity, T::try_from(value)?);
            Ok(())
        });
        Self::from_parts(name, T::VALUE_TYPE, T::NULLABLE, Some(getter), Some(setter))
    }

    /// Declares a property from untyped parts.
    ///
    /// Registration code generated for arbitrary host types uses this form,
    /// including [`ValueType::Unsupported`] for types with no column mapping.
    pub fn from_parts(
        name: &str,
        value_type: ValueType,
        nullable: bool,
        getter: Option<Getter<E>>,
        setter: Option<Setter<E>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            column_name: None,
            value_type,
            nullable,
            ignored: false,
            getter,
            setter,
        }
    }
}

impl<E> PropertyDescriptor<E> {
    /// Maps the property to a column with a different name.
    pub fn column(mut self, column_name: &str) -> Self {
        self.column_name = Some(column_name.to_string());
        self
    }

    /// Excludes the property from the table mapping.
    pub fn ignored(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The column this property maps to: the custom name, else the property name.
    pub fn column_name(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.name)
    }

    pub fn custom_column_name(&self) -> Option<&str> {
        self.column_name.as_deref()
    }

    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub const fn is_ignored(&self) -> bool {
        self.ignored
    }

    pub const fn is_readable(&self) -> bool {
        self.getter.is_some()
    }

    pub const fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Reads the property. Unreadable properties read as NULL.
    pub fn get(&self, entity: &E) -> Value {
        self.getter.as_ref().map_or(Value::Null, |get| get(entity))
    }

    /// Writes the property. Unwritable properties ignore the write.
    pub fn set(&self, entity: &mut E, value: Value) -> Result<(), ValueTypeMismatch> {
        match &self.setter {
            Some(set) => set(entity, value),
            None => Ok(()),
        }
    }
}

/// A validated entity type description.
pub struct EntityType<E> {
    name: String,
    table_name: String,
    kind: TableKind,
    constructor: fn() -> E,
    properties: Vec<PropertyDescriptor<E>>,
}

impl<E> Clone for EntityType<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            table_name: self.table_name.clone(),
            kind: self.kind,
            constructor: self.constructor,
            properties: self.properties.clone(),
        }
    }
}

impl<E> fmt::Debug for EntityType<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("table_name", &self.table_name)
            .field("kind", &self.kind)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Derives the default table name for a fully qualified type name.
pub fn default_table_name(type_name: &str) -> String {
    type_name.replace('.', "$")
}

impl<E: Entity> EntityType<E> {
    /// Starts describing the entity type with the given fully qualified name.
    pub fn builder(name: &str) -> EntityTypeBuilder<E> {
        EntityTypeBuilder {
            name: name.to_string(),
            table_name: None,
            elastic: false,
            engine_owned: false,
            constructor: None,
            properties: Vec::new(),
        }
    }

    /// Clones this elastic type under a new name as a procedural type.
    ///
    /// The clone has the same properties and a table named after the new
    /// type name. Only the type identity changes.
    pub fn procedural(&self, name: &str) -> Result<Self, DeclarationError> {
        if !self.kind.is_elastic() {
            return Err(DeclarationError::NotElastic(self.name.clone()));
        }
        let procedural = Self {
            name: name.to_string(),
            table_name: default_table_name(name),
            kind: TableKind::ElasticProcedural,
            constructor: self.constructor,
            properties: self.properties.clone(),
        };
        match validate_entity_type(&procedural, false).into_iter().next() {
            Some(error) => Err(error),
            None => Ok(procedural),
        }
    }

    /// Creates a new, empty instance.
    pub fn construct(&self) -> E {
        (self.constructor)()
    }

    /// Resolves a condition term against an instance.
    ///
    /// Single-part terms match the row identity, then a readable property by
    /// name or column name, then a dynamic member. Anything else resolves
    /// to NULL.
    pub fn resolve(&self, entity: &E, term: &Term) -> Value {
        let Some(name) = term.single() else {
            return Value::Null;
        };
        if name.eq_ignore_ascii_case(ROW_ID) {
            return Value::Int64(entity.row_id());
        }
        if let Some(property) = self
            .property(name)
            .or_else(|| self.property_by_column(name))
            .filter(|p| p.is_readable())
        {
            return property.get(entity);
        }
        entity
            .members()
            .and_then(|members| members.get(name))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

impl<E> EntityType<E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub const fn kind(&self) -> TableKind {
        self.kind
    }

    /// All declared properties, including ignored ones, in declaration order.
    pub fn properties(&self) -> &[PropertyDescriptor<E>] {
        &self.properties
    }

    /// Properties that map to a column.
    pub fn mapped_properties(&self) -> impl Iterator<Item = &PropertyDescriptor<E>> {
        self.properties.iter().filter(|p| !p.is_ignored())
    }

    /// Looks up a property by name, ignoring case.
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor<E>> {
        self.properties
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Looks up a mapped property by its column name, ignoring case.
    pub fn property_by_column(&self, column: &str) -> Option<&PropertyDescriptor<E>> {
        self.mapped_properties()
            .find(|p| p.column_name().eq_ignore_ascii_case(column))
    }
}

/// Builder for [`EntityType`].
pub struct EntityTypeBuilder<E> {
    name: String,
    table_name: Option<String>,
    elastic: bool,
    engine_owned: bool,
    constructor: Option<fn() -> E>,
    properties: Vec<PropertyDescriptor<E>>,
}

impl<E: Entity> EntityTypeBuilder<E> {
    /// Binds the type to a table with a custom name.
    pub fn table_name(mut self, table_name: &str) -> Self {
        self.table_name = Some(table_name.to_string());
        self
    }

    /// Sets the parameterless constructor used to materialize rows.
    pub fn constructor(mut self, constructor: fn() -> E) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Declares the type elastic. Its instances must expose dynamic members.
    pub fn elastic(mut self) -> Self {
        self.elastic = true;
        self
    }

    /// Allows the reserved `tablemap.` namespace. Used for the engine's own tables.
    pub fn engine_owned(mut self) -> Self {
        self.engine_owned = true;
        self
    }

    pub fn property(mut self, property: PropertyDescriptor<E>) -> Self {
        self.properties.push(property);
        self
    }

    /// Validates the description and returns the entity type.
    ///
    /// # Errors
    ///
    /// Returns the first [`DeclarationError`] found.
    pub fn build(self) -> Result<EntityType<E>, DeclarationError> {
        let constructor = self
            .constructor
            .ok_or_else(|| DeclarationError::MissingConstructor(self.name.clone()))?;
        if self.elastic && constructor().members().is_none() {
            return Err(DeclarationError::NotElastic(self.name));
        }
        let entity_type = EntityType {
            table_name: self
                .table_name
                .unwrap_or_else(|| default_table_name(&self.name)),
            name: self.name,
            kind: if self.elastic {
                TableKind::ElasticDeclared
            } else {
                TableKind::StaticDeclared
            },
            constructor,
            properties: self.properties,
        };
        match validate_entity_type(&entity_type, self.engine_owned)
            .into_iter()
            .next()
        {
            Some(error) => Err(error),
            None => Ok(entity_type),
        }
    }
}

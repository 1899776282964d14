//! Entity type declaration validation.
//!
//! Catches declarations the store cannot map before any table is touched:
//! missing namespaces, generic names, the reserved engine namespace,
//! half-accessible properties, unsupported value types, the reserved
//! `rowid` column, duplicate columns and types with nothing to store.
//!
//! # Examples
//!
//! ```
//! use tablemap_core::*;
//!
//! #[derive(Default)]
//! struct Note {
//!     row_id: i64,
//!     text: String,
//! }
//!
//! impl Entity for Note {
//!     fn row_id(&self) -> i64 { self.row_id }
//!     fn set_row_id(&mut self, row_id: i64) { self.row_id = row_id; }
//! }
//!
//! // No namespace: rejected
//! let result = EntityType::builder("Note")
//!     .constructor(Note::default)
//!     .property(PropertyDescriptor::new("Text", |n: &Note| n.text.clone(), |n, v| n.text = v))
//!     .build();
//! assert!(matches!(result, Err(DeclarationError::MissingNamespace(_))));
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::entity::{EntityType, RESERVED_NAMESPACE, ROW_ID};

/// Entity type declaration errors.
///
/// Raised at registration time. Registration of the offending type aborts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclarationError {
    /// Type name is empty or whitespace-only.
    #[error("entity type name cannot be empty")]
    EmptyTypeName,
    /// Type name has no namespace part.
    #[error("entity type '{0}' must be declared inside a namespace")]
    MissingNamespace(String),
    /// Type name denotes a generic type.
    #[error("generic entity type '{0}' cannot be mapped to a table")]
    GenericType(String),
    /// Type name lives in the namespace reserved for the engine.
    #[error("entity type '{0}' uses the reserved namespace '{RESERVED_NAMESPACE}'")]
    ReservedNamespace(String),
    /// No parameterless constructor was supplied.
    #[error("entity type '{0}' has no parameterless constructor")]
    MissingConstructor(String),
    /// A property has a setter but no getter.
    #[error("property '{property}' of '{type_name}' has a setter but no getter")]
    MissingGetter { type_name: String, property: String },
    /// A property has a getter but no setter.
    #[error("property '{property}' of '{type_name}' has no setter")]
    MissingSetter { type_name: String, property: String },
    /// A mapped property has a value type with no column type.
    #[error("property '{property}' of '{type_name}' has an unsupported value type")]
    UnsupportedValueType { type_name: String, property: String },
    /// A property maps to the implicit row identity column.
    #[error("column name '{column}' in '{type_name}' is reserved for the row identity")]
    ReservedColumnName { type_name: String, column: String },
    /// A column name cannot be written as a quoted identifier.
    #[error("invalid column name '{column}' in '{type_name}'")]
    InvalidColumnName { type_name: String, column: String },
    /// A table name cannot be written as a quoted identifier.
    #[error("invalid table name '{table}' for '{type_name}'")]
    InvalidTableName { type_name: String, table: String },
    /// Two mapped properties fold to the same column name.
    #[error("duplicate column name '{column}' in '{type_name}'")]
    DuplicateColumn { type_name: String, column: String },
    /// No property maps to a column.
    #[error("entity type '{0}' has no mapped properties")]
    NoColumns(String),
    /// An elastic declaration whose instances carry no dynamic members.
    #[error("entity type '{0}' is not elastic")]
    NotElastic(String),
    /// Column type keyword not known to the engine.
    #[error("unsupported column type keyword: {0}")]
    UnsupportedKeyword(String),
}

/// Returns `true` if `name` can be written as a double-quoted identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains('"') && !name.chars().any(char::is_control)
}

/// Validates an entity type description.
///
/// Returns every problem found, in a stable order: type-level checks
/// first, then property checks in declaration order. `engine_owned`
/// permits the reserved namespace.
pub fn validate_entity_type<E>(
    entity_type: &EntityType<E>,
    engine_owned: bool,
) -> Vec<DeclarationError> {
    let mut errors = Vec::new();
    let type_name = entity_type.name();

    if type_name.trim().is_empty() {
        errors.push(DeclarationError::EmptyTypeName);
        return errors;
    }
    if type_name.contains(['<', '>', '`']) {
        errors.push(DeclarationError::GenericType(type_name.to_string()));
    }
    match type_name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < type_name.len() => {}
        _ => errors.push(DeclarationError::MissingNamespace(type_name.to_string())),
    }
    if !engine_owned
        && type_name
            .to_ascii_lowercase()
            .starts_with(RESERVED_NAMESPACE)
    {
        errors.push(DeclarationError::ReservedNamespace(type_name.to_string()));
    }
    if !is_valid_identifier(entity_type.table_name()) {
        errors.push(DeclarationError::InvalidTableName {
            type_name: type_name.to_string(),
            table: entity_type.table_name().to_string(),
        });
    }

    let mut seen = HashSet::new();
    for property in entity_type.properties() {
        if property.is_ignored() {
            continue;
        }
        let property_name = || (type_name.to_string(), property.name().to_string());
        if !property.is_readable() {
            let (type_name, property) = property_name();
            errors.push(DeclarationError::MissingGetter { type_name, property });
            continue;
        }
        if !property.is_writable() {
            let (type_name, property) = property_name();
            errors.push(DeclarationError::MissingSetter { type_name, property });
            continue;
        }
        if !property.value_type().is_supported() {
            let (type_name, property) = property_name();
            errors.push(DeclarationError::UnsupportedValueType { type_name, property });
            continue;
        }

        let column = property.column_name();
        if column.eq_ignore_ascii_case(ROW_ID) {
            errors.push(DeclarationError::ReservedColumnName {
                type_name: type_name.to_string(),
                column: column.to_string(),
            });
        } else if !is_valid_identifier(column) {
            errors.push(DeclarationError::InvalidColumnName {
                type_name: type_name.to_string(),
                column: column.to_string(),
            });
        } else if !seen.insert(column.to_lowercase()) {
            errors.push(DeclarationError::DuplicateColumn {
                type_name: type_name.to_string(),
                column: column.to_string(),
            });
        }
    }

    if seen.is_empty() && errors.is_empty() {
        errors.push(DeclarationError::NoColumns(type_name.to_string()));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, Getter, PropertyDescriptor, Setter};
    use crate::types::ValueType;
    use crate::value::Value;
    use std::sync::Arc;

    #[derive(Default)]
    struct Row {
        row_id: i64,
        a: i32,
        b: String,
    }

    impl Entity for Row {
        fn row_id(&self) -> i64 {
            self.row_id
        }

        fn set_row_id(&mut self, row_id: i64) {
            self.row_id = row_id;
        }
    }

    fn a() -> PropertyDescriptor<Row> {
        PropertyDescriptor::new("A", |r: &Row| r.a, |r, v| r.a = v)
    }

    fn b() -> PropertyDescriptor<Row> {
        PropertyDescriptor::new("B", |r: &Row| r.b.clone(), |r, v| r.b = v)
    }

    fn build(
        name: &str,
        properties: Vec<PropertyDescriptor<Row>>,
    ) -> Result<EntityType<Row>, DeclarationError> {
        let mut builder = EntityType::builder(name).constructor(Row::default);
        for property in properties {
            builder = builder.property(property);
        }
        builder.build()
    }

    #[test]
    fn test_valid_type() {
        assert!(build("app.Row", vec![a(), b()]).is_ok());
    }

    #[test]
    fn test_missing_namespace() {
        let err = build("Row", vec![a()]).unwrap_err();
        assert_eq!(err, DeclarationError::MissingNamespace("Row".into()));
        assert!(build(".Row", vec![a()]).is_err());
        assert!(build("app.", vec![a()]).is_err());
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(
            build("  ", vec![a()]).unwrap_err(),
            DeclarationError::EmptyTypeName
        );
    }

    #[test]
    fn test_generic_type() {
        let err = build("app.Row<T>", vec![a()]).unwrap_err();
        assert!(matches!(err, DeclarationError::GenericType(_)));
    }

    #[test]
    fn test_reserved_namespace() {
        let err = build("TableMap.Row", vec![a()]).unwrap_err();
        assert!(matches!(err, DeclarationError::ReservedNamespace(_)));

        let allowed = EntityType::builder("tablemap.Row")
            .constructor(Row::default)
            .engine_owned()
            .property(a())
            .build();
        assert!(allowed.is_ok());
    }

    #[test]
    fn test_missing_constructor() {
        let err = EntityType::<Row>::builder("app.Row")
            .property(a())
            .build()
            .unwrap_err();
        assert_eq!(err, DeclarationError::MissingConstructor("app.Row".into()));
    }

    #[test]
    fn test_half_accessible_properties() {
        let getter: Getter<Row> = Arc::new(|r: &Row| Value::from(r.a));
        let read_only =
            PropertyDescriptor::from_parts("ReadOnly", ValueType::Int32, false, Some(getter), None);
        let err = build("app.Row", vec![a(), read_only]).unwrap_err();
        assert!(matches!(err, DeclarationError::MissingSetter { .. }));

        let setter: Setter<Row> = Arc::new(|_, _| Ok(()));
        let write_only =
            PropertyDescriptor::from_parts("WriteOnly", ValueType::Int32, false, None, Some(setter));
        let err = build("app.Row", vec![a(), write_only]).unwrap_err();
        assert!(matches!(err, DeclarationError::MissingGetter { .. }));
    }

    #[test]
    fn test_unsupported_value_type() {
        let getter: Getter<Row> = Arc::new(|_| Value::Null);
        let setter: Setter<Row> = Arc::new(|_, _| Ok(()));
        let blob = PropertyDescriptor::from_parts(
            "Blob",
            ValueType::Unsupported,
            false,
            Some(getter),
            Some(setter),
        );
        let err = build("app.Row", vec![a(), blob.clone()]).unwrap_err();
        assert!(matches!(err, DeclarationError::UnsupportedValueType { .. }));

        // Ignored properties are never validated
        assert!(build("app.Row", vec![a(), blob.ignored()]).is_ok());
    }

    #[test]
    fn test_reserved_row_id_column() {
        let err = build("app.Row", vec![a().column("ROWID")]).unwrap_err();
        assert!(matches!(err, DeclarationError::ReservedColumnName { .. }));
    }

    #[test]
    fn test_duplicate_column_after_folding() {
        let err = build("app.Row", vec![a().column("Value"), b().column("VALUE")]).unwrap_err();
        assert_eq!(
            err,
            DeclarationError::DuplicateColumn {
                type_name: "app.Row".into(),
                column: "VALUE".into(),
            }
        );
    }

    #[test]
    fn test_invalid_column_name() {
        let err = build("app.Row", vec![a().column("bad\"name")]).unwrap_err();
        assert!(matches!(err, DeclarationError::InvalidColumnName { .. }));
    }

    #[test]
    fn test_no_columns() {
        let err = build("app.Row", vec![a().ignored()]).unwrap_err();
        assert_eq!(err, DeclarationError::NoColumns("app.Row".into()));
        assert!(build("app.Row", vec![]).is_err());
    }

    #[test]
    fn test_not_elastic() {
        let err = EntityType::builder("app.Row")
            .constructor(Row::default)
            .elastic()
            .property(a())
            .build()
            .unwrap_err();
        assert_eq!(err, DeclarationError::NotElastic("app.Row".into()));
    }

    #[test]
    fn test_valid_type_reports_nothing() {
        let ty = build("app.Row", vec![a()]).unwrap();
        assert!(validate_entity_type(&ty, false).is_empty());
    }
}

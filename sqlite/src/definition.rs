//! Editable definitions of elastic tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tablemap_core::{DynamicMembers, TableKind, ValueType};

use crate::mapping::TableMapping;

/// The column set of an elastic table, as a caller edits it.
///
/// Hand the edited definition to
/// [`Orm::update_definition`](crate::Orm::update_definition) to add the new
/// columns and drop the listed ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub type_name: String,
    pub table_name: String,
    pub kind: TableKind,
    /// Transact columns by name.
    pub columns: BTreeMap<String, ValueType>,
    /// Columns to drop on the next update.
    #[serde(default)]
    pub dropped_columns: Vec<String>,
}

impl TableDefinition {
    pub fn from_mapping(mapping: &TableMapping) -> Self {
        Self {
            type_name: mapping.type_name().to_string(),
            table_name: mapping.table_name().to_string(),
            kind: mapping.kind(),
            columns: mapping
                .transact_mappings()
                .map(|m| (m.name().to_string(), m.column.value_type))
                .collect(),
            dropped_columns: Vec::new(),
        }
    }

    /// Returns `true` if the definition has a column named `name`, ignoring case.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.keys().any(|c| c.eq_ignore_ascii_case(name))
    }

    /// Adds a column. Returns `false` if it already exists.
    pub fn add_column(&mut self, name: &str, value_type: ValueType) -> bool {
        if self.contains(name) {
            return false;
        }
        self.dropped_columns.retain(|d| !d.eq_ignore_ascii_case(name));
        self.columns.insert(name.to_string(), value_type);
        true
    }

    /// Marks a column for dropping.
    pub fn drop_column(&mut self, name: &str) {
        self.columns.retain(|c, _| !c.eq_ignore_ascii_case(name));
        if !self.dropped_columns.iter().any(|d| d.eq_ignore_ascii_case(name)) {
            self.dropped_columns.push(name.to_string());
        }
    }

    /// Adds a column for every member not yet defined.
    ///
    /// NULL members carry no type and are skipped. Returns the number of
    /// columns added.
    pub fn include_members(&mut self, members: &DynamicMembers) -> usize {
        members
            .iter()
            .filter_map(|(name, value)| Some((name, value.value_type()?)))
            .filter(|(name, value_type)| self.add_column(name, *value_type))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ColumnMapping;
    use tablemap_core::Value;

    fn definition() -> TableDefinition {
        let kind = TableKind::ElasticDeclared;
        let mapping = TableMapping::new(
            "shop.Item",
            "shop$Item",
            kind,
            vec![ColumnMapping::declared("Name", "Name", ValueType::String, kind)],
        );
        TableDefinition::from_mapping(&mapping)
    }

    #[test]
    fn test_from_mapping_skips_row_identity() {
        let def = definition();
        assert_eq!(def.columns.len(), 1);
        assert_eq!(def.columns.get("Name"), Some(&ValueType::String));
    }

    #[test]
    fn test_include_members() {
        let mut def = definition();
        let mut members = DynamicMembers::new();
        members.set("Color", "red");
        members.set("name", "dup");
        members.set("Weight", Value::Null);
        members.set("Size", 3_i32);
        assert_eq!(def.include_members(&members), 2);
        assert_eq!(def.columns.get("Color"), Some(&ValueType::String));
        assert_eq!(def.columns.get("Size"), Some(&ValueType::Int32));
        assert!(!def.contains("Weight"));
        assert!(!def.columns.contains_key("name"));
    }

    #[test]
    fn test_drop_then_add() {
        let mut def = definition();
        def.add_column("Age", ValueType::Int32);
        def.drop_column("age");
        assert!(!def.contains("Age"));
        assert_eq!(def.dropped_columns, vec!["age"]);
        assert!(def.add_column("AGE", ValueType::Int64));
        assert!(def.dropped_columns.is_empty());
    }

    #[test]
    fn test_yaml_round_trip() {
        let def = definition();
        let yaml = serde_yaml::to_string(&def).unwrap();
        let parsed: TableDefinition = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, def);
    }
}

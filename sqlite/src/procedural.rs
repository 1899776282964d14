//! Procedural resources.
//!
//! A procedural resource is an elastic entity type created at runtime by
//! cloning a declared elastic base type under a new name. Its metadata is
//! kept in the engine-owned `tablemap.ProceduralResource` table so the
//! types can be restored when the store is reopened.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tablemap_core::{
    DeclarationError, Entity, EntityType, PropertyDescriptor, RESERVED_NAMESPACE, TableKind,
};
use tracing::{info, warn};

use crate::error::{OrmError, Result};
use crate::mapping::TableMapping;
use crate::orm::Orm;
use crate::registry::lock;
use crate::table::Table;

/// Type name of the resource metadata table.
pub const PROCEDURAL_RESOURCE_TYPE: &str = "tablemap.ProceduralResource";

/// Request methods a resource accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Report,
    Head,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Patch,
        Method::Delete,
        Method::Report,
        Method::Head,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Report => "REPORT",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown method: {s}"))
    }
}

/// Stored metadata of one procedural resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProceduralResource {
    pub row_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub table_name: String,
    pub base_type_name: String,
    pub methods: Vec<Method>,
}

impl Entity for ProceduralResource {
    fn row_id(&self) -> i64 {
        self.row_id
    }

    fn set_row_id(&mut self, row_id: i64) {
        self.row_id = row_id;
    }
}

impl ProceduralResource {
    /// The engine-owned entity type of the metadata table.
    pub fn entity_type() -> Result<EntityType<Self>> {
        Ok(EntityType::builder(PROCEDURAL_RESOURCE_TYPE)
            .constructor(Self::default)
            .engine_owned()
            .property(PropertyDescriptor::new(
                "Name",
                |r: &Self| r.name.clone(),
                |r, v| r.name = v,
            ))
            .property(PropertyDescriptor::new(
                "Description",
                |r: &Self| r.description.clone(),
                |r, v| r.description = v,
            ))
            .property(PropertyDescriptor::new(
                "TableName",
                |r: &Self| r.table_name.clone(),
                |r, v| r.table_name = v,
            ))
            .property(PropertyDescriptor::new(
                "BaseTypeName",
                |r: &Self| r.base_type_name.clone(),
                |r, v| r.base_type_name = v,
            ))
            .property(PropertyDescriptor::new(
                "AvailableMethods",
                |r: &Self| r.methods_string(),
                |r, v: String| r.methods = parse_methods(&v),
            ))
            .build()?)
    }

    /// Methods as a comma-separated list.
    pub fn methods_string(&self) -> String {
        self.methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn parse_methods(text: &str) -> Vec<Method> {
    text.split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| match s.parse() {
            Ok(method) => Some(method),
            Err(e) => {
                warn!(error = %e, "skipping stored method");
                None
            }
        })
        .collect()
}

/// Creates, restores and drops procedural resources cloned from one
/// elastic base type.
pub struct ProceduralFactory<'o, E: Entity> {
    orm: &'o Orm,
    base: EntityType<E>,
    resources: Table<'o, ProceduralResource>,
}

impl<'o, E: Entity> ProceduralFactory<'o, E> {
    /// Binds a factory to an elastic declared base type.
    ///
    /// Registers the metadata table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError::NotElastic`] if `base` is not an elastic
    /// declared type.
    pub fn new(orm: &'o Orm, base: &EntityType<E>) -> Result<Self> {
        if base.kind() != TableKind::ElasticDeclared {
            return Err(DeclarationError::NotElastic(base.name().to_string()).into());
        }
        let resources = orm.ensure_schema(&ProceduralResource::entity_type()?)?;
        Ok(Self {
            orm,
            base: base.clone(),
            resources,
        })
    }

    pub fn base(&self) -> &EntityType<E> {
        &self.base
    }

    /// Resources cloned from this factory's base type.
    pub fn list(&self) -> Result<Vec<ProceduralResource>> {
        let resources = self.resources.select(&[])?;
        Ok(resources
            .into_iter()
            .filter(|r| r.base_type_name.eq_ignore_ascii_case(self.base.name()))
            .collect())
    }

    /// Finds a resource by name, ignoring case.
    pub fn get(&self, name: &str) -> Result<Option<ProceduralResource>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|r| r.name.eq_ignore_ascii_case(name)))
    }

    /// Creates a procedural resource and its table.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::DuplicateResource`] if a resource or registered
    /// type of that name exists, or a [`DeclarationError`] if `name` is not
    /// a valid type name.
    pub fn create(
        &self,
        name: &str,
        description: Option<&str>,
        methods: &[Method],
    ) -> Result<EntityType<E>> {
        if name.to_ascii_lowercase().starts_with(RESERVED_NAMESPACE) {
            return Err(DeclarationError::ReservedNamespace(name.to_string()).into());
        }
        if self.get(name)?.is_some() || self.orm.registry().contains(name) {
            return Err(OrmError::DuplicateResource(name.to_string()));
        }
        let entity_type = self.base.procedural(name)?;
        self.orm.ensure_schema(&entity_type)?;
        let mut resource = [ProceduralResource {
            row_id: 0,
            name: name.to_string(),
            description: description.map(str::to_string),
            table_name: entity_type.table_name().to_string(),
            base_type_name: self.base.name().to_string(),
            methods: methods.to_vec(),
        }];
        self.resources.insert(&mut resource)?;
        info!(resource = %name, table = %entity_type.table_name(), "created procedural resource");
        Ok(entity_type)
    }

    /// Re-registers every stored resource of this base type.
    pub fn restore(&self) -> Result<Vec<EntityType<E>>> {
        let mut restored = Vec::new();
        for resource in self.list()? {
            let entity_type = self.base.procedural(&resource.name)?;
            self.orm.ensure_schema(&entity_type)?;
            restored.push(entity_type);
        }
        info!(base = %self.base.name(), count = restored.len(), "restored procedural resources");
        Ok(restored)
    }

    /// Binds a created resource to its table.
    pub fn table(&self, name: &str) -> Result<Table<'o, E>> {
        let resource = self
            .get(name)?
            .ok_or_else(|| OrmError::UnknownType(name.to_string()))?;
        self.orm.table(&self.base.procedural(&resource.name)?)
    }

    /// Drops a resource, its table and its registration.
    ///
    /// Returns `false` if no such resource exists.
    pub fn drop(&self, name: &str) -> Result<bool> {
        let Some(resource) = self.get(name)? else {
            return Ok(false);
        };
        let conn = self.orm.database().connect()?;
        match self.orm.registry().get(&resource.name) {
            Some(shared) => lock(&shared).drop_table(&conn)?,
            None => {
                let entity_type = self.base.procedural(&resource.name)?;
                TableMapping::from_entity_type(&entity_type).drop_table(&conn)?;
            }
        }
        self.orm.registry().remove(&resource.name);
        self.resources.delete(std::slice::from_ref(&resource))?;
        info!(resource = %resource.name, "dropped procedural resource");
        Ok(true)
    }
}

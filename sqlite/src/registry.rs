//! The table mapping registry.
//!
//! One [`TableMapping`] per registered entity type, keyed by type name
//! without regard to case. Each mapping sits behind its own mutex; every
//! reconciliation, column change or drop of a mapping happens while its
//! mutex is held. The map itself is only locked long enough to look up,
//! insert or remove an entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::mapping::TableMapping;

/// A shared, lockable table mapping.
pub type SharedMapping = Arc<Mutex<TableMapping>>;

/// Locks a shared mapping, recovering it if a previous holder panicked.
pub fn lock(mapping: &SharedMapping) -> MutexGuard<'_, TableMapping> {
    mapping.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
struct Entry {
    type_name: String,
    table_name: String,
    mapping: SharedMapping,
}

/// Registry of table mappings.
#[derive(Debug, Default)]
pub struct TableMappings {
    entries: RwLock<HashMap<String, Entry>>,
}

fn key(type_name: &str) -> String {
    type_name.to_lowercase()
}

impl TableMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mapping, replacing any mapping of the same type.
    pub fn insert(&self, mapping: TableMapping) -> SharedMapping {
        let entry = Entry {
            type_name: mapping.type_name().to_string(),
            table_name: mapping.table_name().to_string(),
            mapping: Arc::new(Mutex::new(mapping)),
        };
        let shared = Arc::clone(&entry.mapping);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key(&entry.type_name), entry);
        shared
    }

    /// Returns the mapping registered for `type_name`, first registering the
    /// one `build` returns if there is none.
    ///
    /// The lookup and the insert happen under one write lock, so concurrent
    /// callers for the same type always share one mapping.
    pub fn get_or_insert_with(
        &self,
        type_name: &str,
        build: impl FnOnce() -> TableMapping,
    ) -> SharedMapping {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.entry(key(type_name)).or_insert_with(|| {
            let mapping = build();
            Entry {
                type_name: mapping.type_name().to_string(),
                table_name: mapping.table_name().to_string(),
                mapping: Arc::new(Mutex::new(mapping)),
            }
        });
        Arc::clone(&entry.mapping)
    }

    /// Returns `true` if `shared` is the mapping registered for `type_name`.
    pub fn holds(&self, type_name: &str, shared: &SharedMapping) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(type_name))
            .is_some_and(|e| Arc::ptr_eq(&e.mapping, shared))
    }

    /// Removes the entry for `type_name` if it is `shared`.
    pub fn remove_if_same(&self, type_name: &str, shared: &SharedMapping) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let same = entries
            .get(&key(type_name))
            .is_some_and(|e| Arc::ptr_eq(&e.mapping, shared));
        if same {
            entries.remove(&key(type_name));
        }
        same
    }

    pub fn get(&self, type_name: &str) -> Option<SharedMapping> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key(type_name))
            .map(|e| Arc::clone(&e.mapping))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key(type_name))
    }

    pub fn remove(&self, type_name: &str) -> Option<SharedMapping> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key(type_name))
            .map(|e| e.mapping)
    }

    /// Every registered mapping, ordered by type name.
    pub fn all(&self) -> Vec<SharedMapping> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = entries.values().collect();
        all.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        all.into_iter().map(|e| Arc::clone(&e.mapping)).collect()
    }

    /// Finds the mapping bound to a physical table, ignoring case.
    pub fn find_by_table(&self, table_name: &str) -> Option<SharedMapping> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|e| e.table_name.eq_ignore_ascii_case(table_name))
            .map(|e| Arc::clone(&e.mapping))
    }

    /// Type name of the mapping bound to a physical table.
    ///
    /// Does not lock any mapping.
    pub fn type_for_table(&self, table_name: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|e| e.table_name.eq_ignore_ascii_case(table_name))
            .map(|e| e.type_name.clone())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Case-insensitive dynamic member storage for elastic entities.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
struct Member {
    key: String,
    name: String,
    value: Value,
}

/// Dynamic members of an elastic entity.
///
/// Lookups ignore case. Each member remembers the spelling it was first
/// set with, which is the name reported by [`iter`](Self::iter) and used
/// when the member becomes a column. Members keep insertion order.
///
/// # Examples
///
/// ```
/// use tablemap_core::{DynamicMembers, Value};
///
/// let mut members = DynamicMembers::new();
/// members.set("Color", "Red");
/// assert_eq!(members.get("color"), Some(&Value::from("Red")));
///
/// members.set("COLOR", "Blue");
/// let (name, value) = members.try_get("color").unwrap();
/// assert_eq!(name, "Color");
/// assert_eq!(value, &Value::from("Blue"));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicMembers {
    members: Vec<Member>,
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl DynamicMembers {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let key = fold(name);
        self.members.iter().position(|m| m.key == key)
    }

    /// Returns the value stored under `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.members[i].value)
    }

    /// Returns the stored spelling of `name` together with its value.
    pub fn try_get(&self, name: &str) -> Option<(&str, &Value)> {
        self.position(name).map(|i| {
            let member = &self.members[i];
            (member.name.as_str(), &member.value)
        })
    }

    /// Sets a member. An existing member keeps its original spelling.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.position(name) {
            Some(i) => self.members[i].value = value,
            None => self.members.push(Member {
                key: fold(name),
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.position(name).map(|i| self.members.remove(i).value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Iterates members as `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.members.iter().map(|m| (m.name.as_str(), &m.value))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }
}

impl Serialize for DynamicMembers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.members.len()))?;
        for member in &self.members {
            map.serialize_entry(&member.name, &member.value)?;
        }
        map.end()
    }
}

impl<'a> IntoIterator for &'a DynamicMembers {
    type Item = (&'a str, &'a Value);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a Value)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let mut members = DynamicMembers::new();
        members.set("Weight", 12_i32);
        assert!(members.contains("WEIGHT"));
        assert_eq!(members.get("weight"), Some(&Value::Int32(12)));
    }

    #[test]
    fn test_first_spelling_is_kept() {
        let mut members = DynamicMembers::new();
        members.set("size", 1_i32);
        members.set("Size", 2_i32);
        let names: Vec<_> = members.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["size"]);
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn test_insertion_order() {
        let mut members = DynamicMembers::new();
        members.set("b", 1_i32);
        members.set("a", 2_i32);
        members.set("c", 3_i32);
        let names: Vec<_> = members.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_remove() {
        let mut members = DynamicMembers::new();
        members.set("Tag", "x");
        assert_eq!(members.remove("TAG"), Some(Value::from("x")));
        assert!(members.is_empty());
        assert_eq!(members.remove("tag"), None);
    }

    #[test]
    fn test_serializes_as_map() {
        let mut members = DynamicMembers::new();
        members.set("Color", "Red");
        let json = serde_json::to_string(&members).unwrap();
        assert_eq!(json, r#"{"Color":{"String":"Red"}}"#);
    }
}

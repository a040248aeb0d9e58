use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute holding the password digest.
pub const PASSWORD_ATTRIBUTE: &str = "password";

/// Attribute holding the comma-joined group list.
pub const GROUPS_ATTRIBUTE: &str = "groups";

/// Attribute searched alongside the key attribute.
pub const MAIL_ATTRIBUTE: &str = "mail";

/// Separator used when a group list is stored as a single value.
pub const GROUP_SEPARATOR: char = ',';

/// A user as seen by a backend: attribute name to attribute value.
///
/// Attribute order is not significant; two records with the same attributes
/// compare equal regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(BTreeMap<String, String>);

impl UserRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The parsed group list (empty when the attribute is absent).
    pub fn groups(&self) -> GroupList {
        self.get(GROUPS_ATTRIBUTE)
            .map(GroupList::parse)
            .unwrap_or_default()
    }
}

impl<K, V> FromIterator<(K, V)> for UserRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for UserRecord {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Ordered, duplicate-free list of group names.
///
/// Order is insertion order: new groups are appended, existing ones keep
/// their position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupList(Vec<String>);

impl GroupList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a stored group value. Empty segments are dropped, so an empty
    /// string is the empty list, and repeated names keep their first position.
    pub fn parse(raw: &str) -> Self {
        let mut list = Self::new();
        for name in raw.split(GROUP_SEPARATOR).filter(|s| !s.is_empty()) {
            list.push(name);
        }
        list
    }

    /// Appends `name` unless already present. Returns true if it was added.
    pub fn push(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.0.push(name);
        true
    }

    /// Removes `name` if present. Returns true if it was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.0.iter().position(|g| g == name) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|g| g == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// The single-value form stored in the `groups` attribute.
    pub fn to_column(&self) -> String {
        self.0.join(&GROUP_SEPARATOR.to_string())
    }
}

impl<S: Into<String>> FromIterator<S> for GroupList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = Self::new();
        for name in iter {
            list.push(name);
        }
        list
    }
}

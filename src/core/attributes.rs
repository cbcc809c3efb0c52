//! Purpose: Sparse attribute maps that drive both request building and assertions.
//! Exports: `Attribute`, `AttributeMap`.
//! Role: The one dynamic structure shared by both sides of a request/response round trip.
//! Invariants: Keys are unique; iteration order is irrelevant to every consumer.
//! Invariants: Unknown keys are carried verbatim and ignored by builder and validator.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Attribute {
    Name,
    Email,
    Gender,
    Status,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [
        Attribute::Name,
        Attribute::Email,
        Attribute::Gender,
        Attribute::Status,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Attribute::Name => "name",
            Attribute::Email => "email",
            Attribute::Gender => "gender",
            Attribute::Status => "status",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Attribute::Name),
            "email" => Some(Attribute::Email),
            "gender" => Some(Attribute::Gender),
            "status" => Some(Attribute::Status),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap {
    entries: BTreeMap<String, String>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn set(&mut self, attribute: Attribute, value: impl Into<String>) -> Option<String> {
        self.insert(attribute.key(), value)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn attribute(&self, attribute: Attribute) -> Option<&str> {
        self.get(attribute.key())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns `self` with every entry of `overrides` applied on top.
    pub fn merged(&self, overrides: &AttributeMap) -> AttributeMap {
        let mut out = self.clone();
        for (key, value) in overrides.iter() {
            out.insert(key, value);
        }
        out
    }
}

impl<K, V> FromIterator<(K, V)> for AttributeMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = AttributeMap::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

impl<const N: usize> From<[(&str, &str); N]> for AttributeMap {
    fn from(entries: [(&str, &str); N]) -> Self {
        entries.into_iter().collect()
    }
}

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::Value;

/// One complete assignment of values to tunable parameters.
///
/// Entries keep the order of the config space they were built from, which is
/// also the order used for the tracker YAML and for CSV columns. Instances are
/// never mutated: [`Configuration::with_value`] returns a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    entries: Vec<(String, Value)>,
}

impl Configuration {
    pub fn from_entries(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    /// Look up the value held for a parameter.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Copy this configuration, overriding exactly one entry.
    ///
    /// An unknown `name` leaves the copy unchanged.
    pub fn with_value(&self, name: &str, value: Value) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(key, current)| {
                if key == name {
                    (key.clone(), value.clone())
                } else {
                    (key.clone(), current.clone())
                }
            })
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical key for replay lookups: entries sorted by name, values tagged
    /// so that `1` and `1.0` never collide.
    pub fn fingerprint(&self) -> String {
        let mut parts: Vec<String> = self
            .entries
            .iter()
            .map(|(key, value)| format!("{}={:?}", key, value))
            .collect();
        parts.sort();
        parts.join(";")
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

impl Serialize for Configuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct ConfigurationVisitor;

impl<'de> Visitor<'de> for ConfigurationVisitor {
    type Value = Configuration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a flat mapping of parameter names to scalar values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, Value>()? {
            entries.push((key, value));
        }
        Ok(Configuration { entries })
    }
}

impl<'de> Deserialize<'de> for Configuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ConfigurationVisitor)
    }
}

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Ordered field name → value mapping.
///
/// Order is part of the signed data. Re-inserting an existing name
/// replaces the value but keeps the entry where it was first inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    entries: Vec<(String, String)>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a field, returning the previous value if the name was present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
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
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = FieldSet::new();
        fields.extend(iter);
        fields
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for FieldSet {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct FieldSetVisitor;

impl<'de> Visitor<'de> for FieldSetVisitor {
    type Value = FieldSet;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a map of field names to string values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldSet, A::Error> {
        let mut fields = FieldSet::new();
        while let Some((name, value)) = access.next_entry::<String, String>()? {
            fields.insert(name, value);
        }
        Ok(fields)
    }
}

impl<'de> Deserialize<'de> for FieldSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FieldSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order() {
        let fields = FieldSet::new()
            .with("ref", "INV1234")
            .with("amount", "100.00")
            .with("currency", "EUR");
        let names: Vec<_> = fields.names().collect();
        assert_eq!(names, ["ref", "amount", "currency"]);
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut fields = FieldSet::new().with("a", "1").with("b", "2");
        assert_eq!(fields.insert("a", "3"), Some("1".to_string()));
        let entries: Vec<_> = fields.iter().collect();
        assert_eq!(entries, [("a", "3"), ("b", "2")]);
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn json_object_order_survives_deserialization() {
        let fields: FieldSet =
            serde_json::from_str(r#"{"zeta": "1", "alpha": "2", "mid": "3"}"#).unwrap();
        let names: Vec<_> = fields.names().collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
        assert_eq!(fields.get("alpha"), Some("2"));
    }

    #[test]
    fn serializes_as_ordered_object() {
        let fields = FieldSet::new().with("b", "2").with("a", "1");
        assert_eq!(serde_json::to_string(&fields).unwrap(), r#"{"b":"2","a":"1"}"#);
    }

    #[test]
    fn non_string_values_are_rejected() {
        let result = serde_json::from_str::<FieldSet>(r#"{"amount": 100}"#);
        assert!(result.is_err());
    }
}

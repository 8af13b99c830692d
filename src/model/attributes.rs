//! # Attribute Values
//!
//! A resource's attributes are a map from field name to [`Attribute`]. Most values are plain
//! JSON, but relationships that arrived nested in a payload (or were assigned locally) are held
//! as already-typed child resources so they can be saved, reconciled and serialized back.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::model::Resource;

/// Attribute storage for one resource.
pub type Attributes = BTreeMap<String, Attribute>;

/// One attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Plain JSON.
    Value(Value),
    /// A single related resource.
    One(Box<Resource>),
    /// A loaded collection of related resources.
    Many(Vec<Resource>),
}

impl Attribute {
    /// Nothing usable: null, `false`, whitespace-only strings, empty lists and maps.
    pub fn is_blank(&self) -> bool {
        match self {
            Attribute::Value(v) => is_blank_value(v),
            Attribute::One(_) => false,
            Attribute::Many(items) => items.is_empty(),
        }
    }

    /// Null or an empty string/list/map.
    pub fn is_empty(&self) -> bool {
        match self {
            Attribute::Value(Value::Null) => true,
            Attribute::Value(Value::String(s)) => s.is_empty(),
            Attribute::Value(Value::Array(a)) => a.is_empty(),
            Attribute::Value(Value::Object(o)) => o.is_empty(),
            Attribute::Value(_) => false,
            Attribute::One(_) => false,
            Attribute::Many(items) => items.is_empty(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Attribute::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Attribute::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Attribute::One(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_resources(&self) -> Option<&[Resource]> {
        match self {
            Attribute::Many(items) => Some(items),
            _ => None,
        }
    }

    /// Serialize to plain JSON. Child resources become their attribute maps.
    pub fn to_json(&self) -> Value {
        match self {
            Attribute::Value(v) => v.clone(),
            Attribute::One(r) => r.to_json(),
            Attribute::Many(items) => Value::Array(items.iter().map(Resource::to_json).collect()),
        }
    }
}

impl From<Value> for Attribute {
    fn from(value: Value) -> Self {
        Attribute::Value(value)
    }
}

impl From<&str> for Attribute {
    fn from(value: &str) -> Self {
        Attribute::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Attribute {
    fn from(value: String) -> Self {
        Attribute::Value(Value::String(value))
    }
}

impl From<Resource> for Attribute {
    fn from(resource: Resource) -> Self {
        Attribute::One(Box::new(resource))
    }
}

impl From<Vec<Resource>> for Attribute {
    fn from(resources: Vec<Resource>) -> Self {
        Attribute::Many(resources)
    }
}

/// Blankness for plain JSON values.
pub fn is_blank_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

/// Wrap a JSON map as plain attributes.
pub fn from_json_map(map: Map<String, Value>) -> Attributes {
    map.into_iter().map(|(k, v)| (k, Attribute::Value(v))).collect()
}

/// Serialize attributes to a JSON map.
pub fn to_json_map(attributes: &Attributes) -> Map<String, Value> {
    attributes.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

/// Field-level errors reported by the service, keyed by field (or nested association key).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    messages: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.messages.entry(field.into()).or_default().push(message.into());
    }

    /// Add every `field: [message, ...]` pair of a validation-errors block.
    ///
    /// A bare string is taken as a single message; any other value is recorded as its JSON text.
    pub fn extend_from_value(&mut self, block: &Value) {
        let Value::Object(fields) = block else {
            return;
        };
        for (field, messages) in fields {
            match messages {
                Value::Array(items) => {
                    for item in items {
                        self.add(field.clone(), message_text(item));
                    }
                }
                other => self.add(field.clone(), message_text(other)),
            }
        }
    }

    /// Messages for one field, in the order reported.
    pub fn get(&self, field: &str) -> &[String] {
        self.messages.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: &str) -> bool {
        self.messages.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Total number of messages across all fields.
    pub fn len(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.messages.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// `"<field> <message>"` for every message.
    pub fn full_messages(&self) -> Vec<String> {
        self.messages
            .iter()
            .flat_map(|(field, msgs)| msgs.iter().map(move |m| format!("{field} {m}")))
            .collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_messages().join(", "))
    }
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blank_and_empty() {
        assert!(Attribute::from(json!(null)).is_blank());
        assert!(Attribute::from("   ").is_blank());
        assert!(!Attribute::from("   ").is_empty());
        assert!(Attribute::from(json!([])).is_empty());
        assert!(Attribute::from(json!({})).is_blank());
        assert!(Attribute::from(json!(false)).is_blank());
        assert!(!Attribute::from(json!(false)).is_empty());
        assert!(!Attribute::from(json!(0)).is_blank());
        assert!(Attribute::Many(Vec::new()).is_empty());
    }

    #[test]
    fn test_validation_errors_from_block() {
        let mut errors = ValidationErrors::new();
        errors.extend_from_value(&json!({
            "name": ["can't be blank", "is too short"],
            "email": "is invalid"
        }));

        assert_eq!(errors.len(), 3);
        assert_eq!(errors.get("name"), ["can't be blank", "is too short"]);
        assert_eq!(errors.get("email"), ["is invalid"]);
        assert!(errors.get("missing").is_empty());
        assert_eq!(
            errors.to_string(),
            "email is invalid, name can't be blank, name is too short"
        );
    }
}

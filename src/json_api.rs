//! # JSON:API Translator
//!
//! Converts between the wire representation of one resource object
//! (`{ "type", "id", "attributes" }`) and a flat attribute map.
//!
//! Outgoing bodies always look like:
//!
//! ```text
//! { "data": { "type": "users", "id": 1, "attributes": { "name": "Tobias", ... } } }
//! ```
//!
//! `id` is present only for persisted resources and never appears inside `attributes`.
//! Attributes declared with `accepts_nested_attributes_for` are sent as
//! `<name>_attributes: [ {child attributes}, ... ]`.

use serde_json::{json, Value};
use std::collections::BTreeSet;

use crate::framework::transport::Params;
use crate::model::attributes::{to_json_map, Attribute, Attributes};
use crate::model::types::ResourceType;

/// Flatten a resource object: its `attributes` merged with its `id`.
///
/// Objects without an `attributes` member are already flat and pass through unchanged.
/// Anything that isn't an object yields an empty map.
pub fn parse(data: &Value) -> Params {
    let Value::Object(object) = data else {
        return Params::new();
    };
    match object.get("attributes") {
        Some(Value::Object(attributes)) => {
            let mut flat = attributes.clone();
            if let Some(id) = object.get("id") {
                flat.insert("id".to_string(), id.clone());
            }
            flat
        }
        Some(_) | None => object.clone(),
    }
}

/// Build the request body for a resource of type `ty`.
///
/// With `send_only_modified_attributes` only keys in `changes` are sent. `id` is lifted out of
/// the full attribute set whether or not it changed.
pub fn to_params(ty: &ResourceType, attributes: &Attributes, changes: &BTreeSet<String>) -> Params {
    let mut payload = if ty.options().send_only_modified_attributes {
        changes
            .iter()
            .map(|key| {
                let value = attributes.get(key).map(Attribute::to_json).unwrap_or(Value::Null);
                (key.clone(), value)
            })
            .collect()
    } else {
        to_json_map(attributes)
    };

    for key in ty.nested_attributes() {
        let Some(value) = payload.remove(key) else {
            continue;
        };
        let rows = match attributes.get(key) {
            Some(Attribute::Many(children)) => children.iter().map(|c| c.to_json()).collect(),
            Some(Attribute::One(child)) => vec![child.to_json()],
            _ => match value {
                Value::Array(rows) => rows,
                Value::Null => Vec::new(),
                other => vec![other],
            },
        };
        payload.insert(format!("{key}_attributes"), Value::Array(rows));
    }

    payload.remove("id");
    let mut data = json!({ "type": ty.type_tag() });
    if let Some(id) = attributes.get("id").and_then(Attribute::as_value).filter(|id| !id.is_null()) {
        data["id"] = id.clone();
    }
    data["attributes"] = Value::Object(payload);

    let mut body = Params::new();
    body.insert("data".to_string(), data);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::transport::into_params;
    use crate::model::attributes::from_json_map;
    use crate::model::TypeBuilder;

    #[test]
    fn test_parse_flattens_resource_object() {
        let parsed = parse(&json!({
            "id": 1,
            "type": "users",
            "attributes": { "name": "Tobias", "email": "tobias@fünke.com" }
        }));
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed["id"], json!(1));
        assert_eq!(parsed["name"], json!("Tobias"));
        assert!(!parsed.contains_key("type"));
    }

    #[test]
    fn test_parse_passes_flat_data_through() {
        let flat = json!({ "id": 1, "name": "Lindsay" });
        assert_eq!(Value::Object(parse(&flat)), flat);
        assert!(parse(&json!([1, 2])).is_empty());
    }

    #[test]
    fn test_to_params_new_resource_has_no_id() {
        let ty = TypeBuilder::new("User").resolve(None);
        let attrs = from_json_map(into_params(json!({ "name": "Tobias", "id": null })));
        let body = to_params(&ty, &attrs, &BTreeSet::new());
        assert_eq!(
            Value::Object(body),
            json!({ "data": { "type": "users", "attributes": { "name": "Tobias" } } })
        );
    }

    #[test]
    fn test_to_params_only_modified_keeps_id() {
        let ty = TypeBuilder::new("User").send_only_modified_attributes(true).resolve(None);
        let attrs = from_json_map(into_params(json!({ "id": 8, "name": "Tobias", "email": "t@f.com" })));
        let changes: BTreeSet<String> = ["email".to_string()].into();
        let body = to_params(&ty, &attrs, &changes);
        assert_eq!(
            Value::Object(body),
            json!({ "data": { "type": "users", "id": 8, "attributes": { "email": "t@f.com" } } })
        );
    }

    #[test]
    fn test_to_params_nested_raw_values() {
        let ty = TypeBuilder::new("User")
            .accepts_nested_attributes_for("comments")
            .accepts_nested_attributes_for("role")
            .resolve(None);
        let attrs = from_json_map(into_params(json!({
            "comments": [{ "body": "Hello" }],
            "role": { "name": "Admin" }
        })));
        let body = to_params(&ty, &attrs, &BTreeSet::new());
        assert_eq!(
            body["data"]["attributes"],
            json!({
                "comments_attributes": [{ "body": "Hello" }],
                "role_attributes": [{ "name": "Admin" }]
            })
        );
    }
}

//! # Resource Instances
//!
//! A [`Resource`] is one client-side object: its type handle, attribute values, change
//! tracking, and whatever the last response said about it (validation errors, top-level
//! errors, metadata). Persistence lives in [`crate::model::orm`].

use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::associations::{
    self, Association, AssociationCache, AssociationDescriptor, Cardinality, Incoming,
};
use crate::framework::error::{OrmError, PathError, Result};
use crate::framework::transport::Params;
use crate::json_api;
use crate::model::attributes::{self, is_blank_value, Attribute, Attributes, ValidationErrors};
use crate::model::Model;

/// `_destroy` values that mark a nested child for deletion.
pub(crate) fn is_destroy_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(s)) => s == "1" || s == "true",
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// Ids are compared loosely so `1` matches `"1"`.
pub(crate) fn same_id(a: &Value, b: &Value) -> bool {
    fn text(v: &Value) -> String {
        match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
    a == b || text(a) == text(b)
}

#[derive(Clone)]
pub struct Resource {
    pub(crate) model: Model,
    pub(crate) attributes: Attributes,
    pub(crate) changed: BTreeSet<String>,
    pub(crate) previously_changed: BTreeSet<String>,
    pub(crate) destroyed: bool,
    pub(crate) errors: ValidationErrors,
    pub(crate) response_errors: Vec<Value>,
    pub(crate) metadata: Value,
    pub(crate) association_cache: HashMap<String, AssociationCache>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("type", &self.model.name())
            .field("attributes", &self.attributes)
            .field("changed", &self.changed)
            .field("destroyed", &self.destroyed)
            .field("errors", &self.errors)
            .finish()
    }
}

/// Same type and same attribute values.
impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name() && self.attributes == other.attributes
    }
}

impl Resource {
    /// Build an instance and parse any embedded related data.
    pub(crate) fn from_parts(
        model: Model,
        mut attributes: Attributes,
        changed: BTreeSet<String>,
    ) -> Self {
        associations::parse_associations(&model, &mut attributes);
        Self {
            model,
            attributes,
            changed,
            previously_changed: BTreeSet::new(),
            destroyed: false,
            errors: ValidationErrors::new(),
            response_errors: Vec::new(),
            metadata: Value::Object(Default::default()),
            association_cache: HashMap::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn type_name(&self) -> &str {
        self.model.name()
    }

    /// The server-assigned identity, if any.
    pub fn id(&self) -> Option<&Value> {
        self.value("id").filter(|id| !id.is_null())
    }

    /// No identity yet.
    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    pub fn is_persisted(&self) -> bool {
        !self.is_new() && !self.destroyed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Plain JSON value of an attribute. `None` for absent keys and for typed children.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).and_then(Attribute::as_value)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Set an attribute, marking it changed when the value differs.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Attribute>) {
        let name = name.into();
        let value = value.into();
        if self.attributes.get(&name) != Some(&value) {
            self.changed.insert(name.clone());
            self.association_cache.remove(&name);
        }
        self.attributes.insert(name, value);
    }

    /// Set several attributes locally; embedded related data is parsed into typed children.
    pub fn assign_attributes(&mut self, attrs: Params) {
        let mut incoming = attributes::from_json_map(attrs);
        associations::parse_associations(&self.model, &mut incoming);
        for (name, value) in incoming {
            self.set(name, value);
        }
    }

    /// Merge attributes that came from the service. Nothing is marked changed.
    pub(crate) fn assign_from_server(&mut self, attrs: Params) {
        let mut incoming = attributes::from_json_map(attrs);
        associations::parse_associations(&self.model, &mut incoming);
        for name in incoming.keys() {
            self.association_cache.remove(name);
        }
        self.attributes.extend(incoming);
    }

    pub fn changed(&self) -> &BTreeSet<String> {
        &self.changed
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }

    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty()
    }

    /// What the last successful save sent as changed.
    pub fn previously_changed(&self) -> &BTreeSet<String> {
        &self.previously_changed
    }

    /// Field-level validation errors from the last save.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Top-level errors from the last response.
    pub fn response_errors(&self) -> &[Value] {
        &self.response_errors
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Flag this instance for deletion through its parent's nested attributes.
    pub fn mark_for_destruction(&mut self) {
        self.set("_destroy", "1");
    }

    pub fn is_marked_for_destruction(&self) -> bool {
        is_destroy_flag(self.value("_destroy"))
    }

    /// Attribute map as plain JSON.
    pub fn to_json(&self) -> Value {
        Value::Object(attributes::to_json_map(&self.attributes))
    }

    /// The request body for saving this instance.
    pub fn to_params(&self) -> Params {
        json_api::to_params(self.model.resource_type(), &self.attributes, &self.changed)
    }

    /// Fill the type's path template from `params`, then from this instance's attributes.
    pub fn request_path(&self, params: &Params) -> std::result::Result<String, PathError> {
        let mut merged = params.clone();
        for (name, value) in &self.attributes {
            if let Attribute::Value(value) = value {
                merged.insert(name.clone(), value.clone());
            }
        }
        self.model.resource_type().build_request_path(&merged)
    }

    fn descriptor(&self, name: &str) -> Result<AssociationDescriptor> {
        self.model
            .resource_type()
            .association(name)
            .cloned()
            .ok_or_else(|| OrmError::UnknownAssociation {
                resource_type: self.type_name().to_string(),
                name: name.to_string(),
            })
    }

    /// The named relationship of this instance's type, with no parameters accumulated.
    pub fn association(&self, name: &str) -> Result<Association> {
        Association::new(&self.model, self.descriptor(name)?)
    }

    /// Shorthand for `self.association(name)?.fetch(self)`.
    pub async fn fetch_association(&mut self, name: &str) -> Result<associations::Fetched> {
        let association = self.association(name)?;
        association.fetch(self).await
    }

    /// Assign nested attributes for a declared relationship.
    ///
    /// For a single child, `value` is an object merged into the existing child (or used to
    /// build one). For a collection, `value` is a list of rows (or an object of rows keyed by
    /// index): rows whose `id` matches a loaded child update it, others are appended as new
    /// children.
    pub fn assign_nested_attributes(&mut self, name: &str, value: Value) -> Result<()> {
        let descriptor = self.descriptor(name)?;
        match descriptor.cardinality {
            Cardinality::One => {
                let Value::Object(attrs) = value else {
                    return Ok(());
                };
                self.association(name)?.assign_single_nested_attributes(self, attrs)?;
                self.changed.insert(name.to_string());
                Ok(())
            }
            Cardinality::Many => {
                let rows: Vec<Value> = match value {
                    Value::Array(rows) => rows,
                    Value::Object(rows) => rows.into_iter().map(|(_, row)| row).collect(),
                    _ => return Ok(()),
                };
                let target = self.model.related(&descriptor.target)?;
                let children = self.live_children_mut(&descriptor)?;
                for row in rows {
                    let Value::Object(row) = row else {
                        continue;
                    };
                    let existing = row
                        .get("id")
                        .filter(|id| !is_blank_value(id))
                        .and_then(|id| {
                            children
                                .iter_mut()
                                .find(|child| child.id().is_some_and(|cid| same_id(cid, id)))
                        });
                    match existing {
                        Some(child) => child.assign_attributes(row),
                        None => children.push(target.new_resource(row)),
                    }
                }
                self.association_cache.remove(name);
                self.changed.insert(name.to_string());
                Ok(())
            }
        }
    }

    /// The loaded children of a collection relationship, normalizing raw JSON or a single
    /// child into a typed list first.
    pub(crate) fn live_children_mut(
        &mut self,
        descriptor: &AssociationDescriptor,
    ) -> Result<&mut Vec<Resource>> {
        let target = self.model.related(&descriptor.target)?;
        let current = self
            .attributes
            .remove(&descriptor.name)
            .unwrap_or(Attribute::Many(Vec::new()));
        let children = match current {
            Attribute::Many(items) => items,
            Attribute::One(child) => vec![*child],
            Attribute::Value(Value::Array(rows)) => rows
                .into_iter()
                .map(|row| associations::resolve(Incoming::RawPayload(row), &target))
                .collect(),
            Attribute::Value(value @ Value::Object(_)) => {
                vec![associations::resolve(Incoming::RawPayload(value), &target)]
            }
            Attribute::Value(_) => Vec::new(),
        };
        self.attributes
            .insert(descriptor.name.clone(), Attribute::Many(children));
        match self.attributes.get_mut(&descriptor.name) {
            Some(Attribute::Many(children)) => Ok(children),
            _ => Err(OrmError::UnknownAssociation {
                resource_type: self.model.name().to_string(),
                name: descriptor.name.clone(),
            }),
        }
    }

    /// The loaded child (single relationship) or children (collection) with this id.
    pub(crate) fn child_with_id_mut(&mut self, name: &str, id: &Value) -> Option<&mut Resource> {
        match self.attributes.get_mut(name)? {
            Attribute::One(child) => {
                Some(child.as_mut()).filter(|c| c.id().is_some_and(|cid| same_id(cid, id)))
            }
            Attribute::Many(children) => children
                .iter_mut()
                .find(|child| child.id().is_some_and(|cid| same_id(cid, id))),
            Attribute::Value(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::MockTransport;
    use crate::framework::transport::into_params;
    use crate::model::{Api, TypeBuilder};
    use serde_json::json;

    fn api() -> Api {
        Api::builder(MockTransport::new().transport())
            .register(
                TypeBuilder::new("User")
                    .has_many("comments")
                    .has_one("role")
                    .accepts_nested_attributes_for("comments"),
            )
            .register(TypeBuilder::new("Comment").collection_path("users/:user_id/comments"))
            .register(TypeBuilder::new("Role"))
            .build()
            .unwrap()
    }

    fn user(attrs: Value) -> Resource {
        api().model("User").unwrap().instantiate(into_params(attrs))
    }

    #[test]
    fn test_set_marks_changed_only_on_difference() {
        let mut user = user(json!({ "id": 1, "name": "Tobias" }));
        user.set("name", "Tobias");
        assert!(!user.has_changes());
        user.set("name", "Lindsay");
        assert!(user.is_changed("name"));
        assert_eq!(user.value("name"), Some(&json!("Lindsay")));
    }

    #[test]
    fn test_identity_and_persistence() {
        let users = api().model("User").unwrap();
        let fresh = users.new_resource(into_params(json!({ "name": "Tobias" })));
        assert!(fresh.is_new());
        assert!(!fresh.is_persisted());

        let saved = user(json!({ "id": 1 }));
        assert!(saved.is_persisted());
        assert_eq!(saved.id(), Some(&json!(1)));

        let null_id = user(json!({ "id": null }));
        assert!(null_id.is_new());
    }

    #[test]
    fn test_request_path_uses_params_then_attributes() {
        let api = api();
        let comments = api.model("Comment").unwrap();
        let comment = comments.instantiate(into_params(json!({ "id": 3, "user_id": 1 })));
        assert_eq!(comment.request_path(&Params::new()).unwrap(), "users/1/comments/3");

        let orphan = comments.new_resource(into_params(json!({ "body": "x" })));
        assert!(orphan.request_path(&Params::new()).is_err());
        assert_eq!(
            orphan.request_path(&into_params(json!({ "user_id": 2 }))).unwrap(),
            "users/2/comments"
        );
    }

    #[test]
    fn test_mark_for_destruction() {
        let mut user = user(json!({ "id": 1 }));
        assert!(!user.is_marked_for_destruction());
        user.mark_for_destruction();
        assert!(user.is_marked_for_destruction());
        assert_eq!(user.value("_destroy"), Some(&json!("1")));
    }

    #[test]
    fn test_unknown_association() {
        let user = user(json!({ "id": 1 }));
        assert!(matches!(
            user.association("posts"),
            Err(OrmError::UnknownAssociation { name, .. }) if name == "posts"
        ));
    }

    #[test]
    fn test_assign_nested_attributes_for_collection() {
        let mut user = user(json!({
            "id": 1,
            "comments": [{ "id": 2, "body": "first" }]
        }));
        user.assign_nested_attributes(
            "comments",
            json!([{ "id": "2", "body": "edited" }, { "body": "new" }]),
        )
        .unwrap();

        let comments = user.get("comments").and_then(Attribute::as_resources).unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].value("body"), Some(&json!("edited")));
        assert!(comments[0].is_changed("body"));
        assert!(comments[1].is_new());

        let body = user.to_params();
        assert_eq!(
            body["data"]["attributes"]["comments_attributes"][1],
            json!({ "body": "new" })
        );
    }

    #[test]
    fn test_assign_nested_attributes_for_single_child() {
        let mut user = user(json!({ "id": 1 }));
        user.assign_nested_attributes("role", json!({ "name": "Admin" })).unwrap();
        user.assign_nested_attributes("role", json!({ "level": 2 })).unwrap();

        let role = user.get("role").and_then(Attribute::as_resource).unwrap();
        assert_eq!(role.type_name(), "Role");
        assert_eq!(role.value("name"), Some(&json!("Admin")));
        assert_eq!(role.value("level"), Some(&json!(2)));
    }

    #[test]
    fn test_equality_is_type_and_attributes() {
        let a = user(json!({ "id": 1, "name": "Tobias" }));
        let mut b = user(json!({ "id": 1, "name": "Tobias" }));
        b.response_errors.push(json!("ignored"));
        assert_eq!(a, b);
        b.set("name", "Lindsay");
        assert_ne!(a, b);
    }
}

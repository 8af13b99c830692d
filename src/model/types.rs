//! # Resource Type Configuration
//!
//! Each resource type is described by a [`TypeBuilder`] at registration time and frozen into a
//! [`ResourceType`] when the [`crate::Api`] is built. Inheritance is resolved once, then: a type
//! declared with [`TypeBuilder::inherits`] starts from its parent's resolved configuration and
//! applies its own overrides on top.
//!
//! | Setting | Inherited? |
//! |---|---|
//! | method table | yes, own entries win |
//! | `send_only_modified_attributes`, `request_new_object_on_build` | yes, unless set |
//! | default scope | yes, unless the type declares its own |
//! | named scopes, associations | yes, own entries win by name |
//! | nested-attribute fields | union |
//! | type tag, collection path | no, derived from the type's own name |

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::associations::AssociationDescriptor;
use crate::framework::error::{OrmError, PathError, Result};
use crate::framework::transport::{Action, Method, Params};
use crate::model::inflect;
use crate::relation::{Relation, Scope};

/// Which verb each lifecycle action uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodTable {
    pub create: Method,
    pub update: Method,
    pub destroy: Method,
    pub new: Method,
}

impl Default for MethodTable {
    fn default() -> Self {
        Self {
            create: Method::Post,
            update: Method::Put,
            destroy: Method::Delete,
            new: Method::Get,
        }
    }
}

impl MethodTable {
    /// JSON:API updates are partial, so `update` maps to `PATCH`.
    pub fn json_api() -> Self {
        Self {
            update: Method::Patch,
            ..Self::default()
        }
    }

    pub fn get(&self, action: Action) -> Method {
        match action {
            Action::Create => self.create,
            Action::Update => self.update,
            Action::Destroy => self.destroy,
            Action::New => self.new,
        }
    }

    pub fn set(&mut self, action: Action, method: Method) {
        match action {
            Action::Create => self.create = method,
            Action::Update => self.update = method,
            Action::Destroy => self.destroy = method,
            Action::New => self.new = method,
        }
    }
}

/// Per-type behaviour flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeOptions {
    /// Send only changed attributes in the request body.
    pub send_only_modified_attributes: bool,
    /// Ask the service for a `new` template instead of constructing locally.
    pub request_new_object_on_build: bool,
}

/// The resolved, immutable configuration of one resource type.
#[derive(Debug)]
pub struct ResourceType {
    name: String,
    type_tag: String,
    collection_path: String,
    ancestors: Vec<String>,
    options: TypeOptions,
    methods: MethodTable,
    associations: Vec<AssociationDescriptor>,
    nested_attributes: BTreeSet<String>,
    default_scope: Params,
    scopes: BTreeMap<String, Scope>,
}

impl ResourceType {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `type` member of the wire body.
    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    /// Collection path template, e.g. `users` or `users/:user_id/comments`.
    pub fn collection_path(&self) -> &str {
        &self.collection_path
    }

    /// Resource path template: the collection path plus `/:id`.
    pub fn resource_path(&self) -> String {
        format!("{}/:id", self.collection_path)
    }

    /// This type followed by its ancestors, nearest first.
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    pub fn is_a(&self, type_name: &str) -> bool {
        self.ancestors.iter().any(|a| a == type_name)
    }

    pub fn options(&self) -> TypeOptions {
        self.options
    }

    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    pub fn method_for(&self, action: Action) -> Method {
        self.methods.get(action)
    }

    pub fn associations(&self) -> &[AssociationDescriptor] {
        &self.associations
    }

    pub fn association(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn nested_attributes(&self) -> &BTreeSet<String> {
        &self.nested_attributes
    }

    pub fn accepts_nested_attributes_for(&self, key: &str) -> bool {
        self.nested_attributes.contains(key)
    }

    pub fn default_scope(&self) -> &Params {
        &self.default_scope
    }

    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.get(name)
    }

    /// Fill the resource path (when `params` carries an `id`) or the collection path.
    pub fn build_request_path(&self, params: &Params) -> std::result::Result<String, PathError> {
        let has_id = params.get("id").is_some_and(|id| !id.is_null());
        if has_id {
            fill_template(&self.resource_path(), params)
        } else {
            fill_template(&self.collection_path, params)
        }
    }
}

/// Substitute every `:name` segment from `params`.
pub fn fill_template(template: &str, params: &Params) -> std::result::Result<String, PathError> {
    let segments = template
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(key) => match params.get(key) {
                Some(Value::Null) | None => Err(PathError::MissingParameter {
                    template: template.to_string(),
                    parameter: key.to_string(),
                }),
                Some(Value::String(s)) => Ok(s.clone()),
                Some(other) => Ok(other.to_string()),
            },
            None => Ok(segment.to_string()),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(segments.join("/"))
}

/// Declarative description of a resource type, consumed by [`crate::ApiBuilder::register`].
///
/// ```ignore
/// TypeBuilder::new("User")
///     .has_many("comments")
///     .has_one("role")
///     .accepts_nested_attributes_for("comments")
///     .send_only_modified_attributes(true)
///     .scope("admins", |rel, _| rel.filter(into_params(json!({ "admin": 1 }))))
/// ```
pub struct TypeBuilder {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    type_tag: Option<String>,
    collection_path: Option<String>,
    send_only_modified_attributes: Option<bool>,
    request_new_object_on_build: Option<bool>,
    methods: HashMap<Action, Method>,
    associations: Vec<AssociationDescriptor>,
    nested_attributes: BTreeSet<String>,
    default_scope: Option<Params>,
    scopes: BTreeMap<String, Scope>,
}

impl TypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            type_tag: None,
            collection_path: None,
            send_only_modified_attributes: None,
            request_new_object_on_build: None,
            methods: HashMap::new(),
            associations: Vec::new(),
            nested_attributes: BTreeSet::new(),
            default_scope: None,
            scopes: BTreeMap::new(),
        }
    }

    /// Inherit configuration from another registered type.
    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Override the wire `type` tag (defaults to the tableized type name).
    pub fn type_tag(mut self, tag: impl Into<String>) -> Self {
        self.type_tag = Some(tag.into());
        self
    }

    pub fn collection_path(mut self, path: impl Into<String>) -> Self {
        self.collection_path = Some(path.into());
        self
    }

    pub fn send_only_modified_attributes(mut self, enabled: bool) -> Self {
        self.send_only_modified_attributes = Some(enabled);
        self
    }

    pub fn request_new_object_on_build(mut self, enabled: bool) -> Self {
        self.request_new_object_on_build = Some(enabled);
        self
    }

    pub fn method_for(mut self, action: Action, method: Method) -> Self {
        self.methods.insert(action, method);
        self
    }

    pub fn has_many(self, name: impl Into<String>) -> Self {
        self.association(AssociationDescriptor::has_many(name))
    }

    pub fn has_one(self, name: impl Into<String>) -> Self {
        self.association(AssociationDescriptor::has_one(name))
    }

    pub fn association(mut self, descriptor: AssociationDescriptor) -> Self {
        self.associations.retain(|a| a.name != descriptor.name);
        self.associations.push(descriptor);
        self
    }

    /// Serialize this attribute as `<name>_attributes` with each child's attribute map.
    pub fn accepts_nested_attributes_for(mut self, name: impl Into<String>) -> Self {
        self.nested_attributes.insert(name.into());
        self
    }

    pub fn default_scope(mut self, params: Params) -> Self {
        self.default_scope = Some(params);
        self
    }

    pub fn scope<F>(mut self, name: impl Into<String>, scope: F) -> Self
    where
        F: Fn(Relation, &[Value]) -> Relation + Send + Sync + 'static,
    {
        self.scopes.insert(name.into(), Scope::new(scope));
        self
    }

    // The wire envelope is fixed: no root wrapping, no custom root element, `id` as primary key.

    pub fn include_root_in_json(self, _enabled: bool) -> Result<Self> {
        Err(OrmError::unsupported_option("include_root_in_json"))
    }

    pub fn parse_root_in_json(self, _enabled: bool) -> Result<Self> {
        Err(OrmError::unsupported_option("parse_root_in_json"))
    }

    pub fn root_element(self, _name: &str) -> Result<Self> {
        Err(OrmError::unsupported_option("root_element"))
    }

    pub fn primary_key(self, _name: &str) -> Result<Self> {
        Err(OrmError::unsupported_option("primary_key"))
    }

    /// Freeze into a [`ResourceType`], merging over the resolved parent.
    pub(crate) fn resolve(&self, parent: Option<&ResourceType>) -> ResourceType {
        let mut ancestors = vec![self.name.clone()];
        let mut methods = MethodTable::json_api();
        let mut associations = Vec::new();
        let mut nested_attributes = BTreeSet::new();
        let mut scopes = BTreeMap::new();
        let mut options = TypeOptions::default();
        let mut default_scope = Params::new();

        if let Some(parent) = parent {
            ancestors.extend(parent.ancestors.iter().cloned());
            methods = parent.methods;
            associations = parent.associations.clone();
            nested_attributes = parent.nested_attributes.clone();
            scopes = parent.scopes.clone();
            options = parent.options;
            default_scope = parent.default_scope.clone();
        }

        for (action, method) in &self.methods {
            methods.set(*action, *method);
        }
        for descriptor in &self.associations {
            associations.retain(|a: &AssociationDescriptor| a.name != descriptor.name);
            associations.push(descriptor.clone());
        }
        nested_attributes.extend(self.nested_attributes.iter().cloned());
        scopes.extend(self.scopes.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(enabled) = self.send_only_modified_attributes {
            options.send_only_modified_attributes = enabled;
        }
        if let Some(enabled) = self.request_new_object_on_build {
            options.request_new_object_on_build = enabled;
        }
        if let Some(scope) = &self.default_scope {
            default_scope = scope.clone();
        }

        let tag = inflect::tableize(&self.name);
        ResourceType {
            name: self.name.clone(),
            type_tag: self.type_tag.clone().unwrap_or_else(|| tag.clone()),
            collection_path: self.collection_path.clone().unwrap_or(tag),
            ancestors,
            options,
            methods,
            associations,
            nested_attributes,
            default_scope,
            scopes,
        }
    }
}

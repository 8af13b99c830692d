//! # API Registry
//!
//! An [`Api`] owns the transport and every registered resource type. It is cheap to clone and
//! hands out [`Model`] handles, which carry the class-level operations of one type.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::associations::Fetched;
use crate::framework::error::{OrmError, Result};
use crate::framework::transport::{Action, Method, Params, ParsedBody, Response, Transport};
use crate::json_api;
use crate::model::attributes::{self, Attributes};
use crate::model::types::{ResourceType, TypeBuilder};
use crate::model::Resource;
use crate::relation::Relation;

struct ApiInner {
    transport: Arc<dyn Transport>,
    types: HashMap<String, Arc<ResourceType>>,
}

/// The configured service: one transport plus the resolved resource types.
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

impl Api {
    pub fn builder(transport: Arc<dyn Transport>) -> ApiBuilder {
        ApiBuilder {
            transport,
            builders: Vec::new(),
        }
    }

    /// Handle for a registered type.
    pub fn model(&self, name: &str) -> Result<Model> {
        let ty = self
            .inner
            .types
            .get(name)
            .cloned()
            .ok_or_else(|| OrmError::UnknownType(name.to_string()))?;
        Ok(Model {
            api: self.clone(),
            ty,
        })
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.inner.types.keys().map(String::as_str)
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.type_names().collect();
        names.sort_unstable();
        f.debug_struct("Api").field("types", &names).finish()
    }
}

/// Collects [`TypeBuilder`]s and resolves inheritance once in [`ApiBuilder::build`].
pub struct ApiBuilder {
    transport: Arc<dyn Transport>,
    builders: Vec<TypeBuilder>,
}

impl ApiBuilder {
    pub fn register(mut self, ty: TypeBuilder) -> Self {
        self.builders.push(ty);
        self
    }

    /// Resolve every type against its parent chain and check association targets exist.
    pub fn build(self) -> Result<Api> {
        let mut pending: HashMap<String, TypeBuilder> = HashMap::new();
        for builder in self.builders {
            let name = builder.name.clone();
            if pending.insert(name.clone(), builder).is_some() {
                return Err(OrmError::Configuration(format!(
                    "resource type {name} registered twice"
                )));
            }
        }

        let mut resolved = HashMap::new();
        let names: Vec<String> = pending.keys().cloned().collect();
        for name in &names {
            resolve(name, &pending, &mut resolved, &mut Vec::new())?;
        }

        for ty in resolved.values() {
            for association in ty.associations() {
                if !resolved.contains_key(&association.target) {
                    return Err(OrmError::Configuration(format!(
                        "association `{}` on {} targets unregistered type {}",
                        association.name,
                        ty.name(),
                        association.target
                    )));
                }
            }
        }

        debug!(types = resolved.len(), "API built");
        Ok(Api {
            inner: Arc::new(ApiInner {
                transport: self.transport,
                types: resolved,
            }),
        })
    }
}

fn resolve(
    name: &str,
    pending: &HashMap<String, TypeBuilder>,
    resolved: &mut HashMap<String, Arc<ResourceType>>,
    stack: &mut Vec<String>,
) -> Result<Arc<ResourceType>> {
    if let Some(ty) = resolved.get(name) {
        return Ok(ty.clone());
    }
    if stack.iter().any(|n| n == name) {
        return Err(OrmError::Configuration(format!(
            "inheritance cycle through {name}"
        )));
    }
    let builder = pending
        .get(name)
        .ok_or_else(|| OrmError::Configuration(format!("unknown parent type {name}")))?;

    stack.push(name.to_string());
    let parent = match &builder.parent {
        Some(parent) => Some(resolve(parent, pending, resolved, stack)?),
        None => None,
    };
    stack.pop();

    let ty = Arc::new(builder.resolve(parent.as_deref()));
    resolved.insert(name.to_string(), ty.clone());
    Ok(ty)
}

/// Class-level handle for one resource type.
#[derive(Clone)]
pub struct Model {
    api: Api,
    ty: Arc<ResourceType>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Model").field(&self.ty.name()).finish()
    }
}

impl Model {
    pub fn name(&self) -> &str {
        self.ty.name()
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.ty
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn is_a(&self, type_name: &str) -> bool {
        self.ty.is_a(type_name)
    }

    /// Handle for another type on the same API.
    pub fn related(&self, type_name: &str) -> Result<Model> {
        self.api.model(type_name)
    }

    pub fn method_for(&self, action: Action) -> Method {
        self.ty.method_for(action)
    }

    pub fn build_request_path(&self, params: &Params) -> Result<String> {
        Ok(self.ty.build_request_path(params)?)
    }

    /// Flatten a JSON:API resource object to attributes.
    pub fn parse(&self, data: &Value) -> Params {
        json_api::parse(data)
    }

    /// One round trip through the transport.
    #[instrument(skip(self, params), fields(resource_type = %self.name()))]
    pub async fn request(&self, method: Method, path: &str, params: &Params) -> Result<Response> {
        debug!("Sending request");
        let response = self.api.transport().request(method, path, params).await?;
        debug!(status = response.status, "Received response");
        Ok(response)
    }

    /// A local, unsaved instance. Every given key (and each default-scope key it doesn't
    /// override) is marked changed.
    pub fn new_resource(&self, attrs: Params) -> Resource {
        self.new_resource_with(attributes::from_json_map(attrs))
    }

    /// Like [`Model::new_resource`] but accepts already-typed attribute values.
    pub fn new_resource_with(&self, attrs: Attributes) -> Resource {
        let mut merged: Attributes = self
            .ty
            .default_scope()
            .iter()
            .filter(|(key, _)| !attrs.contains_key(*key))
            .map(|(key, value)| (key.clone(), value.clone().into()))
            .collect();
        merged.extend(attrs);
        let changed = merged.keys().cloned().collect();
        Resource::from_parts(self.clone(), merged, changed)
    }

    /// An instance representing server state: nothing is marked changed.
    pub fn instantiate(&self, attrs: Params) -> Resource {
        Resource::from_parts(self.clone(), attributes::from_json_map(attrs), Default::default())
    }

    /// An instance built from a response's primary data, carrying its metadata and errors.
    pub fn new_from_parsed_data(&self, body: ParsedBody) -> Resource {
        let mut resource = self.instantiate(self.parse(&body.data));
        resource.metadata = body.metadata;
        resource.response_errors = body.errors;
        resource
    }

    /// GET `path` and materialize whatever came back.
    ///
    /// An array of data yields [`Fetched::Many`], an object [`Fetched::One`]. A non-2xx status
    /// or an empty body yields `Fetched::One(None)`.
    pub async fn get(&self, path: &str, params: &Params) -> Result<Fetched> {
        let response = self.request(Method::Get, path, params).await?;
        if !response.is_success() {
            warn!(
                resource_type = %self.name(),
                status = response.status,
                path,
                "Fetch rejected"
            );
            return Ok(Fetched::One(None));
        }
        Ok(self.materialize(response.body))
    }

    pub async fn get_resource(&self, path: &str, params: &Params) -> Result<Option<Resource>> {
        Ok(self.get(path, params).await?.into_one())
    }

    pub async fn get_collection(&self, path: &str, params: &Params) -> Result<Vec<Resource>> {
        Ok(self.get(path, params).await?.into_many())
    }

    pub(crate) fn materialize(&self, body: ParsedBody) -> Fetched {
        if let Value::Array(items) = &body.data {
            return Fetched::Many(
                items
                    .iter()
                    .map(|item| self.instantiate(self.parse(item)))
                    .collect(),
            );
        }
        let has_data = matches!(&body.data, Value::Object(map) if !map.is_empty());
        if has_data {
            Fetched::One(Some(self.new_from_parsed_data(body)))
        } else {
            Fetched::One(None)
        }
    }

    /// A relation seeded with the type's default scope.
    pub fn scoped(&self) -> Relation {
        Relation::new(self.clone(), self.ty.default_scope().clone())
    }

    pub fn all(&self) -> Relation {
        self.scoped()
    }

    pub fn filter(&self, params: Params) -> Relation {
        self.scoped().filter(params)
    }

    pub fn scope(&self, name: &str, args: &[Value]) -> Result<Relation> {
        self.scoped().scope(name, args)
    }

    pub fn page(&self, number: u32) -> Relation {
        self.scoped().page(number)
    }

    pub fn per_page(&self, size: u32) -> Relation {
        self.scoped().per_page(size)
    }

    pub async fn find(&self, id: impl Into<Value>) -> Result<Option<Resource>> {
        self.scoped().find(id).await
    }

    pub async fn create(&self, attrs: Params) -> Result<Resource> {
        self.scoped().create(attrs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::MockTransport;
    use crate::framework::transport::into_params;
    use serde_json::json;

    fn api() -> Api {
        Api::builder(MockTransport::new().transport())
            .register(TypeBuilder::new("User").has_many("comments"))
            .register(TypeBuilder::new("Comment"))
            .register(TypeBuilder::new("Admin").inherits("User"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_model_lookup() {
        let api = api();
        assert_eq!(api.model("User").unwrap().name(), "User");
        assert!(api.model("Admin").unwrap().is_a("User"));
        assert!(matches!(api.model("Nope"), Err(OrmError::UnknownType(name)) if name == "Nope"));
    }

    #[test]
    fn test_build_rejects_bad_registries() {
        let transport = MockTransport::new().transport();
        let result = Api::builder(transport.clone())
            .register(TypeBuilder::new("User").has_many("comments"))
            .build();
        assert!(matches!(result, Err(OrmError::Configuration(_))));

        let result = Api::builder(transport.clone())
            .register(TypeBuilder::new("A").inherits("B"))
            .register(TypeBuilder::new("B").inherits("A"))
            .build();
        assert!(matches!(result, Err(OrmError::Configuration(msg)) if msg.contains("cycle")));

        let result = Api::builder(transport)
            .register(TypeBuilder::new("User"))
            .register(TypeBuilder::new("User"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_new_resource_applies_default_scope_and_marks_changed() {
        let api = Api::builder(MockTransport::new().transport())
            .register(
                TypeBuilder::new("User")
                    .default_scope(into_params(json!({ "active": true, "role": "member" }))),
            )
            .build()
            .unwrap();
        let user = api
            .model("User")
            .unwrap()
            .new_resource(into_params(json!({ "name": "Tobias", "role": "admin" })));

        assert_eq!(user.value("active"), Some(&json!(true)));
        assert_eq!(user.value("role"), Some(&json!("admin")));
        assert!(user.is_changed("name"));
        assert!(user.is_changed("active"));
        assert!(user.is_new());
    }

    #[test]
    fn test_instantiate_marks_nothing_changed() {
        let user = api()
            .model("User")
            .unwrap()
            .instantiate(into_params(json!({ "id": 1, "name": "Tobias" })));
        assert!(user.changed().is_empty());
        assert!(user.is_persisted());
    }

    #[test]
    fn test_materialize_shapes() {
        let model = api().model("User").unwrap();
        let many = model.materialize(ParsedBody::from_value(json!({
            "data": [{ "id": 1, "attributes": { "name": "a" } }, { "id": 2 }]
        })));
        assert_eq!(many.len(), 2);

        let one = model.materialize(ParsedBody::from_value(json!({
            "data": { "id": 1, "attributes": { "name": "a" } },
            "meta": { "x": 1 }
        })));
        let user = one.into_one().unwrap();
        assert_eq!(user.value("name"), Some(&json!("a")));
        assert_eq!(user.metadata(), &json!({ "x": 1 }));

        assert_eq!(model.materialize(ParsedBody::default()), Fetched::One(None));
    }
}

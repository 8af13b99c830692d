//! # Relations
//!
//! A [`Relation`] is a deferred query over one resource type: accumulated filter parameters,
//! optional pagination, and a handle to the type it will query. Every builder method returns a
//! new value; nothing is sent until a terminal (`fetch`, `find`, `paginate`, ...) is awaited.
//!
//! ```ignore
//! let comments = api.model("Comment")?;
//! let recent = comments
//!     .filter(into_params(json!({ "user_id": 1 })))
//!     .scope("approved", &[])?
//!     .page(2)
//!     .per_page(20);
//! let page = recent.paginate().await?;
//! ```

use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::framework::error::{OrmError, Result};
use crate::framework::transport::{Method, Params};
use crate::model::attributes::is_blank_value;
use crate::model::{Model, Resource};
use crate::paginated::PaginatedCollection;

/// Page size used by [`Relation::paginate`] when none was set.
pub const DEFAULT_PER_PAGE: u32 = 20;

type ScopeFn = dyn Fn(Relation, &[Value]) -> Relation + Send + Sync;

/// A named, parameterized filter declared with [`crate::TypeBuilder::scope`].
#[derive(Clone)]
pub struct Scope(Arc<ScopeFn>);

impl Scope {
    pub fn new<F>(scope: F) -> Self
    where
        F: Fn(Relation, &[Value]) -> Relation + Send + Sync + 'static,
    {
        Scope(Arc::new(scope))
    }

    pub fn apply(&self, relation: Relation, args: &[Value]) -> Relation {
        (self.0)(relation, args)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Scope(..)")
    }
}

#[derive(Debug, Clone)]
pub struct Relation {
    model: Model,
    params: Params,
    page: Option<u32>,
    per_page: Option<u32>,
}

impl Relation {
    pub(crate) fn new(model: Model, params: Params) -> Self {
        Self {
            model,
            params,
            page: None,
            per_page: None,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Accumulated filter parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A copy with `params` merged over the accumulated ones.
    pub fn filter(&self, params: Params) -> Relation {
        let mut next = self.clone();
        next.params.extend(params);
        next
    }

    /// Apply a named scope.
    pub fn scope(&self, name: &str, args: &[Value]) -> Result<Relation> {
        let scope = self
            .model
            .resource_type()
            .scope(name)
            .ok_or_else(|| OrmError::UnknownScope {
                resource_type: self.model.name().to_string(),
                name: name.to_string(),
            })?;
        Ok(scope.apply(self.clone(), args))
    }

    pub fn page(&self, number: u32) -> Relation {
        Relation {
            page: Some(number),
            ..self.clone()
        }
    }

    pub fn per_page(&self, size: u32) -> Relation {
        Relation {
            per_page: Some(size),
            ..self.clone()
        }
    }

    /// Filter parameters plus `page[number]` / `page[size]` when set.
    pub fn request_params(&self) -> Params {
        let mut params = self.params.clone();
        if self.page.is_some() || self.per_page.is_some() {
            let mut page = Params::new();
            if let Some(number) = self.page {
                page.insert("number".to_string(), json!(number));
            }
            if let Some(size) = self.per_page {
                page.insert("size".to_string(), json!(size));
            }
            params.insert("page".to_string(), Value::Object(page));
        }
        params
    }

    /// GET the collection path (placeholders filled from the parameters).
    #[instrument(skip(self), fields(resource_type = %self.model.name()))]
    pub async fn fetch(&self) -> Result<Vec<Resource>> {
        let params = self.request_params();
        let path = self.model.build_request_path(&self.params)?;
        let items = self.model.get_collection(&path, &params).await?;
        debug!(count = items.len(), "Fetched collection");
        Ok(items)
    }

    /// GET one resource by id. A blank id or a rejected request yields `None`.
    pub async fn find(&self, id: impl Into<Value>) -> Result<Option<Resource>> {
        let id = id.into();
        if is_blank_value(&id) {
            return Ok(None);
        }
        let mut path_params = self.params.clone();
        path_params.insert("id".to_string(), id);
        let path = self.model.build_request_path(&path_params)?;
        self.model.get_resource(&path, &self.params).await
    }

    /// [`Model::build`] with the accumulated parameters as attributes.
    pub async fn build(&self, attrs: Params) -> Result<Option<Resource>> {
        let mut merged = self.params.clone();
        merged.extend(attrs);
        self.model.build(merged).await
    }

    /// Build locally with the accumulated parameters and save. The instance is returned either
    /// way; check [`Resource::errors`] when the save was rejected.
    pub async fn create(&self, attrs: Params) -> Result<Resource> {
        let mut resource = self.initialize(attrs);
        resource.save().await?;
        Ok(resource)
    }

    fn initialize(&self, attrs: Params) -> Resource {
        let mut merged = self.params.clone();
        merged.extend(attrs);
        self.model.new_resource(merged)
    }

    /// The first match, or a newly created one.
    pub async fn first_or_create(&self, attrs: Params) -> Result<Resource> {
        match self.fetch().await?.into_iter().next() {
            Some(found) => Ok(found),
            None => self.create(attrs).await,
        }
    }

    /// The first match, or a new unsaved one.
    pub async fn first_or_initialize(&self, attrs: Params) -> Result<Resource> {
        match self.fetch().await?.into_iter().next() {
            Some(found) => Ok(found),
            None => Ok(self.initialize(attrs)),
        }
    }

    /// Fetch one page and wrap it with the response's links.
    #[instrument(skip(self), fields(resource_type = %self.model.name()))]
    pub async fn paginate(&self) -> Result<PaginatedCollection<Resource>> {
        let page = self.page.unwrap_or(1);
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        let collection = PaginatedCollection::new(Vec::new(), page, per_page)?;

        let params = self.page(page).per_page(per_page).request_params();
        let path = self.model.build_request_path(&self.params)?;
        let response = self.model.request(Method::Get, &path, &params).await?;

        let links = response.body.links.clone();
        let metadata = response.body.metadata.clone();
        let errors = response.body.errors.clone();
        let items = if response.is_success() {
            self.model.materialize(response.body).into_many()
        } else {
            Vec::new()
        };
        debug!(count = items.len(), page, "Fetched page");

        Ok(collection
            .with_items(items)
            .with_metadata(metadata)
            .with_errors(errors)
            .with_links(links))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::MockTransport;
    use crate::framework::transport::into_params;
    use crate::model::{Api, TypeBuilder};

    fn api() -> Api {
        Api::builder(MockTransport::new().transport())
            .register(
                TypeBuilder::new("User")
                    .default_scope(into_params(json!({ "active": true })))
                    .scope("admins", |rel, _| rel.filter(into_params(json!({ "admin": 1 }))))
                    .scope("named", |rel, args| {
                        let name = args.first().cloned().unwrap_or(Value::Null);
                        rel.filter(into_params(json!({ "name": name })))
                    }),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_filter_returns_new_relation() {
        let users = api().model("User").unwrap();
        let base = users.scoped();
        let a = base.filter(into_params(json!({ "age": 30 })));
        let b = base.filter(into_params(json!({ "age": 40 })));

        assert_eq!(base.params().len(), 1);
        assert_eq!(a.params()["age"], json!(30));
        assert_eq!(b.params()["age"], json!(40));
        assert_eq!(a.params()["active"], json!(true));
    }

    #[test]
    fn test_scopes() {
        let users = api().model("User").unwrap();
        let admins = users.scope("admins", &[]).unwrap();
        assert_eq!(admins.params()["admin"], json!(1));

        let named = admins.scope("named", &[json!("Lindsay")]).unwrap();
        assert_eq!(named.params()["name"], json!("Lindsay"));
        assert_eq!(named.params()["admin"], json!(1));

        assert!(matches!(
            users.scope("missing", &[]),
            Err(OrmError::UnknownScope { name, .. }) if name == "missing"
        ));
    }

    #[test]
    fn test_request_params_include_page() {
        let users = api().model("User").unwrap();
        assert!(!users.all().request_params().contains_key("page"));
        let params = users.page(3).per_page(10).request_params();
        assert_eq!(params["page"], json!({ "number": 3, "size": 10 }));
    }
}

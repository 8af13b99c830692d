//! # Persistence
//!
//! Saving and destroying instances, plus the class-level `build`, `save_existing` and
//! `destroy_existing`.
//!
//! A save has three outcomes:
//!
//! - **Accepted**: 2xx with no errors. Server data is merged in, the change set moves to
//!   `previously_changed`, and `save` returns `Ok(true)`.
//! - **Rejected**: top-level errors, a non-2xx status other than 422, or a validation block.
//!   The details are left on the instance and `save` returns `Ok(false)`.
//! - **Failed**: the transport produced no response. `save` returns `Err`.
//!
//! On a validation rejection the nested children that were sent are reconciled with what came
//! back: unsaved children are put back on the instance so the user can fix and resubmit them,
//! and children that were flagged for deletion stay flagged.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::associations::{AssociationDescriptor, Cardinality};
use crate::framework::error::{OrmError, Result};
use crate::framework::transport::{Action, Params, ParsedBody};
use crate::model::attributes::{is_blank_value, Attribute};
use crate::model::resource::is_destroy_flag;
use crate::model::{Model, Resource};

const NESTED_SUFFIX: &str = "_attributes";

fn has_data(data: &Value) -> bool {
    match data {
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

impl Resource {
    /// Create (no id) or update (has id) through the type's method table.
    ///
    /// Returns `Ok(false)` when the service rejected the save; see [`Resource::errors`] and
    /// [`Resource::response_errors`].
    #[instrument(skip(self), fields(resource_type = %self.type_name(), id = ?self.id()))]
    pub async fn save(&mut self) -> Result<bool> {
        let action = if self.is_new() { Action::Create } else { Action::Update };
        let method = self.model.method_for(action);
        self.errors.clear();
        self.response_errors.clear();

        let submitted = self.to_params();
        let path = self.request_path(&Params::new())?;
        let response = self.model.request(method, &path, &submitted).await?;

        let success = response.is_success();
        let unprocessable = response.is_unprocessable();
        let status = response.status;
        let ParsedBody {
            mut data,
            metadata,
            errors,
            ..
        } = response.body;

        let validation_errors = match &mut data {
            Value::Object(map) => map.remove("errors").filter(|block| !block.is_null()),
            _ => None,
        };
        if has_data(&data) {
            let parsed = self.model.parse(&data);
            self.assign_from_server(parsed);
        }
        self.metadata = metadata;
        self.response_errors = errors;

        if !self.response_errors.is_empty() {
            warn!(
                status,
                errors = self.response_errors.len(),
                "Save rejected with top-level errors"
            );
            return Ok(false);
        }
        if !success && !unprocessable {
            warn!(status, "Save rejected");
            return Ok(false);
        }
        if let Some(block) = validation_errors {
            self.errors.extend_from_value(&block);
            self.reconcile_nested(&submitted);
            warn!(status, errors = %self.errors, "Save rejected with validation errors");
            return Ok(false);
        }

        self.previously_changed = std::mem::take(&mut self.changed);
        info!(status, ?action, "Saved");
        Ok(true)
    }

    /// [`Resource::save`], but a rejection is an [`OrmError::ResourceInvalid`] carrying a
    /// snapshot of the instance.
    pub async fn save_strict(&mut self) -> Result<&mut Self> {
        if self.save().await? {
            Ok(self)
        } else {
            Err(OrmError::ResourceInvalid(Box::new(self.clone())))
        }
    }

    /// Delete through the type's method table.
    ///
    /// Any response marks the instance destroyed; `Ok(true)` means the service accepted it.
    /// A transport failure leaves the instance untouched.
    #[instrument(skip(self, params), fields(resource_type = %self.type_name(), id = ?self.id()))]
    pub async fn destroy(&mut self, params: Params) -> Result<bool> {
        let method = self.model.method_for(Action::Destroy);
        self.errors.clear();
        self.response_errors.clear();
        let path = self.request_path(&Params::new())?;
        let response = self.model.request(method, &path, &params).await?;

        let success = response.is_success();
        let status = response.status;
        let ParsedBody {
            data,
            metadata,
            errors,
            ..
        } = response.body;
        if has_data(&data) {
            let parsed = self.model.parse(&data);
            self.assign_from_server(parsed);
        }
        self.metadata = metadata;
        self.response_errors = errors;
        self.destroyed = true;

        let accepted = success && self.response_errors.is_empty();
        if accepted {
            info!(status, "Destroyed");
        } else {
            warn!(status, "Destroy rejected");
        }
        Ok(accepted)
    }

    /// Restore nested children after a validation rejection.
    fn reconcile_nested(&mut self, submitted: &Params) {
        let Some(Value::Object(sent)) = submitted.get("data").and_then(|d| d.get("attributes"))
        else {
            return;
        };

        for (key, rows) in sent {
            let Some(name) = key.strip_suffix(NESTED_SUFFIX) else {
                continue;
            };
            let Some(descriptor) = self.model.resource_type().association(name).cloned() else {
                debug!(key = %key, "No association for nested key");
                continue;
            };
            let Ok(target) = self.model.related(&descriptor.target) else {
                continue;
            };
            let Value::Array(rows) = rows else {
                continue;
            };

            for row in rows {
                let Value::Object(row) = row else {
                    continue;
                };
                let id = row.get("id").filter(|id| !is_blank_value(id));
                let destroy = is_destroy_flag(row.get("_destroy"));
                match (id, destroy) {
                    (None, false) => {
                        let child = target.new_resource(row.clone());
                        self.reattach(&descriptor, child);
                    }
                    (Some(id), true) => match self.child_with_id_mut(name, id) {
                        Some(child) => child.mark_for_destruction(),
                        None => debug!(association = name, %id, "Child flagged for deletion not found"),
                    },
                    _ => {}
                }
            }
        }
    }

    /// Put an unsaved child back unless an identical one is still attached.
    fn reattach(&mut self, descriptor: &AssociationDescriptor, child: Resource) {
        match descriptor.cardinality {
            Cardinality::Many => match self.live_children_mut(descriptor) {
                Ok(children) => {
                    let already = children
                        .iter()
                        .any(|c| c.is_new() && c.to_json() == child.to_json());
                    if !already {
                        children.push(child);
                    }
                }
                Err(e) => debug!(error = %e, "Cannot restore nested child"),
            },
            Cardinality::One => {
                let replace = match self.attributes.get(&descriptor.name) {
                    Some(Attribute::One(current)) => !current.is_new(),
                    Some(other) => other.is_blank(),
                    None => true,
                };
                if replace {
                    self.attributes
                        .insert(descriptor.name.clone(), Attribute::One(Box::new(child)));
                }
            }
        }
        self.association_cache.remove(&descriptor.name);
    }
}

impl Model {
    /// A new instance, locally or (with `request_new_object_on_build`) from the service's
    /// `new` template. `None` when the template request is rejected.
    #[instrument(skip(self, attrs), fields(resource_type = %self.name()))]
    pub async fn build(&self, attrs: Params) -> Result<Option<Resource>> {
        if !self.resource_type().options().request_new_object_on_build {
            return Ok(Some(self.new_resource(attrs)));
        }

        let mut path_params = attrs.clone();
        path_params.insert("id".to_string(), Value::String("new".to_string()));
        let path = self.build_request_path(&path_params)?;
        let response = self.request(self.method_for(Action::New), &path, &attrs).await?;
        if !response.is_success() {
            warn!(status = response.status, "New template rejected");
            return Ok(None);
        }

        let ParsedBody {
            data,
            metadata,
            errors,
            ..
        } = response.body;
        let mut resource = self.new_resource(self.parse(&data));
        resource.metadata = metadata;
        resource.response_errors = errors;
        Ok(Some(resource))
    }

    /// Update the resource with `id` without fetching it first.
    pub async fn save_existing(&self, id: impl Into<Value>, params: Params) -> Result<Resource> {
        let mut attrs = params;
        attrs.insert("id".to_string(), id.into());
        let mut resource = self.new_resource(attrs);
        resource.save().await?;
        Ok(resource)
    }

    /// Delete the resource with `id` without fetching it first. The returned instance is
    /// marked destroyed whatever the status.
    #[instrument(skip(self, id, params), fields(resource_type = %self.name()))]
    pub async fn destroy_existing(&self, id: impl Into<Value>, params: Params) -> Result<Resource> {
        let id = id.into();
        let mut path_params = params.clone();
        path_params.insert("id".to_string(), id.clone());
        let path = self.build_request_path(&path_params)?;
        let response = self.request(self.method_for(Action::Destroy), &path, &params).await?;

        let status = response.status;
        let ParsedBody {
            data,
            metadata,
            errors,
            ..
        } = response.body;
        let mut attrs = self.parse(&data);
        attrs.entry("id").or_insert(id);
        let mut resource = self.instantiate(attrs);
        resource.metadata = metadata;
        resource.response_errors = errors;
        resource.destroyed = true;
        info!(status, "Destroyed by id");
        Ok(resource)
    }
}

use serde_json::Value;
use tracing::{debug, instrument};

use super::{AssociationCache, AssociationDescriptor, Cardinality, Fetched};
use crate::framework::error::{OrmError, Result};
use crate::framework::transport::Params;
use crate::model::attributes::{is_blank_value, Attribute};
use crate::model::{inflect, Model, Resource};

/// A relationship of one parent type, plus accumulated query parameters.
///
/// Obtained from [`Resource::association`]. Filtering returns a new value and never touches
/// the one it was called on. Evaluation takes the parent explicitly:
///
/// ```ignore
/// let comments = user.association("comments")?;
/// let approved = comments.filter(into_params(json!({ "approved": 1 })));
/// let all = comments.fetch(&mut user).await?;       // memoized on `user`
/// let some = approved.fetch(&mut user).await?;      // always a fresh request
/// ```
#[derive(Debug, Clone)]
pub struct Association {
    owner: String,
    descriptor: AssociationDescriptor,
    target: Model,
    params: Params,
}

impl Association {
    pub(crate) fn new(owner: &Model, descriptor: AssociationDescriptor) -> Result<Self> {
        let target = owner.related(&descriptor.target)?;
        Ok(Self {
            owner: owner.name().to_string(),
            descriptor,
            target,
            params: Params::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &AssociationDescriptor {
        &self.descriptor
    }

    pub fn target(&self) -> &Model {
        &self.target
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A copy with `params` merged over the accumulated ones.
    pub fn filter(&self, params: Params) -> Association {
        let mut next = self.clone();
        next.params.extend(params);
        next
    }

    /// Same as `filter` with no new parameters.
    pub fn all(&self) -> Association {
        self.filter(Params::new())
    }

    fn check_parent(&self, parent: &Resource) -> Result<()> {
        if parent.model().is_a(&self.owner) {
            Ok(())
        } else {
            Err(OrmError::UnknownAssociation {
                resource_type: parent.type_name().to_string(),
                name: self.descriptor.name.clone(),
            })
        }
    }

    /// Evaluate against `parent`.
    ///
    /// Without parameters, in order: an explicitly empty value on the parent yields the
    /// descriptor's default, then a memoized result, then whatever the parent already holds.
    /// Otherwise a persisted parent is queried at `<parent path><association path>`; only
    /// unfiltered results are memoized. An unsaved parent yields an empty result and nothing
    /// is memoized, so a later fetch after saving still goes to the service.
    #[instrument(skip(self, parent), fields(resource_type = %self.owner, association = %self.descriptor.name))]
    pub async fn fetch(&self, parent: &mut Resource) -> Result<Fetched> {
        self.check_parent(parent)?;
        let name = &self.descriptor.name;
        let cardinality = self.descriptor.cardinality;
        let filtered = !self.params.is_empty();

        if !filtered {
            if let Some(current) = parent.get(name) {
                if current.is_empty() {
                    return Ok(self.descriptor.default.clone());
                }
            }
            if let Some(AssociationCache::Cached(fetched)) = parent.association_cache.get(name) {
                return Ok(fetched.clone());
            }
            if let Some(current) = parent.get(name).filter(|a| !a.is_blank()) {
                if let Some(fetched) = Fetched::from_attribute(current, &self.target) {
                    return Ok(fetched.coerce(cardinality));
                }
            }
        }

        if !parent.is_persisted() {
            debug!("Parent not persisted, nothing to fetch");
            return Ok(Fetched::empty(cardinality));
        }

        let base = match parent.request_path(&self.params) {
            Ok(base) => base,
            Err(e) => {
                debug!(error = %e, "Cannot build parent path");
                return Ok(Fetched::empty(cardinality));
            }
        };
        let path = format!("{base}{}", self.descriptor.path);
        let fetched = self.target.get(&path, &self.params).await?.coerce(cardinality);

        if !filtered {
            parent
                .association_cache
                .insert(name.clone(), AssociationCache::Cached(fetched.clone()));
        }
        Ok(fetched)
    }

    /// GET one related resource by id under the parent's path.
    ///
    /// A blank id or a parent path that can't be built yields `None`.
    pub async fn find(&self, parent: &Resource, id: impl Into<Value>) -> Result<Option<Resource>> {
        self.check_parent(parent)?;
        let id = id.into();
        if is_blank_value(&id) {
            return Ok(None);
        }
        let base = match parent.request_path(&self.params) {
            Ok(base) => base,
            Err(e) => {
                debug!(error = %e, association = %self.descriptor.name, "Cannot build parent path");
                return Ok(None);
            }
        };
        let id = match id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let path = format!("{base}{}/{id}", self.descriptor.path);
        self.target.get_resource(&path, &self.params).await
    }

    /// Name of the parent's key on children, e.g. `user_id`.
    pub fn foreign_key(&self) -> String {
        format!("{}_id", inflect::underscore(inflect::demodulize(&self.owner)))
    }

    /// A new, unattached child with the parent's key set.
    pub fn build(&self, parent: &Resource, attrs: Params) -> Resource {
        let mut merged = self.params.clone();
        merged.extend(attrs);
        if let Some(id) = parent.id() {
            merged.insert(self.foreign_key(), id.clone());
        }
        self.target.new_resource(merged)
    }

    /// Build, save, and on success attach the child to the parent's live value.
    pub async fn create(&self, parent: &mut Resource, attrs: Params) -> Result<Resource> {
        self.check_parent(parent)?;
        let mut child = self.build(parent, attrs);
        if child.save().await? {
            self.push(parent, child.clone())?;
        }
        Ok(child)
    }

    /// Attach a child to the parent's live value: appended for collections, replaced for
    /// single relationships.
    pub fn push(&self, parent: &mut Resource, child: Resource) -> Result<()> {
        self.check_parent(parent)?;
        parent.association_cache.remove(&self.descriptor.name);
        match self.descriptor.cardinality {
            Cardinality::Many => parent.live_children_mut(&self.descriptor)?.push(child),
            Cardinality::One => {
                parent
                    .attributes
                    .insert(self.descriptor.name.clone(), Attribute::One(Box::new(child)));
            }
        }
        Ok(())
    }

    /// Merge nested attributes into the parent's single child, building one if there is none.
    pub fn assign_single_nested_attributes(&self, parent: &mut Resource, attrs: Params) -> Result<()> {
        self.check_parent(parent)?;
        match parent.attributes.get_mut(&self.descriptor.name) {
            Some(Attribute::One(child)) => child.assign_attributes(attrs),
            _ => {
                let child = self.target.new_resource(self.target.parse(&Value::Object(attrs)));
                parent
                    .attributes
                    .insert(self.descriptor.name.clone(), Attribute::One(Box::new(child)));
            }
        }
        Ok(())
    }
}

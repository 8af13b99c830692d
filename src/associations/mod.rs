//! # Associations
//!
//! Declared relationships between resource types. A [`AssociationDescriptor`] is part of the
//! owning type's configuration; an [`Association`] is the query value obtained from a parent
//! instance with [`crate::Resource::association`] and evaluated against that parent.
//!
//! Related data that arrives embedded in a payload is parsed into typed children when an
//! instance is built, so `user.get("comments")` holds [`crate::Attribute::Many`] rather than raw
//! JSON once the `User` type declares `has_many("comments")`.

mod association;

pub use association::Association;

use serde_json::Value;

use crate::model::attributes::{Attribute, Attributes};
use crate::model::{inflect, Model, Resource};

/// Single child or collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// One declared relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationDescriptor {
    pub name: String,
    /// Name of the target resource type.
    pub target: String,
    pub cardinality: Cardinality,
    /// Key the embedded data arrives under.
    pub data_key: String,
    /// Appended to the parent's request path to fetch the relation, e.g. `/comments`.
    pub path: String,
    /// Returned when the parent holds an explicitly empty value.
    pub default: Fetched,
}

impl AssociationDescriptor {
    pub fn has_many(name: impl Into<String>) -> Self {
        Self::with_cardinality(name.into(), Cardinality::Many)
    }

    pub fn has_one(name: impl Into<String>) -> Self {
        Self::with_cardinality(name.into(), Cardinality::One)
    }

    fn with_cardinality(name: String, cardinality: Cardinality) -> Self {
        Self {
            target: inflect::classify(&name),
            data_key: name.clone(),
            path: format!("/{name}"),
            default: Fetched::empty(cardinality),
            cardinality,
            name,
        }
    }

    pub fn class_name(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn data_key(mut self, key: impl Into<String>) -> Self {
        self.data_key = key.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn default(mut self, default: Fetched) -> Self {
        self.default = default;
        self
    }
}

/// Result of evaluating an association.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    One(Option<Resource>),
    Many(Vec<Resource>),
}

impl Fetched {
    pub fn empty(cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::One => Fetched::One(None),
            Cardinality::Many => Fetched::Many(Vec::new()),
        }
    }

    pub fn into_one(self) -> Option<Resource> {
        match self {
            Fetched::One(resource) => resource,
            Fetched::Many(items) => items.into_iter().next(),
        }
    }

    pub fn into_many(self) -> Vec<Resource> {
        match self {
            Fetched::One(resource) => resource.into_iter().collect(),
            Fetched::Many(items) => items,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Fetched::One(resource) => usize::from(resource.is_some()),
            Fetched::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reshape to the given cardinality.
    pub fn coerce(self, cardinality: Cardinality) -> Self {
        match cardinality {
            Cardinality::One => Fetched::One(self.into_one()),
            Cardinality::Many => Fetched::Many(self.into_many()),
        }
    }

    /// Read a value held in the parent's attributes.
    pub(crate) fn from_attribute(attribute: &Attribute, target: &Model) -> Option<Self> {
        match attribute {
            Attribute::One(resource) => Some(Fetched::One(Some((**resource).clone()))),
            Attribute::Many(items) => Some(Fetched::Many(items.clone())),
            Attribute::Value(Value::Array(items)) => Some(Fetched::Many(
                items
                    .iter()
                    .map(|item| resolve(Incoming::RawPayload(item.clone()), target))
                    .collect(),
            )),
            Attribute::Value(value @ Value::Object(_)) => Some(Fetched::One(Some(resolve(
                Incoming::RawPayload(value.clone()),
                target,
            )))),
            Attribute::Value(_) => None,
        }
    }
}

/// Per-parent memo of an association's unfiltered fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AssociationCache {
    #[default]
    Uncached,
    Cached(Fetched),
}

/// Embedded related data: either an instance already of the right type, or raw JSON.
#[derive(Debug, Clone)]
pub enum Incoming {
    AlreadyTyped(Resource),
    RawPayload(Value),
}

impl From<Attribute> for Incoming {
    fn from(attribute: Attribute) -> Self {
        match attribute {
            Attribute::One(resource) => Incoming::AlreadyTyped(*resource),
            Attribute::Value(value) => Incoming::RawPayload(value),
            Attribute::Many(items) => {
                Incoming::RawPayload(Value::Array(items.iter().map(Resource::to_json).collect()))
            }
        }
    }
}

/// Turn incoming data into an instance of `target`.
///
/// Instances already of the target type (or a subtype) are kept as they are. Anything else is
/// parsed and built as a new `target` instance.
pub fn resolve(incoming: Incoming, target: &Model) -> Resource {
    match incoming {
        Incoming::AlreadyTyped(resource) if resource.model().is_a(target.name()) => resource,
        Incoming::AlreadyTyped(resource) => {
            target.new_resource(target.parse(&resource.to_json()))
        }
        Incoming::RawPayload(value) => target.new_resource(target.parse(&value)),
    }
}

fn is_absent(attribute: &Attribute) -> bool {
    matches!(attribute, Attribute::Value(Value::Null | Value::Bool(false)))
}

/// The attribute update for a single-valued relationship whose data is present in `data`.
pub fn parse_single(
    descriptor: &AssociationDescriptor,
    target: &Model,
    data: &Attributes,
) -> Option<(String, Attribute)> {
    let raw = data.get(&descriptor.data_key)?;
    if is_absent(raw) {
        return None;
    }
    if let Attribute::One(resource) = raw {
        if resource.model().is_a(target.name()) {
            return None;
        }
    }
    let incoming = match raw {
        Attribute::Many(items) => Incoming::AlreadyTyped(items.first()?.clone()),
        Attribute::Value(Value::Array(items)) => Incoming::RawPayload(items.first()?.clone()),
        other => Incoming::from(other.clone()),
    };
    let child = resolve(incoming, target);
    Some((descriptor.name.clone(), Attribute::One(Box::new(child))))
}

/// The attribute update for a collection relationship whose data is present in `data`.
pub fn parse_many(
    descriptor: &AssociationDescriptor,
    target: &Model,
    data: &Attributes,
) -> Option<(String, Attribute)> {
    let raw = data.get(&descriptor.data_key)?;
    if is_absent(raw) {
        return None;
    }
    let children = match raw {
        Attribute::Many(items) => items
            .iter()
            .map(|item| resolve(Incoming::AlreadyTyped(item.clone()), target))
            .collect(),
        Attribute::One(resource) => {
            vec![resolve(Incoming::AlreadyTyped((**resource).clone()), target)]
        }
        Attribute::Value(Value::Array(items)) => items
            .iter()
            .map(|item| resolve(Incoming::RawPayload(item.clone()), target))
            .collect(),
        Attribute::Value(value @ Value::Object(_)) => {
            vec![resolve(Incoming::RawPayload(value.clone()), target)]
        }
        Attribute::Value(_) => return None,
    };
    Some((descriptor.name.clone(), Attribute::Many(children)))
}

/// Replace embedded related data in `attributes` with typed children, for every association
/// `model` declares. Raw data keyed by a custom `data_key` moves to the association's name.
pub(crate) fn parse_associations(model: &Model, attributes: &mut Attributes) {
    for descriptor in model.resource_type().associations() {
        let Ok(target) = model.related(&descriptor.target) else {
            continue;
        };
        let update = match descriptor.cardinality {
            Cardinality::One => parse_single(descriptor, &target, attributes),
            Cardinality::Many => parse_many(descriptor, &target, attributes),
        };
        if let Some((name, value)) = update {
            if descriptor.data_key != name {
                attributes.remove(&descriptor.data_key);
            }
            attributes.insert(name, value);
        }
    }
}

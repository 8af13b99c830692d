//! Resource types, instances and their persistence.
//!
//! # Main Components
//!
//! - [`Api`] / [`ApiBuilder`] - The type registry and transport handle
//! - [`TypeBuilder`] / [`ResourceType`] - Per-type configuration
//! - [`Model`] - Class-level operations of one type (`find`, `build`, `save_existing`, ...)
//! - [`Resource`] - One client-side object with change tracking
//! - [`Attribute`] / [`ValidationErrors`] - Attribute values and server-reported field errors

pub mod api;
pub mod attributes;
pub mod inflect;
pub mod orm;
pub mod resource;
pub mod types;

pub use api::{Api, ApiBuilder, Model};
pub use attributes::{Attribute, Attributes, ValidationErrors};
pub use resource::Resource;
pub use types::{MethodTable, ResourceType, TypeBuilder, TypeOptions};

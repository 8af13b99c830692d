//! # JSON:API ORM
//!
//! > **Remote JSON:API resources as local, mutable, associatable objects.**
//!
//! Resource types are declared once with a [`TypeBuilder`] and registered on an [`Api`], which
//! owns the [`Transport`] used for every request. A [`Model`] handle gives the class-level
//! operations of one type; a [`Resource`] is one object with change tracking, associations and
//! the errors the service reported about it.
//!
//! ## Core Concepts
//!
//! ### Outcomes, not exceptions
//! A rejected save is not an error. [`Resource::save`] returns `Ok(false)` and leaves the
//! details on the instance: field errors in [`Resource::errors`], top-level errors in
//! [`Resource::response_errors`]. `Err` means something the caller can't fix by editing
//! attributes: a misconfigured type, a path that can't be built, or no response at all.
//!
//! ### Partial-failure reconciliation
//! When a save with nested children fails validation, the unsaved children are put back on
//! the instance and children flagged for deletion stay flagged, so the same object can be
//! corrected and resubmitted.
//!
//! ### Deferred queries
//! [`Relation`] and [`Association`] are plain values. Filtering returns a new value and never
//! sends anything; a terminal call (`fetch`, `find`, `paginate`) issues exactly one request.
//!
//! ## Architecture Notes
//!
//! ### 1. One Seam to the Network
//! Every request goes through [`Model::request`] and from there through the configured
//! [`Transport`]. Swapping [`framework::mock::MockTransport`] in for the HTTP client is all a test
//! needs; nothing else in the crate knows where responses come from.
//!
//! ### 2. Configuration Resolved Once
//! Types are registered as [`TypeBuilder`] values and frozen when [`ApiBuilder::build`] runs.
//! Inheritance, association targets and unknown parents are all checked there, so a built
//! [`Api`] never fails a lookup it was configured for.
//!
//! ### 3. Explicit Parents
//! An [`Association`] doesn't borrow its parent. Terminal calls take the parent as an argument,
//! and the memo of an unfiltered fetch lives on that parent. Filtering clones.
//!
//! ### 4. Observability
//! Lifecycle operations and requests run inside `tracing` spans carrying `resource_type`.
//! See the [`lifecycle::tracing`] module for what gets logged at which level.
//!
//! ## Module Tour
//!
//! ### 1. The Plumbing ([`framework`])
//! The transport seam, errors, and the [`framework::mock`] transport for tests.
//!
//! ### 2. Resources ([`model`])
//! Type configuration, the registry, resource instances and persistence.
//!
//! ### 3. Relationships ([`associations`], [`relation`])
//! Declared associations with their per-parent evaluation, and the scope chain for queries.
//!
//! ### 4. The Wire ([`json_api`], [`paginated`])
//! Body translation and page-aware collections.
//!
//! ### 5. Applications ([`lifecycle`])
//! `setup_tracing` for binaries.
//!
//! ## Quick Start
//!
//! ```ignore
//! let api = Api::builder(Arc::new(HttpTransport::new(HttpConfig::new("https://api.example.com"))))
//!     .register(TypeBuilder::new("User").has_many("comments").accepts_nested_attributes_for("comments"))
//!     .register(TypeBuilder::new("Comment").collection_path("users/:user_id/comments"))
//!     .build()?;
//!
//! let users = api.model("User")?;
//! let mut user = users.find(1).await?.ok_or("not found")?;
//! user.set("name", "Tobias");
//! if !user.save().await? {
//!     eprintln!("{}", user.errors());
//! }
//! let comments = user.fetch_association("comments").await?;
//! ```

pub mod associations;
pub mod framework;
pub mod json_api;
pub mod lifecycle;
pub mod model;
pub mod paginated;
pub mod relation;

pub use associations::{Association, AssociationDescriptor, Cardinality, Fetched};
pub use framework::{
    into_params, Action, Method, OrmError, Params, ParsedBody, PathError, Response, Result,
    Transport,
};
pub use model::{Api, ApiBuilder, Attribute, Model, Resource, TypeBuilder, ValidationErrors};
pub use paginated::PaginatedCollection;
pub use relation::{Relation, Scope};

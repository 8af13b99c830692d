//! Plumbing shared by every resource type.
//!
//! # Main Components
//!
//! - [`Transport`] - The collaborator that performs one request/response round trip
//! - [`ParsedBody`] / [`Response`] - The parsed JSON:API envelope and its status
//! - [`OrmError`] - Errors raised by the ORM layer
//!
//! # Testing
//!
//! See [`mock`] module for a transport that answers from a queue of expectations.

pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod mock;
pub mod transport;

// Re-export core types for convenience
pub use error::{OrmError, PathError, Result};
pub use transport::{
    into_params, Action, Method, Params, ParsedBody, Response, Transport, UNPROCESSABLE_ENTITY,
};

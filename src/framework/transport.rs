//! # Transport Seam
//!
//! The ORM never talks HTTP itself. Every remote call goes through a [`Transport`]: it takes a
//! method, a path and a parameter map, and hands back a [`Response`] holding the status and the
//! parsed JSON:API envelope.
//!
//! ## Key Types
//!
//! - [`Transport`]: the collaborator contract. See [`crate::framework::mock::MockTransport`] for
//!   tests and `HttpTransport` (feature `http`) for a real client.
//! - [`ParsedBody`]: `data`, `metadata`, `errors` and `links` pulled out of a response document.
//! - [`Method`] / [`Action`]: HTTP verbs and the lifecycle actions mapped onto them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::framework::error::Result;

/// Request parameters and attribute payloads.
pub type Params = Map<String, Value>;

/// Take the members of a JSON object as [`Params`]. Anything else yields an empty map.
pub fn into_params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}

/// Status the service uses for "understood, but invalid".
pub const UNPROCESSABLE_ENTITY: u16 = 422;

/// HTTP verbs used by the ORM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Whether parameters travel in the request body rather than the query string.
    pub fn has_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Patch)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(verb)
    }
}

/// Lifecycle actions whose verb is configurable per resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Destroy,
    /// Requesting a server-materialized template for a new object.
    New,
}

/// The parsed response envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody {
    /// Primary data: an object for single resources, an array for collections.
    pub data: Value,
    /// Response-level metadata, passed through untouched.
    pub metadata: Value,
    /// Top-level errors. Distinct from field-level validation errors inside `data`.
    pub errors: Vec<Value>,
    /// Relation name ("self", "last", ...) to URL.
    pub links: BTreeMap<String, String>,
}

impl Default for ParsedBody {
    fn default() -> Self {
        Self {
            data: Value::Object(Map::new()),
            metadata: Value::Object(Map::new()),
            errors: Vec::new(),
            links: BTreeMap::new(),
        }
    }
}

impl ParsedBody {
    /// Pull the envelope out of a decoded JSON document.
    ///
    /// Missing or null members fall back to an empty object (`data`, `metadata`) or an empty
    /// list (`errors`). `metadata` is also read from the JSON:API `meta` member. Link values
    /// may be plain strings or `{ "href": ... }` objects.
    pub fn from_value(document: Value) -> Self {
        let mut document = match document {
            Value::Object(map) => map,
            _ => return Self::default(),
        };

        let data = match document.remove("data") {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(data) => data,
        };

        let metadata = match document.remove("metadata").or_else(|| document.remove("meta")) {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(metadata) => metadata,
        };

        let errors = match document.remove("errors") {
            Some(Value::Array(errors)) => errors,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        };

        let links = match document.remove("links") {
            Some(Value::Object(links)) => links
                .into_iter()
                .filter_map(|(rel, link)| {
                    let href = match link {
                        Value::String(href) => Some(href),
                        Value::Object(mut obj) => match obj.remove("href") {
                            Some(Value::String(href)) => Some(href),
                            _ => None,
                        },
                        _ => None,
                    };
                    href.map(|href| (rel, href))
                })
                .collect(),
            _ => BTreeMap::new(),
        };

        Self { data, metadata, errors, links }
    }
}

/// What the transport hands back for one round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: ParsedBody,
}

impl Response {
    pub fn new(status: u16, body: ParsedBody) -> Self {
        Self { status, body }
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unprocessable(&self) -> bool {
        self.status == UNPROCESSABLE_ENTITY
    }
}

/// The configured HTTP client the ORM issues requests through.
///
/// # Contract
/// - `path` is relative to whatever base URL the implementation is configured with
///   (e.g. `users/1/comments`).
/// - For verbs with a body (`POST`, `PUT`, `PATCH`) `params` is the JSON body; otherwise it is
///   encoded into the query string.
/// - Non-2xx responses are still `Ok`: the ORM decides what a status means. `Err` is for when
///   no response could be obtained.
///
/// Timeouts and retries, if any, are the implementation's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, path: &str, params: &Params) -> Result<Response>;
}

//! # Mock Transport
//!
//! Utilities for testing resources without a server.
//!
//! [`MockTransport`] answers requests from a queue of expectations, in order. Each expectation
//! names the method and path it expects, and what to hand back. Every request is recorded so
//! tests can assert on the exact wire body that was sent.
//!
//! ```ignore
//! let mut mock = MockTransport::new();
//! let api = Api::builder(mock.transport()).register(TypeBuilder::new("User")).build()?;
//!
//! mock.expect(Method::Get, "users/1")
//!     .respond(200, json!({ "data": { "id": 1, "attributes": { "name": "Tobias" } } }));
//!
//! let user = api.model("User")?.find(1).await?;
//! mock.verify(); // Ensures all expectations were met
//! ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::framework::error::{OrmError, Result};
use crate::framework::transport::{Method, Params, ParsedBody, Response, Transport};

/// An expected request and the canned reply.
struct Expectation {
    method: Method,
    path: String,
    response: std::result::Result<Response, String>,
}

/// A request the mock received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub params: Params,
}

/// A transport with expectation tracking for fluent testing.
#[derive(Clone, Default)]
pub struct MockTransport {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    /// Creates a new mock with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle sharing this mock's queue, to hand to an [`crate::Api`].
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::new(self.clone())
    }

    /// Expects a request with the given method and path.
    pub fn expect(&mut self, method: Method, path: impl Into<String>) -> ExpectationBuilder {
        ExpectationBuilder {
            method,
            path: path.into(),
            expectations: self.expectations.clone(),
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!("Not all expectations were met. {} remaining", exps.len());
        }
    }
}

/// Builder for a single expectation.
pub struct ExpectationBuilder {
    method: Method,
    path: String,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl ExpectationBuilder {
    /// Reply with `status` and a JSON document parsed as a JSON:API envelope.
    pub fn respond(self, status: u16, document: Value) {
        let body = ParsedBody::from_value(document);
        self.push(Ok(Response::new(status, body)));
    }

    /// Reply with `status` and an empty envelope.
    pub fn respond_status(self, status: u16) {
        self.push(Ok(Response::new(status, ParsedBody::default())));
    }

    /// Fail the request as if no response could be obtained.
    pub fn return_err(self, message: impl Into<String>) {
        self.push(Err(message.into()));
    }

    fn push(self, response: std::result::Result<Response, String>) {
        let mut exps = self.expectations.lock().unwrap();
        exps.push_back(Expectation {
            method: self.method,
            path: self.path,
            response,
        });
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, method: Method, path: &str, params: &Params) -> Result<Response> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            path: path.to_string(),
            params: params.clone(),
        });

        let expectation = self.expectations.lock().unwrap().pop_front();
        match expectation {
            Some(exp) if exp.method == method && exp.path == path => {
                exp.response.map_err(OrmError::Transport)
            }
            Some(exp) => panic!(
                "Unexpected request {} {}, expected {} {}",
                method, path, exp.method, exp.path
            ),
            None => panic!("Unexpected request {} {}: no expectations left", method, path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_transport_with_expectations() {
        let mut mock = MockTransport::new();
        mock.expect(Method::Get, "users/1")
            .respond(200, json!({ "data": { "id": 1 } }));
        mock.expect(Method::Delete, "users/1").respond_status(204);

        let transport = mock.transport();
        let response = transport.request(Method::Get, "users/1", &Params::new()).await.unwrap();
        assert!(response.is_success());
        assert_eq!(response.body.data, json!({ "id": 1 }));

        let mut params = Params::new();
        params.insert("force".to_string(), json!(true));
        let response = transport.request(Method::Delete, "users/1", &params).await.unwrap();
        assert_eq!(response.status, 204);

        let requests = mock.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].params["force"], json!(true));
        mock.verify();
    }

    #[tokio::test]
    async fn test_mock_transport_error() {
        let mut mock = MockTransport::new();
        mock.expect(Method::Get, "users").return_err("connection refused");

        let result = mock.transport().request(Method::Get, "users", &Params::new()).await;
        assert!(matches!(result, Err(OrmError::Transport(msg)) if msg == "connection refused"));
    }

    #[test]
    #[should_panic(expected = "Not all expectations were met")]
    fn test_verify_panics_on_leftovers() {
        let mut mock = MockTransport::new();
        mock.expect(Method::Get, "users").respond_status(200);
        mock.verify();
    }
}

//! # HTTP Transport
//!
//! A [`Transport`] over a blocking `ureq` agent. Each request runs on tokio's blocking pool so
//! the caller just awaits one round trip.
//!
//! Bodies are JSON for `POST`/`PUT`/`PATCH`. For `GET`/`DELETE` the params are flattened into a
//! bracketed query string (`filter[name]=x&page[number]=2`). Error statuses come back as
//! ordinary responses; only network and decoding failures are `Err`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::framework::error::{OrmError, Result};
use crate::framework::transport::{Method, Params, ParsedBody, Response, Transport};

const CONTENT_TYPE: &str = "application/vnd.api+json";

fn default_timeout_secs() -> u64 {
    30
}

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// e.g. `https://api.example.com/v1`
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            headers: BTreeMap::new(),
        }
    }
}

/// Blocking HTTP client behind the async [`Transport`] seam.
#[derive(Clone)]
pub struct HttpTransport {
    config: HttpConfig,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .http_status_as_error(false)
            .build();
        let agent = ureq::Agent::new_with_config(agent_config);
        Self { config, agent }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Flatten nested params into bracketed query pairs.
pub fn query_pairs(params: &Params) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        flatten_into(key.clone(), value, &mut pairs);
    }
    pairs
}

fn flatten_into(key: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (sub, v) in map {
                flatten_into(format!("{key}[{sub}]"), v, pairs);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_into(format!("{key}[]"), item, pairs);
            }
        }
        Value::Null => pairs.push((key, String::new())),
        Value::String(s) => pairs.push((key, s.clone())),
        other => pairs.push((key, other.to_string())),
    }
}

fn call(
    agent: &ureq::Agent,
    headers: &BTreeMap<String, String>,
    method: Method,
    url: &str,
    params: &Params,
) -> Result<Response> {
    let result = if method.has_body() {
        let body = serde_json::to_vec(&Value::Object(params.clone()))
            .map_err(|e| OrmError::Transport(format!("failed to serialize request: {e}")))?;
        let mut request = match method {
            Method::Post => agent.post(url),
            Method::Put => agent.put(url),
            _ => agent.patch(url),
        };
        request = request.header("Content-Type", CONTENT_TYPE);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request.send(&body[..])
    } else {
        let mut request = match method {
            Method::Delete => agent.delete(url),
            _ => agent.get(url),
        };
        request = request.header("Accept", CONTENT_TYPE);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        for (key, value) in query_pairs(params) {
            request = request.query(key, value);
        }
        request.call()
    };

    let mut response = result.map_err(|e| OrmError::Transport(e.to_string()))?;
    let status = response.status().as_u16();
    let text = response
        .body_mut()
        .read_to_string()
        .map_err(|e| OrmError::Transport(format!("failed to read response: {e}")))?;

    let document = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text)
            .map_err(|e| OrmError::Transport(format!("invalid JSON response: {e}")))?
    };

    Ok(Response::new(status, ParsedBody::from_value(document)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: Method, path: &str, params: &Params) -> Result<Response> {
        let agent = self.agent.clone();
        let headers = self.config.headers.clone();
        let url = self.url(path);
        let params = params.clone();
        debug!(%method, %url, "HTTP request");

        tokio::task::spawn_blocking(move || call(&agent, &headers, method, &url, &params))
            .await
            .map_err(|e| OrmError::Transport(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_pairs_brackets_nested_keys() {
        let params = json!({
            "approved": 1,
            "page": { "number": 2, "size": 20 },
            "ids": [3, 4],
            "name": "Lindsay"
        });
        let Value::Object(params) = params else { unreachable!() };

        let pairs = query_pairs(&params);
        assert!(pairs.contains(&("approved".to_string(), "1".to_string())));
        assert!(pairs.contains(&("page[number]".to_string(), "2".to_string())));
        assert!(pairs.contains(&("page[size]".to_string(), "20".to_string())));
        assert!(pairs.contains(&("ids[]".to_string(), "3".to_string())));
        assert!(pairs.contains(&("name".to_string(), "Lindsay".to_string())));
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let transport = HttpTransport::new(HttpConfig::new("https://api.example.com/v1/"));
        assert_eq!(transport.url("users/1"), "https://api.example.com/v1/users/1");
        assert_eq!(transport.url("/users"), "https://api.example.com/v1/users");
    }

    #[test]
    fn test_config_defaults() {
        let config: HttpConfig =
            serde_json::from_value(json!({ "base_url": "https://api.example.com" })).unwrap();
        assert_eq!(config.timeout_secs, 30);
        assert!(config.headers.is_empty());
    }
}

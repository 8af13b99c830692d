//! # Errors
//!
//! Remote outcomes (validation failures, non-2xx statuses, top-level error envelopes) are not
//! errors here: they become inspectable state on the resource plus a `false` result.
//! [`OrmError`] covers the things that can't be expressed that way.

use crate::model::Resource;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OrmError>;

/// A request path template could not be filled in.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("Missing parameter `{parameter}` to build path `{template}`")]
    MissingParameter { template: String, parameter: String },
}

/// Errors raised by the ORM layer itself.
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// A resource type tried to change a fixed wire-format convention, or the type
    /// registry is inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("Unknown resource type: {0}")]
    UnknownType(String),

    #[error("Unknown association `{name}` on {resource_type}")]
    UnknownAssociation { resource_type: String, name: String },

    #[error("Unknown scope `{name}` on {resource_type}")]
    UnknownScope { resource_type: String, name: String },

    /// The transport could not produce a response at all.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Raised by [`Resource::save_strict`] when the save was rejected.
    #[error("Resource invalid: {}", .0.errors())]
    ResourceInvalid(Box<Resource>),

    #[error("Out of range: {0}")]
    Range(String),
}

impl OrmError {
    pub(crate) fn unsupported_option(option: &str) -> Self {
        OrmError::Configuration(format!(
            "JSON:API resources do not support the {option} configuration option"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_error_display() {
        let err = OrmError::from(PathError::MissingParameter {
            template: "users/:user_id/comments".to_string(),
            parameter: "user_id".to_string(),
        });
        let msg = err.to_string();
        assert!(msg.contains("user_id"));
        assert!(msg.contains("users/:user_id/comments"));
    }

    #[test]
    fn test_unsupported_option_is_configuration_error() {
        let err = OrmError::unsupported_option("primary_key");
        assert!(matches!(err, OrmError::Configuration(_)));
        assert!(err.to_string().contains("primary_key"));
    }
}

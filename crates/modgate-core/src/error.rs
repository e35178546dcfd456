//! Error types for modgate

use std::path::PathBuf;

/// Result type alias using modgate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for modgate operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Policy document could not be loaded
    #[error("policy load error: {0}")]
    Load(#[from] LoadError),

    /// Configuration file could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),

    /// Output could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Failure to install a policy document.
///
/// A load either installs the whole document or none of it, so every variant
/// here means the previously active policy set is still in effect.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The document file could not be read
    #[error("failed to read policy document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed YAML/JSON
    #[error("malformed {format} policy document: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },

    /// The document parsed but does not have the expected top-level shape
    #[error("invalid policy document: {0}")]
    InvalidDocument(String),

    /// A mandatory field is absent
    #[error("{context}: missing required field `{field}`")]
    MissingField { context: String, field: String },

    /// A field is present but holds an unusable value
    #[error("{context}: invalid value {value:?} for `{field}`")]
    InvalidValue {
        context: String,
        field: String,
        value: String,
    },

    /// Two policies share an id
    #[error("duplicate policy id `{0}`")]
    DuplicatePolicyId(String),

    /// Two rules share an id within the document
    #[error("duplicate rule id `{0}`")]
    DuplicateRuleId(String),

    /// A rule node has no `type` tag
    #[error("{path}: rule node is missing `type`")]
    MissingRuleType { path: String },

    /// Composite nesting exceeds the supported depth
    #[error("{path}: rule tree deeper than {limit} levels")]
    RuleTooDeep { path: String, limit: usize },
}

impl LoadError {
    /// Create a missing-field error
    pub fn missing(context: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            context: context.into(),
            field: field.into(),
        }
    }

    /// Create an invalid-value error
    pub fn invalid(
        context: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            context: context.into(),
            field: field.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display() {
        let err = LoadError::missing("policy `p1`", "action");
        assert_eq!(err.to_string(), "policy `p1`: missing required field `action`");

        let err = LoadError::invalid("policy `p1`", "risk", "EXTREME");
        assert!(err.to_string().contains("\"EXTREME\""));
    }

    #[test]
    fn test_load_error_converts_into_error() {
        let err: Error = LoadError::DuplicatePolicyId("p1".to_string()).into();
        assert!(matches!(err, Error::Load(LoadError::DuplicatePolicyId(_))));
        assert_eq!(err.to_string(), "policy load error: duplicate policy id `p1`");
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::config("failed to parse modgate.yaml: bad indent");
        assert_eq!(
            err.to_string(),
            "configuration error: failed to parse modgate.yaml: bad indent"
        );
    }
}

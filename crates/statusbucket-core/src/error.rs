//! Error types for statusbucket-core.
//!
//! [`TranslateError`] covers malformed events; every variant is permanent, so
//! callers route the event to their dead-letter path instead of retrying.
//! [`ConfigError`] covers loading and validating the bucket policy.

use thiserror::Error;

/// Result type alias for translation.
pub type Result<T> = std::result::Result<T, TranslateError>;

/// Why an event could not be turned into an update operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    /// The identifying field is absent.
    #[error("cannot build the update operation: event has no `{field}` attribute")]
    MissingField { field: String },

    /// The identifying field is present but has the wrong JSON type.
    #[error("cannot build the update operation: `{field}` must be {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    /// The message carried no value document.
    #[error("cannot build the update operation: the value document is missing")]
    MissingValueDocument,

    /// A timestamp field is absent, non-numeric or out of range.
    #[error("malformed timestamp in `{field}`: {reason}")]
    MalformedTimestamp { field: String, reason: String },
}

impl TranslateError {
    /// Always `false`: a malformed event stays malformed.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// The offending field, if the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field }
            | Self::InvalidField { field, .. }
            | Self::MalformedTimestamp { field, .. } => Some(field),
            Self::MissingValueDocument => None,
        }
    }
}

/// Configuration loading / validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The configuration parsed but violates a policy constraint.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

//! Error types for fagri-access
//!
//! `AccessError` is the crate-level error returned by stores and the
//! CLI. `FlowError` is the recoverable rejection a registration or sign-in flow
//! records when a transition is refused; the flow stays usable afterwards.

use crate::auth::AccountRole;
use crate::identity::KeyFormatError;

/// Main error type for fagri-access operations
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid identity key: {0}")]
    InvalidKey(#[from] KeyFormatError),
}

impl From<std::io::Error> for AccessError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AccessError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {}", err))
    }
}

/// Result type alias for fagri-access operations
pub type Result<T> = std::result::Result<T, AccessError>;

/// A refused flow transition.
///
/// Every variant is recoverable: the flow keeps the data already entered and
/// stays at (or returns to) the step the caller must retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// Required input missing or not acceptable. `fields` names the offending
    /// inputs so the caller can show the message next to them.
    #[error("{message}")]
    Validation {
        fields: Vec<String>,
        message: String,
    },

    /// Candidate identity key failed structural validation.
    #[error("Invalid identity key format: {reason}")]
    InvalidKeyFormat {
        candidate: String,
        reason: KeyFormatError,
    },

    /// Well-formed key that was never registered.
    #[error("No account is registered for identity key {0}")]
    UnknownAccount(String),

    /// Registered key signing in under a role it does not hold.
    #[error("Identity key {key} is registered as {registered}, not {selected}")]
    RoleMismatch {
        key: String,
        registered: AccountRole,
        selected: AccountRole,
    },

    /// Operation called at the wrong step.
    #[error("Step {actual} cannot perform this operation (expected {expected})")]
    OutOfOrder {
        expected: &'static str,
        actual: &'static str,
    },

    /// The account store rejected the request.
    #[error("Account store error: {0}")]
    Store(String),
}

impl FlowError {
    pub fn missing_fields(fields: Vec<String>) -> Self {
        let message = format!("Missing required fields: {}", fields.join(", "));
        Self::Validation { fields, message }
    }

    pub fn invalid_role(tag: &str) -> Self {
        Self::Validation {
            fields: vec!["role".to_string()],
            message: format!("Role '{}' is not available here", tag),
        }
    }

    /// Whether this is a field-level validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Whether this is a key format rejection.
    pub fn is_invalid_key_format(&self) -> bool {
        matches!(self, Self::InvalidKeyFormat { .. })
    }
}

impl From<AccessError> for FlowError {
    fn from(err: AccessError) -> Self {
        Self::Store(err.to_string())
    }
}

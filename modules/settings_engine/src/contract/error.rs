//! Contract error types for the settings engine
//!
//! Backend write failures are not errors: they are reported inside
//! [`OperationResult`](super::model::OperationResult). These variants cover the
//! cases that abort an apply request.

use super::model::InputKind;

/// Settings engine errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Empty or malformed request
    #[error("Validation error: {message}")]
    Validation {
        /// Validation error message
        message: String,
    },

    /// Setting id not present in the catalog
    #[error("Setting not found: {id}")]
    NotFound {
        /// Setting identifier
        id: String,
    },

    /// A required prerequisite could not be enabled during an explicit enable
    #[error("Cannot enable '{setting_id}': prerequisite '{required_id}' could not be satisfied: {reason}")]
    DependencyUnsatisfiable {
        setting_id: String,
        required_id: String,
        reason: String,
    },

    /// Named backend operations failed
    #[error("Operations failed for '{setting_id}': {}", .failures.join("; "))]
    OperationFailure {
        setting_id: String,
        failures: Vec<String>,
    },

    /// The caller cancelled the request
    #[error("Operation cancelled")]
    Cancelled,

    /// The request asked for something the setting's input kind cannot do
    #[error("Setting '{setting_id}' ({input_kind}) does not support {detail}")]
    NotSupported {
        setting_id: String,
        input_kind: InputKind,
        detail: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

//! Error taxonomy for lifecycle operations

use std::time::Duration;

use thiserror::Error;

use crate::flatten::PathError;

/// Errors that can occur while driving a resource lifecycle
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Network or connection failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP status outside the caller's allow-list
    #[error("Unexpected status {code}: {body}")]
    UnexpectedStatus { code: u16, body: String },

    /// Response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Malformed path expression
    #[error(transparent)]
    Path(#[from] PathError),

    /// Remote status reached a declared failure state
    #[error("{resource} reached failure status '{status}' after {elapsed:?}")]
    PollFailure {
        resource: String,
        status: String,
        elapsed: Duration,
    },

    /// Deadline exceeded while the remote object was still pending
    #[error(
        "Timed out after {elapsed:?} waiting for {resource} (last status: {})",
        last_status.as_deref().unwrap_or("unknown")
    )]
    PollTimeout {
        resource: String,
        last_status: Option<String>,
        elapsed: Duration,
    },

    /// Prepaid order identifier never materialized
    #[error("No order ID appeared for {resource} within {elapsed:?}")]
    OrderNeverAppeared { resource: String, elapsed: Duration },

    /// Billing collaborator failure
    #[error("Billing error: {0}")]
    Billing(String),

    /// A response lacked the identifier the lifecycle needs to continue
    #[error("Missing identifier at '{path}' in {context} response")]
    MissingIdentifier { path: String, context: String },

    /// The remote object no longer exists
    #[error("{resource} no longer exists")]
    ResourceGone { resource: String },

    /// A path template still contains a placeholder after substitution
    #[error("Unresolved placeholder '{{{placeholder}}}' in path '{template}'")]
    UnresolvedPlaceholder {
        template: String,
        placeholder: String,
    },

    /// Poll specification violates its invariants
    #[error("Invalid poll specification: {0}")]
    InvalidPollSpec(String),

    /// Resource configuration is invalid for its kind
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Changed attributes cannot be updated in place
    #[error("Changing {} requires replacing the resource", attributes.join(", "))]
    RequiresReplacement { attributes: Vec<String> },

    /// Changed attributes have no update operation
    #[error("No update operation for {}", attributes.join(", "))]
    NotUpdatable { attributes: Vec<String> },
}

impl LifecycleError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create a billing error
    pub fn billing(message: impl Into<String>) -> Self {
        Self::Billing(message.into())
    }

    /// Whether the error is a timeout (poll or order)
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LifecycleError::PollTimeout { .. } | LifecycleError::OrderNeverAppeared { .. }
        )
    }
}

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

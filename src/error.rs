//! Error types for the Stratoform planning engine.
//!
//! This module provides a comprehensive error hierarchy for all stages of the
//! provisioning lifecycle: module loading, graph construction, state
//! management, provider calls, and plan execution.

use std::path::PathBuf;
use thiserror::Error;

use crate::module::ResourceKey;

/// The main error type for the Stratoform planning engine.
#[derive(Debug, Error)]
pub enum StratoformError {
    /// Module definition errors.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Dependency graph errors.
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// State management errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Provider API errors.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Plan execution errors.
    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Module definition errors.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module file was not found.
    #[error("Module file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The module file could not be parsed.
    #[error("Failed to parse module: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Input binding failed. Every violated constraint is listed.
    #[error("Invalid inputs ({} violation(s)):\n  {}", violations.len(), violations.join("\n  "))]
    InvalidInput {
        /// All violated constraints, not just the first.
        violations: Vec<String>,
    },

    /// Validation failed.
    #[error("Module validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// An output references a resource that never applied.
    #[error("Output '{output}' references '{target}' which has no state record")]
    UnresolvedOutput {
        /// Name of the output.
        output: String,
        /// Referenced resource key.
        target: ResourceKey,
    },
}

/// Dependency graph errors. These are structural: they abort the run before
/// any provider call is made.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A (type, name) pair was defined more than once.
    #[error("Duplicate resource: {key}")]
    DuplicateResource {
        /// The duplicated resource key.
        key: ResourceKey,
    },

    /// The reference edges form a cycle.
    #[error("Cyclic dependency detected: {cycle}")]
    CyclicDependency {
        /// The cycle, rendered as `a -> b -> a`.
        cycle: String,
    },

    /// A resource references a key that is not in the graph.
    #[error("Resource {from} references unknown resource {to}")]
    UnknownReference {
        /// The referencing resource.
        from: ResourceKey,
        /// The missing target.
        to: ResourceKey,
    },

    /// A resource references itself.
    #[error("Resource {key} references itself")]
    SelfReference {
        /// The offending resource.
        key: ResourceKey,
    },
}

/// State management errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Backend storage error (filesystem or S3).
    #[error("State backend error: {message}")]
    Backend {
        /// Description of the backend error.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Provider API errors. These wrap the raw cause together with enough
/// context to identify the failing call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication failed.
    #[error("Provider authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Provider request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("Provider rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Remote resource not found.
    #[error("Resource not found: {id}")]
    ResourceNotFound {
        /// Provider-assigned identifier of the missing resource.
        id: String,
    },

    /// Network error.
    #[error("Network error communicating with provider: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid response from provider: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Plan execution errors.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// A single resource failed to apply.
    #[error("Failed to apply {key}: {reason}")]
    ResourceFailed {
        /// Key of the failing resource.
        key: ResourceKey,
        /// Reason for failure.
        reason: String,
    },

    /// A resource was never attempted because a dependency failed.
    #[error("Resource {key} blocked by failed dependency {blocked_on}")]
    BlockedDependency {
        /// Key of the blocked resource.
        key: ResourceKey,
        /// The failed dependency it waits on.
        blocked_on: ResourceKey,
    },

    /// The run finished with failures or blocked resources.
    #[error("Apply incomplete: {failed} failed, {blocked} blocked")]
    Incomplete {
        /// Number of failed resources.
        failed: usize,
        /// Number of blocked resources.
        blocked: usize,
    },

    /// The run was aborted before execution.
    #[error("Apply aborted: {reason}")]
    Aborted {
        /// Reason for abort.
        reason: String,
    },
}

/// Result type alias for Stratoform operations.
pub type Result<T> = std::result::Result<T, StratoformError>;

impl StratoformError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable at the provider level.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Provider(
                ProviderError::RateLimited { .. } | ProviderError::NetworkError { .. }
            ) | Self::State(StateError::LockFailed { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Provider(ProviderError::RateLimited { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            Self::Provider(ProviderError::NetworkError { .. }) => Some(5),
            Self::State(StateError::LockFailed { .. }) => Some(2),
            _ => None,
        }
    }
}

impl ModuleError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl StateError {
    /// Creates a backend error with the given message.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ProviderError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}

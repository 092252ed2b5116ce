//! Error types for provider containers

use crate::lifecycle::TeardownFailure;
use crate::token::ProviderToken;
use thiserror::Error;

/// Result type alias for container operations
pub type DiResult<T> = Result<T, DiError>;

/// Errors that can occur while resolving providers
#[derive(Error, Debug)]
pub enum DiError {
    /// Token is neither declared locally, imported nor global
    #[error("Provider {token} is not visible in {container}")]
    UnresolvedToken {
        token: ProviderToken,
        container: String,
    },

    /// Resolution revisited a token already on the resolution stack
    #[error("Circular dependency detected: {}", .path.join(" -> "))]
    CircularDependency {
        /// Tokens on the cycle, first and last entries are the same provider
        path: Vec<String>,
    },

    /// A constructor, factory or init hook failed
    #[error("Failed to construct provider {token}: {source}")]
    ProviderConstruction {
        token: ProviderToken,
        #[source]
        source: anyhow::Error,
    },

    /// Instance exists but is not of the requested type
    #[error("Provider {token} is not a {expected}")]
    TypeMismatch {
        token: ProviderToken,
        expected: &'static str,
    },

    /// Two definitions share a token inside one container
    #[error("Duplicate provider {token} in {container}")]
    DuplicateProvider {
        token: ProviderToken,
        container: String,
    },

    /// The container was disposed, or an exporting container is gone
    #[error("Container {container} has been disposed")]
    Disposed { container: String },
}

impl DiError {
    /// Check whether this error reports an invisible token
    pub fn is_unresolved(&self) -> bool {
        matches!(self, DiError::UnresolvedToken { .. })
    }
}

/// Teardown failures collected by [`Container::dispose`](crate::Container::dispose)
#[derive(Error, Debug)]
#[error("{} teardown hook(s) failed in {container}", .failures.len())]
pub struct DisposeError {
    /// Container that was disposed
    pub container: String,
    /// Tokens released cleanly, in teardown order
    pub released: Vec<ProviderToken>,
    /// Hooks that returned an error, in teardown order
    pub failures: Vec<TeardownFailure>,
}

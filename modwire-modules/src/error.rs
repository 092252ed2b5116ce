//! Module system error types

use modwire_di::{DiError, DisposeError, ProviderToken};
use thiserror::Error;

/// Type alias for module system results
pub type Result<T> = std::result::Result<T, ModuleError>;

/// Errors that can occur while building or running a module graph
#[derive(Error, Debug)]
pub enum ModuleError {
    /// Module reference was never registered
    #[error("Module not found: {module}")]
    NotFound {
        /// The unknown reference
        module: String,
    },

    /// Module reference was registered twice
    #[error("Module already registered: {module}")]
    Immutable {
        /// The reference that was registered again
        module: String,
    },

    /// Module imports form a cycle
    #[error("Circular import detected: {}", .cycle.join(" -> "))]
    CircularImport {
        /// Module names on the cycle, first and last entries are the same module
        cycle: Vec<String>,
    },

    /// A dynamic module factory failed
    #[error("Dynamic module {module} failed: {source}")]
    ModuleFactory {
        /// Name of the dynamic module
        module: String,
        /// Error returned by the factory
        #[source]
        source: anyhow::Error,
    },

    /// A provider or controller depends on a token its module cannot see
    #[error("{dependent} in {module} depends on {token}, which is not visible")]
    UnresolvedToken {
        /// The invisible token
        token: ProviderToken,
        /// Module declaring the dependent provider
        module: String,
        /// Provider or controller declaring the dependency
        dependent: ProviderToken,
    },

    /// An export names something the module cannot re-export
    #[error("{module} cannot export {export}: {reason}")]
    InvalidExport {
        /// Exporting module
        module: String,
        /// The offending export entry
        export: String,
        /// Why the export was rejected
        reason: String,
    },

    /// Build configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Teardown hooks failed while closing an application
    #[error("{} container(s) failed to dispose", .0.len())]
    Dispose(Vec<DisposeError>),

    /// Provider resolution error
    #[error(transparent)]
    Di(#[from] DiError),
}

impl ModuleError {
    /// Check whether this error reports an invisible provider token,
    /// whether it was caught while building or while resolving
    pub fn is_unresolved_token(&self) -> bool {
        match self {
            ModuleError::UnresolvedToken { .. } => true,
            ModuleError::Di(err) => err.is_unresolved(),
            _ => false,
        }
    }
}

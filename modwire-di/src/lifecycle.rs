//! Provider lifecycle management

use crate::token::ProviderToken;
use std::fmt;

/// Trait for providers that want init and teardown callbacks.
///
/// Hooks are wired per definition through
/// [`ProviderDefinition::with_lifecycle`](crate::ProviderDefinition::with_lifecycle).
pub trait Lifecycle {
    /// Called once the instance is constructed, before it is cached
    fn on_module_init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when the owning container is disposed
    fn on_module_destroy(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A teardown hook that returned an error
pub struct TeardownFailure {
    pub token: ProviderToken,
    pub error: anyhow::Error,
}

impl fmt::Debug for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeardownFailure")
            .field("token", &self.token)
            .field("error", &format_args!("{:#}", self.error))
            .finish()
    }
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.token, self.error)
    }
}

/// Outcome of a clean dispose
#[derive(Debug, Default)]
pub struct DisposeReport {
    /// Tokens released, in teardown order
    pub released: Vec<ProviderToken>,
}

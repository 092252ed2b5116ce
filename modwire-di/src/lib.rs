//! Provider containers for modwire
//!
//! This crate provides the per-module half of the runtime: provider tokens,
//! provider definitions with their construction strategies, and the
//! [`Container`] that resolves and caches singletons, detects dependency
//! cycles and tears instances down in reverse construction order.
//!
//! Module composition (imports, exports, global modules and dynamic modules)
//! lives in `modwire-modules`, which wires containers together through
//! [`Container::link`].

pub mod builder;
pub mod container;
pub mod error;
pub mod lifecycle;
pub mod provider;
pub mod service;
pub mod token;

pub use builder::ContainerBuilder;
pub use container::{Container, LinkOrigin, ResolutionStack};
pub use error::{DiError, DiResult, DisposeError};
pub use lifecycle::{DisposeReport, Lifecycle, TeardownFailure};
pub use provider::{
    Dependencies, Dependency, ProviderDefinition, ProviderScope, ProviderStrategy,
};
pub use service::{instance, Instance, Service};
pub use token::ProviderToken;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        Container, ContainerBuilder, Dependencies, DiError, DiResult, Instance, Lifecycle,
        ProviderDefinition, ProviderScope, ProviderToken, Service,
    };
}

//! Modwire module system
//!
//! This crate composes provider containers into an application:
//! - Module definitions and the metadata registry
//! - Dynamic modules produced by async factories
//! - Graph building with shared nodes and import cycle detection
//! - Export-based visibility and the global provider overlay
//! - Application bootstrap and ordered teardown

pub mod application;
pub mod config;
pub mod definition;
pub mod dynamic;
pub mod error;
pub mod global;
pub mod graph;
pub mod loader;
pub mod registry;
pub mod scope;

pub use application::Application;
pub use config::{BuildConfig, BuildConfigBuilder};
pub use definition::{
    ExportItem, Import, ModuleDefinition, ModuleDefinitionBuilder, ModuleId, ModuleRef,
};
pub use dynamic::{DynamicModule, ModuleFactory};
pub use error::{ModuleError, Result};
pub use global::GlobalRegistry;
pub use graph::{ModuleGraph, ModuleNode};
pub use loader::{LoadedModules, ModuleLoader};
pub use registry::MetadataRegistry;
pub use scope::{ModuleScope, ScopeSet};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        Application, BuildConfig, DynamicModule, MetadataRegistry, ModuleDefinition, ModuleError,
        ModuleRef,
    };
    pub use modwire_di::prelude::*;
}

//! Metadata registry mapping module references to definitions

use crate::definition::{ModuleDefinition, ModuleRef};
use crate::error::{ModuleError, Result};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

/// Write-once store of module definitions.
///
/// Clones share the same underlying map, so a registry can be handed to
/// several builders while definitions are still being added.
#[derive(Clone, Default)]
pub struct MetadataRegistry {
    modules: Arc<RwLock<FxHashMap<ModuleRef, ModuleDefinition>>>,
}

impl MetadataRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its own name
    pub fn register(&self, definition: ModuleDefinition) -> Result<ModuleRef> {
        let module_ref = definition.module_ref();
        self.register_as(module_ref.clone(), definition)?;
        Ok(module_ref)
    }

    /// Register a definition under an explicit reference
    pub fn register_as(&self, module_ref: ModuleRef, definition: ModuleDefinition) -> Result<()> {
        let mut modules = self.modules.write();
        if modules.contains_key(&module_ref) {
            return Err(ModuleError::Immutable {
                module: module_ref.to_string(),
            });
        }

        debug!("Registered module {} ({})", module_ref, definition.id());
        modules.insert(module_ref, definition);
        Ok(())
    }

    /// Look up a definition
    pub fn get(&self, module_ref: &ModuleRef) -> Result<ModuleDefinition> {
        self.modules
            .read()
            .get(module_ref)
            .cloned()
            .ok_or_else(|| ModuleError::NotFound {
                module: module_ref.to_string(),
            })
    }

    pub fn contains(&self, module_ref: &ModuleRef) -> bool {
        self.modules.read().contains_key(module_ref)
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    /// Registered references, sorted
    pub fn refs(&self) -> Vec<ModuleRef> {
        let mut refs: Vec<_> = self.modules.read().keys().cloned().collect();
        refs.sort();
        refs
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("modules", &self.refs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let registry = MetadataRegistry::new();
        let cats = ModuleDefinition::builder("CatsModule").build();

        let module_ref = registry.register(cats.clone()).unwrap();
        assert_eq!(module_ref.as_str(), "CatsModule");
        assert_eq!(registry.get(&module_ref).unwrap(), cats);
        assert!(registry.contains(&"CatsModule".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregistration_is_rejected() {
        let registry = MetadataRegistry::new();
        registry
            .register(ModuleDefinition::builder("CatsModule").build())
            .unwrap();

        let err = registry
            .register(ModuleDefinition::builder("CatsModule").build())
            .unwrap_err();
        assert!(matches!(err, ModuleError::Immutable { module } if module == "CatsModule"));
    }

    #[test]
    fn test_unknown_reference() {
        let registry = MetadataRegistry::new();
        let err = registry.get(&"DogsModule".into()).unwrap_err();
        assert_eq!(err.to_string(), "Module not found: DogsModule");
    }

    #[test]
    fn test_clones_share_entries() {
        let registry = MetadataRegistry::new();
        let shared = registry.clone();
        shared
            .register(ModuleDefinition::builder("ConfigModule").build())
            .unwrap();

        assert_eq!(registry.refs(), vec![ModuleRef::from("ConfigModule")]);
    }
}

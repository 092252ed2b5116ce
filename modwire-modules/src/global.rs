//! Global provider overlay

use crate::definition::ModuleId;
use crate::graph::{ModuleGraph, ModuleNode};
use crate::scope::ScopeSet;
use modwire_di::ProviderToken;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

/// Tokens exported by modules flagged global, visible from every module.
///
/// Filled in a collection pass over the whole graph before any container is
/// wired, then read-only. When two global modules export the same token the
/// first one in topological order keeps it.
#[derive(Debug, Default)]
pub struct GlobalRegistry {
    owners: FxHashMap<ProviderToken, ModuleId>,
    tokens: Vec<ProviderToken>,
    modules: Vec<ModuleId>,
}

impl GlobalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every global module's exports
    pub fn collect(graph: &ModuleGraph, scopes: &ScopeSet) -> Self {
        let mut registry = Self::new();
        for node in graph.nodes().iter().filter(|node| node.is_global()) {
            registry.mark_global(node, scopes.exports_of(node.id()));
        }

        debug!(
            "Collected {} global token(s) from {} module(s)",
            registry.tokens.len(),
            registry.modules.len()
        );
        registry
    }

    /// Publish `exports` of a global module
    pub fn mark_global(&mut self, node: &ModuleNode, exports: &[ProviderToken]) {
        if !self.modules.contains(&node.id()) {
            self.modules.push(node.id());
        }

        for token in exports {
            match self.owners.get(token) {
                Some(owner) if *owner != node.id() => {
                    warn!(
                        "Global token {} exported by {} is already provided by module {}",
                        token,
                        node.name(),
                        owner
                    );
                }
                Some(_) => {}
                None => {
                    self.owners.insert(token.clone(), node.id());
                    self.tokens.push(token.clone());
                }
            }
        }
    }

    pub fn contains(&self, token: &ProviderToken) -> bool {
        self.owners.contains_key(token)
    }

    /// Module providing a global token
    pub fn owner(&self, token: &ProviderToken) -> Option<ModuleId> {
        self.owners.get(token).copied()
    }

    /// Global tokens with their owners, in publication order
    pub fn entries(&self) -> impl Iterator<Item = (&ProviderToken, ModuleId)> {
        self.tokens
            .iter()
            .filter_map(|token| self.owners.get(token).map(|owner| (token, *owner)))
    }

    /// Modules flagged global
    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

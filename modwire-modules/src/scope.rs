//! Module scopes
//!
//! A scope records which provider tokens a module can see: its own
//! providers, whatever its direct imports export, and the global overlay.
//! Exports are not transitive; a token only reaches an importer's importer
//! when the importer re-exports it.

use crate::definition::{ExportItem, ModuleId};
use crate::error::{ModuleError, Result};
use crate::global::GlobalRegistry;
use crate::graph::{ModuleGraph, ModuleNode};
use modwire_di::ProviderToken;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

/// Visibility information for one module
#[derive(Debug, Clone)]
pub struct ModuleScope {
    module: ModuleId,
    name: String,
    local: FxHashSet<ProviderToken>,
    /// Token -> module that exports it, first import wins
    imported: FxHashMap<ProviderToken, ModuleId>,
    imported_order: Vec<ProviderToken>,
    exports: Vec<ProviderToken>,
}

impl ModuleScope {
    fn for_node(node: &ModuleNode, computed: &FxHashMap<ModuleId, ModuleScope>) -> Result<Self> {
        let definition = node.definition();
        let local: FxHashSet<_> = definition
            .providers()
            .iter()
            .map(|provider| provider.token().clone())
            .collect();

        let mut imported = FxHashMap::default();
        let mut imported_order = Vec::new();
        for import in node.imports() {
            let Some(exporter) = computed.get(&import.id()) else {
                continue;
            };
            for token in &exporter.exports {
                if !imported.contains_key(token) {
                    imported.insert(token.clone(), import.id());
                    imported_order.push(token.clone());
                }
            }
        }

        let mut scope = Self {
            module: node.id(),
            name: node.name().to_string(),
            local,
            imported,
            imported_order,
            exports: Vec::new(),
        };

        for item in definition.exports() {
            match item {
                ExportItem::Token(token) => {
                    if !scope.local.contains(token) && !scope.imported.contains_key(token) {
                        return Err(ModuleError::InvalidExport {
                            module: scope.name.clone(),
                            export: item.to_string(),
                            reason: "neither provided locally nor exported by a direct import"
                                .to_string(),
                        });
                    }
                    scope.push_export(token.clone());
                }
                ExportItem::Module(module_ref) => {
                    let exporter = node
                        .imports()
                        .iter()
                        .find(|import| import.name() == module_ref.as_str())
                        .and_then(|import| computed.get(&import.id()))
                        .ok_or_else(|| ModuleError::InvalidExport {
                            module: scope.name.clone(),
                            export: item.to_string(),
                            reason: "not a direct import".to_string(),
                        })?;
                    for token in exporter.exports.clone() {
                        scope.push_export(token);
                    }
                }
            }
        }

        trace!(
            "{}: {} local, {} imported, {} exported",
            scope.name,
            scope.local.len(),
            scope.imported.len(),
            scope.exports.len()
        );
        Ok(scope)
    }

    fn push_export(&mut self, token: ProviderToken) {
        if !self.exports.contains(&token) {
            self.exports.push(token);
        }
    }

    pub fn module(&self) -> ModuleId {
        self.module
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tokens this module makes available to its importers
    pub fn exports(&self) -> &[ProviderToken] {
        &self.exports
    }

    pub fn is_local(&self, token: &ProviderToken) -> bool {
        self.local.contains(token)
    }

    /// Module exporting `token` to this one through a direct import
    pub fn imported_from(&self, token: &ProviderToken) -> Option<ModuleId> {
        self.imported.get(token).copied()
    }

    /// Imported tokens with their exporters, in import order
    pub fn imported(&self) -> impl Iterator<Item = (&ProviderToken, ModuleId)> {
        self.imported_order
            .iter()
            .filter_map(|token| self.imported.get(token).map(|module| (token, *module)))
    }

    /// Check visibility, global overlay included
    pub fn can_see(&self, token: &ProviderToken, globals: &GlobalRegistry) -> bool {
        self.local.contains(token) || self.imported.contains_key(token) || globals.contains(token)
    }
}

/// Scopes for every module of a graph
#[derive(Debug, Default)]
pub struct ScopeSet {
    scopes: FxHashMap<ModuleId, ModuleScope>,
}

impl ScopeSet {
    /// Compute scopes in topological order, so every import's exports are
    /// known before its importer is processed
    pub fn compute(graph: &ModuleGraph) -> Result<Self> {
        let mut scopes = FxHashMap::default();
        for node in graph.nodes() {
            let scope = ModuleScope::for_node(node, &scopes)?;
            scopes.insert(node.id(), scope);
        }
        Ok(Self { scopes })
    }

    pub fn get(&self, module: ModuleId) -> Option<&ModuleScope> {
        self.scopes.get(&module)
    }

    /// Exports of `module`, empty when unknown
    pub fn exports_of(&self, module: ModuleId) -> &[ProviderToken] {
        self.scopes
            .get(&module)
            .map(|scope| scope.exports())
            .unwrap_or(&[])
    }

    /// Check that every required dependency of every provider and controller
    /// is visible from the module declaring it
    pub fn validate(&self, graph: &ModuleGraph, globals: &GlobalRegistry) -> Result<()> {
        for node in graph.nodes() {
            let Some(scope) = self.scopes.get(&node.id()) else {
                continue;
            };
            let definition = node.definition();
            let declared = definition.providers().iter().chain(definition.controllers());
            for provider in declared {
                for dependency in provider.dependencies() {
                    if dependency.optional || scope.can_see(&dependency.token, globals) {
                        continue;
                    }
                    return Err(ModuleError::UnresolvedToken {
                        token: dependency.token.clone(),
                        module: scope.name.clone(),
                        dependent: provider.token().clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

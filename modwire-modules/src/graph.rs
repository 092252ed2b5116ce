//! Module graph construction
//!
//! Turns loaded definitions into a DAG of [`ModuleNode`]s. Each definition
//! becomes exactly one node no matter how many modules import it, and any
//! import cycle is reported with the modules on it.

use crate::definition::{ModuleDefinition, ModuleId};
use crate::error::{ModuleError, Result};
use crate::loader::LoadedModules;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A module instance in the graph
pub struct ModuleNode {
    definition: ModuleDefinition,
    imports: Vec<Arc<ModuleNode>>,
}

impl ModuleNode {
    pub fn id(&self) -> ModuleId {
        self.definition.id()
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn definition(&self) -> &ModuleDefinition {
        &self.definition
    }

    /// Direct imports, in declaration order
    pub fn imports(&self) -> &[Arc<ModuleNode>] {
        &self.imports
    }

    pub fn is_global(&self) -> bool {
        self.definition.is_global()
    }
}

impl fmt::Debug for ModuleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleNode")
            .field("id", &self.id())
            .field("name", &self.name())
            .field(
                "imports",
                &self.imports.iter().map(|node| node.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

enum VisitState {
    Visiting,
    Done(Arc<ModuleNode>),
}

/// Acyclic module graph rooted at the application module
#[derive(Debug)]
pub struct ModuleGraph {
    root: Arc<ModuleNode>,
    /// Topological order, every module after all of its imports
    nodes: Vec<Arc<ModuleNode>>,
    index: FxHashMap<ModuleId, usize>,
}

impl ModuleGraph {
    /// Build the graph from loaded definitions
    pub fn build(loaded: &LoadedModules) -> Result<Self> {
        let mut states = FxHashMap::default();
        let mut path = Vec::new();
        let mut order = Vec::with_capacity(loaded.len());

        let root = Self::visit(loaded.root(), loaded, &mut states, &mut path, &mut order)?;

        let index = order
            .iter()
            .enumerate()
            .map(|(position, node)| (node.id(), position))
            .collect();

        Ok(Self {
            root,
            nodes: order,
            index,
        })
    }

    fn visit(
        id: ModuleId,
        loaded: &LoadedModules,
        states: &mut FxHashMap<ModuleId, VisitState>,
        path: &mut Vec<ModuleId>,
        order: &mut Vec<Arc<ModuleNode>>,
    ) -> Result<Arc<ModuleNode>> {
        match states.get(&id) {
            Some(VisitState::Done(node)) => return Ok(node.clone()),
            Some(VisitState::Visiting) => {
                let start = path.iter().position(|entry| *entry == id).unwrap_or(0);
                let cycle = path[start..]
                    .iter()
                    .chain(std::iter::once(&id))
                    .map(|entry| Self::name_of(loaded, *entry))
                    .collect();
                return Err(ModuleError::CircularImport { cycle });
            }
            None => {}
        }

        let definition = loaded
            .definition(id)
            .cloned()
            .ok_or_else(|| ModuleError::NotFound {
                module: id.to_string(),
            })?;

        states.insert(id, VisitState::Visiting);
        path.push(id);

        let mut imports = Vec::with_capacity(loaded.imports_of(id).len());
        for dependency in loaded.imports_of(id) {
            imports.push(Self::visit(*dependency, loaded, states, path, order)?);
        }

        path.pop();

        trace!("Created node for {} ({})", definition.name(), id);
        let node = Arc::new(ModuleNode {
            definition,
            imports,
        });
        states.insert(id, VisitState::Done(node.clone()));
        order.push(node.clone());
        Ok(node)
    }

    fn name_of(loaded: &LoadedModules, id: ModuleId) -> String {
        loaded
            .definition(id)
            .map(|definition| definition.name().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    pub fn root(&self) -> &Arc<ModuleNode> {
        &self.root
    }

    /// Nodes in topological order
    pub fn nodes(&self) -> &[Arc<ModuleNode>] {
        &self.nodes
    }

    pub fn get(&self, id: ModuleId) -> Option<&Arc<ModuleNode>> {
        self.index.get(&id).map(|position| &self.nodes[*position])
    }

    /// First node, in topological order, with the given name
    pub fn find(&self, name: &str) -> Option<&Arc<ModuleNode>> {
        self.nodes.iter().find(|node| node.name() == name)
    }

    /// Position of a module in the topological order
    pub fn position(&self, id: ModuleId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::loader::ModuleLoader;
    use crate::registry::MetadataRegistry;

    async fn build(root: &ModuleDefinition, registry: &MetadataRegistry) -> Result<ModuleGraph> {
        let config = BuildConfig::default();
        let loaded = ModuleLoader::new(registry, &config).load(root).await?;
        ModuleGraph::build(&loaded)
    }

    #[tokio::test]
    async fn test_topological_order() {
        let c = ModuleDefinition::builder("C").build();
        let b = ModuleDefinition::builder("B").import(&c).build();
        let a = ModuleDefinition::builder("A").import(&b).build();

        let graph = build(&a, &MetadataRegistry::new()).await.unwrap();
        let names: Vec<_> = graph.nodes().iter().map(|node| node.name()).collect();

        // Imports come before their importers
        assert_eq!(names, vec!["C", "B", "A"]);
        assert_eq!(graph.root().name(), "A");
    }

    #[tokio::test]
    async fn test_diamond_shares_node() {
        let shared = ModuleDefinition::builder("SharedModule").build();
        let cats = ModuleDefinition::builder("CatsModule").import(&shared).build();
        let dogs = ModuleDefinition::builder("DogsModule").import(&shared).build();
        let app = ModuleDefinition::builder("AppModule")
            .import(&cats)
            .import(&dogs)
            .build();

        let graph = build(&app, &MetadataRegistry::new()).await.unwrap();
        assert_eq!(graph.len(), 4);

        let via_cats = &graph.find("CatsModule").unwrap().imports()[0];
        let via_dogs = &graph.find("DogsModule").unwrap().imports()[0];
        assert!(Arc::ptr_eq(via_cats, via_dogs));
    }

    #[tokio::test]
    async fn test_circular_import_names_cycle() {
        let registry = MetadataRegistry::new();
        let b = ModuleDefinition::builder("B").import_ref("A").build();
        let a = ModuleDefinition::builder("A").import(&b).build();
        registry.register(a.clone()).unwrap();

        let err = build(&a, &registry).await.unwrap_err();
        match err {
            ModuleError::CircularImport { cycle } => assert_eq!(cycle, vec!["A", "B", "A"]),
            other => panic!("Expected CircularImport, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_self_import_is_a_cycle() {
        let registry = MetadataRegistry::new();
        let looped = ModuleDefinition::builder("Loop").import_ref("Loop").build();
        registry.register(looped.clone()).unwrap();

        let err = build(&looped, &registry).await.unwrap_err();
        assert_eq!(err.to_string(), "Circular import detected: Loop -> Loop");
    }
}

//! Application bootstrap and lifecycle

use crate::config::BuildConfig;
use crate::definition::{ModuleDefinition, ModuleId};
use crate::error::{ModuleError, Result};
use crate::global::GlobalRegistry;
use crate::graph::{ModuleGraph, ModuleNode};
use crate::loader::ModuleLoader;
use crate::registry::MetadataRegistry;
use crate::scope::{ModuleScope, ScopeSet};
use modwire_di::{
    Container, ContainerBuilder, Instance, LinkOrigin, ProviderScope, ProviderToken, Service,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A fully wired module graph.
///
/// Bootstrapping either yields a complete application or an error; partially
/// built graphs are never handed out.
#[derive(Debug)]
pub struct Application {
    graph: ModuleGraph,
    scopes: ScopeSet,
    globals: GlobalRegistry,
    containers: FxHashMap<ModuleId, Arc<Container>>,
    root: Arc<Container>,
    /// Modules ordered so that each comes after everything it can depend on
    lifecycle: Vec<ModuleId>,
    closed: AtomicBool,
}

impl Application {
    /// Bootstrap with an empty registry and default configuration
    pub async fn bootstrap(root: &ModuleDefinition) -> Result<Self> {
        Self::bootstrap_with(root, &MetadataRegistry::new(), BuildConfig::default()).await
    }

    /// Load, validate and wire every module reachable from `root`
    pub async fn bootstrap_with(
        root: &ModuleDefinition,
        registry: &MetadataRegistry,
        config: BuildConfig,
    ) -> Result<Self> {
        config.validate()?;
        info!("Bootstrapping {}", root.name());

        let loaded = ModuleLoader::new(registry, &config).load(root).await?;
        let graph = ModuleGraph::build(&loaded)?;
        let scopes = ScopeSet::compute(&graph)?;
        let globals = GlobalRegistry::collect(&graph, &scopes);
        scopes.validate(&graph, &globals)?;

        let containers = Self::wire(&graph, &scopes, &globals)?;
        let root_container = containers
            .get(&graph.root().id())
            .cloned()
            .ok_or_else(|| ModuleError::NotFound {
                module: root.name().to_string(),
            })?;
        let lifecycle = Self::lifecycle_order(&graph, &globals);

        let app = Self {
            graph,
            scopes,
            globals,
            containers,
            root: root_container,
            lifecycle,
            closed: AtomicBool::new(false),
        };

        if config.eager {
            if let Err(error) = app.instantiate() {
                warn!("Bootstrapping {} failed: {}", root.name(), error);
                if let Err(dispose) = app.close() {
                    warn!("Cleanup after failed bootstrap: {}", dispose);
                }
                return Err(error);
            }
        }

        info!(
            "{} ready: {} module(s), {} global token(s)",
            root.name(),
            app.graph.len(),
            app.globals.len()
        );
        Ok(app)
    }

    fn wire(
        graph: &ModuleGraph,
        scopes: &ScopeSet,
        globals: &GlobalRegistry,
    ) -> Result<FxHashMap<ModuleId, Arc<Container>>> {
        let mut containers: FxHashMap<ModuleId, Arc<Container>> = FxHashMap::default();

        // Imports precede importers in topological order
        for node in graph.nodes() {
            let definition = node.definition();
            let container = ContainerBuilder::new(node.name())
                .register_all(definition.providers().iter().cloned())
                .register_all(definition.controllers().iter().cloned())
                .build()?;

            if let Some(scope) = scopes.get(node.id()) {
                for (token, exporter) in scope.imported() {
                    if let Some(exporter) = containers.get(&exporter) {
                        container.link(token.clone(), exporter, LinkOrigin::Import);
                    }
                }
            }

            containers.insert(node.id(), container);
        }

        for node in graph.nodes() {
            let Some(container) = containers.get(&node.id()) else {
                continue;
            };
            for (token, owner) in globals.entries() {
                if let Some(exporter) = containers.get(&owner) {
                    container.link(token.clone(), exporter, LinkOrigin::Global);
                }
            }
        }

        debug!("Wired {} container(s)", containers.len());
        Ok(containers)
    }

    /// Post-order over imports plus every global module
    fn lifecycle_order(graph: &ModuleGraph, globals: &GlobalRegistry) -> Vec<ModuleId> {
        fn visit(
            node: &ModuleNode,
            graph: &ModuleGraph,
            globals: &GlobalRegistry,
            seen: &mut FxHashSet<ModuleId>,
            order: &mut Vec<ModuleId>,
        ) {
            if !seen.insert(node.id()) {
                return;
            }
            for import in node.imports() {
                visit(import, graph, globals, seen, order);
            }
            for module in globals.modules() {
                if let Some(global) = graph.get(*module) {
                    visit(global, graph, globals, seen, order);
                }
            }
            order.push(node.id());
        }

        let mut seen = FxHashSet::default();
        let mut order = Vec::with_capacity(graph.len());
        for node in graph.nodes() {
            visit(node, graph, globals, &mut seen, &mut order);
        }
        order
    }

    /// Construct every singleton provider and controller
    fn instantiate(&self) -> Result<()> {
        for module in &self.lifecycle {
            let (Some(node), Some(container)) = (self.graph.get(*module), self.containers.get(module))
            else {
                continue;
            };
            let definition = node.definition();
            for provider in definition.providers().iter().chain(definition.controllers()) {
                if provider.provider_scope() == ProviderScope::Singleton {
                    container.resolve(provider.token())?;
                }
            }
            debug!("{}: {} instance(s) ready", node.name(), container.instantiated());
        }
        Ok(())
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub fn globals(&self) -> &GlobalRegistry {
        &self.globals
    }

    pub fn scope(&self, module: ModuleId) -> Option<&ModuleScope> {
        self.scopes.get(module)
    }

    /// Container of the root module
    pub fn root(&self) -> &Arc<Container> {
        &self.root
    }

    pub fn container(&self, module: ModuleId) -> Option<&Arc<Container>> {
        self.containers.get(&module)
    }

    /// Container of the first module with the given name
    pub fn module(&self, name: &str) -> Result<&Arc<Container>> {
        self.graph
            .find(name)
            .and_then(|node| self.containers.get(&node.id()))
            .ok_or_else(|| ModuleError::NotFound {
                module: name.to_string(),
            })
    }

    /// Resolve a token from the root module
    pub fn resolve(&self, token: impl Into<ProviderToken>) -> Result<Instance> {
        Ok(self.root.resolve(&token.into())?)
    }

    /// Resolve a token from the root module and downcast it
    pub fn get<T: Service>(&self, token: impl Into<ProviderToken>) -> Result<Arc<T>> {
        Ok(self.root.get::<T>(&token.into())?)
    }

    pub fn get_type<T: Service>(&self) -> Result<Arc<T>> {
        Ok(self.root.get_type::<T>()?)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Tear down every module, dependents before their dependencies.
    ///
    /// All containers are disposed even when some teardown hooks fail; the
    /// failures are returned together. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut failures = Vec::new();
        let mut released = 0usize;
        for module in self.lifecycle.iter().rev() {
            let Some(container) = self.containers.get(module) else {
                continue;
            };
            match container.dispose() {
                Ok(report) => released += report.released.len(),
                Err(error) => {
                    released += error.released.len();
                    failures.push(error);
                }
            }
        }

        info!(
            "Closed {}: released {} instance(s), {} container(s) with failures",
            self.graph.root().name(),
            released,
            failures.len()
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ModuleError::Dispose(failures))
        }
    }
}

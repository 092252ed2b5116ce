//! Module loading: walks imports, looks up references and runs dynamic
//! module factories until every import is backed by a definition.

use crate::config::BuildConfig;
use crate::definition::{Import, ModuleDefinition, ModuleId};
use crate::dynamic::DynamicModule;
use crate::error::{ModuleError, Result};
use crate::registry::MetadataRegistry;
use futures::stream::{self, StreamExt, TryStreamExt};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Every definition reachable from a root, with imports resolved to ids
#[derive(Debug)]
pub struct LoadedModules {
    pub(crate) root: ModuleId,
    pub(crate) modules: FxHashMap<ModuleId, ModuleDefinition>,
    /// Direct imports per module, in declaration order
    pub(crate) edges: FxHashMap<ModuleId, Vec<ModuleId>>,
}

impl LoadedModules {
    pub fn root(&self) -> ModuleId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn definition(&self, id: ModuleId) -> Option<&ModuleDefinition> {
        self.modules.get(&id)
    }

    pub fn imports_of(&self, id: ModuleId) -> &[ModuleId] {
        self.edges.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Module loader responsible for turning a root definition into the full set
/// of definitions it depends on
pub struct ModuleLoader<'a> {
    registry: &'a MetadataRegistry,
    config: &'a BuildConfig,
}

impl<'a> ModuleLoader<'a> {
    pub fn new(registry: &'a MetadataRegistry, config: &'a BuildConfig) -> Self {
        Self { registry, config }
    }

    /// Load everything reachable from `root`.
    ///
    /// Static and registered imports are followed directly. Dynamic imports
    /// discovered in the same pass form a wave whose factories run
    /// concurrently; their results are walked in turn, which may discover the
    /// next wave. The first factory failure aborts the load.
    pub async fn load(&self, root: &ModuleDefinition) -> Result<LoadedModules> {
        let mut modules = FxHashMap::default();
        let mut resolved: FxHashMap<u64, ModuleId> = FxHashMap::default();
        let mut queue = VecDeque::new();

        modules.insert(root.id(), root.clone());
        queue.push_back(root.clone());

        let mut waves = 0usize;
        loop {
            let mut wave = Vec::new();
            let mut queued = FxHashSet::default();

            while let Some(definition) = queue.pop_front() {
                trace!("Walking imports of {}", definition.name());
                for import in definition.imports() {
                    match import {
                        Import::Static(imported) => {
                            Self::enqueue(imported.clone(), &mut modules, &mut queue);
                        }
                        Import::Ref(module_ref) => {
                            let imported = self.registry.get(module_ref)?;
                            Self::enqueue(imported, &mut modules, &mut queue);
                        }
                        Import::Dynamic(dynamic) => {
                            if !resolved.contains_key(&dynamic.key()) && queued.insert(dynamic.key())
                            {
                                wave.push(dynamic.clone());
                            }
                        }
                    }
                }
            }

            if wave.is_empty() {
                break;
            }

            waves += 1;
            debug!("Running {} dynamic module factories (wave {})", wave.len(), waves);
            for (dynamic, definition) in self.run_wave(wave).await? {
                resolved.insert(dynamic.key(), definition.id());
                Self::enqueue(definition, &mut modules, &mut queue);
            }
        }

        let mut edges = FxHashMap::default();
        for (id, definition) in &modules {
            let imports = definition
                .imports()
                .iter()
                .map(|import| match import {
                    Import::Static(imported) => Ok(imported.id()),
                    Import::Ref(module_ref) => Ok(self.registry.get(module_ref)?.id()),
                    Import::Dynamic(dynamic) => {
                        resolved
                            .get(&dynamic.key())
                            .copied()
                            .ok_or_else(|| ModuleError::ModuleFactory {
                                module: dynamic.name().to_string(),
                                source: anyhow::anyhow!("factory result missing after load"),
                            })
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            edges.insert(*id, imports);
        }

        debug!(
            "Loaded {} module(s) from {} in {} dynamic wave(s)",
            modules.len(),
            root.name(),
            waves
        );

        Ok(LoadedModules {
            root: root.id(),
            modules,
            edges,
        })
    }

    fn enqueue(
        definition: ModuleDefinition,
        modules: &mut FxHashMap<ModuleId, ModuleDefinition>,
        queue: &mut VecDeque<ModuleDefinition>,
    ) {
        if !modules.contains_key(&definition.id()) {
            modules.insert(definition.id(), definition.clone());
            queue.push_back(definition);
        }
    }

    async fn run_wave(
        &self,
        wave: Vec<DynamicModule>,
    ) -> Result<Vec<(DynamicModule, ModuleDefinition)>> {
        let timeout = self.config.factory_timeout();
        let limit = self.config.factory_concurrency.max(1);

        stream::iter(wave)
            .map(|dynamic| async move {
                let outcome = match timeout {
                    Some(duration) => match tokio::time::timeout(duration, dynamic.create()).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(anyhow::anyhow!("factory timed out after {:?}", duration)),
                    },
                    None => dynamic.create().await,
                };

                match outcome {
                    Ok(definition) => {
                        trace!("{} produced {}", dynamic.name(), definition.name());
                        Ok((dynamic, definition))
                    }
                    Err(source) => {
                        warn!("Dynamic module {} failed: {:#}", dynamic.name(), source);
                        Err(ModuleError::ModuleFactory {
                            module: dynamic.name().to_string(),
                            source,
                        })
                    }
                }
            })
            .buffer_unordered(limit)
            .try_collect()
            .await
    }
}

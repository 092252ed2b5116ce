//! Core container implementation

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

use crate::builder::ContainerBuilder;
use crate::error::{DiError, DiResult, DisposeError};
use crate::lifecycle::{DisposeReport, TeardownFailure};
use crate::provider::{Dependencies, ProviderDefinition, ProviderScope, ProviderStrategy};
use crate::service::{Instance, Service};
use crate::token::ProviderToken;

static NEXT_CONTAINER: AtomicU64 = AtomicU64::new(1);

/// Where a linked token comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOrigin {
    /// Exported by a directly imported module
    Import,
    /// Exported by a module flagged global
    Global,
}

#[derive(Clone)]
struct Link {
    exporter: Weak<Container>,
    exporter_name: Arc<str>,
    origin: LinkOrigin,
}

/// One entry of the resolution stack
struct Frame {
    container: u64,
    token: ProviderToken,
}

/// Tokens currently being constructed on this thread, across containers
#[derive(Default)]
pub struct ResolutionStack {
    frames: Vec<Frame>,
}

impl ResolutionStack {
    fn position(&self, container: u64, token: &ProviderToken) -> Option<usize> {
        self.frames
            .iter()
            .position(|frame| frame.container == container && &frame.token == token)
    }

    fn cycle_from(&self, start: usize, token: &ProviderToken) -> Vec<String> {
        self.frames[start..]
            .iter()
            .map(|frame| frame.token.to_string())
            .chain(std::iter::once(token.to_string()))
            .collect()
    }
}

/// Singleton scope for one module.
///
/// Locally declared providers are constructed here and cached at most once
/// per token. Tokens linked from other containers are delegated to the
/// container that exports them, so every importer shares one instance.
pub struct Container {
    id: u64,
    name: Arc<str>,
    providers: FxHashMap<ProviderToken, ProviderDefinition>,
    slots: RwLock<FxHashMap<ProviderToken, Arc<OnceCell<Instance>>>>,
    links: RwLock<FxHashMap<ProviderToken, Link>>,
    created: Mutex<Vec<ProviderToken>>,
    disposed: AtomicBool,
}

impl Container {
    /// Create a new container builder
    pub fn builder(name: impl Into<Arc<str>>) -> ContainerBuilder {
        ContainerBuilder::new(name)
    }

    pub(crate) fn new(
        name: Arc<str>,
        providers: FxHashMap<ProviderToken, ProviderDefinition>,
    ) -> Self {
        let slots = providers
            .iter()
            .filter(|(_, def)| def.provider_scope() == ProviderScope::Singleton)
            .map(|(token, _)| (token.clone(), Arc::new(OnceCell::new())))
            .collect();

        Self {
            id: NEXT_CONTAINER.fetch_add(1, Ordering::Relaxed),
            name,
            providers,
            slots: RwLock::new(slots),
            links: RwLock::new(FxHashMap::default()),
            created: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locally declared tokens
    pub fn local_tokens(&self) -> impl Iterator<Item = &ProviderToken> {
        self.providers.keys()
    }

    /// Locally declared definition for `token`
    pub fn definition(&self, token: &ProviderToken) -> Option<&ProviderDefinition> {
        self.providers.get(token)
    }

    /// Check whether `token` is declared locally or linked
    pub fn is_visible(&self, token: &ProviderToken) -> bool {
        self.providers.contains_key(token) || self.links.read().contains_key(token)
    }

    /// Origin of a linked token, `None` for local or invisible tokens
    pub fn link_origin(&self, token: &ProviderToken) -> Option<LinkOrigin> {
        self.links.read().get(token).map(|link| link.origin)
    }

    /// Make `token` resolvable through `exporter`.
    ///
    /// Used while the module graph is being wired. Local definitions always
    /// win, an import link replaces a global one, and the first link of a
    /// given origin is kept.
    pub fn link(&self, token: ProviderToken, exporter: &Arc<Container>, origin: LinkOrigin) {
        if exporter.id == self.id || self.providers.contains_key(&token) {
            return;
        }

        let mut links = self.links.write();
        if let Some(existing) = links.get(&token) {
            let upgrade = existing.origin == LinkOrigin::Global && origin == LinkOrigin::Import;
            if !upgrade {
                trace!(
                    "{}: keeping {} from {}, ignoring {}",
                    self.name,
                    token,
                    existing.exporter_name,
                    exporter.name
                );
                return;
            }
        }

        links.insert(
            token,
            Link {
                exporter: Arc::downgrade(exporter),
                exporter_name: exporter.name.clone(),
                origin,
            },
        );
    }

    /// Number of singletons constructed so far
    pub fn instantiated(&self) -> usize {
        self.created.lock().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Resolve a provider instance
    pub fn resolve(&self, token: &ProviderToken) -> DiResult<Instance> {
        let mut stack = ResolutionStack::default();
        self.resolve_in(token, &mut stack)
    }

    /// Resolve a provider and downcast it to `T`
    pub fn get<T: Service>(&self, token: &ProviderToken) -> DiResult<Arc<T>> {
        self.resolve(token)?
            .downcast_arc::<T>()
            .map_err(|_| DiError::TypeMismatch {
                token: token.clone(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Resolve the provider registered under `ProviderToken::of::<T>()`
    pub fn get_type<T: Service>(&self) -> DiResult<Arc<T>> {
        self.get(&ProviderToken::of::<T>())
    }

    /// Resolve `token` as part of an ongoing resolution
    pub fn resolve_in(&self, token: &ProviderToken, stack: &mut ResolutionStack) -> DiResult<Instance> {
        if self.is_disposed() {
            return Err(DiError::Disposed {
                container: self.name.to_string(),
            });
        }

        if let Some(definition) = self.providers.get(token) {
            return self.resolve_local(definition, stack);
        }

        let link = self.links.read().get(token).cloned();
        match link {
            Some(link) => match link.exporter.upgrade() {
                Some(exporter) => exporter.resolve_in(token, stack),
                None => Err(DiError::Disposed {
                    container: link.exporter_name.to_string(),
                }),
            },
            None => Err(DiError::UnresolvedToken {
                token: token.clone(),
                container: self.name.to_string(),
            }),
        }
    }

    fn resolve_local(
        &self,
        definition: &ProviderDefinition,
        stack: &mut ResolutionStack,
    ) -> DiResult<Instance> {
        let token = definition.token();

        if definition.provider_scope() == ProviderScope::Transient {
            self.check_cycle(token, stack)?;
            let entries = self.resolve_dependencies(definition, stack)?;
            return self.construct(definition, entries);
        }

        let slot = self.slots.read().get(token).cloned().ok_or_else(|| DiError::Disposed {
            container: self.name.to_string(),
        })?;
        if let Some(instance) = slot.get() {
            return Ok(instance.clone());
        }

        self.check_cycle(token, stack)?;

        // No cell is held while dependencies resolve, so threads entering a
        // cycle from opposite ends each see it on their own stack
        let entries = self.resolve_dependencies(definition, stack)?;

        let mut constructed = false;
        let instance = slot
            .get_or_try_init(|| {
                constructed = true;
                self.construct(definition, entries)
            })?
            .clone();

        if constructed {
            let mut created = self.created.lock();
            if self.is_disposed() {
                drop(created);
                self.release_detached(definition, &instance);
                return Err(DiError::Disposed {
                    container: self.name.to_string(),
                });
            }
            created.push(token.clone());
            trace!("{}: instantiated {}", self.name, token);
        }

        Ok(instance)
    }

    fn check_cycle(&self, token: &ProviderToken, stack: &ResolutionStack) -> DiResult<()> {
        match stack.position(self.id, token) {
            Some(start) => Err(DiError::CircularDependency {
                path: stack.cycle_from(start, token),
            }),
            None => Ok(()),
        }
    }

    fn resolve_dependencies(
        &self,
        definition: &ProviderDefinition,
        stack: &mut ResolutionStack,
    ) -> DiResult<Vec<(ProviderToken, Option<Instance>)>> {
        stack.frames.push(Frame {
            container: self.id,
            token: definition.token().clone(),
        });
        let result = self.resolve_dependencies_inner(definition, stack);
        stack.frames.pop();
        result
    }

    fn resolve_dependencies_inner(
        &self,
        definition: &ProviderDefinition,
        stack: &mut ResolutionStack,
    ) -> DiResult<Vec<(ProviderToken, Option<Instance>)>> {
        let mut entries = Vec::with_capacity(definition.dependencies().len());
        for dependency in definition.dependencies() {
            if dependency.optional && !self.is_visible(&dependency.token) {
                entries.push((dependency.token.clone(), None));
                continue;
            }
            let instance = self.resolve_in(&dependency.token, stack)?;
            entries.push((dependency.token.clone(), Some(instance)));
        }
        Ok(entries)
    }

    fn construct(
        &self,
        definition: &ProviderDefinition,
        entries: Vec<(ProviderToken, Option<Instance>)>,
    ) -> DiResult<Instance> {
        let token = definition.token();

        let instance = match definition.strategy() {
            ProviderStrategy::Class { construct, .. } | ProviderStrategy::Factory { construct } => {
                let dependencies = Dependencies::new(&self.name, entries);
                construct(&dependencies).map_err(|source| DiError::ProviderConstruction {
                    token: token.clone(),
                    source,
                })?
            }
            ProviderStrategy::Value(value) => value.clone(),
            ProviderStrategy::Existing(target) => entries
                .into_iter()
                .find(|(declared, _)| declared == target)
                .and_then(|(_, instance)| instance)
                .ok_or_else(|| DiError::UnresolvedToken {
                    token: target.clone(),
                    container: self.name.to_string(),
                })?,
        };

        if let Some(hook) = definition.init_hook() {
            hook(&instance).map_err(|source| DiError::ProviderConstruction {
                token: token.clone(),
                source,
            })?;
        }

        Ok(instance)
    }

    /// Tear down a singleton that finished constructing after `dispose`
    fn release_detached(&self, definition: &ProviderDefinition, instance: &Instance) {
        if let Some(hook) = definition.destroy_hook() {
            if let Err(error) = hook(instance) {
                warn!(
                    "{}: teardown of {} failed: {:#}",
                    self.name,
                    definition.token(),
                    error
                );
            }
        }
        debug!("{}: released {} constructed during dispose", self.name, definition.token());
    }

    /// Release every instantiated singleton.
    ///
    /// Teardown hooks run in reverse construction order. A failing hook does
    /// not stop the others; all failures are returned together. Disposing
    /// twice is a no-op.
    pub fn dispose(&self) -> Result<DisposeReport, DisposeError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(DisposeReport::default());
        }

        let created = std::mem::take(&mut *self.created.lock());
        let slots = std::mem::take(&mut *self.slots.write());
        self.links.write().clear();

        let mut released = Vec::with_capacity(created.len());
        let mut failures = Vec::new();

        for token in created.into_iter().rev() {
            let instance = slots.get(&token).and_then(|slot| slot.get()).cloned();
            let hook = self.providers.get(&token).and_then(|def| def.destroy_hook());

            match (instance, hook) {
                (Some(instance), Some(hook)) => match hook(&instance) {
                    Ok(()) => released.push(token),
                    Err(error) => {
                        warn!("{}: teardown of {} failed: {:#}", self.name, token, error);
                        failures.push(TeardownFailure { token, error });
                    }
                },
                _ => released.push(token),
            }
        }

        debug!(
            "{}: disposed {} provider(s), {} failure(s)",
            self.name,
            released.len() + failures.len(),
            failures.len()
        );

        if failures.is_empty() {
            Ok(DisposeReport { released })
        } else {
            Err(DisposeError {
                container: self.name.to_string(),
                released,
                failures,
            })
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("name", &self.name)
            .field("providers", &self.providers.len())
            .field("links", &self.links.read().len())
            .field("instantiated", &self.instantiated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Clock;

    #[test]
    fn test_link_prefers_local_and_imports() {
        let local = Container::builder("Local")
            .register(ProviderDefinition::value("shared", 1u32))
            .build()
            .unwrap();
        let imported = Container::builder("Imported")
            .register(ProviderDefinition::value("shared", 2u32))
            .register(ProviderDefinition::value("clock", Clock))
            .build()
            .unwrap();
        let global = Container::builder("Global")
            .register(ProviderDefinition::value("clock", Clock))
            .build()
            .unwrap();

        local.link("shared".into(), &imported, LinkOrigin::Import);
        local.link("clock".into(), &global, LinkOrigin::Global);
        local.link("clock".into(), &imported, LinkOrigin::Import);

        assert_eq!(*local.get::<u32>(&"shared".into()).unwrap(), 1);
        assert_eq!(local.link_origin(&"clock".into()), Some(LinkOrigin::Import));
        assert_eq!(local.link_origin(&"shared".into()), None);
    }

    #[test]
    fn test_self_link_is_ignored() {
        let container = Container::builder("Solo").build().unwrap();
        container.link("missing".into(), &container, LinkOrigin::Global);
        assert!(!container.is_visible(&"missing".into()));
    }
}

//! Provider definitions and construction strategies

use crate::error::{DiError, DiResult};
use crate::lifecycle::Lifecycle;
use crate::service::{Instance, Service};
use crate::token::ProviderToken;
use std::fmt;
use std::sync::Arc;

/// Constructor or factory closure, called with resolved dependencies
pub type ConstructFn = Arc<dyn Fn(&Dependencies) -> anyhow::Result<Instance> + Send + Sync>;

/// Init or teardown hook
pub type HookFn = Arc<dyn Fn(&Instance) -> anyhow::Result<()> + Send + Sync>;

/// How a provider instance is produced
#[derive(Clone)]
pub enum ProviderStrategy {
    /// Direct construction of a concrete type
    Class {
        type_name: &'static str,
        construct: ConstructFn,
    },
    /// Factory closure with declared dependency tokens
    Factory { construct: ConstructFn },
    /// Static value
    Value(Instance),
    /// Alias resolving to the instance behind another token
    Existing(ProviderToken),
}

impl fmt::Debug for ProviderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderStrategy::Class { type_name, .. } => write!(f, "Class({})", type_name),
            ProviderStrategy::Factory { .. } => write!(f, "Factory"),
            ProviderStrategy::Value(_) => write!(f, "Value"),
            ProviderStrategy::Existing(target) => write!(f, "Existing({})", target),
        }
    }
}

/// Instance caching policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderScope {
    /// One instance per container, cached on first resolve
    #[default]
    Singleton,
    /// A new instance on every resolve, never cached or torn down
    Transient,
}

/// A declared dependency of a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub token: ProviderToken,
    /// Optional dependencies resolve to `None` when not visible
    pub optional: bool,
}

/// Token plus construction strategy, owned by the module that declares it
#[derive(Clone)]
pub struct ProviderDefinition {
    token: ProviderToken,
    strategy: ProviderStrategy,
    dependencies: Vec<Dependency>,
    scope: ProviderScope,
    on_init: Option<HookFn>,
    on_destroy: Option<HookFn>,
}

impl ProviderDefinition {
    fn new(token: ProviderToken, strategy: ProviderStrategy) -> Self {
        Self {
            token,
            strategy,
            dependencies: Vec::new(),
            scope: ProviderScope::Singleton,
            on_init: None,
            on_destroy: None,
        }
    }

    /// Provider for type `T`, registered under `ProviderToken::of::<T>()`
    pub fn class<T, F>(construct: F) -> Self
    where
        T: Service,
        F: Fn(&Dependencies) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::new(
            ProviderToken::of::<T>(),
            ProviderStrategy::Class {
                type_name: std::any::type_name::<T>(),
                construct: Arc::new(move |deps| Ok(Arc::new(construct(deps)?) as Instance)),
            },
        )
    }

    /// Provider built by a factory closure under an arbitrary token
    pub fn factory<T, F>(token: impl Into<ProviderToken>, construct: F) -> Self
    where
        T: Service,
        F: Fn(&Dependencies) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self::new(
            token.into(),
            ProviderStrategy::Factory {
                construct: Arc::new(move |deps| Ok(Arc::new(construct(deps)?) as Instance)),
            },
        )
    }

    /// Provider wrapping a ready-made value
    pub fn value<T: Service>(token: impl Into<ProviderToken>, value: T) -> Self {
        Self::new(token.into(), ProviderStrategy::Value(Arc::new(value)))
    }

    /// Provider wrapping an already type-erased instance
    pub fn instance(token: impl Into<ProviderToken>, instance: Instance) -> Self {
        Self::new(token.into(), ProviderStrategy::Value(instance))
    }

    /// Alias for another token; both resolve to the same instance
    pub fn existing(token: impl Into<ProviderToken>, target: impl Into<ProviderToken>) -> Self {
        let target = target.into();
        let mut definition = Self::new(token.into(), ProviderStrategy::Existing(target.clone()));
        definition.dependencies.push(Dependency {
            token: target,
            optional: false,
        });
        definition
    }

    /// Declare a required dependency
    pub fn inject(mut self, token: impl Into<ProviderToken>) -> Self {
        self.dependencies.push(Dependency {
            token: token.into(),
            optional: false,
        });
        self
    }

    /// Declare a dependency that may be absent
    pub fn inject_optional(mut self, token: impl Into<ProviderToken>) -> Self {
        self.dependencies.push(Dependency {
            token: token.into(),
            optional: true,
        });
        self
    }

    /// Set the caching scope
    pub fn scope(mut self, scope: ProviderScope) -> Self {
        self.scope = scope;
        self
    }

    /// Shorthand for `scope(ProviderScope::Transient)`
    pub fn transient(self) -> Self {
        self.scope(ProviderScope::Transient)
    }

    /// Run `hook` right after construction
    pub fn on_init<T, F>(mut self, hook: F) -> Self
    where
        T: Service,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_init = Some(typed_hook(hook));
        self
    }

    /// Run `hook` when the owning container is disposed
    pub fn on_destroy<T, F>(mut self, hook: F) -> Self
    where
        T: Service,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_destroy = Some(typed_hook(hook));
        self
    }

    /// Wire both hooks from a [`Lifecycle`] implementation
    pub fn with_lifecycle<T: Service + Lifecycle>(self) -> Self {
        self.on_init(|instance: &T| instance.on_module_init())
            .on_destroy(|instance: &T| instance.on_module_destroy())
    }

    pub fn token(&self) -> &ProviderToken {
        &self.token
    }

    pub fn strategy(&self) -> &ProviderStrategy {
        &self.strategy
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn provider_scope(&self) -> ProviderScope {
        self.scope
    }

    pub(crate) fn init_hook(&self) -> Option<&HookFn> {
        self.on_init.as_ref()
    }

    pub(crate) fn destroy_hook(&self) -> Option<&HookFn> {
        self.on_destroy.as_ref()
    }
}

impl fmt::Debug for ProviderDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDefinition")
            .field("token", &self.token)
            .field("strategy", &self.strategy)
            .field("dependencies", &self.dependencies)
            .field("scope", &self.scope)
            .finish()
    }
}

fn typed_hook<T, F>(hook: F) -> HookFn
where
    T: Service,
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance| match instance.downcast_ref::<T>() {
        Some(typed) => hook(typed),
        None => anyhow::bail!("hook expects {}", std::any::type_name::<T>()),
    })
}

/// Dependencies resolved for one construction, in declaration order
pub struct Dependencies {
    container: String,
    entries: Vec<(ProviderToken, Option<Instance>)>,
}

impl Dependencies {
    pub(crate) fn new(container: &str, entries: Vec<(ProviderToken, Option<Instance>)>) -> Self {
        Self {
            container: container.to_string(),
            entries,
        }
    }

    /// Typed access to a declared dependency
    pub fn get<T: Service>(&self, token: &ProviderToken) -> DiResult<Arc<T>> {
        self.optional(token)?
            .ok_or_else(|| DiError::UnresolvedToken {
                token: token.clone(),
                container: self.container.clone(),
            })
    }

    /// Typed access to a dependency declared under `ProviderToken::of::<T>()`
    pub fn get_type<T: Service>(&self) -> DiResult<Arc<T>> {
        self.get(&ProviderToken::of::<T>())
    }

    /// Typed access to a dependency that may be absent
    pub fn optional<T: Service>(&self, token: &ProviderToken) -> DiResult<Option<Arc<T>>> {
        let entry = self
            .entries
            .iter()
            .find(|(declared, _)| declared == token)
            .ok_or_else(|| DiError::UnresolvedToken {
                token: token.clone(),
                container: self.container.clone(),
            })?;

        match &entry.1 {
            Some(instance) => instance
                .clone()
                .downcast_arc::<T>()
                .map(Some)
                .map_err(|_| DiError::TypeMismatch {
                    token: token.clone(),
                    expected: std::any::type_name::<T>(),
                }),
            None => Ok(None),
        }
    }

    /// Untyped access by declaration position
    pub fn at(&self, index: usize) -> Option<&Instance> {
        self.entries.get(index).and_then(|(_, instance)| instance.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

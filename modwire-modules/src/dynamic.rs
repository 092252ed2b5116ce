//! Dynamic modules
//!
//! A dynamic module is a placeholder in an `imports` list whose definition is
//! produced by an async factory while the graph is being built. The factory
//! usually closes over configuration (`forRoot`-style modules).

use crate::definition::ModuleDefinition;
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_DYNAMIC: AtomicU64 = AtomicU64::new(1);

/// Produces a module definition when the graph is built
#[async_trait]
pub trait ModuleFactory: Send + Sync {
    async fn create(&self) -> anyhow::Result<ModuleDefinition>;
}

struct ConfiguredFactory<C, F> {
    config: C,
    factory: F,
}

#[async_trait]
impl<C, F, Fut> ModuleFactory for ConfiguredFactory<C, F>
where
    C: Clone + Send + Sync + 'static,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ModuleDefinition>> + Send + 'static,
{
    async fn create(&self) -> anyhow::Result<ModuleDefinition> {
        (self.factory)(self.config.clone()).await
    }
}

/// Dynamic import resolved once per graph build.
///
/// Clones share identity: importing the same `DynamicModule` from several
/// modules runs the factory once and yields one graph node.
#[derive(Clone)]
pub struct DynamicModule {
    id: u64,
    name: Arc<str>,
    factory: Arc<dyn ModuleFactory>,
}

impl DynamicModule {
    /// Wrap an existing factory
    pub fn from_factory(name: impl Into<Arc<str>>, factory: impl ModuleFactory + 'static) -> Self {
        Self {
            id: NEXT_DYNAMIC.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// Async factory over a configuration value
    pub fn new<C, F, Fut>(name: impl Into<Arc<str>>, config: C, factory: F) -> Self
    where
        C: Clone + Send + Sync + 'static,
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ModuleDefinition>> + Send + 'static,
    {
        Self::from_factory(name, ConfiguredFactory { config, factory })
    }

    /// Synchronous factory over a configuration value
    pub fn sync<C, F>(name: impl Into<Arc<str>>, config: C, factory: F) -> Self
    where
        C: Clone + Send + Sync + 'static,
        F: Fn(C) -> anyhow::Result<ModuleDefinition> + Send + Sync + 'static,
    {
        Self::new(name, config, move |config| std::future::ready(factory(config)))
    }

    /// Factory whose configuration is deserialized from JSON on each build
    pub fn from_json<C, F, Fut>(
        name: impl Into<Arc<str>>,
        config: serde_json::Value,
        factory: F,
    ) -> Self
    where
        C: DeserializeOwned + Send + 'static,
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ModuleDefinition>> + Send + 'static,
    {
        let name: Arc<str> = name.into();
        let label = name.clone();
        let factory = Arc::new(factory);
        Self::new(name, config, move |value: serde_json::Value| {
            let factory = factory.clone();
            let label = label.clone();
            async move {
                let config = serde_json::from_value::<C>(value)
                    .with_context(|| format!("invalid configuration for {}", label))?;
                factory(config).await
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn key(&self) -> u64 {
        self.id
    }

    /// Run the factory
    pub async fn create(&self) -> anyhow::Result<ModuleDefinition> {
        self.factory.create().await
    }
}

impl fmt::Debug for DynamicModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicModule")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

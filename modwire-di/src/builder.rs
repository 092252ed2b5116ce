//! Container builder for fluent configuration

use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::provider::ProviderDefinition;
use crate::service::Service;
use crate::token::ProviderToken;

/// Builder for constructing a standalone container
pub struct ContainerBuilder {
    name: Arc<str>,
    providers: Vec<ProviderDefinition>,
}

impl ContainerBuilder {
    /// Create a new container builder
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            providers: Vec::new(),
        }
    }

    /// Register a provider definition
    pub fn register(mut self, definition: ProviderDefinition) -> Self {
        self.providers.push(definition);
        self
    }

    /// Register several provider definitions
    pub fn register_all(mut self, definitions: impl IntoIterator<Item = ProviderDefinition>) -> Self {
        self.providers.extend(definitions);
        self
    }

    /// Register a static value
    pub fn register_value<T: Service>(self, token: impl Into<ProviderToken>, value: T) -> Self {
        self.register(ProviderDefinition::value(token, value))
    }

    /// Add services using a configuration function
    pub fn configure<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut Vec<ProviderDefinition>),
    {
        configure(&mut self.providers);
        self
    }

    /// Build the container, rejecting duplicate tokens
    pub fn build(self) -> DiResult<Arc<Container>> {
        let mut providers = FxHashMap::default();
        for definition in self.providers {
            let token = definition.token().clone();
            if providers.contains_key(&token) {
                return Err(DiError::DuplicateProvider {
                    token,
                    container: self.name.to_string(),
                });
            }
            providers.insert(token, definition);
        }

        Ok(Arc::new(Container::new(self.name, providers)))
    }
}

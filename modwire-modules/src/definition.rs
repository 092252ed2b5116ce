//! Module definitions
//!
//! A [`ModuleDefinition`] is the explicit form of what a decorator-driven
//! framework would read from class metadata: imports, providers, controllers,
//! exports and a global flag. Definitions are immutable once built and are
//! identified by their [`ModuleId`], so the same definition imported from
//! several places always maps to a single graph node.

use crate::dynamic::DynamicModule;
use modwire_di::{ProviderDefinition, ProviderToken};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_MODULE: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a built definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(u64);

impl ModuleId {
    fn next() -> Self {
        ModuleId(NEXT_MODULE.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name under which a definition is registered in the metadata registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleRef(Arc<str>);

impl ModuleRef {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        ModuleRef(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleRef {
    fn from(name: &str) -> Self {
        ModuleRef::new(name)
    }
}

impl From<String> for ModuleRef {
    fn from(name: String) -> Self {
        ModuleRef::new(name)
    }
}

/// One entry of a module's `imports`
#[derive(Clone)]
pub enum Import {
    /// A definition held directly
    Static(ModuleDefinition),
    /// A registered definition, looked up when the graph is built
    Ref(ModuleRef),
    /// A definition produced by a factory when the graph is built
    Dynamic(DynamicModule),
}

impl fmt::Debug for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Import::Static(definition) => write!(f, "Static({})", definition.name()),
            Import::Ref(module_ref) => write!(f, "Ref({})", module_ref),
            Import::Dynamic(dynamic) => write!(f, "Dynamic({})", dynamic.name()),
        }
    }
}

impl From<ModuleDefinition> for Import {
    fn from(definition: ModuleDefinition) -> Self {
        Import::Static(definition)
    }
}

impl From<&ModuleDefinition> for Import {
    fn from(definition: &ModuleDefinition) -> Self {
        Import::Static(definition.clone())
    }
}

impl From<ModuleRef> for Import {
    fn from(module_ref: ModuleRef) -> Self {
        Import::Ref(module_ref)
    }
}

impl From<DynamicModule> for Import {
    fn from(dynamic: DynamicModule) -> Self {
        Import::Dynamic(dynamic)
    }
}

impl From<&DynamicModule> for Import {
    fn from(dynamic: &DynamicModule) -> Self {
        Import::Dynamic(dynamic.clone())
    }
}

/// One entry of a module's `exports`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportItem {
    /// A provider token declared locally or exported by a direct import
    Token(ProviderToken),
    /// Every token exported by the named direct import
    Module(ModuleRef),
}

impl fmt::Display for ExportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportItem::Token(token) => write!(f, "{}", token),
            ExportItem::Module(module_ref) => write!(f, "module {}", module_ref),
        }
    }
}

struct DefinitionInner {
    id: ModuleId,
    name: Arc<str>,
    imports: Vec<Import>,
    providers: Vec<ProviderDefinition>,
    controllers: Vec<ProviderDefinition>,
    exports: Vec<ExportItem>,
    global: bool,
}

/// Immutable module shape, cheap to clone
#[derive(Clone)]
pub struct ModuleDefinition {
    inner: Arc<DefinitionInner>,
}

impl ModuleDefinition {
    /// Start building a definition
    pub fn builder(name: impl Into<Arc<str>>) -> ModuleDefinitionBuilder {
        ModuleDefinitionBuilder {
            name: name.into(),
            imports: Vec::new(),
            providers: Vec::new(),
            controllers: Vec::new(),
            exports: Vec::new(),
            global: false,
        }
    }

    pub fn id(&self) -> ModuleId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Reference under which this definition registers itself
    pub fn module_ref(&self) -> ModuleRef {
        ModuleRef(self.inner.name.clone())
    }

    pub fn imports(&self) -> &[Import] {
        &self.inner.imports
    }

    pub fn providers(&self) -> &[ProviderDefinition] {
        &self.inner.providers
    }

    pub fn controllers(&self) -> &[ProviderDefinition] {
        &self.inner.controllers
    }

    pub fn exports(&self) -> &[ExportItem] {
        &self.inner.exports
    }

    pub fn is_global(&self) -> bool {
        self.inner.global
    }

    /// Check whether a provider with `token` is declared in this module
    pub fn declares(&self, token: &ProviderToken) -> bool {
        self.inner.providers.iter().any(|p| p.token() == token)
    }
}

impl PartialEq for ModuleDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ModuleDefinition {}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("imports", &self.inner.imports)
            .field(
                "providers",
                &self.inner.providers.iter().map(|p| p.token()).collect::<Vec<_>>(),
            )
            .field(
                "controllers",
                &self.inner.controllers.iter().map(|c| c.token()).collect::<Vec<_>>(),
            )
            .field("exports", &self.inner.exports)
            .field("global", &self.inner.global)
            .finish()
    }
}

/// Builder for [`ModuleDefinition`]
pub struct ModuleDefinitionBuilder {
    name: Arc<str>,
    imports: Vec<Import>,
    providers: Vec<ProviderDefinition>,
    controllers: Vec<ProviderDefinition>,
    exports: Vec<ExportItem>,
    global: bool,
}

impl ModuleDefinitionBuilder {
    /// Import a definition, a registered reference or a dynamic module
    pub fn import(mut self, import: impl Into<Import>) -> Self {
        self.imports.push(import.into());
        self
    }

    /// Import a module registered under `name`
    pub fn import_ref(self, name: impl Into<ModuleRef>) -> Self {
        self.import(Import::Ref(name.into()))
    }

    pub fn provider(mut self, provider: ProviderDefinition) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = ProviderDefinition>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Controllers are instantiated with the module but never exported
    pub fn controller(mut self, controller: ProviderDefinition) -> Self {
        self.controllers.push(controller);
        self
    }

    /// Export a provider token
    pub fn export(mut self, token: impl Into<ProviderToken>) -> Self {
        self.exports.push(ExportItem::Token(token.into()));
        self
    }

    /// Re-export everything a direct import exports
    pub fn export_module(mut self, module: impl Into<ModuleRef>) -> Self {
        self.exports.push(ExportItem::Module(module.into()));
        self
    }

    /// Make exported tokens visible to every module in the graph
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn build(self) -> ModuleDefinition {
        ModuleDefinition {
            inner: Arc::new(DefinitionInner {
                id: ModuleId::next(),
                name: self.name,
                imports: self.imports,
                providers: self.providers,
                controllers: self.controllers,
                exports: self.exports,
                global: self.global,
            }),
        }
    }
}

//! Provider tokens

use std::any::TypeId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SYMBOL: AtomicU64 = AtomicU64::new(1);

/// Identifier naming a provider inside a container.
///
/// Three flavours exist, mirroring what application code usually reaches for:
/// a plain string, a unique symbol and a type ("class reference").
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ProviderToken {
    /// String name, equal to any other token with the same name
    Name(Arc<str>),
    /// Unique symbol, only equal to clones of itself
    Symbol { id: u64, description: Arc<str> },
    /// Type token
    Type { id: TypeId, name: &'static str },
}

impl ProviderToken {
    /// Create a string token
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        ProviderToken::Name(name.into())
    }

    /// Create a fresh symbol; two calls never return equal tokens
    pub fn symbol(description: impl Into<Arc<str>>) -> Self {
        ProviderToken::Symbol {
            id: NEXT_SYMBOL.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    /// Token for type `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        ProviderToken::Type {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Human-readable label, without quoting
    pub fn label(&self) -> &str {
        match self {
            ProviderToken::Name(name) => name,
            ProviderToken::Symbol { description, .. } => description,
            ProviderToken::Type { name, .. } => short_type_name(name),
        }
    }
}

/// Strip module paths from a type name, keeping generics readable enough
fn short_type_name(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name);
    match base.rfind("::") {
        Some(idx) => &name[idx + 2..],
        None => name,
    }
}

impl fmt::Display for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderToken::Name(name) => write!(f, "\"{}\"", name),
            ProviderToken::Symbol { description, .. } => write!(f, "Symbol({})", description),
            ProviderToken::Type { name, .. } => write!(f, "{}", short_type_name(name)),
        }
    }
}

impl fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderToken::Symbol { id, description } => {
                write!(f, "Symbol({}#{})", description, id)
            }
            _ => fmt::Display::fmt(self, f),
        }
    }
}

impl From<&str> for ProviderToken {
    fn from(name: &str) -> Self {
        ProviderToken::named(name)
    }
}

impl From<String> for ProviderToken {
    fn from(name: String) -> Self {
        ProviderToken::named(name)
    }
}

impl From<&ProviderToken> for ProviderToken {
    fn from(token: &ProviderToken) -> Self {
        token.clone()
    }
}

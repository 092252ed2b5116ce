//! Provider instances

use downcast_rs::{impl_downcast, DowncastSync};
use std::sync::Arc;

/// Trait that every provider instance implements
pub trait Service: DowncastSync {}

impl_downcast!(sync Service);

/// Blanket implementation for all suitable types
impl<T: std::any::Any + Send + Sync> Service for T {}

/// Shared, type-erased provider instance
pub type Instance = Arc<dyn Service>;

/// Wrap a value as a provider instance
pub fn instance<T: Service>(value: T) -> Instance {
    Arc::new(value)
}

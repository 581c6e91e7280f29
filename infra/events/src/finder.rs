use crate::error::EventBusError;
use crate::method::{Subscriber, SubscriberMethod};
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

type CachedMethods = Arc<dyn Any + Send + Sync>;

/// Resolves the handler table of a subscriber type and caches it per type.
///
/// The table comes from [`Subscriber::subscriber_methods`], so the result is deterministic
/// for a given type. The cache only saves rebuilding the table on repeated registrations.
#[derive(Default)]
pub struct SubscriberMethodFinder {
    cache: RwLock<FxHashMap<TypeId, CachedMethods>>,
}

impl SubscriberMethodFinder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handlers declared by `S`, in declaration order.
    ///
    /// # Errors
    /// Returns [`EventBusError::NoSubscriberMethods`] if `S` declares no handlers.
    pub fn find<S: Subscriber>(&self) -> Result<Arc<Vec<SubscriberMethod<S>>>, EventBusError> {
        let key = TypeId::of::<S>();

        let cached = self.cache.read().get(&key).cloned();
        if let Some(methods) = cached.and_then(|entry| entry.downcast().ok()) {
            return Ok(methods);
        }

        let methods = S::subscriber_methods();
        if methods.is_empty() {
            return Err(EventBusError::NoSubscriberMethods {
                message: format!("{} declares no #[subscribe] handlers", std::any::type_name::<S>())
                    .into(),
                context: None,
            });
        }

        trace!(
            subscriber = std::any::type_name::<S>(),
            handlers = methods.len(),
            "Caching subscriber methods"
        );
        let methods = Arc::new(methods);
        self.cache.write().insert(key, Arc::clone(&methods) as CachedMethods);
        Ok(methods)
    }

    /// Number of subscriber types currently cached.
    #[must_use]
    pub fn cached_types(&self) -> usize {
        self.cache.read().len()
    }

    pub fn clear_cache(&self) {
        self.cache.write().clear();
    }
}

impl fmt::Debug for SubscriberMethodFinder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberMethodFinder").field("cached_types", &self.cached_types()).finish()
    }
}

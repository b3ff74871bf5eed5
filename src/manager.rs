//! Process-wide registry of [`SubscriptionEngine`]s, memoized by the
//! `(EventKey, Payload)` type pair that names them. Generalizes
//! `signet-rpc`'s `SubscriptionManager` (an `Arc`-wrapped inner holding one
//! long-lived resource) to a type-indexed map, the common "lazily
//! memoized per-type resource" shape seen in typed extension maps
//! elsewhere in the Rust ecosystem.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dispatch::Dispatcher;
use crate::engine::SubscriptionEngine;

type ErasedEngine = Box<dyn Any + Send + Sync>;

/// Owns one dispatcher and lazily builds/memoizes one
/// [`SubscriptionEngine`] per distinct `(K, P)` type pair used with it.
pub struct SubscriptionManager {
    dispatcher: Arc<dyn Dispatcher>,
    engines: Mutex<HashMap<TypeId, ErasedEngine>>,
}

impl fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("lane_count", &self.dispatcher.lane_count())
            .field("engine_types", &self.engines.lock().len())
            .finish()
    }
}

impl SubscriptionManager {
    /// Build a manager around `dispatcher`. The manager takes ownership of
    /// the dispatcher's lifetime via the `Arc`; [`Self::dispose`] tears it
    /// down along with every memoized engine.
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { dispatcher, engines: Mutex::new(HashMap::new()) }
    }

    /// Get or create the engine for the `(K, P)` type pair.
    ///
    /// The first call for a given `(K, P)` builds the engine; every
    /// subsequent call, for any `K`/`P` combination used anywhere in the
    /// process through this manager, returns the same `Arc`.
    pub fn get_engine<K, P>(&self) -> Arc<SubscriptionEngine<K, P>>
    where
        K: Eq + Hash + Clone + Send + Sync + fmt::Debug + 'static,
        P: Clone + Send + 'static,
    {
        let key = TypeId::of::<(K, P)>();
        let mut engines = self.engines.lock();
        let erased = engines
            .entry(key)
            .or_insert_with(|| Box::new(Arc::new(SubscriptionEngine::<K, P>::new(self.dispatcher.clone()))));
        erased
            .downcast_ref::<Arc<SubscriptionEngine<K, P>>>()
            .expect("TypeId collision: stored engine type does not match requested (K, P)")
            .clone()
    }

    /// The dispatcher backing every engine this manager hands out.
    pub fn dispatcher(&self) -> Arc<dyn Dispatcher> {
        self.dispatcher.clone()
    }

    /// Stop the dispatcher and drop every memoized engine. Idempotent:
    /// the dispatcher's own `dispose` is idempotent, and clearing an
    /// already-empty engine map is a no-op.
    pub fn dispose(&self) {
        self.dispatcher.dispose();
        self.engines.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::InlineDispatcher;

    #[test]
    fn get_engine_memoizes_per_type_pair() {
        let manager = SubscriptionManager::new(Arc::new(InlineDispatcher::new(1)));
        let a: Arc<SubscriptionEngine<&'static str, i32>> = manager.get_engine();
        let b: Arc<SubscriptionEngine<&'static str, i32>> = manager.get_engine();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_type_pairs_get_distinct_engines() {
        let manager = SubscriptionManager::new(Arc::new(InlineDispatcher::new(1)));
        let strings: Arc<SubscriptionEngine<&'static str, i32>> = manager.get_engine();
        let ints: Arc<SubscriptionEngine<&'static str, u8>> = manager.get_engine();
        let subscriber = crate::subscriber::Subscriber::new(0, |_, _: &mut i32, _: &'static str, _: i32| {});
        subscriber.subscribe(&strings, 0, 0, "A");
        assert_eq!(strings.size_total(), 1);
        assert_eq!(ints.size_total(), 0);
    }

    #[test]
    fn dispose_clears_engines() {
        let manager = SubscriptionManager::new(Arc::new(InlineDispatcher::new(1)));
        let _engine: Arc<SubscriptionEngine<&'static str, i32>> = manager.get_engine();
        manager.dispose();
        assert_eq!(manager.engines.lock().len(), 0);
    }
}

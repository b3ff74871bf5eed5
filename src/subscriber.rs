//! Bound-state subscriber type. Generalizes `psbus`'s `Subscriber` trait
//! (a bare `on_event` callback) to a concrete struct holding mutable user
//! state behind a lock, since the design requires each subscriber to carry
//! its own evolving state rather than being a stateless trait object.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::engine::{Notify, SubscriptionEngine, SubscriptionHandle};

type Callback<O, K, P> = Box<dyn Fn(u64, &mut O, K, P) + Send + Sync + 'static>;

struct Registration<K, P> {
    engine: Weak<SubscriptionEngine<K, P>>,
    handle: SubscriptionHandle<K>,
}

/// A subscriber with its own mutable state `O`, invoked through a single
/// bound callback for every key it registers under.
///
/// Must be held behind an `Arc` (see [`Subscriber::new`]): the engine only
/// ever stores a [`Weak`] reference to it, so the subscriber's lifetime is
/// owned entirely by the application, never by the engines it registers
/// with.
pub struct Subscriber<O, K, P> {
    state: Mutex<O>,
    callback: Callback<O, K, P>,
    registrations: Mutex<Vec<Registration<K, P>>>,
}

impl<O, K, P> fmt::Debug for Subscriber<O, K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("registrations", &self.registrations.lock().len())
            .finish_non_exhaustive()
    }
}

impl<O, K, P> Subscriber<O, K, P>
where
    O: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + fmt::Debug + 'static,
    P: Clone + Send + 'static,
{
    /// Build a new subscriber around `state`, bound to `callback` for its
    /// whole lifetime. Binding happens here, at construction, rather than
    /// through a separate setter, so there is no window where a subscriber
    /// is registered with no callback installed.
    pub fn new(
        state: O,
        callback: impl Fn(u64, &mut O, K, P) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            callback: Box::new(callback),
            registrations: Mutex::new(Vec::new()),
        })
    }

    /// Register this subscriber with `engine` under `key`, to be delivered
    /// on lane `tid`.
    pub fn subscribe(
        self: &Arc<Self>,
        engine: &Arc<SubscriptionEngine<K, P>>,
        tid: usize,
        set_id: u64,
        key: K,
    ) {
        let target: Weak<dyn Notify<K, P>> = Arc::downgrade(self) as Weak<dyn Notify<K, P>>;
        let handle = engine.subscribe(tid, set_id, key, target);
        self.registrations
            .lock()
            .push(Registration { engine: Arc::downgrade(engine), handle });
    }

    /// Remove this subscriber's registration(s) for `key`. A subscriber
    /// that never registered for `key` is left untouched.
    pub fn unsubscribe(&self, key: &K) {
        let mut registrations = self.registrations.lock();
        registrations.retain(|reg| {
            if &reg.handle.key != key {
                return true;
            }
            if let Some(engine) = reg.engine.upgrade() {
                engine.unsubscribe(&reg.handle);
            }
            false
        });
    }

    /// Number of engines this subscriber currently holds a registration
    /// with, for tests and diagnostics.
    pub fn registration_count(&self) -> usize {
        self.registrations.lock().len()
    }
}

impl<O, K, P> Notify<K, P> for Subscriber<O, K, P>
where
    O: Send + 'static,
    K: Send + Sync + 'static,
    P: Send + 'static,
{
    fn on_notify(&self, set_id: u64, key: K, payload: P) {
        let mut state = self.state.lock();
        (self.callback)(set_id, &mut state, key, payload);
    }
}

impl<O, K, P> Drop for Subscriber<O, K, P> {
    fn drop(&mut self) {
        for reg in self.registrations.get_mut().drain(..) {
            if let Some(engine) = reg.engine.upgrade() {
                engine.unsubscribe(&reg.handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::InlineDispatcher;

    #[test]
    fn callback_mutates_bound_state() {
        let dispatcher: Arc<dyn crate::dispatch::Dispatcher> = Arc::new(InlineDispatcher::new(1));
        let engine = Arc::new(SubscriptionEngine::<&'static str, i32>::new(dispatcher));
        let sub = Subscriber::new(0_i32, |_set_id, state: &mut i32, _key, payload: i32| {
            *state += payload;
        });
        sub.subscribe(&engine, 0, 0, "A");

        engine.notify("A", 3);
        engine.notify("A", 4);

        assert_eq!(*sub.state.lock(), 7);
    }

    #[test]
    fn drop_unsubscribes_from_every_engine() {
        let dispatcher: Arc<dyn crate::dispatch::Dispatcher> = Arc::new(InlineDispatcher::new(1));
        let engine = Arc::new(SubscriptionEngine::<&'static str, i32>::new(dispatcher));
        let sub = Subscriber::new(0_i32, |_set_id, _state: &mut i32, _key, _payload: i32| {});
        sub.subscribe(&engine, 0, 0, "A");
        sub.subscribe(&engine, 0, 0, "B");
        assert_eq!(engine.size_total(), 2);

        drop(sub);
        assert_eq!(engine.size_total(), 0);
    }

    #[test]
    fn unsubscribe_by_key_only_affects_that_key() {
        let dispatcher: Arc<dyn crate::dispatch::Dispatcher> = Arc::new(InlineDispatcher::new(1));
        let engine = Arc::new(SubscriptionEngine::<&'static str, i32>::new(dispatcher));
        let sub = Subscriber::new(0_i32, |_set_id, state: &mut i32, _key, payload: i32| {
            *state += payload;
        });
        sub.subscribe(&engine, 0, 0, "A");
        sub.subscribe(&engine, 0, 0, "B");

        sub.unsubscribe(&"A");
        assert_eq!(sub.registration_count(), 1);
        assert_eq!(engine.size(&"A"), 0);
        assert_eq!(engine.size(&"B"), 1);

        engine.notify("A", 100);
        engine.notify("B", 5);
        assert_eq!(*sub.state.lock(), 5);
    }
}

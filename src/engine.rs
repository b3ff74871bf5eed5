//! The subscriber registry for one `(EventKey, Payload)` family.
//!
//! Grounded on `signet-rpc`'s `interest::subs::SubscriptionManagerInner`
//! (map keyed by id, weak subscriber references, lazy cleanup) and on the
//! weak-upgrade / retain-on-failure pattern used throughout
//! `psbus::sync::bus::EventBus` (see DESIGN.md).

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::dispatch::Dispatcher;

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// Implemented by subscriber types so an engine can hold a type-erased
/// weak reference and deliver notifications without knowing the
/// subscriber's concrete user-state type.
pub trait Notify<K, P>: Send + Sync {
    /// Invoked on the lane the subscriber registered under. `key` and
    /// `payload` are clones of the values passed to
    /// [`SubscriptionEngine::notify`].
    fn on_notify(&self, set_id: u64, key: K, payload: P);
}

struct Record<K, P> {
    id: u64,
    tid: usize,
    set_id: u64,
    target: Weak<dyn Notify<K, P>>,
}

/// Opaque handle returned by [`SubscriptionEngine::subscribe`], used to
/// remove the registration later via [`SubscriptionEngine::unsubscribe`].
///
/// Carries the subscribed key plus a process-wide monotonic id rather than
/// a raw index, so that removing a stale handle twice (or after its slot
/// has been reused) is always a safe no-op instead of an ABA hazard.
pub struct SubscriptionHandle<K> {
    pub(crate) key: K,
    pub(crate) id: u64,
}

impl<K: Clone> Clone for SubscriptionHandle<K> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone(), id: self.id }
    }
}

impl<K: fmt::Debug> fmt::Debug for SubscriptionHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle").field("key", &self.key).field("id", &self.id).finish()
    }
}

/// Registry for one `(EventKey, Payload)` family.
///
/// Owns the key -> subscriber-record-list map behind an `RwLock`, and a
/// strong reference to the dispatcher used to route deliveries. Lifetime
/// is owned by whichever [`crate::SubscriptionManager`] created it.
pub struct SubscriptionEngine<K, P> {
    dispatcher: Arc<dyn Dispatcher>,
    map: RwLock<HashMap<K, Vec<Record<K, P>>>>,
}

impl<K, P> fmt::Debug for SubscriptionEngine<K, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionEngine").field("keys", &self.map.read().len()).finish_non_exhaustive()
    }
}

impl<K, P> SubscriptionEngine<K, P>
where
    K: Eq + Hash + Clone + Send + Sync + fmt::Debug + 'static,
    P: Clone + Send + 'static,
{
    pub(crate) fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self { dispatcher, map: RwLock::new(HashMap::new()) }
    }

    /// Register `target` under `key`, to be delivered on lane `tid`.
    ///
    /// # Panics
    ///
    /// Panics (via the dispatcher's [`Dispatcher::check_tid`]) if `tid` is
    /// not a valid lane for this engine's dispatcher.
    pub fn subscribe(
        &self,
        tid: usize,
        set_id: u64,
        key: K,
        target: Weak<dyn Notify<K, P>>,
    ) -> SubscriptionHandle<K> {
        self.dispatcher.check_tid(tid);
        let id = NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed);
        let mut map = self.map.write();
        map.entry(key.clone()).or_default().push(Record { id, tid, set_id, target });
        SubscriptionHandle { key, id }
    }

    /// Remove the registration named by `handle`.
    ///
    /// Tolerates being called twice with the same handle (or with a
    /// handle whose registration was already swept by [`Self::notify`]):
    /// the second call finds no matching record and is a no-op.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle<K>) {
        let mut map = self.map.write();
        let Some(records) = map.get_mut(&handle.key) else { return };
        if let Some(pos) = records.iter().position(|r| r.id == handle.id) {
            // Order among different subscribers for the same key carries no
            // meaning (only per-lane delivery order does, see SPEC_FULL.md
            // §5), so a cheap swap_remove is enough.
            records.swap_remove(pos);
        }
        if records.is_empty() {
            map.remove(&handle.key);
        }
    }

    /// Number of live-at-registration-time records for `key`.
    pub fn size(&self, key: &K) -> usize {
        self.map.read().get(key).map_or(0, Vec::len)
    }

    /// Total number of live-at-registration-time records across all keys.
    pub fn size_total(&self) -> usize {
        self.map.read().values().map(Vec::len).sum()
    }

    /// Deliver `payload` to every subscriber registered under `key`.
    ///
    /// Takes the shared (read) lock only: each live record is submitted to
    /// the dispatcher on its recorded `tid`; the submitted closure
    /// re-upgrades a fresh [`Weak`] clone at execution time rather than
    /// capturing the strong reference checked here, so a task sitting in
    /// a lane queue never keeps an otherwise-dead subscriber alive.
    ///
    /// Records whose weak reference fails to upgrade are collected and
    /// erased in a second pass, under the exclusive (write) lock, taken
    /// only if at least one dead record was found. This is strategy (b)
    /// from the design's two documented lazy-cleanup options: `notify` is
    /// the hot path, so we avoid paying for a lock upgrade on every call
    /// in the common case where every subscriber is still alive.
    pub fn notify(&self, key: K, payload: P) {
        let mut dead = Vec::new();
        {
            let map = self.map.read();
            if let Some(records) = map.get(&key) {
                for record in records {
                    if record.target.upgrade().is_some() {
                        let tid = record.tid;
                        let set_id = record.set_id;
                        let weak = record.target.clone();
                        let key = key.clone();
                        let payload = payload.clone();
                        self.dispatcher.add(
                            tid,
                            Box::new(move || {
                                if let Some(target) = weak.upgrade() {
                                    target.on_notify(set_id, key, payload);
                                }
                            }),
                        );
                    } else {
                        tracing::trace!(id = record.id, ?key, "dead subscriber found during notify");
                        dead.push(record.id);
                    }
                }
            }
        }
        if dead.is_empty() {
            return;
        }
        let mut map = self.map.write();
        if let Some(records) = map.get_mut(&key) {
            records.retain(|r| !dead.contains(&r.id));
            if records.is_empty() {
                map.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::InlineDispatcher;
    use std::sync::Mutex as StdMutex;

    struct Sink(StdMutex<Vec<(u64, &'static str, i32)>>);

    impl Notify<&'static str, i32> for Sink {
        fn on_notify(&self, set_id: u64, key: &'static str, payload: i32) {
            self.0.lock().unwrap().push((set_id, key, payload));
        }
    }

    #[test]
    fn notify_delivers_payload_and_set_id() {
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(InlineDispatcher::new(1));
        let engine = SubscriptionEngine::<&'static str, i32>::new(dispatcher);
        let sink = Arc::new(Sink(StdMutex::new(Vec::new())));
        let weak: Weak<dyn Notify<&'static str, i32>> = Arc::downgrade(&sink);
        engine.subscribe(0, 7, "A", weak);

        engine.notify("A", 1);
        engine.notify("B", 2);
        engine.notify("A", 3);

        assert_eq!(sink.0.lock().unwrap().clone(), vec![(7, "A", 1), (7, "A", 3)]);
    }

    #[test]
    fn dead_subscriber_is_swept_lazily() {
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(InlineDispatcher::new(1));
        let engine = SubscriptionEngine::<&'static str, i32>::new(dispatcher);
        let sink = Arc::new(Sink(StdMutex::new(Vec::new())));
        let weak: Weak<dyn Notify<&'static str, i32>> = Arc::downgrade(&sink);
        engine.subscribe(0, 0, "A", weak);
        assert_eq!(engine.size(&"A"), 1);

        drop(sink);
        engine.notify("A", 1); // no callback should fire; triggers cleanup
        assert_eq!(engine.size(&"A"), 0);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(InlineDispatcher::new(1));
        let engine = SubscriptionEngine::<&'static str, i32>::new(dispatcher);
        let sink = Arc::new(Sink(StdMutex::new(Vec::new())));
        let weak: Weak<dyn Notify<&'static str, i32>> = Arc::downgrade(&sink);
        let handle = engine.subscribe(0, 0, "A", weak);
        assert_eq!(engine.size(&"A"), 1);

        engine.unsubscribe(&handle);
        assert_eq!(engine.size(&"A"), 0);
        engine.unsubscribe(&handle); // must not panic or corrupt state
        assert_eq!(engine.size(&"A"), 0);
    }

    struct StrSink(StdMutex<Vec<&'static str>>);
    impl Notify<&'static str, &'static str> for StrSink {
        fn on_notify(&self, _set_id: u64, _key: &'static str, payload: &'static str) {
            self.0.lock().unwrap().push(payload);
        }
    }

    #[test]
    fn fanout_reaches_every_live_subscriber() {
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(InlineDispatcher::new(2));
        let engine = SubscriptionEngine::<&'static str, &'static str>::new(dispatcher);

        let s0 = Arc::new(StrSink(StdMutex::new(Vec::new())));
        let s1 = Arc::new(StrSink(StdMutex::new(Vec::new())));
        engine.subscribe(0, 0, "X", Arc::downgrade(&s0) as Weak<dyn Notify<_, _>>);
        engine.subscribe(1, 0, "X", Arc::downgrade(&s1) as Weak<dyn Notify<_, _>>);

        engine.notify("X", "hi");

        assert_eq!(s0.0.lock().unwrap().as_slice(), ["hi"]);
        assert_eq!(s1.0.lock().unwrap().as_slice(), ["hi"]);
        assert_eq!(engine.size(&"X"), 2);
    }
}

//! Convenience factory that wires a fresh [`Subscriber`] up to an engine
//! fetched from a [`SubscriptionManager`] in one call.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::manager::SubscriptionManager;
use crate::subscriber::Subscriber;

/// Build a subscriber around `state`/`callback`, fetch the `(K, P)` engine
/// from `manager`, and subscribe it under `key` on lane `tid` with
/// `set_id` 0.
///
/// The callback is wrapped with a debug-only assertion that the key it
/// receives matches the key it was created for: this helper only ever
/// issues a single-key subscription, so a mismatch would indicate the
/// engine delivered under the wrong key.
pub fn create<O, K, P>(
    manager: &SubscriptionManager,
    tid: usize,
    key: K,
    state: O,
    callback: impl Fn(u64, &mut O, K, P) + Send + Sync + 'static,
) -> Arc<Subscriber<O, K, P>>
where
    O: Send + 'static,
    K: Eq + Hash + Clone + Send + Sync + fmt::Debug + 'static,
    P: Clone + Send + 'static,
{
    let expected_key = key.clone();
    let wrapped = move |set_id: u64, state: &mut O, observed_key: K, payload: P| {
        debug_assert_eq!(
            observed_key, expected_key,
            "subscriber created for {expected_key:?} received delivery for {observed_key:?}"
        );
        callback(set_id, state, observed_key, payload);
    };

    let subscriber = Subscriber::new(state, wrapped);
    let engine = manager.get_engine::<K, P>();
    subscriber.subscribe(&engine, tid, 0, key);
    subscriber
}

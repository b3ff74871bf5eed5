//! Signet events.
//!
//! An in-process, strongly-typed publish/subscribe runtime for decoupling
//! node subsystems: one subsystem notifies under an `EventKey`, any number
//! of other subsystems receive the matching payload on the lane they
//! registered under, without either side holding a direct reference to
//! the other.
//!
//! ## Usage Example
//!
//! ```rust
//! use signet_events::{creator::create, manager::SubscriptionManager, dispatch::InlineDispatcher};
//! use std::sync::Arc;
//!
//! let manager = SubscriptionManager::new(Arc::new(InlineDispatcher::new(1)));
//!
//! let subscriber = create(&manager, 0, "block.new", 0_u64, |_set_id, count: &mut u64, _key, _payload: u32| {
//!     *count += 1;
//! });
//!
//! manager.get_engine::<&'static str, u32>().notify("block.new", 42);
//! assert_eq!(subscriber.registration_count(), 1);
//! ```

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod config;
pub use config::{Config, ConfigError};

pub mod lane;
pub use lane::{LaneWorker, Task};

pub mod dispatch;
pub use dispatch::{Dispatcher, InlineDispatcher, PooledDispatcher};

pub mod engine;
pub use engine::{Notify, SubscriptionEngine, SubscriptionHandle};

pub mod subscriber;
pub use subscriber::Subscriber;

pub mod manager;
pub use manager::SubscriptionManager;

pub mod singleton;
pub use singleton::subscription_manager;

pub mod creator;
pub use creator::create;

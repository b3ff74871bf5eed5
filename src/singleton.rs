//! Process-wide [`SubscriptionManager`] accessor, built once on first use.

use std::sync::{Arc, OnceLock};

use crate::config::Config;
use crate::dispatch::PooledDispatcher;
use crate::manager::SubscriptionManager;

static MANAGER: OnceLock<SubscriptionManager> = OnceLock::new();

/// The process-wide [`SubscriptionManager`], built on first access from
/// [`Config::from_env`] (falling back to [`Config::default`] if the
/// environment is malformed).
///
/// Every caller in the process that goes through this function shares the
/// same dispatcher and the same memoized engines. Code that needs an
/// isolated manager (tests, multiple independent runtimes in one process)
/// should build its own [`SubscriptionManager`] directly instead.
pub fn subscription_manager() -> &'static SubscriptionManager {
    MANAGER.get_or_init(|| {
        let config = Config::from_env().unwrap_or_else(|err| {
            tracing::warn!(%err, "invalid subscription manager config, falling back to defaults");
            Config::default()
        });
        SubscriptionManager::new(Arc::new(PooledDispatcher::new(config.lane_count)))
    })
}

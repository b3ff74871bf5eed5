//! Environment-driven configuration, in the style of
//! `signet-rpc::config::ServeConfig`: a plain struct plus a fallible
//! `from_env` constructor.

use std::env;

/// Lane count used by [`crate::singleton::subscription_manager`] when
/// `SIGNET_EVENTS_LANE_COUNT` is unset.
pub const DEFAULT_LANE_COUNT: usize = 4;

const LANE_COUNT_ENV: &str = "SIGNET_EVENTS_LANE_COUNT";

/// Runtime configuration for the process-wide subscription manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of dedicated lanes the pooled dispatcher is built with.
    pub lane_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self { lane_count: DEFAULT_LANE_COUNT }
    }
}

impl Config {
    /// Build a [`Config`] from environment variables, falling back to
    /// [`DEFAULT_LANE_COUNT`] when `SIGNET_EVENTS_LANE_COUNT` is unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the variable is set but not a
    /// valid `usize`, or [`ConfigError::ZeroLaneCount`] if it parses to
    /// zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lane_count = match env::var(LANE_COUNT_ENV) {
            Ok(value) => value
                .parse::<usize>()
                .map_err(|_| ConfigError::Parse { var: LANE_COUNT_ENV, value })?,
            Err(env::VarError::NotPresent) => DEFAULT_LANE_COUNT,
            Err(env::VarError::NotUnicode(_)) => {
                return Err(ConfigError::Parse { var: LANE_COUNT_ENV, value: "<non-unicode>".to_owned() })
            }
        };
        if lane_count == 0 {
            return Err(ConfigError::ZeroLaneCount);
        }
        Ok(Self { lane_count })
    }
}

/// Errors constructing a [`Config`] from the environment.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// `var` was set but could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Parse {
        /// The environment variable name.
        var: &'static str,
        /// The raw value that failed to parse.
        value: String,
    },
    /// `SIGNET_EVENTS_LANE_COUNT` parsed to zero, which is never a valid
    /// lane count.
    #[error("lane count must be at least 1")]
    ZeroLaneCount,
}

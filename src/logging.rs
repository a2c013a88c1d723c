//! Logging setup.
//!
//! The crate logs through `tracing` (manager, scheduler, jobs) and `log`
//! (option store). The fmt subscriber installed here also forwards `log`
//! records.

use crate::config::LoggingConfig;

use std::str::FromStr;
use tracing::Level;

/// Install a global fmt subscriber at the configured level.
///
/// Returns `false` when logging is disabled, the level does not parse, or a
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    if !config.enabled {
        return false;
    }

    let Ok(level) = Level::from_str(&config.level) else {
        return false;
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_ok()
}

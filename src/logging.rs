//! Tracing subscriber setup
//!
//! The worker itself only emits `tracing` events; hosts that embed it call
//! [`init`] once to get them printed.

use crate::config::schema::GeneralConfig;
use crate::error::{SwCacheError, SwCacheResult};
use tracing_subscriber::EnvFilter;

/// Filter directive for a verbosity level: 0 = warn, 1 = info, 2+ = debug
pub fn filter_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "swcache=warn",
        1 => "swcache=info",
        _ => "swcache=debug",
    }
}

/// Install a global fmt subscriber in "text" or "json" format
pub fn init(format: &str, verbosity: u8) -> SwCacheResult<()> {
    let filter = EnvFilter::new(filter_directive(verbosity));

    let result = match format {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        "text" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
        other => {
            return Err(SwCacheError::Internal(format!(
                "unknown log format '{}', expected text or json",
                other
            )))
        }
    };

    result.map_err(|e| SwCacheError::Internal(format!("installing log subscriber: {}", e)))
}

/// Install a subscriber according to the `[general]` config section
pub fn init_from_config(general: &GeneralConfig) -> SwCacheResult<()> {
    let verbosity = if general.verbose { 2 } else { 0 };
    init(&general.log_format, verbosity)
}

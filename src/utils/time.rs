//! Wall-clock helpers for record and audit timestamps

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Current Unix timestamp in seconds.
///
/// A clock set before the epoch yields 0 instead of panicking.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| {
            warn!("System time is before UNIX epoch, using 0 as timestamp");
            std::time::Duration::from_secs(0)
        })
        .as_secs()
}

/// Current Unix timestamp in nanoseconds, used to order audit keys.
pub fn current_timestamp_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0)
}

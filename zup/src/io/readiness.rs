//! Bounded polling for a binary to appear on the search path.

use std::thread;
use std::time::Duration;

use tracing::{debug, instrument};

use super::locate::BinaryLocator;

pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Check for `binary` up to `max_attempts` times, sleeping `interval` between misses.
///
/// Returns on the first successful check. No sleep follows the final miss.
#[instrument(skip(locator), fields(interval = ?interval))]
pub fn wait_for_binary<L: BinaryLocator>(
    locator: &L,
    binary: &str,
    max_attempts: u32,
    interval: Duration,
) -> bool {
    for attempt in 1..=max_attempts {
        if locator.is_available(binary) {
            debug!(attempt, "binary available");
            return true;
        }
        debug!(attempt, "binary not yet available");
        if attempt < max_attempts {
            thread::sleep(interval);
        }
    }
    false
}

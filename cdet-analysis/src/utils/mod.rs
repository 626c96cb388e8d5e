//! Utility modules

pub mod retry;

use std::time::Duration;

/// Milliseconds in `duration`, saturating at `u64::MAX`
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

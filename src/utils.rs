//! Wall-clock helpers. The matching hot path never calls these directly —
//! every `now_ns` the engine consumes is handed in by the caller (spec.md
//! §4.4) so that replay can feed back recorded timestamps instead of the
//! live clock. These exist for callers assembling commands at the gateway
//! boundary.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in nanoseconds since the Unix epoch.
#[must_use]
pub fn current_time_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_nanos() as u64
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as u64
}

//! Usage: Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

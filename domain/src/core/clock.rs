//! Epoch-millisecond timestamps used across persisted entities.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_millis_is_plausible() {
        let a = epoch_millis();
        let b = epoch_millis();
        assert!(b >= a);
        // Sanity: after 2020, before 2100
        assert!(a > 1_577_836_800_000);
        assert!(a < 4_102_444_800_000);
    }
}

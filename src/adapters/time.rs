//! Wall-clock adapter.
//!
//! The session core takes `now` as Unix milliseconds on every call; this
//! is where production callers get it.  Catalog timestamps and the export
//! filename are wall-clock values, so a monotonic clock would be wrong.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl WallClock {
    pub fn new() -> Self {
        Self
    }

    /// Milliseconds since the Unix epoch.  Clocks set before 1970 read 0.
    pub fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }

    /// How long until `deadline_ms`, zero if it has passed.
    pub fn until(&self, deadline_ms: u64) -> Duration {
        Duration::from_millis(deadline_ms.saturating_sub(self.now_ms()))
    }
}

//! Location sources for signal enrichment.
//!
//! The session never blocks on these; the runtime bounds each lookup with
//! a timeout and drops whatever arrives late.

use std::time::Duration;

use async_io_mini::Timer;

use crate::app::ports::LocationSource;
use crate::catalog::Location;

/// Always reports the same position.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    location: Location,
    delay: Option<Duration>,
}

impl FixedLocation {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            location: Location {
                latitude,
                longitude,
            },
            delay: None,
        }
    }

    /// Answer only after `delay`, like a slow GPS fix.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl LocationSource for FixedLocation {
    async fn locate(&self) -> Option<Location> {
        if let Some(delay) = self.delay {
            Timer::after(delay).await;
        }
        Some(self.location)
    }
}

/// No positioning on this host.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationSource for NoLocation {
    async fn locate(&self) -> Option<Location> {
        None
    }
}

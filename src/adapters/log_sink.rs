//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each [`SessionEvent`] as one line
//! through the `log` facade.  A UI adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::{ClearScope, SessionEvent};
use crate::app::ports::EventSink;

/// Adapter that logs every [`SessionEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            SessionEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            SessionEvent::CapabilityUnavailable => {
                warn!("STATE | bluetooth unavailable");
            }
            SessionEvent::SignalIngested { id, replaced } => match replaced {
                Some(old) => info!("SIGNAL | {} replaced {}", id, old),
                None => info!("SIGNAL | {} new", id),
            },
            SessionEvent::SignalEnriched(id) => {
                info!("SIGNAL | {} located", id);
            }
            SessionEvent::PayloadDropped(err) => {
                warn!("SIGNAL | dropped: {}", err);
            }
            SessionEvent::CommandWritten(line) => {
                info!("TX | wrote {}", line);
            }
            SessionEvent::WriteFailed { command, error } => {
                warn!("TX | {} failed: {}", command, error);
            }
            SessionEvent::TransmitStarted {
                payload,
                auto_stop_after_ms,
                repeat_interval_ms,
            } => {
                info!(
                    "TX | repeating {} every {}ms for {}ms",
                    payload, repeat_interval_ms, auto_stop_after_ms
                );
            }
            SessionEvent::TransmitStopped(reason) => {
                info!("TX | stopped ({:?})", reason);
            }
            SessionEvent::ReplayProgress { sent, remaining } => {
                info!("TX | replay {} sent, {} left", sent, remaining);
            }
            SessionEvent::LivenessChanged(alive) => {
                info!("LINK | {}", if *alive { "alive" } else { "silent" });
            }
            SessionEvent::CatalogCleared(scope) => {
                let what = match scope {
                    ClearScope::Live => "live set",
                    ClearScope::History => "history",
                    ClearScope::All => "live set + history",
                };
                info!("CATALOG | cleared {}", what);
            }
            SessionEvent::NicknameSet { data, updated } => {
                info!("CATALOG | nickname on {} ({} entries)", data, updated);
            }
        }
    }
}

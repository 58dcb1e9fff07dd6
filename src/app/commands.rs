//! Inbound commands to the session service.
//!
//! These represent operator actions (buttons, forms, a CLI, a test) that
//! the [`SessionService`](super::service::SessionService) interprets and
//! acts upon.  Transmit fields arrive as the text the operator typed;
//! the service validates them.

use crate::catalog::export::ExportDocument;

/// Inclusive capture-time window for replay.  `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySelection {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ReplaySelection {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn between(start: u64, end: u64) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

/// Commands that adapters can send into the session core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Connect,
    Disconnect,

    /// Send `value` once.
    TransmitOnce { value: String },

    /// Start a repeat job.
    StartRepeating {
        value: String,
        auto_stop_after_ms: String,
        repeat_interval_ms: String,
    },

    StopRepeating,

    /// Resend the selected live signals, one every replay gap.
    Replay(ReplaySelection),

    /// Label every live signal with this `data`.
    SetNickname { data: String, nickname: String },

    ClearLive,
    ClearHistory,
    /// Live set and history together.
    ClearAll,

    Export,
}

/// What a successfully handled command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Done,
    /// Number of replay writes queued (first one already sent).
    ReplayQueued(usize),
    /// Number of live entries renamed.
    Renamed(usize),
    Exported(ExportDocument),
}

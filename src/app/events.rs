//! Outbound session events.
//!
//! The [`SessionService`](super::service::SessionService) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log them, refresh a UI,
//! record them in a test.

use serde::Serialize;

use crate::catalog::SignalId;
use crate::error::{DecodeError, TransportError};
use crate::fsm::StateId;
use crate::transmit::{StopReason, TransmitState};

/// Which collections a clear touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    Live,
    History,
    All,
}

/// Structured events emitted by the session core.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The service has started (carries initial state).
    Started(StateId),

    /// The FSM moved between states.
    StateChanged { from: StateId, to: StateId },

    /// `connect()` found no Bluetooth on this host.
    CapabilityUnavailable,

    /// A notification was decoded and stored.
    SignalIngested {
        id: SignalId,
        /// Id of the live entry it displaced.
        replaced: Option<SignalId>,
    },

    /// A location arrived for a still-live signal.
    SignalEnriched(SignalId),

    /// A notification failed to decode and was dropped.
    PayloadDropped(DecodeError),

    /// A command reached the device.
    CommandWritten(String),

    /// A command write failed.
    WriteFailed {
        command: String,
        error: TransportError,
    },

    /// A repeat job began.
    TransmitStarted {
        payload: String,
        auto_stop_after_ms: u64,
        repeat_interval_ms: u64,
    },

    /// The repeat job ended.
    TransmitStopped(StopReason),

    /// One replay write went out.
    ReplayProgress { sent: usize, remaining: usize },

    /// The liveness poll disagreed with the last known link state.
    LivenessChanged(bool),

    CatalogCleared(ClearScope),

    NicknameSet { data: String, updated: usize },
}

/// Serialisable view of the session, suitable for a status panel.
///
/// Timestamps use `-1` when not applicable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: StateId,
    pub status: String,
    pub device_label: String,
    pub last_inbound_payload: Option<String>,
    pub last_outbound_value: Option<String>,
    pub connected_at: i64,
    pub last_inbound_at: i64,
    pub link_alive: bool,
    pub transmitting: bool,
    /// Payload of the active repeat job.
    pub repeat_payload: Option<String>,
    pub replay_remaining: usize,
    pub live_signals: usize,
    pub history_records: usize,
}

impl SessionSnapshot {
    pub(crate) fn sentinel(ts: Option<u64>) -> i64 {
        ts.map_or(-1, |t| t as i64)
    }

    pub(crate) fn repeat_payload_of(state: &TransmitState) -> Option<String> {
        match state {
            TransmitState::Idle => None,
            TransmitState::Transmitting(job) => Some(job.payload.clone()),
        }
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: StateId::Disconnected,
            status: "Disconnected".to_string(),
            device_label: crate::fsm::context::NO_DEVICE.to_string(),
            last_inbound_payload: None,
            last_outbound_value: None,
            connected_at: -1,
            last_inbound_at: -1,
            link_alive: false,
            transmitting: false,
            repeat_payload: None,
            replay_remaining: 0,
            live_signals: 0,
            history_records: 0,
        }
    }
}

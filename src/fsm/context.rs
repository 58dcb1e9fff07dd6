//! Shared mutable context threaded through every FSM handler.
//!
//! `SessionContext` is the single struct that state handlers read from
//! and write to: the device label, the last strings exchanged with the
//! device, and the lifecycle timestamps.  The service sets `now` (and
//! `pending_label` before entering Connected) ahead of each transition.

/// Shown in place of a device label when nothing is connected.
pub const NO_DEVICE: &str = "-";

/// The shared context passed to every state handler function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    // -- Timing --
    /// Unix ms of the transition being executed.
    pub now: u64,
    pub connected_at: Option<u64>,
    pub last_inbound_at: Option<u64>,

    // -- Device --
    pub device_label: String,
    /// Name reported by the transport, consumed on entering Connected.
    pub pending_label: Option<String>,
    /// Result of the last liveness poll.
    pub link_alive: bool,
    /// Human-readable connection status line.
    pub status: String,

    // -- Traffic --
    /// Raw text of the last notification (or initial read).
    pub last_inbound_payload: Option<String>,
    /// Full command string of the last successful write.
    pub last_outbound_value: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            now: 0,
            connected_at: None,
            last_inbound_at: None,
            device_label: NO_DEVICE.to_string(),
            pending_label: None,
            link_alive: false,
            status: "Disconnected".to_string(),
            last_inbound_payload: None,
            last_outbound_value: None,
        }
    }

    /// Back to not-connected defaults.  Traffic history is kept.
    pub fn reset_link(&mut self) {
        self.device_label = NO_DEVICE.to_string();
        self.pending_label = None;
        self.connected_at = None;
        self.last_inbound_at = None;
        self.link_alive = false;
    }

    pub fn record_inbound(&mut self, raw: String, at: u64) {
        self.last_inbound_payload = Some(raw);
        self.last_inbound_at = Some(at);
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

//! Transmit controller.
//!
//! Turns operator intent into [`OutboundCommand`]s and tracks the single
//! repeat job.  The controller never writes anything itself; the session
//! owns the transport and the timers, and calls in here to validate and
//! to move between states.
//!
//! ```text
//!          begin_repeat            end_repeat / auto-stop / session lost
//!   Idle ───────────────▶ Transmitting ─────────────────────────────────▶ Idle
//! ```
//!
//! A replay (operator-selected catalog entries sent once each, paced by
//! the session) occupies the controller the same way a repeat job does.

use std::collections::VecDeque;

use log::{info, warn};

use crate::error::SessionError;
use crate::protocol::command::{OutboundCommand, is_wire_safe};
use crate::protocol::number::{format_number, parse_millis, parse_number};

/// Why a repeat job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Explicit stop request.
    Operator,
    /// The local auto-stop deadline elapsed.
    AutoStop,
    /// The session left Connected.
    SessionLost,
    /// The session is shutting down.
    Teardown,
}

/// The in-progress repeated transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmitJob {
    /// Value as sent on the wire.
    pub payload: String,
    pub repeat_interval_ms: u64,
    pub auto_stop_after_ms: u64,
    pub started_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmitState {
    Idle,
    Transmitting(TransmitJob),
}

pub struct TransmitController {
    state: TransmitState,
    replay: VecDeque<String>,
    max_command_len: usize,
}

impl TransmitController {
    pub fn new(max_command_len: usize) -> Self {
        Self {
            state: TransmitState::Idle,
            replay: VecDeque::new(),
            max_command_len,
        }
    }

    pub fn state(&self) -> &TransmitState {
        &self.state
    }

    pub fn is_transmitting(&self) -> bool {
        matches!(self.state, TransmitState::Transmitting(_))
    }

    pub fn is_replaying(&self) -> bool {
        !self.replay.is_empty()
    }

    /// Validate a single-shot value and build its command.
    pub fn prepare_once(&self, value: &str) -> Result<OutboundCommand, SessionError> {
        let payload = self.numeric_payload(value)?;
        Ok(OutboundCommand::once(payload))
    }

    /// Validate the repeat contract and enter Transmitting.  Returns the
    /// start command the caller must write.
    ///
    /// On any error the controller stays where it was.
    pub fn begin_repeat(
        &mut self,
        value: &str,
        auto_stop_after_ms: &str,
        repeat_interval_ms: &str,
        now: u64,
    ) -> Result<OutboundCommand, SessionError> {
        if self.is_transmitting() || self.is_replaying() {
            return Err(SessionError::AlreadyTransmitting);
        }
        let payload = self.numeric_payload(value)?;
        let auto_stop =
            parse_millis(auto_stop_after_ms).ok_or(SessionError::InvalidInput("auto-stop"))?;
        let interval =
            parse_millis(repeat_interval_ms).ok_or(SessionError::InvalidInput("repeat interval"))?;

        let cmd = OutboundCommand::start_repeat(payload.clone(), auto_stop, interval);
        self.check_len(&cmd)?;

        info!(
            "TX: repeating {} every {}ms for {}ms",
            payload, interval, auto_stop
        );
        self.state = TransmitState::Transmitting(TransmitJob {
            payload,
            repeat_interval_ms: interval,
            auto_stop_after_ms: auto_stop,
            started_at: now,
        });
        Ok(cmd)
    }

    /// Leave Transmitting.  Returns the finished job and the stop command
    /// to write, or `None` if already Idle.
    pub fn end_repeat(&mut self, reason: StopReason) -> Option<(TransmitJob, OutboundCommand)> {
        match core::mem::replace(&mut self.state, TransmitState::Idle) {
            TransmitState::Idle => None,
            TransmitState::Transmitting(job) => {
                info!("TX: repeat of {} stopped ({:?})", job.payload, reason);
                Some((job, OutboundCommand::stop()))
            }
        }
    }

    /// Queue raw catalog values for one-at-a-time replay.  Values that
    /// cannot be framed are skipped.  Returns how many were queued.
    pub fn queue_replay<I>(&mut self, values: I) -> Result<usize, SessionError>
    where
        I: IntoIterator<Item = String>,
    {
        if self.is_transmitting() || self.is_replaying() {
            return Err(SessionError::AlreadyTransmitting);
        }
        for value in values {
            let cmd = OutboundCommand::once(value.as_str());
            if !is_wire_safe(&value) || cmd.encode().len() > self.max_command_len {
                warn!("TX: replay skipping unframeable value {:?}", value);
                continue;
            }
            self.replay.push_back(value);
        }
        Ok(self.replay.len())
    }

    /// Next replay command, if any remain.
    pub fn next_replay(&mut self) -> Option<OutboundCommand> {
        self.replay.pop_front().map(OutboundCommand::once)
    }

    pub fn replay_remaining(&self) -> usize {
        self.replay.len()
    }

    /// Drop whatever replay values are still queued.  Returns how many.
    pub fn cancel_replay(&mut self) -> usize {
        let dropped = self.replay.len();
        self.replay.clear();
        dropped
    }

    // ── Internal ──────────────────────────────────────────────

    fn numeric_payload(&self, value: &str) -> Result<String, SessionError> {
        let n = parse_number(value).ok_or(SessionError::InvalidInput("value"))?;
        let payload = format_number(n);
        self.check_len(&OutboundCommand::once(payload.as_str()))?;
        Ok(payload)
    }

    fn check_len(&self, cmd: &OutboundCommand) -> Result<(), SessionError> {
        if cmd.encode().len() > self.max_command_len {
            return Err(SessionError::InvalidInput("value too long"));
        }
        Ok(())
    }
}

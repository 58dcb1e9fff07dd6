//! Unified error types for the Reverb session core.
//!
//! One enum per failure domain, each with a hand-written `Display`.
//! Only user-initiated actions (connect, disconnect, transmit, replay)
//! surface [`SessionError`]; the codec and catalog return typed failures
//! or no-ops and never panic on malformed input.

use core::fmt;

// ---------------------------------------------------------------------------
// Session errors (surfaced to the operator)
// ---------------------------------------------------------------------------

/// Failures reported back to whoever invoked a session operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The Bluetooth transport is missing on this host.  Terminal for the
    /// attempt; the operator must be told.
    CapabilityUnavailable,
    /// Connecting failed.  Retried only when the operator asks again.
    ConnectFailed,
    /// The operation needs a live session and there is none.
    NotConnected,
    /// A transmit field did not parse as a usable number.
    InvalidInput(&'static str),
    /// A repeat job (or replay) is already running.
    AlreadyTransmitting,
    /// The device rejected or dropped a characteristic write.
    WriteFailed(TransportError),
    /// The live set could not be serialised for export.
    ExportFailed,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilityUnavailable => write!(f, "Bluetooth transport is not available"),
            Self::ConnectFailed => write!(f, "error connecting to device"),
            Self::NotConnected => write!(f, "not connected"),
            Self::InvalidInput(what) => write!(f, "invalid input: {what}"),
            Self::AlreadyTransmitting => write!(f, "already transmitting"),
            Self::WriteFailed(e) => write!(f, "write failed: {e}"),
            Self::ExportFailed => write!(f, "export failed"),
        }
    }
}

impl std::error::Error for SessionError {}

// ---------------------------------------------------------------------------
// Decode errors (inbound payloads, never surfaced)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload is not valid JSON.
    NotJson,
    /// A required field (or both of its aliases) is absent.
    MissingField(&'static str),
    /// A numeric field could not be coerced to a finite number.
    InvalidNumber(&'static str),
    /// A field holds an array or object where a scalar is expected.
    UnsupportedValue(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotJson => write!(f, "payload is not JSON"),
            Self::MissingField(field) => write!(f, "missing field '{field}'"),
            Self::InvalidNumber(field) => write!(f, "field '{field}' is not a valid number"),
            Self::UnsupportedValue(field) => write!(f, "field '{field}' has an unsupported type"),
        }
    }
}

impl std::error::Error for DecodeError {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`DeviceTransport`](crate::app::ports::DeviceTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No Bluetooth stack on this host.
    Unavailable,
    /// The operator dismissed the device chooser.
    Cancelled,
    /// The device does not expose the requested service or characteristic.
    NotFound,
    /// The link is gone.
    Disconnected,
    /// Anything else the stack reported.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "transport unavailable"),
            Self::Cancelled => write!(f, "device selection cancelled"),
            Self::NotFound => write!(f, "service or characteristic not found"),
            Self::Disconnected => write!(f, "device disconnected"),
            Self::Io(msg) => write!(f, "transport I/O error: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        Self::WriteFailed(e)
    }
}

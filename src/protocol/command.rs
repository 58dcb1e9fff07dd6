//! Outbound command strings for the LED / command characteristic.
//!
//! Every write is a single ASCII line with exactly five comma-separated
//! fields:
//!
//! ```text
//! TX,<mode>,<timeout_ms>,<repeat_interval_ms>,<value>
//! ```
//!
//! | mode | meaning                         | timeout | repeat | value      |
//! |------|---------------------------------|---------|--------|------------|
//! | 0    | stop any repeating transmission | 0       | 0      | 0          |
//! | 1    | transmit once                   | 0       | 0      | payload    |
//! | 2    | start repeating                 | > 0     | > 0    | payload    |

use core::fmt;

/// Command discriminator, the first numeric field on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TxMode {
    Stop = 0,
    Once = 1,
    StartRepeat = 2,
}

impl TxMode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Stop),
            1 => Some(Self::Once),
            2 => Some(Self::StartRepeat),
            _ => None,
        }
    }
}

/// A fully-formed command ready for [`encode`](Self::encode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub mode: TxMode,
    pub timeout_ms: u64,
    pub repeat_interval_ms: u64,
    pub value: String,
}

impl OutboundCommand {
    pub fn stop() -> Self {
        Self {
            mode: TxMode::Stop,
            timeout_ms: 0,
            repeat_interval_ms: 0,
            value: "0".to_string(),
        }
    }

    pub fn once(value: impl Into<String>) -> Self {
        Self {
            mode: TxMode::Once,
            timeout_ms: 0,
            repeat_interval_ms: 0,
            value: value.into(),
        }
    }

    pub fn start_repeat(value: impl Into<String>, timeout_ms: u64, repeat_interval_ms: u64) -> Self {
        Self {
            mode: TxMode::StartRepeat,
            timeout_ms,
            repeat_interval_ms,
            value: value.into(),
        }
    }

    /// Render the wire string.
    pub fn encode(&self) -> String {
        encode_command(
            self.mode,
            self.timeout_ms,
            self.repeat_interval_ms,
            &self.value,
        )
    }
}

impl fmt::Display for OutboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Produce the wire string for one command.
///
/// A stop command always encodes as `TX,0,0,0,0` whatever the other
/// arguments hold; the once form always carries zero timeout and interval.
pub fn encode_command(mode: TxMode, timeout_ms: u64, repeat_interval_ms: u64, value: &str) -> String {
    match mode {
        TxMode::Stop => "TX,0,0,0,0".to_string(),
        TxMode::Once => format!("TX,1,0,0,{value}"),
        TxMode::StartRepeat => format!("TX,2,{timeout_ms},{repeat_interval_ms},{value}"),
    }
}

/// Parse a wire string back into a command.  This is the device side of
/// the protocol; the session itself only ever encodes.
///
/// Returns `None` on anything but exactly five fields with a known mode.
pub fn parse_command(line: &str) -> Option<OutboundCommand> {
    let mut parts = line.trim_end_matches(['\r', '\n']).split(',');
    if parts.next()? != "TX" {
        return None;
    }
    let mode = TxMode::from_u8(parts.next()?.parse().ok()?)?;
    let timeout_ms: u64 = parts.next()?.parse().ok()?;
    let repeat_interval_ms: u64 = parts.next()?.parse().ok()?;
    let value = parts.next()?;
    if parts.next().is_some() || value.is_empty() {
        return None;
    }
    Some(OutboundCommand {
        mode,
        timeout_ms,
        repeat_interval_ms,
        value: value.to_string(),
    })
}

/// True when `value` can be placed in the last field without breaking
/// the five-field framing.
pub fn is_wire_safe(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_graphic() && b != b',')
}

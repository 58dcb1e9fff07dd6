//! Signal records as stored in the live set, the history and the exports.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Opaque signal identifier.  Assigned once at ingestion, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(String);

impl SignalId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SignalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a signal was captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// One observed transmission.
///
/// Serialises flat: `id, frequency, data, rssi, timestamp`, then
/// `latitude`/`longitude` once located and `nickname` once named.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    /// MHz
    pub frequency: f64,
    pub data: String,
    /// dBm
    pub rssi: i32,
    /// Capture time, Unix milliseconds.
    pub timestamp: u64,
    #[serde(flatten)]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
}

impl Signal {
    /// Copy of `self` carrying `location`, same id.
    pub fn located(&self, location: Location) -> Self {
        Self {
            location: Some(location),
            ..self.clone()
        }
    }
}

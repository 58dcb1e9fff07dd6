//! Inbound notification payloads from the sensor characteristic.
//!
//! Two payload shapes are in the field:
//!
//! ```text
//! compact:   {"data": "0xA1", "freq": 433.92, "rssi": -45}
//! extended:  {"value": 161, "frequency": "433.92", "rssi": -45, "protocol": "RCSwitch"}
//! ```
//!
//! Fields are resolved by alias (`data` before `value`, `freq` before
//! `frequency`), so a payload mixing the two spellings still decodes.
//! A `null` field counts as absent.

use serde_json::{Map, Value};

use super::number::{format_number, parse_number};
use crate::error::DecodeError;

/// Which spelling the payload used for its data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationShape {
    /// `data` / `freq`
    Compact,
    /// `value` / `frequency` (+ optional `protocol`)
    Extended,
}

/// A validated notification, ready for the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSignal {
    /// MHz, finite, never negative.
    pub frequency: f64,
    pub data: String,
    /// dBm
    pub rssi: i32,
    pub protocol: Option<String>,
    pub shape: NotificationShape,
}

/// Decode one raw notification.  Pure; never panics on any input.
pub fn decode_notification(raw: &str) -> Result<ParsedSignal, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| DecodeError::NotJson)?;
    let Value::Object(obj) = value else {
        return Err(DecodeError::MissingField("data"));
    };

    let (data_key, data_raw) =
        first_present(&obj, &["data", "value"]).ok_or(DecodeError::MissingField("data"))?;
    let (_, freq_raw) =
        first_present(&obj, &["freq", "frequency"]).ok_or(DecodeError::MissingField("freq"))?;
    let (_, rssi_raw) = first_present(&obj, &["rssi"]).ok_or(DecodeError::MissingField("rssi"))?;

    let data = coerce_string(data_raw, "data")?;
    let frequency = coerce_frequency(freq_raw)?;
    let rssi = coerce_rssi(rssi_raw)?;
    let protocol = match obj.get("protocol") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => coerce_string(v, "protocol").ok(),
        _ => None,
    };

    let shape = if data_key == "data" {
        NotificationShape::Compact
    } else {
        NotificationShape::Extended
    };

    Ok(ParsedSignal {
        frequency,
        data,
        rssi,
        protocol,
        shape,
    })
}

/// Decode raw characteristic bytes, replacing invalid UTF-8.
pub fn decode_notification_bytes(raw: &[u8]) -> Result<ParsedSignal, DecodeError> {
    decode_notification(&String::from_utf8_lossy(raw))
}

fn first_present<'a>(
    obj: &'a Map<String, Value>,
    keys: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    keys.iter().find_map(|&k| match obj.get(k) {
        None | Some(Value::Null) => None,
        Some(v) => Some((k, v)),
    })
}

fn coerce_string(v: &Value, field: &'static str) -> Result<String, DecodeError> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(if let Some(i) = n.as_i64() {
            i.to_string()
        } else if let Some(u) = n.as_u64() {
            u.to_string()
        } else {
            format_number(n.as_f64().unwrap_or(0.0))
        }),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Err(DecodeError::MissingField(field)),
        Value::Array(_) | Value::Object(_) => Err(DecodeError::UnsupportedValue(field)),
    }
}

fn coerce_frequency(v: &Value) -> Result<f64, DecodeError> {
    let f = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        Value::Array(_) | Value::Object(_) => {
            return Err(DecodeError::UnsupportedValue("frequency"));
        }
        _ => None,
    }
    .ok_or(DecodeError::InvalidNumber("frequency"))?;

    if !f.is_finite() || f < 0.0 {
        return Err(DecodeError::InvalidNumber("frequency"));
    }
    // -0.0 and 0.0 must key the same live entry
    Ok(if f == 0.0 { 0.0 } else { f })
}

fn coerce_rssi(v: &Value) -> Result<i32, DecodeError> {
    let f = match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return i32::try_from(i).map_err(|_| DecodeError::InvalidNumber("rssi"));
            }
            n.as_f64()
        }
        Value::String(s) => parse_number(s),
        _ => None,
    }
    .ok_or(DecodeError::InvalidNumber("rssi"))?;

    if f.fract() != 0.0 || f < i32::MIN as f64 || f > i32::MAX as f64 {
        return Err(DecodeError::InvalidNumber("rssi"));
    }
    Ok(f as i32)
}

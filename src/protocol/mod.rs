//! Wire text protocol spoken over the bridge's two characteristics.
//!
//! ```text
//!  operator ──▶ OutboundCommand ──encode──▶ "TX,<mode>,<timeout>,<repeat>,<value>" ──▶ LED char
//!  sensor char ──▶ JSON notification ──decode──▶ ParsedSignal ──▶ Catalog
//! ```
//!
//! Pure functions only: no I/O, no clocks, no logging.

pub mod command;
pub mod notification;
pub mod number;

pub use command::{OutboundCommand, TxMode, encode_command, parse_command};
pub use notification::{
    NotificationShape, ParsedSignal, decode_notification, decode_notification_bytes,
};

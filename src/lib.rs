//! Reverb session library.
//!
//! Host-side core for the Reverb ESP32 radio bridge: the notification
//! codec and command encoder, the signal catalog, the transmit controller,
//! the connection state machine and the session actor that ties them to a
//! BLE transport.  Everything platform-specific sits behind the port
//! traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fsm;
pub mod gatt;
pub mod protocol;
pub mod runtime;
pub mod scheduler;
pub mod transmit;

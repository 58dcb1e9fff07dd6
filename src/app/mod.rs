//! Application core: session orchestration with no platform I/O.
//!
//! [`service::SessionService`] drives the connection FSM, the catalog and
//! the transmit controller.  All interaction with the outside world goes
//! through the **port traits** in [`ports`], so the whole core runs under
//! test against in-process adapters.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;

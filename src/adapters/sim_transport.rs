//! Simulated Reverb bridge.
//!
//! Implements [`DeviceTransport`] entirely in-process.  Clones share one
//! device, so a test hands one clone to the session and drives the other:
//! inject notifications, drop the link, make writes fail, inspect every
//! command the session wrote.
//!
//! The simulated device also interprets the commands it receives, so
//! [`SimTransport::device_repeating`] reflects what a real bridge would be
//! doing.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};

use crate::app::ports::{DeviceTransport, TransportEvent, TransportListener};
use crate::error::TransportError;
use crate::gatt::{CHAR_COMMAND, CHAR_SENSOR, DEFAULT_DEVICE_NAME, SERVICE_UUID};
use crate::protocol::command::{OutboundCommand, TxMode, parse_command};

/// Handle to one simulated connection.
#[derive(Debug, PartialEq, Eq)]
pub struct SimHandle(u32);

struct SimState {
    available: bool,
    device_name: Option<String>,
    connect_failure: Option<TransportError>,
    notify_failure: Option<TransportError>,
    write_failure: Option<TransportError>,
    sensor_value: Vec<u8>,
    /// Live connection id, if any.
    current: Option<u32>,
    next_id: u32,
    /// What `is_connected` reports; can disagree with `current`.
    link_up: bool,
    listener: Option<Arc<dyn TransportListener>>,
    writes: Vec<String>,
    connect_attempts: usize,
    closes: usize,
    /// Value the device is repeating, if any.
    repeating: Option<String>,
}

impl Default for SimState {
    fn default() -> Self {
        Self {
            available: true,
            device_name: Some(DEFAULT_DEVICE_NAME.to_string()),
            connect_failure: None,
            notify_failure: None,
            write_failure: None,
            sensor_value: Vec::new(),
            current: None,
            next_id: 1,
            link_up: false,
            listener: None,
            writes: Vec::new(),
            connect_attempts: 0,
            closes: 0,
            repeating: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct SimTransport {
    inner: Arc<Mutex<SimState>>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // ── Test controls ─────────────────────────────────────────

    /// Pretend the host has (or lacks) Bluetooth.
    pub fn set_available(&self, available: bool) {
        self.state().available = available;
    }

    pub fn set_device_name(&self, name: Option<&str>) {
        self.state().device_name = name.map(str::to_string);
    }

    /// Make every connection request fail with `err` (or succeed again).
    pub fn set_connect_failure(&self, err: Option<TransportError>) {
        self.state().connect_failure = err;
    }

    pub fn set_notify_failure(&self, err: Option<TransportError>) {
        self.state().notify_failure = err;
    }

    /// Make every characteristic write fail with `err` (or succeed again).
    pub fn set_write_failure(&self, err: Option<TransportError>) {
        self.state().write_failure = err;
    }

    /// Current value of the sensor characteristic, returned by reads.
    pub fn set_sensor_value(&self, value: &[u8]) {
        self.state().sensor_value = value.to_vec();
    }

    /// Push a notification to the subscribed listener.  Dropped if nothing
    /// is connected.
    pub fn notify(&self, value: &[u8]) {
        let listener = {
            let mut st = self.state();
            if st.current.is_none() {
                debug!("SimTransport: notify with no connection, dropped");
                return;
            }
            st.sensor_value = value.to_vec();
            st.listener.clone()
        };
        if let Some(l) = listener {
            l.on_event(TransportEvent::Notification(value.to_vec()));
        }
    }

    /// Drop the link and tell the listener.
    pub fn drop_link(&self) {
        let listener = {
            let mut st = self.state();
            if st.current.take().is_none() {
                return;
            }
            st.link_up = false;
            st.repeating = None;
            st.listener.take()
        };
        info!("SimTransport: link dropped");
        if let Some(l) = listener {
            l.on_event(TransportEvent::Disconnected);
        }
    }

    /// Change what `is_connected` reports without sending any event, as if
    /// the disconnect notification got lost.
    pub fn set_link_up(&self, up: bool) {
        self.state().link_up = up;
    }

    // ── Inspection ────────────────────────────────────────────

    /// Every command string written, oldest first.
    pub fn writes(&self) -> Vec<String> {
        self.state().writes.clone()
    }

    pub fn parsed_writes(&self) -> Vec<OutboundCommand> {
        self.state()
            .writes
            .iter()
            .filter_map(|w| parse_command(w))
            .collect()
    }

    /// Number of stop commands written.
    pub fn stop_count(&self) -> usize {
        self.parsed_writes()
            .iter()
            .filter(|c| c.mode == TxMode::Stop)
            .count()
    }

    pub fn connect_attempts(&self) -> usize {
        self.state().connect_attempts
    }

    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    pub fn is_link_open(&self) -> bool {
        self.state().current.is_some()
    }

    /// Value the device believes it is repeating.
    pub fn device_repeating(&self) -> Option<String> {
        self.state().repeating.clone()
    }
}

impl DeviceTransport for SimTransport {
    type Handle = SimHandle;

    fn is_available(&self) -> bool {
        self.state().available
    }

    fn request_connection(&mut self, service: u128) -> Result<SimHandle, TransportError> {
        let mut st = self.state();
        st.connect_attempts += 1;
        if !st.available {
            return Err(TransportError::Unavailable);
        }
        if service != SERVICE_UUID {
            return Err(TransportError::NotFound);
        }
        if let Some(err) = st.connect_failure.clone() {
            return Err(err);
        }
        let id = st.next_id;
        st.next_id += 1;
        st.current = Some(id);
        st.link_up = true;
        info!("SimTransport: connected (handle {})", id);
        Ok(SimHandle(id))
    }

    fn device_name(&self, _handle: &SimHandle) -> Option<String> {
        self.state().device_name.clone()
    }

    fn open_notify(
        &mut self,
        handle: &SimHandle,
        characteristic: u128,
        listener: Arc<dyn TransportListener>,
    ) -> Result<(), TransportError> {
        let mut st = self.state();
        if st.current != Some(handle.0) {
            return Err(TransportError::Disconnected);
        }
        if characteristic != CHAR_SENSOR {
            return Err(TransportError::NotFound);
        }
        if let Some(err) = st.notify_failure.clone() {
            return Err(err);
        }
        st.listener = Some(listener);
        Ok(())
    }

    fn read_characteristic(
        &mut self,
        handle: &SimHandle,
        characteristic: u128,
    ) -> Result<Vec<u8>, TransportError> {
        let st = self.state();
        if st.current != Some(handle.0) {
            return Err(TransportError::Disconnected);
        }
        if characteristic != CHAR_SENSOR {
            return Err(TransportError::NotFound);
        }
        Ok(st.sensor_value.clone())
    }

    fn write_characteristic(
        &mut self,
        handle: &SimHandle,
        characteristic: u128,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let mut st = self.state();
        if st.current != Some(handle.0) {
            return Err(TransportError::Disconnected);
        }
        if characteristic != CHAR_COMMAND {
            return Err(TransportError::NotFound);
        }
        if let Some(err) = st.write_failure.clone() {
            return Err(err);
        }
        let line = String::from_utf8_lossy(bytes).into_owned();
        match parse_command(&line) {
            Some(cmd) if cmd.mode == TxMode::StartRepeat => st.repeating = Some(cmd.value),
            Some(cmd) if cmd.mode == TxMode::Stop => st.repeating = None,
            Some(_) => {}
            None => debug!("SimTransport: device ignored malformed command {:?}", line),
        }
        st.writes.push(line);
        Ok(())
    }

    fn is_connected(&self, handle: &SimHandle) -> bool {
        let st = self.state();
        st.current == Some(handle.0) && st.link_up
    }

    fn close(&mut self, handle: SimHandle) {
        let mut st = self.state();
        st.closes += 1;
        if st.current == Some(handle.0) {
            st.current = None;
            st.link_up = false;
            st.listener = None;
            st.repeating = None;
        }
    }
}

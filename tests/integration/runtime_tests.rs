//! Session actor on a real thread with real timers.

use std::thread;
use std::time::{Duration, Instant};

use reverb::adapters::blob_store::MemoryBlobStore;
use reverb::adapters::location::{FixedLocation, NoLocation};
use reverb::adapters::sim_transport::SimTransport;
use reverb::app::commands::{CommandOutcome, SessionCommand};
use reverb::app::events::SessionEvent;
use reverb::app::ports::{StorageError, StoragePort};
use reverb::catalog::persist::{LIVE_KEY, NAMESPACE};
use reverb::config::SessionConfig;
use reverb::error::SessionError;
use reverb::fsm::StateId;
use reverb::runtime::{MAILBOX_DEPTH, SessionHandle, spawn};
use reverb::transmit::StopReason;

const WAIT: Duration = Duration::from_secs(3);

fn wait_for(handle: &SessionHandle, pred: impl Fn(&SessionEvent) -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match handle.next_event(left) {
            Some(e) if pred(&e) => return true,
            Some(_) => {}
            None => return false,
        }
    }
    false
}

/// Round-trip through the mailbox so the snapshot covers every event
/// seen so far.
fn settle(handle: &SessionHandle) {
    handle.request(SessionCommand::StopRepeating).unwrap();
}

/// Memory store that takes a while per write, so the actor falls behind
/// the transport.
#[derive(Clone)]
struct SlowStore {
    inner: MemoryBlobStore,
    delay: Duration,
}

impl StoragePort for SlowStore {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.read(namespace, key)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        thread::sleep(self.delay);
        self.inner.write(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.inner.delete(namespace, key)
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.inner.exists(namespace, key)
    }
}

fn signal_json(i: usize) -> Vec<u8> {
    format!(r#"{{"data":"{i}","freq":433.92,"rssi":-50}}"#).into_bytes()
}

fn start() -> (SessionHandle, SimTransport, MemoryBlobStore) {
    let device = SimTransport::new();
    let store = MemoryBlobStore::new();
    let handle = spawn(
        SessionConfig::default(),
        device.clone(),
        store.clone(),
        FixedLocation::new(40.0, -3.7),
    )
    .unwrap();
    (handle, device, store)
}

#[test]
fn request_connect_then_transmit() {
    let (handle, device, _) = start();
    assert_eq!(handle.snapshot().state, StateId::Disconnected);

    assert_eq!(handle.request(SessionCommand::Connect), Ok(CommandOutcome::Done));
    assert_eq!(handle.snapshot().state, StateId::Connected);

    handle
        .request(SessionCommand::TransmitOnce { value: "12".into() })
        .unwrap();
    assert_eq!(device.writes(), ["TX,1,0,0,12"]);
    assert_eq!(
        handle.snapshot().last_outbound_value.as_deref(),
        Some("TX,1,0,0,12")
    );
    handle.shutdown().unwrap();
}

#[test]
fn errors_come_back_to_the_caller() {
    let (handle, _, _) = start();
    assert_eq!(
        handle.request(SessionCommand::TransmitOnce { value: "1".into() }),
        Err(SessionError::NotConnected)
    );
}

#[test]
fn notifications_are_ingested_and_enriched() {
    let (handle, device, store) = start();
    handle.request(SessionCommand::Connect).unwrap();

    device.notify(br#"{"data":"0xA1","freq":433.92,"rssi":-45}"#);
    assert!(wait_for(&handle, |e| matches!(
        e,
        SessionEvent::SignalEnriched(_)
    )));
    settle(&handle);

    let snap = handle.snapshot();
    assert_eq!(snap.live_signals, 1);
    assert_eq!(snap.history_records, 2);
    let live: serde_json::Value =
        serde_json::from_slice(&store.read(NAMESPACE, LIVE_KEY).unwrap()).unwrap();
    assert_eq!(live[0]["latitude"], 40.0);
}

#[test]
fn no_location_leaves_history_at_one_record() {
    let device = SimTransport::new();
    let handle = spawn(
        SessionConfig::default(),
        device.clone(),
        MemoryBlobStore::new(),
        NoLocation,
    )
    .unwrap();
    handle.request(SessionCommand::Connect).unwrap();
    device.notify(br#"{"data":"1","freq":1,"rssi":-1}"#);
    assert!(wait_for(&handle, |e| matches!(
        e,
        SessionEvent::SignalIngested { .. }
    )));
    settle(&handle);
    assert_eq!(handle.snapshot().history_records, 1);
}

#[test]
fn auto_stop_fires_on_the_actor_timer() {
    let (handle, device, _) = start();
    handle.request(SessionCommand::Connect).unwrap();
    handle
        .request(SessionCommand::StartRepeating {
            value: "5".into(),
            auto_stop_after_ms: "150".into(),
            repeat_interval_ms: "10".into(),
        })
        .unwrap();
    assert!(handle.snapshot().transmitting);

    assert!(wait_for(&handle, |e| *e
        == SessionEvent::TransmitStopped(StopReason::AutoStop)));
    settle(&handle);
    assert_eq!(device.stop_count(), 1);
    assert!(!handle.snapshot().transmitting);
}

#[test]
fn link_drop_reaches_the_actor() {
    let (handle, device, _) = start();
    handle.request(SessionCommand::Connect).unwrap();
    device.drop_link();
    assert!(wait_for(&handle, |e| matches!(
        e,
        SessionEvent::StateChanged {
            to: StateId::Disconnected,
            ..
        }
    )));
    settle(&handle);
    assert_eq!(handle.snapshot().device_label, "-");
}

#[test]
fn shutdown_stops_transmission_and_closes_link() {
    let (handle, device, _) = start();
    handle.request(SessionCommand::Connect).unwrap();
    handle
        .request(SessionCommand::StartRepeating {
            value: "5".into(),
            auto_stop_after_ms: "60000".into(),
            repeat_interval_ms: "100".into(),
        })
        .unwrap();

    handle.shutdown().unwrap();
    assert_eq!(device.stop_count(), 1);
    assert!(!device.is_link_open());
}

#[test]
fn snapshot_reflects_persisted_catalog_at_spawn() {
    let mut store = MemoryBlobStore::new();
    store
        .write(
            NAMESPACE,
            LIVE_KEY,
            br#"[{"id":"a","frequency":1,"data":"x","rssi":-1,"timestamp":5}]"#,
        )
        .unwrap();
    let handle = spawn(
        SessionConfig::default(),
        SimTransport::new(),
        store,
        NoLocation,
    )
    .unwrap();
    assert_eq!(handle.snapshot().live_signals, 1);
}

#[test]
fn invalid_config_is_refused() {
    let config = SessionConfig {
        replay_gap_ms: 0,
        ..Default::default()
    };
    let err = spawn(config, SimTransport::new(), MemoryBlobStore::new(), NoLocation)
        .err()
        .unwrap();
    assert!(err.to_string().contains("invalid session config"));
}

#[test]
fn link_drop_behind_a_full_mailbox_still_disconnects() {
    let device = SimTransport::new();
    let store = SlowStore {
        inner: MemoryBlobStore::new(),
        delay: Duration::from_millis(3),
    };
    let handle = spawn(SessionConfig::default(), device.clone(), store, NoLocation).unwrap();
    handle.request(SessionCommand::Connect).unwrap();
    handle
        .request(SessionCommand::StartRepeating {
            value: "5".into(),
            auto_stop_after_ms: "60000".into(),
            repeat_interval_ms: "100".into(),
        })
        .unwrap();

    for i in 0..MAILBOX_DEPTH + 20 {
        device.notify(&signal_json(i));
    }
    device.drop_link();

    assert!(wait_for(&handle, |e| *e
        == SessionEvent::TransmitStopped(StopReason::SessionLost)));
    assert!(wait_for(&handle, |e| matches!(
        e,
        SessionEvent::StateChanged {
            to: StateId::Disconnected,
            ..
        }
    )));
    settle(&handle);

    let snap = handle.snapshot();
    assert_eq!(snap.state, StateId::Disconnected);
    assert!(!snap.transmitting);
    assert_eq!(
        handle.request(SessionCommand::TransmitOnce { value: "1".into() }),
        Err(SessionError::NotConnected)
    );
}

#[test]
fn notification_burst_keeps_the_actor_alive() {
    let device = SimTransport::new();
    let handle = spawn(
        SessionConfig::default(),
        device.clone(),
        MemoryBlobStore::new(),
        FixedLocation::new(40.0, -3.7).with_delay(Duration::from_millis(20)),
    )
    .unwrap();
    handle.request(SessionCommand::Connect).unwrap();

    for i in 0..400 {
        device.notify(&signal_json(i));
        thread::sleep(Duration::from_millis(1));
    }

    assert!(wait_for(&handle, |e| matches!(
        e,
        SessionEvent::SignalEnriched(_)
    )));
    assert!(handle.is_running());
    settle(&handle);
    let snap = handle.snapshot();
    assert_eq!(snap.state, StateId::Connected);
    assert!(snap.live_signals > 0);
    handle.shutdown().unwrap();
}

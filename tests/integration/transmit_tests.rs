//! Single-shot, repeat and replay transmission against the simulated
//! bridge.

use crate::harness::Harness;

use reverb::adapters::blob_store::MemoryBlobStore;
use reverb::app::commands::{CommandOutcome, ReplaySelection, SessionCommand};
use reverb::app::events::SessionEvent;
use reverb::config::SessionConfig;
use reverb::error::{SessionError, TransportError};
use reverb::fsm::StateId;
use reverb::transmit::{StopReason, TransmitState};

const STOP: &str = "TX,0,0,0,0";

fn start(h: &mut Harness, value: &str, auto: &str, interval: &str) -> Result<(), SessionError> {
    h.service
        .start_repeating(value, auto, interval, h.now, &mut h.sink)
}

// ── Single shot ───────────────────────────────────────────────

#[test]
fn transmit_once_writes_canonical_number() {
    let mut h = Harness::connected();
    h.service.transmit_once(" 0x1F ", &mut h.sink).unwrap();
    h.service.transmit_once("433.920", &mut h.sink).unwrap();
    assert_eq!(h.writes(), ["TX,1,0,0,31", "TX,1,0,0,433.92"]);
    assert_eq!(
        h.service.context().last_outbound_value.as_deref(),
        Some("TX,1,0,0,433.92")
    );
}

#[test]
fn transmit_once_rejects_non_numeric_without_writing() {
    let mut h = Harness::connected();
    for bad in ["", "abc", "Infinity", "1,2"] {
        assert_eq!(
            h.service.transmit_once(bad, &mut h.sink),
            Err(SessionError::InvalidInput("value")),
            "{bad:?}"
        );
    }
    assert!(h.writes().is_empty());
}

#[test]
fn transmit_once_surfaces_write_failure() {
    let mut h = Harness::connected();
    h.device
        .set_write_failure(Some(TransportError::Io("busy".into())));
    let err = h.service.transmit_once("5", &mut h.sink).unwrap_err();
    assert!(matches!(err, SessionError::WriteFailed(_)));
    assert_eq!(h.service.context().last_outbound_value, None);
    assert_eq!(
        h.sink
            .count(|e| matches!(e, SessionEvent::WriteFailed { .. })),
        1
    );
}

// ── Repeat ────────────────────────────────────────────────────

#[test]
fn start_repeating_writes_start_command() {
    let mut h = Harness::connected();
    start(&mut h, "5", "3000", "100").unwrap();

    assert_eq!(h.writes(), ["TX,2,3000,100,5"]);
    assert!(matches!(
        h.service.transmit_state(),
        TransmitState::Transmitting(job) if job.payload == "5"
    ));
    assert_eq!(h.device.device_repeating().as_deref(), Some("5"));
}

#[test]
fn auto_stop_fires_exactly_one_stop_write() {
    let mut h = Harness::connected();
    start(&mut h, "5", "1000", "100").unwrap();

    h.advance(999);
    assert!(h.service.snapshot().transmitting);

    h.advance(1);
    assert_eq!(*h.service.transmit_state(), TransmitState::Idle);
    assert_eq!(h.writes(), ["TX,2,1000,100,5", STOP]);
    assert!(h
        .sink
        .events
        .contains(&SessionEvent::TransmitStopped(StopReason::AutoStop)));

    // Nothing more fires later.
    h.advance(10_000);
    assert_eq!(h.device.stop_count(), 1);
}

#[test]
fn second_start_is_rejected_while_transmitting() {
    let mut h = Harness::connected();
    start(&mut h, "5", "3000", "100").unwrap();
    assert_eq!(
        start(&mut h, "6", "3000", "100"),
        Err(SessionError::AlreadyTransmitting)
    );
    assert_eq!(h.writes().len(), 1);
}

#[test]
fn invalid_repeat_parameters_leave_controller_idle() {
    let mut h = Harness::connected();
    assert_eq!(
        start(&mut h, "5", "0", "100"),
        Err(SessionError::InvalidInput("auto-stop"))
    );
    assert_eq!(
        start(&mut h, "5", "1000", "-1"),
        Err(SessionError::InvalidInput("repeat interval"))
    );
    assert_eq!(
        start(&mut h, "x", "1000", "100"),
        Err(SessionError::InvalidInput("value"))
    );
    assert_eq!(*h.service.transmit_state(), TransmitState::Idle);
    assert!(h.writes().is_empty());
}

#[test]
fn blank_repeat_fields_use_configured_defaults() {
    let config = SessionConfig {
        default_auto_stop_ms: 1_500,
        default_repeat_interval_ms: 250,
        ..Default::default()
    };
    let mut h = Harness::with(config, MemoryBlobStore::new());
    h.connect();

    start(&mut h, "5", "", "  ").unwrap();
    assert_eq!(h.writes(), ["TX,2,1500,250,5"]);

    h.advance(1_500);
    assert_eq!(h.writes(), ["TX,2,1500,250,5", STOP]);

    start(&mut h, "6", "", "40").unwrap();
    assert_eq!(h.writes()[2], "TX,2,1500,40,6");
}

#[test]
fn failed_start_write_leaves_controller_idle() {
    let mut h = Harness::connected();
    h.device.set_write_failure(Some(TransportError::Disconnected));
    assert!(start(&mut h, "5", "1000", "100").is_err());
    assert_eq!(*h.service.transmit_state(), TransmitState::Idle);
    // Only the liveness poll is armed.
    assert_eq!(h.service.next_deadline(), Some(h.now + 2_000));
    h.device.set_write_failure(None);
    start(&mut h, "5", "1000", "100").unwrap();
}

#[test]
fn operator_stop_writes_stop_and_cancels_auto_stop() {
    let mut h = Harness::connected();
    start(&mut h, "5", "1000", "100").unwrap();
    h.service.stop_repeating(&mut h.sink).unwrap();

    assert_eq!(h.writes(), ["TX,2,1000,100,5", STOP]);
    h.advance(5_000);
    assert_eq!(h.device.stop_count(), 1);
    assert_eq!(h.device.device_repeating(), None);
}

#[test]
fn stop_while_idle_writes_nothing() {
    let mut h = Harness::connected();
    h.service.stop_repeating(&mut h.sink).unwrap();
    assert!(h.writes().is_empty());
}

#[test]
fn failed_stop_write_still_ends_job() {
    let mut h = Harness::connected();
    start(&mut h, "5", "1000", "100").unwrap();
    h.device.set_write_failure(Some(TransportError::Io("gone".into())));
    assert!(h.service.stop_repeating(&mut h.sink).is_err());
    assert_eq!(*h.service.transmit_state(), TransmitState::Idle);
}

#[test]
fn link_drop_while_transmitting_forces_one_stop_attempt() {
    let mut h = Harness::connected();
    start(&mut h, "5", "10000", "100").unwrap();

    h.device.drop_link();
    h.pump();

    assert_eq!(h.service.state(), StateId::Disconnected);
    assert_eq!(*h.service.transmit_state(), TransmitState::Idle);
    // The link is already gone, so the stop write fails and is ignored.
    let stop_attempts = h.sink.count(|e| {
        matches!(e, SessionEvent::WriteFailed { command, .. } if command == STOP)
            || matches!(e, SessionEvent::CommandWritten(c) if c == STOP)
    });
    assert_eq!(stop_attempts, 1);
    assert!(h
        .sink
        .events
        .contains(&SessionEvent::TransmitStopped(StopReason::SessionLost)));
    assert_eq!(h.service.next_deadline(), None);
}

#[test]
fn operator_disconnect_while_transmitting_sends_stop_first() {
    let mut h = Harness::connected();
    start(&mut h, "5", "10000", "100").unwrap();
    h.service.disconnect(h.now, &mut h.sink).unwrap();
    assert_eq!(h.writes(), ["TX,2,10000,100,5", STOP]);
}

// ── Replay ────────────────────────────────────────────────────

fn seed(h: &mut Harness) {
    for (i, data) in ["11", "22", "33"].iter().enumerate() {
        h.now += 1_000;
        h.notify(&format!(
            r#"{{"data":"{data}","freq":433.92,"rssi":-{}}}"#,
            40 + i
        ));
    }
}

#[test]
fn replay_sends_selection_paced_by_gap() {
    let mut h = Harness::connected();
    seed(&mut h);

    let queued = h
        .service
        .replay(ReplaySelection::everything(), h.now, &mut h.sink)
        .unwrap();
    assert_eq!(queued, 3);
    assert_eq!(h.writes(), ["TX,1,0,0,11"]);

    h.advance(299);
    assert_eq!(h.writes().len(), 1);
    h.advance(1);
    h.advance(300);
    assert_eq!(h.writes(), ["TX,1,0,0,11", "TX,1,0,0,22", "TX,1,0,0,33"]);
    assert_eq!(h.service.snapshot().replay_remaining, 0);
}

#[test]
fn replay_time_window_is_inclusive() {
    let mut h = Harness::connected();
    let base = h.now;
    seed(&mut h);
    let queued = h
        .service
        .replay(
            ReplaySelection::between(base + 2_000, base + 3_000),
            h.now,
            &mut h.sink,
        )
        .unwrap();
    assert_eq!(queued, 2);
    assert_eq!(h.writes(), ["TX,1,0,0,22"]);
}

#[test]
fn empty_replay_is_a_no_op() {
    let mut h = Harness::connected();
    assert_eq!(
        h.service
            .replay(ReplaySelection::everything(), h.now, &mut h.sink),
        Ok(0)
    );
    assert!(h.writes().is_empty());
}

#[test]
fn replay_skips_values_that_cannot_be_framed() {
    let mut h = Harness::connected();
    h.notify(r#"{"data":"a,b","freq":1,"rssi":-1}"#);
    h.notify(r#"{"data":"ok","freq":1,"rssi":-1}"#);
    let queued = h
        .service
        .replay(ReplaySelection::everything(), h.now, &mut h.sink)
        .unwrap();
    assert_eq!(queued, 1);
    assert_eq!(h.writes(), ["TX,1,0,0,ok"]);
}

#[test]
fn replay_and_repeat_exclude_each_other() {
    let mut h = Harness::connected();
    seed(&mut h);
    start(&mut h, "5", "10000", "100").unwrap();
    assert_eq!(
        h.service
            .replay(ReplaySelection::everything(), h.now, &mut h.sink),
        Err(SessionError::AlreadyTransmitting)
    );
    h.service.stop_repeating(&mut h.sink).unwrap();

    h.service
        .replay(ReplaySelection::everything(), h.now, &mut h.sink)
        .unwrap();
    assert_eq!(
        start(&mut h, "5", "10000", "100"),
        Err(SessionError::AlreadyTransmitting)
    );
}

#[test]
fn disconnect_cancels_remaining_replay() {
    let mut h = Harness::connected();
    seed(&mut h);
    h.service
        .replay(ReplaySelection::everything(), h.now, &mut h.sink)
        .unwrap();
    h.service.disconnect(h.now, &mut h.sink).unwrap();
    h.advance(1_000);
    assert_eq!(h.writes(), ["TX,1,0,0,11"]);
    assert_eq!(h.service.snapshot().replay_remaining, 0);
}

#[test]
fn replay_requires_connection() {
    let mut h = Harness::new();
    assert_eq!(
        h.service
            .replay(ReplaySelection::everything(), h.now, &mut h.sink),
        Err(SessionError::NotConnected)
    );
}

// ── Command dispatch ──────────────────────────────────────────

#[test]
fn handle_command_routes_transmit_and_replay() {
    let mut h = Harness::connected();
    seed(&mut h);
    let out = h
        .service
        .handle_command(
            SessionCommand::TransmitOnce { value: "8".into() },
            h.now,
            &mut h.sink,
        )
        .unwrap();
    assert_eq!(out, CommandOutcome::Done);

    let out = h
        .service
        .handle_command(
            SessionCommand::Replay(ReplaySelection::everything()),
            h.now,
            &mut h.sink,
        )
        .unwrap();
    assert_eq!(out, CommandOutcome::ReplayQueued(3));

    let err = h
        .service
        .handle_command(
            SessionCommand::StartRepeating {
                value: "1".into(),
                auto_stop_after_ms: "100".into(),
                repeat_interval_ms: "10".into(),
            },
            h.now,
            &mut h.sink,
        )
        .unwrap_err();
    assert_eq!(err, SessionError::AlreadyTransmitting);
}

//! Catalog persistence, clearing, nicknames and export through the
//! session service.

use crate::harness::Harness;

use reverb::adapters::blob_store::{FileBlobStore, MemoryBlobStore};
use reverb::adapters::sim_transport::SimTransport;
use reverb::app::commands::{CommandOutcome, SessionCommand};
use reverb::app::ports::StoragePort;
use reverb::app::service::SessionService;
use reverb::catalog::persist::{HISTORY_KEY, LIVE_KEY, NAMESPACE};
use reverb::config::SessionConfig;
use serde_json::Value;

use std::sync::Arc;

fn stored(store: &MemoryBlobStore, key: &str) -> Value {
    serde_json::from_slice(&store.read(NAMESPACE, key).unwrap()).unwrap()
}

#[test]
fn ingest_persists_both_collections() {
    let mut h = Harness::connected();
    h.notify(r#"{"data":"0xA1","freq":433.92,"rssi":-45}"#);
    h.notify(r#"{"data":"0xA1","freq":433.92,"rssi":-50}"#);

    let live = stored(&h.store, LIVE_KEY);
    let history = stored(&h.store, HISTORY_KEY);
    assert_eq!(live.as_array().unwrap().len(), 1);
    assert_eq!(history.as_array().unwrap().len(), 2);
    assert_eq!(live[0]["rssi"], -50);
    assert_eq!(live[0]["data"], "0xA1");
    assert_eq!(live[0]["frequency"], 433.92);
    assert!(live[0].get("latitude").is_none());
}

#[test]
fn catalog_survives_a_restart() {
    let store = MemoryBlobStore::new();
    {
        let mut h = Harness::with_store(store.clone());
        h.connect();
        h.notify(r#"{"data":"1","freq":315,"rssi":-60}"#);
        h.notify(r#"{"data":"2","freq":315,"rssi":-61}"#);
    }

    let h = Harness::with_store(store);
    assert_eq!(h.service.catalog().live_len(), 2);
    assert_eq!(h.service.catalog().history_len(), 2);
    assert!(h.service.catalog().find("2", 315.0).is_some());
}

#[test]
fn corrupt_live_blob_loads_empty_and_keeps_history() {
    let mut store = MemoryBlobStore::new();
    store.write(NAMESPACE, LIVE_KEY, b"{not json").unwrap();
    store
        .write(
            NAMESPACE,
            HISTORY_KEY,
            br#"[{"id":"a","frequency":1,"data":"x","rssi":-1,"timestamp":5},{"bogus":true}]"#,
        )
        .unwrap();

    let h = Harness::with_store(store);
    assert_eq!(h.service.catalog().live_len(), 0);
    assert_eq!(h.service.catalog().history_len(), 1);
}

#[test]
fn enrichment_is_persisted_with_flat_coordinates() {
    let mut h = Harness::connected();
    h.notify(r#"{"data":"7","freq":868,"rssi":-30}"#);
    let req = h.service.take_enrichment_requests().remove(0);
    h.service.complete_enrichment(
        &req,
        Some(reverb::catalog::Location {
            latitude: 1.5,
            longitude: -2.25,
        }),
        h.now,
        &mut h.sink,
    );

    let live = stored(&h.store, LIVE_KEY);
    assert_eq!(live[0]["latitude"], 1.5);
    assert_eq!(live[0]["longitude"], -2.25);
    let history = stored(&h.store, HISTORY_KEY);
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[test]
fn nickname_labels_every_matching_entry_and_persists() {
    let mut h = Harness::connected();
    h.notify(r#"{"data":"5","freq":315,"rssi":-1}"#);
    h.notify(r#"{"data":"5","freq":433.92,"rssi":-1}"#);
    h.notify(r#"{"data":"6","freq":315,"rssi":-1}"#);

    let out = h
        .service
        .handle_command(
            SessionCommand::SetNickname {
                data: "5".into(),
                nickname: "garage".into(),
            },
            h.now,
            &mut h.sink,
        )
        .unwrap();
    assert_eq!(out, CommandOutcome::Renamed(2));

    let live = stored(&h.store, LIVE_KEY);
    let named: Vec<&Value> = live
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["nickname"] == "garage")
        .collect();
    assert_eq!(named.len(), 2);
}

#[test]
fn nickname_for_unknown_data_changes_nothing() {
    let mut h = Harness::connected();
    h.notify(r#"{"data":"5","freq":315,"rssi":-1}"#);
    assert_eq!(h.service.set_nickname("nope", "x", &mut h.sink), 0);
    assert_eq!(h.service.catalog().find("5", 315.0).unwrap().nickname, None);
}

#[test]
fn clear_live_keeps_history() {
    let mut h = Harness::connected();
    h.notify(r#"{"data":"5","freq":315,"rssi":-1}"#);
    h.service.clear_live(&mut h.sink);

    assert_eq!(h.service.catalog().live_len(), 0);
    assert_eq!(h.service.catalog().history_len(), 1);
    assert!(!h.store.exists(NAMESPACE, LIVE_KEY));
    assert!(h.store.exists(NAMESPACE, HISTORY_KEY));
}

#[test]
fn clear_all_erases_both_keys() {
    let mut h = Harness::connected();
    h.notify(r#"{"data":"5","freq":315,"rssi":-1}"#);
    h.service
        .handle_command(SessionCommand::ClearAll, h.now, &mut h.sink)
        .unwrap();

    assert_eq!(h.service.catalog().live_len(), 0);
    assert_eq!(h.service.catalog().history_len(), 0);
    assert!(!h.store.exists(NAMESPACE, LIVE_KEY));
    assert!(!h.store.exists(NAMESPACE, HISTORY_KEY));

    let reloaded = Harness::with_store(h.store.clone());
    assert_eq!(reloaded.service.catalog().history_len(), 0);
}

#[test]
fn export_contains_live_set_only() {
    let mut h = Harness::connected();
    h.notify(r#"{"data":"a","freq":1,"rssi":-1}"#);
    h.notify(r#"{"data":"a","freq":1,"rssi":-2}"#);

    let CommandOutcome::Exported(doc) = h
        .service
        .handle_command(SessionCommand::Export, h.now, &mut h.sink)
        .unwrap()
    else {
        panic!("expected an export document");
    };
    assert_eq!(doc.filename, "reverb_signals_2023-11-14T22-13-20-000Z.json");
    let parsed: Value = serde_json::from_str(&doc.contents).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 1);
    assert!(doc.contents.contains("\n  {"), "two-space indentation");
}

#[test]
fn export_works_while_disconnected() {
    let h = Harness::new();
    let doc = h.service.export(h.now).unwrap();
    assert_eq!(doc.contents, "[]");
}

#[test]
fn file_store_backs_a_full_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileBlobStore::open(dir.path()).unwrap();
    let device = SimTransport::new();
    let listener = Arc::new(crate::harness::QueueListener::default());
    let mut sink = crate::harness::RecordingSink::default();

    let mut service = SessionService::new(
        SessionConfig::default(),
        device.clone(),
        store.clone(),
        listener.clone(),
    );
    service.start(&mut sink);
    service.connect(1_000, &mut sink).unwrap();
    device.notify(br#"{"data":"1","freq":2,"rssi":-3}"#);
    for event in listener.drain() {
        service.on_transport_event(event, 1_000, &mut sink);
    }

    assert!(dir.path().join("reverb").join(LIVE_KEY).is_file());
    let again = SessionService::new(SessionConfig::default(), SimTransport::new(), store, listener);
    assert_eq!(again.catalog().live_len(), 1);
}

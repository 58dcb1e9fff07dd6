//! Catalog persistence through the blob store.
//!
//! Two independent JSON arrays under fixed keys in the `reverb`
//! namespace.  Loading never fails: a missing blob, a blob that is not a
//! JSON array, or an individual record that does not parse is treated as
//! empty / skipped.

use log::{debug, warn};
use serde_json::Value;

use super::{Catalog, Signal};
use crate::app::ports::{StorageError, StoragePort};

pub const NAMESPACE: &str = "reverb";
pub const LIVE_KEY: &str = "reverb_signals";
pub const HISTORY_KEY: &str = "reverb_signals_history";

/// Rebuild the catalog from storage.
pub fn load(storage: &impl StoragePort) -> Catalog {
    let live = load_collection(storage, LIVE_KEY);
    let history = load_collection(storage, HISTORY_KEY);
    debug!(
        "CATALOG: loaded {} live, {} history records",
        live.len(),
        history.len()
    );
    Catalog::from_parts(live, history)
}

pub fn save_live(storage: &mut impl StoragePort, catalog: &Catalog) -> Result<(), StorageError> {
    let records: Vec<&Signal> = catalog.export_live().collect();
    write_collection(storage, LIVE_KEY, &records)
}

pub fn save_history(storage: &mut impl StoragePort, catalog: &Catalog) -> Result<(), StorageError> {
    let records: Vec<&Signal> = catalog.history().iter().collect();
    write_collection(storage, HISTORY_KEY, &records)
}

pub fn erase_live(storage: &mut impl StoragePort) -> Result<(), StorageError> {
    storage.delete(NAMESPACE, LIVE_KEY)
}

pub fn erase_history(storage: &mut impl StoragePort) -> Result<(), StorageError> {
    storage.delete(NAMESPACE, HISTORY_KEY)
}

fn write_collection(
    storage: &mut impl StoragePort,
    key: &str,
    records: &[&Signal],
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec(records).map_err(|_| StorageError::IoError)?;
    storage.write(NAMESPACE, key, &bytes)
}

fn load_collection(storage: &impl StoragePort, key: &str) -> Vec<Signal> {
    let bytes = match storage.read(NAMESPACE, key) {
        Ok(b) => b,
        Err(StorageError::NotFound) => return Vec::new(),
        Err(e) => {
            warn!("CATALOG: reading '{}' failed: {} (starting empty)", key, e);
            return Vec::new();
        }
    };

    let Ok(Value::Array(items)) = serde_json::from_slice::<Value>(&bytes) else {
        warn!("CATALOG: '{}' is not a JSON array (starting empty)", key);
        return Vec::new();
    };

    let total = items.len();
    let records: Vec<Signal> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if records.len() != total {
        warn!(
            "CATALOG: skipped {} unreadable record(s) in '{}'",
            total - records.len(),
            key
        );
    }
    records
}

//! On-demand export of the live set as a timestamped JSON document.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use super::{Catalog, Signal};
use crate::error::SessionError;

/// A rendered export, ready to hand to whatever saves files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub filename: String,
    /// Pretty-printed JSON array, two-space indent.
    pub contents: String,
}

impl ExportDocument {
    /// Write the document into `dir` under its own filename.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let path = dir.join(&self.filename);
        std::fs::write(&path, self.contents.as_bytes())?;
        Ok(path)
    }
}

/// `reverb_signals_2026-10-19T08-15-30-123Z.json` for the given Unix ms.
pub fn export_filename(now_ms: u64) -> String {
    let when = i64::try_from(now_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default();
    let iso = when
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("reverb_signals_{iso}.json")
}

/// Serialise the live set in live-set order.
pub fn export_document(catalog: &Catalog, now_ms: u64) -> Result<ExportDocument, SessionError> {
    let records: Vec<&Signal> = catalog.export_live().collect();
    let contents = serde_json::to_string_pretty(&records).map_err(|_| SessionError::ExportFailed)?;
    Ok(ExportDocument {
        filename: export_filename(now_ms),
        contents,
    })
}

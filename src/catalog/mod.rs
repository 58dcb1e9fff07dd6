//! Signal catalog: the deduplicated live set plus the append-only history.
//!
//! ```text
//!   ParsedSignal ──ingest──▶ history.push(new)
//!                       └──▶ live[(data, frequency)] = new   (slot kept on replace)
//!
//!   (id, Location) ──enrich──▶ live[id].location = Some(..)   (no-op if id superseded)
//!                         └──▶ history.push(base + location)
//! ```
//!
//! The live set holds at most one entry per `(data, frequency)`.  Replacing
//! an entry keeps its position, so [`Catalog::export_live`] yields entries in
//! first-seen order of their keys.  Callers wanting recency order use
//! [`Catalog::live_by_recency`].
//!
//! The catalog itself never touches storage; see [`persist`].

pub mod export;
pub mod persist;
pub mod signal;

use std::collections::HashMap;

use log::debug;

use crate::protocol::ParsedSignal;

pub use signal::{Location, Signal, SignalId};

/// Dedup key.  Frequency is keyed by its bit pattern with `-0.0`
/// normalised, so `433.92` and `433.920` are the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LiveKey {
    data: String,
    freq_bits: u64,
}

impl LiveKey {
    fn new(data: &str, frequency: f64) -> Self {
        let f = if frequency == 0.0 { 0.0 } else { frequency };
        Self {
            data: data.to_string(),
            freq_bits: f.to_bits(),
        }
    }

    fn of(signal: &Signal) -> Self {
        Self::new(&signal.data, signal.frequency)
    }
}

/// Result of one [`Catalog::ingest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    pub id: SignalId,
    /// Id of the live entry this one displaced, if any.
    pub replaced: Option<SignalId>,
}

#[derive(Debug, Default)]
pub struct Catalog {
    live: Vec<Signal>,
    index: HashMap<LiveKey, usize>,
    history: Vec<Signal>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted collections.  Later duplicates in `live`
    /// replace earlier ones in place, same as ingestion.
    pub fn from_parts(live: Vec<Signal>, history: Vec<Signal>) -> Self {
        let mut catalog = Self {
            history,
            ..Self::default()
        };
        for signal in live {
            catalog.upsert(signal);
        }
        catalog
    }

    // ── Mutation ──────────────────────────────────────────────

    /// Record a freshly decoded signal captured at `now` (Unix ms).
    pub fn ingest(&mut self, parsed: &ParsedSignal, now: u64) -> Ingested {
        let signal = Signal {
            id: SignalId::generate(),
            frequency: parsed.frequency,
            data: parsed.data.clone(),
            rssi: parsed.rssi,
            timestamp: now,
            location: None,
            nickname: None,
        };
        let id = signal.id.clone();
        self.history.push(signal.clone());
        let replaced = self.upsert(signal);
        debug!(
            "CATALOG: ingest {} data={} freq={} (live={}, history={})",
            id,
            parsed.data,
            parsed.frequency,
            self.live.len(),
            self.history.len()
        );
        Ingested { id, replaced }
    }

    /// Attach `location` to the live entry with `id`.
    ///
    /// Returns `false` and changes nothing when `id` is no longer live
    /// (superseded by a later ingest, or cleared).
    pub fn enrich(&mut self, id: &SignalId, location: Location) -> bool {
        let Some(entry) = self.live.iter_mut().find(|s| &s.id == id) else {
            debug!("CATALOG: enrich {} dropped, id no longer live", id);
            return false;
        };
        let base = entry.clone();
        entry.location = Some(location);
        self.history.push(base.located(location));
        true
    }

    /// Label every live entry whose `data` matches exactly, whatever its
    /// frequency.  Returns the number of entries updated.
    pub fn set_nickname(&mut self, data: &str, nickname: &str) -> usize {
        let mut updated = 0;
        for signal in self.live.iter_mut().filter(|s| s.data == data) {
            signal.nickname = Some(nickname.to_string());
            updated += 1;
        }
        updated
    }

    pub fn clear_live(&mut self) {
        self.live.clear();
        self.index.clear();
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn clear_all(&mut self) {
        self.clear_live();
        self.clear_history();
    }

    // ── Queries ───────────────────────────────────────────────

    /// Live entries in live-set order.
    pub fn export_live(&self) -> impl ExactSizeIterator<Item = &Signal> + '_ {
        self.live.iter()
    }

    /// Live entries, newest first.
    pub fn live_by_recency(&self) -> Vec<&Signal> {
        let mut v: Vec<&Signal> = self.live.iter().collect();
        v.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        v
    }

    /// History records in append order.
    pub fn history(&self) -> &[Signal] {
        &self.history
    }

    /// History records, newest first.
    pub fn history_newest_first(&self) -> impl Iterator<Item = &Signal> + '_ {
        self.history.iter().rev()
    }

    /// Live entries whose timestamp lies in `[start, end]`.  Either bound
    /// may be omitted.
    pub fn select_range(&self, start: Option<u64>, end: Option<u64>) -> Vec<&Signal> {
        self.live
            .iter()
            .filter(|s| start.is_none_or(|lo| s.timestamp >= lo))
            .filter(|s| end.is_none_or(|hi| s.timestamp <= hi))
            .collect()
    }

    pub fn get(&self, id: &SignalId) -> Option<&Signal> {
        self.live.iter().find(|s| &s.id == id)
    }

    pub fn find(&self, data: &str, frequency: f64) -> Option<&Signal> {
        self.index
            .get(&LiveKey::new(data, frequency))
            .map(|&slot| &self.live[slot])
    }

    pub fn live_len(&self) -> usize {
        self.live.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    // ── Internal ──────────────────────────────────────────────

    fn upsert(&mut self, signal: Signal) -> Option<SignalId> {
        match self.index.get(&LiveKey::of(&signal)) {
            Some(&slot) => {
                let old = core::mem::replace(&mut self.live[slot], signal);
                Some(old.id)
            }
            None => {
                self.index.insert(LiveKey::of(&signal), self.live.len());
                self.live.push(signal);
                None
            }
        }
    }
}

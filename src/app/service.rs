//! Session service, the hexagonal core.
//!
//! [`SessionService`] owns the connection FSM, the signal catalog, the
//! transmit controller and the timer slots.  All I/O flows through port
//! traits: the transport and blob store are owned, the event sink is
//! injected at each call site.  Every entry point takes the current Unix
//! time in milliseconds so the whole service runs deterministically under
//! test.
//!
//! ```text
//!  DeviceTransport ◀──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                       │        SessionService        │
//!     StoragePort  ◀──▶ │ FSM · Catalog · TX · Timers  │ ──▶ EnrichmentRequest
//!                       └──────────────────────────────┘
//! ```
//!
//! The service is not thread-safe by itself.  Callers serialise access,
//! either by owning it on one thread or via [`crate::runtime`].

use std::borrow::Cow;
use std::sync::Arc;

use log::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::export::{ExportDocument, export_document};
use crate::catalog::{Catalog, Location, SignalId, persist};
use crate::config::SessionConfig;
use crate::error::{SessionError, TransportError};
use crate::fsm::context::SessionContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::gatt::{CHAR_COMMAND, CHAR_SENSOR, SERVICE_UUID};
use crate::protocol::decode_notification;
use crate::scheduler::{Scheduler, TimerId};
use crate::transmit::{StopReason, TransmitController, TransmitState};

use super::commands::{CommandOutcome, ReplaySelection, SessionCommand};
use super::events::{ClearScope, SessionEvent, SessionSnapshot};
use super::ports::{DeviceTransport, EventSink, StoragePort, TransportEvent, TransportListener};

/// Upper bound on enrichment requests waiting to be picked up.
const MAX_PENDING_ENRICHMENTS: usize = 64;

/// A location lookup the session wants done for a freshly ingested signal.
///
/// Hand the result back through [`SessionService::complete_enrichment`].
/// Results for a torn-down session (older `epoch`) or arriving after
/// `deadline` are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRequest {
    pub signal: SignalId,
    pub epoch: u64,
    pub deadline: u64,
}

// ───────────────────────────────────────────────────────────────
// SessionService
// ───────────────────────────────────────────────────────────────

pub struct SessionService<T: DeviceTransport, S: StoragePort> {
    fsm: Fsm,
    ctx: SessionContext,
    catalog: Catalog,
    transmit: TransmitController,
    scheduler: Scheduler,
    config: SessionConfig,
    transport: T,
    handle: Option<T::Handle>,
    storage: S,
    listener: Arc<dyn TransportListener>,
    /// Bumped on every teardown; stale enrichment results carry an old one.
    epoch: u64,
    enrichments: Vec<EnrichmentRequest>,
    replay_sent: usize,
}

impl<T: DeviceTransport, S: StoragePort> SessionService<T, S> {
    /// Construct the service and load the persisted catalog.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    /// `listener` receives the transport's notifications and link-drop
    /// events; route them back in via
    /// [`on_transport_event`](Self::on_transport_event).
    pub fn new(
        config: SessionConfig,
        transport: T,
        storage: S,
        listener: Arc<dyn TransportListener>,
    ) -> Self {
        let catalog = persist::load(&storage);
        let transmit = TransmitController::new(config.max_command_len as usize);
        Self {
            fsm: Fsm::new(build_state_table(), StateId::Disconnected),
            ctx: SessionContext::new(),
            catalog,
            transmit,
            scheduler: Scheduler::new(),
            config,
            transport,
            handle: None,
            storage,
            listener,
            epoch: 0,
            enrichments: Vec::new(),
            replay_sent: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        sink.emit(&SessionEvent::Started(self.fsm.current_state()));
        info!(
            "SessionService started in {:?} ({} live, {} history)",
            self.fsm.current_state(),
            self.catalog.live_len(),
            self.catalog.history_len()
        );
    }

    /// Stop everything: repeat job, replay, timers, link.  Pending
    /// enrichment results become no-ops.
    pub fn shutdown(&mut self, now: u64, sink: &mut impl EventSink) {
        info!("SessionService shutting down");
        self.teardown_link(StopReason::Teardown, sink);
        if self.fsm.current_state() != StateId::Disconnected {
            self.move_to(StateId::Disconnected, now, sink);
        }
    }

    // ── Command dispatch ──────────────────────────────────────

    /// Route an operator command to the matching operation.
    pub fn handle_command(
        &mut self,
        cmd: SessionCommand,
        now: u64,
        sink: &mut impl EventSink,
    ) -> Result<CommandOutcome, SessionError> {
        match cmd {
            SessionCommand::Connect => self.connect(now, sink).map(|()| CommandOutcome::Done),
            SessionCommand::Disconnect => {
                self.disconnect(now, sink).map(|()| CommandOutcome::Done)
            }
            SessionCommand::TransmitOnce { value } => self
                .transmit_once(&value, sink)
                .map(|()| CommandOutcome::Done),
            SessionCommand::StartRepeating {
                value,
                auto_stop_after_ms,
                repeat_interval_ms,
            } => self
                .start_repeating(&value, &auto_stop_after_ms, &repeat_interval_ms, now, sink)
                .map(|()| CommandOutcome::Done),
            SessionCommand::StopRepeating => {
                self.stop_repeating(sink).map(|()| CommandOutcome::Done)
            }
            SessionCommand::Replay(selection) => self
                .replay(selection, now, sink)
                .map(CommandOutcome::ReplayQueued),
            SessionCommand::SetNickname { data, nickname } => Ok(CommandOutcome::Renamed(
                self.set_nickname(&data, &nickname, sink),
            )),
            SessionCommand::ClearLive => {
                self.clear_live(sink);
                Ok(CommandOutcome::Done)
            }
            SessionCommand::ClearHistory => {
                self.clear_history(sink);
                Ok(CommandOutcome::Done)
            }
            SessionCommand::ClearAll => {
                self.clear_all(sink);
                Ok(CommandOutcome::Done)
            }
            SessionCommand::Export => self.export(now).map(CommandOutcome::Exported),
        }
    }

    // ── Connection ────────────────────────────────────────────

    /// Connect to the bridge: pick a device exposing the Reverb service,
    /// subscribe to the sensor characteristic, then read its current value
    /// once.
    pub fn connect(&mut self, now: u64, sink: &mut impl EventSink) -> Result<(), SessionError> {
        match self.fsm.current_state() {
            StateId::Connected => {
                info!("SESSION: connect ignored, already connected");
                return Ok(());
            }
            StateId::Connecting => {
                info!("SESSION: connect ignored, attempt in progress");
                return Ok(());
            }
            StateId::Disconnected | StateId::Error => {}
        }

        if !self.transport.is_available() {
            warn!("SESSION: Bluetooth transport not available");
            if self.fsm.current_state() == StateId::Error {
                self.move_to(StateId::Disconnected, now, sink);
            }
            self.ctx.status = "Bluetooth is not available on this host".to_string();
            sink.emit(&SessionEvent::CapabilityUnavailable);
            return Err(SessionError::CapabilityUnavailable);
        }

        self.move_to(StateId::Connecting, now, sink);

        let handle = match self.open_link() {
            Ok(h) => h,
            Err(e) => {
                warn!("SESSION: connect failed: {}", e);
                self.move_to(StateId::Error, now, sink);
                return Err(SessionError::ConnectFailed);
            }
        };
        self.ctx.pending_label = self.transport.device_name(&handle);
        self.handle = Some(handle);
        self.move_to(StateId::Connected, now, sink);

        self.scheduler.arm_periodic(
            TimerId::LivenessPoll,
            now,
            u64::from(self.config.liveness_interval_ms),
        );
        self.read_initial_value(now, sink);
        Ok(())
    }

    /// Explicit operator disconnect.  Only valid while Connected.
    pub fn disconnect(&mut self, now: u64, sink: &mut impl EventSink) -> Result<(), SessionError> {
        if self.fsm.current_state() != StateId::Connected {
            return Err(SessionError::NotConnected);
        }
        info!("SESSION: disconnecting");
        self.teardown_link(StopReason::SessionLost, sink);
        self.move_to(StateId::Disconnected, now, sink);
        Ok(())
    }

    /// Feed an event delivered to the transport listener.
    pub fn on_transport_event(&mut self, event: TransportEvent, now: u64, sink: &mut impl EventSink) {
        match event {
            TransportEvent::Notification(bytes) => self.on_notification(&bytes, now, sink),
            TransportEvent::Disconnected => self.on_transport_disconnected(now, sink),
        }
    }

    /// The link dropped without us asking.
    pub fn on_transport_disconnected(&mut self, now: u64, sink: &mut impl EventSink) {
        if self.fsm.current_state() != StateId::Connected {
            debug!("SESSION: link-drop ignored in {:?}", self.fsm.current_state());
            return;
        }
        warn!("SESSION: device disconnected");
        self.teardown_link(StopReason::SessionLost, sink);
        self.move_to(StateId::Disconnected, now, sink);
        self.ctx.status = "Device disconnected".to_string();
    }

    /// A value arrived on the sensor characteristic.
    pub fn on_notification(&mut self, raw: &[u8], now: u64, sink: &mut impl EventSink) {
        if self.fsm.current_state() != StateId::Connected {
            debug!("SESSION: notification ignored in {:?}", self.fsm.current_state());
            return;
        }
        let text = String::from_utf8_lossy(raw).into_owned();
        self.ctx.record_inbound(text.clone(), now);
        self.ingest_text(&text, now, sink);
    }

    // ── Transmit ──────────────────────────────────────────────

    /// Send one value.  Nothing is written unless the session is Connected
    /// and `value` is numeric.
    pub fn transmit_once(&mut self, value: &str, sink: &mut impl EventSink) -> Result<(), SessionError> {
        self.require_connected()?;
        let cmd = self.transmit.prepare_once(value)?;
        self.write_command(&cmd.encode(), sink)
    }

    /// Tell the device to repeat `value` and enforce the auto-stop locally.
    ///
    /// A blank auto-stop or interval falls back to the configured default.
    pub fn start_repeating(
        &mut self,
        value: &str,
        auto_stop_after_ms: &str,
        repeat_interval_ms: &str,
        now: u64,
        sink: &mut impl EventSink,
    ) -> Result<(), SessionError> {
        self.require_connected()?;
        let auto_stop = or_default(auto_stop_after_ms, self.config.default_auto_stop_ms);
        let interval = or_default(repeat_interval_ms, self.config.default_repeat_interval_ms);
        let cmd = self.transmit.begin_repeat(value, &auto_stop, &interval, now)?;

        if let Err(e) = self.write_command(&cmd.encode(), sink) {
            // The device never heard about the job; nothing to stop.
            let _ = self.transmit.end_repeat(StopReason::Operator);
            return Err(e);
        }

        self.scheduler
            .arm_once(TimerId::AutoStop, now, cmd.timeout_ms);
        sink.emit(&SessionEvent::TransmitStarted {
            payload: cmd.value,
            auto_stop_after_ms: cmd.timeout_ms,
            repeat_interval_ms: cmd.repeat_interval_ms,
        });
        Ok(())
    }

    /// End the repeat job.  A no-op when nothing is repeating.
    ///
    /// The controller is Idle afterwards even if the stop write fails; the
    /// write error is still returned.
    pub fn stop_repeating(&mut self, sink: &mut impl EventSink) -> Result<(), SessionError> {
        let Some((_, stop)) = self.transmit.end_repeat(StopReason::Operator) else {
            return Ok(());
        };
        self.scheduler.cancel(TimerId::AutoStop);
        sink.emit(&SessionEvent::TransmitStopped(StopReason::Operator));
        self.write_command(&stop.encode(), sink)
    }

    /// Resend the live signals captured within `selection`, one every
    /// replay gap.  Returns how many writes were queued (the first goes out
    /// immediately).
    pub fn replay(
        &mut self,
        selection: ReplaySelection,
        now: u64,
        sink: &mut impl EventSink,
    ) -> Result<usize, SessionError> {
        self.require_connected()?;
        let values: Vec<String> = self
            .catalog
            .select_range(selection.start, selection.end)
            .into_iter()
            .map(|s| s.data.clone())
            .collect();
        let queued = self.transmit.queue_replay(values)?;
        if queued == 0 {
            return Ok(0);
        }
        info!("TX: replaying {} signal(s)", queued);
        self.replay_sent = 0;
        self.replay_step(now, sink);
        Ok(queued)
    }

    // ── Enrichment ────────────────────────────────────────────

    /// Location lookups requested since the last call.
    pub fn take_enrichment_requests(&mut self) -> Vec<EnrichmentRequest> {
        core::mem::take(&mut self.enrichments)
    }

    /// Oldest `limit` pending lookups.  The rest stay queued.
    pub fn take_enrichment_requests_up_to(&mut self, limit: usize) -> Vec<EnrichmentRequest> {
        let n = limit.min(self.enrichments.len());
        self.enrichments.drain(..n).collect()
    }

    pub fn pending_enrichments(&self) -> usize {
        self.enrichments.len()
    }

    /// Apply a lookup result.  Returns `true` if the catalog changed.
    pub fn complete_enrichment(
        &mut self,
        request: &EnrichmentRequest,
        location: Option<Location>,
        now: u64,
        sink: &mut impl EventSink,
    ) -> bool {
        if request.epoch != self.epoch {
            debug!("SESSION: enrichment for {} from old session", request.signal);
            return false;
        }
        if now > request.deadline {
            debug!("SESSION: enrichment for {} arrived late", request.signal);
            return false;
        }
        let Some(location) = location else {
            return false;
        };
        if !self.catalog.enrich(&request.signal, location) {
            return false;
        }
        self.persist_live();
        self.persist_history();
        sink.emit(&SessionEvent::SignalEnriched(request.signal.clone()));
        true
    }

    // ── Catalog ───────────────────────────────────────────────

    pub fn set_nickname(&mut self, data: &str, nickname: &str, sink: &mut impl EventSink) -> usize {
        let updated = self.catalog.set_nickname(data, nickname);
        self.persist_live();
        sink.emit(&SessionEvent::NicknameSet {
            data: data.to_string(),
            updated,
        });
        updated
    }

    pub fn clear_live(&mut self, sink: &mut impl EventSink) {
        self.catalog.clear_live();
        if let Err(e) = persist::erase_live(&mut self.storage) {
            warn!("CATALOG: erasing live set failed: {}", e);
        }
        info!("CATALOG: live set cleared");
        sink.emit(&SessionEvent::CatalogCleared(ClearScope::Live));
    }

    pub fn clear_history(&mut self, sink: &mut impl EventSink) {
        self.catalog.clear_history();
        if let Err(e) = persist::erase_history(&mut self.storage) {
            warn!("CATALOG: erasing history failed: {}", e);
        }
        info!("CATALOG: history cleared");
        sink.emit(&SessionEvent::CatalogCleared(ClearScope::History));
    }

    pub fn clear_all(&mut self, sink: &mut impl EventSink) {
        self.catalog.clear_all();
        if let Err(e) = persist::erase_live(&mut self.storage) {
            warn!("CATALOG: erasing live set failed: {}", e);
        }
        if let Err(e) = persist::erase_history(&mut self.storage) {
            warn!("CATALOG: erasing history failed: {}", e);
        }
        info!("CATALOG: live set and history cleared");
        sink.emit(&SessionEvent::CatalogCleared(ClearScope::All));
    }

    pub fn export(&self, now: u64) -> Result<ExportDocument, SessionError> {
        export_document(&self.catalog, now)
    }

    // ── Timers ────────────────────────────────────────────────

    /// Fire whatever timers are due at `now`.
    pub fn tick(&mut self, now: u64, sink: &mut impl EventSink) {
        for id in self.scheduler.poll(now) {
            match id {
                TimerId::AutoStop => {
                    info!("TX: auto-stop elapsed");
                    self.force_stop(StopReason::AutoStop, sink);
                }
                TimerId::LivenessPoll => self.poll_liveness(sink),
                TimerId::ReplayStep => self.replay_step(now, sink),
            }
        }
    }

    /// Earliest time [`tick`](Self::tick) has something to do.
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn transmit_state(&self) -> &TransmitState {
        self.transmit.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.fsm.current_state(),
            status: self.ctx.status.clone(),
            device_label: self.ctx.device_label.clone(),
            last_inbound_payload: self.ctx.last_inbound_payload.clone(),
            last_outbound_value: self.ctx.last_outbound_value.clone(),
            connected_at: SessionSnapshot::sentinel(self.ctx.connected_at),
            last_inbound_at: SessionSnapshot::sentinel(self.ctx.last_inbound_at),
            link_alive: self.ctx.link_alive,
            transmitting: self.transmit.is_transmitting(),
            repeat_payload: SessionSnapshot::repeat_payload_of(self.transmit.state()),
            replay_remaining: self.transmit.replay_remaining(),
            live_signals: self.catalog.live_len(),
            history_records: self.catalog.history_len(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn move_to(&mut self, next: StateId, now: u64, sink: &mut impl EventSink) {
        self.ctx.now = now;
        match self.fsm.transition(next, &mut self.ctx) {
            Ok(from) => sink.emit(&SessionEvent::StateChanged { from, to: next }),
            Err(e) => warn!("SESSION: {}", e),
        }
    }

    fn require_connected(&self) -> Result<(), SessionError> {
        if self.fsm.current_state() == StateId::Connected && self.handle.is_some() {
            Ok(())
        } else {
            Err(SessionError::NotConnected)
        }
    }

    fn open_link(&mut self) -> Result<T::Handle, TransportError> {
        info!(
            "SESSION: requesting device with service {}",
            Uuid::from_u128(SERVICE_UUID).hyphenated()
        );
        let handle = self.transport.request_connection(SERVICE_UUID)?;
        if let Err(e) = self
            .transport
            .open_notify(&handle, CHAR_SENSOR, Arc::clone(&self.listener))
        {
            self.transport.close(handle);
            return Err(e);
        }
        Ok(handle)
    }

    fn read_initial_value(&mut self, now: u64, sink: &mut impl EventSink) {
        let Some(handle) = self.handle.as_ref() else {
            return;
        };
        match self.transport.read_characteristic(handle, CHAR_SENSOR) {
            Ok(bytes) if bytes.is_empty() => debug!("SESSION: sensor has no initial value"),
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes).into_owned();
                self.ctx.last_inbound_payload = Some(text.clone());
                self.ingest_text(&text, now, sink);
            }
            Err(e) => warn!("SESSION: initial sensor read failed: {}", e),
        }
    }

    /// Decode, store, queue enrichment.  All or nothing.
    fn ingest_text(&mut self, text: &str, now: u64, sink: &mut impl EventSink) {
        let parsed = match decode_notification(text) {
            Ok(p) => p,
            Err(e) => {
                warn!("SESSION: dropping payload ({}): {:?}", e, text);
                sink.emit(&SessionEvent::PayloadDropped(e));
                return;
            }
        };

        let ingested = self.catalog.ingest(&parsed, now);
        self.persist_live();
        self.persist_history();
        info!(
            "SIGNAL: {} @ {} MHz rssi={} -> {}",
            parsed.data, parsed.frequency, parsed.rssi, ingested.id
        );

        if self.enrichments.len() >= MAX_PENDING_ENRICHMENTS {
            self.enrichments.remove(0);
        }
        self.enrichments.push(EnrichmentRequest {
            signal: ingested.id.clone(),
            epoch: self.epoch,
            deadline: now.saturating_add(u64::from(self.config.enrichment_timeout_ms)),
        });

        sink.emit(&SessionEvent::SignalIngested {
            id: ingested.id,
            replaced: ingested.replaced,
        });
    }

    fn write_command(&mut self, line: &str, sink: &mut impl EventSink) -> Result<(), SessionError> {
        let Some(handle) = self.handle.as_ref() else {
            return Err(SessionError::NotConnected);
        };
        match self
            .transport
            .write_characteristic(handle, CHAR_COMMAND, line.as_bytes())
        {
            Ok(()) => {
                info!("TX: wrote {}", line);
                self.ctx.last_outbound_value = Some(line.to_string());
                sink.emit(&SessionEvent::CommandWritten(line.to_string()));
                Ok(())
            }
            Err(e) => {
                warn!("TX: write of {} failed: {}", line, e);
                sink.emit(&SessionEvent::WriteFailed {
                    command: line.to_string(),
                    error: e.clone(),
                });
                Err(SessionError::WriteFailed(e))
            }
        }
    }

    /// Stop the repeat job with a best-effort stop write.
    fn force_stop(&mut self, reason: StopReason, sink: &mut impl EventSink) {
        self.scheduler.cancel(TimerId::AutoStop);
        let Some((_, stop)) = self.transmit.end_repeat(reason) else {
            return;
        };
        sink.emit(&SessionEvent::TransmitStopped(reason));
        if self.write_command(&stop.encode(), sink).is_err() {
            debug!("TX: stop write after {:?} failed, ignored", reason);
        }
    }

    /// Everything that must happen on every exit from Connected, before
    /// the FSM moves.
    fn teardown_link(&mut self, reason: StopReason, sink: &mut impl EventSink) {
        self.force_stop(reason, sink);
        let dropped = self.transmit.cancel_replay();
        if dropped > 0 {
            info!("TX: replay cancelled, {} write(s) dropped", dropped);
        }
        self.scheduler.cancel_all();
        self.epoch += 1;
        self.enrichments.clear();
        if let Some(handle) = self.handle.take() {
            self.transport.close(handle);
        }
    }

    fn poll_liveness(&mut self, sink: &mut impl EventSink) {
        let Some(handle) = self.handle.as_ref() else {
            return;
        };
        let alive = self.transport.is_connected(handle);
        if alive != self.ctx.link_alive {
            if alive {
                info!("SESSION: link reports connected again");
            } else {
                warn!("SESSION: link reports not connected");
            }
            self.ctx.link_alive = alive;
            sink.emit(&SessionEvent::LivenessChanged(alive));
        }
    }

    fn replay_step(&mut self, now: u64, sink: &mut impl EventSink) {
        let Some(cmd) = self.transmit.next_replay() else {
            return;
        };
        // A failed write is reported and the replay carries on.
        let _ = self.write_command(&cmd.encode(), sink);
        self.replay_sent += 1;
        let remaining = self.transmit.replay_remaining();
        sink.emit(&SessionEvent::ReplayProgress {
            sent: self.replay_sent,
            remaining,
        });
        if remaining > 0 {
            self.scheduler.arm_once(
                TimerId::ReplayStep,
                now,
                u64::from(self.config.replay_gap_ms),
            );
        }
    }

    fn persist_live(&mut self) {
        if let Err(e) = persist::save_live(&mut self.storage, &self.catalog) {
            warn!("CATALOG: saving live set failed: {}", e);
        }
    }

    fn persist_history(&mut self) {
        if let Err(e) = persist::save_history(&mut self.storage, &self.catalog) {
            warn!("CATALOG: saving history failed: {}", e);
        }
    }
}

/// `raw`, or `fallback` rendered as text when `raw` is blank.
fn or_default(raw: &str, fallback: u32) -> Cow<'_, str> {
    if raw.trim().is_empty() {
        Cow::Owned(fallback.to_string())
    } else {
        Cow::Borrowed(raw)
    }
}

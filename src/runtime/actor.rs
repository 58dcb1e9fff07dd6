//! Session actor: owns the [`SessionService`] on a dedicated thread.
//!
//! Runs under an `edge-executor` [`LocalExecutor`] with `async-io-mini`
//! timers.  The main task waits for whichever comes first (the next
//! mailbox message, a latched link loss or the service's next timer
//! deadline), handles it, fires due timers and republishes the snapshot.
//! Location lookups run as detached tasks on the same executor and post
//! their result back through the mailbox.  At most
//! [`MAX_LOOKUPS_IN_FLIGHT`] run at once; the rest wait in the service.
//!
//! ```text
//!  ┌────────────────────────────────────────────────────────┐
//!  │  reverb-session thread                                 │
//!  │  ┌──────────────────────────────────────────────────┐  │
//!  │  │  LocalExecutor                                   │  │
//!  │  │  ┌──────────────────┐   ┌─────────────────────┐  │  │
//!  │  │  │ session loop     │   │ enrich task × N     │  │  │
//!  │  │  │ mailbox | timer  │◀──│ locate | timeout    │  │  │
//!  │  │  └──────────────────┘   └─────────────────────┘  │  │
//!  │  └──────────────────────────────────────────────────┘  │
//!  └────────────────────────────────────────────────────────┘
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, anyhow};
use async_io_mini::Timer;
use edge_executor::LocalExecutor;
use futures_lite::future;
use log::{debug, info, warn};

use crate::adapters::log_sink::LogEventSink;
use crate::adapters::time::WallClock;
use crate::app::commands::{CommandOutcome, SessionCommand};
use crate::app::events::{SessionEvent, SessionSnapshot};
use crate::app::ports::{DeviceTransport, EventSink, LocationSource, StoragePort, TransportListener};
use crate::app::service::{EnrichmentRequest, SessionService};
use crate::config::{SessionConfig, validate_config};
use crate::error::SessionError;

use super::channels::{ActorMsg, Inbox, MailboxListener, Reply};

/// Events kept for [`SessionHandle::events`] before new ones are dropped.
const EVENT_BACKLOG: usize = 256;

/// Executor task slots.
const EXECUTOR_TASKS: usize = 64;

/// Concurrent location lookups.  Kept well under [`EXECUTOR_TASKS`] so
/// the run queue cannot overflow.
pub(crate) const MAX_LOOKUPS_IN_FLIGHT: usize = 16;

type SharedSnapshot = Arc<Mutex<SessionSnapshot>>;

fn lock(snapshot: &SharedSnapshot) -> MutexGuard<'_, SessionSnapshot> {
    snapshot.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Event fan-out ────────────────────────────────────────────

/// Logs each event, mirrors state changes into the snapshot straight
/// away, and queues a copy for the handle.
struct ActorSink {
    log: LogEventSink,
    snapshot: SharedSnapshot,
    tap: SyncSender<SessionEvent>,
}

impl EventSink for ActorSink {
    fn emit(&mut self, event: &SessionEvent) {
        self.log.emit(event);
        if let SessionEvent::StateChanged { to, .. } = event {
            lock(&self.snapshot).state = *to;
        }
        // Full or nobody listening: dropped.
        let _ = self.tap.try_send(event.clone());
    }
}

// ── Handle ───────────────────────────────────────────────────

/// Caller side of a running session.
pub struct SessionHandle {
    inbox: Arc<Inbox>,
    snapshot: SharedSnapshot,
    events: Receiver<SessionEvent>,
    thread: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Send `cmd` to the actor and block until it has been handled.
    ///
    /// Returns [`SessionError::NotConnected`] if the actor is gone.
    pub fn request(&self, cmd: SessionCommand) -> Result<CommandOutcome, SessionError> {
        if !self.is_running() {
            warn!("RUNTIME: request {:?} after actor exit", cmd);
            return Err(SessionError::NotConnected);
        }
        let reply = Arc::new(Reply::new());
        let msg = ActorMsg::Command {
            cmd,
            reply: Arc::clone(&reply),
        };
        future::block_on(async {
            self.inbox.mailbox.send(msg).await;
            reply.wait().await
        })
    }

    /// Last published view of the session.  Never waits on the actor.
    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.snapshot).clone()
    }

    /// Events emitted since the last call.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.try_iter().collect()
    }

    /// Block up to `timeout` for the next event.
    pub fn next_event(&self, timeout: Duration) -> Option<SessionEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// A listener feeding this session's mailbox, for transports created
    /// outside [`spawn`].
    pub fn listener(&self) -> Arc<dyn TransportListener> {
        Arc::new(MailboxListener::new(Arc::clone(&self.inbox)))
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the repeat job and any replay, cancel timers, close the link
    /// and join the actor thread.
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        self.stop_actor()
    }

    fn stop_actor(&mut self) -> anyhow::Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        if !thread.is_finished() {
            future::block_on(self.inbox.mailbox.send(ActorMsg::Shutdown));
        }
        thread
            .join()
            .map_err(|_| anyhow!("session actor panicked"))
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop_actor() {
            warn!("RUNTIME: {}", e);
        }
    }
}

// ── Spawn ────────────────────────────────────────────────────

/// Start a session actor.
///
/// Loads the persisted catalog from `storage`, starts the FSM and returns
/// once the first snapshot is published.  The transport is given a
/// listener that feeds the actor's mailbox.
pub fn spawn<T, S, L>(
    config: SessionConfig,
    transport: T,
    storage: S,
    location: L,
) -> anyhow::Result<SessionHandle>
where
    T: DeviceTransport + Send + 'static,
    S: StoragePort + Send + 'static,
    L: LocationSource + Send + 'static,
{
    validate_config(&config).context("invalid session config")?;

    let inbox = Arc::new(Inbox::new());
    let snapshot: SharedSnapshot = Arc::new(Mutex::new(SessionSnapshot::default()));
    let (tap, events) = mpsc::sync_channel(EVENT_BACKLOG);
    let (ready_tx, ready_rx) = mpsc::channel::<()>();

    let actor_inbox = Arc::clone(&inbox);
    let actor_snapshot = Arc::clone(&snapshot);
    let thread = thread::Builder::new()
        .name("reverb-session".into())
        .spawn(move || {
            let listener: Arc<dyn TransportListener> =
                Arc::new(MailboxListener::new(Arc::clone(&actor_inbox)));
            let mut service = SessionService::new(config, transport, storage, listener);
            let mut sink = ActorSink {
                log: LogEventSink::new(),
                snapshot: Arc::clone(&actor_snapshot),
                tap,
            };
            service.start(&mut sink);
            *lock(&actor_snapshot) = service.snapshot();
            let _ = ready_tx.send(());
            run_actor(service, sink, actor_inbox, actor_snapshot, location);
        })
        .context("spawning session actor thread")?;

    ready_rx
        .recv()
        .context("session actor exited during startup")?;
    info!("RUNTIME: session actor running");

    Ok(SessionHandle {
        inbox,
        snapshot,
        events,
        thread: Some(thread),
    })
}

/// What woke the session loop.
enum Wake {
    Msg(ActorMsg),
    LinkLost,
    Timer,
}

fn run_actor<T, S, L>(
    service: SessionService<T, S>,
    sink: ActorSink,
    inbox: Arc<Inbox>,
    snapshot: SharedSnapshot,
    location: L,
) where
    T: DeviceTransport,
    S: StoragePort,
    L: LocationSource + 'static,
{
    let executor: LocalExecutor<'_, EXECUTOR_TASKS> = LocalExecutor::new();
    let location = Rc::new(location);
    future::block_on(executor.run(session_loop(
        &executor, service, sink, inbox, snapshot, location,
    )));
    info!("RUNTIME: session actor stopped");
}

async fn session_loop<T, S, L>(
    executor: &LocalExecutor<'_, EXECUTOR_TASKS>,
    mut service: SessionService<T, S>,
    mut sink: ActorSink,
    inbox: Arc<Inbox>,
    snapshot: SharedSnapshot,
    location: Rc<L>,
) where
    T: DeviceTransport,
    S: StoragePort,
    L: LocationSource + 'static,
{
    let clock = WallClock::new();
    let lookup_timeout = Duration::from_millis(u64::from(service.config().enrichment_timeout_ms));
    let in_flight = Rc::new(Cell::new(0usize));

    loop {
        let wake = if inbox.link_lost.try_take().is_some() {
            Wake::LinkLost
        } else {
            let next = future::or(
                async { Wake::Msg(inbox.mailbox.receive().await) },
                async {
                    inbox.link_lost.wait().await;
                    Wake::LinkLost
                },
            );
            match service.next_deadline() {
                Some(due) => {
                    let wait = clock.until(due);
                    future::or(next, async {
                        Timer::after(wait).await;
                        Wake::Timer
                    })
                    .await
                }
                None => next.await,
            }
        };

        let now = clock.now_ms();
        let mut answer = None;
        match wake {
            Wake::Timer => {}
            Wake::LinkLost => service.on_transport_disconnected(now, &mut sink),
            Wake::Msg(ActorMsg::Command { cmd, reply }) => {
                answer = Some((reply, service.handle_command(cmd, now, &mut sink)));
            }
            Wake::Msg(ActorMsg::Transport(event)) => {
                service.on_transport_event(event, now, &mut sink);
            }
            Wake::Msg(ActorMsg::Located { request, location }) => {
                service.complete_enrichment(&request, location, now, &mut sink);
            }
            Wake::Msg(ActorMsg::Shutdown) => {
                service.shutdown(now, &mut sink);
                *lock(&snapshot) = service.snapshot();
                return;
            }
        }

        service.tick(clock.now_ms(), &mut sink);

        let free = MAX_LOOKUPS_IN_FLIGHT.saturating_sub(in_flight.get());
        for request in service.take_enrichment_requests_up_to(free) {
            in_flight.set(in_flight.get() + 1);
            executor
                .spawn(enrich(
                    Rc::clone(&location),
                    request,
                    lookup_timeout,
                    Arc::clone(&inbox),
                    Rc::clone(&in_flight),
                ))
                .detach();
        }

        *lock(&snapshot) = service.snapshot();
        // Reply after publishing so the caller sees its own effect.
        if let Some((reply, result)) = answer {
            reply.signal(result);
        }
    }
}

/// One bounded location lookup.  Always reports back; the slot is freed
/// once the result is queued.
async fn enrich<L: LocationSource>(
    location: Rc<L>,
    request: EnrichmentRequest,
    timeout: Duration,
    inbox: Arc<Inbox>,
    in_flight: Rc<Cell<usize>>,
) {
    let fix = future::or(location.locate(), async {
        Timer::after(timeout).await;
        None
    })
    .await;
    if fix.is_none() {
        debug!("RUNTIME: no location for {}", request.signal);
    }
    inbox
        .mailbox
        .send(ActorMsg::Located {
            request,
            location: fix,
        })
        .await;
    in_flight.set(in_flight.get().saturating_sub(1));
}

//! Session actor mailbox.
//!
//! One bounded `embassy-sync` channel per session carries everything the
//! actor reacts to, in arrival order.  Operator requests carry a reply
//! [`Signal`] the caller waits on.
//!
//! Link loss bypasses the channel: it is latched in its own [`Signal`] so
//! a full mailbox can never swallow it.
//!
//! ```text
//!  SessionHandle ──Command──▶ ┌─────────┐
//!  Transport     ──Notify────▶│ Mailbox │──▶ session actor
//!  Enrich task   ──Located───▶└─────────┘        ▲
//!  Transport     ──Disconnected──▶ link_lost ────┘
//! ```

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use log::{debug, warn};

use crate::app::commands::{CommandOutcome, SessionCommand};
use crate::app::ports::{TransportEvent, TransportListener};
use crate::app::service::EnrichmentRequest;
use crate::catalog::Location;
use crate::error::SessionError;

/// Mailbox depth.  Notifications are dropped when it is full.
pub const MAILBOX_DEPTH: usize = 32;

pub(crate) type Reply = Signal<CriticalSectionRawMutex, Result<CommandOutcome, SessionError>>;

pub(crate) type Mailbox = Channel<CriticalSectionRawMutex, ActorMsg, MAILBOX_DEPTH>;

/// Everything the actor waits on.
pub(crate) struct Inbox {
    pub(crate) mailbox: Mailbox,
    /// Set by the transport when the link drops.  Repeated drops before
    /// the actor looks collapse into one.
    pub(crate) link_lost: Signal<CriticalSectionRawMutex, ()>,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        Self {
            mailbox: Mailbox::new(),
            link_lost: Signal::new(),
        }
    }
}

pub(crate) enum ActorMsg {
    Command {
        cmd: SessionCommand,
        reply: Arc<Reply>,
    },
    Transport(TransportEvent),
    Located {
        request: EnrichmentRequest,
        location: Option<Location>,
    },
    Shutdown,
}

/// Forwards transport callbacks into the session inbox.
///
/// Never blocks: transports may call it from their own threads or from
/// inside a session call.
pub struct MailboxListener {
    inbox: Arc<Inbox>,
}

impl MailboxListener {
    pub(crate) fn new(inbox: Arc<Inbox>) -> Self {
        Self { inbox }
    }
}

impl TransportListener for MailboxListener {
    fn on_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Disconnected => {
                debug!("RUNTIME: link loss latched");
                self.inbox.link_lost.signal(());
            }
            TransportEvent::Notification(bytes) => {
                let msg = ActorMsg::Transport(TransportEvent::Notification(bytes));
                if self.inbox.mailbox.try_send(msg).is_err() {
                    warn!("RUNTIME: mailbox full, notification dropped");
                }
            }
        }
    }
}

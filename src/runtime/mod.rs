//! Message-passing runtime for one session.
//!
//! [`spawn`] moves a [`SessionService`](crate::app::service::SessionService)
//! onto its own thread and serialises every mutation through a single
//! ordered mailbox.  Timers, transport events, operator requests and
//! location results all arrive there; nothing else touches the service.

mod actor;
pub mod channels;

pub use actor::{SessionHandle, spawn};
pub use channels::{MAILBOX_DEPTH, MailboxListener};

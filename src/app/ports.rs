//! Port traits: the hexagonal boundary between the session core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ SessionService (domain)
//! ```
//!
//! Driven adapters (Bluetooth stack, blob storage, event sinks, location
//! providers) implement these traits.  The
//! [`SessionService`](super::service::SessionService) consumes them via
//! generics, so the session core never touches a radio stack directly.

use std::future::Future;
use std::sync::Arc;

use crate::catalog::Location;
use crate::config::SessionConfig;
use crate::error::TransportError;

// ───────────────────────────────────────────────────────────────
// Device transport port (driven adapter: domain ↔ BLE stack)
// ───────────────────────────────────────────────────────────────

/// Events a transport pushes at the session after a channel is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A value arrived on the notify characteristic.
    Notification(Vec<u8>),
    /// The link dropped without the session asking.
    Disconnected,
}

/// Receives [`TransportEvent`]s.  Called from whatever thread the
/// Bluetooth stack delivers on, so implementations only enqueue.
pub trait TransportListener: Send + Sync {
    fn on_event(&self, event: TransportEvent);
}

/// The capability set the session needs from a Bluetooth stack.
///
/// Exactly one device handle is live at a time.  Calls are serialised by
/// the session; implementations need no internal locking for that.
pub trait DeviceTransport {
    type Handle;

    /// Whether Bluetooth exists on this host at all.
    fn is_available(&self) -> bool;

    /// Ask for a device exposing `service` and connect to its GATT server.
    fn request_connection(&mut self, service: u128) -> Result<Self::Handle, TransportError>;

    /// Advertised name, if the device reported one.
    fn device_name(&self, handle: &Self::Handle) -> Option<String>;

    /// Subscribe to `characteristic`.  Values and the link-drop event go to
    /// `listener` until [`close`](Self::close).
    fn open_notify(
        &mut self,
        handle: &Self::Handle,
        characteristic: u128,
        listener: Arc<dyn TransportListener>,
    ) -> Result<(), TransportError>;

    /// One-shot read of `characteristic`.
    fn read_characteristic(
        &mut self,
        handle: &Self::Handle,
        characteristic: u128,
    ) -> Result<Vec<u8>, TransportError>;

    fn write_characteristic(
        &mut self,
        handle: &Self::Handle,
        characteristic: u128,
        bytes: &[u8],
    ) -> Result<(), TransportError>;

    /// Whether the link is actually up right now.
    fn is_connected(&self, handle: &Self::Handle) -> bool;

    /// Stop notifications and drop the link.  Best-effort, never fails.
    fn close(&mut self, handle: Self::Handle);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / UI)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`SessionEvent`](super::events::SessionEvent)s
/// through this port.  Adapters decide where they go (log, UI, test
/// recorder).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::SessionEvent);
}

// ───────────────────────────────────────────────────────────────
// Location port (driven adapter: positioning → domain)
// ───────────────────────────────────────────────────────────────

/// Best-effort position lookup for enrichment.  `None` means unavailable
/// or denied; the caller bounds the wait.
pub trait LocationSource {
    fn locate(&self) -> impl Future<Output = Option<Location>>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`SessionConfig`].
///
/// Implementations MUST validate before persisting and reject invalid
/// ranges with [`ConfigError::ValidationFailed`], not clamp them.
pub trait ConfigPort {
    /// Returns [`SessionConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<SessionConfig, ConfigError>;

    fn save(&mut self, config: &SessionConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ blob store)
// ───────────────────────────────────────────────────────────────

/// Namespaced key-value blob storage.
///
/// Write operations MUST be atomic: a reader sees either the old blob or
/// the new one, never a torn write.
pub trait StoragePort {
    /// Read a whole blob.
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Replace a blob atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Backing store is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}

//! Concrete state handler functions and table builder.
//!
//! Each state is a plain `fn` pointer pair plus the list of states it may
//! move to.  Transitions are driven by session events, never by ticks.
//!
//! ```text
//!  DISCONNECTED ──[connect]──▶ CONNECTING ──[transport ok]──▶ CONNECTED
//!        ▲                        │                              │
//!        │                  [transport err]          [disconnect / link lost]
//!        │                        ▼                              │
//!        │◀──[teardown]────────  ERROR ──[connect]──▶ CONNECTING │
//!        └───────────────────────────────────────────────────────┘
//! ```

use super::context::SessionContext;
use super::{StateDescriptor, StateId};
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once per session service.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Disconnected
        StateDescriptor {
            id: StateId::Disconnected,
            name: "Disconnected",
            on_enter: Some(disconnected_enter),
            on_exit: None,
            allowed: &[StateId::Connecting],
        },
        // Index 1: Connecting
        StateDescriptor {
            id: StateId::Connecting,
            name: "Connecting",
            on_enter: Some(connecting_enter),
            on_exit: None,
            allowed: &[StateId::Connected, StateId::Error, StateId::Disconnected],
        },
        // Index 2: Connected
        StateDescriptor {
            id: StateId::Connected,
            name: "Connected",
            on_enter: Some(connected_enter),
            on_exit: Some(connected_exit),
            allowed: &[StateId::Disconnected],
        },
        // Index 3: Error
        StateDescriptor {
            id: StateId::Error,
            name: "Error",
            on_enter: Some(error_enter),
            on_exit: None,
            allowed: &[StateId::Connecting, StateId::Disconnected],
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISCONNECTED
// ═══════════════════════════════════════════════════════════════════════════

fn disconnected_enter(ctx: &mut SessionContext) {
    ctx.reset_link();
    ctx.status = "Disconnected".to_string();
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTING
// ═══════════════════════════════════════════════════════════════════════════

fn connecting_enter(ctx: &mut SessionContext) {
    ctx.reset_link();
    ctx.status = "Initializing Bluetooth...".to_string();
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTED
// ═══════════════════════════════════════════════════════════════════════════

fn connected_enter(ctx: &mut SessionContext) {
    let label = ctx
        .pending_label
        .take()
        .unwrap_or_else(|| "unnamed device".to_string());
    info!("FSM: connected to '{}'", label);
    ctx.status = format!("Connected to device {label}");
    ctx.device_label = label;
    ctx.connected_at = Some(ctx.now);
    ctx.link_alive = true;
}

fn connected_exit(ctx: &mut SessionContext) {
    info!(
        "FSM: leaving Connected after {}ms",
        ctx.connected_at.map_or(0, |t| ctx.now.saturating_sub(t))
    );
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut SessionContext) {
    warn!("FSM: connect attempt failed");
    ctx.reset_link();
    ctx.status = "Error connecting to device".to_string();
}

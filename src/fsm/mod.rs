//! Function-pointer finite state machine for the device session.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌──────────────┬───────────┬──────────┬──────────────────┐  │
//! │  │ StateId      │ on_enter  │ on_exit  │ allowed next     │  │
//! │  ├──────────────┼───────────┼──────────┼──────────────────┤  │
//! │  │ Disconnected │ fn(ctx)   │ -        │ Connecting       │  │
//! │  │ Connecting   │ fn(ctx)   │ -        │ Conn'd/Err/Disc  │  │
//! │  │ Connected    │ fn(ctx)   │ fn(ctx)  │ Disconnected     │  │
//! │  │ Error        │ fn(ctx)   │ -        │ Connecting/Disc  │  │
//! │  └──────────────┴───────────┴──────────┴──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The session drives every transition explicitly via
//! [`Fsm::transition`].  A request the table does not allow is refused
//! and nothing runs; otherwise `on_exit` of the current state runs, the
//! pointer moves, then `on_enter` of the next state runs.

pub mod context;
pub mod states;

use core::fmt;

use context::SessionContext;
use log::info;
use serde::Serialize;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Connection lifecycle states.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum StateId {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Error = 3,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 4;

    /// Convert an index back to `StateId`.  Out-of-range falls back to
    /// `Disconnected` in release builds.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Error,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Disconnected
            }
        }
    }
}

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut SessionContext);

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    /// States reachable from this one.
    pub allowed: &'static [StateId],
}

/// A transition the table does not permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: StateId,
    pub to: StateId,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal transition {:?} -> {:?}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    /// Transitions executed since construction.
    transitions: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    pub fn start(&mut self, ctx: &mut SessionContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Move to `next`.  Returns the state that was left.
    pub fn transition(
        &mut self,
        next: StateId,
        ctx: &mut SessionContext,
    ) -> Result<StateId, IllegalTransition> {
        let from = self.current_state();
        if !self.can_transition(next) {
            return Err(IllegalTransition { from, to: next });
        }

        let next_idx = next as usize;
        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }
        self.current = next_idx;
        self.transitions += 1;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
        Ok(from)
    }

    pub fn can_transition(&self, next: StateId) -> bool {
        self.table[self.current].allowed.contains(&next)
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn transition_count(&self) -> u64 {
        self.transitions
    }
}

//! Timer engine for the session.
//!
//! Three independent timers, one fixed slot each.  The scheduler only
//! tracks deadlines; whoever drives the session feeds it the clock via
//! [`Scheduler::poll`] and acts on the ids that come back.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Timer slots                          │
//! │                                                          │
//! │  ┌────────────┐   ┌──────────────┐   ┌──────────────┐    │
//! │  │ AutoStop   │   │ LivenessPoll │   │ ReplayStep   │    │
//! │  │ (one-shot) │   │ (periodic)   │   │ (one-shot)   │    │
//! │  └─────┬──────┘   └──────┬───────┘   └──────┬───────┘    │
//! │        └─────────────────┼──────────────────┘            │
//! │                          ▼                               │
//! │                 poll(now) → due ids                      │
//! │                          │                               │
//! │                          ▼                               │
//! │                SessionService.tick()                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Cancelling is explicit.  Every path that invalidates a timer's purpose
//! (stop, forced stop, disconnect, teardown) must cancel it, or it will
//! still fire.

use heapless::Vec as HVec;
use log::debug;

// ═══════════════════════════════════════════════════════════════
//  Timer types
// ═══════════════════════════════════════════════════════════════

/// Which timer fired.  Doubles as the slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TimerId {
    /// Local enforcement of the repeat job's auto-stop.
    AutoStop = 0,
    /// "Is the link actually up" check while Connected.
    LivenessPoll = 1,
    /// Gap between consecutive replay writes.
    ReplayStep = 2,
}

/// Maximum number of concurrent timers (stack-allocated).
pub const MAX_TIMERS: usize = 3;

const ALL_TIMERS: [TimerId; MAX_TIMERS] =
    [TimerId::AutoStop, TimerId::LivenessPoll, TimerId::ReplayStep];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    /// Fire once, then disarm.
    OneShot,
    /// Fire every `interval_ms` until cancelled.
    Periodic { interval_ms: u64 },
}

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    kind: TimerKind,
    due_at: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct Scheduler {
    slots: [Option<TimerEntry>; MAX_TIMERS],
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `id` to fire once at `now + delay_ms`.  Re-arming replaces any
    /// previous deadline.
    pub fn arm_once(&mut self, id: TimerId, now: u64, delay_ms: u64) {
        debug!("Scheduler: {:?} armed, fires in {}ms", id, delay_ms);
        self.slots[id as usize] = Some(TimerEntry {
            kind: TimerKind::OneShot,
            due_at: now.saturating_add(delay_ms),
        });
    }

    /// Arm `id` to fire every `interval_ms`, first at `now + interval_ms`.
    pub fn arm_periodic(&mut self, id: TimerId, now: u64, interval_ms: u64) {
        debug!("Scheduler: {:?} armed, every {}ms", id, interval_ms);
        self.slots[id as usize] = Some(TimerEntry {
            kind: TimerKind::Periodic { interval_ms },
            due_at: now.saturating_add(interval_ms),
        });
    }

    pub fn cancel(&mut self, id: TimerId) {
        if self.slots[id as usize].take().is_some() {
            debug!("Scheduler: {:?} cancelled", id);
        }
    }

    pub fn cancel_all(&mut self) {
        for id in ALL_TIMERS {
            self.cancel(id);
        }
    }

    pub fn is_armed(&self, id: TimerId) -> bool {
        self.slots[id as usize].is_some()
    }

    pub fn due_at(&self, id: TimerId) -> Option<u64> {
        self.slots[id as usize].map(|e| e.due_at)
    }

    /// Earliest deadline across all armed timers.
    pub fn next_due(&self) -> Option<u64> {
        self.slots.iter().flatten().map(|e| e.due_at).min()
    }

    /// Number of armed timers.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Collect every timer due at `now`, earliest deadline first.
    ///
    /// One-shots are disarmed; periodics are re-armed one interval after
    /// `now` (missed periods are not replayed).
    pub fn poll(&mut self, now: u64) -> HVec<TimerId, MAX_TIMERS> {
        let mut due: HVec<(u64, TimerId), MAX_TIMERS> = HVec::new();
        for id in ALL_TIMERS {
            let slot = &mut self.slots[id as usize];
            let Some(entry) = *slot else { continue };
            if entry.due_at > now {
                continue;
            }
            *slot = match entry.kind {
                TimerKind::OneShot => None,
                TimerKind::Periodic { interval_ms } => Some(TimerEntry {
                    kind: entry.kind,
                    due_at: now.saturating_add(interval_ms),
                }),
            };
            // Capacity equals the slot count, cannot overflow.
            let _ = due.push((entry.due_at, id));
        }
        due.sort_unstable_by_key(|&(at, id)| (at, id as u8));
        due.into_iter().map(|(_, id)| id).collect()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════

//! The scheduler adapter: the interface engines use to request repeating timers from
//! the external event loop.
//!
//! The loop substrate itself is out of scope (an external collaborator); what lives
//! here is the thin, testable adapter surface: handles are assigned, due timers are
//! reported on demand via `due`, and a two-phase `cancel`/`close` mirrors how real
//! event-loop timer handles are torn down (stop firing, then release resources) so the
//! world's teardown path has something to await in spirit even though this
//! single-threaded, pull-based model has no actual asynchrony to wait on.

use std::collections::HashMap;
use tracing::trace;

pub type TimerId = u64;

/// What a firing timer is for, carrying enough to route back to the right context.
/// The context key is the (world, query-text) registry key from `executor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerRole {
    AggregationFlush(String),
    CorrelationCleanup(String),
}

struct TimerEntry {
    period_ms: u64,
    next_due_ns: u64,
    role: TimerRole,
    stopped: bool,
}

#[derive(Default)]
pub struct Scheduler {
    next_id: TimerId,
    timers: HashMap<TimerId, TimerEntry>,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler::default()
    }

    /// Register a repeating timer, due to first fire `period_ms` after `now_ns`.
    pub fn schedule_repeating(&mut self, period_ms: u64, role: TimerRole, now_ns: u64) -> TimerId {
        self.next_id += 1;
        let id = self.next_id;
        self.timers.insert(
            id,
            TimerEntry { period_ms, next_due_ns: now_ns.saturating_add(period_ms.saturating_mul(1_000_000)), role, stopped: false },
        );
        id
    }

    /// Stop phase: prevents further firings but keeps the handle's bookkeeping alive.
    pub fn cancel(&mut self, id: TimerId) {
        if let Some(t) = self.timers.get_mut(&id) {
            t.stopped = true;
        }
    }

    /// Close phase: releases the handle. Must follow `cancel`.
    pub fn close(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }

    /// Report, and reschedule, every non-stopped timer due at or before `now_ns`.
    pub fn due(&mut self, now_ns: u64) -> Vec<(TimerId, TimerRole)> {
        let mut fired = Vec::new();
        for (id, t) in self.timers.iter_mut() {
            if t.stopped {
                continue;
            }
            if now_ns >= t.next_due_ns {
                trace!(timer = id, role = ?t.role, now_ns, "timer fired");
                fired.push((*id, t.role.clone()));
                t.next_due_ns = now_ns.saturating_add(t.period_ms.saturating_mul(1_000_000));
            }
        }
        fired
    }

    pub fn active_count(&self) -> usize {
        self.timers.values().filter(|t| !t.stopped).count()
    }

    pub fn handle_count(&self) -> usize {
        self.timers.len()
    }
}

//! The world: process-wide container for execution contexts, the event-handler
//! callback and the lifecycle state machine that gates when timers may be created.

use crate::aggregation::AggregationContext;
use crate::correlation::CorrelationContext;
use crate::error::{EngineError, Result};
use crate::event::Event;
use crate::query::Query;
use crate::scheduler::Scheduler;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldState {
    New,
    Open,
    Started,
    Running,
    Stopped,
    Freed,
}

pub(crate) enum ContextKind {
    Aggregation(AggregationContext),
    Correlation(CorrelationContext),
}

pub(crate) struct ContextEntry {
    pub(crate) kind: ContextKind,
    pub(crate) timer_ids: Vec<crate::scheduler::TimerId>,
}

pub struct World {
    pub(crate) state: WorldState,
    pub(crate) scheduler: Scheduler,
    pub(crate) contexts: HashMap<String, ContextEntry>,
    pub(crate) query_cache: HashMap<String, Arc<Query>>,
    events_processed: u64,
    events_correlated: u64,
    handler: Option<Box<dyn FnMut(Event)>>,
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}

impl World {
    pub fn new() -> Self {
        World {
            state: WorldState::New,
            scheduler: Scheduler::new(),
            contexts: HashMap::new(),
            query_cache: HashMap::new(),
            events_processed: 0,
            events_correlated: 0,
            handler: None,
        }
    }

    pub fn set_handler(&mut self, handler: impl FnMut(Event) + 'static) {
        self.handler = Some(Box::new(handler));
    }

    pub fn state(&self) -> WorldState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state, WorldState::Started | WorldState::Running)
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn events_correlated(&self) -> u64 {
        self.events_correlated
    }

    pub(crate) fn note_processed(&mut self) {
        self.events_processed += 1;
    }

    pub(crate) fn note_correlated(&mut self) {
        self.events_correlated += 1;
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    pub fn active_timer_count(&self) -> usize {
        self.scheduler.active_count()
    }

    pub fn open(&mut self) -> Result<()> {
        if self.state != WorldState::New {
            return Err(EngineError::LoopLifecycle("open requires a new world"));
        }
        self.state = WorldState::Open;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        if self.state != WorldState::Open {
            return Err(EngineError::LoopLifecycle("start requires an opened world"));
        }
        self.state = WorldState::Started;
        Ok(())
    }

    pub fn run(&mut self) -> Result<()> {
        if self.state != WorldState::Started {
            return Err(EngineError::LoopLifecycle("run requires a started world"));
        }
        self.state = WorldState::Running;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        if !matches!(self.state, WorldState::Started | WorldState::Running) {
            return Err(EngineError::LoopLifecycle("stop requires a started or running world"));
        }
        self.state = WorldState::Stopped;
        Ok(())
    }

    /// Tears timers down in close-callback order (stop every handle, then close every
    /// handle) before releasing the world. Legal from any state reached after `New`.
    pub fn free(&mut self) -> Result<()> {
        if matches!(self.state, WorldState::New | WorldState::Freed) {
            return Err(EngineError::LoopLifecycle("free requires a previously-opened, not-yet-freed world"));
        }
        for entry in self.contexts.values_mut() {
            for id in &entry.timer_ids {
                self.scheduler.cancel(*id);
            }
        }
        for entry in self.contexts.values_mut() {
            for id in entry.timer_ids.drain(..) {
                self.scheduler.close(id);
            }
        }
        debug!(contexts = self.contexts.len(), "destroying contexts and freeing world");
        self.contexts.clear();
        self.state = WorldState::Freed;
        Ok(())
    }

    pub(crate) fn emit(&mut self, event: Event) {
        if let Some(h) = self.handler.as_mut() {
            h(event);
        }
    }

    /// Pump the scheduler for one loop turn: fires every timer due at `now_ns`,
    /// routing aggregation flushes and correlation cleanups back to their contexts.
    pub fn tick(&mut self, now_ns: u64) -> Result<()> {
        if self.state != WorldState::Running {
            return Err(EngineError::LoopLifecycle("tick requires a running world"));
        }
        let fired = self.scheduler.due(now_ns);
        for (_, role) in fired {
            match role {
                crate::scheduler::TimerRole::AggregationFlush(key) => {
                    let mut out = Vec::new();
                    if let Some(entry) = self.contexts.get_mut(&key) {
                        if let ContextKind::Aggregation(actx) = &mut entry.kind {
                            actx.flush(now_ns, &mut |e| out.push(e));
                        }
                    }
                    for e in out {
                        self.emit(e);
                    }
                }
                crate::scheduler::TimerRole::CorrelationCleanup(key) => {
                    if let Some(entry) = self.contexts.get_mut(&key) {
                        if let ContextKind::Correlation(cctx) = &mut entry.kind {
                            cctx.cleanup(now_ns);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

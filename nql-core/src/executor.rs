//! The executor: resolves a query-text + world pair to its execution context, dispatches
//! by query kind, and drives aggregation/correlation state and emission.

use crate::aggregation::AggregationContext;
use crate::correlation::CorrelationContext;
use crate::error::{EngineError, Result};
use crate::event::Event;
use crate::predicate::Predicate;
use crate::query::{AggFunc, Query, Window};
use crate::world::{ContextEntry, ContextKind, World};
use std::sync::Arc;
use tracing::debug;

/// Public operation: parse-or-retrieve `query_text`, dispatch on its root variant, and
/// return the combined boolean (for `Pipeline`, stages execute left-to-right and
/// short-circuit on the first `false`).
pub fn execute(world: &mut World, query_text: &str, event: &Event, now_ns: u64) -> Result<bool> {
    if matches!(world.state, crate::world::WorldState::New | crate::world::WorldState::Freed) {
        return Err(EngineError::LoopLifecycle("execute requires an opened, not-yet-freed world"));
    }
    let query = resolve_query(world, query_text)?;
    let accepted = execute_query(world, query_text, &query, event, now_ns)?;
    world.note_processed();
    Ok(accepted)
}

fn resolve_query(world: &mut World, text: &str) -> Result<Arc<Query>> {
    if let Some(q) = world.query_cache.get(text) {
        return Ok(q.clone());
    }
    let q = Arc::new(Query::parse(text)?);
    world.query_cache.insert(text.to_string(), q.clone());
    Ok(q)
}

fn execute_query(world: &mut World, key: &str, query: &Query, event: &Event, now_ns: u64) -> Result<bool> {
    match query {
        Query::Filter(pred) => Ok(pred.eval(event.payload())),
        Query::Show { fields: _, where_pred } => {
            Ok(where_pred.as_ref().map(|p| p.eval(event.payload())).unwrap_or(true))
        }
        Query::Correlate { left, right, within_ms } => {
            ensure_correlation_context(world, key, left.clone(), right.clone(), *within_ms, now_ns);
            let mut out = Vec::new();
            let matched = {
                let entry = world.contexts.get_mut(key).expect("context just ensured");
                let ContextKind::Correlation(cctx) = &mut entry.kind else {
                    unreachable!("registry key bound to a correlation context")
                };
                cctx.process(event, now_ns, &mut |e| out.push(e))
            };
            if matched {
                world.note_correlated();
            }
            for e in out {
                world.emit(e);
            }
            Ok(matched)
        }
        Query::Aggregate { funcs, by, where_pred, window } => {
            ensure_aggregation_context(world, key, funcs.clone(), by.clone(), where_pred.clone(), *window, now_ns);
            let mut out = Vec::new();
            let accepted = {
                let entry = world.contexts.get_mut(key).expect("context just ensured");
                let ContextKind::Aggregation(actx) = &mut entry.kind else {
                    unreachable!("registry key bound to an aggregation context")
                };
                actx.process(event, now_ns, &mut |e| out.push(e))
            };
            for e in out {
                world.emit(e);
            }
            Ok(accepted)
        }
        Query::Pipeline(stages) => {
            for (i, stage) in stages.iter().enumerate() {
                let stage_key = format!("{}\u{0}{}", key, i);
                if !execute_query(world, &stage_key, stage, event, now_ns)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn ensure_correlation_context(world: &mut World, key: &str, left: Predicate, right: Predicate, within_ms: u64, now_ns: u64) {
    if world.contexts.contains_key(key) {
        return;
    }
    debug!(context = key, within_ms, "creating correlation context");
    let ctx = CorrelationContext::new(left, right, within_ms);
    let mut timer_ids = Vec::new();
    if world.is_started() {
        let id = world.scheduler.schedule_repeating(
            1_000,
            crate::scheduler::TimerRole::CorrelationCleanup(key.to_string()),
            now_ns,
        );
        timer_ids.push(id);
    }
    world.contexts.insert(key.to_string(), ContextEntry { kind: ContextKind::Correlation(ctx), timer_ids });
}

fn ensure_aggregation_context(
    world: &mut World,
    key: &str,
    funcs: Vec<AggFunc>,
    by: Vec<String>,
    where_pred: Option<Predicate>,
    window: Window,
    now_ns: u64,
) {
    if world.contexts.contains_key(key) {
        return;
    }
    debug!(context = key, ?window, "creating aggregation context");
    let actx = AggregationContext::new(funcs, by, where_pred, window);
    let mut timer_ids = Vec::new();
    if let Some(period_ms) = actx.flush_period_ms() {
        if world.is_started() {
            let id =
                world.scheduler.schedule_repeating(period_ms, crate::scheduler::TimerRole::AggregationFlush(key.to_string()), now_ns);
            timer_ids.push(id);
        }
    }
    world.contexts.insert(key.to_string(), ContextEntry { kind: ContextKind::Aggregation(actx), timer_ids });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ev(payload: serde_json::Value) -> Event {
        Event::new(EventKind::Log, 0, payload)
    }

    #[test]
    fn filter_scenario_true_and_false() {
        let mut w = World::new();
        w.open().unwrap();
        w.start().unwrap();
        assert!(execute(&mut w, "level == \"ERROR\"", &ev(json!({"level": "ERROR"})), 0).unwrap());
        assert!(!execute(&mut w, "level == \"ERROR\"", &ev(json!({"level": "INFO"})), 0).unwrap());
    }

    #[test]
    fn lazy_timer_invariant_before_start() {
        let mut w = World::new();
        w.open().unwrap();
        let q = "aggregate count() by service where level==\"ERROR\" window tumbling(1s)";
        for _ in 0..3 {
            execute(&mut w, q, &ev(json!({"level": "ERROR", "service": "api"})), 0).unwrap();
        }
        assert_eq!(w.active_timer_count(), 0, "no scheduler handle before the world is started");
        assert_eq!(w.context_count(), 1);
    }

    #[test]
    fn timer_created_lazily_once_started() {
        let mut w = World::new();
        w.open().unwrap();
        w.start().unwrap();
        let q = "aggregate count() window tumbling(1s)";
        execute(&mut w, q, &ev(json!({})), 0).unwrap();
        assert_eq!(w.active_timer_count(), 1);
    }

    #[test]
    fn non_windowed_aggregate_emits_through_handler() {
        let emitted = Rc::new(RefCell::new(Vec::new()));
        let emitted2 = emitted.clone();
        let mut w = World::new();
        w.set_handler(move |e| emitted2.borrow_mut().push(e));
        w.open().unwrap();
        w.start().unwrap();
        execute(&mut w, "aggregate count(), avg(latency_ms) where level==\"ERROR\"", &ev(json!({"level": "ERROR", "latency_ms": 42.5})), 0).unwrap();
        assert_eq!(emitted.borrow().len(), 1);
        assert_eq!(emitted.borrow()[0].kind(), EventKind::Aggregation);
    }

    #[test]
    fn correlation_end_to_end_through_world() {
        let emitted = Rc::new(RefCell::new(Vec::new()));
        let emitted2 = emitted.clone();
        let mut w = World::new();
        w.set_handler(move |e| emitted2.borrow_mut().push(e));
        w.open().unwrap();
        w.start().unwrap();
        let q = "correlate level == \"ERROR\" with dst_port == 3306 within 100ms";
        execute(&mut w, q, &ev(json!({"level": "ERROR"})), 0).unwrap();
        execute(&mut w, q, &ev(json!({"dst_port": 3306})), 50_000_000).unwrap();
        assert_eq!(emitted.borrow().len(), 1);
        assert_eq!(w.events_correlated(), 1);
        assert_eq!(w.active_timer_count(), 1, "cleanup timer registered once the correlation context exists");
    }

    #[test]
    fn pipeline_short_circuits_on_first_false_stage() {
        let mut w = World::new();
        w.open().unwrap();
        w.start().unwrap();
        let ok = execute(&mut w, "level == \"ERROR\" | show *", &ev(json!({"level": "INFO"})), 0).unwrap();
        assert!(!ok);
        // a second stage context must never have been created since the pipeline
        // short-circuited on the first.
        assert_eq!(w.context_count(), 0);
    }

    #[test]
    fn execute_allowed_once_opened_even_before_start() {
        let mut w = World::new();
        w.open().unwrap();
        assert!(execute(&mut w, "x == 1", &ev(json!({"x": 1})), 0).is_ok());
    }

    #[test]
    fn execute_rejected_before_open_or_after_free() {
        let mut w = World::new();
        assert!(execute(&mut w, "x == 1", &ev(json!({})), 0).is_err());
        w.open().unwrap();
        w.free().unwrap();
        assert!(execute(&mut w, "x == 1", &ev(json!({})), 0).is_err());
    }
}

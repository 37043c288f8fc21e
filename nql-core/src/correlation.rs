//! Bidirectional time-windowed join between two predicates, with a cleanup timer
//! bounding buffer growth.

use crate::event::{Event, EventKind};
use crate::predicate::Predicate;
use serde_json::{Map, Value};

pub struct CorrelationContext {
    left_pred: Predicate,
    right_pred: Predicate,
    within_ms: u64,
    left: Vec<(Event, u64)>,
    right: Vec<(Event, u64)>,
}

fn abs_diff_ns(a: u64, b: u64) -> u64 {
    a.max(b) - a.min(b)
}

impl CorrelationContext {
    pub fn new(left_pred: Predicate, right_pred: Predicate, within_ms: u64) -> Self {
        CorrelationContext { left_pred, right_pred, within_ms, left: Vec::new(), right: Vec::new() }
    }

    pub fn within_ms(&self) -> u64 {
        self.within_ms
    }

    /// Process one event against both sides. Returns whether it matched either
    /// predicate. Self-joins are structurally impossible: each side is only ever
    /// matched against the *other* buffer, snapshotted before this event's own
    /// append(s).
    pub fn process(&mut self, event: &Event, ts_ns: u64, emit: &mut dyn FnMut(Event)) -> bool {
        let matches_left = self.left_pred.eval(event.payload());
        let matches_right = self.right_pred.eval(event.payload());
        if !matches_left && !matches_right {
            return false;
        }
        let within_ns = self.within_ms.saturating_mul(1_000_000);
        let right_before = self.right.len();
        let left_before = self.left.len();

        if matches_left {
            for (r_event, r_ts) in &self.right[..right_before] {
                if abs_diff_ns(ts_ns, *r_ts) <= within_ns {
                    emit(make_correlation(event, r_event, self.within_ms, ts_ns, *r_ts));
                }
            }
        }
        if matches_right {
            for (l_event, l_ts) in &self.left[..left_before] {
                if abs_diff_ns(ts_ns, *l_ts) <= within_ns {
                    emit(make_correlation(l_event, event, self.within_ms, *l_ts, ts_ns));
                }
            }
        }
        if matches_left {
            self.left.push((event.clone(), ts_ns));
        }
        if matches_right {
            self.right.push((event.clone(), ts_ns));
        }
        true
    }

    /// Evict entries older than `now_ns - 2*within_ms`. The 2x factor gives headroom so
    /// entries straddling the window boundary remain joinable up to the next cleanup.
    pub fn cleanup(&mut self, now_ns: u64) {
        let threshold_ns = self.within_ms.saturating_mul(2).saturating_mul(1_000_000);
        let cutoff = now_ns.saturating_sub(threshold_ns);
        self.left.retain(|(_, ts)| *ts >= cutoff);
        self.right.retain(|(_, ts)| *ts >= cutoff);
    }

    pub fn total_len(&self) -> usize {
        self.left.len() + self.right.len()
    }
}

fn make_correlation(left: &Event, right: &Event, within_ms: u64, left_ts: u64, right_ts: u64) -> Event {
    let mut payload = Map::new();
    payload.insert("nql_result_type".to_string(), Value::from("correlation"));
    payload.insert("window_ms".to_string(), Value::from(within_ms));
    payload.insert("left_event".to_string(), left.payload().clone());
    payload.insert("right_event".to_string(), right.payload().clone());
    let diff_ms = (left_ts as f64 - right_ts as f64) / 1_000_000.0;
    payload.insert("time_diff_ms".to_string(), Value::from(diff_ms));
    let ts_ns = left_ts.max(right_ts);
    Event::new(EventKind::Correlation, ts_ns, Value::Object(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log_error(ts_ns: u64) -> Event {
        Event::new(EventKind::Log, ts_ns, json!({"level": "ERROR"}))
    }

    fn net_event(ts_ns: u64) -> Event {
        Event::new(EventKind::Network, ts_ns, json!({"dst_port": 3306}))
    }

    fn ctx(within_ms: u64) -> CorrelationContext {
        CorrelationContext::new(
            Predicate::parse("level == \"ERROR\"").unwrap(),
            Predicate::parse("dst_port == 3306").unwrap(),
            within_ms,
        )
    }

    #[test]
    fn correlation_match_within_window() {
        let mut c = ctx(100);
        let mut emitted = Vec::new();
        c.process(&log_error(0), 0, &mut |e| emitted.push(e));
        c.process(&net_event(50_000_000), 50_000_000, &mut |e| emitted.push(e));
        assert_eq!(emitted.len(), 1);
        let p = emitted[0].payload();
        assert_eq!(p["window_ms"], 100);
        assert!((p["time_diff_ms"].as_f64().unwrap() - (-50.0)).abs() < 1e-6);
    }

    #[test]
    fn correlation_miss_outside_window() {
        let mut c = ctx(100);
        let mut emitted = Vec::new();
        c.process(&log_error(0), 0, &mut |e| emitted.push(e));
        c.process(&net_event(200_000_000), 200_000_000, &mut |e| emitted.push(e));
        assert!(emitted.is_empty());
    }

    #[test]
    fn bidirectional_order_does_not_matter() {
        let mut c = ctx(100);
        let mut emitted = Vec::new();
        c.process(&net_event(0), 0, &mut |e| emitted.push(e));
        c.process(&log_error(50_000_000), 50_000_000, &mut |e| emitted.push(e));
        assert_eq!(emitted.len(), 1);
    }

    #[test]
    fn correlation_symmetry_same_pairing_either_order() {
        let mut a = ctx(100);
        let mut emitted_a = Vec::new();
        a.process(&log_error(0), 0, &mut |e| emitted_a.push(e));
        a.process(&net_event(10_000_000), 10_000_000, &mut |e| emitted_a.push(e));

        let mut b = ctx(100);
        let mut emitted_b = Vec::new();
        b.process(&net_event(10_000_000), 10_000_000, &mut |e| emitted_b.push(e));
        b.process(&log_error(0), 0, &mut |e| emitted_b.push(e));

        assert_eq!(emitted_a.len(), 1);
        assert_eq!(emitted_b.len(), 1);
        assert_eq!(emitted_a[0].payload()["time_diff_ms"], emitted_b[0].payload()["time_diff_ms"]);
    }

    #[test]
    fn self_match_not_produced_when_event_matches_both_sides() {
        let both = Predicate::parse("x == 1").unwrap();
        let mut c = CorrelationContext::new(both.clone(), both, 100);
        let mut emitted = Vec::new();
        let e = Event::new(EventKind::Log, 0, json!({"x": 1}));
        c.process(&e, 0, &mut |ev| emitted.push(ev));
        assert!(emitted.is_empty(), "an event matching both sides must not join with itself");
        assert_eq!(c.total_len(), 2, "it is appended to both buffers though");
    }

    #[test]
    fn cleanup_evicts_entries_older_than_twice_the_window() {
        let mut c = ctx(100);
        let mut emitted = Vec::new();
        c.process(&log_error(0), 0, &mut |e| emitted.push(e));
        assert_eq!(c.total_len(), 1);
        c.cleanup(150_000_000); // 150ms < 2*100ms=200ms, not yet evicted
        assert_eq!(c.total_len(), 1);
        c.cleanup(250_000_000); // 250ms > 200ms, evicted
        assert_eq!(c.total_len(), 0);
    }

    #[test]
    fn correlation_bound_holds_under_cleanup() {
        let mut c = ctx(100);
        let mut emitted = Vec::new();
        let mut accepted = 0u64;
        for i in 0..50u64 {
            let ts = i * 10_000_000; // 10ms apart
            if c.process(&log_error(ts), ts, &mut |e| emitted.push(e)) {
                accepted += 1;
            }
            c.cleanup(ts);
        }
        assert!(c.total_len() as u64 <= accepted);
    }
}

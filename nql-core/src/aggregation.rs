//! Group-by aggregation buckets: accumulators, windowing and percentile sampling.

use crate::event::{Event, EventKind};
use crate::predicate::Predicate;
use crate::query::{AggFunc, Window};
use crate::value;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Bound on the percentile sample list per bucket per field. Spec calls out that raw,
/// unbounded sample storage breaks the correlation/memory-bound property; this keeps the
/// most recent N samples rather than doing true reservoir sampling, which needs no RNG
/// and is sufficient to bound memory.
pub const SAMPLE_CAP: usize = 1024;

#[derive(Debug, Default)]
struct Bucket {
    count: u64,
    sums: HashMap<String, f64>,
    sum_sqs: HashMap<String, f64>,
    mins: HashMap<String, f64>,
    maxs: HashMap<String, f64>,
    distinct: HashMap<String, HashSet<String>>,
    samples: HashMap<String, Vec<f64>>,
    window_start_ns: u64,
    window_end_ns: u64,
}

impl Bucket {
    fn new(now_ns: u64, window: Window, funcs: &[AggFunc]) -> Self {
        let mut b = Bucket::default();
        for f in funcs {
            if let AggFunc::Sum(field) | AggFunc::Avg(field) | AggFunc::Min(field) | AggFunc::Max(field) = f {
                b.mins.insert(field.clone(), f64::INFINITY);
                b.maxs.insert(field.clone(), f64::NEG_INFINITY);
            }
        }
        let (start, end) = match window {
            Window::None => (now_ns, u64::MAX),
            Window::Tumbling(size_ms) => (now_ns, now_ns.saturating_add(size_ms.saturating_mul(1_000_000))),
            Window::Sliding(size_ms, _) => (now_ns, now_ns.saturating_add(size_ms.saturating_mul(1_000_000))),
            Window::Session(timeout_ms) => (now_ns, now_ns.saturating_add(timeout_ms.saturating_mul(1_000_000))),
        };
        b.window_start_ns = start;
        b.window_end_ns = end;
        b
    }

    fn reset(&mut self, now_ns: u64, size_ms: u64) {
        self.count = 0;
        self.sums.clear();
        self.sum_sqs.clear();
        for v in self.mins.values_mut() {
            *v = f64::INFINITY;
        }
        for v in self.maxs.values_mut() {
            *v = f64::NEG_INFINITY;
        }
        self.distinct.clear();
        self.samples.clear();
        self.window_start_ns = now_ns;
        self.window_end_ns = now_ns.saturating_add(size_ms.saturating_mul(1_000_000));
    }
}

fn reservoir_push(samples: &mut Vec<f64>, v: f64) {
    if samples.len() >= SAMPLE_CAP {
        samples.remove(0);
    }
    samples.push(v);
}

/// Format a scalar for group-key concatenation and distinct-set membership: strings
/// verbatim, integers as decimal, reals with 6 fractional digits, everything else via
/// its JSON text.
fn format_scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                format!("{:.6}", n.as_f64().unwrap_or(0.0))
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn group_key(payload: &Value, by: &[String]) -> Vec<String> {
    by.iter()
        .map(|f| match value::field_lookup(payload, f) {
            None => "null".to_string(),
            Some(v) => format_scalar(v),
        })
        .collect()
}

fn format_percentile_suffix(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("{}", p as i64)
    } else {
        format!("{}", p)
    }
}

fn percentile_of(samples: &[f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    let idx = ((p / 100.0) * n as f64).floor() as usize;
    sorted[idx.min(n - 1)]
}

pub struct AggregationContext {
    funcs: Vec<AggFunc>,
    by: Vec<String>,
    where_pred: Option<Predicate>,
    window: Window,
    buckets: HashMap<Vec<String>, Bucket>,
}

impl AggregationContext {
    pub fn new(funcs: Vec<AggFunc>, by: Vec<String>, where_pred: Option<Predicate>, window: Window) -> Self {
        AggregationContext { funcs, by, where_pred, window, buckets: HashMap::new() }
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Period at which the flush timer should be scheduled, or `None` if this context
    /// has no window and therefore never needs one (lazy timer invariant).
    pub fn flush_period_ms(&self) -> Option<u64> {
        match self.window {
            Window::None => None,
            Window::Tumbling(size_ms) => Some(size_ms),
            Window::Sliding(_, slide_ms) => Some(slide_ms),
            Window::Session(timeout_ms) => Some(timeout_ms),
        }
    }

    /// Process one event. Returns whether it satisfied the where-filter and was
    /// accepted into a bucket. `emit` is called for each synthesized result event (only
    /// for non-windowed aggregates here; windowed ones emit from `flush`).
    pub fn process(&mut self, event: &Event, event_ts_ns: u64, emit: &mut dyn FnMut(Event)) -> bool {
        if let Some(pred) = &self.where_pred {
            if !pred.eval(event.payload()) {
                return false;
            }
        }
        let key = group_key(event.payload(), &self.by);
        let window = self.window;
        let funcs = &self.funcs;
        let bucket = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| Bucket::new(event_ts_ns, window, funcs));

        bucket.count += 1;
        for f in &self.funcs {
            match f {
                AggFunc::Count => {}
                AggFunc::Sum(field) | AggFunc::Avg(field) => {
                    if let Some(v) = event.get_field(field).and_then(value::as_f64) {
                        *bucket.sums.entry(field.clone()).or_insert(0.0) += v;
                        *bucket.sum_sqs.entry(field.clone()).or_insert(0.0) += v * v;
                        update_min_max(bucket, field, v);
                    }
                }
                AggFunc::Min(field) | AggFunc::Max(field) => {
                    if let Some(v) = event.get_field(field).and_then(value::as_f64) {
                        update_min_max(bucket, field, v);
                    }
                }
                AggFunc::Percentile(field, _) => {
                    if let Some(v) = event.get_field(field).and_then(value::as_f64) {
                        reservoir_push(bucket.samples.entry(field.clone()).or_default(), v);
                    }
                }
                AggFunc::Distinct(field) => {
                    if let Some(v) = event.get_field(field) {
                        bucket.distinct.entry(field.clone()).or_default().insert(format_scalar(v));
                    }
                }
            }
        }

        if let Window::Session(timeout_ms) = self.window {
            bucket.window_end_ns = event_ts_ns.saturating_add(timeout_ms.saturating_mul(1_000_000));
        }

        if self.window == Window::None {
            let windowed = false;
            let result = synthesize(&key, &self.by, bucket, &self.funcs, windowed, event_ts_ns);
            emit(result);
        }
        true
    }

    /// Timer-driven flush: emit and reset (tumbling/sliding) or emit-and-destroy
    /// (session) every bucket whose window has closed as of `now_ns`.
    pub fn flush(&mut self, now_ns: u64, emit: &mut dyn FnMut(Event)) {
        let mut to_remove = Vec::new();
        for (key, bucket) in self.buckets.iter_mut() {
            if bucket.window_end_ns > now_ns {
                continue;
            }
            debug!(bucket = ?key, count = bucket.count, now_ns, "flushing aggregation window");
            let result = synthesize(key, &self.by, bucket, &self.funcs, true, now_ns);
            emit(result);
            match self.window {
                Window::Session(_) => to_remove.push(key.clone()),
                Window::Tumbling(size_ms) => bucket.reset(now_ns, size_ms),
                Window::Sliding(size_ms, _) => bucket.reset(now_ns, size_ms),
                Window::None => {}
            }
        }
        for key in to_remove {
            self.buckets.remove(&key);
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

fn update_min_max(bucket: &mut Bucket, field: &str, v: f64) {
    let mn = bucket.mins.entry(field.to_string()).or_insert(f64::INFINITY);
    if v < *mn {
        *mn = v;
    }
    let mx = bucket.maxs.entry(field.to_string()).or_insert(f64::NEG_INFINITY);
    if v > *mx {
        *mx = v;
    }
}

fn synthesize(key: &[String], by: &[String], bucket: &Bucket, funcs: &[AggFunc], windowed: bool, ts_ns: u64) -> Event {
    let mut metrics = Map::new();
    metrics.insert("count".to_string(), Value::from(bucket.count));
    for f in funcs {
        match f {
            AggFunc::Count => {}
            AggFunc::Sum(field) => {
                metrics.insert(field.clone(), Value::from(*bucket.sums.get(field).unwrap_or(&0.0)));
            }
            AggFunc::Avg(field) => {
                let sum = *bucket.sums.get(field).unwrap_or(&0.0);
                let avg = if bucket.count > 0 { sum / bucket.count as f64 } else { 0.0 };
                metrics.insert(format!("avg_{}", field), Value::from(avg));
            }
            AggFunc::Min(field) => {
                let m = bucket.mins.get(field).copied().unwrap_or(f64::INFINITY);
                let m = if m.is_finite() { m } else { 0.0 };
                metrics.insert(format!("min_{}", field), Value::from(m));
            }
            AggFunc::Max(field) => {
                let m = bucket.maxs.get(field).copied().unwrap_or(f64::NEG_INFINITY);
                let m = if m.is_finite() { m } else { 0.0 };
                metrics.insert(format!("max_{}", field), Value::from(m));
            }
            AggFunc::Percentile(field, p) => {
                let samples = bucket.samples.get(field).map(|s| s.as_slice()).unwrap_or(&[]);
                let value = percentile_of(samples, *p);
                metrics.insert(format!("p{}_{}", format_percentile_suffix(*p), field), Value::from(value));
            }
            AggFunc::Distinct(field) => {
                let n = bucket.distinct.get(field).map(|s| s.len()).unwrap_or(0);
                metrics.insert(format!("distinct_{}", field), Value::from(n as u64));
            }
        }
    }

    let mut payload = Map::new();
    payload.insert("nql_result_type".to_string(), Value::from("aggregation"));
    if !by.is_empty() {
        let mut group = Map::new();
        for (field, component) in by.iter().zip(key.iter()) {
            group.insert(field.clone(), Value::from(component.clone()));
        }
        payload.insert("group".to_string(), Value::Object(group));
    }
    payload.insert("metrics".to_string(), Value::Object(metrics));
    if windowed {
        let mut window = Map::new();
        window.insert("start_ns".to_string(), Value::from(bucket.window_start_ns));
        window.insert("end_ns".to_string(), Value::from(bucket.window_end_ns));
        payload.insert("window".to_string(), Value::Object(window));
    }

    Event::new(EventKind::Aggregation, ts_ns, Value::Object(payload))
}

//! The `Event` type: a kind, a monotonic timestamp, an optional source back-reference,
//! and a structured payload, shared by reference.
//!
//! The spec's refcount discipline ("cloning increments, freeing decrements, payload
//! storage released when the count reaches zero") is exactly what `Arc` already gives
//! us — `Event::clone` is an `Arc` clone, and the payload is dropped when the last
//! handle goes away. No manual bookkeeping needed, and no mutex: a world and everything
//! it drives runs on one thread, so the inner data is only ever read after construction.

use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Log,
    Network,
    Correlation,
    Aggregation,
    Error,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Log => "log",
            EventKind::Network => "network",
            EventKind::Correlation => "correlation",
            EventKind::Aggregation => "aggregation",
            EventKind::Error => "error",
        }
    }
}

#[derive(Debug)]
struct EventInner {
    kind: EventKind,
    timestamp_ns: u64,
    source: Option<String>,
    payload: Value,
}

/// A reference-counted handle to an event. Cheap to clone; the underlying payload is
/// freed once the last handle is dropped.
#[derive(Debug, Clone)]
pub struct Event(Arc<EventInner>);

impl Event {
    pub fn new(kind: EventKind, timestamp_ns: u64, payload: Value) -> Self {
        Event(Arc::new(EventInner {
            kind,
            timestamp_ns,
            source: None,
            payload,
        }))
    }

    pub fn with_source(kind: EventKind, timestamp_ns: u64, source: impl Into<String>, payload: Value) -> Self {
        Event(Arc::new(EventInner {
            kind,
            timestamp_ns,
            source: Some(source.into()),
            payload,
        }))
    }

    pub fn kind(&self) -> EventKind {
        self.0.kind
    }

    pub fn timestamp_ns(&self) -> u64 {
        self.0.timestamp_ns
    }

    pub fn source(&self) -> Option<&str> {
        self.0.source.as_deref()
    }

    pub fn payload(&self) -> &Value {
        &self.0.payload
    }

    pub fn get_field(&self, path: &str) -> Option<&Value> {
        crate::value::field_lookup(&self.0.payload, path)
    }

    /// Number of live handles to this event's payload, exposed for tests that assert on
    /// the refcount discipline rather than inspecting process memory.
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

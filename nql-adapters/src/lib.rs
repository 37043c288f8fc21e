//! Boundary collaborators around the nql-core engine: a file-tailing source, a
//! vendor log parser, and output sinks. None of this is part of the query
//! engine itself; it exists to get bytes in and derived events out.

pub mod errors;
pub mod file_source;
pub mod parsers;
pub mod sink;

pub use errors::{AdapterError, Result};

/// Turns one raw line of vendor log text into a core `Event`. Implementations
/// never fail outright on a malformed line; they return `None` so a bad line
/// just gets dropped rather than taking down the tailer.
pub trait LineParser: Send + Sync {
    fn parse(&self, raw_line: &str, source: &str, timestamp_ns: u64) -> Option<nql_core::Event>;
}

/// Delivers a derived event somewhere outside the engine (stdout, a file, ...).
pub trait EventSink {
    fn write(&mut self, event: &nql_core::Event) -> Result<()>;
}

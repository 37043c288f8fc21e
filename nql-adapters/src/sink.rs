//! Output sinks for derived events: newline-delimited JSON to stdout or to a
//! file, mirroring the teacher's plain `log`/`info!` style output rather than
//! a structured shipper (Kafka/ClickHouse sinks are genuinely out of scope here).

use crate::errors::Result;
use nql_core::Event;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, serde::Serialize)]
struct EventLine<'a> {
    kind: nql_core::EventKind,
    timestamp_ns: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    payload: &'a serde_json::Value,
}

fn line_for(event: &Event) -> Result<String> {
    let line = EventLine { kind: event.kind(), timestamp_ns: event.timestamp_ns(), source: event.source(), payload: event.payload() };
    serde_json::to_string(&line).map_err(|e| crate::errors::AdapterError::Parse(e.to_string()))
}

pub struct StdoutSink {
    writer: BufWriter<io::Stdout>,
}

impl StdoutSink {
    pub fn new() -> Self {
        StdoutSink { writer: BufWriter::new(io::stdout()) }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl crate::EventSink for StdoutSink {
    fn write(&mut self, event: &Event) -> Result<()> {
        writeln!(self.writer, "{}", line_for(event)?)?;
        self.writer.flush()?;
        Ok(())
    }
}

pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileSink { writer: BufWriter::new(file) })
    }
}

impl crate::EventSink for FileSink {
    fn write(&mut self, event: &Event) -> Result<()> {
        writeln!(self.writer, "{}", line_for(event)?)?;
        self.writer.flush()?;
        Ok(())
    }
}

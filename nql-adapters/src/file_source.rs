//! Tails a single log file, handing each newly appended line to a `LineParser`
//! and forwarding whatever it produces over an unbounded channel.
//!
//! Grounded in the teacher's newline-delimited connection loop (`tcp_listener`):
//! same "accumulate until '\n', drain complete lines" discipline, just fed by
//! file appends instead of a socket.

use crate::errors::{AdapterError, Result};
use crate::LineParser;
use log::{info, warn};
use notify::{Event as NotifyEvent, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc::{self, UnboundedSender};

pub struct FileTailSource {
    path: PathBuf,
    parser: Arc<dyn LineParser>,
}

impl FileTailSource {
    pub fn new(path: impl Into<PathBuf>, parser: Arc<dyn LineParser>) -> Self {
        FileTailSource { path: path.into(), parser }
    }

    /// Runs until the watched file is removed or the channel receiver drops.
    /// Starts tailing from the current end of file, matching a typical "follow
    /// new writes only" log-shipping source.
    pub async fn run(self, out: UnboundedSender<nql_core::Event>) -> Result<()> {
        let mut file = File::open(&self.path).await?;
        let mut offset = file.seek(SeekFrom::End(0)).await?;
        let mut carry = String::new();

        let mut changes = watch(&self.path)?;
        info!("tailing {}", self.path.display());

        loop {
            tokio::select! {
                _ = changes.recv() => {}
                _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            }

            file.seek(SeekFrom::Start(offset)).await?;
            let mut buf = Vec::new();
            let n = file.read_to_end(&mut buf).await?;
            if n == 0 {
                continue;
            }
            offset += n as u64;
            carry.push_str(&String::from_utf8_lossy(&buf));

            while let Some(pos) = carry.find('\n') {
                let line = carry[..pos].trim_end_matches('\r').to_string();
                carry = carry[pos + 1..].to_string();
                if line.is_empty() {
                    continue;
                }
                let now_ns = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_nanos() as u64)
                    .unwrap_or(0);
                let source = self.path.display().to_string();
                if let Some(event) = self.parser.parse(&line, &source, now_ns) {
                    if out.send(event).is_err() {
                        return Ok(());
                    }
                } else {
                    warn!("dropped unparseable line from {}: {:.80}", source, line);
                }
            }
        }
    }
}

fn watch(path: &Path) -> Result<mpsc::UnboundedReceiver<()>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res: notify::Result<NotifyEvent>| {
        if let Ok(event) = res {
            if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                let _ = tx.send(());
            }
        }
    })
    .map_err(AdapterError::from)?;
    watcher
        .watch(path.parent().unwrap_or_else(|| Path::new(".")), RecursiveMode::NonRecursive)
        .map_err(AdapterError::from)?;
    // The watcher must outlive the function; leaking it is the simplest way to
    // keep it alive for the source's lifetime without threading it through run().
    std::mem::forget(watcher);
    Ok(rx)
}

//! Tails a log file, runs one nQL pipeline against every line, and prints
//! derived events to stdout. The real event-loop binding for the engine's
//! scheduler adapter: a `tokio::time::interval` drives `World::tick` the same
//! way the source pipeline binds its workers to a tokio runtime.

use log::{error, info};
use nql_core::World;
use nql_adapters::file_source::FileTailSource;
use nql_adapters::parsers::PaloAltoParser;
use nql_adapters::sink::StdoutSink;
use nql_adapters::EventSink;
use std::env;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

fn now_ns() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let path = match args.next() {
        Some(p) => p,
        None => {
            error!("usage: nql-tail <file> <query>");
            std::process::exit(2);
        }
    };
    let query: String = args.collect::<Vec<_>>().join(" ");
    if query.is_empty() {
        error!("usage: nql-tail <file> <query>");
        std::process::exit(2);
    }

    let sink = Arc::new(Mutex::new(StdoutSink::new()));
    let mut world = World::new();
    {
        let sink = sink.clone();
        world.set_handler(move |event| {
            if let Ok(mut s) = sink.lock() {
                let _ = s.write(&event);
            }
        });
    }
    world.open().expect("fresh world opens");
    world.start().expect("opened world starts");
    world.run().expect("started world runs");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let parser = Arc::new(PaloAltoParser::new());
    let source = FileTailSource::new(path.clone(), parser);
    tokio::spawn(async move {
        if let Err(e) = source.run(tx).await {
            error!("file source stopped: {}", e);
        }
    });

    info!("running query against {}: {}", path, query);
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(event) => {
                        if let Err(e) = nql_core::execute(&mut world, &query, &event, now_ns()) {
                            error!("query execution failed: {}", e);
                        }
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                if let Err(e) = world.tick(now_ns()) {
                    error!("tick failed: {}", e);
                }
            }
        }
    }

    let _ = world.stop();
    let _ = world.free();
}

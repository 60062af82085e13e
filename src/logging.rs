// src/logging.rs
//
// Event sinks for doseloop.
// - EventSink:     trait the session emits through
// - NoopSink:      discards all events
// - JsonlSink:     one JSON line per event, for offline analysis
// - BroadcastSink: fans events out to live observers
// - TeeSink:       duplicates events across several sinks
// - VecSink:       captures events in memory (tests)

use std::fs::File;
use std::io::{self, BufWriter, Write};

use tokio::sync::broadcast;

use crate::events::Event;

/// Abstract sink for engine events. The session core knows nothing about
/// transports; it only emits through this trait.
pub trait EventSink {
    fn emit(&mut self, event: &Event);
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&mut self, _event: &Event) {
        // intentionally no-op
    }
}

/// JSONL file sink: each event as a single JSON object on its own line.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: &str) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl EventSink for JsonlSink {
    fn emit(&mut self, event: &Event) {
        let Ok(line) = serde_json::to_string(event) else {
            return;
        };
        // If logging fails we don't want to crash the engine,
        // so I/O errors are deliberately ignored.
        let _ = self.writer.write_all(line.as_bytes());
        let _ = self.writer.write_all(b"\n");
        let _ = self.writer.flush();
    }
}

/// Sink that publishes into a tokio broadcast channel.
///
/// Send errors (no observers connected) are ignored; lagged observers drop
/// events on their own receiver, which is the intended at-most-current
/// delivery model.
pub struct BroadcastSink {
    tx: broadcast::Sender<Event>,
}

impl BroadcastSink {
    pub fn new(tx: broadcast::Sender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for BroadcastSink {
    fn emit(&mut self, event: &Event) {
        let _ = self.tx.send(event.clone());
    }
}

/// Sink that forwards each event to every inner sink in order.
pub struct TeeSink {
    sinks: Vec<Box<dyn EventSink + Send>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Box<dyn EventSink + Send>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for TeeSink {
    fn emit(&mut self, event: &Event) {
        for sink in &mut self.sinks {
            sink.emit(event);
        }
    }
}

/// In-memory capture sink for tests.
#[derive(Debug, Default)]
pub struct VecSink {
    pub events: Vec<Event>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events of a given wire tag, e.g. "update".
    pub fn of_kind(&self, kind: &str) -> Vec<&Event> {
        self.events.iter().filter(|e| e.kind() == kind).collect()
    }
}

impl EventSink for VecSink {
    fn emit(&mut self, event: &Event) {
        self.events.push(event.clone());
    }
}

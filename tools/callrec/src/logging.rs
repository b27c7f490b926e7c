use crate::errors::CallrecError;
use crate::log_retention::{enforce_log_budget, log_dir};
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4096;

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent<'a> {
    pub level: &'a str,
    pub event_type: &'a str,
    pub payload: Value,
}

/// Receives instrumentation events from recorders and counters.
///
/// Sinks must never fail the wrapped call, so `emit` has no error channel.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LogEvent<'_>);
}

#[derive(Debug, Clone)]
pub struct JsonlLogger {
    pub path: PathBuf,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

impl JsonlLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
        }
    }

    pub fn append(&self, event: &LogEvent<'_>) -> Result<(), CallrecError> {
        fs::create_dir_all(log_dir(&self.path)).map_err(|e| CallrecError::Io(e.to_string()))?;
        let truncated = truncate_json(event.payload.clone(), self.max_payload_bytes);
        let line = serde_json::to_string(&LogEvent {
            level: event.level,
            event_type: event.event_type,
            payload: truncated,
        })
        .map_err(|e| CallrecError::Serialize(e.to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CallrecError::Io(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| CallrecError::Io(e.to_string()))?;

        let _ = enforce_log_budget(&self.path, self.budget_bytes)?;

        Ok(())
    }
}

impl EventSink for JsonlLogger {
    fn emit(&self, event: &LogEvent<'_>) {
        if let Err(error) = self.append(event) {
            eprintln!("callrec: dropped {} event: {error}", event.event_type);
        }
    }
}

/// Owned copy of an emitted event, as kept by `MemorySink`.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedEvent {
    pub level: String,
    pub event_type: String,
    pub payload: Value,
}

/// Keeps every event in memory; used by tests and by embedders that poll.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<CapturedEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn event_types(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.event_type).collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &LogEvent<'_>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CapturedEvent {
                level: event.level.to_string(),
                event_type: event.event_type.to_string(),
                payload: event.payload.clone(),
            });
    }
}

fn truncate_json(value: Value, max_bytes: usize) -> Value {
    let rendered = serde_json::to_string(&value).unwrap_or_default();
    if rendered.len() <= max_bytes {
        return value;
    }
    let mut cut = max_bytes.saturating_sub(3);
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    Value::String(format!("{}...", &rendered[..cut]))
}

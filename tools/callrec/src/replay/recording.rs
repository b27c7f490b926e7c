//! History entries and the append-only log each recorder owns.

use crate::capture::Inputs;
use crate::errors::CallrecError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One successful call: its inputs and the value it returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    args: Vec<Value>,
    kwargs: BTreeMap<String, Value>,
    output: Value,
}

impl HistoryEntry {
    pub fn new(inputs: Inputs, output: Value) -> Self {
        Self {
            args: inputs.args,
            kwargs: inputs.kwargs,
            output,
        }
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &BTreeMap<String, Value> {
        &self.kwargs
    }

    pub fn output(&self) -> &Value {
        &self.output
    }
}

/// Ordered, append-only sequence of `HistoryEntry`.
///
/// Appends take the internal lock, so entries from concurrent callers land in
/// the order their calls completed.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` and returns its 1-based position.
    pub(crate) fn append(&self, entry: HistoryEntry) -> usize {
        let mut entries = self.lock();
        entries.push(entry);
        entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every entry, oldest first.
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.lock().clone()
    }

    /// Writes the current entries as JSON lines, replacing `path`.
    ///
    /// This is an inspection dump. Nothing reads it back into a log.
    pub fn export_jsonl(&self, path: impl AsRef<Path>) -> Result<usize, CallrecError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CallrecError::Io(e.to_string()))?;
        }
        let entries = self.snapshot();
        let file = File::create(path).map_err(|e| CallrecError::Io(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        for entry in &entries {
            let line =
                serde_json::to_string(entry).map_err(|e| CallrecError::Serialize(e.to_string()))?;
            writeln!(writer, "{line}").map_err(|e| CallrecError::Io(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| CallrecError::Io(e.to_string()))?;
        Ok(entries.len())
    }

    // A panic can only poison the lock between calls to `push`, never inside
    // one, so the vector is always whole.
    fn lock(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

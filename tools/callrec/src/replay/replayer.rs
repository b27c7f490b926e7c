//! Read-only rendering of a recorder's history.

use crate::errors::{CallrecError, ReplayError};
use crate::replay::recorder::Instrumented;
use crate::replay::recording::HistoryEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedEntry {
    /// 1-based call number.
    pub index: usize,
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
    pub output: Value,
}

/// Everything `replay` observed about one wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedHistory {
    pub name: String,
    pub call_count: usize,
    pub entries: Vec<RenderedEntry>,
}

impl RenderedHistory {
    pub fn from_entries(name: &str, entries: Vec<HistoryEntry>) -> Self {
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| RenderedEntry {
                index: i + 1,
                args: entry.args().to_vec(),
                kwargs: entry.kwargs().clone(),
                output: entry.output().clone(),
            })
            .collect::<Vec<_>>();
        Self {
            name: name.to_string(),
            call_count: entries.len(),
            entries,
        }
    }
}

impl fmt::Display for RenderedHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.call_count == 1 { "time" } else { "times" };
        write!(f, "{} was called {} {noun}:", self.name, self.call_count)?;
        for entry in &self.entries {
            let mut params = entry.args.iter().map(Value::to_string).collect::<Vec<_>>();
            params.extend(entry.kwargs.iter().map(|(key, value)| format!("{key}={value}")));
            write!(
                f,
                "\n  {}. {}({}) -> {}",
                entry.index,
                self.name,
                params.join(", "),
                entry.output
            )?;
        }
        Ok(())
    }
}

/// Renders the call history attached to `target`.
///
/// Never mutates the history. Fails only when `target` keeps no history.
pub fn replay(target: &dyn Instrumented) -> Result<RenderedHistory, ReplayError> {
    let log = target.history().ok_or_else(|| ReplayError::InvalidTarget {
        name: target.name().to_string(),
    })?;
    Ok(RenderedHistory::from_entries(target.name(), log.snapshot()))
}

/// Renders `target` and writes it to `out` in `format`.
pub fn replay_to(
    target: &dyn Instrumented,
    out: &mut dyn Write,
    format: ReplayFormat,
) -> Result<RenderedHistory, CallrecError> {
    let rendered = replay(target)?;
    let written = match format {
        ReplayFormat::Text => writeln!(out, "{rendered}"),
        ReplayFormat::Json => {
            let json = serde_json::to_string_pretty(&rendered)
                .map_err(|e| CallrecError::Serialize(e.to_string()))?;
            writeln!(out, "{json}")
        }
    };
    written.map_err(|e| CallrecError::Io(e.to_string()))?;
    Ok(rendered)
}

/// Prints the text rendering to stdout and returns it.
pub fn print_replay(target: &dyn Instrumented) -> Result<RenderedHistory, CallrecError> {
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    replay_to(target, &mut lock, ReplayFormat::Text)
}

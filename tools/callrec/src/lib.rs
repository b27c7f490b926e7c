pub mod capture;
pub mod config;
pub mod demo;
pub mod errors;
pub mod log_retention;
pub mod logging;
pub mod replay;

pub use capture::{with_kwargs, CallInputs, CapturePolicy, Inputs, WithKwargs};
pub use errors::{CacheError, CallrecError, ReplayError};
pub use replay::counter::{counted, Counted};
pub use replay::recorder::{
    recorder, recorder_fn, recorder_infallible, Callable, Instrumented, Recorded,
};
pub use replay::recording::{HistoryEntry, HistoryLog};
pub use replay::replayer::{
    print_replay, replay, replay_to, RenderedEntry, RenderedHistory, ReplayFormat,
};

use clap::{error::ErrorKind, Parser, ValueEnum};
use config::{load_config, CliOverrides};
use demo::{Cache, Data};
use logging::EventSink;
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Parser)]
#[command(name = "callrec")]
#[command(about = "Store values in a recorded demo cache and replay its call history")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub format: Option<CliFormat>,
    /// Append instrumentation events to this JSONL file.
    #[arg(long)]
    pub event_log: Option<PathBuf>,
    /// Also dump the recorded history as JSON lines.
    #[arg(long)]
    pub export: Option<PathBuf>,
    /// Values passed to `Cache.store`, in order.
    #[arg(required = true)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliFormat {
    Text,
    Json,
}

impl From<CliFormat> for ReplayFormat {
    fn from(value: CliFormat) -> Self {
        match value {
            CliFormat::Text => ReplayFormat::Text,
            CliFormat::Json => ReplayFormat::Json,
        }
    }
}

pub fn run() -> Result<i32, CallrecError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_with_args(&args, &mut out)
}

pub fn run_with_args(args: &[OsString], out: &mut dyn Write) -> Result<i32, CallrecError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                write!(out, "{error}").map_err(|e| CallrecError::Io(e.to_string()))?;
                return Ok(0);
            }
            _ => return Err(CallrecError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        format: cli.format.map(ReplayFormat::from),
        event_log: cli.event_log.clone(),
    };
    let cfg = load_config(&overrides)?;

    let sink = cfg
        .event_logger()
        .map(|logger| Arc::new(logger) as Arc<dyn EventSink>);
    let cache = Cache::with_instrumentation(cfg.capture_policy(), sink);
    for raw in &cli.values {
        cache.store(Data::parse(raw));
    }

    replay_to(cache.store_recorder(), out, cfg.replay.format)?;

    if let Some(path) = &cli.export {
        let written = cache.store_recorder().log().export_jsonl(path)?;
        eprintln!("exported {written} entries to {}", path.display());
    }

    Ok(0)
}

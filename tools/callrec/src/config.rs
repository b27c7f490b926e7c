use crate::capture::{CapturePolicy, DEFAULT_MAX_VALUE_BYTES};
use crate::errors::CallrecError;
use crate::logging::{JsonlLogger, DEFAULT_DISK_BUDGET_BYTES, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::replay::replayer::ReplayFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MIN_PAYLOAD_BYTES: usize = 16;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub format: Option<ReplayFormat>,
    pub event_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureConfig {
    pub max_value_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayConfig {
    pub format: ReplayFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Event log destination; no events are written when unset. Rotated
    /// siblings (`<stem>*.<ext>`) count against `budget_bytes`.
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                max_value_bytes: DEFAULT_MAX_VALUE_BYTES,
            },
            replay: ReplayConfig {
                format: ReplayFormat::Text,
            },
            logging: LoggingConfig {
                path: None,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
                budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
            },
        }
    }
}

impl AppConfig {
    pub fn capture_policy(&self) -> CapturePolicy {
        CapturePolicy {
            max_value_bytes: self.capture.max_value_bytes,
        }
    }

    pub fn event_logger(&self) -> Option<JsonlLogger> {
        let path = self.logging.path.as_ref()?;
        let mut logger = JsonlLogger::new(path);
        logger.max_payload_bytes = self.logging.max_payload_bytes;
        logger.budget_bytes = self.logging.budget_bytes;
        Some(logger)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialAppConfig {
    capture: Option<PartialCaptureConfig>,
    replay: Option<PartialReplayConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialCaptureConfig {
    max_value_bytes: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialReplayConfig {
    format: Option<ReplayFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLoggingConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
    budget_bytes: Option<u64>,
}

pub fn load_config(overrides: &CliOverrides) -> Result<AppConfig, CallrecError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let file_contents =
            std::fs::read_to_string(path).map_err(|e| CallrecError::Io(e.to_string()))?;
        let partial = parse_partial(&file_contents)?;
        merge_partial_config(&mut cfg, partial, path.parent());
    }

    apply_cli_overrides(&mut cfg, overrides);
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Parses a config document on its own, without file or CLI layers.
pub fn parse_config(contents: &str) -> Result<AppConfig, CallrecError> {
    let mut cfg = AppConfig::default();
    merge_partial_config(&mut cfg, parse_partial(contents)?, None);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn parse_partial(contents: &str) -> Result<PartialAppConfig, CallrecError> {
    toml::from_str(contents).map_err(|e| CallrecError::ConfigParse(e.to_string()))
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig, base: Option<&Path>) {
    if let Some(capture) = partial.capture {
        if let Some(value) = capture.max_value_bytes {
            cfg.capture.max_value_bytes = value;
        }
    }

    if let Some(replay) = partial.replay {
        if let Some(format) = replay.format {
            cfg.replay.format = format;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(path) = logging.path {
            // relative log paths are resolved against the config file
            cfg.logging.path = Some(match base {
                Some(base) if path.is_relative() => base.join(path),
                _ => path,
            });
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
        if let Some(value) = logging.budget_bytes {
            cfg.logging.budget_bytes = value;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(format) = overrides.format {
        cfg.replay.format = format;
    }
    if let Some(path) = &overrides.event_log {
        cfg.logging.path = Some(path.clone());
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), CallrecError> {
    if cfg.capture.max_value_bytes == 0 {
        return Err(CallrecError::InvalidConfig(
            "capture.max_value_bytes must be greater than zero".to_string(),
        ));
    }

    if cfg.logging.max_payload_bytes < MIN_PAYLOAD_BYTES {
        return Err(CallrecError::InvalidConfig(format!(
            "logging.max_payload_bytes must be at least {MIN_PAYLOAD_BYTES}"
        )));
    }

    Ok(())
}

//! `tracing` subscriber setup: console only, or console plus a rolling log file.
//!
//! Old log files are pruned at startup so the directory never holds more than
//! `max_log_files` of them.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const DEFAULT_LOG_PREFIX: &str = "kaku-hub";
const DEFAULT_DIRECTIVE: &str = "info";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid rotation period '{0}', expected minutely, hourly, daily or never")]
pub struct InvalidRotation(String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RotationPeriod {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl FromStr for RotationPeriod {
    type Err = InvalidRotation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minutely" | "minute" => Ok(RotationPeriod::Minutely),
            "hourly" | "hour" => Ok(RotationPeriod::Hourly),
            "daily" | "day" => Ok(RotationPeriod::Daily),
            "never" | "none" => Ok(RotationPeriod::Never),
            _ => Err(InvalidRotation(s.to_string())),
        }
    }
}

impl From<RotationPeriod> for Rotation {
    fn from(period: RotationPeriod) -> Self {
        match period {
            RotationPeriod::Minutely => Rotation::MINUTELY,
            RotationPeriod::Hourly => Rotation::HOURLY,
            RotationPeriod::Daily => Rotation::DAILY,
            RotationPeriod::Never => Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub log_prefix: String,
    pub rotation: RotationPeriod,
    /// Files kept on disk, 0 keeps everything.
    pub max_log_files: usize,
}

impl LogConfig {
    pub fn new(log_dir: impl Into<PathBuf>, rotation: RotationPeriod) -> Self {
        Self {
            log_dir: log_dir.into(),
            rotation,
            ..Default::default()
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            log_prefix: DEFAULT_LOG_PREFIX.to_string(),
            rotation: RotationPeriod::Daily,
            max_log_files: 7,
        }
    }
}

/// Flushes pending file output when dropped. Hold it until the program exits.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// `RUST_LOG` if set, `info` otherwise.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

pub fn setup_console_logging() -> LogGuard {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    LogGuard { _file: None }
}

/// Logs to stdout and to a rolling file under `config.log_dir`.
pub fn setup_file_logging(config: &LogConfig) -> std::io::Result<LogGuard> {
    if config.max_log_files > 0 {
        cleanup_old_logs(&config.log_dir, &config.log_prefix, config.max_log_files)?;
    }

    let appender = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(&config.log_prefix)
        .filename_suffix("log")
        .max_log_files(config.max_log_files)
        .build(&config.log_dir)
        .map_err(std::io::Error::other)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = Layer::default()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);
    let console_layer = Layer::default().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(LogGuard {
        _file: Some(guard),
    })
}

fn log_files(log_dir: &Path, prefix: &str) -> std::io::Result<Vec<(PathBuf, SystemTime)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(log_dir)?.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(prefix) || !name.ends_with(".log") {
            continue;
        }
        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            files.push((entry.path(), modified));
        }
    }
    Ok(files)
}

/// Removes all but the `keep` most recent log files. Returns how many were removed.
fn cleanup_old_logs(log_dir: &Path, prefix: &str, keep: usize) -> std::io::Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut files = log_files(log_dir, prefix)?;
    files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in files.into_iter().skip(keep) {
        // the subscriber is not installed yet
        match std::fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Could not remove old log file {}: {e}", path.display()),
        }
    }
    Ok(removed)
}

//! Tracing subscriber setup for binaries embedding kiln.
//!
//! The library itself only emits `tracing` events. Processes that want them
//! printed call [`init_from_env`] (or [`init`]) once at startup.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: full `EnvFilter` directive, takes precedence when set
//! - `KILN_LOG_LEVEL`: error, warn, info, debug or trace (default info)
//! - `KILN_LOG_FORMAT`: human or json (default human)

use std::str::FromStr;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INITIALIZED: OnceLock<()> = OnceLock::new();

pub const LOG_LEVEL_ENV: &str = "KILN_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "KILN_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}

/// Reads [`LOG_LEVEL_ENV`] and [`LOG_FORMAT_ENV`] and installs a global subscriber.
///
/// Unparseable values fall back to the defaults. Calling this more than once,
/// or after another global subscriber was installed, is a no-op.
pub fn init_from_env() {
    let level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();
    let format = std::env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();
    init(level, format);
}

/// Installs a global subscriber with the given level and format.
pub fn init(level: LogLevel, format: LogFormat) {
    INITIALIZED.get_or_init(|| {
        let filter = build_filter(level);
        // try_init: a host application may already own the global subscriber
        let _ = match format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_target(false))
                .try_init(),
            LogFormat::Human => tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(true))
                .try_init(),
        };
    });
}

pub fn is_initialized() -> bool {
    INITIALIZED.get().is_some()
}

fn build_filter(level: LogLevel) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => {
            EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()))
        }
        _ => EnvFilter::new(level.as_filter_str()),
    }
}

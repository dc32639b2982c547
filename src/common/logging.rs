//! Log sink selection and level filtering

use crate::common::{Error, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Console,
    File(PathBuf),
}

impl LogSink {
    pub fn from_target(target: &str) -> Self {
        match target {
            "" | "console" => LogSink::Console,
            path => LogSink::File(PathBuf::from(path)),
        }
    }
}

/// Translate a verbosity name into an `EnvFilter` directive.
///
/// Accepts `err` and `critical` besides the usual tracing level names.
pub fn filter_directive(level: &str) -> Result<&'static str> {
    match level.to_ascii_lowercase().as_str() {
        "off" => Ok("off"),
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "err" | "error" | "critical" => Ok("error"),
        other => Err(Error::InvalidConfig(format!("unknown log level: {}", other))),
    }
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(target: &str, level: &str) -> Result<()> {
    let directive = filter_directive(level)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let (console, file) = match LogSink::from_target(target) {
        LogSink::Console => (Some(fmt::layer()), None),
        LogSink::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            (
                None,
                Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file))),
            )
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| Error::Internal(format!("logging already initialized: {}", e)))
}

//! Logging initialisation.
//!
//! One entry point, [`init`], configured by [`LogMode`]. Every mode writes
//! human-readable output to stderr (stdout is reserved for the CLI's JSON
//! results); service mode additionally writes JSON lines to a daily-rotated
//! file so resolutions can be traced after the fact.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix for rotated service logs.
const LOG_FILE_PREFIX: &str = "inciguard.log";

/// How the process wants its logs handled.
#[derive(Debug, Clone, Copy)]
pub enum LogMode<'a> {
    /// Stderr only, quiet by default (`warn`). For one-shot subcommands
    /// whose stdout must stay machine-parseable.
    Cli,
    /// Stderr plus a daily-rotated JSON file under the given directory,
    /// chattier by default (`info`).
    Service(&'a Path),
}

impl LogMode<'_> {
    fn default_level(self) -> &'static str {
        match self {
            Self::Cli => "warn",
            Self::Service(_) => "info",
        }
    }
}

/// Handle returned by [`init`].
///
/// Holds the file writer's flush guard in service mode; keep it alive for
/// the life of the process, since dropping it flushes and closes the file.
#[must_use]
pub struct LogHandle {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global tracing subscriber for the chosen mode.
///
/// `RUST_LOG` overrides the mode's default level filter.
///
/// # Errors
///
/// Returns an error in service mode if the logs directory cannot be
/// created.
pub fn init(mode: LogMode<'_>) -> anyhow::Result<LogHandle> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(mode.default_level()));

    let (file_layer, file_guard) = match mode {
        LogMode::Service(logs_dir) => {
            std::fs::create_dir_all(logs_dir).with_context(|| {
                format!("failed to create logs directory {}", logs_dir.display())
            })?;
            let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().json().with_writer(writer);
            (Some(layer), Some(guard))
        }
        LogMode::Cli => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(LogHandle {
        _file_guard: file_guard,
    })
}

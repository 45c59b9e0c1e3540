use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` name onto a tracing filter directive.
///
/// `CRITICAL` has no tracing counterpart and is treated as `error`. Unknown
/// names are passed through unchanged so `EnvFilter` syntax still works.
pub fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" | "WARN" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// `true` when log lines may go to stderr: no log file was given and the
/// terminal is not owned by the TUI, whose alternate screen they would
/// overwrite.
pub fn logs_to_stderr(view: &str, has_log_file: bool) -> bool {
    !has_log_file && view != "tui"
}

/// Initialise the global `tracing` subscriber.
///
/// Output goes to `log_file` when given (appended, no colours). Without one,
/// report mode logs to stderr and the TUI logs nowhere. Falls back to
/// `"info"` if the level is not a valid filter.
pub fn setup_logging(
    log_level: &str,
    log_file: Option<&PathBuf>,
    view: &str,
) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(level_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = if logs_to_stderr(view, file_layer.is_some()) {
        Some(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("logging was already initialised")?;

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

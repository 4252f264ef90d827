//! Tracing setup for the server.
//!
//! Events go to stdout in compact form and to a log file. `RUSTY_RAG_LOG_FILE` picks the file
//! (`off` disables it); by default a daily-rotated `logs/rusty-rag.log.<date>` is written.
//! PDF parsing crates are chatty at `info`, so the default filter caps them at `warn`.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_VAR: &str = "RUSTY_RAG_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_PREFIX: &str = "rusty-rag.log";
const DEFAULT_FILTER: &str = "info,pdf_extract=warn,lopdf=warn,hyper=warn";

/// Where file logs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogDestination {
    /// No file layer.
    Disabled,
    /// Append to a single fixed file.
    File(PathBuf),
    /// Rotate daily inside a directory.
    Daily { dir: PathBuf, prefix: String },
}

impl LogDestination {
    fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("") | None => Self::Daily {
                dir: PathBuf::from(DEFAULT_LOG_DIR),
                prefix: DEFAULT_LOG_PREFIX.to_string(),
            },
            Some(value) if value.eq_ignore_ascii_case("off") => Self::Disabled,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this twice leaves the first subscriber in
/// place.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let destination = LogDestination::from_env_value(std::env::var(LOG_FILE_VAR).ok().as_deref());

    let file_layer = file_writer(&destination).map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact()
    });

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
    if let Err(err) = result {
        eprintln!("Tracing already initialized: {err}");
    }
}

fn file_writer(destination: &LogDestination) -> Option<NonBlocking> {
    let (writer, guard) = match destination {
        LogDestination::Disabled => return None,
        LogDestination::File(path) => {
            ensure_parent(path)?;
            match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => tracing_appender::non_blocking(file),
                Err(err) => {
                    eprintln!("Failed to open log file {}: {err}", path.display());
                    return None;
                }
            }
        }
        LogDestination::Daily { dir, prefix } => {
            if let Err(err) = std::fs::create_dir_all(dir) {
                eprintln!("Failed to create log directory {}: {err}", dir.display());
                return None;
            }
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, prefix))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}

fn ensure_parent(path: &Path) -> Option<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => match std::fs::create_dir_all(parent) {
            Ok(()) => Some(()),
            Err(err) => {
                eprintln!("Failed to create log directory {}: {err}", parent.display());
                None
            }
        },
        _ => Some(()),
    }
}

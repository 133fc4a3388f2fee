// Tracing setup for the CLI, demos and tests
//
// `RUST_LOG` overrides the filter everywhere; without it the client crates
// log at debug and everything else at warn.

use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const CLIENT_FILTER: &str = "pellet_client=debug,pellet_core=debug,pellet_transport=debug,warn";
const TEST_FILTER: &str = "pellet_client=trace,pellet_core=debug,pellet_transport=debug,warn";

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

fn daily_file(dir: &Path, prefix: &str) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Log to stderr and to `<dir>/<prefix>.<date>`.
pub fn init_logging(dir: impl AsRef<Path>, prefix: &str) -> anyhow::Result<()> {
    let dir = dir.as_ref();
    let (file_writer, guard) = daily_file(dir, prefix)?;

    tracing_subscriber::registry()
        .with(env_filter(CLIENT_FILTER))
        .with(
            fmt::layer()
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .with(
            fmt::layer()
                .with_thread_names(true)
                .with_timer(ChronoUtc::rfc_3339())
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .try_init()?;

    // Buffered lines are flushed by the guard; keep it for the process lifetime
    std::mem::forget(guard);

    tracing::info!(dir = ?dir, prefix, "File logging enabled");
    Ok(())
}

/// Log to stderr only. A second call is a no-op.
pub fn init_console_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(CLIENT_FILTER))
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Capture-friendly logging for tests. A second call is a no-op.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(TEST_FILTER))
        .with_test_writer()
        .try_init();
}

use std::{path::Path, sync::LazyLock};

use anyhow::{anyhow, Context, Result};
use tracing::{info, level_filters::LevelFilter};
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::{format::FmtSpan, writer::MakeWriterExt};

pub const CLI_PREFIX: &str = "cli";
pub const LAUNCHER_PREFIX: &str = "launcher";

const LOG_DIR_NAME: &str = "logs";
const DEFAULT_LEVEL: &str = "debug";

/// Installs the global subscriber. Logs always go to a daily rotated file in `<app_dir>/logs`.
/// With `show_console` they are mirrored to stderr, which keeps stdout for the shell itself.
pub fn enable_logging(
    prefix: &str,
    app_dir: &Path,
    log_level: Option<LevelFilter>,
    show_console: bool,
) -> Result<()> {
    let log_dir = app_dir.join(LOG_DIR_NAME);
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix(prefix)
        .build(&log_dir)
        .with_context(|| format!("Couldn't open log directory {log_dir:?}"))?;

    let console = std::io::stderr.with_filter(move |_| show_console);

    let level = log_level
        .map(|v| v.to_string())
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LEVEL.into());

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(format!(
            "{}={level}",
            env!("CARGO_PKG_NAME").replace("-", "_"),
        )))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(console.and(appender))
        .pretty()
        .try_init()
        .map_err(|e| anyhow!(e))?;

    info!(
        "Started {prefix} {} logging to {log_dir:?}",
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .try_init();
});

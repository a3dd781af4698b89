use std::{ffi::OsStr, path::Path, process::ExitCode};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Runs the tracker in the foreground and waits for it. The tracker shares the terminal, so
/// Ctrl-C is left to it and only logged here.
pub async fn launch_tracker<I, S>(tracker: &Path, args: I) -> Result<std::process::ExitStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = tokio::process::Command::new(tracker);
    command.args(args);
    info!("Launching {command:?}");

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to start the tracker at {tracker:?}"))?;

    let interrupts = tokio::spawn(async {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt left to the tracker");
        }
    });
    let status = child.wait().await;
    interrupts.abort();

    let status = status.context("Failed to wait for the tracker")?;
    info!("Tracker exited with {status}");
    Ok(status)
}

/// Exit code of the launcher for a finished tracker. Killed trackers count as failures.
pub fn exit_code(status: std::process::ExitStatus) -> ExitCode {
    match status.code() {
        Some(0) => ExitCode::SUCCESS,
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::FAILURE,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;

    use anyhow::Result;

    use super::launch_tracker;

    #[tokio::test]
    async fn test_status_is_propagated() -> Result<()> {
        let ok = launch_tracker(Path::new("true"), ["track"]).await?;
        assert!(ok.success());

        let failed = launch_tracker(Path::new("sh"), ["-c", "exit 3"]).await?;
        assert_eq!(failed.code(), Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_tracker_is_reported() {
        let result = launch_tracker(Path::new("/nonexistent/tasklog"), ["track"]).await;
        let error = format!("{:#}", result.unwrap_err());
        assert!(error.contains("/nonexistent/tasklog"));
    }
}

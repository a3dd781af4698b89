//! Best effort self update run by the launcher before the tracker starts. Nothing in here is
//! allowed to stop the tracker from launching.

use std::{ffi::OsString, path::PathBuf, process::Stdio, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Skipped,
    UpToDate,
    /// Carries the summary line reported by the provider.
    Updated(String),
    Failed,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpdateProvider: Send + Sync {
    async fn update(&self) -> Result<UpdateOutcome>;
}

pub struct NoUpdate;

#[async_trait]
impl UpdateProvider for NoUpdate {
    async fn update(&self) -> Result<UpdateOutcome> {
        Ok(UpdateOutcome::Skipped)
    }
}

/// Longest a pull may take before the launcher gives up on it.
pub const UPDATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Fast-forwards a git checkout of the application. Git is never allowed to prompt, and a pull
/// that outlives its timeout is killed.
pub struct GitUpdateProvider {
    checkout: PathBuf,
    program: OsString,
    timeout: Duration,
}

impl GitUpdateProvider {
    pub fn new(checkout: PathBuf) -> Self {
        Self {
            checkout,
            program: "git".into(),
            timeout: UPDATE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl UpdateProvider for GitUpdateProvider {
    async fn update(&self) -> Result<UpdateOutcome> {
        debug!("Pulling {:?}", self.checkout);
        let pull = tokio::process::Command::new(&self.program)
            .arg("-C")
            .arg(&self.checkout)
            .args(["pull", "--ff-only"])
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, pull)
            .await
            .map_err(|_| anyhow!("{:?} took longer than {:?}", self.program, self.timeout))?
            .with_context(|| format!("Failed to run {:?}", self.program))?;

        if !output.status.success() {
            bail!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let summary = stdout.lines().last().unwrap_or_default().trim();
        if summary.is_empty() || summary.starts_with("Already up to date") {
            Ok(UpdateOutcome::UpToDate)
        } else {
            Ok(UpdateOutcome::Updated(summary.to_string()))
        }
    }
}

/// Runs `provider`, turning any failure into [UpdateOutcome::Failed].
pub async fn update_fail_open(provider: &dyn UpdateProvider) -> UpdateOutcome {
    match provider.update().await {
        Ok(outcome) => {
            info!("Update finished with {outcome:?}");
            outcome
        }
        Err(e) => {
            warn!("Update failed, launching the installed version. {e:#}");
            UpdateOutcome::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::anyhow;
    use tempfile::tempdir;

    use super::{
        update_fail_open, GitUpdateProvider, MockUpdateProvider, NoUpdate, UpdateOutcome,
        UpdateProvider,
    };

    #[tokio::test]
    async fn test_failures_never_escape() {
        let mut provider = MockUpdateProvider::new();
        provider
            .expect_update()
            .times(1)
            .returning(|| Err(anyhow!("not a git repository")));

        assert_eq!(update_fail_open(&provider).await, UpdateOutcome::Failed);
    }

    #[tokio::test]
    async fn test_outcome_is_passed_through() {
        let mut provider = MockUpdateProvider::new();
        provider
            .expect_update()
            .returning(|| Ok(UpdateOutcome::Updated("1 file changed".into())));

        assert_eq!(
            update_fail_open(&provider).await,
            UpdateOutcome::Updated("1 file changed".into())
        );
        assert_eq!(update_fail_open(&NoUpdate).await, UpdateOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_missing_git_is_an_error() {
        let dir = tempdir().unwrap();
        let provider = GitUpdateProvider::new(dir.path().to_owned())
            .with_program("definitely-not-an-installed-program");

        assert!(provider.update().await.is_err());
        assert_eq!(update_fail_open(&provider).await, UpdateOutcome::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_decides() {
        let dir = tempdir().unwrap();

        let failing = GitUpdateProvider::new(dir.path().to_owned()).with_program("false");
        assert!(failing.update().await.is_err());

        let quiet = GitUpdateProvider::new(dir.path().to_owned()).with_program("true");
        assert_eq!(quiet.update().await.unwrap(), UpdateOutcome::UpToDate);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_update_hung_pull_is_abandoned() {
        use std::{fs, os::unix::fs::PermissionsExt};

        let dir = tempdir().unwrap();
        let script = dir.path().join("git");
        fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        let provider = GitUpdateProvider::new(dir.path().to_owned())
            .with_program(&script)
            .with_timeout(Duration::from_millis(200));

        let outcome = tokio::time::timeout(Duration::from_secs(5), update_fail_open(&provider))
            .await
            .expect("a hung pull must not hold up the launch");

        assert_eq!(outcome, UpdateOutcome::Failed);
    }
}

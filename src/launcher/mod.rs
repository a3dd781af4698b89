//! Entry point used by desktop shortcuts. Updates the installation when it can, then hands the
//! terminal over to the tracker.

pub mod args;
pub mod process;
pub mod tracker_path;

use std::{path::Path, process::ExitStatus};

use anyhow::Result;
use args::LauncherArgs;
use process::launch_tracker;

use crate::update::{update_fail_open, GitUpdateProvider, NoUpdate, UpdateProvider};

/// Provider selected by the command line. Updating needs a checkout to pull.
pub fn update_provider(args: &LauncherArgs) -> Box<dyn UpdateProvider> {
    match &args.repo {
        Some(repo) if !args.no_update => Box::new(GitUpdateProvider::new(repo.clone())),
        _ => Box::new(NoUpdate),
    }
}

/// Updates, then runs the tracker to completion. Only a tracker that can't be started is an error.
pub async fn run_launcher(
    provider: &dyn UpdateProvider,
    tracker: &Path,
    tracker_args: Vec<String>,
) -> Result<ExitStatus> {
    update_fail_open(provider).await;
    launch_tracker(tracker, tracker_args).await
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::anyhow;

    use crate::update::MockUpdateProvider;

    use super::run_launcher;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_update_still_launches() {
        let mut provider = MockUpdateProvider::new();
        provider
            .expect_update()
            .times(1)
            .returning(|| Err(anyhow!("network unreachable")));

        let status = run_launcher(&provider, Path::new("true"), vec!["track".into()])
            .await
            .unwrap();

        assert!(status.success());
    }
}

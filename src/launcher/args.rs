use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug, Default)]
#[command(name = "tasklog-launcher", version, long_about = None)]
#[command(about = "Updates tasklog from its checkout and opens the tracker")]
pub struct LauncherArgs {
    /// Git checkout to fast-forward before launching.
    #[arg(long)]
    pub repo: Option<PathBuf>,
    #[arg(long)]
    pub no_update: bool,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    /// Passed to `tasklog track` as is.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub forwarded: Vec<String>,
}

impl LauncherArgs {
    /// Arguments for the tracker process.
    pub fn tracker_args(&self) -> Vec<String> {
        let mut args = vec!["track".to_string()];
        if let Some(dir) = &self.dir {
            args.push("--dir".into());
            args.push(dir.to_string_lossy().to_string());
        }
        if self.log_console {
            args.push("--log-console".into());
        }
        if let Some(level) = self.log {
            args.push("--log-filter".into());
            args.push(level.to_string());
        }
        args.extend(self.forwarded.iter().cloned());
        args
    }
}

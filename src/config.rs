use std::path::PathBuf;

use anyhow::Result;

use crate::{
    identity::{resolve_operator, Operator},
    utils::dir::create_application_default_path,
};

/// Version written into every record.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const STORE_DIR_NAME: &str = "CompletedTasks";

/// Location and identity options shared by every command.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    #[arg(
        long,
        global = true,
        env = "TASKLOG_DIR",
        help = "Application directory. By default $XDG_STATE_HOME/tasklog or $HOME/.local/state/tasklog"
    )]
    pub dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "TASKLOG_STORE",
        help = "Root of the completed task store. Usually a shared drive. Defaults to <dir>/CompletedTasks"
    )]
    pub store: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "TASKLOG_USER",
        help = "Record tasks under this login instead of the current OS user"
    )]
    pub user: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_dir: PathBuf,
    pub store_dir: PathBuf,
    pub operator: Operator,
    pub app_version: String,
}

impl AppConfig {
    pub fn resolve(args: ConfigArgs) -> Result<Self> {
        let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
        let store_dir = args
            .store
            .unwrap_or_else(|| app_dir.join(STORE_DIR_NAME));
        let operator = resolve_operator(args.user)?;
        Ok(Self {
            app_dir,
            store_dir,
            operator,
            app_version: APP_VERSION.into(),
        })
    }
}

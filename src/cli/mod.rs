pub mod shell;
pub mod shell_command;
pub mod shutdown;
pub mod today;
pub mod track;
pub mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use today::{process_today_command, TodayCommand};
use tracing::{debug, level_filters::LevelFilter};
use track::{process_track_command, TrackCommand};
use validate::process_validate_command;

use crate::{
    config::{AppConfig, ConfigArgs},
    utils::logging::{enable_logging, CLI_PREFIX},
};

#[derive(Parser, Debug)]
#[command(name = "tasklog", version, long_about = None)]
#[command(
    about = "Times logistics-support tasks and files them into a shared store",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[command(flatten)]
    config: ConfigArgs,
    #[arg(long, global = true, help = "Print logs to stderr as well")]
    log_console: bool,
    #[arg(
        long,
        global = true,
        help = "Log level written to the log file. Defaults to $RUST_LOG or debug"
    )]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Open the interactive shell and time a task")]
    Track {
        #[command(flatten)]
        command: TrackCommand,
    },
    #[command(about = "List records started on a day")]
    Today {
        #[command(flatten)]
        command: TodayCommand,
    },
    #[command(about = "Check every record file in the store against the current schema")]
    Validate {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::resolve(args.config)?;
    let logging_level = args
        .log_filter
        .or_else(|| args.log_console.then_some(LevelFilter::TRACE));
    enable_logging(CLI_PREFIX, &config.app_dir, logging_level, args.log_console)?;
    debug!("Resolved {config:?}");

    match args.commands {
        Commands::Track { command } => process_track_command(command, &config).await,
        Commands::Today { command } => process_today_command(command, &config).await,
        Commands::Validate {} => process_validate_command(&config).await,
    }
}

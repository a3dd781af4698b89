use std::{env, process::ExitCode};

use anyhow::Result;
use clap::Parser;
use tasklog::{
    launcher::{
        args::LauncherArgs, process::exit_code, run_launcher, tracker_path::to_tracker_path,
        update_provider,
    },
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, LAUNCHER_PREFIX},
        runtime::single_thread_runtime,
    },
};
use tracing::error;

fn main() -> ExitCode {
    match run(LauncherArgs::parse()) {
        Ok(code) => code,
        Err(e) => {
            error!("Launcher failed {e:?}");
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: LauncherArgs) -> Result<ExitCode> {
    let app_dir = args
        .dir
        .clone()
        .map_or_else(create_application_default_path, Ok)?;
    enable_logging(LAUNCHER_PREFIX, &app_dir, args.log, args.log_console)?;

    let tracker = to_tracker_path(env::current_exe()?);
    let provider = update_provider(&args);
    let status = single_thread_runtime()?.block_on(run_launcher(
        provider.as_ref(),
        &tracker,
        args.tracker_args(),
    ))?;
    Ok(exit_code(status))
}

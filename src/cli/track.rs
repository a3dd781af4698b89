use std::{
    borrow::Cow,
    io::{BufRead, BufReader, ErrorKind, Read},
    sync::Arc,
};

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    session::record::Cadence,
    storage::record_writer::{PartitionedRecordWriter, RecordWriter},
    utils::clock::{Clock, DefaultClock},
};

use super::{
    shell::{Flow, Shell},
    shell_command::ShellCommand,
    shutdown::detect_shutdown,
};

#[derive(Debug, Clone, Default, clap::Args)]
pub struct TrackCommand {
    #[arg(long, help = "Task to select before the shell opens")]
    task: Option<String>,
    #[arg(long, value_enum, help = "Cadence to select before the shell opens")]
    cadence: Option<Cadence>,
    #[arg(long)]
    account: Option<String>,
    #[arg(long, help = "Name of the colleague whose work this is")]
    covering_for: Option<String>,
    #[arg(long, help = "Start the timer right away. Requires --task and --cadence")]
    start: bool,
}

impl TrackCommand {
    /// Shell commands equivalent to the given flags.
    fn prefill(self) -> Vec<ShellCommand> {
        let mut commands = vec![];
        commands.extend(self.task.map(ShellCommand::Task));
        commands.extend(self.cadence.map(ShellCommand::Cadence));
        if self.account.is_some() {
            commands.push(ShellCommand::Account(self.account));
        }
        if self.covering_for.is_some() {
            commands.push(ShellCommand::Covering(self.covering_for));
        }
        if self.start {
            commands.push(ShellCommand::Start);
        }
        commands
    }
}

/// Opens the interactive shell. Fails before anything is typed if the store can't be created.
pub async fn process_track_command(command: TrackCommand, config: &AppConfig) -> Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let writer = PartitionedRecordWriter::new(config.store_dir.clone(), clock.clone())
        .await
        .with_context(|| format!("Task store at {:?} is not reachable", config.store_dir))?;
    info!(
        "Tracking as {} into {:?}",
        config.operator.login(),
        writer.root()
    );

    println!(
        "Tracking as {}. Records go to {}. Type `help` for commands.",
        config.operator.login(),
        writer.root().display()
    );

    let mut shell = Shell::new(
        config.operator.clone(),
        config.app_version.clone(),
        clock,
        writer,
        std::io::stdout(),
    );
    run_shell(&mut shell, command, input_lines(std::io::stdin())).await
}

async fn run_shell<W: RecordWriter, O: std::io::Write>(
    shell: &mut Shell<W, O>,
    command: TrackCommand,
    lines: UnboundedReceiverStream<String>,
) -> Result<()> {
    for prefilled in command.prefill() {
        if shell.handle(prefilled).await? == Flow::Quit {
            return Ok(());
        }
    }

    let cancellation = CancellationToken::new();
    let shutdown = tokio::spawn(detect_shutdown(cancellation.clone()));
    let result = shell.run(lines, cancellation.clone()).await;
    cancellation.cancel();
    let _ = shutdown.await;
    result
}

/// `input` as a stream of lines. Reading happens on a plain thread so a blocked read never holds
/// up runtime shutdown. Bytes that aren't UTF-8 are replaced, they never end the input.
fn input_lines<R: Read + Send + 'static>(input: R) -> UnboundedReceiverStream<String> {
    let (sender, receiver) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if let Cow::Owned(_) = line {
                        warn!("Input line wasn't valid UTF-8, replaced the invalid bytes");
                    }
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    if sender.send(line).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("Failed to read input {e}");
                    break;
                }
            }
        }
        debug!("Input closed");
    });
    UnboundedReceiverStream::new(receiver)
}

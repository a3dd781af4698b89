//! Line based front end for a [TimerSession]. The shell owns exactly one session at a time plus
//! the record it produced, until that record is stored or thrown away.

use std::{io::Write, path::Path, sync::Arc};

use ansi_term::Colour;
use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    identity::Operator,
    session::{
        record::TaskRecord,
        timer::{SessionError, SessionState, TimerSession},
    },
    storage::record_writer::RecordWriter,
    utils::{
        clock::Clock,
        time::{format_hh_mm_parts, format_hhmmss, parse_hhmmss},
    },
};

use super::shell_command::{ShellCommand, ShellCommandError, HELP};

const PROMPT: &str = "tasklog> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<W: RecordWriter, O: Write> {
    operator: Operator,
    app_version: String,
    clock: Arc<dyn Clock>,
    writer: W,
    session: TimerSession,
    /// Ended but not yet stored.
    pending: Option<TaskRecord>,
    out: O,
}

impl<W: RecordWriter, O: Write> Shell<W, O> {
    pub fn new(
        operator: Operator,
        app_version: impl Into<String>,
        clock: Arc<dyn Clock>,
        writer: W,
        out: O,
    ) -> Self {
        let app_version = app_version.into();
        let session = TimerSession::new(operator.clone(), app_version.clone(), clock.clone());
        Self {
            operator,
            app_version,
            clock,
            writer,
            session,
            pending: None,
            out,
        }
    }

    pub fn session(&self) -> &TimerSession {
        &self.session
    }

    pub fn pending(&self) -> Option<&TaskRecord> {
        self.pending.as_ref()
    }

    /// Reads commands until the input ends, `quit` is typed or `cancellation` fires.
    pub async fn run(
        &mut self,
        mut lines: impl Stream<Item = String> + Unpin,
        cancellation: CancellationToken,
    ) -> Result<()> {
        loop {
            write!(self.out, "{PROMPT}")?;
            self.out.flush()?;

            select! {
                _ = cancellation.cancelled() => {
                    writeln!(self.out)?;
                    debug!("Shell cancelled");
                    break;
                }
                line = lines.next() => match line {
                    Some(line) => {
                        if self.handle_line(&line).await? == Flow::Quit {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        self.warn_unsubmitted()
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        match line.parse::<ShellCommand>() {
            Ok(command) => self.handle(command).await,
            Err(ShellCommandError::Empty) => Ok(Flow::Continue),
            Err(e) => {
                self.failure(e)?;
                Ok(Flow::Continue)
            }
        }
    }

    pub async fn handle(&mut self, command: ShellCommand) -> Result<Flow> {
        debug!("Handling {command:?}");
        match command {
            ShellCommand::Task(task) => {
                let result = self.session.set_task(task);
                self.report(result)?;
            }
            ShellCommand::Cadence(cadence) => {
                let result = self.session.set_cadence(cadence);
                self.report(result)?;
            }
            ShellCommand::Account(account) => {
                let result = self.session.set_account(account);
                self.report(result)?;
            }
            ShellCommand::Covering(name) => {
                let result = self.session.set_covering_for(name);
                self.report(result)?;
            }
            ShellCommand::Notes(notes) => {
                let result = self.session.set_notes(notes);
                self.report(result)?;
            }
            ShellCommand::Partial(value) => {
                let result = self.session.set_partially_complete(value);
                self.report(result)?;
            }
            ShellCommand::Start => {
                let result = self.session.start();
                if self.report(result)? {
                    self.success(format!("Started {}", self.session.task()))?;
                }
            }
            ShellCommand::Pause => {
                let result = self.session.pause();
                if self.report(result)? {
                    self.success("Paused")?;
                }
            }
            ShellCommand::Resume => {
                let result = self.session.resume();
                if self.report(result)? {
                    self.success("Resumed")?;
                }
            }
            ShellCommand::End(notes) => match self.session.end(notes) {
                Ok(record) => {
                    self.pending = Some(record);
                    self.show_pending()?;
                    writeln!(
                        self.out,
                        "Use `duration HH:MM` to correct the time, then `submit`."
                    )?;
                }
                Err(e) => self.failure(e)?,
            },
            ShellCommand::Status => self.show_status()?,
            ShellCommand::Duration(value) => self.override_duration(&value)?,
            ShellCommand::Submit => self.submit().await?,
            ShellCommand::Export(path) => self.export(&path).await?,
            ShellCommand::Reset => {
                if self.has_unsubmitted() {
                    self.warning("Discarded the unsubmitted session")?;
                }
                self.reset();
                self.success("Ready for a new task")?;
            }
            ShellCommand::Help => writeln!(self.out, "{HELP}")?,
            ShellCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn reset(&mut self) {
        self.pending = None;
        self.session = TimerSession::new(
            self.operator.clone(),
            self.app_version.clone(),
            self.clock.clone(),
        );
    }

    fn has_unsubmitted(&self) -> bool {
        self.pending.is_some()
            || matches!(
                self.session.current_state(),
                SessionState::Running | SessionState::Paused
            )
    }

    async fn submit(&mut self) -> Result<()> {
        let Some(record) = &self.pending else {
            return self.failure("Nothing to submit, `end` the session first");
        };

        match self.writer.write(record).await {
            Ok(path) => {
                info!("Submitted {}", record.record_id());
                self.success(format!("Saved to {}", path.display()))?;
                self.reset();
            }
            Err(e) => {
                error!("Submitting {} failed: {e}", record.record_id());
                self.failure(format!("Couldn't save the record: {e}"))?;
                self.warning("The record is kept. Try `submit` again or `export <path>` it.")?;
            }
        }
        Ok(())
    }

    async fn export(&mut self, path: &Path) -> Result<()> {
        let Some(record) = &self.pending else {
            return self.failure("Nothing to export, `end` the session first");
        };
        let json = serde_json::to_string_pretty(record)?;
        match tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to export to {path:?}"))
        {
            Ok(()) => self.success(format!("Exported to {}", path.display())),
            Err(e) => {
                error!("{e:#}");
                self.failure(format!("{e:#}"))
            }
        }
    }

    fn override_duration(&mut self, value: &str) -> Result<()> {
        let Some(record) = self.pending.take() else {
            return self.failure("The duration can only be changed after `end`");
        };
        let record = match parse_hhmmss(value) {
            Some(seconds) => {
                info!(
                    "Duration of {} changed from {}s to {seconds}s",
                    record.record_id(),
                    record.duration_seconds()
                );
                record.with_duration_seconds(seconds)
            }
            None => {
                self.warning(format!(
                    "{value:?} isn't HH:MM or HH:MM:SS, keeping {}",
                    format_hhmmss(record.duration_seconds())
                ))?;
                record
            }
        };
        self.pending = Some(record);
        self.show_pending()
    }

    fn show_status(&mut self) -> Result<()> {
        let session = &self.session;
        let (hours, minutes) = format_hh_mm_parts(session.elapsed().num_seconds());
        writeln!(
            self.out,
            "{}  {hours} h {minutes} m  ({})",
            Colour::Cyan.bold().paint(session.current_state().to_string()),
            format_hhmmss(session.elapsed().num_seconds())
        )?;
        writeln!(
            self.out,
            "task: {}\ncadence: {}\naccount: {}\ncovering for: {}\npartially complete: {}",
            or_dash(Some(session.task()).filter(|v| !v.is_empty())),
            or_dash(session.cadence().map(|c| c.as_str())),
            or_dash(session.account()),
            or_dash(session.covering_for()),
            if session.partially_complete() { "yes" } else { "no" },
        )?;
        if self.pending.is_some() {
            self.show_pending()?;
        }
        Ok(())
    }

    fn show_pending(&mut self) -> Result<()> {
        let Some(record) = &self.pending else {
            return Ok(());
        };
        writeln!(
            self.out,
            "{} {} ({}) {}",
            Colour::Yellow.paint("Unsubmitted:"),
            record.task(),
            record.cadence(),
            format_hhmmss(record.duration_seconds())
        )?;
        Ok(())
    }

    fn warn_unsubmitted(&mut self) -> Result<()> {
        if !self.has_unsubmitted() {
            return Ok(());
        }
        warn!(
            "Shell stopped with an unsubmitted session in state {}",
            self.session.current_state()
        );
        self.warning("The current task was not submitted and is lost")
    }

    /// Prints the outcome of a session call. Returns whether it succeeded.
    fn report(&mut self, result: Result<(), SessionError>) -> Result<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                self.failure(e)?;
                Ok(false)
            }
        }
    }

    fn success(&mut self, message: impl AsRef<str>) -> Result<()> {
        writeln!(self.out, "{}", Colour::Green.paint(message.as_ref()))?;
        Ok(())
    }

    fn warning(&mut self, message: impl AsRef<str>) -> Result<()> {
        writeln!(self.out, "{}", Colour::Yellow.paint(message.as_ref()))?;
        Ok(())
    }

    fn failure(&mut self, message: impl ToString) -> Result<()> {
        writeln!(self.out, "{}", Colour::Red.paint(message.to_string()))?;
        Ok(())
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        path::PathBuf,
        sync::{Arc, Mutex},
    };

    use anyhow::Result;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use futures::stream;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    use crate::{
        identity::Operator,
        session::{record::Cadence, timer::SessionState},
        storage::{
            codec::decode_records,
            record_writer::{MockRecordWriter, PartitionedRecordWriter, RecordWriter, WriteError},
        },
        utils::{clock::ManualClock, logging::TEST_LOGGING},
    };

    use super::{Flow, Shell};

    fn test_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    fn shell_with<W: RecordWriter>(clock: &ManualClock, writer: W) -> Shell<W, Vec<u8>> {
        Shell::new(
            Operator::new("jdoe"),
            "test",
            Arc::new(clock.clone()),
            writer,
            vec![],
        )
    }

    fn output<W: RecordWriter>(shell: &Shell<W, Vec<u8>>) -> String {
        String::from_utf8_lossy(&shell.out).to_string()
    }

    async fn type_lines<W: RecordWriter>(shell: &mut Shell<W, Vec<u8>>, lines: &[&str]) {
        for line in lines {
            assert_eq!(shell.handle_line(line).await.unwrap(), Flow::Continue);
        }
    }

    #[tokio::test]
    async fn test_inventory_check_is_stored() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let clock = ManualClock::starting_at(test_start());
        let writer =
            PartitionedRecordWriter::new(dir.path().to_owned(), Arc::new(clock.clone())).await?;
        let mut shell = shell_with(&clock, writer);

        type_lines(
            &mut shell,
            &["task Inventory Check", "cadence Daily", "account Acme", "start"],
        )
        .await;
        clock.advance(Duration::minutes(10));
        type_lines(&mut shell, &["pause"]).await;
        clock.advance(Duration::minutes(5));
        type_lines(&mut shell, &["resume"]).await;
        clock.advance(Duration::minutes(15));
        type_lines(&mut shell, &["end ok"]).await;

        assert_eq!(shell.pending().map(|r| r.duration_seconds()), Some(1500));
        assert!(output(&shell).contains("00:25:00"));

        type_lines(&mut shell, &["submit"]).await;

        assert!(shell.pending().is_none());
        assert_eq!(shell.session().current_state(), SessionState::Idle);
        let partition = dir.path().join("user=jdoe/year=2024/month=01/day=01");
        let files = std::fs::read_dir(&partition)?.collect::<Result<Vec<_>, _>>()?;
        assert_eq!(files.len(), 1);
        let stored = decode_records(std::fs::read(files[0].path())?)?;
        let record = &stored[0].record;
        assert_eq!(record.task(), "Inventory Check");
        assert_eq!(record.cadence(), Cadence::Daily);
        assert_eq!(record.account(), Some("Acme"));
        assert_eq!(record.notes(), Some("ok"));
        assert_eq!(record.duration_seconds(), 1500);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_submit_keeps_the_record_for_retry() {
        let clock = ManualClock::starting_at(test_start());
        let seen = Arc::new(Mutex::new(Vec::<Uuid>::new()));
        let mut writer = MockRecordWriter::new();
        let calls = seen.clone();
        writer.expect_write().times(2).returning(move |record| {
            let mut calls = calls.lock().unwrap();
            calls.push(record.record_id());
            if calls.len() == 1 {
                Err(WriteError::Io {
                    path: PathBuf::from("/share/CompletedTasks/x.arrow"),
                    source: io::Error::other("disk full"),
                })
            } else {
                Ok(PathBuf::from("/share/CompletedTasks/x.arrow"))
            }
        });
        let mut shell = shell_with(&clock, writer);

        type_lines(
            &mut shell,
            &["task Carrier Claims", "cadence weekly", "start", "end"],
        )
        .await;
        type_lines(&mut shell, &["submit"]).await;

        assert!(shell.pending().is_some());
        let text = output(&shell);
        assert!(text.contains("/share/CompletedTasks/x.arrow"));
        assert!(text.contains("disk full"));

        type_lines(&mut shell, &["submit"]).await;

        assert!(shell.pending().is_none());
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn test_validation_errors_are_shown_and_nothing_changes() {
        let clock = ManualClock::starting_at(test_start());
        let mut writer = MockRecordWriter::new();
        writer.expect_write().never();
        let mut shell = shell_with(&clock, writer);

        type_lines(&mut shell, &["start", "cadence daily", "start", "submit"]).await;

        let text = output(&shell);
        assert!(text.contains("select a task before starting"));
        assert!(text.contains("Nothing to submit"));
        assert_eq!(shell.session().current_state(), SessionState::Idle);

        type_lines(&mut shell, &["task Inventory Check", "start", "task Other"]).await;
        assert_eq!(shell.session().task(), "Inventory Check");
        assert!(output(&shell).contains("can't edit a session that is running"));
    }

    #[tokio::test]
    async fn test_duration_can_be_corrected_before_submit() {
        let clock = ManualClock::starting_at(test_start());
        let mut writer = MockRecordWriter::new();
        writer
            .expect_write()
            .withf(|record| record.duration_seconds() == 1200)
            .times(1)
            .returning(|_| Ok(PathBuf::from("/store/x.arrow")));
        let mut shell = shell_with(&clock, writer);

        type_lines(&mut shell, &["duration 00:20"]).await;
        assert!(output(&shell).contains("only be changed after `end`"));

        type_lines(&mut shell, &["task Inventory Check", "cadence daily", "start"]).await;
        clock.advance(Duration::minutes(25));
        type_lines(&mut shell, &["end", "duration 25 minutes"]).await;
        assert_eq!(shell.pending().map(|r| r.duration_seconds()), Some(1500));

        type_lines(&mut shell, &["duration 00:20", "submit"]).await;
        assert!(shell.pending().is_none());
    }

    #[tokio::test]
    async fn test_pending_record_can_be_exported() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::starting_at(test_start());
        let mut shell = shell_with(&clock, MockRecordWriter::new());
        let target = dir.path().join("record.json");

        type_lines(
            &mut shell,
            &["task Inventory Check", "cadence daily", "covering Pat Lee", "start", "end"],
        )
        .await;
        shell
            .handle_line(&format!("export {}", target.display()))
            .await?;

        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(&target)?)?;
        assert_eq!(json["task"], "Inventory Check");
        assert_eq!(json["covering_for"], "Pat Lee");
        assert!(shell.pending().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_reset_discards_the_session() {
        let clock = ManualClock::starting_at(test_start());
        let mut shell = shell_with(&clock, MockRecordWriter::new());

        type_lines(
            &mut shell,
            &["task Inventory Check", "cadence daily", "start", "reset"],
        )
        .await;

        assert_eq!(shell.session().current_state(), SessionState::Idle);
        assert_eq!(shell.session().task(), "");
        assert!(output(&shell).contains("Discarded"));
    }

    #[tokio::test]
    async fn test_run_stops_on_quit() -> Result<()> {
        let clock = ManualClock::starting_at(test_start());
        let mut shell = shell_with(&clock, MockRecordWriter::new());
        let lines = stream::iter(
            ["task Inventory Check", "quit", "cadence daily"].map(String::from),
        );

        shell.run(lines, CancellationToken::new()).await?;

        assert_eq!(shell.session().task(), "Inventory Check");
        assert_eq!(shell.session().cadence(), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancellation_warns_about_running_task() -> Result<()> {
        let clock = ManualClock::starting_at(test_start());
        let mut shell = shell_with(&clock, MockRecordWriter::new());
        type_lines(&mut shell, &["task Inventory Check", "cadence daily", "start"]).await;
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        shell.run(stream::pending(), cancellation).await?;

        assert!(output(&shell).contains("was not submitted"));
        Ok(())
    }
}

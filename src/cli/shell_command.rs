use std::{path::PathBuf, str::FromStr};

use crate::session::record::{Cadence, UnknownCadence};

/// One line typed into the tracking shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Task(String),
    Cadence(Cadence),
    /// `None` clears the account.
    Account(Option<String>),
    Covering(Option<String>),
    Notes(String),
    Partial(bool),
    Start,
    Pause,
    Resume,
    End(Option<String>),
    Status,
    /// Raw `HH:MM[:SS]` text. Parsed when applied so bad input can keep the measured value.
    Duration(String),
    Submit,
    Export(PathBuf),
    Reset,
    Help,
    Quit,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShellCommandError {
    #[error("nothing to do")]
    Empty,
    #[error("unknown command {0:?}, type `help` for the list")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error(transparent)]
    Cadence(#[from] UnknownCadence),
    #[error("expected yes or no, got {0:?}")]
    InvalidFlag(String),
}

pub const HELP: &str = "\
task <name>            choose the task
cadence <c>            Daily, Weekly or Periodic
account [name]         set or clear the account
covering [name]        set or clear the colleague you cover for
notes <text>           replace the notes
partial [yes|no]       mark the task as partially complete
start | pause | resume
end [notes]            stop the timer and prepare the record
status                 show the current session
duration <HH:MM[:SS]>  correct the duration before submitting
submit                 store the prepared record
export <path>          save the prepared record as JSON
reset                  throw away the session and start over
help | quit";

fn required(argument: Option<String>, command: &'static str) -> Result<String, ShellCommandError> {
    argument.ok_or(ShellCommandError::MissingArgument(command))
}

fn parse_flag(argument: Option<String>) -> Result<bool, ShellCommandError> {
    match argument.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("yes" | "y" | "on" | "true") => Ok(true),
        Some("no" | "n" | "off" | "false") => Ok(false),
        Some(other) => Err(ShellCommandError::InvalidFlag(other.to_string())),
    }
}

impl FromStr for ShellCommand {
    type Err = ShellCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ShellCommandError::Empty);
        }
        let (name, argument) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim().to_string())),
            None => (line, None),
        };
        let argument = argument.filter(|v| !v.is_empty());

        Ok(match name.to_ascii_lowercase().as_str() {
            "task" => ShellCommand::Task(required(argument, "task")?),
            "cadence" => ShellCommand::Cadence(required(argument, "cadence")?.parse()?),
            "account" => ShellCommand::Account(argument),
            "covering" => ShellCommand::Covering(argument),
            "notes" => ShellCommand::Notes(argument.unwrap_or_default()),
            "partial" => ShellCommand::Partial(parse_flag(argument)?),
            "start" => ShellCommand::Start,
            "pause" => ShellCommand::Pause,
            "resume" => ShellCommand::Resume,
            "end" => ShellCommand::End(argument),
            "status" => ShellCommand::Status,
            "duration" => ShellCommand::Duration(required(argument, "duration")?),
            "submit" => ShellCommand::Submit,
            "export" => ShellCommand::Export(required(argument, "export")?.into()),
            "reset" => ShellCommand::Reset,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            _ => return Err(ShellCommandError::Unknown(name.to_string())),
        })
    }
}

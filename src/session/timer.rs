use std::{fmt::Display, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{identity::Operator, utils::clock::Clock};

use super::record::{non_blank, Cadence, TaskRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Ended,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Ended => "ended",
        })
    }
}

/// What the caller tried to do when a transition was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Start,
    Pause,
    Resume,
    End,
    Edit,
}

impl Display for SessionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SessionAction::Start => "start",
            SessionAction::Pause => "pause",
            SessionAction::Resume => "resume",
            SessionAction::End => "end",
            SessionAction::Edit => "edit",
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// Missing input the operator can fix. The session is left untouched.
    #[error("{0}")]
    Validation(&'static str),
    /// Out of order transition. The caller should have prevented it.
    #[error("can't {action} a session that is {state}")]
    InvalidState {
        action: SessionAction,
        state: SessionState,
    },
}

/// Timing state of a single task. Owned by whatever drives the interaction, nothing here is
/// shared or global. Rejected operations never change the session.
pub struct TimerSession {
    operator: Operator,
    app_version: String,
    clock: Arc<dyn Clock>,
    task: String,
    cadence: Option<Cadence>,
    account: Option<String>,
    covering_for: Option<String>,
    notes: String,
    partially_complete: bool,
    state: SessionState,
    start_time: Option<DateTime<Utc>>,
    pause_started: Option<DateTime<Utc>>,
    accumulated_pause: Duration,
    end_time: Option<DateTime<Utc>>,
}

impl TimerSession {
    pub fn new(operator: Operator, app_version: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            operator,
            app_version: app_version.into(),
            clock,
            task: String::new(),
            cadence: None,
            account: None,
            covering_for: None,
            notes: String::new(),
            partially_complete: false,
            state: SessionState::Idle,
            start_time: None,
            pause_started: None,
            accumulated_pause: Duration::zero(),
            end_time: None,
        }
    }

    pub fn current_state(&self) -> SessionState {
        self.state
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn cadence(&self) -> Option<Cadence> {
        self.cadence
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn covering_for(&self) -> Option<&str> {
        self.covering_for.as_deref()
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn partially_complete(&self) -> bool {
        self.partially_complete
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn accumulated_pause(&self) -> Duration {
        self.accumulated_pause
    }

    pub fn set_task(&mut self, task: impl Into<String>) -> Result<(), SessionError> {
        self.require_idle()?;
        self.task = task.into().trim().to_string();
        Ok(())
    }

    pub fn set_cadence(&mut self, cadence: Cadence) -> Result<(), SessionError> {
        self.require_idle()?;
        self.cadence = Some(cadence);
        Ok(())
    }

    pub fn set_account(&mut self, account: Option<String>) -> Result<(), SessionError> {
        self.require_idle()?;
        self.account = non_blank(account);
        Ok(())
    }

    pub fn set_covering_for(&mut self, covering_for: Option<String>) -> Result<(), SessionError> {
        self.require_idle()?;
        self.covering_for = non_blank(covering_for);
        Ok(())
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) -> Result<(), SessionError> {
        self.require_not_ended(SessionAction::Edit)?;
        self.notes = notes.into();
        Ok(())
    }

    pub fn set_partially_complete(&mut self, value: bool) -> Result<(), SessionError> {
        self.require_not_ended(SessionAction::Edit)?;
        self.partially_complete = value;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            return Err(self.invalid(SessionAction::Start));
        }
        if self.task.is_empty() {
            return Err(SessionError::Validation("select a task before starting"));
        }
        if self.cadence.is_none() {
            return Err(SessionError::Validation("select a cadence before starting"));
        }

        let now = self.clock.time();
        self.start_time = Some(now);
        self.state = SessionState::Running;
        info!("Started {:?} at {now}", self.task);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Running {
            return Err(self.invalid(SessionAction::Pause));
        }
        let now = self.clock.time();
        self.pause_started = Some(now);
        self.state = SessionState::Paused;
        debug!("Paused at {now}");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Paused {
            return Err(self.invalid(SessionAction::Resume));
        }
        let now = self.clock.time();
        self.close_pause(now);
        self.state = SessionState::Running;
        debug!(
            "Resumed at {now}, paused for {}s in total",
            self.accumulated_pause.num_seconds()
        );
        Ok(())
    }

    /// Stops the timer and produces the record. Given `notes` replace whatever was typed before.
    /// After this every mutating call fails, so a session can't produce a second record.
    pub fn end(&mut self, notes: Option<String>) -> Result<TaskRecord, SessionError> {
        if !matches!(self.state, SessionState::Running | SessionState::Paused) {
            return Err(self.invalid(SessionAction::End));
        }
        let (Some(start_time), Some(cadence)) = (self.start_time, self.cadence) else {
            return Err(self.invalid(SessionAction::End));
        };

        let now = self.clock.time();
        self.close_pause(now);
        if let Some(notes) = notes {
            self.notes = notes;
        }
        self.end_time = Some(now);
        self.state = SessionState::Ended;

        let duration_seconds = ((now - start_time) - self.accumulated_pause)
            .num_seconds()
            .max(0);

        let record = TaskRecord {
            task: self.task.clone(),
            cadence,
            account: self.account.clone(),
            user: self.operator.login().to_string(),
            start_utc: start_time,
            end_utc: now,
            duration_seconds,
            notes: non_blank(Some(self.notes.clone())),
            app_version: self.app_version.clone(),
            record_id: Uuid::new_v4(),
            covering_for: self.covering_for.clone(),
            partially_complete: self.partially_complete,
        };
        info!(
            "Ended {:?} after {duration_seconds}s, record {}",
            record.task, record.record_id
        );
        Ok(record)
    }

    /// Active time so far: wall time since start minus every pause, the open one included.
    pub fn elapsed(&self) -> Duration {
        let Some(start_time) = self.start_time else {
            return Duration::zero();
        };
        let now = self.end_time.unwrap_or_else(|| self.clock.time());
        let open_pause = self
            .pause_started
            .map(|paused_at| (now - paused_at).max(Duration::zero()))
            .unwrap_or_else(Duration::zero);
        ((now - start_time) - self.accumulated_pause - open_pause).max(Duration::zero())
    }

    fn close_pause(&mut self, now: DateTime<Utc>) {
        if let Some(paused_at) = self.pause_started.take() {
            self.accumulated_pause += (now - paused_at).max(Duration::zero());
        }
    }

    fn require_idle(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Idle {
            Ok(())
        } else {
            Err(self.invalid(SessionAction::Edit))
        }
    }

    fn require_not_ended(&self, action: SessionAction) -> Result<(), SessionError> {
        if self.state == SessionState::Ended {
            Err(self.invalid(action))
        } else {
            Ok(())
        }
    }

    fn invalid(&self, action: SessionAction) -> SessionError {
        SessionError::InvalidState {
            action,
            state: self.state,
        }
    }
}

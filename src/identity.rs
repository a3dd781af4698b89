//! Resolves who is operating the tracker. The login is never typed in by the user, it comes from
//! the execution environment.

use std::env;

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, System, Users};
use tracing::debug;

const UNKNOWN_USER: &str = "unknown_user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    login: String,
    key: String,
}

impl Operator {
    pub fn new(login: impl Into<String>) -> Self {
        let login = login.into();
        let key = sanitize_key(&login);
        Self { login, key }
    }

    /// Login as reported by the environment. Stored in every record.
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Filesystem friendly form of the login used for partition directories.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Lowercases, replaces whitespace runs with `_` and drops everything outside `[a-z0-9_.-]`.
pub fn sanitize_key(value: &str) -> String {
    let mut key = String::with_capacity(value.len());
    let mut in_whitespace = false;
    for ch in value.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_whitespace() {
            if !in_whitespace {
                key.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.') {
            key.push(ch);
        }
    }
    if key.is_empty() {
        UNKNOWN_USER.into()
    } else {
        key
    }
}

/// Picks the explicit override if there is one, then the usual login variables, then the owner of
/// the current process.
pub fn resolve_operator(login_override: Option<String>) -> Result<Operator> {
    let login = login_override
        .filter(|v| !v.trim().is_empty())
        .or_else(login_from_env)
        .or_else(login_from_process)
        .ok_or_else(|| {
            anyhow!("Couldn't determine the current user. Pass --user or set TASKLOG_USER")
        })?;
    debug!("Resolved operator {login}");
    Ok(Operator::new(login))
}

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        const LOGIN_VARIABLES: &[&str] = &["USERNAME", "USER"];
    } else {
        const LOGIN_VARIABLES: &[&str] = &["LOGNAME", "USER", "LNAME", "USERNAME"];
    }
}

fn login_from_env() -> Option<String> {
    LOGIN_VARIABLES
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

fn login_from_process() -> Option<String> {
    let pid = get_current_pid().ok()?;
    let system = System::new_all();
    let user_id = system.process(pid)?.user_id()?.clone();
    let users = Users::new_with_refreshed_list();
    users.get_user_by_id(&user_id).map(|user| user.name().to_string())
}

//! Reload command: asks the tractor engine to re-read the limits file

use std::process::Command;
use tracing::{info, warn};

/// How a single reload invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    Succeeded,
    /// Ran to completion with a non-zero (or signal) exit
    Failed { code: Option<i32> },
    /// Could not be started at all
    SpawnFailed(String),
}

impl ReloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReloadOutcome::Succeeded)
    }
}

/// A reload that did not succeed; recorded, never fatal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadWarning {
    /// 1 for the reload right after the write, then the reconciliation attempt number
    pub attempt: u32,
    pub outcome: ReloadOutcome,
}

pub trait Reloader {
    /// Run the reload and block until it exits
    fn reload(&self) -> ReloadOutcome;
}

/// Runs an external program, e.g. `/bin/bash reloadconfig_bash.sh`
#[derive(Debug, Clone)]
pub struct ShellReloader {
    program: String,
    args: Vec<String>,
}

impl ShellReloader {
    /// `command` is the program followed by its arguments; `None` if empty
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Reloader for ShellReloader {
    fn reload(&self) -> ReloadOutcome {
        info!(program = %self.program, args = ?self.args, "Reloading tractor config");
        match Command::new(&self.program).args(&self.args).status() {
            Ok(status) if status.success() => {
                info!("Config reload succeeded");
                ReloadOutcome::Succeeded
            }
            Ok(status) => {
                warn!(exit = ?status.code(), "Config reload failed");
                ReloadOutcome::Failed {
                    code: status.code(),
                }
            }
            Err(err) => {
                warn!(program = %self.program, error = %err, "Failed to spawn config reload");
                ReloadOutcome::SpawnFailed(err.to_string())
            }
        }
    }
}

use crate::command::ExitCode;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable, user-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `current_dir`: the working directory children are started in.
/// - `exit_request`: set by `exit`; an interactive loop stops once it is `Some`.
///
/// Variables are read straight from the process environment, so children see
/// exactly what the shell sees.
#[derive(Debug, Clone)]
pub struct Environment {
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
    /// Status requested by `exit`, if it has run.
    pub exit_request: Option<ExitCode>,
}

impl Environment {
    /// Capture the current working directory into a new `Environment`.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            exit_request: None,
        }
    }

    /// Get the value of an environment variable, `None` if unset or not UTF-8.
    pub fn get_var(&self, key: &str) -> Option<String> {
        stdenv::var(key).ok()
    }

    /// Whether an interactive loop should stop reading commands.
    pub fn should_exit(&self) -> bool {
        self.exit_request.is_some()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

use crate::command::ExitCode;
use nix::errno::Errno;
use std::os::fd::RawFd;

/// Status used for failures that happen before a program could be started.
pub const GENERAL_FAILURE: ExitCode = 1;
/// Status for malformed command lines, e.g. a redirection without a target.
pub const SYNTAX_FAILURE: ExitCode = 2;
/// Status for a program that was found but could not be executed.
pub const EXEC_FAILURE: ExitCode = 126;
/// Status for a program that could not be found.
pub const NOT_FOUND: ExitCode = 127;

/// Everything that can go wrong while running a single command line.
///
/// None of these errors are fatal for the shell itself: the read loop prints
/// one diagnostic line and moves on to the next command.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// A [`Sequence`](crate::sequence::Sequence) could not grow.
    #[error("out of memory: cannot grow list to {requested} elements")]
    AllocationFailure { requested: usize },

    /// The command line cannot be split into exec-able words.
    #[error("cannot tokenize command line: {reason}")]
    TokenizeFailure { reason: String },

    /// A redirection operator was the last word on the line.
    #[error("syntax error: expected a file name after `{operator}`")]
    RedirectionSyntax { operator: String },

    /// Only redirections were given, no program to run.
    #[error("syntax error: missing command name")]
    MissingCommand,

    /// A redirection target could not be opened.
    #[error("{path}: {source}")]
    FileOpen {
        path: String,
        #[source]
        source: Errno,
    },

    /// A standard stream could not be pointed at its redirection target.
    #[error("cannot redirect descriptor {fd}: {source}")]
    DescriptorDuplication {
        fd: RawFd,
        #[source]
        source: Errno,
    },

    #[error(transparent)]
    Exec(#[from] ExecFailure),

    #[error("cannot fork: {source}")]
    Fork {
        #[source]
        source: Errno,
    },

    #[error("cannot wait for child {pid}: {source}")]
    Wait {
        pid: i32,
        #[source]
        source: Errno,
    },

    #[error("cannot create status pipe: {source}")]
    Pipe {
        #[source]
        source: Errno,
    },
}

/// Why replacing the child's process image failed.
///
/// `CommandNotFound` is derived from `ENOENT` alone. That is a best-effort
/// classification: a missing interpreter in a `#!` line also yields `ENOENT`.
#[derive(Debug, thiserror::Error)]
pub enum ExecFailure {
    #[error("{name}: command not found")]
    CommandNotFound { name: String },

    #[error("{name}: {source}")]
    Other {
        name: String,
        #[source]
        source: Errno,
    },
}

impl ShellError {
    /// The status a failed command leaves behind as "last status".
    pub fn status(&self) -> ExitCode {
        match self {
            ShellError::Exec(ExecFailure::CommandNotFound { .. }) => NOT_FOUND,
            ShellError::Exec(ExecFailure::Other { .. }) => EXEC_FAILURE,
            ShellError::RedirectionSyntax { .. } | ShellError::MissingCommand => SYNTAX_FAILURE,
            _ => GENERAL_FAILURE,
        }
    }
}

pub type Result<T, E = ShellError> = std::result::Result<T, E>;

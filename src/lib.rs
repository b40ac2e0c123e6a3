//! A small Unix shell built around a careful per-command execution pipeline.
//!
//! Each input line is split into words ([`lexer`]), forked into a child that
//! applies its stream redirections ([`redirect`], [`process`], [`parser`]) and
//! replaces itself with the requested program ([`external`]). The parent waits
//! and derives a normalized exit status that the next line can read back as
//! `$?`.
//!
//! The main entry point is [`Interpreter`]. Quoting, globbing, pipelines and
//! job control are deliberately absent.

mod builtin;
pub mod command;
pub mod env;
pub mod error;
pub mod external;
mod interpreter;
pub mod lexer;
pub mod parser;
pub mod process;
mod prompt;
pub mod redirect;
pub mod sequence;

pub use error::{ExecFailure, ShellError};
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::{Interpreter, LAST_STATUS_WORD, substitute_last_status};

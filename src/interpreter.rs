use crate::builtin;
use crate::command::ExitCode;
use crate::env::Environment;
use crate::error::ShellError;
use crate::external;
use crate::lexer;
use crate::prompt;
use crate::redirect;
use crate::sequence::Sequence;
use anyhow::Context;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

/// Word replaced by the previous command's status.
pub const LAST_STATUS_WORD: &str = "$?";

/// A minimal interactive shell: one command per line, with redirections.
///
/// The interpreter owns no status of its own; the caller threads the previous
/// command's status into [`run_line`](Self::run_line) and keeps what comes
/// back.
///
/// Example
/// ```no_run
/// use fdsh::Interpreter;
/// let mut sh = Interpreter::default();
/// let status = sh.eval("echo hello > /tmp/greeting.txt", 0);
/// assert_eq!(status, 0);
/// ```
pub struct Interpreter {
    env: Environment,
}

impl Interpreter {
    pub fn new(env: Environment) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Run one command line.
    ///
    /// Returns `Ok(None)` for a blank line, which leaves the last status
    /// untouched. Builtins run in-process unless the line redirects a stream;
    /// everything else is forked and waited for.
    pub fn run_line(
        &mut self,
        line: &str,
        last_status: ExitCode,
    ) -> Result<Option<ExitCode>, ShellError> {
        let mut tokens = lexer::split_into_tokens(line)?;
        if tokens.is_empty() {
            return Ok(None);
        }
        substitute_last_status(&mut tokens, last_status);

        let redirects = tokens
            .iter()
            .any(|word| redirect::classify(word).is_redirect());
        if !redirects {
            if let Some(code) = builtin::dispatch(&tokens, &mut self.env) {
                debug!(builtin = %tokens[0], status = code, "interpreter.builtin");
                return Ok(Some(code));
            }
        }
        external::run(tokens).map(Some)
    }

    /// Run one command line, print a diagnostic if it fails, and return the
    /// status to keep as "last status".
    pub fn eval(&mut self, line: &str, last_status: ExitCode) -> ExitCode {
        match self.run_line(line, last_status) {
            Ok(Some(code)) => code,
            Ok(None) => last_status,
            Err(e) => {
                eprintln!("fdsh: {}", e);
                e.status()
            }
        }
    }

    /// Read-eval loop on the terminal until end of input or `exit`.
    ///
    /// Returns the status the shell should exit with.
    pub fn repl(&mut self, show_prompt: bool) -> anyhow::Result<ExitCode> {
        let mut rl = DefaultEditor::new().context("cannot initialise line editor")?;
        let mut status: ExitCode = 0;

        while !self.env.should_exit() {
            let prompt = if show_prompt {
                prompt::render(&self.env)
            } else {
                String::new()
            };
            match rl.readline(&prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str())?;
                    }
                    status = self.eval(&line, status);
                }
                // Ctrl-C discards the current line only.
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err).context("cannot read command line"),
            }
        }

        Ok(self.env.exit_request.unwrap_or(status))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Environment::new())
    }
}

/// Replace every `$?` word with `status`.
pub fn substitute_last_status(tokens: &mut Sequence<String>, status: ExitCode) {
    for word in tokens.as_mut_slice() {
        if *word == LAST_STATUS_WORD {
            *word = status.to_string();
        }
    }
}

use crate::command::ExitCode;
use crate::env::Environment;
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Commands that must run inside the shell process itself.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without forking.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// Return value follows shell conventions: 0 for success, non-zero for error.
    fn execute(self, env: &mut Environment) -> Result<ExitCode>;
}

/// Run `words` as a builtin if the first word names one.
///
/// Returns `None` when it is not a builtin. Errors are printed to stderr and
/// turned into status 1.
pub(crate) fn dispatch(words: &[String], env: &mut Environment) -> Option<ExitCode> {
    let (name, args) = words.split_first()?;
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match name.as_str() {
        n if n == Cd::name() => Some(run::<Cd>(&args, env)),
        n if n == Exit::name() => Some(run::<Exit>(&args, env)),
        _ => None,
    }
}

fn run<T: BuiltinCommand>(args: &[&str], env: &mut Environment) -> ExitCode {
    let cmd = match T::from_args(&[T::name()], args) {
        Ok(cmd) => cmd,
        Err(EarlyExit { output, status }) => {
            return match status {
                Ok(()) => {
                    print!("{}", output);
                    0
                }
                Err(()) => {
                    eprint!("{}", output);
                    1
                }
            };
        }
    };
    match cmd.execute(env) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fdsh: {:#}", e);
            1
        }
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, env: &mut Environment) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => return Err(anyhow::anyhow!("cd: no target and HOME not set")),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the shell.
pub struct Exit {
    #[argh(positional)]
    /// status to exit with; defaults to 0. Only the low 8 bits are kept.
    pub status: Option<i32>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, env: &mut Environment) -> Result<ExitCode> {
        let code = self.status.unwrap_or(0).rem_euclid(256);
        env.exit_request = Some(code);
        Ok(code)
    }
}

use crate::error::{Result, ShellError};
use crate::sequence::Sequence;
use std::ffi::{CStr, CString};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Children killed by a signal are reported as `128 + signal`.
pub type ExitCode = i32;

/// A program name plus the argument vector handed to `execvp`.
///
/// `argv[0]` is the program name as typed; `nix` appends the terminating null
/// pointer when the vector is passed to exec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    argv: Sequence<CString>,
}

impl Command {
    /// Build a command from redirection-free words.
    ///
    /// Fails with [`ShellError::MissingCommand`] when no words are left.
    pub fn from_tokens(tokens: Sequence<String>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(ShellError::MissingCommand);
        }
        let mut argv = Sequence::with_capacity(tokens.capacity());
        for token in tokens {
            let arg = CString::new(token).map_err(|e| ShellError::TokenizeFailure {
                reason: format!("NUL byte at offset {}", e.nul_position()),
            })?;
            argv.push(arg)?;
        }
        Ok(Command { argv })
    }

    pub fn name(&self) -> &CStr {
        &self.argv[0]
    }

    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// The program name for diagnostics.
    pub fn display_name(&self) -> String {
        self.name().to_string_lossy().into_owned()
    }
}

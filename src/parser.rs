//! Turning the words of one command line into a runnable [`Command`].
//!
//! Redirection operators and their targets are applied to a
//! [`ProcessContext`] as they are found and spliced out of the word list, so
//! whatever remains is the program name followed by its arguments.

use crate::command::Command;
use crate::error::{Result, ShellError};
use crate::process::ProcessContext;
use crate::redirect::{self, RedirectKind};
use crate::sequence::Sequence;
use nix::unistd::close;
use tracing::{debug, warn};

/// Apply every redirection in `tokens` to `ctx` and build the command.
///
/// Scans left to right. An operator must be followed by a target word,
/// otherwise the line fails with [`ShellError::RedirectionSyntax`] and nothing
/// is run. On any failure `ctx` has already been cleaned up when this returns.
pub fn assemble(mut tokens: Sequence<String>, ctx: &mut ProcessContext) -> Result<Command> {
    match apply_redirections(&mut tokens, ctx) {
        Ok(()) => Command::from_tokens(tokens).inspect_err(|_| ctx.cleanup()),
        Err(e) => {
            ctx.cleanup();
            Err(e)
        }
    }
}

fn apply_redirections(tokens: &mut Sequence<String>, ctx: &mut ProcessContext) -> Result<()> {
    let mut i = 0;
    while i < tokens.len() {
        let kind = redirect::classify(&tokens[i]);
        if kind == RedirectKind::None {
            i += 1;
            continue;
        }

        let Some(target) = tokens.get(i + 1) else {
            return Err(ShellError::RedirectionSyntax {
                operator: tokens[i].clone(),
            });
        };
        let fd = redirect::open_target(kind, target)?;
        let applied = ctx.setup(fd, kind);
        if let Err(e) = close(fd) {
            warn!(fd, error = %e, "parser: cannot close redirection source");
        }
        applied?;
        debug!(kind = ?kind, target = %target, "parser.redirect");

        // The next word may be another operator, so look at `i` again.
        tokens.remove_range(i..i + 2);
    }
    Ok(())
}

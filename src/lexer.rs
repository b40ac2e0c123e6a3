//! Splitting a raw command line into words.
//!
//! Words are separated by runs of whitespace and nothing else: quotes,
//! backslashes and `$` have no special meaning here, so `echo "a b"` yields the
//! three words `echo`, `"a` and `b"`.

use crate::error::{Result, ShellError};
use crate::sequence::Sequence;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
}

struct LexingFSM<'a> {
    input: &'a str,
    state: LexingState,
    word_start: usize,
}

impl<'a> LexingFSM<'a> {
    fn new(input: &'a str) -> Self {
        LexingFSM {
            input,
            state: LexingState::Start,
            word_start: 0,
        }
    }

    fn make_tokens(mut self) -> Result<Sequence<String>> {
        let mut out = Sequence::new();

        for (pos, ch) in self.input.char_indices() {
            if ch == '\0' {
                return Err(ShellError::TokenizeFailure {
                    reason: format!("NUL byte at offset {pos}"),
                });
            }
            match (self.state, ch.is_whitespace()) {
                (LexingState::Start, false) => {
                    self.word_start = pos;
                    self.state = LexingState::ReadingWord;
                }
                (LexingState::ReadingWord, true) => {
                    out.push(self.input[self.word_start..pos].to_string())?;
                    self.state = LexingState::Start;
                }
                _ => {}
            }
        }

        if self.state == LexingState::ReadingWord {
            out.push(self.input[self.word_start..].to_string())?;
        }

        Ok(out)
    }
}

/// Strip one trailing `\n` or `\r\n`, if present.
pub fn strip_line_terminator(line: &str) -> &str {
    line.strip_suffix('\n')
        .map(|rest| rest.strip_suffix('\r').unwrap_or(rest))
        .unwrap_or(line)
}

/// Split `line` into whitespace-separated words.
///
/// An empty or blank line yields an empty sequence; callers decide what that
/// means. A NUL byte can never reach `execvp` and is rejected with
/// [`ShellError::TokenizeFailure`].
pub fn split_into_tokens(line: &str) -> Result<Sequence<String>> {
    let tokens = LexingFSM::new(strip_line_terminator(line)).make_tokens()?;
    trace!(count = tokens.len(), "lexer.tokens");
    Ok(tokens)
}

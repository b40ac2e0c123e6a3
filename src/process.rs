//! Saving, redirecting and restoring the standard streams of one command.
//!
//! A [`ProcessContext`] is created in the child right after `fork`, before the
//! first redirection is applied. It duplicates the three standard streams once,
//! rebinds them as redirections are encountered, and puts everything back on
//! [`ProcessContext::cleanup`] or when it is dropped. A successful `execvp`
//! makes the restore moot: every descriptor the context owns is close-on-exec,
//! so nothing leaks into the new program.

use crate::error::{Result, ShellError};
use crate::redirect::RedirectKind;
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, fcntl};
use nix::unistd::{close, dup2};
use std::os::fd::RawFd;
use tracing::{trace, warn};

/// One of the three standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Input = 0,
    Output = 1,
    Error = 2,
}

#[derive(Debug)]
struct SlotState {
    /// Descriptor number the stream lives at.
    target: RawFd,
    /// Private copy of whatever `target` referred to before any redirection.
    saved: Option<RawFd>,
    /// Private copy of the redirection source currently bound to `target`.
    active: Option<RawFd>,
}

/// Redirection state for the streams of a single command.
///
/// Descriptors handed to [`setup`](Self::setup) stay owned by the caller; the
/// context keeps its own duplicates.
#[derive(Debug)]
pub struct ProcessContext {
    slots: [SlotState; 3],
}

fn dup_cloexec(fd: RawFd) -> nix::Result<RawFd> {
    fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(0))
}

impl ProcessContext {
    /// Save descriptors 0, 1 and 2 of the current process.
    pub fn capture() -> Result<Self> {
        Self::capture_fds([
            libc::STDIN_FILENO,
            libc::STDOUT_FILENO,
            libc::STDERR_FILENO,
        ])
    }

    /// Save arbitrary descriptors standing in for input, output and error.
    pub fn capture_fds(targets: [RawFd; 3]) -> Result<Self> {
        let mut ctx = ProcessContext {
            slots: targets.map(|target| SlotState {
                target,
                saved: None,
                active: None,
            }),
        };
        for state in &mut ctx.slots {
            // On error, dropping `ctx` releases the copies made so far.
            let saved = dup_cloexec(state.target).map_err(|source| {
                ShellError::DescriptorDuplication {
                    fd: state.target,
                    source,
                }
            })?;
            state.saved = Some(saved);
        }
        trace!(?targets, "process.capture");
        Ok(ctx)
    }

    /// Bind every stream `kind` redirects to the file behind `fd`.
    ///
    /// A stream that is already redirected drops its previous target first. If
    /// any duplication fails, all streams are restored before the error is
    /// returned and the context is spent.
    pub fn setup(&mut self, fd: RawFd, kind: RedirectKind) -> Result<()> {
        for &slot in kind.slots() {
            if let Err(source) = self.redirect_slot(slot, fd) {
                let target = self.slots[slot as usize].target;
                self.cleanup();
                return Err(ShellError::DescriptorDuplication { fd: target, source });
            }
        }
        Ok(())
    }

    fn redirect_slot(&mut self, slot: Slot, fd: RawFd) -> nix::Result<()> {
        let state = &mut self.slots[slot as usize];
        if state.saved.is_none() {
            return Err(Errno::EBADF);
        }
        if let Some(previous) = state.active.take() {
            close(previous)?;
        }
        let copy = dup_cloexec(fd)?;
        state.active = Some(copy);
        dup2(copy, state.target)?;
        trace!(slot = ?slot, target = state.target, source = fd, "process.redirect");
        Ok(())
    }

    /// Whether `slot` currently points at a redirection target.
    pub fn is_redirected(&self, slot: Slot) -> bool {
        self.slots[slot as usize].active.is_some()
    }

    /// Whether every stream has been put back and all copies released.
    pub fn is_restored(&self) -> bool {
        self.slots
            .iter()
            .all(|state| state.saved.is_none() && state.active.is_none())
    }

    /// Restore every stream to what it was at capture time.
    ///
    /// Calling this again is a no-op.
    pub fn cleanup(&mut self) {
        for state in &mut self.slots {
            if let Some(active) = state.active.take() {
                if let Err(e) = close(active) {
                    warn!(fd = active, error = %e, "process.cleanup: close failed");
                }
            }
            if let Some(saved) = state.saved.take() {
                if let Err(e) = dup2(saved, state.target) {
                    warn!(fd = state.target, error = %e, "process.cleanup: restore failed");
                }
                if let Err(e) = close(saved) {
                    warn!(fd = saved, error = %e, "process.cleanup: close failed");
                }
            }
        }
    }
}

impl Drop for ProcessContext {
    fn drop(&mut self) {
        self.cleanup();
    }
}

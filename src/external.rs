//! Running a command line as a child process.
//!
//! The parent forks once per command and blocks until the child is reaped.
//! Everything between `fork` and `execvp` happens in the child: streams are
//! captured, redirections applied, and the process image replaced. When any of
//! that fails, the child restores its streams, reports the failure to the
//! parent over a close-on-exec pipe and exits. A successful exec closes the
//! pipe without writing, which is how the parent tells the two apart.

use crate::command::{Command, ExitCode};
use crate::error::{ExecFailure, Result, ShellError};
use crate::parser::assemble;
use crate::process::ProcessContext;
use crate::sequence::Sequence;
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, execvp, fork, pipe2};
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::OwnedFd;
use tracing::{debug, warn};

/// Added to the signal number of a child killed by a signal.
pub const SIGNAL_BASE: ExitCode = 128;

/// Run one command line to completion and return the child's status.
///
/// Failures that happen inside the child come back as the matching
/// [`ShellError`]; their [`status`](ShellError::status) is what the child
/// exited with.
pub fn run(tokens: Sequence<String>) -> Result<ExitCode> {
    let (reader, writer) = pipe2(OFlag::O_CLOEXEC).map_err(|source| ShellError::Pipe { source })?;

    // SAFETY: between fork and exec the child only allocates, rearranges
    // descriptors and either execs or `_exit`s.
    match unsafe { fork() }.map_err(|source| ShellError::Fork { source })? {
        ForkResult::Child => {
            drop(reader);
            run_child(tokens, writer)
        }
        ForkResult::Parent { child } => {
            drop(writer);
            debug!(pid = child.as_raw(), "external.fork");
            let report = read_report(reader);
            let status = wait_for(child)?;
            match report {
                Some(failure) => Err(failure),
                None => Ok(status),
            }
        }
    }
}

fn run_child(tokens: Sequence<String>, report: OwnedFd) -> ! {
    // SAFETY: restoring the default disposition installs no handler code.
    let _ = unsafe { signal(Signal::SIGINT, SigHandler::SigDfl) };

    let failure = match ProcessContext::capture() {
        Ok(mut ctx) => match assemble(tokens, &mut ctx) {
            Ok(command) => replace_image(&command, &mut ctx),
            Err(e) => e,
        },
        Err(e) => e,
    };

    if let Err(e) = send_report(report, &failure) {
        warn!(error = %e, failure = %failure, "external: cannot report child failure");
    }
    // SAFETY: skips atexit handlers and stdio flushing inherited from the
    // parent; everything the child owns is released by the kernel.
    unsafe { libc::_exit(failure.status()) }
}

fn send_report(report: OwnedFd, failure: &ShellError) -> std::io::Result<()> {
    File::from(report).write_all(&encode_report(failure))
}

/// Replace the current process image with `command`.
///
/// Only returns on failure, after `ctx` has been cleaned up. `ENOENT` is taken
/// to mean the program does not exist; see [`ExecFailure`].
pub fn replace_image(command: &Command, ctx: &mut ProcessContext) -> ShellError {
    let errno = match execvp(command.name(), command.argv()) {
        Ok(never) => match never {},
        Err(errno) => errno,
    };
    ctx.cleanup();

    let name = command.display_name();
    match errno {
        Errno::ENOENT => ExecFailure::CommandNotFound { name },
        source => ExecFailure::Other { name, source },
    }
    .into()
}

/// Status the shell reports for a reaped child, `None` if it has not
/// terminated.
pub fn exit_code(status: WaitStatus) -> Option<ExitCode> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(SIGNAL_BASE + signal as i32),
        _ => None,
    }
}

fn wait_for(child: Pid) -> Result<ExitCode> {
    loop {
        match waitpid(child, None) {
            Ok(status) => {
                if let Some(code) = exit_code(status) {
                    debug!(pid = child.as_raw(), status = code, "external.reap");
                    return Ok(code);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(source) => {
                return Err(ShellError::Wait {
                    pid: child.as_raw(),
                    source,
                });
            }
        }
    }
}

/// Keep the shell itself alive on Ctrl-C; children reset this before exec.
pub fn ignore_interrupts() -> nix::Result<()> {
    // SAFETY: `SigIgn` installs no handler code.
    unsafe { signal(Signal::SIGINT, SigHandler::SigIgn) }.map(drop)
}

fn read_report(reader: OwnedFd) -> Option<ShellError> {
    let mut bytes = Vec::new();
    if let Err(e) = File::from(reader).read_to_end(&mut bytes) {
        warn!(error = %e, "external: cannot read child report");
        return None;
    }
    if bytes.is_empty() {
        return None;
    }
    let failure = decode_report(&bytes);
    if failure.is_none() {
        warn!(len = bytes.len(), "external: malformed child report");
    }
    failure
}

// Report layout: tag (u8), errno (i32 BE), number (u64 BE), UTF-8 text.
const HEADER_LEN: usize = 1 + 4 + 8;

const TAG_REDIRECTION_SYNTAX: u8 = 1;
const TAG_MISSING_COMMAND: u8 = 2;
const TAG_FILE_OPEN: u8 = 3;
const TAG_DUPLICATION: u8 = 4;
const TAG_NOT_FOUND: u8 = 5;
const TAG_EXEC_OTHER: u8 = 6;
const TAG_ALLOCATION: u8 = 7;
const TAG_TOKENIZE: u8 = 8;
const TAG_UNKNOWN: u8 = 0;

fn encode_report(failure: &ShellError) -> Vec<u8> {
    let (tag, errno, number, text): (u8, Errno, u64, &str) = match failure {
        ShellError::RedirectionSyntax { operator } => {
            (TAG_REDIRECTION_SYNTAX, Errno::UnknownErrno, 0, operator.as_str())
        }
        ShellError::MissingCommand => (TAG_MISSING_COMMAND, Errno::UnknownErrno, 0, ""),
        ShellError::FileOpen { path, source } => (TAG_FILE_OPEN, *source, 0, path.as_str()),
        ShellError::DescriptorDuplication { fd, source } => {
            (TAG_DUPLICATION, *source, *fd as u64, "")
        }
        ShellError::Exec(ExecFailure::CommandNotFound { name }) => {
            (TAG_NOT_FOUND, Errno::ENOENT, 0, name.as_str())
        }
        ShellError::Exec(ExecFailure::Other { name, source }) => {
            (TAG_EXEC_OTHER, *source, 0, name.as_str())
        }
        ShellError::AllocationFailure { requested } => {
            (TAG_ALLOCATION, Errno::ENOMEM, *requested as u64, "")
        }
        ShellError::TokenizeFailure { reason } => {
            (TAG_TOKENIZE, Errno::UnknownErrno, 0, reason.as_str())
        }
        _ => (TAG_UNKNOWN, Errno::UnknownErrno, 0, ""),
    };

    let mut out = Vec::with_capacity(HEADER_LEN + text.len());
    out.push(tag);
    out.extend_from_slice(&(errno as i32).to_be_bytes());
    out.extend_from_slice(&number.to_be_bytes());
    out.extend_from_slice(text.as_bytes());
    out
}

fn decode_report(bytes: &[u8]) -> Option<ShellError> {
    if bytes.len() < HEADER_LEN {
        return None;
    }
    let (header, text) = bytes.split_at(HEADER_LEN);
    let errno = Errno::from_raw(i32::from_be_bytes(header[1..5].try_into().ok()?));
    let number = u64::from_be_bytes(header[5..13].try_into().ok()?);
    let text = String::from_utf8_lossy(text).into_owned();

    let failure = match header[0] {
        TAG_REDIRECTION_SYNTAX => ShellError::RedirectionSyntax { operator: text },
        TAG_MISSING_COMMAND => ShellError::MissingCommand,
        TAG_FILE_OPEN => ShellError::FileOpen {
            path: text,
            source: errno,
        },
        TAG_DUPLICATION => ShellError::DescriptorDuplication {
            fd: number as i32,
            source: errno,
        },
        TAG_NOT_FOUND => ExecFailure::CommandNotFound { name: text }.into(),
        TAG_EXEC_OTHER => ExecFailure::Other {
            name: text,
            source: errno,
        }
        .into(),
        TAG_ALLOCATION => ShellError::AllocationFailure {
            requested: number as usize,
        },
        TAG_TOKENIZE => ShellError::TokenizeFailure { reason: text },
        _ => return None,
    };
    Some(failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn run_line(line: &str) -> Result<ExitCode> {
        run(split_into_tokens(line).unwrap())
    }

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn echo_into_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let status = run_line(&format!("echo hello > {}", out.display())).unwrap();

        assert_eq!(status, 0);
        assert_eq!(fs::read_to_string(out).unwrap(), "hello\n");
    }

    #[test]
    fn append_keeps_earlier_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("log.txt");
        run_line(&format!("echo one > {}", out.display())).unwrap();
        run_line(&format!("echo two >> {}", out.display())).unwrap();
        run_line(&format!("echo three 1> {}", dir.path().join("other").display())).unwrap();

        assert_eq!(fs::read_to_string(out).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn input_and_output_together() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let out = dir.path().join("out.txt");
        fs::write(&input, "b\na\nc\n").unwrap();
        let status = run_line(&format!("sort < {} > {}", input.display(), out.display())).unwrap();

        assert_eq!(status, 0);
        assert_eq!(fs::read_to_string(out).unwrap(), "a\nb\nc\n");
    }

    #[test]
    fn both_streams_into_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let noisy = script(dir.path(), "noisy.sh", "echo out\necho err 1>&2\n");
        let both = dir.path().join("both.txt");
        let status = run_line(&format!("sh {} &> {}", noisy, both.display())).unwrap();

        assert_eq!(status, 0);
        assert_eq!(fs::read_to_string(both).unwrap(), "out\nerr\n");
    }

    #[test]
    fn errors_into_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let noisy = script(dir.path(), "noisy.sh", "echo oops 1>&2\nexit 3\n");
        let err = dir.path().join("err.txt");
        let status = run_line(&format!("sh {} 2> {}", noisy, err.display())).unwrap();

        assert_eq!(status, 3);
        assert_eq!(fs::read_to_string(err).unwrap(), "oops\n");
    }

    #[test]
    fn missing_target_never_runs_the_command() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let err = run_line(&format!("touch {} >", marker.display())).unwrap_err();

        assert!(matches!(err, ShellError::RedirectionSyntax { ref operator } if operator == ">"));
        assert_eq!(err.status(), 2);
        assert!(!marker.exists());
    }

    #[test]
    fn unreadable_input_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        let err = run_line(&format!("cat < {}", missing.display())).unwrap_err();

        match err {
            ShellError::FileOpen { path, source } => {
                assert_eq!(Path::new(&path), missing);
                assert_eq!(source, Errno::ENOENT);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_program_is_not_found() {
        let err = run_line("fdsh-test-no-such-program --help").unwrap_err();
        assert!(matches!(
            err,
            ShellError::Exec(ExecFailure::CommandNotFound { ref name }) if name == "fdsh-test-no-such-program"
        ));
        assert_eq!(err.status(), 127);
    }

    #[test]
    fn non_executable_file_is_another_exec_failure() {
        let dir = tempfile::tempdir().unwrap();
        let plain = script(dir.path(), "plain.txt", "not a program\n");
        fs::set_permissions(&plain, fs::Permissions::from_mode(0o644)).unwrap();
        let err = run_line(&plain).unwrap_err();

        assert!(matches!(
            err,
            ShellError::Exec(ExecFailure::Other { source: Errno::EACCES, .. })
        ));
        assert_eq!(err.status(), 126);
    }

    #[test]
    fn killed_child_reports_signal_plus_128() {
        let dir = tempfile::tempdir().unwrap();
        let suicide = script(dir.path(), "term.sh", "kill -TERM $$\nsleep 5\n");
        let status = run_line(&format!("sh {}", suicide)).unwrap();
        assert_eq!(status, SIGNAL_BASE + Signal::SIGTERM as i32);
    }

    #[test]
    fn exit_codes_pass_through() {
        assert_eq!(run_line("true").unwrap(), 0);
        assert_eq!(run_line("false").unwrap(), 1);
    }

    #[test]
    fn wait_status_mapping() {
        let pid = Pid::from_raw(4242);
        assert_eq!(exit_code(WaitStatus::Exited(pid, 0)), Some(0));
        assert_eq!(exit_code(WaitStatus::Exited(pid, 127)), Some(127));
        assert_eq!(
            exit_code(WaitStatus::Signaled(pid, Signal::SIGKILL, false)),
            Some(137)
        );
        assert_eq!(
            exit_code(WaitStatus::Signaled(pid, Signal::SIGSEGV, true)),
            Some(139)
        );
        assert_eq!(exit_code(WaitStatus::StillAlive), None);
    }

    #[test]
    fn child_report_keeps_path_and_errno() {
        let sent = ShellError::FileOpen {
            path: "dir/ünïcode.txt".to_string(),
            source: Errno::EACCES,
        };
        let received = decode_report(&encode_report(&sent)).unwrap();
        assert_eq!(received.to_string(), sent.to_string());
        assert_eq!(received.status(), sent.status());

        assert!(decode_report(b"\x03short").is_none());
        assert!(decode_report(&encode_report(&ShellError::Fork { source: Errno::EAGAIN })).is_none());
    }

    #[test]
    fn report_reaches_the_parent_end() {
        let (reader, writer) = pipe2(OFlag::O_CLOEXEC).unwrap();
        let sent: ShellError = ExecFailure::CommandNotFound {
            name: "frobnicate".to_string(),
        }
        .into();
        send_report(writer, &sent).unwrap();

        let received = read_report(reader).unwrap();
        assert_eq!(received.to_string(), sent.to_string());
        assert_eq!(received.status(), 127);
    }

    #[test]
    fn report_into_a_closed_pipe_is_an_error() {
        let (reader, writer) = pipe2(OFlag::O_CLOEXEC).unwrap();
        drop(reader);
        let err = send_report(writer, &ShellError::MissingCommand).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(Errno::EPIPE as i32));
    }
}

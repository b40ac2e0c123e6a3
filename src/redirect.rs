//! Redirection operators and how their targets are opened.

use crate::error::{Result, ShellError};
use crate::process::Slot;
use nix::errno::Errno;
use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;
use std::os::fd::RawFd;

/// Permission bits for every file a redirection creates (`rw-r--r--`),
/// before the umask is applied.
pub const CREATE_MODE: u32 = 0o644;

/// What a word does when it appears on a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `<`: read standard input from a file.
    In,
    /// `>` or `1>`: write standard output to a file, truncating it.
    Out,
    /// `>>`: append standard output to a file.
    Append,
    /// `2>`: write standard error to a file, truncating it.
    Err,
    /// `&>`: write both standard output and standard error to one file.
    OutErr,
    /// Not an operator.
    None,
}

/// Map a word to its redirection kind.
///
/// Only whole words count: `>file` is an ordinary argument.
pub fn classify(token: &str) -> RedirectKind {
    match token {
        "<" => RedirectKind::In,
        ">" | "1>" => RedirectKind::Out,
        ">>" => RedirectKind::Append,
        "2>" => RedirectKind::Err,
        "&>" => RedirectKind::OutErr,
        _ => RedirectKind::None,
    }
}

impl RedirectKind {
    pub fn is_redirect(self) -> bool {
        self != RedirectKind::None
    }

    /// Standard streams this kind rebinds.
    pub fn slots(self) -> &'static [Slot] {
        match self {
            RedirectKind::In => &[Slot::Input],
            RedirectKind::Out | RedirectKind::Append => &[Slot::Output],
            RedirectKind::Err => &[Slot::Error],
            RedirectKind::OutErr => &[Slot::Output, Slot::Error],
            RedirectKind::None => &[],
        }
    }

    /// Flags used to open the target; `None` for non-operators.
    ///
    /// Append never truncates.
    pub fn open_flags(self) -> Option<OFlag> {
        let write_new = OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC;
        match self {
            RedirectKind::In => Some(OFlag::O_RDONLY),
            RedirectKind::Out | RedirectKind::Err | RedirectKind::OutErr => Some(write_new),
            RedirectKind::Append => Some(OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND),
            RedirectKind::None => None,
        }
    }
}

/// Open `path` for a `kind` redirection, relative to the current directory.
///
/// The returned descriptor is close-on-exec and owned by the caller.
pub fn open_target(kind: RedirectKind, path: &str) -> Result<RawFd> {
    let flags = kind.open_flags().ok_or_else(|| ShellError::FileOpen {
        path: path.to_string(),
        source: Errno::EINVAL,
    })?;
    fcntl::open(
        path,
        flags | OFlag::O_CLOEXEC,
        Mode::from_bits_truncate(CREATE_MODE as _),
    )
    .map_err(|source| ShellError::FileOpen {
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::close;
    use std::fs;
    use std::io::Write;
    use std::os::fd::{FromRawFd, OwnedFd};
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn operators_map_to_their_kinds() {
        assert_eq!(classify("<"), RedirectKind::In);
        assert_eq!(classify(">"), RedirectKind::Out);
        assert_eq!(classify("1>"), RedirectKind::Out);
        assert_eq!(classify(">>"), RedirectKind::Append);
        assert_eq!(classify("2>"), RedirectKind::Err);
        assert_eq!(classify("&>"), RedirectKind::OutErr);
    }

    #[test]
    fn everything_else_is_not_an_operator() {
        for word in [
            "", "ls", ">file", "2>err", "<in", ">>>", "2>>", "&", "|", "1>>", " >", "> ", "0<",
        ] {
            assert_eq!(classify(word), RedirectKind::None, "word {:?}", word);
            assert!(!classify(word).is_redirect());
        }
    }

    #[test]
    fn out_err_rebinds_both_output_streams() {
        assert_eq!(RedirectKind::OutErr.slots(), &[Slot::Output, Slot::Error]);
        assert_eq!(RedirectKind::Append.slots(), &[Slot::Output]);
        assert!(RedirectKind::None.slots().is_empty());
    }

    #[test]
    fn append_never_truncates() {
        let flags = RedirectKind::Append.open_flags().unwrap();
        assert!(flags.contains(OFlag::O_APPEND));
        assert!(!flags.contains(OFlag::O_TRUNC));
        for kind in [RedirectKind::Out, RedirectKind::Err, RedirectKind::OutErr] {
            assert!(kind.open_flags().unwrap().contains(OFlag::O_TRUNC));
        }
    }

    #[test]
    fn truncate_and_append_modes_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let path = path.to_str().unwrap();
        fs::write(path, "old contents\n").unwrap();

        let fd = open_target(RedirectKind::Append, path).unwrap();
        let mut file = fs::File::from(unsafe { OwnedFd::from_raw_fd(fd) });
        file.write_all(b"more\n").unwrap();
        drop(file);
        assert_eq!(fs::read_to_string(path).unwrap(), "old contents\nmore\n");

        let fd = open_target(RedirectKind::Out, path).unwrap();
        close(fd).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "");
    }

    #[test]
    fn created_files_are_never_group_writable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");
        let fd = open_target(RedirectKind::Err, path.to_str().unwrap()).unwrap();
        close(fd).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode & !CREATE_MODE, 0, "mode {:o}", mode);
    }

    #[test]
    fn missing_input_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let path = path.to_str().unwrap();
        match open_target(RedirectKind::In, path) {
            Err(ShellError::FileOpen { path: p, source }) => {
                assert_eq!(p, path);
                assert_eq!(source, nix::errno::Errno::ENOENT);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

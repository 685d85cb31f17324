// -------- Builtins ---------
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::unistd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinKind { NotBuiltin, Exit, ChangeDirectory, StopServer, ReportLastCode }

/// Which built-ins a session honours. The local shell only knows `exit` and `cd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinSet { Local, Remote }

/// Pure name lookup, exact and case-sensitive.
pub fn classify(name: &str) -> BuiltinKind {
    match name {
        "exit" => BuiltinKind::Exit,
        "cd" => BuiltinKind::ChangeDirectory,
        "stop-server" => BuiltinKind::StopServer,
        "rc" => BuiltinKind::ReportLastCode,
        _ => BuiltinKind::NotBuiltin,
    }
}

impl BuiltinSet {
    /// Names that are not valid UTF-8 are never built-ins.
    pub fn classify<S: AsRef<OsStr> + ?Sized>(self, name: &S) -> BuiltinKind {
        let kind = name.as_ref().to_str().map_or(BuiltinKind::NotBuiltin, classify);
        match (self, kind) {
            (BuiltinSet::Local, BuiltinKind::StopServer | BuiltinKind::ReportLastCode) => BuiltinKind::NotBuiltin,
            (_, kind) => kind,
        }
    }
}

/// The session's working directory. It is the real process cwd, so every child
/// forked afterwards inherits it; only the owning session changes it.
#[derive(Debug)]
pub struct WorkingDirectory { _private: () }

impl WorkingDirectory {
    pub fn new() -> Self { WorkingDirectory { _private: () } }

    #[cfg(test)]
    pub fn current(&self) -> Option<PathBuf> { std::env::current_dir().ok() }

    /// `cd` with no argument is a no-op.
    pub fn change(&mut self, target: Option<&OsStr>) -> Result<(), CdError> {
        let Some(path) = target.map(Path::new) else { return Ok(()) };
        unistd::chdir(path).map_err(|errno| CdError { path: path.to_path_buf(), errno })?;
        tracing::debug!(path = %path.display(), "changed directory");
        Ok(())
    }
}

impl Default for WorkingDirectory {
    fn default() -> Self { Self::new() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdError { pub path: PathBuf, pub errno: Errno }

impl std::fmt::Display for CdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cd: {}: {}", self.path.display(), self.errno.desc())
    }
}

impl std::error::Error for CdError {}

// -------- Process orchestration ---------
use std::convert::Infallible;
use std::ffi::{CString, NulError};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::net::TcpStream;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::libc;
use nix::sys::signal::{kill, signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{close, dup2, execvp, fork, pipe2, ForkResult, Pid};

use crate::builtin::{BuiltinKind, BuiltinSet, WorkingDirectory};
use crate::error::ExecError;
use crate::limits::EXIT_EXEC_FAILED;
use crate::parse::{CommandPipeline, CommandSpec};

/// Where stage 0 reads from and where the last stage writes to.
#[derive(Debug, Clone, Copy)]
pub enum IoBindings<'a> {
    /// Inherit the shell's own stdin/stdout/stderr.
    Terminal,
    /// Socket duplicated onto stage 0's stdin and the last stage's stdout and stderr.
    Socket(&'a TcpStream),
}

impl IoBindings<'_> {
    fn fd(&self) -> Option<RawFd> {
        match self { IoBindings::Terminal => None, IoBindings::Socket(s) => Some(s.as_raw_fd()) }
    }

    pub fn write_out(&self, data: &[u8]) -> io::Result<()> {
        match self {
            IoBindings::Terminal => { let mut out = io::stdout(); out.write_all(data)?; out.flush() }
            IoBindings::Socket(s) => { let mut s = *s; s.write_all(data) }
        }
    }

    pub fn write_err(&self, data: &[u8]) -> io::Result<()> {
        match self {
            IoBindings::Terminal => io::stderr().write_all(data),
            IoBindings::Socket(s) => { let mut s = *s; s.write_all(data) }
        }
    }
}

/// Result of one pipeline. Only `Exited` means processes ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exit code of the last stage.
    Exited(i32),
    /// Stage 0 was `exit`.
    Exit,
    /// Stage 0 was `stop-server`.
    StopServer,
    /// A built-in ran in-process and nothing else was spawned.
    Handled,
}

/// Per-session state the orchestrator reads and mutates.
#[derive(Debug)]
pub struct ExecContext {
    pub builtins: BuiltinSet,
    pub cwd: WorkingDirectory,
    /// Exit code of the last pipeline that spawned processes.
    pub last_code: i32,
}

impl ExecContext {
    pub fn new(builtins: BuiltinSet) -> Self { ExecContext { builtins, cwd: WorkingDirectory::new(), last_code: 0 } }
}

/// Runs `cmd` in-process when it names a built-in. `None` means it must be forked.
pub fn run_builtin(cmd: &CommandSpec, io: &IoBindings<'_>, ctx: &mut ExecContext) -> io::Result<Option<Outcome>> {
    let Some(name) = cmd.argv.program() else { return Ok(None) };
    let outcome = match ctx.builtins.classify(name) {
        BuiltinKind::NotBuiltin => return Ok(None),
        BuiltinKind::Exit => Outcome::Exit,
        BuiltinKind::StopServer => Outcome::StopServer,
        BuiltinKind::ChangeDirectory => {
            if let Err(e) = ctx.cwd.change(cmd.argv.get(1)) { io.write_err(format!("{e}\n").as_bytes())?; }
            Outcome::Handled
        }
        BuiltinKind::ReportLastCode => {
            io.write_out(format!("{}\n", ctx.last_code).as_bytes())?;
            Outcome::Handled
        }
    };
    Ok(Some(outcome))
}

/// Forks one child per stage, chained through `len - 1` pipes, and waits for all
/// of them. A built-in at stage 0 is intercepted first: `exit`/`stop-server` return
/// before any pipe exists, `cd`/`rc` run in-process and the remaining stages (if
/// any) are still forked.
pub fn spawn_pipeline(pipeline: &CommandPipeline, io: &IoBindings<'_>, ctx: &mut ExecContext) -> Result<Outcome, ExecError> {
    let cmds = pipeline.commands();
    let n = cmds.len();
    let skip_first = match run_builtin(&cmds[0], io, ctx).map_err(ExecError::Communication)? {
        Some(Outcome::Handled) if n > 1 => true,
        Some(outcome) => return Ok(outcome),
        None => false,
    };
    if let IoBindings::Terminal = io { let _ = io::stdout().flush(); }

    let argvs: Vec<Result<Vec<CString>, NulError>> = cmds.iter()
        .map(|c| c.argv.as_slice().iter().map(|a| CString::new(a.as_bytes())).collect())
        .collect();

    let mut pipes: Vec<Option<(OwnedFd, OwnedFd)>> = Vec::with_capacity(n.saturating_sub(1));
    // close-on-exec so children forked by other threads never hold our ends;
    // dup2 clears the flag on the copies a stage actually uses
    for _ in 1..n {
        match pipe2(OFlag::O_CLOEXEC) {
            Ok(p) => pipes.push(Some(p)),
            Err(e) => {
                tracing::warn!(error = %e, created = pipes.len(), "pipe failed");
                // dropping `pipes` closes everything created so far
                return Err(ExecError::PipeCreateFailed(e));
            }
        }
    }

    let mut children: Vec<Pid> = Vec::with_capacity(n);
    for (i, cmd) in cmds.iter().enumerate() {
        if !(i == 0 && skip_first) {
            // SAFETY: the child only rewires fds and execs (or _exits).
            match unsafe { fork() } {
                Ok(ForkResult::Child) => exec_stage(i, n, cmd, &argvs[i], &pipes, io),
                Ok(ForkResult::Parent { child }) => children.push(child),
                Err(e) => {
                    tracing::warn!(error = %e, stage = i, "fork failed");
                    drop(pipes);
                    for pid in &children { let _ = kill(*pid, Signal::SIGTERM); }
                    return Err(ExecError::ForkFailed(e));
                }
            }
        }
        // both ends of the pipe feeding stage i now belong to children
        if i > 0 { pipes[i - 1] = None; }
    }
    drop(pipes);

    let mut last = EXIT_EXEC_FAILED;
    for pid in &children { last = wait_child(*pid); }
    ctx.last_code = last;
    Ok(Outcome::Exited(last))
}

fn wait_child(pid: Pid) -> i32 {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, sig, _)) => { tracing::debug!(%pid, ?sig, "child killed by signal"); return EXIT_EXEC_FAILED; }
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => { tracing::warn!(%pid, error = %e, "waitpid failed"); return EXIT_EXEC_FAILED; }
        }
    }
}

// Runs in the forked child; never returns.
fn exec_stage(idx: usize, n: usize, cmd: &CommandSpec, argv: &Result<Vec<CString>, NulError>,
              pipes: &[Option<(OwnedFd, OwnedFd)>], io: &IoBindings<'_>) -> ! {
    let err = match wire_and_exec(idx, n, cmd, argv, pipes, io) { Err(msg) => msg, Ok(never) => match never {} };
    eprintln!("{err}");
    // SAFETY: leaving the forked child without running the parent's destructors.
    unsafe { libc::_exit(EXIT_EXEC_FAILED) }
}

fn wire_and_exec(idx: usize, n: usize, cmd: &CommandSpec, argv: &Result<Vec<CString>, NulError>,
                 pipes: &[Option<(OwnedFd, OwnedFd)>], io: &IoBindings<'_>) -> Result<Infallible, String> {
    let prog = cmd.argv.program().unwrap_or_default().to_string_lossy();
    let dup = |from: RawFd, to: RawFd| dup2(from, to).map(|_| ()).map_err(|e| format!("dup2: {}", e.desc()));

    if idx > 0 {
        if let Some((r, _)) = &pipes[idx - 1] { dup(r.as_raw_fd(), libc::STDIN_FILENO)?; }
    } else if let Some(fd) = io.fd() {
        dup(fd, libc::STDIN_FILENO)?;
    }
    if idx + 1 < n {
        if let Some((_, w)) = &pipes[idx] { dup(w.as_raw_fd(), libc::STDOUT_FILENO)?; }
    } else {
        if let Some(fd) = io.fd() {
            dup(fd, libc::STDOUT_FILENO)?;
            dup(fd, libc::STDERR_FILENO)?;
        }
        if let Some(redir) = &cmd.redir {
            let file = OpenOptions::new().write(true).create(true).truncate(true).mode(0o644)
                .open(&redir.out_file)
                .map_err(|e| format!("{}: {}", redir.out_file.display(), e))?;
            dup(file.as_raw_fd(), libc::STDOUT_FILENO)?;
        }
    }
    for (r, w) in pipes.iter().flatten() {
        let _ = close(r.as_raw_fd());
        let _ = close(w.as_raw_fd());
    }
    // the shell ignores SIGPIPE; programs expect the default
    // SAFETY: restoring the default disposition before exec.
    let _ = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) };

    let argv = argv.as_ref().map_err(|_| format!("{prog}: argument contains a NUL byte"))?;
    match execvp(&argv[0], argv) {
        Ok(never) => match never {},
        Err(e) => Err(format!("{prog}: {}", e.desc())),
    }
}

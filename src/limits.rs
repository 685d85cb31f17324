// Fixed limits and the user-visible strings of the shell.

/// Maximum number of stages in one pipeline.
pub const CMD_MAX: usize = 8;
/// Argument slots per command; one slot is reserved for the terminator.
pub const CMD_ARGV_MAX: usize = 64;
/// Longest accepted local command line, terminator excluded.
pub const SH_CMD_MAX: usize = 320;
/// Receive buffer for one remote request, terminator included.
pub const RDSH_COMM_BUFF_SZ: usize = 64 * 1024;

pub const PIPE_CHAR: u8 = b'|';
pub const REDIRECT_OP: &str = ">";

/// Terminates a request on the wire.
pub const RDSH_REQ_END: u8 = 0x00;
/// Terminates a response on the wire.
pub const RDSH_EOF_CHAR: u8 = 0x04;

pub const RDSH_DEF_PORT: u16 = 1234;
pub const RDSH_DEF_SVR_INTFACE: &str = "0.0.0.0";
pub const RDSH_DEF_CLI_CONNECT: &str = "127.0.0.1";

/// Exit status of a child that could not exec, or that died on a signal.
pub const EXIT_EXEC_FAILED: i32 = 127;

pub const SH_PROMPT: &str = "dsh4> ";
pub const RSH_PROMPT: &str = "rdsh> ";

pub const CMD_WARN_NO_CMD: &str = "warning: no commands provided\n";
pub const CMD_WARN_EMPTY_SEGMENT: &str = "warning: empty pipeline segment ignored\n";
pub const CMD_ERR_LINE_TOO_LONG: &str = "error: command line too long\n";
pub const CMD_ERR_RDSH_EXEC: &str = "rdsh-error: command execution error\n";
pub const CMD_ERR_RDSH_TOO_LONG: &str = "rdsh-error: command too long\n";

pub const RCMD_MSG_CLIENT_EXITED: &str = "client exited: getting next connection...";
pub const RCMD_MSG_SVR_STOP_REQ: &str = "client requested server to stop, stopping...";
pub const RCMD_SERVER_EXITED: &str = "server appears to have exited...";

/// Width of the legacy buffer view.
pub const BUFFER_SZ: usize = 50;

use std::io::{self, BufRead, Write};
use std::net::TcpStream;

use anyhow::{Context, Result};

use crate::builtin::{BuiltinKind, BuiltinSet};
use crate::limits::{RCMD_SERVER_EXITED, RSH_PROMPT};
use crate::parse::build_pipeline;
use crate::rsh::{read_response, write_request};

/// True when the server will hang up on this line instead of answering.
fn ends_session(line: &[u8]) -> bool {
    let Ok(parsed) = build_pipeline(line) else { return false };
    let name = parsed.pipeline.first().argv.program().unwrap_or_default();
    matches!(BuiltinSet::Remote.classify(name), BuiltinKind::Exit | BuiltinKind::StopServer)
}

/// Interactive client: forwards each line to the server and prints the reply.
pub fn exec_remote_cmd_loop<R: BufRead>(address: &str, port: u16, mut input: R) -> Result<()> {
    let mut stream = TcpStream::connect((address, port)).with_context(|| format!("connect {address}:{port}"))?;
    tracing::info!(%address, port, "connected");
    let mut stdout = io::stdout();
    let mut line: Vec<u8> = Vec::new();
    loop {
        write!(stdout, "{RSH_PROMPT}")?;
        stdout.flush()?;
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 { writeln!(stdout)?; break; }
        let cmd = line.strip_suffix(b"\n").unwrap_or(&line);
        write_request(&mut stream, cmd).context("send request")?;
        if ends_session(cmd) { break; }
        if !read_response(&mut stream, &mut stdout).context("receive response")? {
            writeln!(stdout, "{RCMD_SERVER_EXITED}")?;
            break;
        }
    }
    Ok(())
}

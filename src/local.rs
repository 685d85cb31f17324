// -------- Local session loop ---------
use std::io::{self, BufRead, Read, Write};

use anyhow::Result;

use crate::builtin::BuiltinSet;
use crate::exec::{spawn_pipeline, ExecContext, IoBindings, Outcome};
use crate::limits::{BUFFER_SZ, CMD_ERR_LINE_TOO_LONG, CMD_WARN_EMPTY_SEGMENT, SH_CMD_MAX, SH_PROMPT};
use crate::parse::build_pipeline;

#[derive(Debug, Clone, Copy)]
pub struct LocalOptions { pub buffer_view: bool }

impl Default for LocalOptions {
    fn default() -> Self { LocalOptions { buffer_view: true } }
}

/// Prompt, read, parse, execute until `exit` or end of input.
pub fn exec_local_cmd_loop<R: BufRead>(mut input: R, opts: LocalOptions) -> Result<()> {
    let mut ctx = ExecContext::new(BuiltinSet::Local);
    let mut stdout = io::stdout();
    let mut line: Vec<u8> = Vec::new();
    loop {
        write!(stdout, "{SH_PROMPT}")?;
        stdout.flush()?;
        line.clear();
        // one byte past the limit plus the newline is enough to detect overflow
        let n = input.by_ref().take(SH_CMD_MAX as u64 + 2).read_until(b'\n', &mut line)?;
        if n == 0 { writeln!(stdout)?; break; }
        let complete = line.last() == Some(&b'\n');
        if complete { line.pop(); }
        if line.len() > SH_CMD_MAX {
            if !complete { discard_line(&mut input)?; }
            write!(stdout, "{CMD_ERR_LINE_TOO_LONG}")?;
            continue;
        }

        let parsed = match build_pipeline(&line) {
            Ok(p) => p,
            Err(e) => {
                if e.is_warning() { tracing::debug!(%e, "nothing to run"); } else { tracing::info!(%e, "rejected command line"); }
                writeln!(stdout, "{e}")?;
                continue;
            }
        };
        if parsed.empty_segment { eprint!("{CMD_WARN_EMPTY_SEGMENT}"); }

        match spawn_pipeline(&parsed.pipeline, &IoBindings::Terminal, &mut ctx) {
            Ok(Outcome::Exit) => { writeln!(stdout, "exiting...")?; break; }
            Ok(Outcome::Exited(code)) => tracing::debug!(code, "pipeline finished"),
            Ok(_) => {}
            Err(e) => eprintln!("{e}"),
        }
        if opts.buffer_view { writeln!(stdout, "{}", buffer_view(&String::from_utf8_lossy(&line)))?; }
    }
    Ok(())
}

/// Consumes input through the next newline without holding more than one buffer.
fn discard_line<R: BufRead>(input: &mut R) -> io::Result<()> {
    loop {
        let buf = input.fill_buf()?;
        if buf.is_empty() { return Ok(()); }
        match buf.iter().position(|&b| b == b'\n') {
            Some(i) => { input.consume(i + 1); return Ok(()); }
            None => { let n = buf.len(); input.consume(n); }
        }
    }
}

/// Legacy fixed-width view of a line: blank runs collapsed, edges trimmed,
/// padded with `.` to `BUFFER_SZ`.
pub fn buffer_view(raw: &str) -> String {
    let mut buf = String::with_capacity(BUFFER_SZ);
    let mut in_space = true;
    for c in raw.chars() {
        if c == ' ' || c == '\t' {
            if !in_space { buf.push(' '); }
            in_space = true;
        } else {
            buf.push(c);
            in_space = false;
        }
    }
    if buf.ends_with(' ') { buf.pop(); }
    let len = buf.chars().count();
    buf.extend(std::iter::repeat('.').take(BUFFER_SZ.saturating_sub(len)));
    format!("Buffer:  [{buf}]")
}

use std::io::{self, ErrorKind, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use crate::builtin::{BuiltinKind, BuiltinSet};
use crate::error::{ExecError, ParseError, RshError};
use crate::exec::{run_builtin, spawn_pipeline, ExecContext, IoBindings, Outcome};
use crate::limits::{
    CMD_ERR_RDSH_EXEC, CMD_ERR_RDSH_TOO_LONG, CMD_WARN_EMPTY_SEGMENT, CMD_WARN_NO_CMD, RCMD_MSG_CLIENT_EXITED,
    RCMD_MSG_SVR_STOP_REQ, RDSH_COMM_BUFF_SZ,
};
use crate::parse::{build_pipeline, ParsedLine};
use crate::rsh::{discard_request, read_request, send_message_eof, send_message_string, Request};

/// How a connection ended.
#[derive(Debug)]
pub enum SessionEnd {
    PeerClosed,
    ClientExit,
    StopServer,
    Communication(RshError),
}

enum State {
    Receiving,
    Dispatching(Vec<u8>),
    Executing(ParsedLine),
    Responding,
    Done(SessionEnd),
}

/// One accepted connection: the socket plus the session's execution context.
pub struct Session {
    stream: TcpStream,
    ctx: ExecContext,
}

impl Session {
    pub fn new(stream: TcpStream) -> Self { Session { stream, ctx: ExecContext::new(BuiltinSet::Remote) } }

    /// Serves requests until the client leaves or the connection breaks. The
    /// socket is closed when the session is dropped.
    pub fn run(&mut self) -> SessionEnd {
        let mut state = State::Receiving;
        loop {
            state = match state {
                State::Receiving => self.receive(),
                State::Dispatching(bytes) => self.dispatch(&bytes),
                State::Executing(parsed) => self.execute(&parsed),
                State::Responding => match send_message_eof(&mut self.stream) {
                    Ok(()) => State::Receiving,
                    Err(e) => State::Done(SessionEnd::Communication(e.into())),
                },
                State::Done(end) => return end,
            };
        }
    }

    fn receive(&mut self) -> State {
        match read_request(&mut self.stream, RDSH_COMM_BUFF_SZ) {
            Ok(Request::Line(bytes)) => State::Dispatching(bytes),
            Ok(Request::Closed) => State::Done(SessionEnd::PeerClosed),
            Ok(Request::TooLong) => {
                tracing::warn!(limit = RDSH_COMM_BUFF_SZ, "request without terminator, discarding");
                match discard_request(&mut self.stream) {
                    Ok(false) => State::Done(SessionEnd::PeerClosed),
                    Ok(true) => self.reply(CMD_ERR_RDSH_TOO_LONG),
                    Err(e) => State::Done(SessionEnd::Communication(e.into())),
                }
            }
            Err(e) => State::Done(SessionEnd::Communication(e.into())),
        }
    }

    fn dispatch(&mut self, bytes: &[u8]) -> State {
        tracing::debug!(line = %String::from_utf8_lossy(bytes), "request");
        let parsed = match build_pipeline(bytes) {
            Ok(p) => p,
            Err(ParseError::NoCommands) => return self.reply(CMD_WARN_NO_CMD),
            Err(e) => { tracing::info!(%e, "rejected request"); return self.reply(CMD_ERR_RDSH_EXEC); }
        };
        let first = parsed.pipeline.first();
        match self.ctx.builtins.classify(first.argv.program().unwrap_or_default()) {
            BuiltinKind::Exit => return State::Done(SessionEnd::ClientExit),
            BuiltinKind::StopServer => return State::Done(SessionEnd::StopServer),
            _ => {}
        }
        if parsed.empty_segment {
            if let Err(e) = self.stream.write_all(CMD_WARN_EMPTY_SEGMENT.as_bytes()) {
                return State::Done(SessionEnd::Communication(e.into()));
            }
        }
        // cd and rc answer in-process; the rest of such a line is not run
        match run_builtin(first, &IoBindings::Socket(&self.stream), &mut self.ctx) {
            Ok(Some(_)) => State::Responding,
            Ok(None) => State::Executing(parsed),
            Err(e) => State::Done(SessionEnd::Communication(e.into())),
        }
    }

    fn execute(&mut self, parsed: &ParsedLine) -> State {
        match spawn_pipeline(&parsed.pipeline, &IoBindings::Socket(&self.stream), &mut self.ctx) {
            Ok(Outcome::Exited(code)) => { tracing::debug!(code, "pipeline finished"); State::Responding }
            Ok(_) => State::Responding,
            Err(ExecError::Communication(e)) => State::Done(SessionEnd::Communication(e.into())),
            Err(e) => {
                tracing::warn!(%e, "pipeline failed");
                match self.stream.write_all(CMD_ERR_RDSH_EXEC.as_bytes()) {
                    Ok(()) => State::Responding,
                    Err(e) => State::Done(SessionEnd::Communication(e.into())),
                }
            }
        }
    }

    fn reply(&mut self, msg: &str) -> State {
        match send_message_string(&mut self.stream, msg) {
            Ok(()) => State::Receiving,
            Err(e) => State::Done(SessionEnd::Communication(e.into())),
        }
    }
}

/// Iterative server: one connection is served to completion before the next accept.
pub struct Server { listener: TcpListener }

impl Server {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        // std sets SO_REUSEADDR on unix listeners
        Ok(Server { listener: TcpListener::bind(addr)? })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.listener.local_addr() }

    /// Accepts clients until one sends `stop-server`, then closes the listener.
    pub fn process_cli_requests(self) -> Result<(), RshError> {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(c) => c,
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::ConnectionAborted) => continue,
                Err(e) => { tracing::error!(error = %e, "accept failed"); return Err(e.into()); }
            };
            tracing::info!(%peer, "client connected");
            let end = Session::new(stream).run();
            match &end {
                SessionEnd::StopServer => { println!("{RCMD_MSG_SVR_STOP_REQ}"); break; }
                SessionEnd::PeerClosed | SessionEnd::ClientExit => {
                    tracing::debug!(%peer, ?end, "session over");
                    println!("{RCMD_MSG_CLIENT_EXITED}");
                }
                SessionEnd::Communication(e) => tracing::warn!(%peer, error = %e, "connection dropped"),
            }
        }
        Ok(())
    }
}

use std::env;

use anyhow::{anyhow, bail, Result};

use crate::limits::{RDSH_DEF_CLI_CONNECT, RDSH_DEF_PORT, RDSH_DEF_SVR_INTFACE};

pub const USAGE: &str = "usage: dsh [-c | -s] [-i IP] [-p PORT] [-q] [-h]\n  \
    default: local shell\n  \
    -c  run as client, connect to IP:PORT\n  \
    -s  run as server, bind IP:PORT\n  \
    -i  interface/address (server default 0.0.0.0, client default 127.0.0.1)\n  \
    -p  port (default 1234, or $DSH_PORT)\n  \
    -q  local shell: do not print the buffer view\n  \
    -h  this help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode { Local, Server, Client }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub address: String,
    pub port: u16,
    pub buffer_view: bool,
}

/// Parsed command line. `Help` means print usage and stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation { Run(Config), Help }

fn parse_port(v: &str) -> Result<u16> { v.parse().map_err(|_| anyhow!("invalid port: {v}")) }

impl Config {
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Invocation> {
        let mut args = args.into_iter();
        let mut mode = Mode::Local;
        let mut address: Option<String> = None;
        let mut port: Option<u16> = None;
        let mut buffer_view = true;
        while let Some(a) = args.next() {
            match a.as_str() {
                "-c" => mode = Mode::Client,
                "-s" => mode = Mode::Server,
                "-i" => { address = Some(args.next().ok_or_else(|| anyhow!("missing value after -i"))?); }
                "-p" => { let v = args.next().ok_or_else(|| anyhow!("missing value after -p"))?; port = Some(parse_port(&v)?); }
                "-q" => buffer_view = false,
                "-x" => bail!("threaded server mode is not supported"),
                "-h" | "--help" => return Ok(Invocation::Help),
                other => bail!("unknown arg: {other}\n{USAGE}"),
            }
        }
        let port = match port {
            Some(p) => p,
            None => match env::var("DSH_PORT") { Ok(v) => parse_port(&v)?, Err(_) => RDSH_DEF_PORT },
        };
        let address = address.unwrap_or_else(|| match mode {
            Mode::Client => RDSH_DEF_CLI_CONNECT.to_string(),
            _ => RDSH_DEF_SVR_INTFACE.to_string(),
        });
        Ok(Invocation::Run(Config { mode, address, port, buffer_view }))
    }
}

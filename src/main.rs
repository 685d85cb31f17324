use std::env;
use std::io;

use anyhow::{Context, Result};

use dsh::config::{Config, Invocation, Mode, USAGE};
use dsh::local::{exec_local_cmd_loop, LocalOptions};
use dsh::rsh::client::exec_remote_cmd_loop;
use dsh::rsh::server::Server;

fn main() -> Result<()> {
    dsh::logging::init();
    let cfg = match Config::from_args(env::args().skip(1))? {
        Invocation::Run(cfg) => cfg,
        Invocation::Help => { eprintln!("{USAGE}"); return Ok(()); }
    };
    match cfg.mode {
        Mode::Local => exec_local_cmd_loop(io::stdin().lock(), LocalOptions { buffer_view: cfg.buffer_view }),
        Mode::Client => exec_remote_cmd_loop(&cfg.address, cfg.port, io::stdin().lock()),
        Mode::Server => {
            let server = Server::bind((cfg.address.as_str(), cfg.port))
                .with_context(|| format!("bind {}:{}", cfg.address, cfg.port))?;
            tracing::info!(addr = ?server.local_addr().ok(), "listening");
            server.process_cli_requests()?;
            Ok(())
        }
    }
}

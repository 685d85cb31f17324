//! `dsh`: a small pipeline shell that runs locally on a terminal or serves the
//! same pipeline execution to one TCP client at a time.

pub mod builtin;
pub mod config;
pub mod error;
pub mod exec;
pub mod limits;
pub mod local;
pub mod logging;
pub mod parse;
pub mod rsh;

use std::io;
use nix::errno::Errno;
use thiserror::Error;

use crate::limits::{CMD_ARGV_MAX, CMD_MAX};

/// Failures while turning a raw line into a pipeline.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("warning: no commands provided")]
    NoCommands,
    #[error("error: piping limited to {} commands", CMD_MAX)]
    TooManyCommands,
    #[error("error: too many arguments, limit is {}", CMD_ARGV_MAX - 1)]
    TooManyArguments,
    #[error("error: redirection requires a target file")]
    BadRedirectionArgs,
    #[error("error: command line too long")]
    LineTooLong,
}

impl ParseError {
    /// Warnings re-prompt quietly; everything else is an error.
    pub fn is_warning(&self) -> bool { matches!(self, ParseError::NoCommands) }
}

/// Orchestration failures raised in the parent before every stage is running.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("pipe: {}", .0.desc())]
    PipeCreateFailed(Errno),
    #[error("fork: {}", .0.desc())]
    ForkFailed(Errno),
    /// Writing a built-in's output to the bound stream failed.
    #[error("communication error: {0}")]
    Communication(io::Error),
}

/// Failures that end one remote connection.
#[derive(Debug, Error)]
pub enum RshError {
    #[error("communication error: {0}")]
    Communication(#[from] io::Error),
}

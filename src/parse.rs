// -------- Tokenizer / Pipeline builder / Redirection ---------
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStringExt;
use std::path::PathBuf;

use crate::error::ParseError;
use crate::limits::{CMD_ARGV_MAX, CMD_MAX, PIPE_CHAR, REDIRECT_OP};

/// Arguments of one command, argv[0] first. Never longer than `CMD_ARGV_MAX - 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentVector(Vec<OsString>);

impl ArgumentVector {
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn program(&self) -> Option<&OsStr> { self.0.first().map(OsString::as_os_str) }
    pub fn get(&self, idx: usize) -> Option<&OsStr> { self.0.get(idx).map(OsString::as_os_str) }
    pub fn as_slice(&self) -> &[OsString] { &self.0 }
}

impl<S: Into<OsString>> FromIterator<S> for ArgumentVector {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self { ArgumentVector(iter.into_iter().map(Into::into).collect()) }
}

/// Output redirection of the last stage; always truncate-create, write-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirSpec { pub out_file: PathBuf }

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec { pub argv: ArgumentVector, pub redir: Option<RedirSpec> }

impl CommandSpec {
    pub fn new(argv: ArgumentVector) -> Self { CommandSpec { argv, redir: None } }
}

/// Ordered, non-empty list of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPipeline { commands: Vec<CommandSpec> }

impl CommandPipeline {
    pub fn commands(&self) -> &[CommandSpec] { &self.commands }
    pub fn len(&self) -> usize { self.commands.len() }
    pub fn first(&self) -> &CommandSpec { &self.commands[0] }
}

/// A built pipeline plus the malformed-pipe side channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine { pub pipeline: CommandPipeline, pub empty_segment: bool }

fn is_space(c: u8) -> bool { matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c) }

/// Splits one command into arguments. A `"` opens a span copied verbatim up to
/// the next `"`; an unterminated span closes at end of input. Quotes inside an
/// unquoted word are literal. Bytes pass through unchanged, UTF-8 or not.
pub fn tokenize<B: AsRef<[u8]> + ?Sized>(raw: &B) -> Result<ArgumentVector, ParseError> {
    let line = raw.as_ref();
    let mut args: Vec<OsString> = Vec::new();
    let mut i = 0;
    loop {
        while i < line.len() && is_space(line[i]) { i += 1; }
        if i >= line.len() { break; }
        let (start, end);
        if line[i] == b'"' {
            start = i + 1;
            i = start;
            while i < line.len() && line[i] != b'"' { i += 1; }
            end = i;
            if i < line.len() { i += 1; }
        } else {
            start = i;
            while i < line.len() && !is_space(line[i]) { i += 1; }
            end = i;
        }
        if args.len() >= CMD_ARGV_MAX - 1 { return Err(ParseError::TooManyArguments); }
        args.push(OsString::from_vec(line[start..end].to_vec()));
    }
    Ok(ArgumentVector(args))
}

/// Cuts `raw` at every `|` outside a double-quoted span.
fn split_stages(raw: &[u8]) -> Vec<&[u8]> {
    let mut stages = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, &c) in raw.iter().enumerate() {
        match c {
            b'"' => in_quotes = !in_quotes,
            PIPE_CHAR if !in_quotes => { stages.push(&raw[start..i]); start = i + 1; }
            _ => {}
        }
    }
    stages.push(&raw[start..]);
    stages
}

/// Builds the pipeline for one raw line. Empty segments (`a || b`, a leading or
/// trailing `|`) are dropped and reported through `ParsedLine::empty_segment`.
pub fn build_pipeline<B: AsRef<[u8]> + ?Sized>(raw: &B) -> Result<ParsedLine, ParseError> {
    let mut commands: Vec<CommandSpec> = Vec::new();
    let mut empty_segment = false;
    for seg in split_stages(raw.as_ref()) {
        let argv = tokenize(seg)?;
        if argv.is_empty() { empty_segment = true; continue; }
        if commands.len() >= CMD_MAX { return Err(ParseError::TooManyCommands); }
        commands.push(CommandSpec::new(argv));
    }
    let last = commands.last_mut().ok_or(ParseError::NoCommands)?;
    let redir = resolve_redirection(last)?;
    last.redir = redir;
    if last.argv.is_empty() { return Err(ParseError::BadRedirectionArgs); }
    Ok(ParsedLine { pipeline: CommandPipeline { commands }, empty_segment })
}

/// Pulls the first `> target` pair out of `cmd.argv`. Arguments after the
/// target stay in place.
pub fn resolve_redirection(cmd: &mut CommandSpec) -> Result<Option<RedirSpec>, ParseError> {
    let args = &mut cmd.argv.0;
    let Some(idx) = args.iter().position(|a| a.as_os_str() == OsStr::new(REDIRECT_OP)) else { return Ok(None) };
    if idx + 1 >= args.len() { return Err(ParseError::BadRedirectionArgs); }
    let target = args.remove(idx + 1);
    args.remove(idx);
    Ok(Some(RedirSpec { out_file: PathBuf::from(target) }))
}

//! Command scripts.
//!
//! ```text
//! FLH/4
//! INC:2019
//! BUS=:2019
//! ```
//!
//! The header names the fanout (maximum children per node); the tree order
//! is one less. Blank lines are skipped and surrounding whitespace ignored.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::common::config::MIN_ORDER;
use crate::common::{Error, Result};
use crate::index::Key;

const HEADER_PREFIX: &str = "FLH/";
const INSERT_PREFIX: &str = "INC:";
const SEARCH_PREFIX: &str = "BUS=:";

/// One script command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Index every record whose key equals the operand.
    Insert(Key),
    /// Count the entries stored under the operand.
    Search(Key),
}

impl Command {
    pub fn key(&self) -> Key {
        match *self {
            Command::Insert(key) | Command::Search(key) => key,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Insert(key) => write!(f, "{INSERT_PREFIX}{key}"),
            Command::Search(key) => write!(f, "{SEARCH_PREFIX}{key}"),
        }
    }
}

/// A parsed script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandScript {
    /// Header line as written, echoed at the top of the output.
    pub header: String,
    pub fanout: usize,
    pub commands: Vec<Command>,
}

impl CommandScript {
    /// Read and parse a script file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        parse_script(&text)
    }

    /// Tree order implied by the fanout. A fanout below 1 gives order 0,
    /// which [`IndexConfig::validate`](crate::IndexConfig::validate) rejects.
    pub fn order(&self) -> usize {
        self.fanout.saturating_sub(1)
    }
}

/// Parse a command script.
///
/// # Errors
/// `Error::Parse` with the 1-based line number for a missing or malformed
/// header, an unknown command, or an operand that is not an integer.
pub fn parse_script(text: &str) -> Result<CommandScript> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (header_line, header) = lines.next().ok_or(Error::Parse {
        line: 0,
        reason: "empty command script".to_string(),
    })?;
    let fanout = parse_header(header_line, header)?;

    let commands = lines
        .map(|(line, text)| parse_command(line, text))
        .collect::<Result<Vec<_>>>()?;

    Ok(CommandScript {
        header: header.to_string(),
        fanout,
        commands,
    })
}

fn parse_header(line: usize, text: &str) -> Result<usize> {
    let operand = text.strip_prefix(HEADER_PREFIX).ok_or_else(|| Error::Parse {
        line,
        reason: format!("expected `{HEADER_PREFIX}<fanout>` header, got {text:?}"),
    })?;
    let fanout: usize = operand.trim().parse().map_err(|e| Error::Parse {
        line,
        reason: format!("invalid fanout {operand:?}: {e}"),
    })?;
    if fanout < MIN_ORDER + 1 {
        return Err(Error::Parse {
            line,
            reason: format!("fanout must be at least {}, got {fanout}", MIN_ORDER + 1),
        });
    }
    Ok(fanout)
}

fn parse_command(line: usize, text: &str) -> Result<Command> {
    let (ctor, operand): (fn(Key) -> Command, &str) =
        if let Some(rest) = text.strip_prefix(INSERT_PREFIX) {
            (Command::Insert, rest)
        } else if let Some(rest) = text.strip_prefix(SEARCH_PREFIX) {
            (Command::Search, rest)
        } else {
            return Err(Error::Parse {
                line,
                reason: format!("unknown command {text:?}"),
            });
        };

    let key = operand.trim().parse().map_err(|e| Error::Parse {
        line,
        reason: format!("invalid key {operand:?}: {e}"),
    })?;
    Ok(ctor(key))
}

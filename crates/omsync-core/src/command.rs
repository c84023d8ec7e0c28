//! The textual command grammar.
//!
//! A command is `<op><path><value>`: one operation character, a path of
//! node ids, and an optional value that runs to the end of the fragment.
//! Several commands travel in one packet joined by [`SEPARATOR`]. The
//! path/value boundary is only known once the path has been resolved
//! against a tree, so [`Command`] keeps them together as the `body`.

use std::fmt;

use crate::error::{CoreError, Result};

/// Joins command fragments within one packet.
pub const SEPARATOR: char = ';';

/// The liveness fragment. Carries no command.
pub const HEARTBEAT: &str = ".";

/// Command operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `=` assign a value to a property.
    Assign,
    /// `?` request the value(s) be sent.
    Query,
    /// `*` log the current value(s).
    Dump,
    /// `>` persist to preferences.
    Save,
    /// `<` load from preferences.
    Load,
    /// `!` log the persisted value(s).
    DumpSaved,
    /// `-` remove the persisted value(s).
    RemoveSaved,
}

impl Op {
    pub const ALL: [Op; 7] = [
        Op::Assign,
        Op::Query,
        Op::Dump,
        Op::Save,
        Op::Load,
        Op::DumpSaved,
        Op::RemoveSaved,
    ];

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '=' => Some(Op::Assign),
            '?' => Some(Op::Query),
            '*' => Some(Op::Dump),
            '>' => Some(Op::Save),
            '<' => Some(Op::Load),
            '!' => Some(Op::DumpSaved),
            '-' => Some(Op::RemoveSaved),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Op::Assign => '=',
            Op::Query => '?',
            Op::Dump => '*',
            Op::Save => '>',
            Op::Load => '<',
            Op::DumpSaved => '!',
            Op::RemoveSaved => '-',
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    op: Op,
    body: String,
}

impl Command {
    pub fn new(op: Op, body: impl Into<String>) -> Self {
        Self {
            op,
            body: body.into(),
        }
    }

    /// Parse a single fragment. Trailing line endings are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim_end_matches(['\r', '\n']);
        let mut chars = text.chars();
        let c = chars.next().ok_or(CoreError::EmptyCommand)?;
        let op = Op::from_char(c).ok_or(CoreError::UnknownOperation(c))?;
        Ok(Self {
            op,
            body: chars.as_str().to_string(),
        })
    }

    pub fn op(&self) -> Op {
        self.op
    }

    /// Path followed by the value, if any.
    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_char(), self.body)
    }
}

/// The wire form of an assignment: `=<path><value>`.
pub fn assign_fragment(path: &str, value: &str) -> String {
    format!("{}{}{}", Op::Assign.as_char(), path, value)
}

/// The wire form of a query: `?<path>`.
pub fn query_fragment(path: &str) -> String {
    format!("{}{}", Op::Query.as_char(), path)
}

/// Split a packet into its non-empty fragments.
pub fn split_packet(packet: &str) -> impl Iterator<Item = &str> {
    packet.split(SEPARATOR).filter(|f| !f.is_empty())
}

//! Built-in I/O routines and their runtime symbol names

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{self, TypeId};

/// Discriminator for the built-in I/O routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Magic {
    Read,
    Readln,
    Write,
    Writeln,
}

impl Magic {
    /// The source-level name the built-in is bound under.
    pub fn name(self) -> &'static str {
        match self {
            Magic::Read => "read",
            Magic::Readln => "readln",
            Magic::Write => "write",
            Magic::Writeln => "writeln",
        }
    }
}

impl fmt::Display for Magic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The display vector holding captured-variable addresses.
pub const DISPLAY_SYMBOL: &str = "@display@";

/// Emitted once at the end of every `writeln`.
pub const WRITE_NEWLINE_SYMBOL: &str = "@write_newline@";

/// Runtime entry points per printable/readable type: `(type, write, read)`.
const IO_SYMBOLS: [(TypeId, &str, &str); 6] = [
    (types::INTEGER_TYPE, "@write_integer@", "@read_integer@"),
    (types::REAL_TYPE, "@write_real@", "@read_real@"),
    (types::STRING_TYPE, "@write_string@", "@read_string@"),
    (types::BOOLEAN_TYPE, "@write_bool@", "@read_bool@"),
    (types::CHAR_TYPE, "@write_char@", "@read_char@"),
    (types::VOID_TYPE, "@write_void@", "@read_void@"),
];

/// Runtime symbol that prints a value of `ty`, if any.
pub fn write_symbol(ty: TypeId) -> Option<&'static str> {
    IO_SYMBOLS
        .iter()
        .find(|(t, _, _)| *t == ty)
        .map(|(_, w, _)| *w)
}

/// Runtime symbol that reads a value of `ty` through an address, if any.
pub fn read_symbol(ty: TypeId) -> Option<&'static str> {
    IO_SYMBOLS
        .iter()
        .find(|(t, _, _)| *t == ty)
        .map(|(_, _, r)| *r)
}

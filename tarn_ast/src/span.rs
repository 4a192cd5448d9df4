//! Source positions attached to AST nodes

use std::fmt;

use serde::{Deserialize, Serialize};

/// A line/column position in the source text.
///
/// Spans are optional throughout the AST; nodes synthesized by tools may
/// not carry one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

//! Declaration tree handed over by the parser.
//!
//! Only the structural part of a program is modelled here: packages, imports,
//! class declarations and member signatures. Method bodies arrive separately,
//! already lowered, through [`crate::codegen::MethodBodies`].

mod nodes;

pub use nodes::*;

use std::fmt;

/// Position of a declaration in its compilation unit. Lines and columns
/// start at 1; the default value means "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    /// Byte offset into the source file
    pub offset: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Source range of a declaration; diagnostics report `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Location,
    pub end: Location,
}

impl Span {
    pub fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    pub fn is_unknown(&self) -> bool {
        *self == Span::default()
    }
}

//! Source positions threaded through every AST node and every error.
//!
//! Provenance is deliberately thin: a byte offset and length into the
//! source file being compiled, plus a tag distinguishing user-written
//! syntax from nodes the elaborator inserted itself (implicit/instance
//! argument insertion, see `expr::Origin`).

use std::fmt;

/// A half-open `[start, end)` byte range in the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Provenance {
    pub start: u32,
    pub end: u32,
}

impl Provenance {
    pub const fn mk(start: u32, end: u32) -> Self {
        Provenance { start, end }
    }

    /// Provenance for a node that has no counterpart in the source text,
    /// e.g. a machine-inserted implicit argument or a VNNLib magic variable.
    pub const fn machine() -> Self {
        Provenance { start: 0, end: 0 }
    }

    pub fn join(&self, other: &Provenance) -> Provenance {
        Provenance {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

//! Interned symbols used for surface names and top-level declaration
//! identifiers.
//!
//! `Symbol` is an `Arc<str>` wrapper in the same spirit as the teacher's
//! hierarchical `Name` type, simplified to flat identifiers: Vehicle's
//! surface language has no dotted namespaces, so there is no `Anon`/`Str`/
//! `Num` cons-list to maintain.

use std::fmt;
use std::sync::Arc;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn mk<S: AsRef<str>>(s: S) -> Self {
        Symbol(Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::mk(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::mk(s)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a top-level declaration, distinct from `Symbol` only in
/// that it's what a `Var::Free` refers to once scope checking has run.
/// Kept as a thin newtype rather than a bare `Symbol` so that `Free(Ident)`
/// can't be confused with a surface-level occurrence still awaiting lookup.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(Symbol);

impl Ident {
    pub fn mk<S: AsRef<str>>(s: S) -> Self {
        Ident(Symbol::mk(s))
    }

    pub fn from_symbol(sym: Symbol) -> Self {
        Ident(sym)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn symbol(&self) -> &Symbol {
        &self.0
    }
}

impl fmt::Debug for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod name_tests {
    use super::*;

    #[test]
    fn symbol_equality_is_structural() {
        let a = Symbol::mk("foo");
        let b = Symbol::mk("foo");
        let c = Symbol::mk("bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn ident_roundtrips_through_symbol() {
        let sym = Symbol::mk("network1");
        let id = Ident::from_symbol(sym.clone());
        assert_eq!(id.symbol(), &sym);
        assert_eq!(id.as_str(), "network1");
    }
}

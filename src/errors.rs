//! Error taxonomy (spec §7). Every pass aborts on its own error type; no
//! pass catches another pass's errors, and `VehicleError` is only used at
//! the point where the CLI driver reports a failure to the user.
//!
//! The teacher hand-writes `Display`/`Error` for a flat `NanodaErr` enum
//! plus a family of `fn ... -> !` helpers for impossible states. We keep
//! that split (user-facing errors vs. developer assertions) but derive the
//! boilerplate with `thiserror`, the way `plotnik-compiler` and
//! `aptos-core` do for their own error enums.

use thiserror::Error;

use crate::elaborate::Constraint;
use crate::expr::CoreExpr;
use crate::name::{Ident, Symbol};
use crate::provenance::Provenance;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScopeError {
    #[error("unbound name `{name}` at {prov}")]
    UnboundName { name: Symbol, prov: Provenance },
}

#[derive(Debug, Error, Clone)]
pub enum TypingError {
    #[error("type mismatch at {prov}: expected {expected:?}, got {actual:?}")]
    Mismatch { actual: Box<CoreExpr>, expected: Box<CoreExpr>, prov: Provenance },
    #[error("at {prov}: argument does not match the binder's visibility; expected a value of type {expected_ty:?}")]
    MissingExplicitArg { expected_ty: Box<CoreExpr>, prov: Provenance },
    #[error("unresolved hole `?{name}` at {prov}")]
    UnresolvedHole { name: Symbol, prov: Provenance },
    #[error("unsolved constraints after fixpoint: {0:?}")]
    UnsolvedConstraints(Vec<Constraint>),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NormError {
    #[error("quantifier domain reduced to an empty container at {0}")]
    EmptyQuantifierDomain(Provenance),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedNetworkKind {
    NotAFunction,
    NotATensor,
    WrongTensorType,
    MultidimensionalTensor,
    VariableSizeTensor,
}

#[derive(Debug, Error, Clone)]
pub enum SmtLibError {
    #[error("no property declarations found in the program")]
    NoPropertiesFound,
    #[error("property `{0}` does not reference any network")]
    NoNetworkUsedInProperty(Ident),
    #[error("network `{name}` has an unsupported type: {kind:?}")]
    UnsupportedNetworkType { name: Ident, kind: UnsupportedNetworkKind },
    #[error("network application `{0}` is not let-bound directly; an ANF-lifting pre-pass is required first")]
    NotAnf(Ident),
    #[error("internal invariant violated while lowering to VNNLib: {0}")]
    NormalisationError(String),
}

#[derive(Debug, Error)]
pub enum VehicleError {
    #[error(transparent)]
    Parse(#[from] crate::lexer::ParseError),
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error(transparent)]
    Typing(#[from] TypingError),
    #[error(transparent)]
    Norm(#[from] NormError),
    #[error(transparent)]
    SmtLib(#[from] SmtLibError),
}

/// Marks a state that should be unreachable given the invariants upheld by
/// earlier passes (e.g. VNNLib lowering encountering a construct the
/// normaliser should already have eliminated). Distinguished from the user
/// error channel: this is a crash with a pointer to the violated
/// invariant, not a value `compile_source` can recover from.
#[track_caller]
pub fn bug(msg: &str) -> ! {
    let loc = std::panic::Location::caller();
    panic!("internal invariant violated at {}:{}: {}", loc.file(), loc.line(), msg)
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    #[should_panic(expected = "internal invariant violated")]
    fn bug_panics_with_context() {
        bug("unreachable");
    }
}

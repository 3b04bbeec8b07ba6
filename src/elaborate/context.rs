//! The elaborator's read-only variable context (spec §4.3: "a read-only
//! variable context (bound-variable types and declaration-level
//! (type, optional-body))").
//!
//! Declaration-level lookups go through `crate::env::Env` directly; `Ctx`
//! only tracks the stack of local binder types pushed while descending
//! into `Pi`/`Lam`/`Let` bodies.

use crate::debruijn::lift;
use crate::expr::CoreExpr;

/// `bound[bound.len() - 1]` is the type of `Bound(0)`, recorded exactly as
/// it stood at the point the binder was pushed (i.e. valid one context
/// shallower than where a body under that binder sits).
#[derive(Debug, Clone, Default)]
pub struct Ctx {
    bound: Vec<CoreExpr>,
}

impl Ctx {
    pub fn new() -> Self {
        Ctx::default()
    }

    pub fn depth(&self) -> usize {
        self.bound.len()
    }

    pub fn push(&mut self, ty: CoreExpr) {
        self.bound.push(ty);
    }

    pub fn pop(&mut self) {
        self.bound.pop();
    }

    /// Looks up `Bound(i)`'s type, lifted by `i + 1` to account for the
    /// binders introduced between the type's recording site and here
    /// (spec §4.3, `Var(Bound i)` infer rule).
    pub fn lookup(&self, i: usize) -> Option<CoreExpr> {
        let len = self.bound.len();
        if i >= len {
            return None;
        }
        let raw = &self.bound[len - 1 - i];
        Some(lift(i + 1, 0, raw))
    }
}

#[cfg(test)]
mod context_tests {
    use super::*;
    use crate::expr::mk_type;
    use crate::provenance::Provenance;

    #[test]
    fn lookup_zero_is_unlifted_for_a_single_binder() {
        let mut ctx = Ctx::new();
        ctx.push(mk_type(Provenance::machine(), 0));
        assert_eq!(ctx.lookup(0), Some(mk_type(Provenance::machine(), 0)));
    }

    #[test]
    fn lookup_past_the_stack_is_none() {
        let ctx = Ctx::new();
        assert_eq!(ctx.lookup(0), None);
    }
}

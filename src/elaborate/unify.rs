//! Structural unification (spec §4.3.1).

use crate::debruijn::subst;
use crate::elaborate::solver::{apply_meta_subst, MetaContext};
use crate::errors::TypingError;
use crate::expr::{CoreExpr, Expr, Var};
use crate::provenance::Provenance;

pub enum UnifyOutcome {
    Solved,
    /// A `Meta` occurs on one side but can't yet be bound (occurs check,
    /// or the other side escapes the meta's birth context): re-queued as
    /// a constraint by the caller.
    Deferred,
}

pub fn unify(mc: &mut MetaContext, depth: usize, prov: Provenance, e1: &CoreExpr, e2: &CoreExpr) -> Result<UnifyOutcome, TypingError> {
    match (e1, e2) {
        (Expr::Meta(_, m1), Expr::Meta(_, m2)) if m1 == m2 => Ok(UnifyOutcome::Solved),
        (Expr::Meta(_, m), other) => bind_meta(mc, *m, other),
        (other, Expr::Meta(_, m)) => bind_meta(mc, *m, other),

        (Expr::Type(_, l1), Expr::Type(_, l2)) if l1 == l2 => Ok(UnifyOutcome::Solved),
        (Expr::Var(_, v1), Expr::Var(_, v2)) if v1 == v2 => Ok(UnifyOutcome::Solved),
        (Expr::Builtin(_, o1), Expr::Builtin(_, o2)) if o1 == o2 => Ok(UnifyOutcome::Solved),
        (Expr::Literal(_, l1), Expr::Literal(_, l2)) if l1 == l2 => Ok(UnifyOutcome::Solved),

        (Expr::App(_, f1, a1), Expr::App(_, f2, a2)) if a1.len() == a2.len() => {
            let mut outcome = unify(mc, depth, prov, f1, f2)?;
            for (x, y) in a1.iter().zip(a2.iter()) {
                let x = apply_meta_subst(mc, &x.value);
                let y = apply_meta_subst(mc, &y.value);
                outcome = combine(outcome, unify(mc, depth, prov, &x, &y)?);
            }
            Ok(outcome)
        }
        (Expr::Pi(_, b1, r1), Expr::Pi(_, b2, r2)) if b1.visibility == b2.visibility => {
            let ty1 = apply_meta_subst(mc, &b1.ty);
            let ty2 = apply_meta_subst(mc, &b2.ty);
            let o1 = unify(mc, depth, prov, &ty1, &ty2)?;
            let body1 = apply_meta_subst(mc, r1);
            let body2 = apply_meta_subst(mc, r2);
            let o2 = unify(mc, depth + 1, prov, &body1, &body2)?;
            Ok(combine(o1, o2))
        }
        (Expr::Lam(_, b1, r1), Expr::Lam(_, b2, r2)) if b1.visibility == b2.visibility => {
            let ty1 = apply_meta_subst(mc, &b1.ty);
            let ty2 = apply_meta_subst(mc, &b2.ty);
            let o1 = unify(mc, depth, prov, &ty1, &ty2)?;
            let body1 = apply_meta_subst(mc, r1);
            let body2 = apply_meta_subst(mc, r2);
            let o2 = unify(mc, depth + 1, prov, &body1, &body2)?;
            Ok(combine(o1, o2))
        }
        (Expr::Let(_, v1, _, body1), _) => {
            let reduced = apply_meta_subst(mc, &subst(body1, v1));
            unify(mc, depth, prov, &reduced, e2)
        }
        (_, Expr::Let(_, v2, _, body2)) => {
            let reduced = apply_meta_subst(mc, &subst(body2, v2));
            unify(mc, depth, prov, e1, &reduced)
        }
        (Expr::Ann(_, inner, _), _) => unify(mc, depth, prov, inner, e2),
        (_, Expr::Ann(_, inner, _)) => unify(mc, depth, prov, e1, inner),

        _ => Err(TypingError::Mismatch { actual: Box::new(e2.clone()), expected: Box::new(e1.clone()), prov }),
    }
}

fn combine(a: UnifyOutcome, b: UnifyOutcome) -> UnifyOutcome {
    match (a, b) {
        (UnifyOutcome::Solved, UnifyOutcome::Solved) => UnifyOutcome::Solved,
        _ => UnifyOutcome::Deferred,
    }
}

fn bind_meta(mc: &mut MetaContext, m: u64, target: &CoreExpr) -> Result<UnifyOutcome, TypingError> {
    if occurs(m, target) {
        return Ok(UnifyOutcome::Deferred);
    }
    let limit = mc.meta_depth(m);
    if !closed_under(limit, target) {
        return Ok(UnifyOutcome::Deferred);
    }
    mc.subst.insert(m, target.clone());
    Ok(UnifyOutcome::Solved)
}

fn occurs(m: u64, e: &CoreExpr) -> bool {
    match e {
        Expr::Meta(_, id) => *id == m,
        Expr::Var(..) | Expr::Type(..) | Expr::Hole(..) | Expr::Builtin(..) | Expr::Literal(..) => false,
        Expr::App(_, f, args) => occurs(m, f) || args.iter().any(|a| occurs(m, &a.value)),
        Expr::Pi(_, b, body) | Expr::Lam(_, b, body) => occurs(m, &b.ty) || occurs(m, body),
        Expr::Let(_, v, b, body) => occurs(m, v) || occurs(m, &b.ty) || occurs(m, body),
        Expr::Ann(_, inner, t) => occurs(m, inner) || occurs(m, t),
        Expr::Seq(_, xs) => xs.iter().any(|x| occurs(m, x)),
        Expr::PrimDict(_, inner) => occurs(m, inner),
    }
}

/// Whether every `Bound` index reachable in `e`, once adjusted for the
/// binders the traversal itself has descended through, is strictly below
/// `limit` — i.e. `e` only refers to binders that existed when the meta
/// being bound was created.
fn closed_under(limit: usize, e: &CoreExpr) -> bool {
    fn go(e: &CoreExpr, depth: usize, limit: usize) -> bool {
        match e {
            Expr::Var(_, Var::Bound(i)) => *i < depth || i - depth < limit,
            Expr::Var(_, Var::Free(_)) | Expr::Type(..) | Expr::Meta(..) | Expr::Hole(..) | Expr::Builtin(..) | Expr::Literal(..) => true,
            Expr::App(_, f, args) => go(f, depth, limit) && args.iter().all(|a| go(&a.value, depth, limit)),
            Expr::Pi(_, b, body) | Expr::Lam(_, b, body) => go(&b.ty, depth, limit) && go(body, depth + 1, limit),
            Expr::Let(_, v, b, body) => go(v, depth, limit) && go(&b.ty, depth, limit) && go(body, depth + 1, limit),
            Expr::Ann(_, inner, t) => go(inner, depth, limit) && go(t, depth, limit),
            Expr::Seq(_, xs) => xs.iter().all(|x| go(x, depth, limit)),
            Expr::PrimDict(_, inner) => go(inner, depth, limit),
        }
    }
    go(e, 0, limit)
}

#[cfg(test)]
mod unify_tests {
    use super::*;
    use crate::expr::mk_type;

    #[test]
    fn identical_types_unify() {
        let mut mc = MetaContext::new();
        let p = Provenance::machine();
        let outcome = unify(&mut mc, 0, p, &mk_type(p, 0), &mk_type(p, 0)).unwrap();
        assert!(matches!(outcome, UnifyOutcome::Solved));
    }

    #[test]
    fn mismatched_universes_fail() {
        let mut mc = MetaContext::new();
        let p = Provenance::machine();
        let err = unify(&mut mc, 0, p, &mk_type(p, 0), &mk_type(p, 1)).unwrap_err();
        assert!(matches!(err, TypingError::Mismatch { .. }));
    }

    #[test]
    fn meta_binds_to_concrete_type() {
        let mut mc = MetaContext::new();
        let p = Provenance::machine();
        let m = mc.fresh_meta(mk_type(p, 0), 0, p);
        let outcome = unify(&mut mc, 0, p, &m, &mk_type(p, 0)).unwrap();
        assert!(matches!(outcome, UnifyOutcome::Solved));
    }
}

//! Meta-context and constraint solver (spec §4.3 "Constraint solver").
//!
//! `MetaContext` owns the global meta id counter, the meta-substitution,
//! and the pending constraint list — the one piece of mutable state the
//! elaborator threads through the whole program (spec §5: "the
//! meta-context (elaborator)" is one of exactly three pieces of
//! per-compilation mutable state).

use hashbrown::HashMap;

use crate::builtins::BuiltinOp;
use crate::elaborate::classes;
use crate::elaborate::unify::{self, UnifyOutcome};
use crate::errors::TypingError;
use crate::expr::{CoreExpr, Expr, Var};
use crate::provenance::Provenance;

#[derive(Debug, Clone)]
pub enum ConstraintBase {
    Unify(CoreExpr, CoreExpr),
    /// `Has(meta, class_expr)`: `meta` is solved to a `PrimDict` witness
    /// once `class_expr`'s head is concrete enough to resolve.
    Has(u64, CoreExpr),
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub ctx_depth: usize,
    pub base: ConstraintBase,
    pub prov: Provenance,
}

#[derive(Debug, Default)]
pub struct MetaContext {
    next_meta: u64,
    pub subst: HashMap<u64, CoreExpr>,
    meta_types: HashMap<u64, CoreExpr>,
    meta_depth: HashMap<u64, usize>,
    pending: Vec<Constraint>,
}

impl MetaContext {
    pub fn new() -> Self {
        MetaContext::default()
    }

    pub fn fresh_meta(&mut self, ty: CoreExpr, depth: usize, prov: Provenance) -> CoreExpr {
        let id = self.next_meta;
        self.next_meta += 1;
        self.meta_types.insert(id, ty);
        self.meta_depth.insert(id, depth);
        Expr::Meta(prov, id)
    }

    pub fn meta_depth(&self, id: u64) -> usize {
        self.meta_depth.get(&id).copied().unwrap_or(0)
    }

    pub fn emit_unify(&mut self, ctx_depth: usize, e1: CoreExpr, e2: CoreExpr, prov: Provenance) {
        self.pending.push(Constraint { ctx_depth, base: ConstraintBase::Unify(e1, e2), prov });
    }

    pub fn emit_has(&mut self, ctx_depth: usize, meta: u64, class_expr: CoreExpr, prov: Provenance) {
        self.pending.push(Constraint { ctx_depth, base: ConstraintBase::Has(meta, class_expr), prov });
    }
}

/// Resolves `Meta` nodes through the current substitution, recursively
/// (a solved meta's value may itself mention another now-solved meta).
pub fn apply_meta_subst(mc: &MetaContext, e: &CoreExpr) -> CoreExpr {
    match e {
        Expr::Meta(p, id) => match mc.subst.get(id) {
            Some(resolved) => apply_meta_subst(mc, resolved),
            None => Expr::Meta(*p, *id),
        },
        Expr::Var(..) | Expr::Type(..) | Expr::Hole(..) | Expr::Builtin(..) | Expr::Literal(..) => e.clone(),
        Expr::App(p, f, args) => Expr::App(
            *p,
            Box::new(apply_meta_subst(mc, f)),
            args.iter()
                .map(|a| crate::expr::Argument { value: Box::new(apply_meta_subst(mc, &a.value)), ..a.clone() })
                .collect(),
        ),
        Expr::Pi(p, b, body) => Expr::Pi(*p, subst_binder(mc, b), Box::new(apply_meta_subst(mc, body))),
        Expr::Lam(p, b, body) => Expr::Lam(*p, subst_binder(mc, b), Box::new(apply_meta_subst(mc, body))),
        Expr::Let(p, v, b, body) => {
            Expr::Let(*p, Box::new(apply_meta_subst(mc, v)), subst_binder(mc, b), Box::new(apply_meta_subst(mc, body)))
        }
        Expr::Ann(p, inner, t) => Expr::Ann(*p, Box::new(apply_meta_subst(mc, inner)), Box::new(apply_meta_subst(mc, t))),
        Expr::Seq(p, xs) => Expr::Seq(*p, xs.iter().map(|x| apply_meta_subst(mc, x)).collect()),
        Expr::PrimDict(p, inner) => Expr::PrimDict(*p, Box::new(apply_meta_subst(mc, inner))),
    }
}

fn subst_binder(mc: &MetaContext, b: &crate::expr::Binder<Var>) -> crate::expr::Binder<Var> {
    crate::expr::Binder { ty: Box::new(apply_meta_subst(mc, &b.ty)), ..b.clone() }
}

/// Anchor classes with an unambiguous canonical witness, used to default
/// an otherwise-unconstrained meta when the regular fixpoint stalls (spec
/// §4.3 doesn't specify defaulting; without it a bare numeric literal with
/// no other use, e.g. `1 + 2 == 3`, would never resolve its `IsNatural`
/// constraint — see `DESIGN.md`).
fn default_witness(class: BuiltinOp) -> Option<CoreExpr> {
    use crate::builtins::BuiltinOp::*;
    let p = Provenance::machine();
    match class {
        IsNatural => Some(Expr::Builtin(p, Nat)),
        IsIntegral => Some(Expr::Builtin(p, Int)),
        IsRational | IsReal => Some(Expr::Builtin(p, Real)),
        IsTruth => Some(Expr::Builtin(p, Bool)),
        _ => None,
    }
}

/// Runs the constraint solver to a fixpoint (spec §4.3 pseudocode).
/// Returns `Ok(())` once `pending` is empty, or `UnsolvedConstraints`
/// listing whatever's left after progress (including defaulting) stalls.
pub fn solve(mc: &mut MetaContext) -> Result<(), TypingError> {
    loop {
        if mc.pending.is_empty() {
            return Ok(());
        }
        let constraints = std::mem::take(&mut mc.pending);
        let mut made_progress = false;
        let mut still_stuck = Vec::new();

        for c in constraints {
            match try_solve_one(mc, &c)? {
                true => made_progress = true,
                false => still_stuck.push(c),
            }
        }

        if made_progress {
            // Resolving a constraint above may have pushed fresh
            // sub-constraints onto `mc.pending` (e.g. `classes::resolve`
            // unpacking a container class into its element class).
            let mut next = std::mem::take(&mut mc.pending);
            next.extend(still_stuck);
            mc.pending = next;
            continue;
        }

        // No ordinary progress: try defaulting anchor classes once, then
        // give the stalled constraints one more pass.
        if default_pass(mc, &still_stuck) {
            mc.pending = still_stuck;
            continue;
        }

        return Err(TypingError::UnsolvedConstraints(still_stuck));
    }
}

/// Returns `true` if this constraint made progress (solved itself or was
/// dropped because it's now trivially satisfied), `false` if it's stuck.
fn try_solve_one(mc: &mut MetaContext, c: &Constraint) -> Result<bool, TypingError> {
    match &c.base {
        ConstraintBase::Unify(e1, e2) => {
            let e1 = apply_meta_subst(mc, e1);
            let e2 = apply_meta_subst(mc, e2);
            match unify::unify(mc, c.ctx_depth, c.prov, &e1, &e2)? {
                UnifyOutcome::Solved => Ok(true),
                UnifyOutcome::Deferred => Ok(false),
            }
        }
        ConstraintBase::Has(meta, class_expr) => {
            let class_expr = apply_meta_subst(mc, class_expr);
            match classes::resolve(mc, c.ctx_depth, c.prov, &class_expr)? {
                Some(witness) => {
                    mc.subst.insert(*meta, witness);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }
}

/// One defaulting sweep: for every still-stuck `Has` constraint whose
/// class argument is a bare, still-unresolved `Meta`, and whose class is
/// one of the defaultable anchors, bind that meta to the canonical
/// witness type. Returns whether anything was defaulted.
fn default_pass(mc: &mut MetaContext, stuck: &[Constraint]) -> bool {
    let mut any = false;
    for c in stuck {
        if let ConstraintBase::Has(_, class_expr) = &c.base {
            let class_expr = apply_meta_subst(mc, class_expr);
            if let Expr::App(_, head, args) = &class_expr {
                if let (Expr::Builtin(_, class), [single_arg]) = (head.as_ref(), args.as_slice()) {
                    if let Expr::Meta(_, target) = apply_meta_subst(mc, &single_arg.value) {
                        if !mc.subst.contains_key(&target) {
                            if let Some(witness) = default_witness(*class) {
                                mc.subst.insert(target, witness);
                                any = true;
                            }
                        }
                    }
                }
            }
        }
    }
    any
}

#[cfg(test)]
mod solver_tests {
    use super::*;
    use crate::expr::mk_type;

    #[test]
    fn empty_pending_solves_immediately() {
        let mut mc = MetaContext::new();
        assert!(solve(&mut mc).is_ok());
    }

    #[test]
    fn unify_two_identical_types_solves() {
        let mut mc = MetaContext::new();
        let p = Provenance::machine();
        mc.emit_unify(0, mk_type(p, 0), mk_type(p, 0), p);
        assert!(solve(&mut mc).is_ok());
    }
}

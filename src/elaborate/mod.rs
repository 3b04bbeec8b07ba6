//! Bidirectional elaborator (spec §4.3): `check`/`infer`, implicit/instance
//! argument insertion, and the per-program driver that feeds the resulting
//! constraints to the solver.
//!
//! Follows the "explicit `PassState` by mutable reference" idiom: `Env`
//! accumulates declarations as the program is walked in order, `Ctx` is
//! pushed/popped around each binder exactly like the scope checker's
//! `Locals` stack, and `MetaContext` is threaded through every recursive
//! call as the one piece of state the constraint solver needs afterwards.

pub mod classes;
pub mod context;
pub mod solver;
pub mod unify;

pub use solver::Constraint;

use crate::builtins::{self, BuiltinOp, LiteralFamily};
use crate::debruijn::{lift, subst};
use crate::env::{DeclInfo, Env};
use crate::errors::TypingError;
use crate::expr::{mk_type, Argument, Binder, CoreArgument, CoreExpr, Expr, Literal, Origin, Var, Visibility};
use crate::normalise::whnf;
use crate::program::{CoreDecl, CoreProgram, ScopedDecl, ScopedProgram};
use crate::provenance::Provenance;

use context::Ctx;
use solver::MetaContext;

/// Elaborates every declaration in order, extending `env` as it goes (a
/// definition sees every earlier declaration, per spec §4.2's non-recursive
/// contract), then runs the constraint solver once over the whole program.
pub fn elaborate_program(env: &mut Env, program: &ScopedProgram) -> Result<CoreProgram, TypingError> {
    let mut mc = MetaContext::new();
    let mut ctx = Ctx::new();
    let mut decls = Vec::with_capacity(program.decls.len());

    for decl in &program.decls {
        let elaborated = elaborate_decl(env, &mut mc, &mut ctx, decl)?;
        let info = match &elaborated {
            CoreDecl::Netw { ty, .. } => DeclInfo { ty: ty.clone(), body: None, is_network: true },
            CoreDecl::Data { ty, .. } => DeclInfo { ty: ty.clone(), body: None, is_network: false },
            CoreDecl::Def { ty, body, .. } => DeclInfo { ty: ty.clone(), body: Some(body.clone()), is_network: false },
        };
        env.insert(elaborated.id().clone(), info);
        decls.push(elaborated);
    }

    solver::solve(&mut mc)?;

    let resolved = decls.into_iter().map(|d| resolve_decl(&mc, d)).collect();
    Ok(CoreProgram { decls: resolved })
}

fn elaborate_decl(env: &Env, mc: &mut MetaContext, ctx: &mut Ctx, decl: &ScopedDecl) -> Result<CoreDecl, TypingError> {
    match decl {
        ScopedDecl::Netw { prov, id, ty } => {
            let (ty_elab, _) = infer(env, mc, ctx, ty)?;
            Ok(CoreDecl::Netw { prov: *prov, id: id.clone(), ty: ty_elab })
        }
        ScopedDecl::Data { prov, id, ty } => {
            let (ty_elab, _) = infer(env, mc, ctx, ty)?;
            Ok(CoreDecl::Data { prov: *prov, id: id.clone(), ty: ty_elab })
        }
        ScopedDecl::Def { prov, id, ty: None, body } => {
            let (body_elab, body_ty) = infer(env, mc, ctx, body)?;
            Ok(CoreDecl::Def { prov: *prov, id: id.clone(), ty: body_ty, body: body_elab })
        }
        ScopedDecl::Def { prov, id, ty: Some(ty), body } => {
            let (ty_elab, _) = infer(env, mc, ctx, ty)?;
            let body_elab = check(env, mc, ctx, &ty_elab, body)?;
            Ok(CoreDecl::Def { prov: *prov, id: id.clone(), ty: ty_elab, body: body_elab })
        }
    }
}

fn resolve_decl(mc: &MetaContext, decl: CoreDecl) -> CoreDecl {
    match decl {
        CoreDecl::Netw { prov, id, ty } => CoreDecl::Netw { prov, id, ty: solver::apply_meta_subst(mc, &ty) },
        CoreDecl::Data { prov, id, ty } => CoreDecl::Data { prov, id, ty: solver::apply_meta_subst(mc, &ty) },
        CoreDecl::Def { prov, id, ty, body } => {
            CoreDecl::Def { prov, id, ty: solver::apply_meta_subst(mc, &ty), body: solver::apply_meta_subst(mc, &body) }
        }
    }
}

/// `check(T, e) -> e'` (spec §4.3, check rules 1-5).
pub fn check(env: &Env, mc: &mut MetaContext, ctx: &mut Ctx, expected: &CoreExpr, term: &CoreExpr) -> Result<CoreExpr, TypingError> {
    let expected_head = whnf(env, expected);

    // Rule 1: matching-visibility Lam against a Pi. An unannotated
    // parameter (surface `\x. body`, scoped to a `Hole`) adopts the
    // expected binder type outright rather than unifying against it —
    // a `Hole` carries no information to unify with.
    if let (Expr::Pi(_, b_pi, t_res), Expr::Lam(p, b_lam, body)) = (&expected_head, term) {
        if b_pi.visibility == b_lam.visibility {
            if !matches!(&*b_lam.ty, Expr::Hole(..)) {
                mc.emit_unify(ctx.depth(), (*b_lam.ty).clone(), (*b_pi.ty).clone(), b_lam.prov);
            }
            let binder = Binder { ty: Box::new((*b_pi.ty).clone()), ..b_lam.clone() };
            ctx.push((*b_pi.ty).clone());
            let checked = check(env, mc, ctx, t_res, body);
            ctx.pop();
            return Ok(Expr::Lam(*p, binder, Box::new(checked?)));
        }
    }

    // Rule 2: leading implicit/instance Pi against a term that isn't the
    // matching lambda — insert a machine-written binder and recurse.
    if let Expr::Pi(p_pi, b_pi, t_res) = &expected_head {
        if !b_pi.visibility.is_explicit() {
            let matches_lambda = matches!(term, Expr::Lam(_, b, _) if b.visibility == b_pi.visibility);
            if !matches_lambda {
                let new_binder = Binder::mk(*p_pi, Origin::TheMachine, b_pi.visibility, None, (*b_pi.ty).clone());
                let lifted_term = lift(1, 0, term);
                ctx.push((*b_pi.ty).clone());
                let inner = check(env, mc, ctx, t_res, &lifted_term);
                ctx.pop();
                return Ok(Expr::Lam(*p_pi, new_binder, Box::new(inner?)));
            }
        }
    }

    // Rule 3: a Lam can only check against a Pi.
    if let Expr::Lam(p, ..) = term {
        if !matches!(expected_head, Expr::Pi(..)) {
            return Err(TypingError::Mismatch { actual: Box::new(term.clone()), expected: Box::new(expected.clone()), prov: *p });
        }
    }

    // Rule 4: a surface hole becomes a fresh meta typed at the expectation.
    if let Expr::Hole(p, _name) = term {
        return Ok(mc.fresh_meta(expected.clone(), ctx.depth(), *p));
    }

    // Rule 5: fall through to infer, fire implicit insertion, unify.
    let (inferred_term, inferred_ty) = infer(env, mc, ctx, term)?;
    let (final_term, final_ty) = via_infer(env, mc, ctx, inferred_term, inferred_ty, term.prov())?;
    mc.emit_unify(ctx.depth(), final_ty, expected.clone(), term.prov());
    Ok(final_term)
}

/// `viaInfer`: fires implicit/instance insertion against zero user-supplied
/// arguments, so a bare polymorphic literal/builtin/variable gets its
/// leading implicit Pis instantiated the same way an applied one would.
fn via_infer(env: &Env, mc: &mut MetaContext, ctx: &mut Ctx, term: CoreExpr, ty: CoreExpr, prov: Provenance) -> Result<(CoreExpr, CoreExpr), TypingError> {
    let (inserted, result_ty) = infer_args(env, mc, ctx, prov, ty, &[])?;
    Ok((Expr::apply(prov, term, inserted), result_ty))
}

/// `infer(e) -> (e', T)` (spec §4.3, infer rules).
pub fn infer(env: &Env, mc: &mut MetaContext, ctx: &mut Ctx, term: &CoreExpr) -> Result<(CoreExpr, CoreExpr), TypingError> {
    match term {
        Expr::Type(p, l) => Ok((term.clone(), Expr::Type(*p, l + 1))),

        Expr::Var(_, Var::Bound(i)) => match ctx.lookup(*i) {
            Some(ty) => Ok((term.clone(), ty)),
            None => crate::errors::bug("Bound index escaped the local context it was checked in"),
        },
        Expr::Var(_, Var::Free(id)) => match env.ty_of(id) {
            Some(ty) => Ok((term.clone(), ty.clone())),
            None => crate::errors::bug("Free identifier escaped scope checking without a declaration"),
        },

        Expr::Meta(..) => crate::errors::bug("a bare Meta reached infer before elaboration produced it"),
        Expr::Hole(p, name) => Err(TypingError::UnresolvedHole { name: name.clone(), prov: *p }),

        Expr::Builtin(p, op) => Ok((term.clone(), builtins::type_of_builtin(*p, *op))),
        Expr::Literal(p, lit) => Ok((term.clone(), builtins::type_of_literal(*p, literal_family(*lit)))),

        Expr::App(p, f, args) => {
            let (f_term, f_ty) = infer(env, mc, ctx, f)?;
            let (all_args, result_ty) = infer_args(env, mc, ctx, *p, f_ty, args)?;
            Ok((Expr::apply(*p, f_term, all_args), result_ty))
        }

        Expr::Pi(p, b, body) => {
            let (ty_elab, ty_univ) = infer(env, mc, ctx, &b.ty)?;
            ctx.push(ty_elab.clone());
            let body_res = infer(env, mc, ctx, body);
            ctx.pop();
            let (body_elab, body_univ) = body_res?;
            let level = universe_level(env, &ty_univ).max(universe_level(env, &body_univ));
            Ok((Expr::Pi(*p, Binder { ty: Box::new(ty_elab), ..b.clone() }, Box::new(body_elab)), Expr::Type(*p, level)))
        }

        Expr::Lam(p, b, body) => {
            let (ty_elab, _) = infer(env, mc, ctx, &b.ty)?;
            ctx.push(ty_elab.clone());
            let body_res = infer(env, mc, ctx, body);
            ctx.pop();
            let (body_elab, body_ty) = body_res?;
            let binder = Binder { ty: Box::new(ty_elab), ..b.clone() };
            let pi_ty = Expr::Pi(*p, binder.clone(), Box::new(body_ty));
            Ok((Expr::Lam(*p, binder, Box::new(body_elab)), pi_ty))
        }

        Expr::Let(p, v, b, body) => {
            let (v_elab, v_ty) = match &*b.ty {
                Expr::Hole(..) => infer(env, mc, ctx, v)?,
                annotated => {
                    let (ty_elab, _) = infer(env, mc, ctx, annotated)?;
                    let checked = check(env, mc, ctx, &ty_elab, v)?;
                    (checked, ty_elab)
                }
            };
            ctx.push(v_ty.clone());
            let body_res = infer(env, mc, ctx, body);
            ctx.pop();
            let (body_elab, body_ty) = body_res?;
            let binder = Binder { ty: Box::new(v_ty), ..b.clone() };
            Ok((Expr::Let(*p, Box::new(v_elab), binder, Box::new(body_elab)), body_ty))
        }

        Expr::Ann(p, inner, ty) => {
            let (ty_elab, _) = infer(env, mc, ctx, ty)?;
            let inner_checked = check(env, mc, ctx, &ty_elab, inner)?;
            Ok((Expr::Ann(*p, Box::new(inner_checked), Box::new(ty_elab.clone())), ty_elab))
        }

        Expr::Seq(p, xs) => infer_seq(env, mc, ctx, *p, xs),

        Expr::PrimDict(p, inner) => {
            let (inner_elab, inner_ty) = infer(env, mc, ctx, inner)?;
            Ok((Expr::PrimDict(*p, Box::new(inner_elab)), inner_ty))
        }
    }
}

fn infer_seq(env: &Env, mc: &mut MetaContext, ctx: &mut Ctx, p: Provenance, xs: &[CoreExpr]) -> Result<(CoreExpr, CoreExpr), TypingError> {
    let elem_meta = mc.fresh_meta(mk_type(p, 0), ctx.depth(), p);

    let elab_elems = if xs.is_empty() {
        Vec::new()
    } else {
        let (first_elab, first_ty) = infer(env, mc, ctx, &xs[0])?;
        mc.emit_unify(ctx.depth(), elem_meta.clone(), first_ty.clone(), xs[0].prov());
        let mut out = Vec::with_capacity(xs.len());
        out.push(first_elab);
        for x in &xs[1..] {
            let (x_elab, x_ty) = infer(env, mc, ctx, x)?;
            mc.emit_unify(ctx.depth(), x_ty, first_ty.clone(), x.prov());
            out.push(x_elab);
        }
        out
    };

    let cont_meta = mc.fresh_meta(mk_type(p, 0), ctx.depth(), p);
    let class_expr = class_app2(p, BuiltinOp::IsContainer, elem_meta, cont_meta.clone());
    let witness_meta = mc.fresh_meta(class_expr.clone(), ctx.depth(), p);
    mc.emit_has(ctx.depth(), meta_id_of(&witness_meta), class_expr, p);

    Ok((Expr::Seq(p, elab_elems), cont_meta))
}

/// `inferArgs`: walks `fun_ty`'s leading Pi chain, inserting a fresh
/// machine meta (plus a `Has` constraint, if the binder is an instance)
/// for every leading implicit/instance binder that doesn't line up with
/// the next user-supplied argument, and checking each user argument
/// against its expected binder type as it's consumed.
fn infer_args(
    env: &Env,
    mc: &mut MetaContext,
    ctx: &mut Ctx,
    prov: Provenance,
    fun_ty: CoreExpr,
    user_args: &[CoreArgument],
) -> Result<(Vec<CoreArgument>, CoreExpr), TypingError> {
    let mut out_args = Vec::new();
    let mut cur_ty = fun_ty;
    let mut i = 0;

    loop {
        let head = whnf(env, &cur_ty);
        let Expr::Pi(p, b, body) = head else { break };

        let next_matches = i < user_args.len() && user_args[i].visibility == b.visibility;

        if !b.visibility.is_explicit() && !next_matches {
            let meta = mc.fresh_meta((*b.ty).clone(), ctx.depth(), p);
            if b.visibility == Visibility::Instance {
                mc.emit_has(ctx.depth(), meta_id_of(&meta), (*b.ty).clone(), p);
            }
            out_args.push(Argument::mk(p, Origin::TheMachine, b.visibility, meta.clone()));
            cur_ty = subst(&body, &meta);
            continue;
        }

        if next_matches {
            let checked = check(env, mc, ctx, &b.ty, &user_args[i].value)?;
            out_args.push(Argument { value: Box::new(checked.clone()), ..user_args[i].clone() });
            cur_ty = subst(&body, &checked);
            i += 1;
            continue;
        }

        if i < user_args.len() {
            return Err(TypingError::MissingExplicitArg { expected_ty: Box::new((*b.ty).clone()), prov: user_args[i].prov });
        }
        cur_ty = Expr::Pi(p, b, body);
        break;
    }

    if i < user_args.len() {
        return Err(TypingError::MissingExplicitArg { expected_ty: Box::new(cur_ty), prov: user_args[i].prov });
    }
    Ok((out_args, cur_ty))
}

fn literal_family(lit: Literal) -> LiteralFamily {
    match lit {
        Literal::Bool(_) => LiteralFamily::Bool,
        Literal::Nat(_) => LiteralFamily::Nat,
        Literal::Int(_) => LiteralFamily::Int,
        Literal::Rat(..) => LiteralFamily::Rat,
    }
}

fn universe_level(env: &Env, ty: &CoreExpr) -> u32 {
    match whnf(env, ty) {
        Expr::Type(_, l) => l,
        _ => 0,
    }
}

fn class_app2(prov: Provenance, class: BuiltinOp, a: CoreExpr, b: CoreExpr) -> CoreExpr {
    Expr::apply(prov, Expr::Builtin(prov, class), vec![Argument::explicit(prov, a), Argument::explicit(prov, b)])
}

fn meta_id_of(e: &CoreExpr) -> u64 {
    match e {
        Expr::Meta(_, id) => *id,
        _ => crate::errors::bug("fresh_meta did not return a Meta node"),
    }
}

#[cfg(test)]
mod elaborate_tests {
    use super::*;
    use crate::expr::mk_bound;
    use crate::name::Ident;

    fn p() -> Provenance {
        Provenance::machine()
    }

    #[test]
    fn infer_builtin_returns_its_scheme() {
        let env = Env::new();
        let mut mc = MetaContext::new();
        let mut ctx = Ctx::new();
        let (_, ty) = infer(&env, &mut mc, &mut ctx, &Expr::Builtin(p(), BuiltinOp::Nat)).unwrap();
        assert_eq!(ty, Expr::Type(p(), 0));
    }

    #[test]
    fn infer_free_var_looks_up_declared_type() {
        let mut env = Env::new();
        let id = Ident::mk("f");
        env.insert(id.clone(), DeclInfo { ty: Expr::Builtin(p(), BuiltinOp::Nat), body: None, is_network: true });
        let mut mc = MetaContext::new();
        let mut ctx = Ctx::new();
        let (_, ty) = infer(&env, &mut mc, &mut ctx, &Expr::Var(p(), Var::Free(id))).unwrap();
        assert_eq!(ty, Expr::Builtin(p(), BuiltinOp::Nat));
    }

    #[test]
    fn check_hole_allocates_a_meta_at_the_expected_type() {
        let env = Env::new();
        let mut mc = MetaContext::new();
        let mut ctx = Ctx::new();
        let expected = Expr::Builtin(p(), BuiltinOp::Nat);
        let hole = Expr::Hole(p(), crate::name::Symbol::mk("n"));
        let result = check(&env, &mut mc, &mut ctx, &expected, &hole).unwrap();
        assert!(matches!(result, Expr::Meta(..)));
    }

    #[test]
    fn literal_fold_elaborates_and_solves() {
        // `1 + 2 == 3` should elaborate with a solvable set of constraints
        // (spec §8 S1): IsNatural defaults to Nat, IsTruth defaults to Bool.
        let env = Env::new();
        let mut mc = MetaContext::new();
        let mut ctx = Ctx::new();
        let one = Expr::Literal(p(), Literal::Nat(1));
        let two = Expr::Literal(p(), Literal::Nat(2));
        let three = Expr::Literal(p(), Literal::Nat(3));
        let sum = Expr::apply(p(), Expr::Builtin(p(), BuiltinOp::Add), vec![Argument::explicit(p(), one), Argument::explicit(p(), two)]);
        let eq = Expr::apply(p(), Expr::Builtin(p(), BuiltinOp::Eq), vec![Argument::explicit(p(), sum), Argument::explicit(p(), three)]);
        let (_, _ty) = infer(&env, &mut mc, &mut ctx, &eq).unwrap();
        assert!(solver::solve(&mut mc).is_ok());
    }

    #[test]
    fn bound_var_without_annotation_leaves_unresolved_constraints() {
        // spec §8 S4: `every x. x == x` with no annotation on `x` should
        // leave HasEq/IsQuantify stuck on the shared meta for x's type.
        let env = Env::new();
        let mut mc = MetaContext::new();
        let mut ctx = Ctx::new();
        let x = mk_bound(p(), 0);
        let eq_xx = Expr::apply(p(), Expr::Builtin(p(), BuiltinOp::Eq), vec![Argument::explicit(p(), x.clone()), Argument::explicit(p(), x)]);
        let x_meta = mc.fresh_meta(mk_type(p(), 0), 0, p());
        let pred = Expr::Lam(p(), Binder::mk(p(), Origin::UserWritten, Visibility::Explicit, None, x_meta), Box::new(eq_xx));
        let every_pred = Expr::apply(p(), Expr::Builtin(p(), BuiltinOp::Every), vec![Argument::explicit(p(), pred)]);
        let _ = check(&env, &mut mc, &mut ctx, &Expr::Builtin(p(), BuiltinOp::Prop), &every_pred).unwrap();
        assert!(matches!(solver::solve(&mut mc), Err(TypingError::UnsolvedConstraints(_))));
    }
}

//! Type-class resolution (spec §4.3.2): closed rule sets mapping concrete
//! head types to a witness dictionary, for each of the nine builtin
//! classes. If a class's argument is still a `Meta` after substitution,
//! resolution reports "stuck" (`Ok(None)`) rather than failing — the
//! solver's fixpoint loop will retry once something else pins it down.

use crate::builtins::BuiltinOp;
use crate::elaborate::solver::{apply_meta_subst, MetaContext};
use crate::errors::TypingError;
use crate::expr::{mk_type, Argument, CoreExpr, Expr};
use crate::provenance::Provenance;

/// `class_expr` is the (meta-substituted) applied class, e.g.
/// `App(Builtin(HasEq), [Nat])` or `App(Builtin(IsContainer), [Real, List Real])`.
/// Returns `Ok(Some(witness))` on success, `Ok(None)` if stuck, `Err` if
/// the class can never admit this head.
pub fn resolve(mc: &mut MetaContext, depth: usize, prov: Provenance, class_expr: &CoreExpr) -> Result<Option<CoreExpr>, TypingError> {
    let (head, args) = class_expr.decompose();
    let class = match head {
        Expr::Builtin(_, op) if op.is_class() => *op,
        _ => crate::errors::bug("Has constraint's class position is not a class builtin"),
    };

    // `IsContainer` can make progress with only one side concrete, in
    // either direction, so it gets to look at its arguments before the
    // generic "any meta ⇒ stuck" gate below — an empty sequence literal
    // (`[]`) has no element to infer a type from, so `elem` stays a bare
    // meta until the *container* side (pinned some other way, e.g. by the
    // binder it's checked against) fixes it (spec §8 S5 needs this to
    // reach the normaliser at all).
    if class == BuiltinOp::IsContainer {
        return resolve_is_container(mc, prov, class_expr, args);
    }

    if args.iter().any(|a| matches!(apply_meta_subst(mc, &a.value), Expr::Meta(..))) {
        return Ok(None);
    }

    match class {
        BuiltinOp::HasEq => resolve_eq_ord(mc, depth, prov, BuiltinOp::HasEq, args),
        BuiltinOp::HasOrd => resolve_eq_ord(mc, depth, prov, BuiltinOp::HasOrd, args),
        BuiltinOp::IsTruth => resolve_closed_set(class_expr, args, &[BuiltinOp::Bool, BuiltinOp::Prop]),
        BuiltinOp::IsNatural => resolve_numeric(mc, depth, prov, class_expr, args, NumericFloor::Natural),
        BuiltinOp::IsIntegral => resolve_numeric(mc, depth, prov, class_expr, args, NumericFloor::Integral),
        BuiltinOp::IsRational | BuiltinOp::IsReal => resolve_numeric(mc, depth, prov, class_expr, args, NumericFloor::Rational),
        BuiltinOp::IsQuantify => resolve_is_quantify(class_expr, args),
        _ => crate::errors::bug("non-class builtin reached class resolution"),
    }
}

enum NumericFloor {
    Natural,
    Integral,
    Rational,
}

fn witness(prov: Provenance, class_expr: &CoreExpr) -> CoreExpr {
    Expr::PrimDict(prov, Box::new(class_expr.clone()))
}

fn resolve_closed_set(class_expr: &CoreExpr, args: &[Argument<crate::expr::Var>], admitted: &[BuiltinOp]) -> Result<Option<CoreExpr>, TypingError> {
    let prov = class_expr.prov();
    let [target] = args else {
        crate::errors::bug("unary class constraint without exactly one argument");
    };
    match &*target.value {
        Expr::Builtin(_, op) if admitted.contains(op) => Ok(Some(witness(prov, class_expr))),
        other => Err(TypingError::Mismatch { actual: Box::new(other.clone()), expected: Box::new(class_expr.clone()), prov }),
    }
}

/// `HasEq`/`HasOrd` admit the scalar types directly, and recurse into
/// `List`/`Tensor` element types (so `HasEq (List Nat)` reduces to
/// `HasEq Nat`, emitted as a fresh sub-constraint).
fn resolve_eq_ord(mc: &mut MetaContext, depth: usize, prov: Provenance, class: BuiltinOp, args: &[Argument<crate::expr::Var>]) -> Result<Option<CoreExpr>, TypingError> {
    let [target] = args else {
        crate::errors::bug("HasEq/HasOrd constraint without exactly one argument");
    };
    let scalars: &[BuiltinOp] = match class {
        BuiltinOp::HasEq => &[BuiltinOp::Bool, BuiltinOp::Prop, BuiltinOp::Nat, BuiltinOp::Int, BuiltinOp::Real],
        _ => &[BuiltinOp::Nat, BuiltinOp::Int, BuiltinOp::Real],
    };
    let class_expr = class_app1(prov, class, (*target.value).clone());
    match target.value.decompose() {
        (Expr::Builtin(_, op), []) if scalars.contains(op) => Ok(Some(witness(prov, &class_expr))),
        (Expr::Builtin(_, BuiltinOp::List), [elem]) => {
            let sub_meta = mc.fresh_meta(mk_type(elem.value.prov(), 0), depth, prov);
            let sub_meta_id = meta_id(&sub_meta);
            mc.emit_has(depth, sub_meta_id, class_app1(prov, class, (*elem.value).clone()), prov);
            Ok(Some(witness(prov, &class_expr)))
        }
        (Expr::Builtin(_, BuiltinOp::Tensor), [elem, _dims]) => {
            let sub_meta = mc.fresh_meta(mk_type(elem.value.prov(), 0), depth, prov);
            let sub_meta_id = meta_id(&sub_meta);
            mc.emit_has(depth, sub_meta_id, class_app1(prov, class, (*elem.value).clone()), prov);
            Ok(Some(witness(prov, &class_expr)))
        }
        _ => Err(TypingError::Mismatch { actual: Box::new((*target.value).clone()), expected: Box::new(class_expr), prov }),
    }
}

fn resolve_numeric(
    mc: &mut MetaContext,
    depth: usize,
    prov: Provenance,
    class_expr: &CoreExpr,
    args: &[Argument<crate::expr::Var>],
    floor: NumericFloor,
) -> Result<Option<CoreExpr>, TypingError> {
    let [target] = args else {
        crate::errors::bug("unary numeric class constraint without exactly one argument");
    };
    let admitted: &[BuiltinOp] = match floor {
        NumericFloor::Natural => &[BuiltinOp::Nat, BuiltinOp::Int, BuiltinOp::Real],
        NumericFloor::Integral => &[BuiltinOp::Int, BuiltinOp::Real],
        NumericFloor::Rational => &[BuiltinOp::Real],
    };
    let (head, rest) = target.value.decompose();
    match (head, rest) {
        (Expr::Builtin(_, op), []) if admitted.contains(op) => Ok(Some(witness(prov, class_expr))),
        (Expr::Builtin(_, BuiltinOp::List), [elem]) | (Expr::Builtin(_, BuiltinOp::Tensor), [elem, ..]) => {
            let class_name = class_of_floor(&floor);
            let sub_meta = mc.fresh_meta(mk_type(elem.value.prov(), 0), depth, prov);
            let sub_meta_id = meta_id(&sub_meta);
            mc.emit_has(depth, sub_meta_id, class_app1(prov, class_name, (*elem.value).clone()), prov);
            Ok(Some(witness(prov, class_expr)))
        }
        _ => Err(TypingError::Mismatch { actual: Box::new((*target.value).clone()), expected: Box::new(class_expr.clone()), prov }),
    }
}

fn class_of_floor(floor: &NumericFloor) -> BuiltinOp {
    match floor {
        NumericFloor::Natural => BuiltinOp::IsNatural,
        NumericFloor::Integral => BuiltinOp::IsIntegral,
        NumericFloor::Rational => BuiltinOp::IsRational,
    }
}

/// `elem` and `cont` can each independently be concrete or still a bare
/// meta. Whichever side is concrete drives the other: a concrete `cont`
/// (`List X`/`Tensor X _`) pins `elem := X`; a concrete `elem` with `cont`
/// still open defaults `cont := List elem` (there's no tensor shape to
/// recover a rank from, so list is the only sound default). If both sides
/// are still open, resolution is stuck, not wrong.
fn resolve_is_container(mc: &mut MetaContext, prov: Provenance, class_expr: &CoreExpr, args: &[Argument<crate::expr::Var>]) -> Result<Option<CoreExpr>, TypingError> {
    let [elem, cont] = args else {
        crate::errors::bug("IsContainer constraint without exactly two arguments");
    };
    let elem_r = apply_meta_subst(mc, &elem.value);
    let cont_r = apply_meta_subst(mc, &cont.value);
    let elem_meta = match &elem_r {
        Expr::Meta(_, id) => Some(*id),
        _ => None,
    };

    match cont_r.decompose() {
        (Expr::Builtin(_, BuiltinOp::List), [list_elem]) => match elem_meta {
            Some(id) => {
                mc.subst.insert(id, (*list_elem.value).clone());
                Ok(Some(witness(prov, class_expr)))
            }
            None if crate::debruijn::alpha_eq(&list_elem.value, &elem_r) => Ok(Some(witness(prov, class_expr))),
            None => Err(TypingError::Mismatch { actual: Box::new(cont_r.clone()), expected: Box::new(class_expr.clone()), prov }),
        },
        (Expr::Builtin(_, BuiltinOp::Tensor), [tensor_elem, _dims]) => match elem_meta {
            Some(id) => {
                mc.subst.insert(id, (*tensor_elem.value).clone());
                Ok(Some(witness(prov, class_expr)))
            }
            None if crate::debruijn::alpha_eq(&tensor_elem.value, &elem_r) => Ok(Some(witness(prov, class_expr))),
            None => Err(TypingError::Mismatch { actual: Box::new(cont_r.clone()), expected: Box::new(class_expr.clone()), prov }),
        },
        (Expr::Meta(_, cont_id), []) => match elem_meta {
            None => {
                let list_ty = Expr::apply(prov, Expr::Builtin(prov, BuiltinOp::List), vec![Argument::explicit(prov, elem_r.clone())]);
                mc.subst.insert(*cont_id, list_ty);
                Ok(Some(witness(prov, class_expr)))
            }
            // Both sides still open: genuinely stuck, not unsatisfiable.
            Some(_) => Ok(None),
        },
        _ => Err(TypingError::Mismatch { actual: Box::new(cont_r.clone()), expected: Box::new(class_expr.clone()), prov }),
    }
}

/// Domains `every`/`some` can range over: the scalar numeric/boolean
/// types and tensors of them (finite or externally-bounded by a solver).
fn resolve_is_quantify(class_expr: &CoreExpr, args: &[Argument<crate::expr::Var>]) -> Result<Option<CoreExpr>, TypingError> {
    let prov = class_expr.prov();
    let [target] = args else {
        crate::errors::bug("IsQuantify constraint without exactly one argument");
    };
    match target.value.decompose() {
        (Expr::Builtin(_, BuiltinOp::Bool | BuiltinOp::Nat | BuiltinOp::Int | BuiltinOp::Real), []) => Ok(Some(witness(prov, class_expr))),
        (Expr::Builtin(_, BuiltinOp::Tensor), [_, _]) => Ok(Some(witness(prov, class_expr))),
        _ => Err(TypingError::Mismatch { actual: Box::new((*target.value).clone()), expected: Box::new(class_expr.clone()), prov }),
    }
}

fn class_app1(prov: Provenance, class: BuiltinOp, arg: CoreExpr) -> CoreExpr {
    Expr::apply(prov, Expr::Builtin(prov, class), vec![Argument::explicit(prov, arg)])
}

fn meta_id(e: &CoreExpr) -> u64 {
    match e {
        Expr::Meta(_, id) => *id,
        _ => crate::errors::bug("fresh_meta did not return a Meta node"),
    }
}

#[cfg(test)]
mod classes_tests {
    use super::*;
    use crate::expr::mk_type;

    #[test]
    fn is_truth_admits_bool_and_prop() {
        let mut mc = MetaContext::new();
        let p = Provenance::machine();
        let bool_expr = class_app1(p, BuiltinOp::IsTruth, Expr::Builtin(p, BuiltinOp::Bool));
        assert!(resolve(&mut mc, 0, p, &bool_expr).unwrap().is_some());
        let prop_expr = class_app1(p, BuiltinOp::IsTruth, Expr::Builtin(p, BuiltinOp::Prop));
        assert!(resolve(&mut mc, 0, p, &prop_expr).unwrap().is_some());
        let nat_expr = class_app1(p, BuiltinOp::IsTruth, Expr::Builtin(p, BuiltinOp::Nat));
        assert!(resolve(&mut mc, 0, p, &nat_expr).is_err());
    }

    #[test]
    fn is_natural_stuck_on_bare_meta() {
        let mut mc = MetaContext::new();
        let p = Provenance::machine();
        let m = mc.fresh_meta(mk_type(p, 0), 0, p);
        let expr = class_app1(p, BuiltinOp::IsNatural, m);
        assert!(resolve(&mut mc, 0, p, &expr).unwrap().is_none());
    }
}

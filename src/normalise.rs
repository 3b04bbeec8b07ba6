//! Normaliser (spec §4.4): evaluates an elaborated, constraint-free program
//! to normal form using beta/delta/let/ann reduction plus the closed set of
//! builtin reduction rules.
//!
//! `whnf` reduces only as far as the outermost constructor — the elaborator
//! uses it to peek at a type's head shape (is it a `Pi`? already a rigid
//! `Builtin`?) without paying for a full normalisation. `normalise` recurses
//! into every subterm and is what the compiler driver calls between
//! elaboration and VNNLib lowering.

use crate::builtins::BuiltinOp;
use crate::debruijn::subst;
use crate::env::Env;
use crate::errors::NormError;
use crate::expr::{Argument, CoreExpr, Expr, Literal, Var, Visibility};

type NormResult<T> = Result<T, NormError>;

/// Reduces `e` to weak head normal form: enough to see whether the result
/// is a `Pi`, a rigid `Builtin`/`Literal`, etc., without normalising under
/// binders or inside already-irreducible argument positions.
pub fn whnf(env: &Env, e: &CoreExpr) -> CoreExpr {
    match e {
        Expr::Let(_, v, _, body) => whnf(env, &subst(body, v)),
        Expr::Ann(_, inner, _) => whnf(env, inner),
        Expr::Var(_, Var::Free(id)) => match env.body_of(id) {
            Some(body) => whnf(env, body),
            None => e.clone(),
        },
        Expr::App(p, f, args) => {
            let f_whnf = whnf(env, f);
            if let Expr::Lam(_, _, body) = &f_whnf {
                if let Some((first, rest)) = args.split_first() {
                    let reduced = subst(body, &first.value);
                    let reapplied = Expr::apply(*p, reduced, rest.to_vec());
                    return whnf(env, &reapplied);
                }
            }
            Expr::apply(*p, f_whnf, args.clone())
        }
        _ => e.clone(),
    }
}

/// Full normal form: recurses into every subterm, folds builtin
/// applications over literal operands, and reduces container primitives.
/// Returns `EmptyQuantifierDomain` if a quantifier's domain normalises to
/// an empty sequence.
pub fn normalise(env: &Env, e: &CoreExpr) -> NormResult<CoreExpr> {
    match e {
        Expr::Type(..) | Expr::Var(_, Var::Bound(_)) | Expr::Meta(..) | Expr::Hole(..) | Expr::Builtin(..) | Expr::Literal(..) => Ok(e.clone()),
        Expr::Var(_, Var::Free(id)) => match env.body_of(id) {
            Some(body) => normalise(env, body),
            None => Ok(e.clone()),
        },
        Expr::Ann(_, inner, _) => normalise(env, inner),
        Expr::Let(p, v, b, body) => {
            let v = normalise(env, v)?;
            // A `let` binding a network application is left in place rather
            // than inlined: the VNNLib backend (spec §4.5) pattern-matches
            // exactly this shape to rewrite it around magic input/output
            // variables, and that rewrite has to see the let boundary before
            // it's erased. Every other let (including ones whose value
            // happens to mention a network indirectly) still inlines.
            if is_opaque_network_app(env, &v) {
                let ty = normalise(env, &b.ty)?;
                let body = normalise(env, body)?;
                return Ok(Expr::Let(*p, Box::new(v), crate::expr::Binder { ty: Box::new(ty), ..b.clone() }, Box::new(body)));
            }
            normalise(env, &subst(body, &v))
        }
        Expr::Pi(p, b, body) => {
            let ty = normalise(env, &b.ty)?;
            let body = normalise(env, body)?;
            Ok(Expr::Pi(*p, crate::expr::Binder { ty: Box::new(ty), ..b.clone() }, Box::new(body)))
        }
        Expr::Lam(p, b, body) => {
            let ty = normalise(env, &b.ty)?;
            let body = normalise(env, body)?;
            Ok(Expr::Lam(*p, crate::expr::Binder { ty: Box::new(ty), ..b.clone() }, Box::new(body)))
        }
        Expr::Seq(p, xs) => {
            let xs = xs.iter().map(|x| normalise(env, x)).collect::<NormResult<Vec<_>>>()?;
            Ok(Expr::Seq(*p, xs))
        }
        Expr::PrimDict(p, inner) => Ok(Expr::PrimDict(*p, Box::new(normalise(env, inner)?))),
        Expr::App(p, f, args) => {
            let f = normalise(env, f)?;
            let mut norm_args = Vec::with_capacity(args.len());
            for a in args {
                norm_args.push(Argument { value: Box::new(normalise(env, &a.value)?), ..a.clone() });
            }
            normalise_app(env, *p, f, norm_args)
        }
    }
}

fn normalise_app(env: &Env, p: crate::provenance::Provenance, f: CoreExpr, args: Vec<Argument<Var>>) -> NormResult<CoreExpr> {
    // Beta: a Lam applied to at least one argument.
    if let Expr::Lam(_, _, body) = &f {
        if let Some((first, rest)) = args.split_first() {
            let reduced = subst(body, &first.value);
            let reapplied = Expr::apply(p, reduced, rest.to_vec());
            return normalise(env, &reapplied);
        }
    }

    if let Expr::Builtin(_, op) = &f {
        if let Some(reduced) = reduce_builtin(env, p, *op, &args)? {
            return Ok(reduced);
        }
    }

    Ok(Expr::apply(p, f, args))
}

fn is_opaque_network_app(env: &Env, v: &CoreExpr) -> bool {
    matches!(v.decompose(), (Expr::Var(_, Var::Free(id)), [_]) if env.get(id).map_or(false, |d| d.is_network))
}

fn as_literal(e: &CoreExpr) -> Option<Literal> {
    match e {
        Expr::Literal(_, l) => Some(*l),
        _ => None,
    }
}

fn as_seq(e: &CoreExpr) -> Option<&[CoreExpr]> {
    match e {
        Expr::Seq(_, xs) => Some(xs.as_slice()),
        _ => None,
    }
}

/// Picks out the first explicit argument positions, skipping any
/// machine-inserted implicit/instance arguments inserted by the
/// elaborator — the normaliser only ever reduces on explicit operands.
fn explicit_args(args: &[Argument<Var>]) -> Vec<&Argument<Var>> {
    args.iter().filter(|a| a.visibility == Visibility::Explicit).collect()
}

fn bool_lit(p: crate::provenance::Provenance, b: bool) -> CoreExpr {
    Expr::Literal(p, Literal::Bool(b))
}

fn reduce_builtin(env: &Env, p: crate::provenance::Provenance, op: BuiltinOp, args: &[Argument<Var>]) -> NormResult<Option<CoreExpr>> {
    let explicit = explicit_args(args);

    match op {
        BuiltinOp::Not => {
            if let [a] = explicit[..] {
                if let Some(Literal::Bool(b)) = as_literal(&a.value) {
                    return Ok(Some(bool_lit(p, !b)));
                }
            }
        }
        BuiltinOp::And => {
            if let [a, b] = explicit[..] {
                if let Some(Literal::Bool(false)) = as_literal(&a.value) {
                    return Ok(Some(bool_lit(p, false)));
                }
                if let Some(Literal::Bool(false)) = as_literal(&b.value) {
                    return Ok(Some(bool_lit(p, false)));
                }
                if let (Some(Literal::Bool(x)), Some(Literal::Bool(y))) = (as_literal(&a.value), as_literal(&b.value)) {
                    return Ok(Some(bool_lit(p, x && y)));
                }
            }
        }
        BuiltinOp::Or => {
            if let [a, b] = explicit[..] {
                if let Some(Literal::Bool(true)) = as_literal(&a.value) {
                    return Ok(Some(bool_lit(p, true)));
                }
                if let Some(Literal::Bool(true)) = as_literal(&b.value) {
                    return Ok(Some(bool_lit(p, true)));
                }
                if let (Some(Literal::Bool(x)), Some(Literal::Bool(y))) = (as_literal(&a.value), as_literal(&b.value)) {
                    return Ok(Some(bool_lit(p, x || y)));
                }
            }
        }
        BuiltinOp::Implies => {
            if let [a, b] = explicit[..] {
                if let Some(Literal::Bool(false)) = as_literal(&a.value) {
                    return Ok(Some(bool_lit(p, true)));
                }
                if let (Some(Literal::Bool(x)), Some(Literal::Bool(y))) = (as_literal(&a.value), as_literal(&b.value)) {
                    return Ok(Some(bool_lit(p, !x || y)));
                }
            }
        }
        BuiltinOp::If => {
            // args: cond, then, else (skipping the leading implicit type arg).
            if let [cond, then_branch, else_branch] = explicit[..] {
                if let Some(Literal::Bool(c)) = as_literal(&cond.value) {
                    return Ok(Some(if c { (*then_branch.value).clone() } else { (*else_branch.value).clone() }));
                }
            }
        }
        BuiltinOp::Eq | BuiltinOp::Neq | BuiltinOp::Le | BuiltinOp::Lt | BuiltinOp::Ge | BuiltinOp::Gt => {
            if let [a, b] = explicit[..] {
                if let (Some(la), Some(lb)) = (as_literal(&a.value), as_literal(&b.value)) {
                    if let Some(ord) = compare_literals(la, lb) {
                        let result = match op {
                            BuiltinOp::Eq => ord == std::cmp::Ordering::Equal,
                            BuiltinOp::Neq => ord != std::cmp::Ordering::Equal,
                            BuiltinOp::Le => ord != std::cmp::Ordering::Greater,
                            BuiltinOp::Lt => ord == std::cmp::Ordering::Less,
                            BuiltinOp::Ge => ord != std::cmp::Ordering::Less,
                            BuiltinOp::Gt => ord == std::cmp::Ordering::Greater,
                            _ => unreachable!(),
                        };
                        return Ok(Some(bool_lit(p, result)));
                    }
                }
            }
        }
        BuiltinOp::Add | BuiltinOp::Sub | BuiltinOp::Mul | BuiltinOp::Div => {
            if let [a, b] = explicit[..] {
                if let (Some(la), Some(lb)) = (as_literal(&a.value), as_literal(&b.value)) {
                    if let Some(result) = arith_literals(op, la, lb) {
                        return Ok(Some(Expr::Literal(p, result)));
                    }
                }
            }
        }
        BuiltinOp::Neg => {
            if let [a] = explicit[..] {
                if let Some(l) = as_literal(&a.value) {
                    if let Some(result) = negate_literal(l) {
                        return Ok(Some(Expr::Literal(p, result)));
                    }
                }
            }
        }
        BuiltinOp::Cons => {
            if let [elem, rest] = explicit[..] {
                if let Some(xs) = as_seq(&rest.value) {
                    let mut out = Vec::with_capacity(xs.len() + 1);
                    out.push((*elem.value).clone());
                    out.extend_from_slice(xs);
                    return Ok(Some(Expr::Seq(p, out)));
                }
            }
        }
        BuiltinOp::At => {
            if let [container, index] = explicit[..] {
                if let (Some(xs), Some(Literal::Nat(i))) = (as_seq(&container.value), as_literal(&index.value)) {
                    return match xs.get(i as usize) {
                        Some(elem) => Ok(Some(elem.clone())),
                        None => Ok(None),
                    };
                }
            }
        }
        BuiltinOp::Map => {
            if let [f, container] = explicit[..] {
                if let Some(xs) = as_seq(&container.value) {
                    let mut out = Vec::with_capacity(xs.len());
                    for x in xs {
                        let applied = Expr::apply(p, (*f.value).clone(), vec![Argument::explicit(p, x.clone())]);
                        out.push(normalise(env, &applied)?);
                    }
                    return Ok(Some(Expr::Seq(p, out)));
                }
            }
        }
        BuiltinOp::Fold => {
            if let [step, init, container] = explicit[..] {
                if let Some(xs) = as_seq(&container.value) {
                    let mut acc = (*init.value).clone();
                    for x in xs {
                        let applied = Expr::apply(
                            p,
                            (*step.value).clone(),
                            vec![Argument::explicit(p, x.clone()), Argument::explicit(p, acc)],
                        );
                        acc = normalise(env, &applied)?;
                    }
                    return Ok(Some(acc));
                }
            }
        }
        // `every`/`some` range over types (Nat, Real, ...) with no fixed
        // enumeration, so they only reduce via `EveryIn`/`SomeIn` below.
        BuiltinOp::EveryIn | BuiltinOp::SomeIn => {
            if let [pred, container] = explicit[..] {
                if let Some(xs) = as_seq(&container.value) {
                    if xs.is_empty() {
                        return Err(NormError::EmptyQuantifierDomain(p));
                    }
                    let is_every = op == BuiltinOp::EveryIn;
                    let identity = bool_lit(p, is_every);
                    let combine = if is_every { BuiltinOp::And } else { BuiltinOp::Or };
                    let mut acc = identity;
                    for x in xs {
                        let applied = Expr::apply(p, (*pred.value).clone(), vec![Argument::explicit(p, x.clone())]);
                        let applied = normalise(env, &applied)?;
                        let combined = Expr::apply(
                            p,
                            Expr::Builtin(p, combine),
                            vec![Argument::explicit(p, acc), Argument::explicit(p, applied)],
                        );
                        acc = normalise(env, &combined)?;
                    }
                    return Ok(Some(acc));
                }
            }
        }
        _ => {}
    }
    Ok(None)
}

fn compare_literals(a: Literal, b: Literal) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Literal::Bool(x), Literal::Bool(y)) => Some(x.cmp(&y)),
        (Literal::Nat(x), Literal::Nat(y)) => Some(x.cmp(&y)),
        (Literal::Int(x), Literal::Int(y)) => Some(x.cmp(&y)),
        _ => rat_of(a).zip(rat_of(b)).map(|(x, y)| cmp_rat(x, y)),
    }
}

fn rat_of(l: Literal) -> Option<(i64, u64)> {
    match l {
        Literal::Nat(n) => Some((n as i64, 1)),
        Literal::Int(n) => Some((n, 1)),
        Literal::Rat(n, d) => Some((n, d)),
        Literal::Bool(_) => None,
    }
}

fn cmp_rat(a: (i64, u64), b: (i64, u64)) -> std::cmp::Ordering {
    let lhs = a.0 as i128 * b.1 as i128;
    let rhs = b.0 as i128 * a.1 as i128;
    lhs.cmp(&rhs)
}

fn arith_literals(op: BuiltinOp, a: Literal, b: Literal) -> Option<Literal> {
    if let (Literal::Nat(x), Literal::Nat(y)) = (a, b) {
        match op {
            BuiltinOp::Add => return Some(Literal::Nat(x + y)),
            BuiltinOp::Mul => return Some(Literal::Nat(x * y)),
            BuiltinOp::Sub => return Some(Literal::Int(x as i64 - y as i64)),
            _ => {}
        }
    }
    if let (Literal::Int(x), Literal::Int(y)) = (a, b) {
        match op {
            BuiltinOp::Add => return Some(Literal::Int(x + y)),
            BuiltinOp::Mul => return Some(Literal::Int(x * y)),
            BuiltinOp::Sub => return Some(Literal::Int(x - y)),
            _ => {}
        }
    }
    let (xn, xd) = rat_of(a)?;
    let (yn, yd) = rat_of(b)?;
    let result = match op {
        BuiltinOp::Add => reduce_rat(xn * yd as i64 + yn * xd as i64, xd * yd),
        BuiltinOp::Sub => reduce_rat(xn * yd as i64 - yn * xd as i64, xd * yd),
        BuiltinOp::Mul => reduce_rat(xn * yn, xd * yd),
        BuiltinOp::Div => {
            if yn == 0 {
                return None;
            }
            let (n, d) = if yn > 0 { (xn * yd as i64, xd * yn as u64) } else { (-xn * yd as i64, xd * (-yn) as u64) };
            reduce_rat(n, d)
        }
        _ => return None,
    };
    Some(Literal::Rat(result.0, result.1))
}

fn negate_literal(l: Literal) -> Option<Literal> {
    match l {
        Literal::Nat(n) => Some(Literal::Int(-(n as i64))),
        Literal::Int(n) => Some(Literal::Int(-n)),
        Literal::Rat(n, d) => Some(Literal::Rat(-n, d)),
        Literal::Bool(_) => None,
    }
}

fn reduce_rat(n: i64, d: u64) -> (i64, u64) {
    fn gcd(a: u64, b: u64) -> u64 {
        if b == 0 {
            a
        } else {
            gcd(b, a % b)
        }
    }
    if n == 0 {
        return (0, 1);
    }
    let g = gcd(n.unsigned_abs(), d).max(1);
    (n / g as i64, d / g)
}

#[cfg(test)]
mod normalise_tests {
    use super::*;
    use crate::expr::{mk_app1, mk_literal, mk_type};
    use crate::provenance::Provenance;

    fn p() -> Provenance {
        Provenance::machine()
    }

    #[test]
    fn add_two_literals() {
        let env = Env::new();
        let add = Expr::apply(
            p(),
            Expr::Builtin(p(), BuiltinOp::Add),
            vec![Argument::explicit(p(), mk_literal(p(), Literal::Nat(1))), Argument::explicit(p(), mk_literal(p(), Literal::Nat(2)))],
        );
        let result = normalise(&env, &add).unwrap();
        assert_eq!(result, mk_literal(p(), Literal::Nat(3)));
    }

    #[test]
    fn not_true_reduces_to_false() {
        let env = Env::new();
        let e = mk_app1(p(), Expr::Builtin(p(), BuiltinOp::Not), Argument::explicit(p(), mk_literal(p(), Literal::Bool(true))));
        assert_eq!(normalise(&env, &e).unwrap(), mk_literal(p(), Literal::Bool(false)));
    }

    #[test]
    fn ordinary_let_inlines_but_network_let_survives() {
        use crate::expr::{mk_bound, mk_free, Binder, Origin, Visibility};
        use crate::name::Ident;

        let env = Env::new();
        let plain_let = Expr::Let(
            p(),
            Box::new(mk_literal(p(), Literal::Nat(1))),
            Binder::mk(p(), Origin::UserWritten, Visibility::Explicit, None, Expr::Builtin(p(), BuiltinOp::Nat)),
            Box::new(mk_bound(p(), 0)),
        );
        assert_eq!(normalise(&env, &plain_let).unwrap(), mk_literal(p(), Literal::Nat(1)));

        let mut net_env = Env::new();
        let f = Ident::mk("f");
        net_env.insert(f.clone(), crate::env::DeclInfo { ty: mk_type(p(), 0), body: None, is_network: true });
        let net_let = Expr::Let(
            p(),
            Box::new(mk_app1(p(), mk_free(p(), f), Argument::explicit(p(), mk_literal(p(), Literal::Nat(0))))),
            Binder::mk(p(), Origin::UserWritten, Visibility::Explicit, None, Expr::Builtin(p(), BuiltinOp::Nat)),
            Box::new(mk_bound(p(), 0)),
        );
        assert!(matches!(normalise(&net_env, &net_let).unwrap(), Expr::Let(..)));
    }

    #[test]
    fn every_in_over_empty_seq_fails() {
        let env = Env::new();
        let pred = crate::expr::mk_lam(
            p(),
            crate::expr::Binder::mk(p(), crate::expr::Origin::UserWritten, crate::expr::Visibility::Explicit, None, mk_literal(p(), Literal::Bool(true))),
            mk_literal(p(), Literal::Bool(true)),
        );
        let e = Expr::apply(
            p(),
            Expr::Builtin(p(), BuiltinOp::EveryIn),
            vec![Argument::explicit(p(), pred), Argument::explicit(p(), Expr::Seq(p(), vec![]))],
        );
        assert!(matches!(normalise(&env, &e), Err(NormError::EmptyQuantifierDomain(_))));
    }
}

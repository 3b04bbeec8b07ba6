//! The closed set of builtin symbols (spec §6) and their type schemes
//! (spec §4.3, "Builtin: look up closed type scheme from a fixed table").
//!
//! Every scheme is built directly as a `CoreExpr` `Pi`-chain with
//! hand-verified de Bruijn indices via `SchemeCtx`, mirroring how the
//! teacher builds fixed `Expr` trees for special constants (`mk_prop`,
//! quotient axiom types in `quot.rs`) rather than deriving them from a
//! grammar at runtime.

use once_cell::sync::Lazy;
use hashbrown::HashMap;

use crate::expr::{mk_bound, mk_builtin, mk_pi, mk_type, Argument, Binder, CoreExpr, Expr, Origin, Visibility};
use crate::name::Symbol;
use crate::provenance::Provenance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinOp {
    // Types
    Bool,
    Prop,
    Nat,
    Int,
    Real,
    List,
    Tensor,
    // Logic
    If,
    Not,
    And,
    Or,
    Implies,
    // Compare
    Eq,
    Neq,
    Le,
    Lt,
    Ge,
    Gt,
    // Arith
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    // Container
    Cons,
    At,
    Map,
    Fold,
    // Quant
    Every,
    Some_,
    EveryIn,
    SomeIn,
    // Type classes
    HasEq,
    HasOrd,
    IsTruth,
    IsNatural,
    IsIntegral,
    IsRational,
    IsReal,
    IsContainer,
    IsQuantify,
}

impl BuiltinOp {
    pub const ALL: &'static [BuiltinOp] = &[
        BuiltinOp::Bool, BuiltinOp::Prop, BuiltinOp::Nat, BuiltinOp::Int, BuiltinOp::Real,
        BuiltinOp::List, BuiltinOp::Tensor,
        BuiltinOp::If, BuiltinOp::Not, BuiltinOp::And, BuiltinOp::Or, BuiltinOp::Implies,
        BuiltinOp::Eq, BuiltinOp::Neq, BuiltinOp::Le, BuiltinOp::Lt, BuiltinOp::Ge, BuiltinOp::Gt,
        BuiltinOp::Add, BuiltinOp::Sub, BuiltinOp::Mul, BuiltinOp::Div, BuiltinOp::Neg,
        BuiltinOp::Cons, BuiltinOp::At, BuiltinOp::Map, BuiltinOp::Fold,
        BuiltinOp::Every, BuiltinOp::Some_, BuiltinOp::EveryIn, BuiltinOp::SomeIn,
        BuiltinOp::HasEq, BuiltinOp::HasOrd, BuiltinOp::IsTruth, BuiltinOp::IsNatural,
        BuiltinOp::IsIntegral, BuiltinOp::IsRational, BuiltinOp::IsReal, BuiltinOp::IsContainer,
        BuiltinOp::IsQuantify,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinOp::Bool => "Bool",
            BuiltinOp::Prop => "Prop",
            BuiltinOp::Nat => "Nat",
            BuiltinOp::Int => "Int",
            BuiltinOp::Real => "Real",
            BuiltinOp::List => "List",
            BuiltinOp::Tensor => "Tensor",
            BuiltinOp::If => "if",
            BuiltinOp::Not => "not",
            BuiltinOp::And => "and",
            BuiltinOp::Or => "or",
            BuiltinOp::Implies => "implies",
            BuiltinOp::Eq => "==",
            BuiltinOp::Neq => "!=",
            BuiltinOp::Le => "<=",
            BuiltinOp::Lt => "<",
            BuiltinOp::Ge => ">=",
            BuiltinOp::Gt => ">",
            BuiltinOp::Add => "+",
            BuiltinOp::Sub => "-",
            BuiltinOp::Mul => "*",
            BuiltinOp::Div => "/",
            BuiltinOp::Neg => "~",
            BuiltinOp::Cons => "::",
            BuiltinOp::At => "!",
            BuiltinOp::Map => "map",
            BuiltinOp::Fold => "fold",
            BuiltinOp::Every => "every",
            BuiltinOp::Some_ => "some",
            BuiltinOp::EveryIn => "everyIn",
            BuiltinOp::SomeIn => "someIn",
            BuiltinOp::HasEq => "HasEq",
            BuiltinOp::HasOrd => "HasOrd",
            BuiltinOp::IsTruth => "IsTruth",
            BuiltinOp::IsNatural => "IsNatural",
            BuiltinOp::IsIntegral => "IsIntegral",
            BuiltinOp::IsRational => "IsRational",
            BuiltinOp::IsReal => "IsReal",
            BuiltinOp::IsContainer => "IsContainer",
            BuiltinOp::IsQuantify => "IsQuantify",
        }
    }

    pub fn is_class(&self) -> bool {
        matches!(
            self,
            BuiltinOp::HasEq
                | BuiltinOp::HasOrd
                | BuiltinOp::IsTruth
                | BuiltinOp::IsNatural
                | BuiltinOp::IsIntegral
                | BuiltinOp::IsRational
                | BuiltinOp::IsReal
                | BuiltinOp::IsContainer
                | BuiltinOp::IsQuantify
        )
    }

    pub fn is_type_former(&self) -> bool {
        matches!(
            self,
            BuiltinOp::Bool | BuiltinOp::Prop | BuiltinOp::Nat | BuiltinOp::Int | BuiltinOp::Real
                | BuiltinOp::List | BuiltinOp::Tensor
        )
    }
}

static NAME_TO_OP: Lazy<HashMap<&'static str, BuiltinOp>> =
    Lazy::new(|| BuiltinOp::ALL.iter().map(|op| (op.name(), *op)).collect());

pub fn lookup_builtin(name: &str) -> Option<BuiltinOp> {
    NAME_TO_OP.get(name).copied()
}

/// Tracks how many binders have been pushed so far while hand-building a
/// `Pi`-chain scheme, so each reference to an earlier binder gets the
/// right de Bruijn index (`depth - 1 - introduced_at`) instead of being
/// counted by hand at every call site.
struct SchemeCtx {
    prov: Provenance,
    depth: usize,
}

impl SchemeCtx {
    fn var(&self, introduced_at: usize) -> CoreExpr {
        mk_bound(self.prov, self.depth - 1 - introduced_at)
    }
}

fn implicit_type_binder(prov: Provenance, name: &str) -> Binder<crate::expr::Var> {
    Binder::mk(prov, Origin::TheMachine, Visibility::Implicit, Some(Symbol::mk(name)), mk_type(prov, 0))
}

fn instance_binder(prov: Provenance, ty: CoreExpr) -> Binder<crate::expr::Var> {
    Binder::mk(prov, Origin::TheMachine, Visibility::Instance, None, ty)
}

fn explicit_binder(prov: Provenance, ty: CoreExpr) -> Binder<crate::expr::Var> {
    Binder::mk(prov, Origin::TheMachine, Visibility::Explicit, None, ty)
}

fn class_app1(prov: Provenance, class: BuiltinOp, arg: CoreExpr) -> CoreExpr {
    Expr::apply(prov, mk_builtin(prov, class), vec![Argument::explicit(prov, arg)])
}

fn class_app2(prov: Provenance, class: BuiltinOp, a: CoreExpr, b: CoreExpr) -> CoreExpr {
    Expr::apply(prov, mk_builtin(prov, class), vec![Argument::explicit(prov, a), Argument::explicit(prov, b)])
}

/// `∀t. {class t} => t -> t -> t` (arithmetic binary operators: result
/// stays at the operands' own type, unlike `compare_scheme`).
fn poly_binary_scheme(prov: Provenance, class: BuiltinOp) -> CoreExpr {
    let b0 = implicit_type_binder(prov, "t");
    let b1 = instance_binder(prov, class_app1(prov, class, (SchemeCtx { prov, depth: 1 }).var(0)));
    let b2 = explicit_binder(prov, (SchemeCtx { prov, depth: 2 }).var(0));
    let b3 = explicit_binder(prov, (SchemeCtx { prov, depth: 3 }).var(0));
    let result = (SchemeCtx { prov, depth: 4 }).var(0);
    mk_pi(prov, b0, mk_pi(prov, b1, mk_pi(prov, b2, mk_pi(prov, b3, result))))
}

/// `∀t. {class t} => t -> t` (unary arithmetic negation).
fn poly_unary_scheme(prov: Provenance, class: BuiltinOp) -> CoreExpr {
    let b0 = implicit_type_binder(prov, "t");
    let b1 = instance_binder(prov, class_app1(prov, class, (SchemeCtx { prov, depth: 1 }).var(0)));
    let b2 = explicit_binder(prov, (SchemeCtx { prov, depth: 2 }).var(0));
    let result = (SchemeCtx { prov, depth: 3 }).var(0);
    mk_pi(prov, b0, mk_pi(prov, b1, mk_pi(prov, b2, result)))
}

/// `∀t. {class t} => t` (the polymorphic skeleton literals get, per
/// `typeOfLiteral`).
fn poly_literal_scheme(prov: Provenance, class: BuiltinOp) -> CoreExpr {
    let b0 = implicit_type_binder(prov, "t");
    let b1 = instance_binder(prov, class_app1(prov, class, (SchemeCtx { prov, depth: 1 }).var(0)));
    let result = (SchemeCtx { prov, depth: 2 }).var(0);
    mk_pi(prov, b0, mk_pi(prov, b1, result))
}

/// `∀t. {class t} => ∀r. {IsTruth r} => t -> t -> r`. Comparison results
/// are not pinned to `Bool`: `r` is solved the same way a literal's type
/// is, so a comparison can settle directly as a `Prop` when it's used as
/// a property body (spec §8 S1) instead of needing `Bool` and `Prop` to
/// be the same rigid head.
fn compare_scheme(prov: Provenance, class: BuiltinOp) -> CoreExpr {
    let b0 = implicit_type_binder(prov, "t");
    let b1 = instance_binder(prov, class_app1(prov, class, (SchemeCtx { prov, depth: 1 }).var(0)));
    let b2 = implicit_type_binder(prov, "r");
    let ctx3 = SchemeCtx { prov, depth: 3 };
    let b3 = instance_binder(prov, class_app1(prov, BuiltinOp::IsTruth, ctx3.var(2)));
    let ctx4 = SchemeCtx { prov, depth: 4 };
    let b4 = explicit_binder(prov, ctx4.var(0));
    let ctx5 = SchemeCtx { prov, depth: 5 };
    let b5 = explicit_binder(prov, ctx5.var(0));
    let result = (SchemeCtx { prov, depth: 6 }).var(2);
    mk_pi(prov, b0, mk_pi(prov, b1, mk_pi(prov, b2, mk_pi(prov, b3, mk_pi(prov, b4, mk_pi(prov, b5, result))))))
}

fn logic_binary(prov: Provenance) -> CoreExpr {
    let prop = || mk_builtin(prov, BuiltinOp::Prop);
    crate::expr::explicit_arrow(prov, prop(), crate::expr::explicit_arrow(prov, prop(), prop()))
}

fn logic_unary(prov: Provenance) -> CoreExpr {
    let prop = mk_builtin(prov, BuiltinOp::Prop);
    crate::expr::explicit_arrow(prov, prop.clone(), prop)
}

/// `∀ e c. {IsContainer e c} => e -> c -> c` (`::`).
fn cons_scheme(prov: Provenance) -> CoreExpr {
    let b0 = implicit_type_binder(prov, "e");
    let b1 = implicit_type_binder(prov, "c");
    let ctx2 = SchemeCtx { prov, depth: 2 };
    let b2 = instance_binder(prov, class_app2(prov, BuiltinOp::IsContainer, ctx2.var(0), ctx2.var(1)));
    let b3 = explicit_binder(prov, (SchemeCtx { prov, depth: 3 }).var(0));
    let ctx4 = SchemeCtx { prov, depth: 4 };
    let b4 = explicit_binder(prov, ctx4.var(1));
    let result = (SchemeCtx { prov, depth: 5 }).var(1);
    mk_pi(prov, b0, mk_pi(prov, b1, mk_pi(prov, b2, mk_pi(prov, b3, mk_pi(prov, b4, result)))))
}

/// `∀ e c. {IsContainer e c} => c -> Nat -> e` (`!`).
fn at_scheme(prov: Provenance) -> CoreExpr {
    let b0 = implicit_type_binder(prov, "e");
    let b1 = implicit_type_binder(prov, "c");
    let ctx2 = SchemeCtx { prov, depth: 2 };
    let b2 = instance_binder(prov, class_app2(prov, BuiltinOp::IsContainer, ctx2.var(0), ctx2.var(1)));
    let b3 = explicit_binder(prov, (SchemeCtx { prov, depth: 3 }).var(1));
    let b4 = explicit_binder(prov, mk_builtin(prov, BuiltinOp::Nat));
    let result = (SchemeCtx { prov, depth: 5 }).var(0);
    mk_pi(prov, b0, mk_pi(prov, b1, mk_pi(prov, b2, mk_pi(prov, b3, mk_pi(prov, b4, result)))))
}

/// `∀ e1 e2 c1 c2. {IsContainer e1 c1} {IsContainer e2 c2} => (e1 -> e2) -> c1 -> c2`.
fn map_scheme(prov: Provenance) -> CoreExpr {
    let b0 = implicit_type_binder(prov, "e1");
    let b1 = implicit_type_binder(prov, "e2");
    let b2 = implicit_type_binder(prov, "c1");
    let b3 = implicit_type_binder(prov, "c2");
    let ctx4 = SchemeCtx { prov, depth: 4 };
    let b4 = instance_binder(prov, class_app2(prov, BuiltinOp::IsContainer, ctx4.var(0), ctx4.var(2)));
    let ctx5 = SchemeCtx { prov, depth: 5 };
    let b5 = instance_binder(prov, class_app2(prov, BuiltinOp::IsContainer, ctx5.var(1), ctx5.var(3)));
    let ctx6 = SchemeCtx { prov, depth: 6 };
    let fn_ty = crate::expr::explicit_arrow(prov, ctx6.var(0), ctx6.var(1));
    let b6 = explicit_binder(prov, fn_ty);
    let ctx7 = SchemeCtx { prov, depth: 7 };
    let b7 = explicit_binder(prov, ctx7.var(2));
    let result = (SchemeCtx { prov, depth: 8 }).var(3);
    mk_pi(
        prov,
        b0,
        mk_pi(prov, b1, mk_pi(prov, b2, mk_pi(prov, b3, mk_pi(prov, b4, mk_pi(prov, b5, mk_pi(prov, b6, mk_pi(prov, b7, result))))))),
    )
}

/// `∀ e c acc. {IsContainer e c} => (e -> acc -> acc) -> acc -> c -> acc`.
fn fold_scheme(prov: Provenance) -> CoreExpr {
    let b0 = implicit_type_binder(prov, "e");
    let b1 = implicit_type_binder(prov, "c");
    let b2 = implicit_type_binder(prov, "acc");
    let ctx3 = SchemeCtx { prov, depth: 3 };
    let b3 = instance_binder(prov, class_app2(prov, BuiltinOp::IsContainer, ctx3.var(0), ctx3.var(1)));
    let ctx4 = SchemeCtx { prov, depth: 4 };
    let step_ty = crate::expr::explicit_arrow(prov, ctx4.var(0), crate::expr::explicit_arrow(prov, ctx4.var(2), ctx4.var(2)));
    let b4 = explicit_binder(prov, step_ty);
    let ctx5 = SchemeCtx { prov, depth: 5 };
    let b5 = explicit_binder(prov, ctx5.var(2));
    let ctx6 = SchemeCtx { prov, depth: 6 };
    let b6 = explicit_binder(prov, ctx6.var(1));
    let result = (SchemeCtx { prov, depth: 7 }).var(2);
    mk_pi(prov, b0, mk_pi(prov, b1, mk_pi(prov, b2, mk_pi(prov, b3, mk_pi(prov, b4, mk_pi(prov, b5, mk_pi(prov, b6, result)))))))
}

/// `∀t. {IsQuantify t} => (t -> Prop) -> Prop` (`every`/`some`).
fn quant_scheme(prov: Provenance) -> CoreExpr {
    let b0 = implicit_type_binder(prov, "t");
    let ctx1 = SchemeCtx { prov, depth: 1 };
    let b1 = instance_binder(prov, class_app1(prov, BuiltinOp::IsQuantify, ctx1.var(0)));
    let ctx2 = SchemeCtx { prov, depth: 2 };
    let pred_ty = crate::expr::explicit_arrow(prov, ctx2.var(0), mk_builtin(prov, BuiltinOp::Prop));
    let b2 = explicit_binder(prov, pred_ty);
    mk_pi(prov, b0, mk_pi(prov, b1, mk_pi(prov, b2, mk_builtin(prov, BuiltinOp::Prop))))
}

/// `∀ e c. {IsContainer e c} => (e -> Prop) -> c -> Prop` (`everyIn`/`someIn`).
fn quant_in_scheme(prov: Provenance) -> CoreExpr {
    let b0 = implicit_type_binder(prov, "e");
    let b1 = implicit_type_binder(prov, "c");
    let ctx2 = SchemeCtx { prov, depth: 2 };
    let b2 = instance_binder(prov, class_app2(prov, BuiltinOp::IsContainer, ctx2.var(0), ctx2.var(1)));
    let ctx3 = SchemeCtx { prov, depth: 3 };
    let pred_ty = crate::expr::explicit_arrow(prov, ctx3.var(0), mk_builtin(prov, BuiltinOp::Prop));
    let b3 = explicit_binder(prov, pred_ty);
    let ctx4 = SchemeCtx { prov, depth: 4 };
    let b4 = explicit_binder(prov, ctx4.var(1));
    mk_pi(prov, b0, mk_pi(prov, b1, mk_pi(prov, b2, mk_pi(prov, b3, mk_pi(prov, b4, mk_builtin(prov, BuiltinOp::Prop))))))
}

/// `Type0 -> Type0` (`List`).
fn list_scheme(prov: Provenance) -> CoreExpr {
    crate::expr::explicit_arrow(prov, mk_type(prov, 0), mk_type(prov, 0))
}

/// `Type0 -> List Nat -> Type0` (`Tensor elem dims`).
fn tensor_scheme(prov: Provenance) -> CoreExpr {
    let list_nat = Expr::apply(
        prov,
        mk_builtin(prov, BuiltinOp::List),
        vec![Argument::explicit(prov, mk_builtin(prov, BuiltinOp::Nat))],
    );
    crate::expr::explicit_arrow(prov, mk_type(prov, 0), crate::expr::explicit_arrow(prov, list_nat, mk_type(prov, 0)))
}

/// Unary classes classify one type argument: `Type0 -> Type0` read as a
/// `Prop`-valued predicate over a single type (the "kind" of constraint is
/// opaque to the normaliser; only the elaborator's class-resolution rules
/// interpret it, see `elaborate::classes`).
fn unary_class_scheme(prov: Provenance) -> CoreExpr {
    crate::expr::explicit_arrow(prov, mk_type(prov, 0), mk_type(prov, 0))
}

fn binary_class_scheme(prov: Provenance) -> CoreExpr {
    crate::expr::explicit_arrow(prov, mk_type(prov, 0), crate::expr::explicit_arrow(prov, mk_type(prov, 0), mk_type(prov, 0)))
}

/// `typeOfBuiltin`: the fixed type-scheme table referenced throughout
/// spec §4.3 and listed in spec §6.
pub fn type_of_builtin(prov: Provenance, op: BuiltinOp) -> CoreExpr {
    use BuiltinOp::*;
    match op {
        Bool | Prop | Nat | Int | Real => mk_type(prov, 0),
        List => list_scheme(prov),
        Tensor => tensor_scheme(prov),

        If => {
            let b0 = implicit_type_binder(prov, "t");
            let ctx1 = SchemeCtx { prov, depth: 1 };
            let prop_arrow = crate::expr::explicit_arrow(
                prov,
                mk_builtin(prov, Prop),
                crate::expr::explicit_arrow(prov, ctx1.var(0), crate::expr::explicit_arrow(prov, ctx1.var(0), ctx1.var(0))),
            );
            mk_pi(prov, b0, prop_arrow)
        }
        Not => logic_unary(prov),
        And | Or | Implies => logic_binary(prov),

        Eq | Neq => compare_scheme(prov, HasEq),
        Le | Lt | Ge | Gt => compare_scheme(prov, HasOrd),

        Add | Mul => poly_binary_scheme(prov, IsNatural),
        Sub => poly_binary_scheme(prov, IsIntegral),
        Div => poly_binary_scheme(prov, IsRational),
        Neg => poly_unary_scheme(prov, IsIntegral),

        Cons => cons_scheme(prov),
        At => at_scheme(prov),
        Map => map_scheme(prov),
        Fold => fold_scheme(prov),

        Every | Some_ => quant_scheme(prov),
        EveryIn | SomeIn => quant_in_scheme(prov),

        HasEq | HasOrd | IsTruth | IsNatural | IsIntegral | IsRational | IsReal | IsQuantify => unary_class_scheme(prov),
        IsContainer => binary_class_scheme(prov),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralFamily {
    Bool,
    Nat,
    Int,
    Rat,
}

/// `typeOfLiteral`: each literal family gets `∀t. {class t} => t`, where
/// `class` is the type class that admits it (`IsTruth` for `Bool` so that
/// a bare `True`/`False` can unify directly with a `Prop`-typed position,
/// per S1/S6 in spec §8).
pub fn type_of_literal(prov: Provenance, family: LiteralFamily) -> CoreExpr {
    use BuiltinOp::*;
    let class = match family {
        LiteralFamily::Bool => IsTruth,
        LiteralFamily::Nat => IsNatural,
        LiteralFamily::Int => IsIntegral,
        LiteralFamily::Rat => IsRational,
    };
    poly_literal_scheme(prov, class)
}

#[cfg(test)]
mod builtin_tests {
    use super::*;

    #[test]
    fn every_builtin_name_round_trips() {
        for op in BuiltinOp::ALL {
            assert_eq!(lookup_builtin(op.name()), Some(*op));
        }
    }

    #[test]
    fn add_scheme_is_four_pis_deep() {
        let prov = Provenance::machine();
        let scheme = type_of_builtin(prov, BuiltinOp::Add);
        let mut depth = 0;
        let mut cur = &scheme;
        while let Expr::Pi(_, _, body) = cur {
            depth += 1;
            cur = body;
        }
        assert_eq!(depth, 4);
    }
}

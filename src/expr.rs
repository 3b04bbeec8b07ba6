//! The typed core language: a single recursive `Expr` sum parameterised
//! over its variable representation, per spec §3.
//!
//! Two concrete instantiations are used by the pipeline:
//! `SurfaceExpr = Expr<Symbol>` (named, produced by the parser, destroyed
//! by the scope checker) and `CoreExpr = Expr<Var>` (locally nameless,
//! used by every later pass). Keeping them as one generic type rather than
//! two ad-hoc ones means `Binder`/`Argument`/the traversal-shaped code in
//! `debruijn.rs` don't need to be duplicated.

use std::fmt;

use crate::builtins::BuiltinOp;
use crate::name::{Ident, Symbol};
use crate::provenance::Provenance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Explicit,
    Implicit,
    Instance,
}

impl Visibility {
    pub fn is_explicit(&self) -> bool {
        matches!(self, Visibility::Explicit)
    }
}

/// Whether a binder/argument was written by the user or inserted by the
/// elaborator (implicit/instance argument insertion, see `elaborate::context`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    UserWritten,
    TheMachine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Literal {
    Bool(bool),
    Nat(u64),
    Int(i64),
    /// Rational stored as a reduced `numerator / denominator` pair with
    /// `denominator > 0`, so that `Eq`/`Hash`/`Ord` are exact rather than
    /// floating-point-fuzzy.
    Rat(i64, u64),
}

/// Variable representation used between the parser and the scope checker:
/// a plain user-written symbol, resolved by name lookup.
pub type NamedVar = Symbol;

/// Variable representation used by every pass after scope checking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Var {
    /// A de Bruijn index: the distance, in enclosing binders, from the
    /// occurrence to its binder.
    Bound(usize),
    /// A reference to a top-level declaration.
    Free(Ident),
}

pub trait VarRepr: Clone + PartialEq + Eq + std::hash::Hash + fmt::Debug {}
impl VarRepr for Symbol {}
impl VarRepr for Var {}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binder<V: VarRepr> {
    pub prov: Provenance,
    pub origin: Origin,
    pub visibility: Visibility,
    /// Advisory only: used by the printer, ignored by every equality or
    /// substitution operation. `None` marks a machine/anonymous binder
    /// that a name lookup must never match.
    pub name: Option<Symbol>,
    pub ty: Box<Expr<V>>,
}

impl<V: VarRepr> Binder<V> {
    pub fn mk(prov: Provenance, origin: Origin, visibility: Visibility, name: Option<Symbol>, ty: Expr<V>) -> Self {
        Binder { prov, origin, visibility, name, ty: Box::new(ty) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Argument<V: VarRepr> {
    pub prov: Provenance,
    pub origin: Origin,
    pub visibility: Visibility,
    pub value: Box<Expr<V>>,
}

impl<V: VarRepr> Argument<V> {
    pub fn mk(prov: Provenance, origin: Origin, visibility: Visibility, value: Expr<V>) -> Self {
        Argument { prov, origin, visibility, value: Box::new(value) }
    }

    pub fn explicit(prov: Provenance, value: Expr<V>) -> Self {
        Argument::mk(prov, Origin::UserWritten, Visibility::Explicit, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr<V: VarRepr> {
    /// The `l`-th type universe.
    Type(Provenance, u32),
    Var(Provenance, V),
    /// Unification meta-variable, to be solved by the constraint solver.
    Meta(Provenance, u64),
    /// User-written `?name`; must not survive elaboration.
    Hole(Provenance, Symbol),
    /// Application in spine form: `args` is non-empty and `f` is never
    /// itself an `App` (see `Expr::apply`/`Expr::decompose`).
    App(Provenance, Box<Expr<V>>, Vec<Argument<V>>),
    Pi(Provenance, Binder<V>, Box<Expr<V>>),
    Lam(Provenance, Binder<V>, Box<Expr<V>>),
    /// `let v : binder.ty = v in body`, non-recursive.
    Let(Provenance, Box<Expr<V>>, Binder<V>, Box<Expr<V>>),
    Ann(Provenance, Box<Expr<V>>, Box<Expr<V>>),
    Builtin(Provenance, BuiltinOp),
    Literal(Provenance, Literal),
    Seq(Provenance, Vec<Expr<V>>),
    /// An elaborated type-class dictionary (the argument is the witness
    /// expression the class-resolution rules produced).
    PrimDict(Provenance, Box<Expr<V>>),
}

impl<V: VarRepr> Expr<V> {
    pub fn prov(&self) -> Provenance {
        match self {
            Expr::Type(p, _)
            | Expr::Var(p, _)
            | Expr::Meta(p, _)
            | Expr::Hole(p, _)
            | Expr::App(p, ..)
            | Expr::Pi(p, ..)
            | Expr::Lam(p, ..)
            | Expr::Let(p, ..)
            | Expr::Ann(p, ..)
            | Expr::Builtin(p, _)
            | Expr::Literal(p, _)
            | Expr::Seq(p, _)
            | Expr::PrimDict(p, _) => *p,
        }
    }

    /// Splits an application into its head and argument spine. For a
    /// non-`App` node, returns `(self, &[])` so callers can treat every
    /// expression uniformly as a (possibly nullary) application.
    pub fn decompose(&self) -> (&Expr<V>, &[Argument<V>]) {
        match self {
            Expr::App(_, f, args) => (f.as_ref(), args.as_slice()),
            owise => (owise, &[]),
        }
    }

    /// Smart constructor for application that preserves spine form: if
    /// `head` is itself an `App`, the new arguments are appended to its
    /// existing spine rather than nesting another `App` node.
    pub fn apply(prov: Provenance, head: Expr<V>, mut args: Vec<Argument<V>>) -> Expr<V> {
        if args.is_empty() {
            return head;
        }
        match head {
            Expr::App(head_prov, inner_fn, mut inner_args) => {
                inner_args.append(&mut args);
                Expr::App(head_prov.join(&prov), inner_fn, inner_args)
            }
            owise => Expr::App(prov, Box::new(owise), args),
        }
    }
}

pub type SurfaceExpr = Expr<NamedVar>;
pub type CoreExpr = Expr<Var>;
pub type CoreBinder = Binder<Var>;
pub type CoreArgument = Argument<Var>;

// --- Smart constructors used throughout the elaborator/normaliser/backend ---

pub fn mk_type(prov: Provenance, level: u32) -> CoreExpr {
    Expr::Type(prov, level)
}

pub fn mk_bound(prov: Provenance, idx: usize) -> CoreExpr {
    Expr::Var(prov, Var::Bound(idx))
}

pub fn mk_free(prov: Provenance, id: Ident) -> CoreExpr {
    Expr::Var(prov, Var::Free(id))
}

pub fn mk_meta(prov: Provenance, id: u64) -> CoreExpr {
    Expr::Meta(prov, id)
}

pub fn mk_builtin(prov: Provenance, op: BuiltinOp) -> CoreExpr {
    Expr::Builtin(prov, op)
}

pub fn mk_literal(prov: Provenance, lit: Literal) -> CoreExpr {
    Expr::Literal(prov, lit)
}

pub fn mk_pi(prov: Provenance, binder: CoreBinder, result: CoreExpr) -> CoreExpr {
    Expr::Pi(prov, binder, Box::new(result))
}

pub fn mk_lam(prov: Provenance, binder: CoreBinder, body: CoreExpr) -> CoreExpr {
    Expr::Lam(prov, binder, Box::new(body))
}

pub fn mk_app1(prov: Provenance, f: CoreExpr, arg: CoreArgument) -> CoreExpr {
    Expr::apply(prov, f, vec![arg])
}

pub fn explicit_arrow(prov: Provenance, from: CoreExpr, to: CoreExpr) -> CoreExpr {
    let binder = Binder::mk(prov, Origin::TheMachine, Visibility::Explicit, None, from);
    mk_pi(prov, binder, to)
}

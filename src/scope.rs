//! Scope checker (spec §4.2): named surface AST -> locally-nameless AST.
//!
//! Maintains two contexts: an ordered list of currently-bound local names
//! (most-recent first, so a lookup's position is directly the de Bruijn
//! index) and a set of declaration identifiers seen so far in the program.
//! Declarations commit their identifier to the declaration set only after
//! their own body has been checked, so definitions are non-recursive.

use hashbrown::HashSet;

use crate::errors::ScopeError;
use crate::expr::{Argument, Binder, Expr, SurfaceExpr, Var};
use crate::name::{Ident, Symbol};
use crate::program::{ScopedDecl, ScopedProgram, SurfaceDecl, SurfaceProgram};

pub type ScopeResult<T> = Result<T, ScopeError>;

/// A local binder occupies a slot in the de Bruijn stack even when it's
/// anonymous; `None` is the sentinel that a name lookup can never match.
struct Locals {
    stack: Vec<Option<Symbol>>,
    declared: HashSet<Symbol>,
}

impl Locals {
    fn new() -> Self {
        Locals { stack: Vec::new(), declared: HashSet::new() }
    }

    fn push(&mut self, name: Option<Symbol>) {
        self.stack.push(name);
    }

    fn pop(&mut self) {
        self.stack.pop();
    }

    fn resolve(&self, sym: &Symbol) -> ScopeRef {
        for (depth, slot) in self.stack.iter().rev().enumerate() {
            if slot.as_ref() == Some(sym) {
                return ScopeRef::Bound(depth);
            }
        }
        if self.declared.contains(sym) {
            ScopeRef::Free
        } else {
            ScopeRef::Unbound
        }
    }
}

enum ScopeRef {
    Bound(usize),
    Free,
    Unbound,
}

pub fn scope_check_program(prog: &SurfaceProgram) -> ScopeResult<ScopedProgram> {
    let mut locals = Locals::new();
    let mut decls = Vec::with_capacity(prog.decls.len());
    for decl in &prog.decls {
        let scoped = scope_check_decl(&mut locals, decl)?;
        locals.declared.insert(decl.id().clone());
        decls.push(scoped);
    }
    Ok(ScopedProgram { decls })
}

fn scope_check_decl(locals: &mut Locals, decl: &SurfaceDecl) -> ScopeResult<ScopedDecl> {
    match decl {
        SurfaceDecl::Netw { prov, id, ty } => {
            let ty = scope_check_expr(locals, ty)?;
            Ok(ScopedDecl::Netw { prov: *prov, id: Ident::mk(id.as_str()), ty })
        }
        SurfaceDecl::Data { prov, id, ty } => {
            let ty = scope_check_expr(locals, ty)?;
            Ok(ScopedDecl::Data { prov: *prov, id: Ident::mk(id.as_str()), ty })
        }
        SurfaceDecl::Def { prov, id, ty, body } => {
            let ty = ty.as_ref().map(|t| scope_check_expr(locals, t)).transpose()?;
            let body = scope_check_expr(locals, body)?;
            Ok(ScopedDecl::Def { prov: *prov, id: Ident::mk(id.as_str()), ty, body })
        }
    }
}

fn scope_check_expr(locals: &mut Locals, e: &SurfaceExpr) -> ScopeResult<crate::expr::CoreExpr> {
    match e {
        Expr::Type(p, l) => Ok(Expr::Type(*p, *l)),
        Expr::Var(p, sym) => match locals.resolve(sym) {
            ScopeRef::Bound(i) => Ok(Expr::Var(*p, Var::Bound(i))),
            ScopeRef::Free => Ok(Expr::Var(*p, Var::Free(Ident::mk(sym.as_str())))),
            ScopeRef::Unbound => Err(ScopeError::UnboundName { name: sym.clone(), prov: *p }),
        },
        Expr::Meta(p, m) => Ok(Expr::Meta(*p, *m)),
        Expr::Hole(p, name) => Ok(Expr::Hole(*p, name.clone())),
        Expr::App(p, f, args) => {
            let f = scope_check_expr(locals, f)?;
            let mut out = Vec::with_capacity(args.len());
            for a in args {
                out.push(Argument {
                    prov: a.prov,
                    origin: a.origin,
                    visibility: a.visibility,
                    value: Box::new(scope_check_expr(locals, &a.value)?),
                });
            }
            Ok(Expr::apply(*p, f, out))
        }
        Expr::Pi(p, b, body) => {
            let ty = scope_check_expr(locals, &b.ty)?;
            locals.push(b.name.clone());
            let body = scope_check_expr(locals, body);
            locals.pop();
            let body = body?;
            Ok(Expr::Pi(*p, Binder { prov: b.prov, origin: b.origin, visibility: b.visibility, name: b.name.clone(), ty: Box::new(ty) }, Box::new(body)))
        }
        Expr::Lam(p, b, body) => {
            let ty = scope_check_expr(locals, &b.ty)?;
            locals.push(b.name.clone());
            let body = scope_check_expr(locals, body);
            locals.pop();
            let body = body?;
            Ok(Expr::Lam(*p, Binder { prov: b.prov, origin: b.origin, visibility: b.visibility, name: b.name.clone(), ty: Box::new(ty) }, Box::new(body)))
        }
        Expr::Let(p, v, b, body) => {
            let v = scope_check_expr(locals, v)?;
            let ty = scope_check_expr(locals, &b.ty)?;
            locals.push(b.name.clone());
            let body = scope_check_expr(locals, body);
            locals.pop();
            let body = body?;
            Ok(Expr::Let(*p, Box::new(v), Binder { prov: b.prov, origin: b.origin, visibility: b.visibility, name: b.name.clone(), ty: Box::new(ty) }, Box::new(body)))
        }
        Expr::Ann(p, inner, t) => {
            let inner = scope_check_expr(locals, inner)?;
            let t = scope_check_expr(locals, t)?;
            Ok(Expr::Ann(*p, Box::new(inner), Box::new(t)))
        }
        Expr::Builtin(p, op) => Ok(Expr::Builtin(*p, *op)),
        Expr::Literal(p, l) => Ok(Expr::Literal(*p, *l)),
        Expr::Seq(p, xs) => {
            let mut out = Vec::with_capacity(xs.len());
            for x in xs {
                out.push(scope_check_expr(locals, x)?);
            }
            Ok(Expr::Seq(*p, out))
        }
        Expr::PrimDict(p, inner) => {
            let inner = scope_check_expr(locals, inner)?;
            Ok(Expr::PrimDict(*p, Box::new(inner)))
        }
    }
}

#[cfg(test)]
mod scope_tests {
    use super::*;
    use crate::expr::{mk_type, Origin, Visibility};
    use crate::provenance::Provenance;

    fn p() -> Provenance {
        Provenance::machine()
    }

    #[test]
    fn lambda_bound_var_resolves_to_bound_zero() {
        let binder = Binder::mk(p(), Origin::UserWritten, Visibility::Explicit, Some(Symbol::mk("x")), Expr::Type(p(), 0));
        let body = Expr::Var(p(), Symbol::mk("x"));
        let lam = Expr::Lam(p(), binder, Box::new(body));
        let mut locals = Locals::new();
        let result = scope_check_expr(&mut locals, &lam).unwrap();
        match result {
            Expr::Lam(_, _, inner) => assert_eq!(*inner, crate::expr::mk_bound(p(), 0)),
            _ => panic!("expected Lam"),
        }
        let _ = mk_type;
    }

    #[test]
    fn unbound_variable_is_rejected() {
        let mut locals = Locals::new();
        let e = Expr::Var(p(), Symbol::mk("nope"));
        let err = scope_check_expr(&mut locals, &e).unwrap_err();
        matches!(err, ScopeError::UnboundName { .. });
    }

    #[test]
    fn declaration_is_not_visible_in_its_own_body() {
        let prog = SurfaceProgram {
            decls: vec![SurfaceDecl::Def {
                prov: p(),
                id: Symbol::mk("loop"),
                ty: None,
                body: Expr::Var(p(), Symbol::mk("loop")),
            }],
        };
        let err = scope_check_program(&prog).unwrap_err();
        matches!(err, ScopeError::UnboundName { .. });
    }
}

//! Declarations and programs (spec §3 "Declaration"/"A program").
//!
//! Three stages share the same three-variant shape (`Netw`/`Data`/`Def`)
//! but differ in variable representation and in whether a definition's
//! type has been pinned down yet:
//!
//! - `SurfaceProgram` — named variables, straight from the parser.
//! - `ScopedProgram` — locally-nameless, straight from the scope checker;
//!   a `Def` may still be missing its type (`NAME BINDERS = EXPR;` with no
//!   preceding `NAME : EXPR;` signature), to be inferred during elaboration
//!   the same way the `Let`-rule infers an unannotated bound value's type.
//! - `CoreProgram` — locally-nameless, fully elaborated; every `Def` has a
//!   type (this is `spec.md`'s `DefFun p id t body`).

use crate::expr::{CoreExpr, SurfaceExpr};
use crate::name::{Ident, Symbol};
use crate::provenance::Provenance;

#[derive(Debug, Clone)]
pub struct SurfaceProgram {
    pub decls: Vec<SurfaceDecl>,
}

#[derive(Debug, Clone)]
pub enum SurfaceDecl {
    Netw { prov: Provenance, id: Symbol, ty: SurfaceExpr },
    Data { prov: Provenance, id: Symbol, ty: SurfaceExpr },
    Def { prov: Provenance, id: Symbol, ty: Option<SurfaceExpr>, body: SurfaceExpr },
}

impl SurfaceDecl {
    pub fn prov(&self) -> Provenance {
        match self {
            SurfaceDecl::Netw { prov, .. } | SurfaceDecl::Data { prov, .. } | SurfaceDecl::Def { prov, .. } => *prov,
        }
    }

    pub fn id(&self) -> &Symbol {
        match self {
            SurfaceDecl::Netw { id, .. } | SurfaceDecl::Data { id, .. } | SurfaceDecl::Def { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScopedProgram {
    pub decls: Vec<ScopedDecl>,
}

#[derive(Debug, Clone)]
pub enum ScopedDecl {
    Netw { prov: Provenance, id: Ident, ty: CoreExpr },
    Data { prov: Provenance, id: Ident, ty: CoreExpr },
    Def { prov: Provenance, id: Ident, ty: Option<CoreExpr>, body: CoreExpr },
}

impl ScopedDecl {
    pub fn prov(&self) -> Provenance {
        match self {
            ScopedDecl::Netw { prov, .. } | ScopedDecl::Data { prov, .. } | ScopedDecl::Def { prov, .. } => *prov,
        }
    }

    pub fn id(&self) -> &Ident {
        match self {
            ScopedDecl::Netw { id, .. } | ScopedDecl::Data { id, .. } | ScopedDecl::Def { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoreProgram {
    pub decls: Vec<CoreDecl>,
}

#[derive(Debug, Clone)]
pub enum CoreDecl {
    Netw { prov: Provenance, id: Ident, ty: CoreExpr },
    Data { prov: Provenance, id: Ident, ty: CoreExpr },
    Def { prov: Provenance, id: Ident, ty: CoreExpr, body: CoreExpr },
}

impl CoreDecl {
    pub fn id(&self) -> &Ident {
        match self {
            CoreDecl::Netw { id, .. } | CoreDecl::Data { id, .. } | CoreDecl::Def { id, .. } => id,
        }
    }

    pub fn ty(&self) -> &CoreExpr {
        match self {
            CoreDecl::Netw { ty, .. } | CoreDecl::Data { ty, .. } | CoreDecl::Def { ty, .. } => ty,
        }
    }

    pub fn body(&self) -> Option<&CoreExpr> {
        match self {
            CoreDecl::Def { body, .. } => Some(body),
            CoreDecl::Netw { .. } | CoreDecl::Data { .. } => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, CoreDecl::Netw { .. })
    }
}

//! The declaration environment (spec §3 "A program"): accumulates each
//! declaration's elaborated type, and a definition's body, as the pipeline
//! walks the program in order. A later declaration sees every earlier one;
//! nothing is visible to itself or to anything declared after it.
//!
//! Unlike the teacher's `Env`, this isn't shared across worker threads
//! (spec §5 requires a single-threaded, deterministic pipeline), so there's
//! no `Arc<RwLock<_>>` wrapper here: the compiler owns one `Env` outright
//! and threads it through by `&mut`/`&`.

use hashbrown::HashMap;

use crate::expr::CoreExpr;
use crate::name::Ident;

#[derive(Debug, Clone)]
pub struct DeclInfo {
    pub ty: CoreExpr,
    /// `None` for `network`/`dataset` declarations, which have no body.
    pub body: Option<CoreExpr>,
    pub is_network: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Env {
    decls: HashMap<Ident, DeclInfo>,
    order: Vec<Ident>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    pub fn insert(&mut self, id: Ident, info: DeclInfo) {
        self.order.push(id.clone());
        self.decls.insert(id, info);
    }

    pub fn get(&self, id: &Ident) -> Option<&DeclInfo> {
        self.decls.get(id)
    }

    pub fn ty_of(&self, id: &Ident) -> Option<&CoreExpr> {
        self.decls.get(id).map(|d| &d.ty)
    }

    pub fn body_of(&self, id: &Ident) -> Option<&CoreExpr> {
        self.decls.get(id).and_then(|d| d.body.as_ref())
    }

    /// Networks in declaration order, for the VNNLib backend's
    /// meta-network discovery (spec §4.5).
    pub fn networks(&self) -> impl Iterator<Item = &Ident> {
        self.order.iter().filter(move |id| self.decls.get(*id).map_or(false, |d| d.is_network))
    }
}

#[cfg(test)]
mod env_tests {
    use super::*;
    use crate::expr::mk_type;
    use crate::provenance::Provenance;

    #[test]
    fn later_lookup_sees_earlier_insert() {
        let mut env = Env::new();
        let id = Ident::mk("x");
        env.insert(id.clone(), DeclInfo { ty: mk_type(Provenance::machine(), 0), body: None, is_network: false });
        assert!(env.get(&id).is_some());
        assert_eq!(env.networks().count(), 0);
    }
}

//! VNNLib backend (spec §4.5): folds every property's networks into a
//! "meta-network" addressed through a shared space of magic input/output
//! variables, so the result can be handed to an external SMT-Lib printer
//! (kept out of this crate per spec §1 — "the final SMT-Lib string
//! emitter" is an external collaborator).
//!
//! The rewrite only fires on `Let`s whose bound value is a bare network
//! application — exactly the shape `normalise::normalise` now preserves
//! rather than inlining (see `normalise::is_opaque_network_app`). Anything
//! else shaped like a network application (partially applied, buried
//! inside another expression) is rejected as `NotAnf`, per the spec's
//! open question: ANF-lifting of network applications is a precondition
//! this backend enforces rather than performs.

use hashbrown::HashMap;

use crate::builtins::BuiltinOp;
use crate::debruijn::lift;
use crate::env::Env;
use crate::errors::{SmtLibError, UnsupportedNetworkKind};
use crate::expr::{Argument, Binder, CoreExpr, Expr, Literal, Origin, Var, Visibility};
use crate::name::{Ident, Symbol};
use crate::normalise::{self, whnf};
use crate::provenance::Provenance;

/// The input/output tensor widths of a validated network signature
/// (`Pi (Tensor Real [n]) (Tensor Real [m])`).
#[derive(Debug, Clone, Copy)]
struct NetworkShape {
    inputs: u64,
    outputs: u64,
}

/// One property lowered to its magic-variable form, ready for the (external)
/// SMT-Lib printer: `body` has no free network reference left in it, only
/// `forall`-bound magic variables and the original property's own structure.
#[derive(Debug, Clone)]
pub struct VnnLibScript {
    pub property: Ident,
    /// Networks in first-occurrence order — the sidecar list the driver
    /// uses to stitch binary network files to `X`/`Y` blocks.
    pub meta_network: Vec<Ident>,
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub body: CoreExpr,
}

/// Lowers every `Prop`-typed definition in `env` to a `VnnLibScript`.
/// Non-`Prop` definitions (helpers already inlined by normalisation) and
/// `network`/`dataset` declarations are silently skipped, per spec §4.5's
/// "non-property definitions are dropped."
pub fn lower_program(env: &Env, program: &crate::program::CoreProgram) -> Result<Vec<VnnLibScript>, SmtLibError> {
    let mut out = Vec::new();
    for decl in &program.decls {
        if let crate::program::CoreDecl::Def { id, ty, body, .. } = decl {
            if is_prop_type(env, ty) {
                out.push(lower_property(env, id, body)?);
            }
        }
    }
    if out.is_empty() {
        return Err(SmtLibError::NoPropertiesFound);
    }
    Ok(out)
}

fn is_prop_type(env: &Env, ty: &CoreExpr) -> bool {
    matches!(whnf(env, ty), Expr::Builtin(_, BuiltinOp::Prop))
}

/// Lowers a single property body (spec §4.5, steps 1-6).
pub fn lower_property(env: &Env, name: &Ident, body: &CoreExpr) -> Result<VnnLibScript, SmtLibError> {
    let normalised = normalise::normalise(env, body).map_err(|e| SmtLibError::NormalisationError(e.to_string()))?;

    let mut walker = Walker { env, shapes: HashMap::new(), meta_network: Vec::new(), placeholders: HashMap::new(), next_placeholder: 0, counters: Counters::default() };
    let rewritten = walker.rewrite(&normalised, 0)?;

    if walker.meta_network.is_empty() {
        return Err(SmtLibError::NoNetworkUsedInProperty(name.clone()));
    }

    let total_inputs = walker.counters.input as usize;
    let total_outputs = walker.counters.output as usize;
    let total_magic = total_inputs + total_outputs;

    let lifted = lift(total_magic, 0, &rewritten);
    let resolved = resolve_placeholders(&lifted, &walker.placeholders, total_inputs as u64, total_outputs as u64);
    let quantified = prepend_magic_foralls(resolved, total_inputs, total_outputs);

    let final_body = normalise::normalise(env, &quantified).map_err(|e| SmtLibError::NormalisationError(e.to_string()))?;

    Ok(VnnLibScript { property: name.clone(), meta_network: walker.meta_network, num_inputs: total_inputs, num_outputs: total_outputs, body: final_body })
}

#[derive(Debug, Default)]
struct Counters {
    input: u64,
    output: u64,
}

/// Where a magic-variable reference was inserted: which block it belongs
/// to, its global index within that block, and the ordinary-binder depth
/// (within the property's own, non-magic, nesting) at the insertion site —
/// everything needed to compute its final `Bound` index once the total
/// magic-variable count is known (see `resolve_placeholders`).
struct PlaceholderInfo {
    is_output: bool,
    global_idx: u64,
    depth: usize,
}

struct Walker<'a> {
    env: &'a Env,
    shapes: HashMap<Ident, NetworkShape>,
    meta_network: Vec<Ident>,
    placeholders: HashMap<u64, PlaceholderInfo>,
    next_placeholder: u64,
    counters: Counters,
}

impl<'a> Walker<'a> {
    fn shape_of(&mut self, id: &Ident) -> Result<NetworkShape, SmtLibError> {
        if let Some(s) = self.shapes.get(id) {
            return Ok(*s);
        }
        let shape = network_shape(self.env, id)?;
        self.shapes.insert(id.clone(), shape);
        Ok(shape)
    }

    fn fresh_placeholder(&mut self, is_output: bool, global_idx: u64, depth: usize) -> CoreExpr {
        let id = self.next_placeholder;
        self.next_placeholder += 1;
        self.placeholders.insert(id, PlaceholderInfo { is_output, global_idx, depth });
        Expr::Meta(Provenance::machine(), id)
    }

    /// Recursively rewrites `e`, walking every position a network
    /// application could appear. `depth` counts ordinary (non-magic)
    /// binders crossed since the property's own root.
    fn rewrite(&mut self, e: &CoreExpr, depth: usize) -> Result<CoreExpr, SmtLibError> {
        match e {
            Expr::Let(p, v, b, body) => {
                if let (Expr::Var(_, Var::Free(net_id)), [input_arg]) = v.decompose() {
                    if self.env.get(net_id).map_or(false, |d| d.is_network) {
                        return self.rewrite_network_let(*p, net_id.clone(), &input_arg.value, body, depth);
                    }
                }
                // Not a network let: recurse, but a bare network reference
                // anywhere inside the value itself is still a violation.
                let v = self.rewrite(v, depth)?;
                let ty = self.rewrite(&b.ty, depth)?;
                let body = self.rewrite(body, depth + 1)?;
                Ok(Expr::Let(*p, Box::new(v), Binder { ty: Box::new(ty), ..b.clone() }, Box::new(body)))
            }
            Expr::Var(_, Var::Free(id)) if self.env.get(id).map_or(false, |d| d.is_network) => Err(SmtLibError::NotAnf(id.clone())),
            Expr::App(p, f, args) => {
                if let Expr::Var(_, Var::Free(id)) = f.as_ref() {
                    if self.env.get(id).map_or(false, |d| d.is_network) {
                        return Err(SmtLibError::NotAnf(id.clone()));
                    }
                }
                let f = self.rewrite(f, depth)?;
                let mut new_args = Vec::with_capacity(args.len());
                for a in args {
                    new_args.push(Argument { value: Box::new(self.rewrite(&a.value, depth)?), ..a.clone() });
                }
                Ok(Expr::apply(*p, f, new_args))
            }
            Expr::Pi(p, b, body) => {
                let ty = self.rewrite(&b.ty, depth)?;
                let body = self.rewrite(body, depth + 1)?;
                Ok(Expr::Pi(*p, Binder { ty: Box::new(ty), ..b.clone() }, Box::new(body)))
            }
            Expr::Lam(p, b, body) => {
                let ty = self.rewrite(&b.ty, depth)?;
                let body = self.rewrite(body, depth + 1)?;
                Ok(Expr::Lam(*p, Binder { ty: Box::new(ty), ..b.clone() }, Box::new(body)))
            }
            Expr::Ann(p, inner, t) => Ok(Expr::Ann(*p, Box::new(self.rewrite(inner, depth)?), Box::new(self.rewrite(t, depth)?))),
            Expr::Seq(p, xs) => Ok(Expr::Seq(*p, xs.iter().map(|x| self.rewrite(x, depth)).collect::<Result<_, _>>()?)),
            Expr::PrimDict(p, inner) => Ok(Expr::PrimDict(*p, Box::new(self.rewrite(inner, depth)?))),
            Expr::Type(..) | Expr::Var(..) | Expr::Meta(..) | Expr::Hole(..) | Expr::Builtin(..) | Expr::Literal(..) => Ok(e.clone()),
        }
    }

    /// `Let (App (Var (Free netId)) [inputArg]) _ letBody` →
    /// `(inputSeq == inputArg) => (outputSeq substituted into letBody)`
    /// (spec §4.5 step 4).
    fn rewrite_network_let(&mut self, p: Provenance, net_id: Ident, input_arg: &CoreExpr, let_body: &CoreExpr, depth: usize) -> Result<CoreExpr, SmtLibError> {
        let shape = self.shape_of(&net_id)?;
        if !self.meta_network.contains(&net_id) {
            self.meta_network.push(net_id.clone());
        }

        let input_start = self.counters.input;
        self.counters.input += shape.inputs;
        let output_start = self.counters.output;
        self.counters.output += shape.outputs;

        let input_seq = Expr::Seq(p, (0..shape.inputs).map(|i| self.fresh_placeholder(false, input_start + i, depth)).collect());
        let output_seq = Expr::Seq(p, (0..shape.outputs).map(|i| self.fresh_placeholder(true, output_start + i, depth)).collect());

        let input_arg = self.rewrite(input_arg, depth)?;
        let rewritten_body = self.rewrite(let_body, depth)?;
        let substituted_body = crate::debruijn::subst(&rewritten_body, &output_seq);

        let eq = Expr::apply(p, Expr::Builtin(p, BuiltinOp::Eq), vec![Argument::explicit(p, input_seq), Argument::explicit(p, input_arg)]);
        Ok(Expr::apply(p, Expr::Builtin(p, BuiltinOp::Implies), vec![Argument::explicit(p, eq), Argument::explicit(p, substituted_body)]))
    }
}

/// Replaces every magic-variable placeholder with its final `Bound` index,
/// now that the total input/output counts (and hence the size of the
/// prepended `forall` block) are known. Input block occupies the
/// outermost positions, then the output block, then the property's own
/// (already `lift`-ed) structure — see the module doc for the index math.
fn resolve_placeholders(e: &CoreExpr, table: &HashMap<u64, PlaceholderInfo>, total_inputs: u64, total_outputs: u64) -> CoreExpr {
    match e {
        Expr::Meta(p, id) => match table.get(id) {
            Some(info) => {
                let outer_pos = if info.is_output { total_inputs + info.global_idx } else { info.global_idx };
                let total = total_inputs + total_outputs;
                let idx = (total - 1 - outer_pos) as usize + info.depth;
                Expr::Var(*p, Var::Bound(idx))
            }
            None => e.clone(),
        },
        Expr::Var(..) | Expr::Type(..) | Expr::Hole(..) | Expr::Builtin(..) | Expr::Literal(..) => e.clone(),
        Expr::App(p, f, args) => Expr::App(
            *p,
            Box::new(resolve_placeholders(f, table, total_inputs, total_outputs)),
            args.iter()
                .map(|a| Argument { value: Box::new(resolve_placeholders(&a.value, table, total_inputs, total_outputs)), ..a.clone() })
                .collect(),
        ),
        Expr::Pi(p, b, body) => Expr::Pi(
            *p,
            Binder { ty: Box::new(resolve_placeholders(&b.ty, table, total_inputs, total_outputs)), ..b.clone() },
            Box::new(resolve_placeholders(body, table, total_inputs, total_outputs)),
        ),
        Expr::Lam(p, b, body) => Expr::Lam(
            *p,
            Binder { ty: Box::new(resolve_placeholders(&b.ty, table, total_inputs, total_outputs)), ..b.clone() },
            Box::new(resolve_placeholders(body, table, total_inputs, total_outputs)),
        ),
        Expr::Let(p, v, b, body) => Expr::Let(
            *p,
            Box::new(resolve_placeholders(v, table, total_inputs, total_outputs)),
            Binder { ty: Box::new(resolve_placeholders(&b.ty, table, total_inputs, total_outputs)), ..b.clone() },
            Box::new(resolve_placeholders(body, table, total_inputs, total_outputs)),
        ),
        Expr::Ann(p, inner, t) => Expr::Ann(
            *p,
            Box::new(resolve_placeholders(inner, table, total_inputs, total_outputs)),
            Box::new(resolve_placeholders(t, table, total_inputs, total_outputs)),
        ),
        Expr::Seq(p, xs) => Expr::Seq(*p, xs.iter().map(|x| resolve_placeholders(x, table, total_inputs, total_outputs)).collect()),
        Expr::PrimDict(p, inner) => Expr::PrimDict(*p, Box::new(resolve_placeholders(inner, table, total_inputs, total_outputs))),
    }
}

/// Prepends one `forall` (a `Pi` into `Prop`) per magic variable, inputs
/// first then outputs, in tensor-major order (spec §4.5 step 5).
fn prepend_magic_foralls(body: CoreExpr, num_inputs: usize, num_outputs: usize) -> CoreExpr {
    let p = Provenance::machine();
    let mut acc = body;
    for j in (0..num_outputs).rev() {
        let binder = Binder::mk(p, Origin::TheMachine, Visibility::Explicit, Some(Symbol::mk(format!("Y{j}"))), Expr::Builtin(p, BuiltinOp::Real));
        acc = Expr::Pi(p, binder, Box::new(acc));
    }
    for i in (0..num_inputs).rev() {
        let binder = Binder::mk(p, Origin::TheMachine, Visibility::Explicit, Some(Symbol::mk(format!("X{i}"))), Expr::Builtin(p, BuiltinOp::Real));
        acc = Expr::Pi(p, binder, Box::new(acc));
    }
    acc
}

/// Validates a network's declared type against `Pi (Tensor Real [n]) (Tensor
/// Real [m])` (spec §4.5 step 2), returning its scalar input/output widths.
fn network_shape(env: &Env, id: &Ident) -> Result<NetworkShape, SmtLibError> {
    let ty = env.ty_of(id).unwrap_or_else(|| crate::errors::bug("network identifier missing from env"));
    let kind_err = |kind| SmtLibError::UnsupportedNetworkType { name: id.clone(), kind };

    let Expr::Pi(_, binder, result) = whnf(env, ty) else {
        return Err(kind_err(UnsupportedNetworkKind::NotAFunction));
    };
    let inputs = tensor_width(env, &binder.ty).ok_or_else(|| kind_err(tensor_width_failure(env, &binder.ty)))?;
    let outputs = tensor_width(env, &result).ok_or_else(|| kind_err(tensor_width_failure(env, &result)))?;
    Ok(NetworkShape { inputs, outputs })
}

fn tensor_width(env: &Env, ty: &CoreExpr) -> Option<u64> {
    let ty = whnf(env, ty);
    let (Expr::Builtin(_, BuiltinOp::Tensor), [elem, dims]) = ty.decompose() else {
        return None;
    };
    if !matches!(whnf(env, &elem.value), Expr::Builtin(_, BuiltinOp::Real)) {
        return None;
    }
    let dims = whnf(env, &dims.value);
    let Expr::Seq(_, xs) = &dims else {
        return None;
    };
    let [only] = xs.as_slice() else {
        return None;
    };
    match whnf(env, only) {
        Expr::Literal(_, Literal::Nat(n)) => Some(n),
        _ => None,
    }
}

/// Only called once `tensor_width` has already failed, to classify *why*.
fn tensor_width_failure(env: &Env, ty: &CoreExpr) -> UnsupportedNetworkKind {
    let ty = whnf(env, ty);
    let (Expr::Builtin(_, BuiltinOp::Tensor), [elem, dims]) = ty.decompose() else {
        return UnsupportedNetworkKind::NotATensor;
    };
    if !matches!(whnf(env, &elem.value), Expr::Builtin(_, BuiltinOp::Real)) {
        return UnsupportedNetworkKind::WrongTensorType;
    }
    let dims = whnf(env, &dims.value);
    let Expr::Seq(_, xs) = &dims else {
        return UnsupportedNetworkKind::VariableSizeTensor;
    };
    match xs.as_slice() {
        [only] => match whnf(env, only) {
            Expr::Literal(_, Literal::Nat(_)) => crate::errors::bug("tensor_width_failure called on a width that actually resolved"),
            _ => UnsupportedNetworkKind::VariableSizeTensor,
        },
        _ => UnsupportedNetworkKind::MultidimensionalTensor,
    }
}

#[cfg(test)]
mod vnnlib_tests {
    use super::*;
    use crate::env::DeclInfo;
    use crate::expr::{explicit_arrow, mk_bound, mk_free, mk_lam, mk_literal, mk_type};

    fn p() -> Provenance {
        Provenance::machine()
    }

    fn tensor_real(n: u64) -> CoreExpr {
        Expr::apply(
            p(),
            Expr::Builtin(p(), BuiltinOp::Tensor),
            vec![Argument::explicit(p(), Expr::Builtin(p(), BuiltinOp::Real)), Argument::explicit(p(), Expr::Seq(p(), vec![mk_literal(p(), Literal::Nat(n))]))],
        )
    }

    fn identity_network_env() -> (Env, Ident) {
        let mut env = Env::new();
        let f = Ident::mk("f");
        env.insert(f.clone(), DeclInfo { ty: explicit_arrow(p(), tensor_real(1), tensor_real(1)), body: None, is_network: true });
        (env, f)
    }

    // Mirrors spec §8 S2: `every x : Tensor Real [1] . let y = f x in (y!0) >= 0.0`.
    #[test]
    fn identity_network_property_quantifies_one_input_and_output() {
        let (env, f) = identity_network_env();
        let x = mk_bound(p(), 0);
        let y = mk_bound(p(), 0);
        let at_y0 = Expr::apply(p(), Expr::Builtin(p(), BuiltinOp::At), vec![Argument::explicit(p(), y), Argument::explicit(p(), mk_literal(p(), Literal::Nat(0)))]);
        let ge = Expr::apply(
            p(),
            Expr::Builtin(p(), BuiltinOp::Ge),
            vec![Argument::explicit(p(), at_y0), Argument::explicit(p(), mk_literal(p(), Literal::Rat(0, 1)))],
        );
        let let_expr = Expr::Let(
            p(),
            Box::new(mk_app1(p(), mk_free(p(), f.clone()), Argument::explicit(p(), x))),
            crate::expr::Binder::mk(p(), Origin::UserWritten, Visibility::Explicit, None, tensor_real(1)),
            Box::new(ge),
        );
        let pred = mk_lam(p(), crate::expr::Binder::mk(p(), Origin::UserWritten, Visibility::Explicit, None, tensor_real(1)), let_expr);
        let every = Expr::apply(
            p(),
            Expr::Builtin(p(), BuiltinOp::Every),
            vec![
                Argument::mk(p(), Origin::TheMachine, Visibility::Implicit, tensor_real(1)),
                Argument::mk(p(), Origin::TheMachine, Visibility::Instance, Expr::PrimDict(p(), Box::new(mk_type(p(), 0)))),
                Argument::explicit(p(), pred),
            ],
        );

        let script = lower_property(&env, &Ident::mk("p"), &every).unwrap();
        assert_eq!(script.meta_network, vec![f]);
        assert_eq!(script.num_inputs, 1);
        assert_eq!(script.num_outputs, 1);
    }

    #[test]
    fn property_with_no_network_reference_is_rejected() {
        let env = Env::new();
        let body = mk_literal(p(), Literal::Bool(true));
        let err = lower_property(&env, &Ident::mk("p"), &body).unwrap_err();
        assert!(matches!(err, SmtLibError::NoNetworkUsedInProperty(_)));
    }

    #[test]
    fn bare_network_application_outside_a_let_is_not_anf() {
        let (env, f) = identity_network_env();
        let x = mk_bound(p(), 0);
        let applied = mk_app1(p(), mk_free(p(), f), Argument::explicit(p(), x));
        let at0 = Expr::apply(p(), Expr::Builtin(p(), BuiltinOp::At), vec![Argument::explicit(p(), applied), Argument::explicit(p(), mk_literal(p(), Literal::Nat(0)))]);
        let err = lower_property(&env, &Ident::mk("p"), &at0).unwrap_err();
        assert!(matches!(err, SmtLibError::NotAnf(_)));
    }

    #[test]
    fn network_whose_type_is_not_a_function_is_rejected() {
        let mut env = Env::new();
        let g = Ident::mk("g");
        env.insert(g.clone(), DeclInfo { ty: tensor_real(1), body: None, is_network: true });
        let err = network_shape(&env, &g).unwrap_err();
        assert!(matches!(err, SmtLibError::UnsupportedNetworkType { kind: UnsupportedNetworkKind::NotAFunction, .. }));
    }

    #[test]
    fn network_whose_dims_are_not_a_literal_width_is_variable_size() {
        let mut env = Env::new();
        let h = Ident::mk("h");
        let bad_dims = Expr::apply(
            p(),
            Expr::Builtin(p(), BuiltinOp::Tensor),
            vec![Argument::explicit(p(), Expr::Builtin(p(), BuiltinOp::Real)), Argument::explicit(p(), Expr::Seq(p(), vec![mk_bound(p(), 0)]))],
        );
        env.insert(h.clone(), DeclInfo { ty: explicit_arrow(p(), tensor_real(1), bad_dims), body: None, is_network: true });
        let err = network_shape(&env, &h).unwrap_err();
        assert!(matches!(err, SmtLibError::UnsupportedNetworkType { kind: UnsupportedNetworkKind::VariableSizeTensor, .. }));
    }
}

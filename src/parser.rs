//! Recursive-descent parser for the surface language (spec §6): turns the
//! flat token stream from `lexer` into a `SurfaceProgram`. Precedence is
//! handled by a fixed ladder of mutually recursive `parse_*` functions
//! rather than a table, since the grammar only has the handful of levels
//! spec.md actually lists.

use crate::builtins::BuiltinOp;
use crate::expr::{Argument, Binder, Expr, Literal, NamedVar, Origin, SurfaceExpr, Visibility};
use crate::lexer::{Lexer, ParseError, Tok};
use crate::name::Symbol;
use crate::program::{SurfaceDecl, SurfaceProgram};
use crate::provenance::Provenance;

pub fn parse_program(src: &str) -> Result<SurfaceProgram, ParseError> {
    let tokens = Lexer::tokenize(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_program()
}

struct Parser {
    tokens: Vec<(Tok, Provenance)>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].0
    }

    fn peek_prov(&self) -> Provenance {
        self.tokens[self.pos].1
    }

    fn bump(&mut self) -> (Tok, Provenance) {
        let pair = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        pair
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, expected: &'static str) -> PResult<Provenance> {
        if self.at(&tok) {
            Ok(self.bump().1)
        } else {
            Err(ParseError::UnexpectedToken { found: self.peek().clone(), expected, prov: self.peek_prov() })
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> PResult<(Symbol, Provenance)> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                let prov = self.peek_prov();
                self.bump();
                Ok((Symbol::mk(name), prov))
            }
            found => Err(ParseError::UnexpectedToken { found, expected, prov: self.peek_prov() }),
        }
    }

    // --- Declarations ---

    fn parse_program(&mut self) -> PResult<SurfaceProgram> {
        let mut decls = Vec::new();
        let mut pending_sigs: hashbrown::HashMap<Symbol, SurfaceExpr> = hashbrown::HashMap::new();

        while !self.at(&Tok::Eof) {
            match self.peek().clone() {
                Tok::Network => {
                    let start = self.bump().1;
                    let (id, _) = self.expect_ident("a network name")?;
                    self.expect(Tok::Colon, "`:`")?;
                    let ty = self.parse_expr()?;
                    let end = self.expect(Tok::Semi, "`;`")?;
                    decls.push(SurfaceDecl::Netw { prov: start.join(&end), id, ty });
                }
                Tok::Dataset => {
                    let start = self.bump().1;
                    let (id, _) = self.expect_ident("a dataset name")?;
                    self.expect(Tok::Colon, "`:`")?;
                    let ty = self.parse_expr()?;
                    let end = self.expect(Tok::Semi, "`;`")?;
                    decls.push(SurfaceDecl::Data { prov: start.join(&end), id, ty });
                }
                Tok::Type => {
                    let start = self.bump().1;
                    let (id, _) = self.expect_ident("a type definition name")?;
                    let binders = self.parse_binders()?;
                    self.expect(Tok::Eq, "`=`")?;
                    let rhs = self.parse_expr()?;
                    let end = self.expect(Tok::Semi, "`;`")?;
                    let body = wrap_lambdas(binders, rhs);
                    decls.push(SurfaceDecl::Def { prov: start.join(&end), id, ty: None, body });
                }
                Tok::Ident(_) => {
                    let (id, start) = self.expect_ident("a declaration name")?;
                    if self.eat(&Tok::Colon) {
                        let ty = self.parse_expr()?;
                        let end = self.expect(Tok::Semi, "`;`")?;
                        let _ = start.join(&end);
                        pending_sigs.insert(id, ty);
                    } else {
                        let binders = self.parse_binders()?;
                        self.expect(Tok::Eq, "`=`")?;
                        let rhs = self.parse_expr()?;
                        let end = self.expect(Tok::Semi, "`;`")?;
                        let body = wrap_lambdas(binders, rhs);
                        let ty = pending_sigs.remove(&id);
                        decls.push(SurfaceDecl::Def { prov: start.join(&end), id, ty, body });
                    }
                }
                found => return Err(ParseError::UnexpectedToken { found, expected: "a declaration", prov: self.peek_prov() }),
            }
        }
        Ok(SurfaceProgram { decls })
    }

    /// `x`, `(x : T)`, `{x}`, `{x : T}` — a definition's parameter list, up
    /// to the `=` that starts its body.
    fn parse_binders(&mut self) -> PResult<Vec<Binder<NamedVar>>> {
        let mut out = Vec::new();
        loop {
            match self.peek().clone() {
                Tok::Ident(name) => {
                    let prov = self.bump().1;
                    out.push(Binder::mk(prov, Origin::UserWritten, Visibility::Explicit, Some(Symbol::mk(name)), Expr::Hole(prov, Symbol::mk("_"))));
                }
                Tok::LParen => {
                    let start = self.bump().1;
                    let (name, _) = self.expect_ident("a binder name")?;
                    self.expect(Tok::Colon, "`:`")?;
                    let ty = self.parse_expr()?;
                    let end = self.expect(Tok::RParen, "`)`")?;
                    out.push(Binder::mk(start.join(&end), Origin::UserWritten, Visibility::Explicit, Some(name), ty));
                }
                Tok::LBrace => {
                    let start = self.bump().1;
                    let (name, _) = self.expect_ident("a binder name")?;
                    let ty = if self.eat(&Tok::Colon) { self.parse_expr()? } else { Expr::Hole(start, Symbol::mk("_")) };
                    let end = self.expect(Tok::RBrace, "`}`")?;
                    out.push(Binder::mk(start.join(&end), Origin::UserWritten, Visibility::Implicit, Some(name), ty));
                }
                _ => break,
            }
        }
        Ok(out)
    }

    // --- Expressions ---

    /// The single binder `forall`/`\`/`every`/`some` each bind before their
    /// terminator: `(x : T)`/`{x}`/`{x : T}` as in `parse_binders`, or the
    /// bare `x`/`x : T` shorthand these prefix forms use instead of
    /// parenthesizing (e.g. `forall x : Nat . x == x`). Only one binder;
    /// multiple quantified variables nest (`forall x : A . forall y : B . ..`).
    fn parse_quant_binder(&mut self) -> PResult<Binder<NamedVar>> {
        match self.peek().clone() {
            Tok::LParen => {
                let start = self.bump().1;
                let (name, _) = self.expect_ident("a binder name")?;
                self.expect(Tok::Colon, "`:`")?;
                let ty = self.parse_expr()?;
                let end = self.expect(Tok::RParen, "`)`")?;
                Ok(Binder::mk(start.join(&end), Origin::UserWritten, Visibility::Explicit, Some(name), ty))
            }
            Tok::LBrace => {
                let start = self.bump().1;
                let (name, _) = self.expect_ident("a binder name")?;
                let ty = if self.eat(&Tok::Colon) { self.parse_expr()? } else { Expr::Hole(start, Symbol::mk("_")) };
                let end = self.expect(Tok::RBrace, "`}`")?;
                Ok(Binder::mk(start.join(&end), Origin::UserWritten, Visibility::Implicit, Some(name), ty))
            }
            _ => {
                let (name, start) = self.expect_ident("a binder name")?;
                let ty = if self.eat(&Tok::Colon) { self.parse_expr()? } else { Expr::Hole(start, Symbol::mk("_")) };
                Ok(Binder::mk(start, Origin::UserWritten, Visibility::Explicit, Some(name), ty))
            }
        }
    }

    fn parse_expr(&mut self) -> PResult<SurfaceExpr> {
        match self.peek().clone() {
            Tok::Forall => {
                self.bump();
                let binder = self.parse_quant_binder()?;
                self.expect(Tok::Dot, "`.`")?;
                let body = self.parse_expr()?;
                let prov = binder.prov.join(&body.prov());
                Ok(Expr::Pi(prov, binder, Box::new(body)))
            }
            Tok::Backslash => {
                self.bump();
                let binder = self.parse_quant_binder()?;
                self.expect(Tok::Arrow, "`->`")?;
                let body = self.parse_expr()?;
                let prov = binder.prov.join(&body.prov());
                Ok(Expr::Lam(prov, binder, Box::new(body)))
            }
            Tok::Ident(name) if name == "every" || name == "some" => {
                let (plain_op, in_op) = if name == "every" { (BuiltinOp::Every, BuiltinOp::EveryIn) } else { (BuiltinOp::Some_, BuiltinOp::SomeIn) };
                self.parse_quantifier(plain_op, in_op)
            }
            Tok::Let => {
                let start = self.bump().1;
                let (name, _) = self.expect_ident("a let-bound name")?;
                let ty = if self.eat(&Tok::Colon) { self.parse_expr()? } else { Expr::Hole(start, Symbol::mk("_")) };
                self.expect(Tok::Eq, "`=`")?;
                let value = self.parse_expr()?;
                self.expect(Tok::In, "`in`")?;
                let body = self.parse_expr()?;
                let binder = Binder::mk(start, Origin::UserWritten, Visibility::Explicit, Some(name), ty);
                Ok(Expr::Let(start.join(&body.prov()), Box::new(value), binder, Box::new(body)))
            }
            Tok::If => {
                let start = self.bump().1;
                let cond = self.parse_expr()?;
                self.expect(Tok::Then, "`then`")?;
                let then_branch = self.parse_expr()?;
                self.expect(Tok::Else, "`else`")?;
                let else_branch = self.parse_expr()?;
                let prov = start.join(&else_branch.prov());
                Ok(Expr::apply(
                    prov,
                    Expr::Builtin(start, BuiltinOp::If),
                    vec![explicit(cond), explicit(then_branch), explicit(else_branch)],
                ))
            }
            _ => self.parse_implies(),
        }
    }

    /// `every`/`some x [: T] . body` and `every`/`some x [: T] in domain . body`
    /// (spec §8 S2/S5) — sugar over the `Every`/`Some_`/`EveryIn`/`SomeIn`
    /// builtins, which themselves only take a predicate (plus, for the
    /// `*In` family, the container); the bound variable becomes that
    /// predicate's lambda parameter.
    fn parse_quantifier(&mut self, plain_op: BuiltinOp, in_op: BuiltinOp) -> PResult<SurfaceExpr> {
        let start = self.bump().1;
        let binder = self.parse_quant_binder()?;
        if self.eat(&Tok::In) {
            let domain = self.parse_expr()?;
            self.expect(Tok::Dot, "`.`")?;
            let body = self.parse_expr()?;
            let pred = Expr::Lam(binder.prov.join(&body.prov()), binder, Box::new(body));
            let prov = start.join(&domain.prov());
            Ok(Expr::apply(prov, Expr::Builtin(start, in_op), vec![explicit(pred), explicit(domain)]))
        } else {
            self.expect(Tok::Dot, "`.`")?;
            let body = self.parse_expr()?;
            let prov = start.join(&body.prov());
            let pred = Expr::Lam(prov, binder, Box::new(body));
            Ok(Expr::apply(prov, Expr::Builtin(start, plain_op), vec![explicit(pred)]))
        }
    }

    fn parse_implies(&mut self) -> PResult<SurfaceExpr> {
        let lhs = self.parse_or()?;
        if self.eat(&Tok::FatArrow) {
            let rhs = self.parse_implies()?;
            Ok(binop(BuiltinOp::Implies, lhs, rhs))
        } else {
            Ok(lhs)
        }
    }

    fn parse_or(&mut self) -> PResult<SurfaceExpr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Tok::Or) {
            let rhs = self.parse_and()?;
            lhs = binop(BuiltinOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<SurfaceExpr> {
        let mut lhs = self.parse_not()?;
        while self.eat(&Tok::And) {
            let rhs = self.parse_not()?;
            lhs = binop(BuiltinOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> PResult<SurfaceExpr> {
        if self.at(&Tok::Not) {
            let start = self.bump().1;
            let inner = self.parse_not()?;
            let prov = start.join(&inner.prov());
            Ok(Expr::apply(prov, Expr::Builtin(start, BuiltinOp::Not), vec![explicit(inner)]))
        } else {
            self.parse_compare()
        }
    }

    fn parse_compare(&mut self) -> PResult<SurfaceExpr> {
        let lhs = self.parse_cons()?;
        let op = match self.peek() {
            Tok::EqEq => BuiltinOp::Eq,
            Tok::Neq => BuiltinOp::Neq,
            Tok::Le => BuiltinOp::Le,
            Tok::Lt => BuiltinOp::Lt,
            Tok::Ge => BuiltinOp::Ge,
            Tok::Gt => BuiltinOp::Gt,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.parse_cons()?;
        Ok(binop(op, lhs, rhs))
    }

    fn parse_cons(&mut self) -> PResult<SurfaceExpr> {
        let lhs = self.parse_additive()?;
        if self.eat(&Tok::ColonColon) {
            let rhs = self.parse_cons()?;
            Ok(binop(BuiltinOp::Cons, lhs, rhs))
        } else {
            Ok(lhs)
        }
    }

    fn parse_additive(&mut self) -> PResult<SurfaceExpr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Tok::Plus => BuiltinOp::Add,
                Tok::Minus => BuiltinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_mul()?;
            lhs = binop(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> PResult<SurfaceExpr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Tok::Star => BuiltinOp::Mul,
                Tok::Slash => BuiltinOp::Div,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = binop(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<SurfaceExpr> {
        if self.at(&Tok::Tilde) {
            let start = self.bump().1;
            let inner = self.parse_unary()?;
            let prov = start.join(&inner.prov());
            Ok(Expr::apply(prov, Expr::Builtin(start, BuiltinOp::Neg), vec![explicit(inner)]))
        } else {
            self.parse_at()
        }
    }

    fn parse_at(&mut self) -> PResult<SurfaceExpr> {
        let mut lhs = self.parse_app()?;
        while self.eat(&Tok::Bang) {
            let rhs = self.parse_app()?;
            lhs = binop(BuiltinOp::At, lhs, rhs);
        }
        Ok(lhs)
    }

    /// Application by juxtaposition: `f a {b} {{c}} d`.
    fn parse_app(&mut self) -> PResult<SurfaceExpr> {
        let mut head = self.parse_atom()?;
        loop {
            match self.peek() {
                Tok::LBrace => {
                    let start = self.bump().1;
                    let arg = self.parse_expr()?;
                    let end = self.expect(Tok::RBrace, "`}`")?;
                    let prov = head.prov().join(&end);
                    let argument = Argument::mk(start.join(&end), Origin::UserWritten, Visibility::Implicit, arg);
                    head = Expr::apply(prov, head, vec![argument]);
                }
                Tok::LBraceBrace => {
                    let start = self.bump().1;
                    let arg = self.parse_expr()?;
                    let end = self.expect(Tok::RBraceBrace, "`}}`")?;
                    let prov = head.prov().join(&end);
                    let argument = Argument::mk(start.join(&end), Origin::UserWritten, Visibility::Instance, arg);
                    head = Expr::apply(prov, head, vec![argument]);
                }
                tok if starts_atom(tok) => {
                    let arg = self.parse_atom()?;
                    let prov = head.prov().join(&arg.prov());
                    head = Expr::apply(prov, head, vec![explicit(arg)]);
                }
                _ => break,
            }
        }
        Ok(head)
    }

    fn parse_atom(&mut self) -> PResult<SurfaceExpr> {
        match self.peek().clone() {
            Tok::Nat(n) => {
                let prov = self.bump().1;
                Ok(Expr::Literal(prov, Literal::Nat(n)))
            }
            Tok::Rat(num, den) => {
                let prov = self.bump().1;
                Ok(Expr::Literal(prov, Literal::Rat(num, den)))
            }
            Tok::True => {
                let prov = self.bump().1;
                Ok(Expr::Literal(prov, Literal::Bool(true)))
            }
            Tok::False => {
                let prov = self.bump().1;
                Ok(Expr::Literal(prov, Literal::Bool(false)))
            }
            Tok::Hole(name) => {
                let prov = self.bump().1;
                Ok(Expr::Hole(prov, Symbol::mk(name)))
            }
            Tok::Ident(name) => {
                let prov = self.bump().1;
                match crate::builtins::lookup_builtin(&name) {
                    Some(op) => Ok(Expr::Builtin(prov, op)),
                    None => Ok(Expr::Var(prov, Symbol::mk(name))),
                }
            }
            Tok::Type => {
                let start = self.bump().1;
                match self.peek().clone() {
                    Tok::Nat(n) => {
                        let end = self.bump().1;
                        Ok(Expr::Type(start.join(&end), n as u32))
                    }
                    _ => Ok(Expr::Type(start, 0)),
                }
            }
            Tok::LBracket => {
                let start = self.bump().1;
                let mut items = Vec::new();
                if !self.at(&Tok::RBracket) {
                    items.push(self.parse_expr()?);
                    while self.eat(&Tok::Comma) {
                        items.push(self.parse_expr()?);
                    }
                }
                let end = self.expect(Tok::RBracket, "`]`")?;
                Ok(Expr::Seq(start.join(&end), items))
            }
            Tok::LParen => {
                let start = self.bump().1;
                let inner = self.parse_expr()?;
                if self.eat(&Tok::Colon) {
                    let ty = self.parse_expr()?;
                    let end = self.expect(Tok::RParen, "`)`")?;
                    Ok(Expr::Ann(start.join(&end), Box::new(inner), Box::new(ty)))
                } else {
                    let end = self.expect(Tok::RParen, "`)`")?;
                    let _ = start.join(&end);
                    Ok(inner)
                }
            }
            found => Err(ParseError::UnexpectedToken { found, expected: "an expression", prov: self.peek_prov() }),
        }
    }
}

fn starts_atom(tok: &Tok) -> bool {
    matches!(
        tok,
        Tok::Nat(_) | Tok::Rat(..) | Tok::True | Tok::False | Tok::Hole(_) | Tok::Ident(_) | Tok::Type | Tok::LBracket | Tok::LParen
    )
}

fn explicit(e: SurfaceExpr) -> Argument<NamedVar> {
    Argument::explicit(e.prov(), e)
}

fn binop(op: BuiltinOp, lhs: SurfaceExpr, rhs: SurfaceExpr) -> SurfaceExpr {
    let prov = lhs.prov().join(&rhs.prov());
    Expr::apply(prov, Expr::Builtin(prov, op), vec![explicit(lhs), explicit(rhs)])
}

fn wrap_lambdas(binders: Vec<Binder<NamedVar>>, body: SurfaceExpr) -> SurfaceExpr {
    binders.into_iter().rev().fold(body, |acc, b| {
        let prov = b.prov.join(&acc.prov());
        Expr::Lam(prov, b, Box::new(acc))
    })
}

#[cfg(test)]
mod parser_tests {
    use super::*;

    #[test]
    fn parses_signature_and_definition_into_one_def() {
        let prog = parse_program("id : Nat -> Nat;\nid x = x;").unwrap();
        assert_eq!(prog.decls.len(), 1);
        match &prog.decls[0] {
            SurfaceDecl::Def { ty, body, .. } => {
                assert!(ty.is_some());
                assert!(matches!(body, Expr::Lam(..)));
            }
            _ => panic!("expected a Def"),
        }
    }

    #[test]
    fn network_declaration() {
        let prog = parse_program("network f : Tensor Real [1] -> Tensor Real [1];").unwrap();
        assert_eq!(prog.decls.len(), 1);
        assert!(matches!(&prog.decls[0], SurfaceDecl::Netw { .. }));
    }

    #[test]
    fn arithmetic_respects_precedence() {
        let prog = parse_program("p = 1 + 2 * 3;").unwrap();
        match &prog.decls[0] {
            SurfaceDecl::Def { body, .. } => {
                let (head, args) = body.decompose();
                assert!(matches!(head, Expr::Builtin(_, BuiltinOp::Add)));
                assert_eq!(args.len(), 2);
                assert!(matches!(*args[1].value, Expr::App(..)));
            }
            _ => panic!("expected a Def"),
        }
    }

    #[test]
    fn forall_desugars_to_pi_chain() {
        let prog = parse_program("p = forall x : Nat . x == x;").unwrap();
        match &prog.decls[0] {
            SurfaceDecl::Def { body, .. } => assert!(matches!(body, Expr::Pi(..))),
            _ => panic!("expected a Def"),
        }
    }

    #[test]
    fn every_network_property_roundtrips_shape() {
        let src = "network f : Tensor Real [1] -> Tensor Real [1];\nsafe = every x : Tensor Real [1] . let y = f x in (y ! 0) >= 0.0;";
        let prog = parse_program(src).unwrap();
        assert_eq!(prog.decls.len(), 2);
    }
}

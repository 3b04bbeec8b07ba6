//! Tokeniser for the surface language (spec §6).
//!
//! A flat, hand-written character scanner rather than a generated one: the
//! token set is small and fixed, so a `Peekable<CharIndices>` walk is
//! clearer than pulling in a lexer-generator crate for it.

use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

use crate::provenance::Provenance;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Nat(u64),
    /// A decimal literal (`0.5`), already reduced to a rational.
    Rat(i64, u64),

    // Keywords
    Network,
    Dataset,
    Type,
    Let,
    In,
    If,
    Then,
    Else,
    Forall,
    And,
    Or,
    Not,
    True,
    False,

    Hole(String),

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBraceBrace,
    RBraceBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semi,
    Dot,
    Eq,
    Arrow,
    FatArrow,
    Backslash,

    // Operators (kept as their own tokens so the parser doesn't have to
    // re-derive precedence from `lookup_builtin`'s name table)
    EqEq,
    Neq,
    Le,
    Lt,
    Ge,
    Gt,
    Plus,
    Minus,
    Star,
    Slash,
    Tilde,
    ColonColon,
    Bang,

    Eof,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected character `{ch}` at {prov}")]
    UnexpectedChar { ch: char, prov: Provenance },
    #[error("unterminated hole (expected an identifier after `?`) at {prov}")]
    UnterminatedHole { prov: Provenance },
    #[error("unexpected token {found:?} at {prov}, expected {expected}")]
    UnexpectedToken { found: Tok, expected: &'static str, prov: Provenance },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: &'static str },
    #[error("invalid numeric literal `{text}` at {prov}")]
    BadNumber { text: String, prov: Provenance },
}

pub struct Lexer<'s> {
    src: &'s str,
    chars: Peekable<CharIndices<'s>>,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Lexer { src, chars: src.char_indices().peekable() }
    }

    /// Tokenises the whole input up front; the parser consumes the
    /// resulting slice with simple index bookkeeping rather than driving
    /// the scanner itself.
    pub fn tokenize(src: &'s str) -> Result<Vec<(Tok, Provenance)>, ParseError> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let (tok, prov) = lexer.next_token()?;
            let is_eof = tok == Tok::Eof;
            out.push((tok, prov));
            if is_eof {
                return Ok(out);
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        self.chars.next()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Result<(Tok, Provenance), ParseError> {
        self.skip_trivia();
        let (start, c) = match self.bump() {
            Some(pair) => pair,
            None => return Ok((Tok::Eof, Provenance::mk(self.src.len() as u32, self.src.len() as u32))),
        };

        let single = |tok: Tok, end: usize| Ok((tok, Provenance::mk(start as u32, end as u32)));

        match c {
            '(' => single(Tok::LParen, start + 1),
            ')' => single(Tok::RParen, start + 1),
            '[' => single(Tok::LBracket, start + 1),
            ']' => single(Tok::RBracket, start + 1),
            ',' => single(Tok::Comma, start + 1),
            ':' => {
                if self.peek_char() == Some(':') {
                    self.bump();
                    single(Tok::ColonColon, start + 2)
                } else {
                    single(Tok::Colon, start + 1)
                }
            }
            ';' => single(Tok::Semi, start + 1),
            '.' => single(Tok::Dot, start + 1),
            '\\' => single(Tok::Backslash, start + 1),
            '~' => single(Tok::Tilde, start + 1),
            '!' => single(Tok::Bang, start + 1),
            '+' => single(Tok::Plus, start + 1),
            '-' => {
                if self.peek_char() == Some('>') {
                    self.bump();
                    single(Tok::Arrow, start + 2)
                } else {
                    single(Tok::Minus, start + 1)
                }
            }
            '*' => single(Tok::Star, start + 1),
            '/' => single(Tok::Slash, start + 1),
            '=' => match self.peek_char() {
                Some('=') => {
                    self.bump();
                    single(Tok::EqEq, start + 2)
                }
                Some('>') => {
                    self.bump();
                    single(Tok::FatArrow, start + 2)
                }
                _ => single(Tok::Eq, start + 1),
            },
            '<' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    single(Tok::Le, start + 2)
                } else {
                    single(Tok::Lt, start + 1)
                }
            }
            '>' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    single(Tok::Ge, start + 2)
                } else {
                    single(Tok::Gt, start + 1)
                }
            }
            '{' => {
                if self.peek_char() == Some('{') {
                    self.bump();
                    single(Tok::LBraceBrace, start + 2)
                } else {
                    single(Tok::LBrace, start + 1)
                }
            }
            '}' => {
                if self.peek_char() == Some('}') {
                    self.bump();
                    single(Tok::RBraceBrace, start + 2)
                } else {
                    single(Tok::RBrace, start + 1)
                }
            }
            '?' => {
                let name_start = start + 1;
                let mut end = name_start;
                while let Some(c) = self.peek_char() {
                    if is_ident_continue(c) {
                        end += c.len_utf8();
                        self.bump();
                    } else {
                        break;
                    }
                }
                if end == name_start {
                    return Err(ParseError::UnterminatedHole { prov: Provenance::mk(start as u32, end as u32) });
                }
                Ok((Tok::Hole(self.src[name_start..end].to_string()), Provenance::mk(start as u32, end as u32)))
            }
            c if c.is_ascii_digit() => self.lex_number(start),
            c if is_ident_start(c) => self.lex_ident(start),
            c => Err(ParseError::UnexpectedChar { ch: c, prov: Provenance::mk(start as u32, (start + c.len_utf8()) as u32) }),
        }
    }

    fn lex_number(&mut self, start: usize) -> Result<(Tok, Provenance), ParseError> {
        let mut end = start + 1;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                end += 1;
                self.bump();
            } else {
                break;
            }
        }
        let mut is_rat = false;
        if self.peek_char() == Some('.') {
            // Only consume the dot as a decimal point if a digit follows
            // it; otherwise it's the `.` that ends a `forall`/`\` binder
            // list, e.g. `forall x : Nat . x == x`.
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some((_, c)) if c.is_ascii_digit()) {
                is_rat = true;
                end += 1;
                self.bump();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_digit() {
                        end += 1;
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        let text = &self.src[start..end];
        let prov = Provenance::mk(start as u32, end as u32);
        if is_rat {
            let (int_part, frac_part) = text.split_once('.').expect("checked above");
            let denom = 10u64.pow(frac_part.len() as u32);
            let numer: i64 = format!("{int_part}{frac_part}").parse().map_err(|_| ParseError::BadNumber { text: text.to_string(), prov })?;
            Ok((Tok::Rat(numer, denom), prov))
        } else {
            let n: u64 = text.parse().map_err(|_| ParseError::BadNumber { text: text.to_string(), prov })?;
            Ok((Tok::Nat(n), prov))
        }
    }

    fn lex_ident(&mut self, start: usize) -> Result<(Tok, Provenance), ParseError> {
        let mut end = start + 1;
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                end += c.len_utf8();
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[start..end];
        let prov = Provenance::mk(start as u32, end as u32);
        let tok = match text {
            "network" => Tok::Network,
            "dataset" => Tok::Dataset,
            "type" => Tok::Type,
            "let" => Tok::Let,
            "in" => Tok::In,
            "if" => Tok::If,
            "then" => Tok::Then,
            "else" => Tok::Else,
            "forall" => Tok::Forall,
            "and" => Tok::And,
            "or" => Tok::Or,
            "not" => Tok::Not,
            "true" | "True" => Tok::True,
            "false" | "False" => Tok::False,
            _ => Tok::Ident(text.to_string()),
        };
        Ok((tok, prov))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod lexer_tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        Lexer::tokenize(src).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_and_punctuation() {
        assert_eq!(toks("forall x : Nat . x == x"), vec![
            Tok::Forall, Tok::Ident("x".into()), Tok::Colon, Tok::Ident("Nat".into()), Tok::Dot,
            Tok::Ident("x".into()), Tok::EqEq, Tok::Ident("x".into()), Tok::Eof,
        ]);
    }

    #[test]
    fn decimal_literal_splits_into_numerator_and_denominator() {
        assert_eq!(toks("0.25"), vec![Tok::Rat(25, 100), Tok::Eof]);
    }

    #[test]
    fn comment_is_skipped_to_end_of_line() {
        assert_eq!(toks("x # this is a comment\ny"), vec![Tok::Ident("x".into()), Tok::Ident("y".into()), Tok::Eof]);
    }

    #[test]
    fn hole_captures_its_name() {
        assert_eq!(toks("?foo"), vec![Tok::Hole("foo".into()), Tok::Eof]);
    }

    #[test]
    fn instance_braces_are_distinct_tokens() {
        assert_eq!(toks("{{e}}"), vec![Tok::LBraceBrace, Tok::Ident("e".into()), Tok::RBraceBrace, Tok::Eof]);
    }
}

//! Snippet parser
//!
//! A small Pratt parser producing the AST the evaluator walks. Programs
//! are statement sequences; the compiler guarantees the interesting part
//! (the function call under test) is the final expression statement.
//!
//! Arrow functions are the one ambiguous construct: `(a, b = 1) => …`
//! shares its prefix with a parenthesized expression, so the parser
//! speculatively reads a parameter list and rewinds when no `=>` follows.

use crate::error::EvalError;
use crate::lexer::{tokenize, Token};

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    Array(Vec<Expr>),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Property access, e.g. `Math.max` or `xs.length`
    Member {
        object: Box<Expr>,
        property: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Arrow {
        params: Vec<Param>,
        body: ArrowBody,
    },
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

/// Arrow-function parameter with an optional default expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

/// Arrow-function body: a bare expression or a statement block.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrowBody {
    Expr(Box<Expr>),
    Block(Vec<Stmt>),
}

/// Statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: String, init: Expr },
    Assign { name: String, value: Expr },
    Return(Option<Expr>),
    Expr(Expr),
}

/// A parsed program: a statement sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

/// Parse a source snippet into a [`Program`].
pub fn parse(source: &str) -> Result<Program, EvalError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut stmts = Vec::new();
    while !parser.at_end() {
        stmts.push(parser.statement()?);
    }
    Ok(Program { stmts })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), EvalError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(EvalError::Parse(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn statement(&mut self) -> Result<Stmt, EvalError> {
        let stmt = match self.peek() {
            Some(Token::Let) => {
                self.pos += 1;
                let name = self.ident()?;
                self.expect(&Token::Assign)?;
                let init = self.expression(0)?;
                Stmt::Let { name, init }
            }
            Some(Token::Return) => {
                self.pos += 1;
                let value = match self.peek() {
                    None | Some(Token::Semi) | Some(Token::RBrace) => None,
                    _ => Some(self.expression(0)?),
                };
                Stmt::Return(value)
            }
            // `name = …` (but not `name => …` or `name == …`) is assignment
            Some(Token::Ident(_)) if self.peek_at(1) == Some(&Token::Assign) => {
                let name = self.ident()?;
                self.pos += 1;
                let value = self.expression(0)?;
                Stmt::Assign { name, value }
            }
            _ => Stmt::Expr(self.expression(0)?),
        };
        self.eat(&Token::Semi);
        Ok(stmt)
    }

    fn ident(&mut self) -> Result<String, EvalError> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(EvalError::Parse(format!(
                "expected identifier, found {other:?}"
            ))),
        }
    }

    fn expression(&mut self, min_bp: u8) -> Result<Expr, EvalError> {
        let mut lhs = self.prefix()?;

        loop {
            let Some(token) = self.peek() else { break };
            match token {
                // Postfix: call, member, index
                Token::LParen => {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if !self.eat(&Token::RParen) {
                        loop {
                            args.push(self.expression(0)?);
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                        self.expect(&Token::RParen)?;
                    }
                    lhs = Expr::Call {
                        callee: Box::new(lhs),
                        args,
                    };
                }
                Token::Dot => {
                    self.pos += 1;
                    let property = self.ident()?;
                    lhs = Expr::Member {
                        object: Box::new(lhs),
                        property,
                    };
                }
                Token::LBracket => {
                    self.pos += 1;
                    let index = self.expression(0)?;
                    self.expect(&Token::RBracket)?;
                    lhs = Expr::Index {
                        object: Box::new(lhs),
                        index: Box::new(index),
                    };
                }
                _ => {
                    let Some((op, lbp, rbp)) = binary_op(token) else {
                        break;
                    };
                    if lbp < min_bp {
                        break;
                    }
                    self.pos += 1;
                    let rhs = self.expression(rbp)?;
                    lhs = Expr::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    };
                }
            }
        }

        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Some(Token::LParen) => {
                // Speculative arrow parse; rewind if it is a grouping
                let saved = self.pos;
                if let Some(expr) = self.try_arrow()? {
                    return Ok(expr);
                }
                self.pos = saved;
                self.pos += 1;
                let inner = self.expression(0)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            // Single-parameter arrow without parentheses: `x => …`
            Some(Token::Ident(_)) if self.peek_at(1) == Some(&Token::Arrow) => {
                let name = self.ident()?;
                self.pos += 1;
                let body = self.arrow_body()?;
                Ok(Expr::Arrow {
                    params: vec![Param {
                        name,
                        default: None,
                    }],
                    body,
                })
            }
            Some(Token::LBracket) => {
                self.pos += 1;
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.expression(0)?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RBracket)?;
                }
                Ok(Expr::Array(items))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                let expr = self.expression(8)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(expr),
                })
            }
            Some(Token::Bang) => {
                self.pos += 1;
                let expr = self.expression(8)?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(expr),
                })
            }
            _ => match self.advance() {
                Some(Token::Number(n)) => Ok(Expr::Number(n)),
                Some(Token::Str(s)) => Ok(Expr::Str(s)),
                Some(Token::True) => Ok(Expr::Bool(true)),
                Some(Token::False) => Ok(Expr::Bool(false)),
                Some(Token::Null) => Ok(Expr::Null),
                Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
                other => Err(EvalError::Parse(format!(
                    "unexpected token {other:?}"
                ))),
            },
        }
    }

    /// Attempt `( params ) => body` from the current position. Returns
    /// `Ok(None)` when the lookahead does not commit to an arrow, leaving
    /// the caller to rewind.
    fn try_arrow(&mut self) -> Result<Option<Expr>, EvalError> {
        debug_assert_eq!(self.peek(), Some(&Token::LParen));
        self.pos += 1;

        let mut params = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                let name = match self.advance() {
                    Some(Token::Ident(name)) => name,
                    _ => return Ok(None),
                };
                let default = if self.eat(&Token::Assign) {
                    // Defaults may be full expressions; a parse failure
                    // here means this was never a parameter list
                    match self.expression(0) {
                        Ok(expr) => Some(expr),
                        Err(_) => return Ok(None),
                    }
                } else {
                    None
                };
                params.push(Param { name, default });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            if !self.eat(&Token::RParen) {
                return Ok(None);
            }
        }

        if !self.eat(&Token::Arrow) {
            return Ok(None);
        }

        let body = self.arrow_body()?;
        Ok(Some(Expr::Arrow { params, body }))
    }

    fn arrow_body(&mut self) -> Result<ArrowBody, EvalError> {
        if self.eat(&Token::LBrace) {
            let mut stmts = Vec::new();
            while !self.eat(&Token::RBrace) {
                if self.at_end() {
                    return Err(EvalError::Parse("unterminated block".into()));
                }
                stmts.push(self.statement()?);
            }
            Ok(ArrowBody::Block(stmts))
        } else {
            Ok(ArrowBody::Expr(Box::new(self.expression(0)?)))
        }
    }
}

/// Binding powers for infix operators: `(op, left_bp, right_bp)`.
/// `**` binds tighter than `*` and is right-associative.
fn binary_op(token: &Token) -> Option<(BinaryOp, u8, u8)> {
    Some(match token {
        Token::OrOr => (BinaryOp::Or, 1, 2),
        Token::AndAnd => (BinaryOp::And, 2, 3),
        Token::Eq => (BinaryOp::Eq, 3, 4),
        Token::NotEq => (BinaryOp::NotEq, 3, 4),
        Token::Lt => (BinaryOp::Lt, 4, 5),
        Token::LtEq => (BinaryOp::LtEq, 4, 5),
        Token::Gt => (BinaryOp::Gt, 4, 5),
        Token::GtEq => (BinaryOp::GtEq, 4, 5),
        Token::Plus => (BinaryOp::Add, 5, 6),
        Token::Minus => (BinaryOp::Sub, 5, 6),
        Token::Star => (BinaryOp::Mul, 6, 7),
        Token::Slash => (BinaryOp::Div, 6, 7),
        Token::Percent => (BinaryOp::Rem, 6, 7),
        Token::StarStar => (BinaryOp::Pow, 8, 7),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaulted_arrow() {
        let program = parse("(min = 0, value) => Math.max(value, min)").unwrap();
        assert_eq!(program.stmts.len(), 1);
        let Stmt::Expr(Expr::Arrow { params, .. }) = &program.stmts[0] else {
            panic!("expected arrow expression");
        };
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "min");
        assert!(params[0].default.is_some());
        assert!(params[1].default.is_none());
    }

    #[test]
    fn parenthesized_expression_is_not_an_arrow() {
        let program = parse("(1 + 2) * 3").unwrap();
        let Stmt::Expr(Expr::Binary { op, .. }) = &program.stmts[0] else {
            panic!("expected binary expression");
        };
        assert_eq!(*op, BinaryOp::Mul);
    }

    #[test]
    fn immediate_call_of_arrow() {
        let program = parse("((a, b) => a + b)(1, 2)").unwrap();
        let Stmt::Expr(Expr::Call { callee, args }) = &program.stmts[0] else {
            panic!("expected call");
        };
        assert!(matches!(**callee, Expr::Arrow { .. }));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn block_body_with_return() {
        let program = parse("(x) => { let y = x * 2; return y + 1 }").unwrap();
        let Stmt::Expr(Expr::Arrow { body, .. }) = &program.stmts[0] else {
            panic!("expected arrow");
        };
        let ArrowBody::Block(stmts) = body else {
            panic!("expected block body");
        };
        assert_eq!(stmts.len(), 2);
        assert!(matches!(stmts[1], Stmt::Return(Some(_))));
    }

    #[test]
    fn statement_sequence_with_lets() {
        let program = parse("let d12 = 4;\nlet solar = d12;\nsolar * 2").unwrap();
        assert_eq!(program.stmts.len(), 3);
    }

    #[test]
    fn assignment_vs_equality() {
        let program = parse("x = 1; x == 1").unwrap();
        assert!(matches!(program.stmts[0], Stmt::Assign { .. }));
        assert!(matches!(
            program.stmts[1],
            Stmt::Expr(Expr::Binary {
                op: BinaryOp::Eq,
                ..
            })
        ));
    }

    #[test]
    fn power_is_right_associative() {
        let program = parse("2 ** 3 ** 2").unwrap();
        let Stmt::Expr(Expr::Binary { rhs, .. }) = &program.stmts[0] else {
            panic!("expected binary");
        };
        assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn unclosed_paren_is_an_error() {
        assert!(parse("(1 + 2").is_err());
    }
}

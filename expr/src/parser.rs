//! Recursive-descent parser with Pratt-style binary operator climbing.
//!
//! Precedence, low to high: `||`, `&&`, equality, comparison, additive,
//! multiplicative, unary, postfix (call / member), primary. The ternary
//! `cond ? then : else` binds looser than `||` and is right-associative.

use crate::ast::{BinOp, Expr, Literal, UnOp};
use crate::error::ParseError;
use crate::lexer::{Spanned, Token};

/// Parses a flat token stream into an [`Expr`] tree.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    /// Create a parser over an already-tokenized stream.
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn peek_pos(&self) -> crate::error::Position {
        self.tokens[self.pos].pos
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ParseError> {
        if self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken(
                format!("{:?}", self.peek()),
                self.peek_pos(),
            ))
        }
    }

    /// Parse a complete expression, requiring EOF immediately after.
    pub fn parse(mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_ternary()?;
        if *self.peek() != Token::Eof {
            return Err(ParseError::UnexpectedToken(
                format!("{:?}", self.peek()),
                self.peek_pos(),
            ));
        }
        Ok(expr)
    }

    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if *self.peek() == Token::Question {
            self.advance();
            let then = self.parse_ternary()?;
            self.expect(&Token::Colon)?;
            let otherwise = self.parse_ternary()?;
            return Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(otherwise)));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == Token::OrOr {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_equality()?;
        while *self.peek() == Token::AndAnd {
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Lt => BinOp::Lt,
                Token::Le => BinOp::Le,
                Token::Gt => BinOp::Gt,
                Token::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Token::Bang => {
                self.advance();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary()?)))
            }
            Token::Minus => {
                self.advance();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if *self.peek() == Token::LParen {
                self.advance();
                let mut args = Vec::new();
                if *self.peek() != Token::RParen {
                    loop {
                        args.push(self.parse_ternary()?);
                        if *self.peek() == Token::Comma {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(&Token::RParen)?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.peek_pos();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(s))),
            Token::Bool(b) => Ok(Expr::Literal(Literal::Bool(b))),
            Token::Null => Ok(Expr::Literal(Literal::Null)),
            Token::Ident(name) => {
                let mut segments = vec![name];
                while *self.peek() == Token::Dot {
                    self.advance();
                    match self.advance() {
                        Token::Ident(seg) => segments.push(seg),
                        other => {
                            return Err(ParseError::UnexpectedToken(
                                format!("{other:?}"),
                                self.peek_pos(),
                            ))
                        }
                    }
                }
                Ok(Expr::Ident(segments))
            }
            Token::LParen => {
                let inner = self.parse_ternary()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::Group(Box::new(inner)))
            }
            other => Err(ParseError::UnexpectedToken(format!("{other:?}"), pos)),
        }
    }
}

/// Convenience entry point: lex and parse `src` in one call.
pub fn parse(src: &str) -> Result<Expr, crate::error::ExprError> {
    let tokens = crate::lexer::Lexer::new(src).tokenize()?;
    Ok(Parser::new(tokens).parse()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_identifiers() {
        let expr = parse("data.temp >= constant.threshold").unwrap();
        assert!(matches!(expr, Expr::Binary(BinOp::Ge, _, _)));
    }

    #[test]
    fn parses_call_on_member() {
        let expr = parse("Math.sqrt(data.x)").unwrap();
        match expr {
            Expr::Call(callee, args) => {
                assert_eq!(*callee, Expr::Ident(vec!["Math".into(), "sqrt".into()]));
                assert_eq!(args.len(), 1);
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn ternary_is_right_associative_and_looser_than_or() {
        let expr = parse("a || b ? 1 : 2").unwrap();
        assert!(matches!(expr, Expr::Ternary(..)));
    }
}

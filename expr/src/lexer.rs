//! Tokenizer for the sandboxed expression grammar.

use crate::error::{LexError, Position};

/// A single lexical token, tagged with its source [`Position`] for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeric literal
    Number(f64),
    /// Quoted string literal (escapes already resolved)
    Str(String),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
    /// Bare identifier segment (dots are separate [`Token::Dot`] tokens)
    Ident(String),
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `?`
    Question,
    /// `:`
    Colon,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `!`
    Bang,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// End of input
    Eof,
}

/// A token together with the position it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    /// The token kind
    pub token: Token,
    /// Where it started in the source
    pub pos: Position,
}

/// Converts expression source text into a flat vector of [`Spanned`] tokens.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `src`.
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.char_indices().peekable(),
            src,
            line: 1,
            col: 1,
        }
    }

    fn pos(&self) -> Position {
        Position {
            line: self.line,
            column: self.col,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    /// Tokenize the entire input, ending with a trailing [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LexError> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos();
            let Some(c) = self.peek_char() else {
                out.push(Spanned {
                    token: Token::Eof,
                    pos: start,
                });
                break;
            };
            let token = match c {
                '0'..='9' => self.read_number(start)?,
                '"' | '\'' => self.read_string(c, start)?,
                c if c.is_alphabetic() || c == '_' => self.read_ident(),
                '.' => {
                    self.bump();
                    Token::Dot
                }
                ',' => {
                    self.bump();
                    Token::Comma
                }
                '(' => {
                    self.bump();
                    Token::LParen
                }
                ')' => {
                    self.bump();
                    Token::RParen
                }
                '?' => {
                    self.bump();
                    Token::Question
                }
                ':' => {
                    self.bump();
                    Token::Colon
                }
                '+' => {
                    self.bump();
                    Token::Plus
                }
                '-' => {
                    self.bump();
                    Token::Minus
                }
                '*' => {
                    self.bump();
                    Token::Star
                }
                '/' => {
                    self.bump();
                    Token::Slash
                }
                '&' => {
                    self.bump();
                    self.expect_char('&', start)?;
                    Token::AndAnd
                }
                '|' => {
                    self.bump();
                    self.expect_char('|', start)?;
                    Token::OrOr
                }
                '!' => {
                    self.bump();
                    if self.peek_char() == Some('=') {
                        self.bump();
                        Token::NotEq
                    } else {
                        Token::Bang
                    }
                }
                '=' => {
                    self.bump();
                    self.expect_char('=', start)?;
                    Token::EqEq
                }
                '<' => {
                    self.bump();
                    if self.peek_char() == Some('=') {
                        self.bump();
                        Token::Le
                    } else {
                        Token::Lt
                    }
                }
                '>' => {
                    self.bump();
                    if self.peek_char() == Some('=') {
                        self.bump();
                        Token::Ge
                    } else {
                        Token::Gt
                    }
                }
                other => return Err(LexError::UnexpectedCharacter(other, start)),
            };
            out.push(Spanned { token, pos: start });
        }
        Ok(out)
    }

    fn expect_char(&mut self, expected: char, start: Position) -> Result<(), LexError> {
        if self.peek_char() == Some(expected) {
            self.bump();
            Ok(())
        } else {
            Err(LexError::UnexpectedCharacter(expected, start))
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self, start: Position) -> Result<Token, LexError> {
        let begin = self.chars.peek().map(|(i, _)| *i).unwrap_or(0);
        let mut end = begin;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '.' {
                end = self.chars.peek().map(|(i, _)| *i + 1).unwrap_or(end + 1);
                self.bump();
            } else {
                break;
            }
        }
        self.src[begin..end]
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| LexError::InvalidNumber(start))
    }

    fn read_string(&mut self, quote: char, start: Position) -> Result<Token, LexError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(Token::Str(out)),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => return Err(LexError::UnterminatedString(start)),
                },
                Some(c) => out.push(c),
                None => return Err(LexError::UnterminatedString(start)),
            }
        }
    }

    fn read_ident(&mut self) -> Token {
        let begin = self.chars.peek().map(|(i, _)| *i).unwrap_or(0);
        let mut end = begin;
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' {
                end = self.chars.peek().map(|(i, _)| *i + 1).unwrap_or(end + 1);
                self.bump();
            } else {
                break;
            }
        }
        match &self.src[begin..end] {
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            "null" => Token::Null,
            other => Token::Ident(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_comparison() {
        let toks = Lexer::new("data.x >= 3.5 && !instance.state == \"on\"")
            .tokenize()
            .unwrap();
        assert!(matches!(toks[0].token, Token::Ident(_)));
        assert!(toks.iter().any(|s| s.token == Token::Ge));
        assert!(toks.iter().any(|s| s.token == Token::AndAnd));
        assert!(toks.iter().any(|s| s.token == Token::Bang));
        assert_eq!(toks.last().unwrap().token, Token::Eof);
    }
}

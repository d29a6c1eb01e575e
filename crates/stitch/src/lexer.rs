//! Streaming, single-pass, byte-oriented lexer.
//!
//! The lexer pulls bytes from any [`io::Read`] source through a small
//! refillable buffer and hands out one [`Token`] per call to
//! [`Lexer::next_token`]. Whitespace is absorbed; `#` comments are emitted as
//! [`TokenKind::Comment`] tokens so the parser may preserve them. Any byte
//! that starts no token is a fatal error and ends the stream.

use std::io::{self, Read};

use crate::{
    error::LexError,
    token::{Position, Token, TokenKind},
};

const BUFFER_SIZE: usize = 256;

pub struct Lexer<R> {
    input: R,
    buffer: Vec<u8>,
    read_pos: usize,
    position: Position,
    /// Set once the underlying reader reports end of input.
    exhausted: bool,
}

impl<R: Read> Lexer<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            buffer: Vec::with_capacity(BUFFER_SIZE),
            read_pos: 0,
            position: Position::default(),
            exhausted: false,
        }
    }

    /// Produces the next token, or [`TokenKind::Eof`] once the input is
    /// exhausted. After an error the stream must not be polled again.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            let pos = self.position;
            let Some(ch) = self.peek_byte()? else {
                return Ok(Token::eof(pos));
            };

            match ch {
                b'0'..=b'9' => return self.lex_numeric(pos),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => return self.lex_identifier(pos),
                b'+' => return self.take_single(TokenKind::Plus, "+", pos),
                b'-' => {
                    self.take_byte()?;
                    if self.peek_byte()? == Some(b'>') {
                        self.take_byte()?;
                        return Ok(Token::new(TokenKind::Arrow, "->", pos));
                    }
                    return Ok(Token::new(TokenKind::Minus, "-", pos));
                }
                b'*' => return self.take_single(TokenKind::Star, "*", pos),
                b'/' => return self.take_single(TokenKind::Slash, "/", pos),
                b'%' => return self.take_single(TokenKind::Percent, "%", pos),
                b'(' => return self.take_single(TokenKind::LParen, "(", pos),
                b')' => return self.take_single(TokenKind::RParen, ")", pos),
                b'{' => return self.take_single(TokenKind::LBrace, "{", pos),
                b'}' => return self.take_single(TokenKind::RBrace, "}", pos),
                b'[' => return self.take_single(TokenKind::LBracket, "[", pos),
                b']' => return self.take_single(TokenKind::RBracket, "]", pos),
                b';' => return self.take_single(TokenKind::Semicolon, ";", pos),
                b',' => return self.take_single(TokenKind::Comma, ",", pos),
                b':' => return self.take_single(TokenKind::Colon, ":", pos),
                b'.' => return self.take_single(TokenKind::Dot, ".", pos),
                b'@' => return self.take_single(TokenKind::At, "@", pos),
                b'<' => return self.lex_maybe_eq(TokenKind::Lt, "<", TokenKind::LtEq, "<=", pos),
                b'>' => return self.lex_maybe_eq(TokenKind::Gt, ">", TokenKind::GtEq, ">=", pos),
                b'!' => return self.lex_maybe_eq(TokenKind::Bang, "!", TokenKind::NotEq, "!=", pos),
                b'=' => return self.lex_maybe_eq(TokenKind::Assign, "=", TokenKind::Eq, "==", pos),
                b'"' => return self.lex_string(pos),
                b'#' => return self.lex_comment(pos),
                b' ' | b'\t' => {
                    self.take_byte()?;
                }
                b'\n' => {
                    self.take_byte()?;
                    self.position.advance_line();
                }
                other => {
                    self.take_byte()?;
                    return Err(LexError::UnexpectedChar {
                        ch: other as char,
                        line: pos.line,
                        column: pos.column,
                    });
                }
            }
        }
    }

    fn take_single(&mut self, kind: TokenKind, text: &str, pos: Position) -> Result<Token, LexError> {
        self.take_byte()?;
        Ok(Token::new(kind, text, pos))
    }

    /// Lexes a one-character operator that widens to a two-character form
    /// when followed by `=`.
    fn lex_maybe_eq(
        &mut self,
        short: TokenKind,
        short_text: &str,
        long: TokenKind,
        long_text: &str,
        pos: Position,
    ) -> Result<Token, LexError> {
        self.take_byte()?;
        if self.peek_byte()? == Some(b'=') {
            self.take_byte()?;
            Ok(Token::new(long, long_text, pos))
        } else {
            Ok(Token::new(short, short_text, pos))
        }
    }

    /// A run of digits containing at most one `.`: no dot classifies as an
    /// integer, one dot as a float.
    fn lex_numeric(&mut self, pos: Position) -> Result<Token, LexError> {
        let mut text = String::new();
        let mut have_decimal = false;
        while let Some(ch) = self.peek_byte()? {
            match ch {
                b'0'..=b'9' => {}
                b'.' if !have_decimal => have_decimal = true,
                _ => break,
            }
            self.take_byte()?;
            text.push(ch as char);
        }
        let kind = if have_decimal { TokenKind::Float } else { TokenKind::Integer };
        Ok(Token::new(kind, text, pos))
    }

    fn lex_identifier(&mut self, pos: Position) -> Result<Token, LexError> {
        let mut text = String::new();
        while let Some(ch) = self.peek_byte()? {
            if !matches!(ch, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
                break;
            }
            self.take_byte()?;
            text.push(ch as char);
        }
        let kind = match text.as_str() {
            "let" => TokenKind::Let,
            "import" => TokenKind::Import,
            "node" => TokenKind::Node,
            "fn" => TokenKind::Fn,
            "mod" => TokenKind::Mod,
            "internal" => TokenKind::Internal,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "foreach" => TokenKind::Foreach,
            "in" => TokenKind::In,
            _ => TokenKind::Ident,
        };
        Ok(Token::new(kind, text, pos))
    }

    /// Double-quoted, backslash-escaped. `\"` yields `"`; any other `\x`
    /// keeps the backslash. The token position is that of the opening quote.
    fn lex_string(&mut self, pos: Position) -> Result<Token, LexError> {
        self.take_byte()?; // opening quote
        let mut text = String::new();
        let mut escaped = false;
        loop {
            let Some(ch) = self.peek_byte()? else {
                return Err(LexError::UnterminatedString {
                    line: pos.line,
                    column: pos.column,
                });
            };
            self.take_byte()?;
            if escaped {
                escaped = false;
                if ch == b'"' {
                    text.push('"');
                } else {
                    text.push('\\');
                    text.push(ch as char);
                }
            } else if ch == b'\\' {
                escaped = true;
            } else if ch == b'"' {
                return Ok(Token::new(TokenKind::Str, text, pos));
            } else {
                text.push(ch as char);
            }
        }
    }

    /// From `#` to the end of the line; the newline itself is left for the
    /// main loop so line accounting stays in one place.
    fn lex_comment(&mut self, pos: Position) -> Result<Token, LexError> {
        self.take_byte()?; // leading '#'
        let mut text = String::new();
        while let Some(ch) = self.peek_byte()? {
            if ch == b'\n' {
                break;
            }
            self.take_byte()?;
            text.push(ch as char);
        }
        Ok(Token::new(TokenKind::Comment, text, pos))
    }

    fn peek_byte(&mut self) -> Result<Option<u8>, LexError> {
        if self.read_pos >= self.buffer.len() {
            self.refill()?;
            if self.buffer.is_empty() {
                return Ok(None);
            }
        }
        Ok(Some(self.buffer[self.read_pos]))
    }

    fn take_byte(&mut self) -> Result<Option<u8>, LexError> {
        if self.read_pos >= self.buffer.len() {
            self.refill()?;
            if self.buffer.is_empty() {
                return Ok(None);
            }
        }
        let b = self.buffer[self.read_pos];
        self.read_pos += 1;
        self.position.advance_char();
        Ok(Some(b))
    }

    fn refill(&mut self) -> Result<(), io::Error> {
        self.buffer.clear();
        if self.exhausted {
            return Ok(());
        }
        self.buffer.resize(BUFFER_SIZE, 0);
        let n = self.input.read(&mut self.buffer)?;
        self.buffer.truncate(n);
        self.read_pos = 0;
        if n == 0 {
            self.exhausted = true;
        }
        Ok(())
    }
}

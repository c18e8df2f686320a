//! Formula lexer
//!
//! Turns formula text into a flat token stream. The lexer never fails:
//! anything it cannot classify becomes an [`TokenKind::Unknown`] token for
//! the parser to report.

use std::ops::Range;
use tabula_core::{CellError, CellRef};

/// A token with its byte span in the source text
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `=` (formula start, or equality inside an expression)
    Equals,
    /// A cell reference such as `A1`, `$b$2` or `Sheet2!C1`
    CellIdentifier(CellToken),
    /// Unsigned numeric literal
    Number(f64),
    /// String literal with `""` escapes resolved
    String(String),
    /// Error literal such as `#REF!`
    ErrorLiteral(CellError),
    /// Function or other bare name
    Identifier(String),

    Plus,
    Minus,
    Star,
    Slash,
    Ampersand,
    Colon,
    Comma,
    LParen,
    RParen,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    NotEqual,

    /// Text the lexer could not classify
    Unknown(String),
    /// End of input
    Eof,
}

/// Payload of a cell identifier token
#[derive(Debug, Clone, PartialEq)]
pub struct CellToken {
    /// Sheet prefix without quotes or `!`
    pub sheet: Option<String>,
    pub address: CellRef,
}

impl TokenKind {
    /// Short description used in parse diagnostics
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Equals => "'='".into(),
            TokenKind::CellIdentifier(c) => match &c.sheet {
                Some(s) => format!("cell reference '{}!{}'", s, c.address),
                None => format!("cell reference '{}'", c.address),
            },
            TokenKind::Number(n) => format!("number {}", n),
            TokenKind::String(s) => format!("string \"{}\"", s),
            TokenKind::ErrorLiteral(e) => format!("error {}", e),
            TokenKind::Identifier(s) => format!("identifier '{}'", s),
            TokenKind::Plus => "'+'".into(),
            TokenKind::Minus => "'-'".into(),
            TokenKind::Star => "'*'".into(),
            TokenKind::Slash => "'/'".into(),
            TokenKind::Ampersand => "'&'".into(),
            TokenKind::Colon => "':'".into(),
            TokenKind::Comma => "','".into(),
            TokenKind::LParen => "'('".into(),
            TokenKind::RParen => "')'".into(),
            TokenKind::Less => "'<'".into(),
            TokenKind::Greater => "'>'".into(),
            TokenKind::LessEqual => "'<='".into(),
            TokenKind::GreaterEqual => "'>='".into(),
            TokenKind::NotEqual => "'<>'".into(),
            TokenKind::Unknown(s) => format!("'{}'", s),
            TokenKind::Eof => "end of input".into(),
        }
    }
}

/// Tokenize a formula; the result always ends with [`TokenKind::Eof`]
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return tokens;
        }
    }
}

/// Formula lexer
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Scan the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos;
        let kind = self.scan_token();
        Token {
            kind,
            span: start..self.pos,
        }
    }

    fn scan_token(&mut self) -> TokenKind {
        let Some(c) = self.peek_char() else {
            return TokenKind::Eof;
        };

        let single = match c {
            '=' => Some(TokenKind::Equals),
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '&' => Some(TokenKind::Ampersand),
            ':' => Some(TokenKind::Colon),
            ',' => Some(TokenKind::Comma),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            _ => None,
        };
        if let Some(kind) = single {
            self.advance();
            return kind;
        }

        match c {
            '<' => {
                self.advance();
                if self.eat('=') {
                    TokenKind::LessEqual
                } else if self.eat('>') {
                    TokenKind::NotEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                self.advance();
                if self.eat('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '"' => self.scan_string(),
            '#' => self.scan_error(),
            '\'' => self.scan_quoted_sheet(),
            c if c.is_ascii_digit()
                || (c == '.' && self.peek_char_at(1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                self.scan_number()
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => self.scan_identifier_or_ref(),
            other => {
                self.advance();
                TokenKind::Unknown(other.to_string())
            }
        }
    }

    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // opening quote
        let mut s = String::new();
        while let Some(c) = self.peek_char() {
            if c == '"' {
                if self.peek_char_at(1) == Some('"') {
                    s.push('"');
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return TokenKind::String(s);
                }
            } else {
                s.push(c);
                self.advance();
            }
        }
        // Unterminated: closes at end of input
        TokenKind::String(s)
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        self.skip_digits();
        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }
        // Only treat e/E as an exponent when digits follow
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let sign = matches!(self.peek_char_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_char_at(digit_at).is_some_and(|d| d.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                self.skip_digits();
            }
        }
        let text = &self.input[start..self.pos];
        match text.parse::<f64>() {
            Ok(n) => TokenKind::Number(n),
            Err(_) => TokenKind::Unknown(text.to_string()),
        }
    }

    fn scan_error(&mut self) -> TokenKind {
        let start = self.pos;
        self.advance(); // '#'
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '!' | '?'))
        {
            self.advance();
            // Error literals end at their terminator
            if matches!(self.input[..self.pos].chars().last(), Some('!' | '?')) {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        match CellError::parse(text) {
            Some(e) => TokenKind::ErrorLiteral(e),
            None => TokenKind::Unknown(text.to_string()),
        }
    }

    fn scan_quoted_sheet(&mut self) -> TokenKind {
        let start = self.pos;
        self.advance(); // opening quote
        let mut name = String::new();
        loop {
            match self.peek_char() {
                Some('\'') if self.peek_char_at(1) == Some('\'') => {
                    name.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    name.push(c);
                    self.advance();
                }
                None => return TokenKind::Unknown(self.input[start..].to_string()),
            }
        }
        if !self.eat('!') {
            return TokenKind::Unknown(self.input[start..self.pos].to_string());
        }
        self.scan_qualified_cell(start, name)
    }

    fn scan_identifier_or_ref(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek_char()
            .is_some_and(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.'))
        {
            self.advance();
        }
        let text = &self.input[start..self.pos];

        if self.peek_char() == Some('!') {
            self.advance();
            return self.scan_qualified_cell(start, text.to_string());
        }

        // LOG10( is a function call, not cell LOG10
        if self.peek_char() != Some('(') && looks_like_cell(text) {
            if let Ok(address) = CellRef::parse(text) {
                return TokenKind::CellIdentifier(CellToken {
                    sheet: None,
                    address,
                });
            }
        }
        TokenKind::Identifier(text.to_string())
    }

    fn scan_qualified_cell(&mut self, start: usize, sheet: String) -> TokenKind {
        let cell_start = self.pos;
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '$')
        {
            self.advance();
        }
        let text = &self.input[cell_start..self.pos];
        match CellRef::parse(text) {
            Ok(address) if looks_like_cell(text) => TokenKind::CellIdentifier(CellToken {
                sheet: Some(sheet),
                address,
            }),
            _ => TokenKind::Unknown(self.input[start..self.pos].to_string()),
        }
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek_char() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }
}

/// `[$]letters[$]digits` with nothing else
fn looks_like_cell(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }
    let letters = i;
    while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i == letters {
        return false;
    }
    if bytes.get(i) == Some(&b'$') {
        i += 1;
    }
    let digits = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    i > digits && i == bytes.len()
}

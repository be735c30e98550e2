//! Lexer for expression strings.

use crate::error::{ExpressionError, ExpressionResult};
use crate::token::{Token, TokenKind};

/// Converts an expression string into a token stream.
pub struct Lexer<'a> {
    input: &'a str,
    chars: Vec<char>,
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over an expression (without `{{ }}` delimiters).
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            position: 0,
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(mut self) -> ExpressionResult<Vec<Token>> {
        let mut tokens = Vec::with_capacity((self.input.len() / 4).max(4));
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> ExpressionResult<Token> {
        self.skip_whitespace();
        let start = self.position;

        let Some(ch) = self.current() else {
            return Ok(Token::new(TokenKind::Eof, start));
        };

        let kind = match ch {
            '(' => self.single(TokenKind::LeftParen),
            ')' => self.single(TokenKind::RightParen),
            '[' => self.single(TokenKind::LeftBracket),
            ']' => self.single(TokenKind::RightBracket),
            ',' => self.single(TokenKind::Comma),
            '.' => self.single(TokenKind::Dot),
            ':' => self.single(TokenKind::Colon),
            '?' => self.single(TokenKind::Question),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            '=' if self.peek() == Some('=') => self.double(TokenKind::Equal),
            '!' if self.peek() == Some('=') => self.double(TokenKind::NotEqual),
            '!' => self.single(TokenKind::Not),
            '<' if self.peek() == Some('=') => self.double(TokenKind::LessEqual),
            '<' => self.single(TokenKind::LessThan),
            '>' if self.peek() == Some('=') => self.double(TokenKind::GreaterEqual),
            '>' => self.single(TokenKind::GreaterThan),
            '&' if self.peek() == Some('&') => self.double(TokenKind::And),
            '|' if self.peek() == Some('|') => self.double(TokenKind::Or),
            '"' | '\'' => self.read_string(ch)?,
            '$' => self.read_variable()?,
            c if c.is_ascii_digit() => self.read_number()?,
            c if c.is_alphabetic() || c == '_' => self.read_identifier(),
            other => {
                return Err(ExpressionError::syntax(
                    start,
                    format!("unexpected character {other:?}"),
                ));
            }
        };

        Ok(Token::new(kind, start))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.position += 1;
        kind
    }

    fn double(&mut self, kind: TokenKind) -> TokenKind {
        self.position += 2;
        kind
    }

    fn read_string(&mut self, quote: char) -> ExpressionResult<TokenKind> {
        let start = self.position;
        self.position += 1; // opening quote
        let mut value = String::new();
        loop {
            match self.current() {
                None => {
                    return Err(ExpressionError::syntax(start, "unterminated string literal"));
                }
                Some(c) if c == quote => {
                    self.position += 1;
                    return Ok(TokenKind::Str(value));
                }
                Some('\\') => {
                    self.position += 1;
                    match self.current() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('\\') => value.push('\\'),
                        Some(c) if c == quote => value.push(c),
                        Some(c) => {
                            value.push('\\');
                            value.push(c);
                        }
                        None => {
                            return Err(ExpressionError::syntax(
                                start,
                                "unterminated string literal",
                            ));
                        }
                    }
                    self.position += 1;
                }
                Some(c) => {
                    value.push(c);
                    self.position += 1;
                }
            }
        }
    }

    fn read_variable(&mut self) -> ExpressionResult<TokenKind> {
        let start = self.position;
        self.position += 1; // `$`
        let mut name = String::new();
        while let Some(c) = self.current() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.position += 1;
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(ExpressionError::syntax(start, "expected variable name after `$`"));
        }
        Ok(TokenKind::Variable(name))
    }

    fn read_number(&mut self) -> ExpressionResult<TokenKind> {
        let start = self.position;
        let mut is_float = false;
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                self.position += 1;
            } else if c == '.' && !is_float && self.peek().is_some_and(|p| p.is_ascii_digit()) {
                is_float = true;
                self.position += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.position].iter().collect();
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Number)
                .map_err(|_| ExpressionError::syntax(start, format!("invalid number {text:?}")))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| ExpressionError::syntax(start, format!("invalid number {text:?}")))
        }
    }

    fn read_identifier(&mut self) -> TokenKind {
        let start = self.position;
        while let Some(c) = self.current() {
            if c.is_alphanumeric() || c == '_' {
                self.position += 1;
            } else {
                break;
            }
        }
        let name: String = self.chars[start..self.position].iter().collect();
        match name.as_str() {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier(name),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(char::is_whitespace) {
            self.position += 1;
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }
}

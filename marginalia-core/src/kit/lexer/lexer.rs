//! Hand-written lexer

use super::error::{ErrorKind, LexerError};
use super::position::{SourcePosition, Span};
use super::token::{Token, TokenKind};

/// Character-level lexer
///
/// Produces one token per `next_token` call and an `Eof` token once the input
/// is exhausted.
pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    position: SourcePosition,
}

/// Lex a whole source text. The returned vector always ends with `Eof`.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexerError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            position: SourcePosition::start(),
        }
    }

    /// Start the lexer at an explicit position (used for template
    /// interpolations, which are lexed separately from their host token)
    pub fn with_position(source: &str, position: SourcePosition) -> Self {
        Self {
            chars: source.chars().collect(),
            index: 0,
            position,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.index + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.index += 1;
        self.position.advance(c);
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '/' && self.peek_next() == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_trivia();
        let start = self.position;
        let c = match self.bump() {
            Some(c) => c,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(start, start),
                    text: String::new(),
                })
            }
        };

        let (kind, text) = match c {
            '"' => (TokenKind::String, self.string_body(start)?),
            'f' if self.peek() == Some('"') => {
                self.bump();
                (TokenKind::Template, self.template_body(start)?)
            }
            c if c.is_ascii_digit() => self.number(c, start)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(n) = self.peek() {
                    if n.is_alphanumeric() || n == '_' {
                        ident.push(n);
                        self.bump();
                    } else {
                        break;
                    }
                }
                match TokenKind::keyword(&ident) {
                    Some(kind) => (kind, ident),
                    None => (TokenKind::Identifier, ident),
                }
            }
            _ => (self.symbol(c, start)?, c.to_string()),
        };

        Ok(Token {
            kind,
            span: Span::new(start, self.position),
            text,
        })
    }

    fn symbol(&mut self, c: char, start: SourcePosition) -> Result<TokenKind, LexerError> {
        let followed_by_eq = self.peek() == Some('=');
        let kind = match c {
            '=' if followed_by_eq => TokenKind::DoubleEqual,
            '!' if followed_by_eq => TokenKind::ExclamationEqual,
            '>' if followed_by_eq => TokenKind::GreaterThanEqual,
            '<' if followed_by_eq => TokenKind::LessThanEqual,
            '=' => return Ok(TokenKind::Equal),
            '>' => return Ok(TokenKind::GreaterThan),
            '<' => return Ok(TokenKind::LessThan),
            '+' => return Ok(TokenKind::Plus),
            '-' => return Ok(TokenKind::Minus),
            '*' => return Ok(TokenKind::Asterisk),
            '/' => return Ok(TokenKind::Slash),
            '%' => return Ok(TokenKind::Percent),
            ',' => return Ok(TokenKind::Comma),
            ';' => return Ok(TokenKind::Semicolon),
            ':' => return Ok(TokenKind::Colon),
            '.' => return Ok(TokenKind::Dot),
            '@' => return Ok(TokenKind::At),
            '(' => return Ok(TokenKind::LeftParenthesis),
            ')' => return Ok(TokenKind::RightParenthesis),
            '{' => return Ok(TokenKind::LeftCurlyBrace),
            '}' => return Ok(TokenKind::RightCurlyBrace),
            '[' => return Ok(TokenKind::LeftSquareBracket),
            ']' => return Ok(TokenKind::RightSquareBracket),
            other => return Err(LexerError::at(ErrorKind::InvalidChar(other), start)),
        };
        self.bump();
        Ok(kind)
    }

    fn number(
        &mut self,
        first: char,
        start: SourcePosition,
    ) -> Result<(TokenKind, String), LexerError> {
        let mut text = String::from(first);
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.'
                && !is_float
                && self.peek_next().map_or(false, |n| n.is_ascii_digit())
            {
                is_float = true;
                text.push(c);
                self.bump();
            } else if c.is_alphabetic() || c == '_' {
                text.push(c);
                self.bump();
                return Err(LexerError::at(ErrorKind::InvalidNumber(text), start));
            } else {
                break;
            }
        }
        if is_float {
            text.parse::<f64>()
                .map_err(|_| LexerError::at(ErrorKind::InvalidNumber(text.clone()), start))?;
            Ok((TokenKind::Float, text))
        } else {
            text.parse::<i64>()
                .map_err(|_| LexerError::at(ErrorKind::InvalidNumber(text.clone()), start))?;
            Ok((TokenKind::Integer, text))
        }
    }

    /// Body of a plain string literal, escapes decoded
    fn string_body(&mut self, start: SourcePosition) -> Result<String, LexerError> {
        let mut value = String::new();
        loop {
            let escape_pos = self.position;
            match self.bump() {
                None | Some('\n') => {
                    return Err(LexerError::at(ErrorKind::UnterminatedString, start))
                }
                Some('"') => return Ok(value),
                Some('\\') => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| LexerError::at(ErrorKind::UnterminatedString, start))?;
                    value.push(decode_escape(escaped).ok_or_else(|| {
                        LexerError::at(ErrorKind::InvalidEscape(format!("\\{}", escaped)), escape_pos)
                    })?);
                }
                Some(c) => value.push(c),
            }
        }
    }

    /// Raw body of a template string; escapes and braces are left for the
    /// parser, which splits the body into text and interpolations
    fn template_body(&mut self, start: SourcePosition) -> Result<String, LexerError> {
        let mut raw = String::new();
        let mut depth = 0usize;
        loop {
            let c = match self.bump() {
                None | Some('\n') => {
                    return Err(LexerError::at(ErrorKind::UnterminatedString, start))
                }
                Some(c) => c,
            };
            match c {
                '"' if depth == 0 => return Ok(raw),
                '"' => {
                    // string literal nested inside an interpolation
                    raw.push(c);
                    loop {
                        match self.bump() {
                            None | Some('\n') => {
                                return Err(LexerError::at(ErrorKind::UnterminatedString, start))
                            }
                            Some('\\') => {
                                raw.push('\\');
                                if let Some(n) = self.bump() {
                                    raw.push(n);
                                }
                            }
                            Some('"') => {
                                raw.push('"');
                                break;
                            }
                            Some(n) => raw.push(n),
                        }
                    }
                }
                '\\' => {
                    raw.push(c);
                    match self.bump() {
                        None | Some('\n') => {
                            return Err(LexerError::at(ErrorKind::UnterminatedString, start))
                        }
                        Some(n) => raw.push(n),
                    }
                }
                '{' => {
                    if depth == 0 && self.peek() == Some('{') {
                        self.bump();
                        raw.push_str("{{");
                    } else {
                        depth += 1;
                        raw.push(c);
                    }
                }
                '}' => {
                    if depth == 0 && self.peek() == Some('}') {
                        self.bump();
                        raw.push_str("}}");
                    } else {
                        depth = depth.saturating_sub(1);
                        raw.push(c);
                    }
                }
                _ => raw.push(c),
            }
        }
    }
}

pub(crate) fn decode_escape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '0' => Some('\0'),
        '\\' => Some('\\'),
        '"' => Some('"'),
        '\'' => Some('\''),
        _ => None,
    }
}

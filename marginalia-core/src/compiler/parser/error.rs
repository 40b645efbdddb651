use crate::kit::lexer::{Coordinate, LexerError};

/// Syntax error with its location
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    pub kind: ParserErrorKind,
    pub location: ErrorLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorLocation {
    At(Coordinate),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParserErrorKind {
    Lexer(String),
    UnexpectedToken { found: String, expected: Vec<String> },
    ExpectedIdentifier { found: String },
    InvalidAssignmentTarget,
    ReturnOutsideFunction,
    YieldOutsideFunction,
    AwaitOutsideAsync,
    YieldInAsync,
    InvalidTemplate(String),
    Custom(String),
}

pub type ParseResult<T> = Result<T, ParserError>;

impl ParserError {
    pub fn at(kind: ParserErrorKind, line: usize, column: usize) -> Self {
        Self {
            kind,
            location: ErrorLocation::At(Coordinate { line, column }),
        }
    }

    pub fn here(kind: ParserErrorKind, coordinate: Coordinate) -> Self {
        Self {
            kind,
            location: ErrorLocation::At(coordinate),
        }
    }

    pub fn line(&self) -> Option<usize> {
        match &self.location {
            ErrorLocation::At(coord) => Some(coord.line),
            ErrorLocation::Eof => None,
        }
    }

    pub fn column(&self) -> Option<usize> {
        match &self.location {
            ErrorLocation::At(coord) => Some(coord.column),
            ErrorLocation::Eof => None,
        }
    }

    /// Message without the location prefix
    pub fn message(&self) -> String {
        match &self.kind {
            ParserErrorKind::Lexer(msg) => msg.clone(),
            ParserErrorKind::UnexpectedToken { found, expected } => {
                if expected.is_empty() {
                    format!("Unexpected token {found}")
                } else {
                    format!("Unexpected token {}, expected: {}", found, expected.join(", "))
                }
            }
            ParserErrorKind::ExpectedIdentifier { found } => {
                format!("Expected identifier, found {found}")
            }
            ParserErrorKind::InvalidAssignmentTarget => "Invalid assignment target".to_string(),
            ParserErrorKind::ReturnOutsideFunction => "'return' outside function".to_string(),
            ParserErrorKind::YieldOutsideFunction => "'yield' outside function".to_string(),
            ParserErrorKind::AwaitOutsideAsync => "'await' outside async function".to_string(),
            ParserErrorKind::YieldInAsync => "'yield' inside async function".to_string(),
            ParserErrorKind::InvalidTemplate(msg) => format!("Invalid template string: {msg}"),
            ParserErrorKind::Custom(msg) => msg.clone(),
        }
    }
}

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        let message = match err.to_string().split_once("] ") {
            Some((_, rest)) => rest.to_string(),
            None => err.to_string(),
        };
        ParserError::at(ParserErrorKind::Lexer(message), err.line(), err.column())
    }
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            ErrorLocation::At(coord) => write!(f, "{}: {}", coord, self.message()),
            ErrorLocation::Eof => write!(f, "EOF: {}", self.message()),
        }
    }
}

impl std::error::Error for ParserError {}

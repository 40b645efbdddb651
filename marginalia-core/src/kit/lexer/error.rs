//! Lexer error types

use super::position::SourcePosition;

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    InvalidChar(char),
    UnterminatedString,
    InvalidEscape(String),
    InvalidNumber(String),
}

/// Lexical error with its position
#[derive(Debug, Clone, PartialEq)]
pub struct LexerError {
    pub kind: ErrorKind,
    pub position: SourcePosition,
}

impl LexerError {
    pub fn at(kind: ErrorKind, position: SourcePosition) -> Self {
        Self { kind, position }
    }

    /// 1-based line
    pub fn line(&self) -> usize {
        self.position.line
    }

    /// 1-based column
    pub fn column(&self) -> usize {
        self.position.column
    }
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] ", self.position.line, self.position.column)?;
        match &self.kind {
            ErrorKind::InvalidChar(ch) => write!(f, "Invalid character '{}'", ch),
            ErrorKind::UnterminatedString => write!(f, "Unterminated string literal"),
            ErrorKind::InvalidEscape(seq) => write!(f, "Invalid escape sequence '{}'", seq),
            ErrorKind::InvalidNumber(num) => write!(f, "Invalid number format '{}'", num),
        }
    }
}

impl std::error::Error for LexerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexer_error_position() {
        let err = LexerError::at(ErrorKind::InvalidChar('#'), SourcePosition::new(10, 5, 100));
        assert_eq!(err.line(), 10);
        assert_eq!(err.column(), 5);
    }

    #[test]
    fn test_lexer_error_display() {
        let err = LexerError::at(ErrorKind::UnterminatedString, SourcePosition::new(3, 7, 50));
        let display = err.to_string();
        assert!(display.contains("3:7"));
        assert!(display.contains("Unterminated"));
    }

    #[test]
    fn test_lexer_error_invalid_escape() {
        let err = LexerError::at(
            ErrorKind::InvalidEscape("\\q".to_string()),
            SourcePosition::start(),
        );
        assert!(err.to_string().contains("\\q"));
    }
}

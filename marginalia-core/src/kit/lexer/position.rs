//! Source position tracking

/// Position in source text
///
/// `line` and `column` are 1-based and count Unicode scalar values; they are
/// what diagnostics show. `byte_offset` is 0-based into the UTF-8 text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize, byte_offset: usize) -> Self {
        Self {
            line,
            column,
            byte_offset,
        }
    }

    /// Start of file
    pub fn start() -> Self {
        Self::new(1, 1, 0)
    }

    /// Advance past one character
    pub fn advance(&mut self, c: char) {
        self.byte_offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            line: self.line,
            column: self.column,
        }
    }
}

/// Line/column pair used in error locations and AST nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord)]
pub struct Coordinate {
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Half-open range of source positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: SourcePosition,
    pub end: SourcePosition,
}

impl Span {
    pub fn new(start: SourcePosition, end: SourcePosition) -> Self {
        Self { start, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_ascii() {
        let mut pos = SourcePosition::start();
        pos.advance('a');
        assert_eq!(pos, SourcePosition::new(1, 2, 1));
    }

    #[test]
    fn test_advance_newline() {
        let mut pos = SourcePosition::start();
        pos.advance('x');
        pos.advance('\n');
        assert_eq!(pos.line, 2);
        assert_eq!(pos.column, 1);
        assert_eq!(pos.byte_offset, 2);
    }

    #[test]
    fn test_advance_multibyte() {
        let mut pos = SourcePosition::start();
        pos.advance('é');
        assert_eq!(pos.column, 2);
        assert_eq!(pos.byte_offset, 2);
    }
}

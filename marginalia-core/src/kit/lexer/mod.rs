//! Lexer for Marginalia script
//!
//! Turns source text into [`Token`]s. Comments and whitespace are skipped;
//! every token carries its [`Span`] so later phases can report positions.

mod error;
mod lexer;
mod position;
mod token;

pub use error::{ErrorKind, LexerError};
pub use lexer::{tokenize, Lexer};
pub(crate) use lexer::decode_escape as decode_escape_char;
pub use position::{Coordinate, SourcePosition, Span};
pub use token::{Token, TokenKind};

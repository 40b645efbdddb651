use super::expr::BinaryOp;
use crate::kit::lexer::TokenKind;

/// Binary operator precedence; higher binds tighter. `None` for tokens
/// that are not binary operators.
pub fn get_precedence(kind: TokenKind) -> Option<(u8, BinaryOp)> {
    let entry = match kind {
        TokenKind::Or => (10, BinaryOp::Or),
        TokenKind::And => (20, BinaryOp::And),
        TokenKind::DoubleEqual => (40, BinaryOp::Equal),
        TokenKind::ExclamationEqual => (40, BinaryOp::NotEqual),
        TokenKind::LessThan => (40, BinaryOp::Less),
        TokenKind::LessThanEqual => (40, BinaryOp::LessEqual),
        TokenKind::GreaterThan => (40, BinaryOp::Greater),
        TokenKind::GreaterThanEqual => (40, BinaryOp::GreaterEqual),
        TokenKind::Plus => (50, BinaryOp::Add),
        TokenKind::Minus => (50, BinaryOp::Subtract),
        TokenKind::Asterisk => (60, BinaryOp::Multiply),
        TokenKind::Slash => (60, BinaryOp::Divide),
        TokenKind::Percent => (60, BinaryOp::Modulo),
        _ => return None,
    };
    Some(entry)
}

/// Precedence of prefix `not`; sits between `and` and comparisons
pub const NOT_PRECEDENCE: u8 = 30;


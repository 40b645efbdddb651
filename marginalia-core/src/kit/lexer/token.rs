//! Token definitions

use super::position::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // keywords
    Var,
    Fn,
    Async,
    Await,
    Class,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Try,
    Catch,
    Return,
    Yield,
    Raise,
    Break,
    Continue,
    Pass,
    Import,
    From,
    As,
    And,
    Or,
    Not,
    True,
    False,
    Null,

    // literals
    Integer,
    Float,
    String,
    /// `f"..."`; the token text is the raw body between the quotes
    Template,

    Identifier,

    // two-character symbols
    DoubleEqual,
    ExclamationEqual,
    GreaterThanEqual,
    LessThanEqual,

    // single-character symbols
    GreaterThan,
    LessThan,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Equal,
    Comma,
    Semicolon,
    Colon,
    Dot,
    At,
    LeftParenthesis,
    RightParenthesis,
    LeftCurlyBrace,
    RightCurlyBrace,
    LeftSquareBracket,
    RightSquareBracket,

    Eof,
}

impl TokenKind {
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        let kind = match ident {
            "var" => TokenKind::Var,
            "fn" => TokenKind::Fn,
            "async" => TokenKind::Async,
            "await" => TokenKind::Await,
            "class" => TokenKind::Class,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "try" => TokenKind::Try,
            "catch" => TokenKind::Catch,
            "return" => TokenKind::Return,
            "yield" => TokenKind::Yield,
            "raise" => TokenKind::Raise,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "pass" => TokenKind::Pass,
            "import" => TokenKind::Import,
            "from" => TokenKind::From,
            "as" => TokenKind::As,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => return None,
        };
        Some(kind)
    }

    /// Human-readable form used in parser diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Var => "'var'",
            TokenKind::Fn => "'fn'",
            TokenKind::Async => "'async'",
            TokenKind::Await => "'await'",
            TokenKind::Class => "'class'",
            TokenKind::If => "'if'",
            TokenKind::Elif => "'elif'",
            TokenKind::Else => "'else'",
            TokenKind::While => "'while'",
            TokenKind::For => "'for'",
            TokenKind::In => "'in'",
            TokenKind::Try => "'try'",
            TokenKind::Catch => "'catch'",
            TokenKind::Return => "'return'",
            TokenKind::Yield => "'yield'",
            TokenKind::Raise => "'raise'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::Pass => "'pass'",
            TokenKind::Import => "'import'",
            TokenKind::From => "'from'",
            TokenKind::As => "'as'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Not => "'not'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Null => "'null'",
            TokenKind::Integer => "integer",
            TokenKind::Float => "float",
            TokenKind::String => "string",
            TokenKind::Template => "template string",
            TokenKind::Identifier => "identifier",
            TokenKind::DoubleEqual => "'=='",
            TokenKind::ExclamationEqual => "'!='",
            TokenKind::GreaterThanEqual => "'>='",
            TokenKind::LessThanEqual => "'<='",
            TokenKind::GreaterThan => "'>'",
            TokenKind::LessThan => "'<'",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Asterisk => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Percent => "'%'",
            TokenKind::Equal => "'='",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Colon => "':'",
            TokenKind::Dot => "'.'",
            TokenKind::At => "'@'",
            TokenKind::LeftParenthesis => "'('",
            TokenKind::RightParenthesis => "')'",
            TokenKind::LeftCurlyBrace => "'{'",
            TokenKind::RightCurlyBrace => "'}'",
            TokenKind::LeftSquareBracket => "'['",
            TokenKind::RightSquareBracket => "']'",
            TokenKind::Eof => "end of input",
        }
    }
}

/// A lexed token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Identifier name, decoded string value, raw template body or number text
    pub text: String,
}

impl Token {
    pub fn line(&self) -> usize {
        self.span.start.line
    }

    pub fn column(&self) -> usize {
        self.span.start.column
    }
}

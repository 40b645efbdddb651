pub mod error;
pub mod expr;
pub mod parser;
pub mod stmt;
mod utils;

pub use error::{ErrorLocation, ParseResult, ParserError, ParserErrorKind};
pub use expr::{BinaryOp, Expr, ExprKind, TemplatePart, UnaryOp};
pub use parser::{parse, Parser};
pub use stmt::{ClassDef, FunctionDef, Module, Param, Stmt, StmtKind};

//! Bytecode definitions

pub mod chunk;

pub use chunk::Chunk;

use super::Proto;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Constant pool entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(String),
    /// Function or class body
    Function(Rc<Proto>),
}

/// VM instruction
///
/// Jump targets are absolute instruction indices within the same chunk.
/// Name operands index `Constant::Str` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpCode {
    Constant(u32),
    Null,
    True,
    False,
    Pop,
    Dup,

    /// Look a name up through the scope chain, then the builtins
    GetName(u32),
    /// Bind a name in the current scope
    DeclareName(u32),
    /// Rebind the nearest existing binding of a name
    SetName(u32),
    GetAttr(u32),
    /// Pops value then object
    SetAttr(u32),
    GetIndex,
    /// Pops value, index, then object
    SetIndex,

    BuildList(u32),
    /// Pops `n` key/value pairs
    BuildMap(u32),
    /// Concatenates the string forms of `n` values
    BuildTemplate(u32),

    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,
    Not,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    Jump(u32),
    /// Pops the condition
    JumpIfFalse(u32),
    /// Leaves the condition on the stack
    JumpIfFalseKeep(u32),
    JumpIfTrueKeep(u32),

    /// Stack: callee, positional args, then `keywords` (name, value) pairs
    Call { positional: u32, keywords: u32 },
    /// Stack: default values; operand indexes a `Constant::Function`
    MakeFunction { proto: u32, defaults: u32 },
    /// Runs a class body and pushes the class
    MakeClass(u32),
    Return,
    Yield,
    Await,
    Raise,

    /// Push an exception handler jumping to the operand
    SetupTry(u32),
    PopTry,

    /// Push the module named by a `Constant::Str`
    Import(u32),
    /// Peek a module and push one of its attributes (importing a submodule
    /// of that name if needed)
    ImportFrom(u32),

    GetIter,
    /// Push the next item, or pop the iterator and jump when exhausted
    ForIter(u32),
}

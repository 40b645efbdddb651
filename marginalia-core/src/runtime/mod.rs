//! Marginalia runtime
//!
//! Bytecode compiler and VM for the augmented program.

pub mod bytecode;
pub mod compiler;
pub mod instrument;
pub mod stdlib;
pub mod value;
pub mod vm;

pub use bytecode::{Chunk, Constant, OpCode};
pub use value::Value;
pub use vm::VM;

use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// How calling a compiled body behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionKind {
    /// Module top level
    Module,
    Plain,
    /// Body contains `yield`; calling returns a generator
    Generator,
    /// `async fn`; calling returns a coroutine
    Async,
    /// Class body, run once when the class is created
    ClassBody,
}

/// Compiled function body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proto {
    pub name: String,
    pub params: Vec<String>,
    pub kind: FunctionKind,
    pub chunk: Chunk,
    /// First line of the definition
    pub line: usize,
}

/// A compiled module, as stored in the artifact cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub module: String,
    pub main: Rc<Proto>,
}

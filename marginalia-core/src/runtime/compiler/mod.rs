//! Bytecode compiler
//!
//! Lowers the AST to one [`Proto`] per function body. Every function ends
//! with an implicit `return null`.

mod expr;
mod stmt;

use super::bytecode::{Chunk, Constant, OpCode};
use super::{FunctionKind, Program, Proto};
use crate::compiler::parser::{self, Module, ParserError, Stmt};
use std::rc::Rc;
use thiserror::Error;

/// Statically detectable misuse the parser lets through
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct CompileError {
    pub message: String,
    pub line: usize,
}

impl CompileError {
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }
}

/// Failure turning source text into a [`Program`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("{0}")]
    Parse(#[from] ParserError),
    #[error("{0}")]
    Compile(#[from] CompileError),
}

impl SourceError {
    pub fn line(&self) -> Option<usize> {
        match self {
            SourceError::Parse(e) => e.line(),
            SourceError::Compile(e) => Some(e.line),
        }
    }

    pub fn message(&self) -> String {
        match self {
            SourceError::Parse(e) => e.message(),
            SourceError::Compile(e) => e.message.clone(),
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

struct LoopContext {
    /// `continue` target
    start: usize,
    /// Jumps to patch to the loop exit
    breaks: Vec<usize>,
    /// Open `try` blocks when the loop began
    try_depth: usize,
}

/// Compiles one function body
pub struct Compiler {
    chunk: Chunk,
    loops: Vec<LoopContext>,
    try_depth: usize,
    /// Line attributed to emitted instructions
    line: usize,
}

impl Compiler {
    fn new(line: usize) -> Self {
        Self {
            chunk: Chunk::new(),
            loops: Vec::new(),
            try_depth: 0,
            line,
        }
    }

    fn emit(&mut self, op: OpCode) -> usize {
        self.chunk.write_op(op, self.line)
    }

    fn name_constant(&mut self, name: &str) -> u32 {
        self.chunk.add_constant(Constant::Str(name.to_string()))
    }

    fn patch_here(&mut self, at: usize) {
        let here = self.chunk.current_offset();
        self.chunk.patch_jump(at, here);
    }

    /// Compile a body into a finished prototype
    fn compile_body(
        name: &str,
        params: Vec<String>,
        kind: FunctionKind,
        line: usize,
        body: &[Stmt],
    ) -> CompileResult<Proto> {
        let mut compiler = Compiler::new(line);
        compiler.compile_block(body)?;
        compiler.emit(OpCode::Null);
        compiler.emit(OpCode::Return);
        Ok(Proto {
            name: name.to_string(),
            params,
            kind,
            chunk: compiler.chunk,
            line,
        })
    }
}

/// Compile a parsed module
pub fn compile(module_name: &str, module: &Module) -> CompileResult<Program> {
    let main = Compiler::compile_body(
        "<module>",
        Vec::new(),
        FunctionKind::Module,
        1,
        &module.statements,
    )?;
    tracing::debug!(
        target: "marginalia::compiler",
        module = module_name,
        ops = main.chunk.code.len(),
        "module compiled"
    );
    Ok(Program {
        module: module_name.to_string(),
        main: Rc::new(main),
    })
}

/// Parse and compile source text
pub fn compile_source(module_name: &str, source: &str) -> Result<Program, SourceError> {
    let module = parser::parse(source)?;
    Ok(compile(module_name, &module)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(source: &str) -> Vec<OpCode> {
        compile_source("m", source).unwrap().main.chunk.code.clone()
    }

    #[test]
    fn test_module_ends_with_implicit_return() {
        let code = ops("var x = 1;");
        assert_eq!(code[code.len() - 2..], [OpCode::Null, OpCode::Return]);
    }

    #[test]
    fn test_lines_follow_statements() {
        let program = compile_source("m", "var a = 1;\n\nvar b = 2;").unwrap();
        let chunk = &program.main.chunk;
        let declare_lines: Vec<usize> = chunk
            .code
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, OpCode::DeclareName(_)))
            .map(|(ip, _)| chunk.line_at(ip))
            .collect();
        assert_eq!(declare_lines, vec![1, 3]);
    }

    #[test]
    fn test_function_becomes_constant() {
        let program = compile_source("m", "fn f(a, b = 2) {\n    return a;\n}").unwrap();
        let proto = program
            .main
            .chunk
            .constants
            .iter()
            .find_map(|c| match c {
                Constant::Function(p) => Some(p.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(proto.name, "f");
        assert_eq!(proto.params, vec!["a", "b"]);
        assert_eq!(proto.kind, FunctionKind::Plain);
        assert_eq!(proto.line, 1);
        assert!(program
            .main
            .chunk
            .code
            .iter()
            .any(|op| matches!(op, OpCode::MakeFunction { defaults: 1, .. })));
    }

    #[test]
    fn test_generator_and_async_kinds() {
        let program =
            compile_source("m", "fn g() {\n    yield 1;\n}\nasync fn a() {\n    return 1;\n}")
                .unwrap();
        let kinds: Vec<FunctionKind> = program
            .main
            .chunk
            .constants
            .iter()
            .filter_map(|c| match c {
                Constant::Function(p) => Some(p.kind),
                _ => None,
            })
            .collect();
        assert_eq!(kinds, vec![FunctionKind::Generator, FunctionKind::Async]);
    }

    #[test]
    fn test_break_outside_loop() {
        let err = compile_source("m", "var x = 1;\nbreak;").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.message().contains("break"));
    }

    #[test]
    fn test_continue_outside_loop_in_function() {
        let err = compile_source("m", "while true {\n    fn f() {\n        continue;\n    }\n}")
            .unwrap_err();
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_parse_error_surfaces() {
        let err = compile_source("m", "var = 1;").unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_break_inside_try_pops_handler() {
        let code = ops("while true {\n    try {\n        break;\n    } catch e {\n        pass;\n    }\n}");
        let pop_try = code.iter().position(|op| *op == OpCode::PopTry).unwrap();
        assert!(matches!(code[pop_try + 1], OpCode::Jump(_)));
    }
}

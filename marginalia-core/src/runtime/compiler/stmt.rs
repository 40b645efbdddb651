//! Statement lowering

use super::{CompileError, CompileResult, Compiler, LoopContext};
use crate::compiler::parser::{ClassDef, Expr, ExprKind, FunctionDef, Stmt, StmtKind};
use crate::runtime::bytecode::{Constant, OpCode};
use crate::runtime::FunctionKind;
use std::rc::Rc;

impl Compiler {
    pub(super) fn compile_block(&mut self, statements: &[Stmt]) -> CompileResult<()> {
        for stmt in statements {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        self.line = stmt.line();
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.compile_expr(expr)?;
                self.emit(OpCode::Pop);
            }
            StmtKind::VarDecl { name, initializer } => {
                self.compile_expr(initializer)?;
                self.line = stmt.line();
                let index = self.name_constant(name);
                self.emit(OpCode::DeclareName(index));
            }
            StmtKind::Assign { target, value } => self.compile_assign(target, value, stmt.line())?,
            StmtKind::Function(def) => self.compile_function(def)?,
            StmtKind::Class(def) => self.compile_class(def)?,
            StmtKind::If {
                branches,
                else_body,
            } => {
                let mut exits = Vec::new();
                for (condition, body) in branches {
                    self.line = condition.line();
                    self.compile_expr(condition)?;
                    let skip = self.emit(OpCode::JumpIfFalse(0));
                    self.compile_block(body)?;
                    exits.push(self.emit(OpCode::Jump(0)));
                    self.patch_here(skip);
                }
                if let Some(body) = else_body {
                    self.compile_block(body)?;
                }
                for exit in exits {
                    self.patch_here(exit);
                }
            }
            StmtKind::While { condition, body } => {
                let start = self.chunk.current_offset();
                self.compile_expr(condition)?;
                let exit = self.emit(OpCode::JumpIfFalse(0));
                self.loops.push(LoopContext {
                    start,
                    breaks: Vec::new(),
                    try_depth: self.try_depth,
                });
                self.compile_block(body)?;
                self.line = stmt.line();
                self.emit(OpCode::Jump(start as u32));
                self.patch_here(exit);
                self.close_loop();
            }
            StmtKind::For {
                variable,
                iterable,
                body,
            } => {
                self.compile_expr(iterable)?;
                self.emit(OpCode::GetIter);
                let start = self.chunk.current_offset();
                let next = self.emit(OpCode::ForIter(0));
                let index = self.name_constant(variable);
                self.emit(OpCode::DeclareName(index));
                self.loops.push(LoopContext {
                    start,
                    breaks: Vec::new(),
                    try_depth: self.try_depth,
                });
                self.compile_block(body)?;
                self.line = stmt.line();
                self.emit(OpCode::Jump(start as u32));
                // `break` lands here with the iterator still on the stack
                let context = self.loops.pop();
                for at in context.map(|c| c.breaks).unwrap_or_default() {
                    self.patch_here(at);
                }
                self.emit(OpCode::Pop);
                self.patch_here(next);
            }
            StmtKind::Try {
                body,
                error_name,
                handler,
            } => {
                let setup = self.emit(OpCode::SetupTry(0));
                self.try_depth += 1;
                self.compile_block(body)?;
                self.try_depth -= 1;
                self.line = stmt.line();
                self.emit(OpCode::PopTry);
                let done = self.emit(OpCode::Jump(0));
                self.patch_here(setup);
                let index = self.name_constant(error_name);
                self.emit(OpCode::DeclareName(index));
                self.compile_block(handler)?;
                self.patch_here(done);
            }
            StmtKind::Return(value) => {
                match value {
                    Some(expr) => self.compile_expr(expr)?,
                    None => {
                        self.emit(OpCode::Null);
                    }
                }
                self.emit(OpCode::Return);
            }
            StmtKind::Yield(value) => {
                match value {
                    Some(expr) => self.compile_expr(expr)?,
                    None => {
                        self.emit(OpCode::Null);
                    }
                }
                self.emit(OpCode::Yield);
            }
            StmtKind::Raise(expr) => {
                self.compile_expr(expr)?;
                self.line = stmt.line();
                self.emit(OpCode::Raise);
            }
            StmtKind::Break => {
                let try_depth = self.enclosing_loop("break", stmt.line())?.try_depth;
                self.unwind_tries(try_depth);
                let at = self.emit(OpCode::Jump(0));
                if let Some(context) = self.loops.last_mut() {
                    context.breaks.push(at);
                }
            }
            StmtKind::Continue => {
                let (start, try_depth) = {
                    let context = self.enclosing_loop("continue", stmt.line())?;
                    (context.start, context.try_depth)
                };
                self.unwind_tries(try_depth);
                self.emit(OpCode::Jump(start as u32));
            }
            StmtKind::Pass => {}
            StmtKind::Import { path, alias } => {
                let index = self.name_constant(&path.join("."));
                self.emit(OpCode::Import(index));
                let binding = alias
                    .as_deref()
                    .or_else(|| path.last().map(String::as_str))
                    .unwrap_or_default();
                let index = self.name_constant(binding);
                self.emit(OpCode::DeclareName(index));
            }
            StmtKind::FromImport { path, names } => {
                let index = self.name_constant(&path.join("."));
                self.emit(OpCode::Import(index));
                for name in names {
                    let index = self.name_constant(name);
                    self.emit(OpCode::ImportFrom(index));
                    self.emit(OpCode::DeclareName(index));
                }
                self.emit(OpCode::Pop);
            }
        }
        Ok(())
    }

    fn compile_assign(&mut self, target: &Expr, value: &Expr, line: usize) -> CompileResult<()> {
        match &target.kind {
            ExprKind::VarRef(name) => {
                self.compile_expr(value)?;
                self.line = line;
                let index = self.name_constant(name);
                self.emit(OpCode::SetName(index));
            }
            ExprKind::MemberAccess { object, member } => {
                self.compile_expr(object)?;
                self.compile_expr(value)?;
                self.line = line;
                let index = self.name_constant(member);
                self.emit(OpCode::SetAttr(index));
            }
            ExprKind::IndexAccess { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.compile_expr(value)?;
                self.line = line;
                self.emit(OpCode::SetIndex);
            }
            _ => return Err(CompileError::new("invalid assignment target", line)),
        }
        Ok(())
    }

    /// Decorators are evaluated before the function object is created and
    /// applied innermost (last written) first
    fn compile_function(&mut self, def: &FunctionDef) -> CompileResult<()> {
        for decorator in &def.decorators {
            self.compile_expr(decorator)?;
        }
        let mut defaults = 0;
        for param in &def.params {
            if let Some(default) = &param.default {
                self.compile_expr(default)?;
                defaults += 1;
            }
        }
        let kind = if def.is_async {
            FunctionKind::Async
        } else if def.is_generator {
            FunctionKind::Generator
        } else {
            FunctionKind::Plain
        };
        let params = def.params.iter().map(|p| p.name.clone()).collect();
        let proto = Compiler::compile_body(&def.name, params, kind, def.keyword.line, &def.body)?;
        self.line = def.keyword.line;
        let proto = self.chunk.add_constant(Constant::Function(Rc::new(proto)));
        self.emit(OpCode::MakeFunction { proto, defaults });
        for _ in &def.decorators {
            self.emit(OpCode::Call {
                positional: 1,
                keywords: 0,
            });
        }
        let index = self.name_constant(&def.name);
        self.emit(OpCode::DeclareName(index));
        Ok(())
    }

    fn compile_class(&mut self, def: &ClassDef) -> CompileResult<()> {
        for decorator in &def.decorators {
            self.compile_expr(decorator)?;
        }
        let proto = Compiler::compile_body(
            &def.name,
            Vec::new(),
            FunctionKind::ClassBody,
            def.keyword.line,
            &def.body,
        )?;
        self.line = def.keyword.line;
        let proto = self.chunk.add_constant(Constant::Function(Rc::new(proto)));
        self.emit(OpCode::MakeClass(proto));
        for _ in &def.decorators {
            self.emit(OpCode::Call {
                positional: 1,
                keywords: 0,
            });
        }
        let index = self.name_constant(&def.name);
        self.emit(OpCode::DeclareName(index));
        Ok(())
    }

    fn enclosing_loop(&self, keyword: &str, line: usize) -> CompileResult<&LoopContext> {
        self.loops
            .last()
            .ok_or_else(|| CompileError::new(format!("'{}' outside loop", keyword), line))
    }

    /// Drop handlers of `try` blocks opened inside the loop
    fn unwind_tries(&mut self, loop_depth: usize) {
        for _ in loop_depth..self.try_depth {
            self.emit(OpCode::PopTry);
        }
    }

    fn close_loop(&mut self) {
        if let Some(context) = self.loops.pop() {
            for at in context.breaks {
                self.patch_here(at);
            }
        }
    }
}

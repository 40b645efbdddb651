//! Expression lowering

use super::{CompileResult, Compiler};
use crate::compiler::parser::{BinaryOp, Expr, ExprKind, TemplatePart, UnaryOp};
use crate::runtime::bytecode::{Constant, OpCode};

impl Compiler {
    /// Emit an instruction attributed to `expr`'s line
    fn emit_for(&mut self, expr: &Expr, op: OpCode) -> usize {
        self.chunk.write_op(op, expr.line())
    }

    pub(super) fn compile_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.kind {
            ExprKind::LiteralInt(i) => {
                let index = self.chunk.add_constant(Constant::Int(*i));
                self.emit_for(expr, OpCode::Constant(index));
            }
            ExprKind::LiteralFloat(f) => {
                let index = self.chunk.add_constant(Constant::Float(*f));
                self.emit_for(expr, OpCode::Constant(index));
            }
            ExprKind::LiteralString(s) => {
                let index = self.chunk.add_constant(Constant::Str(s.clone()));
                self.emit_for(expr, OpCode::Constant(index));
            }
            ExprKind::LiteralTrue => {
                self.emit_for(expr, OpCode::True);
            }
            ExprKind::LiteralFalse => {
                self.emit_for(expr, OpCode::False);
            }
            ExprKind::LiteralNull => {
                self.emit_for(expr, OpCode::Null);
            }
            ExprKind::Template(parts) => {
                for part in parts {
                    match part {
                        TemplatePart::Text(text) => {
                            let index = self.chunk.add_constant(Constant::Str(text.clone()));
                            self.emit_for(expr, OpCode::Constant(index));
                        }
                        TemplatePart::Interpolation(inner) => self.compile_expr(inner)?,
                    }
                }
                self.emit_for(expr, OpCode::BuildTemplate(parts.len() as u32));
            }
            ExprKind::LiteralList(items) => {
                for item in items {
                    self.compile_expr(item)?;
                }
                self.emit_for(expr, OpCode::BuildList(items.len() as u32));
            }
            ExprKind::LiteralMap(entries) => {
                for (key, value) in entries {
                    let index = self.chunk.add_constant(Constant::Str(key.clone()));
                    self.emit_for(expr, OpCode::Constant(index));
                    self.compile_expr(value)?;
                }
                self.emit_for(expr, OpCode::BuildMap(entries.len() as u32));
            }
            ExprKind::VarRef(name) => {
                let index = self.name_constant(name);
                self.emit_for(expr, OpCode::GetName(index));
            }
            ExprKind::Unary { op, operand } => {
                self.compile_expr(operand)?;
                let op = match op {
                    UnaryOp::Negate => OpCode::Negate,
                    UnaryOp::Not => OpCode::Not,
                };
                self.emit_for(expr, op);
            }
            ExprKind::Binary { op, left, right } if op.is_logical() => {
                self.compile_expr(left)?;
                let jump = match op {
                    BinaryOp::And => OpCode::JumpIfFalseKeep(0),
                    _ => OpCode::JumpIfTrueKeep(0),
                };
                let short = self.emit_for(expr, jump);
                self.emit_for(expr, OpCode::Pop);
                self.compile_expr(right)?;
                self.patch_here(short);
            }
            ExprKind::Binary { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit_for(expr, binary_opcode(*op));
            }
            ExprKind::FunctionCall {
                callee,
                arguments,
                keywords,
            } => {
                self.compile_expr(callee)?;
                for argument in arguments {
                    self.compile_expr(argument)?;
                }
                for (name, value) in keywords {
                    let index = self.name_constant(name);
                    self.emit_for(value, OpCode::Constant(index));
                    self.compile_expr(value)?;
                }
                self.emit_for(
                    expr,
                    OpCode::Call {
                        positional: arguments.len() as u32,
                        keywords: keywords.len() as u32,
                    },
                );
            }
            ExprKind::MemberAccess { object, member } => {
                self.compile_expr(object)?;
                let index = self.name_constant(member);
                self.emit_for(expr, OpCode::GetAttr(index));
            }
            ExprKind::IndexAccess { object, index } => {
                self.compile_expr(object)?;
                self.compile_expr(index)?;
                self.emit_for(expr, OpCode::GetIndex);
            }
            ExprKind::Await(operand) => {
                self.compile_expr(operand)?;
                self.emit_for(expr, OpCode::Await);
            }
        }
        Ok(())
    }
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Subtract => OpCode::Subtract,
        BinaryOp::Multiply => OpCode::Multiply,
        BinaryOp::Divide => OpCode::Divide,
        BinaryOp::Modulo => OpCode::Modulo,
        BinaryOp::Equal => OpCode::Equal,
        BinaryOp::NotEqual => OpCode::NotEqual,
        BinaryOp::Less => OpCode::Less,
        BinaryOp::LessEqual => OpCode::LessEqual,
        BinaryOp::Greater => OpCode::Greater,
        BinaryOp::GreaterEqual => OpCode::GreaterEqual,
        // short-circuit operators never reach here
        BinaryOp::And | BinaryOp::Or => OpCode::Pop,
    }
}

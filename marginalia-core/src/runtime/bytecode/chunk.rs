//! Bytecode chunk

use super::{Constant, OpCode};
use serde::{Deserialize, Serialize};

/// Instructions of one function body with their constant pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub code: Vec<OpCode>,
    pub constants: Vec<Constant>,
    /// Source line of each instruction
    pub lines: Vec<usize>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction, returning its index
    pub fn write_op(&mut self, op: OpCode, line: usize) -> usize {
        self.code.push(op);
        self.lines.push(line);
        self.code.len() - 1
    }

    /// Add a constant, reusing an equal string constant
    pub fn add_constant(&mut self, constant: Constant) -> u32 {
        if let Constant::Str(ref s) = constant {
            if let Some(index) = self
                .constants
                .iter()
                .position(|c| matches!(c, Constant::Str(existing) if existing == s))
            {
                return index as u32;
            }
        }
        self.constants.push(constant);
        (self.constants.len() - 1) as u32
    }

    /// Index of the next instruction
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Point the jump at `at` to `target`
    pub fn patch_jump(&mut self, at: usize, target: usize) {
        let target = target as u32;
        if let Some(op) = self.code.get_mut(at) {
            *op = match *op {
                OpCode::Jump(_) => OpCode::Jump(target),
                OpCode::JumpIfFalse(_) => OpCode::JumpIfFalse(target),
                OpCode::JumpIfFalseKeep(_) => OpCode::JumpIfFalseKeep(target),
                OpCode::JumpIfTrueKeep(_) => OpCode::JumpIfTrueKeep(target),
                OpCode::SetupTry(_) => OpCode::SetupTry(target),
                OpCode::ForIter(_) => OpCode::ForIter(target),
                other => other,
            };
        }
    }

    pub fn line_at(&self, ip: usize) -> usize {
        self.lines.get(ip).copied().unwrap_or(0)
    }

    /// Name stored at a constant index
    pub fn name(&self, index: u32) -> &str {
        match self.constants.get(index as usize) {
            Some(Constant::Str(s)) => s,
            _ => "",
        }
    }

    /// Human-readable listing, used by `marginalia compile --dump`
    pub fn disassemble(&self, title: &str) -> String {
        let mut out = format!("== {} ==\n", title);
        for (ip, op) in self.code.iter().enumerate() {
            out.push_str(&format!("{:04} {:>4} {:?}\n", ip, self.line_at(ip), op));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_lines() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Null, 1);
        let at = chunk.write_op(OpCode::Return, 2);
        assert_eq!(at, 1);
        assert_eq!(chunk.line_at(1), 2);
        assert_eq!(chunk.line_at(99), 0);
    }

    #[test]
    fn test_string_constants_deduplicated() {
        let mut chunk = Chunk::new();
        let a = chunk.add_constant(Constant::Str("x".to_string()));
        let b = chunk.add_constant(Constant::Int(1));
        let c = chunk.add_constant(Constant::Str("x".to_string()));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(chunk.name(a), "x");
    }

    #[test]
    fn test_patch_jump() {
        let mut chunk = Chunk::new();
        let at = chunk.write_op(OpCode::JumpIfFalse(0), 1);
        chunk.write_op(OpCode::Pop, 1);
        chunk.patch_jump(at, 2);
        assert_eq!(chunk.code[at], OpCode::JumpIfFalse(2));
    }

    #[test]
    fn test_disassemble() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::True, 3);
        let listing = chunk.disassemble("main");
        assert!(listing.contains("== main =="));
        assert!(listing.contains("True"));
    }
}

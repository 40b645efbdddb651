//! Instruction dispatch loop

use super::{Frame, Thrown, TryHandler, VmResult, VM};
use crate::runtime::bytecode::{Constant, OpCode};
use crate::runtime::value::{ClassObj, Closure, Env, MapObj, Scope, Value};
use crate::runtime::{FunctionKind, Proto};
use std::cell::RefCell;
use std::rc::Rc;

/// How a frame stopped running
pub(crate) enum Completion {
    Return(Value),
    /// Suspended at `yield`; the frame can be resumed
    Yield(Value),
}

impl VM {
    /// Run `frame` until it returns, yields, or raises an exception that no
    /// handler in the frame catches
    pub(crate) fn run_frame(&mut self, frame: &mut Frame) -> VmResult<Completion> {
        loop {
            let ip = frame.ip;
            let Some(op) = frame.proto.chunk.code.get(ip).copied() else {
                return Ok(Completion::Return(Value::Null));
            };
            frame.ip += 1;

            #[cfg(feature = "trace_execution")]
            tracing::trace!(
                target: "marginalia::vm",
                function = %frame.proto.name,
                ip,
                ?op,
                depth = frame.stack.len(),
                "step"
            );

            match self.step(frame, op) {
                Ok(None) => {}
                Ok(Some(completion)) => return Ok(completion),
                Err(mut thrown) => {
                    if thrown.line.is_none() {
                        thrown.line = Some(frame.proto.chunk.line_at(ip));
                    }
                    match frame.handlers.pop() {
                        Some(handler) => {
                            frame.stack.truncate(handler.stack_len);
                            frame.stack.push(Value::Error(thrown.error));
                            frame.ip = handler.target;
                        }
                        None => return Err(thrown),
                    }
                }
            }
        }
    }

    fn step(&mut self, frame: &mut Frame, op: OpCode) -> VmResult<Option<Completion>> {
        if frame.stack.len() >= self.limits.max_stack_size {
            return Err(Thrown::new("RuntimeError", "operand stack overflow"));
        }
        match op {
            OpCode::Constant(index) => {
                let value = match frame.proto.chunk.constants.get(index as usize) {
                    Some(Constant::Int(i)) => Value::Int(*i),
                    Some(Constant::Float(f)) => Value::Float(*f),
                    Some(Constant::Str(s)) => Value::str(s),
                    _ => return Err(Thrown::new("RuntimeError", "invalid constant")),
                };
                frame.stack.push(value);
            }
            OpCode::Null => frame.stack.push(Value::Null),
            OpCode::True => frame.stack.push(Value::Bool(true)),
            OpCode::False => frame.stack.push(Value::Bool(false)),
            OpCode::Pop => {
                pop(frame)?;
            }
            OpCode::Dup => {
                let top = peek(frame)?;
                frame.stack.push(top);
            }

            OpCode::GetName(index) => {
                let name = frame.proto.chunk.name(index);
                let value = frame
                    .env
                    .get(name)
                    .or_else(|| self.builtin(name))
                    .ok_or_else(|| {
                        Thrown::new("NameError", format!("name '{}' is not defined", name))
                    })?;
                frame.stack.push(value);
            }
            OpCode::DeclareName(index) => {
                let value = pop(frame)?;
                frame.env.declare(frame.proto.chunk.name(index), value);
            }
            OpCode::SetName(index) => {
                let value = pop(frame)?;
                let name = frame.proto.chunk.name(index);
                if !frame.env.assign(name, value) {
                    return Err(Thrown::new(
                        "NameError",
                        format!("cannot assign to undeclared name '{}'", name),
                    ));
                }
            }
            OpCode::GetAttr(index) => {
                let object = pop(frame)?;
                let value = self.get_attr(&object, frame.proto.chunk.name(index))?;
                frame.stack.push(value);
            }
            OpCode::SetAttr(index) => {
                let value = pop(frame)?;
                let object = pop(frame)?;
                self.set_attr(&object, frame.proto.chunk.name(index), value)?;
            }
            OpCode::GetIndex => {
                let index = pop(frame)?;
                let object = pop(frame)?;
                frame.stack.push(self.get_index(&object, &index)?);
            }
            OpCode::SetIndex => {
                let value = pop(frame)?;
                let index = pop(frame)?;
                let object = pop(frame)?;
                self.set_index(&object, &index, value)?;
            }

            OpCode::BuildList(count) => {
                let items = pop_n(frame, count as usize)?;
                frame.stack.push(Value::list(items));
            }
            OpCode::BuildMap(count) => {
                let flat = pop_n(frame, count as usize * 2)?;
                let mut map = MapObj::new();
                let mut items = flat.into_iter();
                while let (Some(key), Some(value)) = (items.next(), items.next()) {
                    match key {
                        Value::Str(key) => map.insert(key, value),
                        other => {
                            return Err(Thrown::type_error(format!(
                                "map keys must be str, not {}",
                                other.type_name()
                            )))
                        }
                    }
                }
                frame.stack.push(Value::Map(Rc::new(RefCell::new(map))));
            }
            OpCode::BuildTemplate(count) => {
                let parts = pop_n(frame, count as usize)?;
                let text: String = parts.iter().map(Value::to_display_string).collect();
                frame.stack.push(Value::str(&text));
            }

            OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Modulo
            | OpCode::Equal
            | OpCode::NotEqual
            | OpCode::Less
            | OpCode::LessEqual
            | OpCode::Greater
            | OpCode::GreaterEqual => {
                let right = pop(frame)?;
                let left = pop(frame)?;
                frame.stack.push(super::operators::binary(op, &left, &right)?);
            }
            OpCode::Negate => {
                let operand = pop(frame)?;
                frame.stack.push(super::operators::negate(&operand)?);
            }
            OpCode::Not => {
                let operand = pop(frame)?;
                frame.stack.push(Value::Bool(!operand.is_truthy()));
            }

            OpCode::Jump(target) => frame.ip = target as usize,
            OpCode::JumpIfFalse(target) => {
                if !pop(frame)?.is_truthy() {
                    frame.ip = target as usize;
                }
            }
            OpCode::JumpIfFalseKeep(target) => {
                if !peek(frame)?.is_truthy() {
                    frame.ip = target as usize;
                }
            }
            OpCode::JumpIfTrueKeep(target) => {
                if peek(frame)?.is_truthy() {
                    frame.ip = target as usize;
                }
            }

            OpCode::Call {
                positional,
                keywords,
            } => {
                let flat = pop_n(frame, keywords as usize * 2)?;
                let mut kwargs = Vec::with_capacity(keywords as usize);
                let mut items = flat.into_iter();
                while let (Some(name), Some(value)) = (items.next(), items.next()) {
                    kwargs.push((name.to_display_string(), value));
                }
                let args = pop_n(frame, positional as usize)?;
                let callee = pop(frame)?;
                let result = self.call_value(callee, args, kwargs)?;
                frame.stack.push(result);
            }
            OpCode::MakeFunction { proto, defaults } => {
                let proto = function_constant(frame, proto)?;
                let defaults = pop_n(frame, defaults as usize)?;
                frame.stack.push(Value::Function(Rc::new(Closure {
                    proto,
                    env: frame.env.clone(),
                    defaults,
                })));
            }
            OpCode::MakeClass(index) => {
                let proto = function_constant(frame, index)?;
                let class = self.make_class(proto, frame.env.clone())?;
                frame.stack.push(class);
            }
            OpCode::Return => {
                let value = frame.stack.pop().unwrap_or(Value::Null);
                return Ok(Some(Completion::Return(value)));
            }
            OpCode::Yield => {
                let value = pop(frame)?;
                if frame.proto.kind != FunctionKind::Generator {
                    return Err(Thrown::new("RuntimeError", "'yield' outside generator"));
                }
                return Ok(Some(Completion::Yield(value)));
            }
            OpCode::Await => {
                let awaitable = pop(frame)?;
                let value = self.await_value(awaitable)?;
                frame.stack.push(value);
            }
            OpCode::Raise => {
                let value = pop(frame)?;
                return Err(Thrown::from_value(value));
            }

            OpCode::SetupTry(target) => frame.handlers.push(TryHandler {
                target: target as usize,
                stack_len: frame.stack.len(),
            }),
            OpCode::PopTry => {
                frame.handlers.pop();
            }

            OpCode::Import(index) => {
                let name = frame.proto.chunk.name(index).to_string();
                let module = self.import_module(&name)?;
                frame.stack.push(module);
            }
            OpCode::ImportFrom(index) => {
                let name = frame.proto.chunk.name(index).to_string();
                let module = peek(frame)?;
                let value = self.import_from(&module, &name)?;
                frame.stack.push(value);
            }

            OpCode::GetIter => {
                let iterable = pop(frame)?;
                frame.stack.push(self.make_iterator(iterable)?);
            }
            OpCode::ForIter(target) => {
                let iterator = peek(frame)?;
                match self.iter_next(&iterator)? {
                    Some(item) => frame.stack.push(item),
                    None => {
                        pop(frame)?;
                        frame.ip = target as usize;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Run a class body in its own scope and collect its bindings
    fn make_class(&mut self, proto: Rc<Proto>, parent: Env) -> VmResult<Value> {
        let scope = Scope::new(Some(parent));
        let name = proto.name.clone();
        self.run_to_completion(Frame::new(proto, scope.clone()))?;
        Ok(Value::Class(Rc::new(ClassObj {
            name,
            attrs: RefCell::new(scope.bindings()),
        })))
    }

    fn import_from(&mut self, module: &Value, name: &str) -> VmResult<Value> {
        let Value::Module(module) = module else {
            return Err(Thrown::new("ImportError", "import source is not a module"));
        };
        if let Some(value) = module.scope.get_local(name) {
            return Ok(value);
        }
        let qualified = format!("{}.{}", module.name, name);
        self.import_module(&qualified).map_err(|thrown| {
            if thrown.kind() != "ImportError" {
                return thrown;
            }
            Thrown::new(
                "ImportError",
                format!("cannot import name '{}' from '{}'", name, module.name),
            )
        })
    }
}

fn pop(frame: &mut Frame) -> VmResult<Value> {
    frame
        .stack
        .pop()
        .ok_or_else(|| Thrown::new("RuntimeError", "operand stack underflow"))
}

fn peek(frame: &Frame) -> VmResult<Value> {
    frame
        .stack
        .last()
        .cloned()
        .ok_or_else(|| Thrown::new("RuntimeError", "operand stack underflow"))
}

fn pop_n(frame: &mut Frame, count: usize) -> VmResult<Vec<Value>> {
    if frame.stack.len() < count {
        return Err(Thrown::new("RuntimeError", "operand stack underflow"));
    }
    let at = frame.stack.len() - count;
    Ok(frame.stack.split_off(at))
}

fn function_constant(frame: &Frame, index: u32) -> VmResult<Rc<Proto>> {
    match frame.proto.chunk.constants.get(index as usize) {
        Some(Constant::Function(proto)) => Ok(proto.clone()),
        _ => Err(Thrown::new("RuntimeError", "invalid function constant")),
    }
}

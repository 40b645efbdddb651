//! Calls, generators and coroutines

use super::execution::Completion;
use super::{Frame, Thrown, VmResult, VM};
use crate::runtime::value::{
    Closure, CoroutineObj, GeneratorObj, GeneratorState, InstanceObj, IteratorObj, Pending, Scope,
    Value,
};
use crate::runtime::FunctionKind;
use marginalia_log::LogEvent;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Match call arguments to parameters.
///
/// Returns one slot per parameter holding the value the caller supplied,
/// or `None` where the parameter is left to its default.
pub(crate) fn bind_arguments(
    name: &str,
    params: &[String],
    defaults: usize,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
) -> VmResult<Vec<Option<Value>>> {
    if args.len() > params.len() {
        return Err(Thrown::type_error(format!(
            "{}() takes {} positional arguments but {} were given",
            name,
            params.len(),
            args.len()
        )));
    }
    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    for (slot, value) in slots.iter_mut().zip(args) {
        *slot = Some(value);
    }
    for (key, value) in kwargs {
        let index = params.iter().position(|p| *p == key).ok_or_else(|| {
            Thrown::type_error(format!(
                "{}() got an unexpected keyword argument '{}'",
                name, key
            ))
        })?;
        if slots[index].is_some() {
            return Err(Thrown::type_error(format!(
                "{}() got multiple values for argument '{}'",
                name, key
            )));
        }
        slots[index] = Some(value);
    }
    let first_default = params.len().saturating_sub(defaults);
    for (index, slot) in slots.iter().enumerate() {
        if slot.is_none() && index < first_default {
            return Err(Thrown::type_error(format!(
                "{}() missing required argument '{}'",
                name, params[index]
            )));
        }
    }
    Ok(slots)
}

impl VM {
    pub(crate) fn call_value(
        &mut self,
        callee: Value,
        mut args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> VmResult<Value> {
        match callee {
            Value::Function(closure) => self.call_closure(&closure, args, kwargs),
            Value::Native(native) => {
                let func = native.func.clone();
                func(self, args, kwargs)
            }
            Value::BoundMethod(bound) => {
                args.insert(0, bound.receiver.clone());
                self.call_value(bound.method.clone(), args, kwargs)
            }
            Value::Class(class) => {
                let instance = Value::Instance(Rc::new(InstanceObj {
                    class: class.clone(),
                    fields: RefCell::new(HashMap::new()),
                }));
                let init = class.attrs.borrow().get("init").cloned();
                match init {
                    Some(init) => {
                        args.insert(0, instance.clone());
                        self.call_value(init, args, kwargs)?;
                    }
                    None if !args.is_empty() || !kwargs.is_empty() => {
                        return Err(Thrown::type_error(format!(
                            "{}() takes no arguments",
                            class.name
                        )));
                    }
                    None => {}
                }
                Ok(instance)
            }
            other => Err(Thrown::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_closure(
        &mut self,
        closure: &Rc<Closure>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> VmResult<Value> {
        let proto = &closure.proto;
        let slots = bind_arguments(&proto.name, &proto.params, closure.defaults.len(), args, kwargs)?;
        let env = Scope::new(Some(closure.env.clone()));
        let first_default = proto.params.len() - closure.defaults.len();
        for (index, (param, slot)) in proto.params.iter().zip(slots).enumerate() {
            let value = match slot {
                Some(value) => value,
                None => closure.defaults[index - first_default].clone(),
            };
            env.declare(param, value);
        }
        let frame = Frame::new(proto.clone(), env);
        match proto.kind {
            FunctionKind::Generator => Ok(Value::Generator(Rc::new(RefCell::new(
                GeneratorObj::new(proto.name.clone(), frame),
            )))),
            FunctionKind::Async => Ok(Value::Coroutine(Rc::new(RefCell::new(CoroutineObj {
                name: proto.name.clone(),
                pending: Some(Pending::Frame(frame)),
            })))),
            FunctionKind::Plain | FunctionKind::Module | FunctionKind::ClassBody => {
                self.run_to_completion(frame)
            }
        }
    }

    /// Run a non-suspending frame to its return value
    pub(crate) fn run_to_completion(&mut self, mut frame: Frame) -> VmResult<Value> {
        self.enter()?;
        let result = self.run_frame(&mut frame);
        self.leave();
        match result? {
            Completion::Return(value) => Ok(value),
            Completion::Yield(_) => Err(Thrown::new("RuntimeError", "'yield' outside generator")),
        }
    }

    /// Advance a generator to its next yielded value; `None` once exhausted.
    ///
    /// Instrumented generators emit `started` on the first resume and
    /// `success` (with the return value) or `failure` when they finish.
    pub fn resume_generator(&mut self, generator: &Rc<RefCell<GeneratorObj>>) -> VmResult<Option<Value>> {
        let (frame, start) = {
            let mut gen = generator.borrow_mut();
            match gen.state {
                GeneratorState::Done => return Ok(None),
                GeneratorState::Running => {
                    return Err(Thrown::new("ValueError", "generator already executing"))
                }
                GeneratorState::Suspended => {}
            }
            let start = match &mut gen.instrument {
                Some(inst) if !inst.started => {
                    inst.started = true;
                    Some(LogEvent::started(inst.context.clone(), inst.arguments.clone()))
                }
                _ => None,
            };
            gen.state = GeneratorState::Running;
            (gen.frame.take(), start)
        };
        let Some(mut frame) = frame else {
            generator.borrow_mut().state = GeneratorState::Done;
            return Ok(None);
        };
        if let Some(event) = start {
            if let Err(thrown) = self.emit_event(&event) {
                generator.borrow_mut().state = GeneratorState::Done;
                return Err(thrown);
            }
        }

        let result = match self.enter() {
            Ok(()) => {
                let result = self.run_frame(&mut frame);
                self.leave();
                result
            }
            Err(thrown) => Err(thrown),
        };
        let context = generator
            .borrow()
            .instrument
            .as_ref()
            .map(|inst| inst.context.clone());

        match result {
            Ok(Completion::Yield(value)) => {
                let mut gen = generator.borrow_mut();
                gen.frame = Some(frame);
                gen.state = GeneratorState::Suspended;
                Ok(Some(value))
            }
            Ok(Completion::Return(value)) => {
                generator.borrow_mut().state = GeneratorState::Done;
                if let Some(context) = context {
                    self.emit_event(&LogEvent::success(context, value.to_json()))?;
                }
                Ok(None)
            }
            Err(thrown) => {
                generator.borrow_mut().state = GeneratorState::Done;
                if let Some(context) = context {
                    self.emit_event(&LogEvent::failure(context, thrown.error.describe()))?;
                }
                Err(thrown)
            }
        }
    }

    /// Drive an awaitable to completion. A coroutine can be awaited once.
    pub fn await_value(&mut self, awaitable: Value) -> VmResult<Value> {
        let coroutine = match awaitable {
            Value::Coroutine(coroutine) => coroutine,
            other => {
                return Err(Thrown::type_error(format!(
                    "object {} can't be used in 'await' expression",
                    other.type_name()
                )))
            }
        };
        let pending = coroutine.borrow_mut().pending.take().ok_or_else(|| {
            Thrown::new("RuntimeError", "cannot reuse already awaited coroutine")
        })?;
        match pending {
            Pending::Frame(frame) => self.run_to_completion(frame),
            Pending::Instrumented {
                inner,
                context,
                arguments,
            } => crate::runtime::instrument::run_instrumented(self, context, arguments, move |vm| {
                vm.await_value(inner)
            }),
        }
    }

    pub(crate) fn make_iterator(&mut self, iterable: Value) -> VmResult<Value> {
        let iterator = match iterable {
            Value::List(items) => IteratorObj::Sequence { items, index: 0 },
            Value::Map(map) => IteratorObj::Items {
                items: map.borrow().keys().into_iter().map(Value::Str).collect(),
                index: 0,
            },
            Value::Str(s) => IteratorObj::Items {
                items: s.chars().map(|c| Value::str(&c.to_string())).collect(),
                index: 0,
            },
            Value::Generator(generator) => IteratorObj::Generator(generator),
            Value::Iterator(iterator) => return Ok(Value::Iterator(iterator)),
            other => {
                return Err(Thrown::type_error(format!(
                    "'{}' object is not iterable",
                    other.type_name()
                )))
            }
        };
        Ok(Value::Iterator(Rc::new(RefCell::new(iterator))))
    }

    pub(crate) fn iter_next(&mut self, iterator: &Value) -> VmResult<Option<Value>> {
        let Value::Iterator(iterator) = iterator else {
            return Err(Thrown::type_error(format!(
                "'{}' object is not an iterator",
                iterator.type_name()
            )));
        };
        let generator = {
            let mut state = iterator.borrow_mut();
            match &mut *state {
                IteratorObj::Sequence { items, index } => {
                    let item = items.borrow().get(*index).cloned();
                    *index += 1;
                    return Ok(item);
                }
                IteratorObj::Items { items, index } => {
                    let item = items.get(*index).cloned();
                    *index += 1;
                    return Ok(item);
                }
                IteratorObj::Generator(generator) => generator.clone(),
            }
        };
        self.resume_generator(&generator)
    }

    /// Collect every remaining item of an iterable
    pub(crate) fn collect_items(&mut self, iterable: Value) -> VmResult<Vec<Value>> {
        let iterator = self.make_iterator(iterable)?;
        let mut items = Vec::new();
        while let Some(item) = self.iter_next(&iterator)? {
            items.push(item);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_bind_positional_and_keyword() {
        let slots = bind_arguments(
            "f",
            &params(&["a", "b", "c"]),
            1,
            vec![Value::Int(1)],
            vec![("b".to_string(), Value::Int(2))],
        )
        .unwrap();
        assert!(slots[0].as_ref().unwrap().equals(&Value::Int(1)));
        assert!(slots[1].as_ref().unwrap().equals(&Value::Int(2)));
        assert!(slots[2].is_none());
    }

    #[test]
    fn test_bind_errors() {
        let p = params(&["a"]);
        let too_many = bind_arguments("f", &p, 0, vec![Value::Null, Value::Null], vec![]);
        assert!(too_many.unwrap_err().message().contains("positional"));

        let unknown = bind_arguments("f", &p, 0, vec![], vec![("z".to_string(), Value::Null)]);
        assert!(unknown.unwrap_err().message().contains("unexpected keyword"));

        let twice = bind_arguments(
            "f",
            &p,
            0,
            vec![Value::Null],
            vec![("a".to_string(), Value::Null)],
        );
        assert!(twice.unwrap_err().message().contains("multiple values"));

        let missing = bind_arguments("f", &p, 0, vec![], vec![]);
        let missing = missing.unwrap_err();
        assert_eq!(missing.kind(), "TypeError");
        assert!(missing.message().contains("'a'"));
    }
}

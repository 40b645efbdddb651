//! Attribute and subscript access

use super::{Thrown, VmResult, VM};
use crate::runtime::value::{BoundMethod, Value};
use std::rc::Rc;

impl VM {
    pub(crate) fn get_attr(&mut self, object: &Value, name: &str) -> VmResult<Value> {
        let found = match object {
            Value::Module(module) => module.scope.get_local(name),
            Value::Instance(instance) => {
                let field = instance.fields.borrow().get(name).cloned();
                match field {
                    Some(value) => Some(value),
                    None => {
                        let attr = instance.class.attrs.borrow().get(name).cloned();
                        attr.map(|attr| bind_method(object, attr))
                    }
                }
            }
            Value::Class(class) => match name {
                "__name__" => Some(Value::str(&class.name)),
                _ => class.attrs.borrow().get(name).cloned(),
            },
            Value::Error(error) => match name {
                "kind" => Some(Value::str(&error.kind)),
                "message" => Some(Value::str(&error.message)),
                _ => None,
            },
            Value::Function(_) | Value::Native(_) if name == "__name__" => {
                Some(Value::str(&object.callable_name()))
            }
            Value::List(_) | Value::Map(_) | Value::Str(_) => builtin_method(object, name),
            _ => None,
        };
        found.ok_or_else(|| {
            let message = match object {
                Value::Module(module) => {
                    format!("module '{}' has no attribute '{}'", module.name, name)
                }
                other => format!("'{}' object has no attribute '{}'", other.type_name(), name),
            };
            Thrown::new("AttributeError", message)
        })
    }

    pub(crate) fn set_attr(&mut self, object: &Value, name: &str, value: Value) -> VmResult<()> {
        match object {
            Value::Instance(instance) => {
                instance.fields.borrow_mut().insert(name.to_string(), value);
            }
            Value::Class(class) => {
                class.attrs.borrow_mut().insert(name.to_string(), value);
            }
            Value::Module(module) => module.scope.declare(name, value),
            other => {
                return Err(Thrown::new(
                    "AttributeError",
                    format!("cannot set attribute '{}' on '{}'", name, other.type_name()),
                ))
            }
        }
        Ok(())
    }

    pub(crate) fn get_index(&mut self, object: &Value, index: &Value) -> VmResult<Value> {
        match (object, index) {
            (Value::List(items), Value::Int(i)) => {
                let items = items.borrow();
                let at = normalize(*i, items.len())
                    .ok_or_else(|| Thrown::new("IndexError", "list index out of range"))?;
                Ok(items[at].clone())
            }
            (Value::Str(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                let at = normalize(*i, chars.len())
                    .ok_or_else(|| Thrown::new("IndexError", "string index out of range"))?;
                Ok(Value::str(&chars[at].to_string()))
            }
            (Value::Map(map), Value::Str(key)) => map
                .borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| Thrown::new("KeyError", format!("'{}'", key))),
            (object, index) => Err(Thrown::type_error(format!(
                "'{}' object is not subscriptable with '{}'",
                object.type_name(),
                index.type_name()
            ))),
        }
    }

    pub(crate) fn set_index(&mut self, object: &Value, index: &Value, value: Value) -> VmResult<()> {
        match (object, index) {
            (Value::List(items), Value::Int(i)) => {
                let mut items = items.borrow_mut();
                let at = normalize(*i, items.len())
                    .ok_or_else(|| Thrown::new("IndexError", "list assignment index out of range"))?;
                items[at] = value;
                Ok(())
            }
            (Value::Map(map), Value::Str(key)) => {
                map.borrow_mut().insert(key.clone(), value);
                Ok(())
            }
            (object, index) => Err(Thrown::type_error(format!(
                "'{}' object does not support item assignment with '{}'",
                object.type_name(),
                index.type_name()
            ))),
        }
    }
}

/// Resolve a possibly negative index against `len`
fn normalize(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let at = if index < 0 { index + len } else { index };
    (0..len).contains(&at).then_some(at as usize)
}

/// Functions found on a class are bound to the instance they are looked
/// up through
fn bind_method(receiver: &Value, attr: Value) -> Value {
    let binds = match &attr {
        Value::Function(_) => true,
        Value::Native(native) => native.binds,
        _ => false,
    };
    if binds {
        Value::BoundMethod(Rc::new(BoundMethod {
            receiver: receiver.clone(),
            method: attr,
        }))
    } else {
        attr
    }
}

fn arg(args: &[Value], at: usize) -> Value {
    args.get(at).cloned().unwrap_or(Value::Null)
}

fn builtin_method(object: &Value, name: &str) -> Option<Value> {
    let method = match (object, name) {
        (Value::List(items), "append") => {
            let items = items.clone();
            Value::native("append", move |_, args, _| {
                items.borrow_mut().push(arg(&args, 0));
                Ok(Value::Null)
            })
        }
        (Value::List(items), "pop") => {
            let items = items.clone();
            Value::native("pop", move |_, _, _| {
                items
                    .borrow_mut()
                    .pop()
                    .ok_or_else(|| Thrown::new("IndexError", "pop from empty list"))
            })
        }
        (Value::Map(map), "keys") => {
            let map = map.clone();
            Value::native("keys", move |_, _, _| {
                Ok(Value::list(map.borrow().keys().into_iter().map(Value::Str).collect()))
            })
        }
        (Value::Map(map), "values") => {
            let map = map.clone();
            Value::native("values", move |_, _, _| Ok(Value::list(map.borrow().values())))
        }
        (Value::Map(map), "get") => {
            let map = map.clone();
            Value::native("get", move |_, args, _| {
                let found = match args.first() {
                    Some(Value::Str(key)) => map.borrow().get(key).cloned(),
                    _ => None,
                };
                Ok(found.unwrap_or_else(|| arg(&args, 1)))
            })
        }
        (Value::Str(s), "upper") => {
            let s = s.clone();
            Value::native("upper", move |_, _, _| Ok(Value::str(&s.to_uppercase())))
        }
        (Value::Str(s), "lower") => {
            let s = s.clone();
            Value::native("lower", move |_, _, _| Ok(Value::str(&s.to_lowercase())))
        }
        _ => return None,
    };
    Some(method)
}

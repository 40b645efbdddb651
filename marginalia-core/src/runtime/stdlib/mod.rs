//! Builtin functions

use super::value::Value;
use super::vm::{Thrown, VmResult, VM};
use std::collections::HashMap;

type Args = Vec<Value>;
type Kwargs = Vec<(String, Value)>;

fn expect_args(name: &str, args: &[Value], min: usize, max: usize) -> VmResult<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(Thrown::type_error(format!(
            "{}() takes {} arguments ({} given)",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn print(vm: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    let line: Vec<String> = args.iter().map(Value::to_display_string).collect();
    vm.write_line(line.join(" "));
    Ok(Value::Null)
}

fn len(_: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("len", &args, 1, 1)?;
    let n = match &args[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Map(map) => map.borrow().len(),
        other => {
            return Err(Thrown::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::Int(n as i64))
}

fn str_(_: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("str", &args, 1, 1)?;
    Ok(Value::str(&args[0].to_display_string()))
}

fn int(_: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("int", &args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Str(s) => s.trim().parse::<i64>().map(Value::Int).map_err(|_| {
            Thrown::new("ValueError", format!("invalid literal for int(): '{}'", s))
        }),
        other => Err(Thrown::type_error(format!(
            "int() argument must be a number or str, not '{}'",
            other.type_name()
        ))),
    }
}

fn float(_: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("float", &args, 1, 1)?;
    match &args[0] {
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::Str(s) => s.trim().parse::<f64>().map(Value::Float).map_err(|_| {
            Thrown::new("ValueError", format!("could not convert string to float: '{}'", s))
        }),
        other => Err(Thrown::type_error(format!(
            "float() argument must be a number or str, not '{}'",
            other.type_name()
        ))),
    }
}

fn type_(_: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("type", &args, 1, 1)?;
    Ok(Value::str(&args[0].type_name()))
}

fn range(_: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("range", &args, 1, 3)?;
    let mut bounds = Vec::with_capacity(args.len());
    for arg in &args {
        match arg {
            Value::Int(i) => bounds.push(*i),
            other => {
                return Err(Thrown::type_error(format!(
                    "range() arguments must be int, not '{}'",
                    other.type_name()
                )))
            }
        }
    }
    let (start, stop, step) = match bounds.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => (0, 0, 1),
    };
    if step == 0 {
        return Err(Thrown::new("ValueError", "range() step must not be zero"));
    }
    let mut items = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        items.push(Value::Int(i));
        i = match i.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(Value::list(items))
}

fn list(vm: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("list", &args, 0, 1)?;
    match args.into_iter().next() {
        Some(iterable) => Ok(Value::list(vm.collect_items(iterable)?)),
        None => Ok(Value::list(Vec::new())),
    }
}

/// `next(iterator, default?)`; raises `StopIteration` when exhausted and
/// no default is given
fn next(vm: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("next", &args, 1, 2)?;
    let mut args = args.into_iter();
    let target = args.next().unwrap_or(Value::Null);
    let default = args.next();
    let item = match &target {
        Value::Generator(generator) => vm.resume_generator(generator)?,
        Value::Iterator(_) => vm.iter_next(&target)?,
        other => {
            return Err(Thrown::type_error(format!(
                "'{}' object is not an iterator",
                other.type_name()
            )))
        }
    };
    match (item, default) {
        (Some(item), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(Thrown::new("StopIteration", "")),
    }
}

fn iter(vm: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("iter", &args, 1, 1)?;
    let iterable = args.into_iter().next().unwrap_or(Value::Null);
    vm.make_iterator(iterable)
}

fn error(_: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("error", &args, 1, 2)?;
    let kind = args[0].to_display_string();
    let message = args.get(1).map(Value::to_display_string).unwrap_or_default();
    Ok(Value::error(&kind, &message))
}

fn assert(_: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("assert", &args, 1, 2)?;
    if args[0].is_truthy() {
        return Ok(Value::Null);
    }
    let message = args.get(1).map(Value::to_display_string).unwrap_or_default();
    Err(Thrown::new("AssertionError", message))
}

fn repr(_: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("repr", &args, 1, 1)?;
    Ok(Value::str(&args[0].repr()))
}

/// Drive a coroutine to completion from synchronous code
fn run(vm: &mut VM, args: Args, _: Kwargs) -> VmResult<Value> {
    expect_args("run", &args, 1, 1)?;
    let target = args.into_iter().next().unwrap_or(Value::Null);
    match target {
        Value::Coroutine(_) => vm.await_value(target),
        other => Ok(other),
    }
}

/// Builtin scope consulted after the module scope
pub fn builtins() -> HashMap<String, Value> {
    let table: [(&str, fn(&mut VM, Args, Kwargs) -> VmResult<Value>); 14] = [
        ("print", print),
        ("len", len),
        ("str", str_),
        ("int", int),
        ("float", float),
        ("type", type_),
        ("range", range),
        ("list", list),
        ("next", next),
        ("iter", iter),
        ("error", error),
        ("assert", assert),
        ("run", run),
        ("repr", repr),
    ];
    table
        .into_iter()
        .map(|(name, func)| (name.to_string(), Value::native(name, func)))
        .collect()
}

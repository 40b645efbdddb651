//! The `marginalia` runtime module
//!
//! Augmented programs import this module under a private alias. It exposes
//! `emit` (one `working` event per marker) and the three lifecycle
//! decorators the rewriter applies to functions that contain markers.

use super::value::{CoroutineObj, Instrumentation, ModuleObj, NativeFunction, Pending, Scope, Value};
use super::vm::{bind_arguments, Thrown, VmResult, RUNTIME_MODULE, VM};
use marginalia_log::{EventState, LogEvent, Payload};
use std::cell::RefCell;
use std::rc::Rc;

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Emit `started`, run `body`, then emit `success` with its value or
/// `failure` with its error. The error is re-raised unchanged.
pub(crate) fn run_instrumented<F>(
    vm: &mut VM,
    context: String,
    arguments: JsonMap,
    body: F,
) -> VmResult<Value>
where
    F: FnOnce(&mut VM) -> VmResult<Value>,
{
    vm.emit_event(&LogEvent::started(context.clone(), arguments))?;
    match body(vm) {
        Ok(value) => {
            vm.emit_event(&LogEvent::success(context, value.to_json()))?;
            Ok(value)
        }
        Err(thrown) => {
            vm.emit_event(&LogEvent::failure(context, thrown.error.describe()))?;
            Err(thrown)
        }
    }
}

/// Bind call arguments to the parameter names of `target`, keeping only
/// the ones the caller supplied
fn describe_arguments(
    target: &Value,
    args: &[Value],
    kwargs: &[(String, Value)],
) -> VmResult<JsonMap> {
    match target {
        Value::Function(closure) => {
            let proto = &closure.proto;
            let slots = bind_arguments(
                &proto.name,
                &proto.params,
                closure.defaults.len(),
                args.to_vec(),
                kwargs.to_vec(),
            )?;
            Ok(proto
                .params
                .iter()
                .zip(slots)
                .filter_map(|(name, slot)| slot.map(|value| (name.clone(), value.to_json())))
                .collect())
        }
        Value::BoundMethod(bound) => {
            let mut full = Vec::with_capacity(args.len() + 1);
            full.push(bound.receiver.clone());
            full.extend(args.iter().cloned());
            describe_arguments(&bound.method, &full, kwargs)
        }
        Value::Native(native) if native.wrapped.is_some() => match &native.wrapped {
            Some(inner) => describe_arguments(inner, args, kwargs),
            None => Ok(JsonMap::new()),
        },
        _ => {
            let mut map: JsonMap = args
                .iter()
                .enumerate()
                .map(|(i, value)| (format!("arg{}", i), value.to_json()))
                .collect();
            for (name, value) in kwargs {
                map.insert(name.clone(), value.to_json());
            }
            Ok(map)
        }
    }
}

fn string_arg(name: &str, value: &Value) -> VmResult<String> {
    match value {
        Value::Str(s) => Ok(s.to_string()),
        other => Err(Thrown::type_error(format!(
            "{}() expects a str, not '{}'",
            name,
            other.type_name()
        ))),
    }
}

fn payload_for(state: EventState, value: &Value) -> Payload {
    match (state, value) {
        (_, Value::Str(s)) => Payload::Message(s.to_string()),
        (_, Value::Error(error)) => Payload::Failure(error.describe()),
        (EventState::Started, Value::Map(_)) => match value.to_json() {
            serde_json::Value::Object(map) => Payload::Arguments(map),
            other => Payload::Value(other),
        },
        _ => Payload::Value(value.to_json()),
    }
}

/// `emit(state, context, message, symbol = null)`
fn emit(vm: &mut VM, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> VmResult<Value> {
    let params = ["state", "context", "message", "symbol"].map(String::from);
    let slots = bind_arguments("emit", &params, 1, args, kwargs)?;
    let mut slots = slots.into_iter().map(|slot| slot.unwrap_or(Value::Null));
    let mut next = || slots.next().unwrap_or(Value::Null);
    let (state, context, message, symbol) = (next(), next(), next(), next());

    let state_name = string_arg("emit", &state)?;
    let state = EventState::parse(&state_name).ok_or_else(|| {
        Thrown::new("ValueError", format!("unknown event state '{}'", state_name))
    })?;
    let context = string_arg("emit", &context)?;
    let mut event = LogEvent::new(state, context, payload_for(state, &message));
    if let Value::Str(symbol) = &symbol {
        if let Some(entry) = vm.dispatcher().severity_entry(symbol) {
            event = event.with_severity(entry);
        }
    }
    vm.emit_event(&event)?;
    Ok(Value::Null)
}

#[derive(Clone, Copy)]
enum Lifecycle {
    Plain,
    Generator,
    Async,
}

/// Build the wrapper that replaces `target`
fn wrap(target: Value, context: String, lifecycle: Lifecycle) -> Value {
    let inner = target.clone();
    let wrapper = NativeFunction::wrapping(target, move |vm, args, kwargs| {
        let arguments = describe_arguments(&inner, &args, &kwargs)?;
        let inner = inner.clone();
        match lifecycle {
            Lifecycle::Plain => run_instrumented(vm, context.clone(), arguments, move |vm| {
                vm.call_value(inner, args, kwargs)
            }),
            Lifecycle::Generator => {
                let result = vm.call_value(inner, args, kwargs)?;
                if let Value::Generator(generator) = &result {
                    let mut generator = generator.borrow_mut();
                    if generator.instrument.is_none() {
                        generator.instrument = Some(Instrumentation {
                            context: context.clone(),
                            arguments,
                            started: false,
                        });
                    }
                }
                Ok(result)
            }
            Lifecycle::Async => {
                let name = inner.callable_name();
                let awaitable = vm.call_value(inner, args, kwargs)?;
                Ok(Value::Coroutine(Rc::new(RefCell::new(CoroutineObj {
                    name,
                    pending: Some(Pending::Instrumented {
                        inner: awaitable,
                        context: context.clone(),
                        arguments,
                    }),
                }))))
            }
        }
    });
    Value::Native(Rc::new(wrapper))
}

/// `logged(context)` and friends: returns the decorator for one context
fn decorator_factory(name: &'static str, lifecycle: Lifecycle) -> Value {
    Value::native(name, move |_, args, _| {
        let context = match args.first() {
            Some(value) => string_arg(name, value)?,
            None => return Err(Thrown::type_error(format!("{}() missing context", name))),
        };
        Ok(Value::native(name, move |_, args, _| {
            match args.into_iter().next() {
                Some(
                    target @ (Value::Function(_) | Value::Native(_) | Value::BoundMethod(_)),
                ) => Ok(wrap(target, context.clone(), lifecycle)),
                Some(other) => Err(Thrown::type_error(format!(
                    "cannot instrument '{}' object",
                    other.type_name()
                ))),
                None => Err(Thrown::type_error(format!("{}() missing function", name))),
            }
        }))
    })
}

fn define_severity(vm: &mut VM, args: Vec<Value>, kwargs: Vec<(String, Value)>) -> VmResult<Value> {
    let params = ["symbol", "level", "name"].map(String::from);
    let slots = bind_arguments("define_severity", &params, 0, args, kwargs)?;
    let mut slots = slots.into_iter().map(|slot| slot.unwrap_or(Value::Null));
    let symbol = string_arg("define_severity", &slots.next().unwrap_or(Value::Null))?;
    let level = match slots.next() {
        Some(Value::Int(level)) => level,
        _ => return Err(Thrown::type_error("define_severity() level must be int")),
    };
    let name = string_arg("define_severity", &slots.next().unwrap_or(Value::Null))?;
    vm.dispatcher()
        .define_severity(&symbol, level, &name)
        .map_err(|e| Thrown::new("ValueError", e.to_string()))?;
    Ok(Value::Null)
}

/// The module object registered as `marginalia` in every VM
pub fn runtime_module() -> Value {
    let scope = Scope::new(None);
    scope.declare("__name__", Value::str(RUNTIME_MODULE));
    scope.declare("emit", Value::native("emit", emit));
    scope.declare("logged", decorator_factory("logged", Lifecycle::Plain));
    scope.declare(
        "logged_generator",
        decorator_factory("logged_generator", Lifecycle::Generator),
    );
    scope.declare("logged_async", decorator_factory("logged_async", Lifecycle::Async));
    scope.declare("define_severity", Value::native("define_severity", define_severity));
    Value::Module(Rc::new(ModuleObj {
        name: RUNTIME_MODULE.to_string(),
        scope,
    }))
}

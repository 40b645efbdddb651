//! Runtime values
//!
//! Values are reference counted (`Rc`); the VM is single-threaded. Only
//! plain data (`serde_json::Value`) crosses into log handlers.

use super::vm::{Frame, VmResult};
use super::{FunctionKind, Proto};
use marginalia_log::ErrorDescription;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Nesting limit for rendering deeply nested containers
const RENDER_DEPTH: usize = 32;

/// Nesting limit for structural equality
const COMPARE_DEPTH: usize = 512;

/// Containers on the path from the root of a render, by allocation
#[derive(Default)]
struct RenderPath(Vec<*const ()>);

impl RenderPath {
    /// Push `ptr`, or report that it is already being rendered
    fn enter<T>(&mut self, ptr: *const T) -> bool {
        let ptr = ptr as *const ();
        if self.0.contains(&ptr) {
            return false;
        }
        self.0.push(ptr);
        true
    }

    fn leave(&mut self) {
        self.0.pop();
    }
}

pub type Env = Rc<Scope>;

/// A lexical scope: function body, class body or module namespace
#[derive(Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Env>,
}

impl Scope {
    pub fn new(parent: Option<Env>) -> Env {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent,
        })
    }

    /// Bind `name` in this scope
    pub fn declare(&self, name: &str, value: Value) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    /// Look `name` up through the scope chain
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.vars.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    pub fn get_local(&self, name: &str) -> Option<Value> {
        self.vars.borrow().get(name).cloned()
    }

    /// Rebind the nearest existing binding; `false` if there is none
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.vars.borrow_mut().get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }

    /// Snapshot of this scope's own bindings
    pub fn bindings(&self) -> HashMap<String, Value> {
        self.vars.borrow().clone()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<MapObj>>),
    Function(Rc<Closure>),
    Native(Rc<NativeFunction>),
    Class(Rc<ClassObj>),
    Instance(Rc<InstanceObj>),
    BoundMethod(Rc<BoundMethod>),
    Module(Rc<ModuleObj>),
    Generator(Rc<RefCell<GeneratorObj>>),
    Coroutine(Rc<RefCell<CoroutineObj>>),
    Error(Rc<ErrorObj>),
    Iterator(Rc<RefCell<IteratorObj>>),
}

/// Insertion-ordered string-keyed map
#[derive(Clone, Default)]
pub struct MapObj {
    entries: Vec<(Rc<str>, Value)>,
}

impl MapObj {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    pub fn insert(&mut self, key: Rc<str>, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn keys(&self) -> Vec<Rc<str>> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Rc<str>, Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A compiled function bound to its defining scope
pub struct Closure {
    pub proto: Rc<Proto>,
    pub env: Env,
    /// Values for the trailing parameters that declare defaults
    pub defaults: Vec<Value>,
}

pub type NativeFn = dyn Fn(&mut super::VM, Vec<Value>, Vec<(String, Value)>) -> VmResult<Value>;

/// A function implemented in Rust
pub struct NativeFunction {
    pub name: String,
    /// Bound to the receiver when looked up through an instance, like a
    /// script function (set for instrumentation wrappers)
    pub binds: bool,
    /// The function this one wraps, if any
    pub wrapped: Option<Value>,
    pub func: Rc<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut super::VM, Vec<Value>, Vec<(String, Value)>) -> VmResult<Value> + 'static,
    {
        Self {
            name: name.into(),
            binds: false,
            wrapped: None,
            func: Rc::new(func),
        }
    }

    /// A wrapper that stands in for `wrapped`
    pub fn wrapping<F>(wrapped: Value, func: F) -> Self
    where
        F: Fn(&mut super::VM, Vec<Value>, Vec<(String, Value)>) -> VmResult<Value> + 'static,
    {
        Self {
            name: wrapped.callable_name(),
            binds: true,
            wrapped: Some(wrapped),
            func: Rc::new(func),
        }
    }
}

pub struct ClassObj {
    pub name: String,
    pub attrs: RefCell<HashMap<String, Value>>,
}

pub struct InstanceObj {
    pub class: Rc<ClassObj>,
    pub fields: RefCell<HashMap<String, Value>>,
}

pub struct BoundMethod {
    pub receiver: Value,
    pub method: Value,
}

pub struct ModuleObj {
    pub name: String,
    pub scope: Env,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Suspended,
    Running,
    Done,
}

/// Lifecycle events attached to a generator by `logged_generator`
#[derive(Debug, Clone)]
pub struct Instrumentation {
    pub context: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
    pub started: bool,
}

pub struct GeneratorObj {
    pub name: String,
    pub state: GeneratorState,
    pub frame: Option<Frame>,
    pub instrument: Option<Instrumentation>,
}

impl GeneratorObj {
    pub fn new(name: impl Into<String>, frame: Frame) -> Self {
        Self {
            name: name.into(),
            state: GeneratorState::Suspended,
            frame: Some(frame),
            instrument: None,
        }
    }
}

/// Work deferred until a coroutine is awaited
pub enum Pending {
    /// Body of an `async fn`, arguments already bound
    Frame(Frame),
    /// Another awaitable wrapped with lifecycle events
    Instrumented {
        inner: Value,
        context: String,
        arguments: serde_json::Map<String, serde_json::Value>,
    },
}

pub struct CoroutineObj {
    pub name: String,
    /// `None` once awaited
    pub pending: Option<Pending>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorObj {
    pub kind: String,
    pub message: String,
}

impl ErrorObj {
    pub fn describe(&self) -> ErrorDescription {
        ErrorDescription {
            kind: self.kind.clone(),
            message: self.message.clone(),
        }
    }
}

pub enum IteratorObj {
    /// Live view over a list
    Sequence {
        items: Rc<RefCell<Vec<Value>>>,
        index: usize,
    },
    /// Snapshot (map keys, string characters)
    Items { items: Vec<Value>, index: usize },
    Generator(Rc<RefCell<GeneratorObj>>),
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn error(kind: &str, message: &str) -> Value {
        Value::Error(Rc::new(ErrorObj {
            kind: kind.to_string(),
            message: message.to_string(),
        }))
    }

    pub fn native<F>(name: &str, func: F) -> Value
    where
        F: Fn(&mut super::VM, Vec<Value>, Vec<(String, Value)>) -> VmResult<Value> + 'static,
    {
        Value::Native(Rc::new(NativeFunction::new(name, func)))
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Str(_) => "str".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Map(_) => "map".to_string(),
            Value::Function(_) | Value::Native(_) => "function".to_string(),
            Value::Class(_) => "class".to_string(),
            Value::Instance(inst) => inst.class.name.clone(),
            Value::BoundMethod(_) => "method".to_string(),
            Value::Module(_) => "module".to_string(),
            Value::Generator(_) => "generator".to_string(),
            Value::Coroutine(_) => "coroutine".to_string(),
            Value::Error(_) => "error".to_string(),
            Value::Iterator(_) => "iterator".to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Map(m) => !m.borrow().is_empty(),
            _ => true,
        }
    }

    /// Name of a callable, used for wrapper names and diagnostics
    pub fn callable_name(&self) -> String {
        match self {
            Value::Function(c) => c.proto.name.clone(),
            Value::Native(n) => n.name.clone(),
            Value::Class(c) => c.name.clone(),
            Value::BoundMethod(m) => m.method.callable_name(),
            other => other.type_name(),
        }
    }

    /// Kind of the compiled body behind a callable, looking through wrappers
    pub fn function_kind(&self) -> Option<FunctionKind> {
        match self {
            Value::Function(c) => Some(c.proto.kind),
            Value::Native(n) => n.wrapped.as_ref().and_then(|w| w.function_kind()),
            _ => None,
        }
    }

    /// Structural equality; nesting deeper than the limit compares unequal.
    /// See [`Value::try_equals`].
    pub fn equals(&self, other: &Value) -> bool {
        self.try_equals(other).unwrap_or(false)
    }

    /// Structural equality, or `None` when the containers nest too deeply
    /// to compare (self-referential lists, for instance)
    pub fn try_equals(&self, other: &Value) -> Option<bool> {
        self.equals_at(other, 0)
    }

    fn equals_at(&self, other: &Value, depth: usize) -> Option<bool> {
        if depth > COMPARE_DEPTH {
            return None;
        }
        let equal = match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Some(true);
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Some(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.equals_at(y, depth + 1)? {
                        return Some(false);
                    }
                }
                true
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Some(true);
                }
                let (a, b) = (a.borrow(), b.borrow());
                if a.len() != b.len() {
                    return Some(false);
                }
                for (k, v) in a.iter() {
                    let Some(other) = b.get(k) else {
                        return Some(false);
                    };
                    if !v.equals_at(other, depth + 1)? {
                        return Some(false);
                    }
                }
                true
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Generator(a), Value::Generator(b)) => Rc::ptr_eq(a, b),
            (Value::Coroutine(a), Value::Coroutine(b)) => Rc::ptr_eq(a, b),
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::BoundMethod(a), Value::BoundMethod(b)) => {
                a.receiver.equals_at(&b.receiver, depth + 1)?
                    && a.method.equals_at(&b.method, depth + 1)?
            }
            _ => false,
        };
        Some(equal)
    }

    /// String form used by `str()`, `print` and template interpolation
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.render(&mut RenderPath::default()),
        }
    }

    /// Quoted form used inside containers
    pub fn repr(&self) -> String {
        self.render(&mut RenderPath::default())
    }

    /// A container already on `path` renders as `[...]` or `{...}`
    fn render(&self, path: &mut RenderPath) -> String {
        if path.0.len() > RENDER_DEPTH {
            return "...".to_string();
        }
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => format!("{:?}", s.as_ref()),
            Value::List(items) => {
                if !path.enter(Rc::as_ptr(items)) {
                    return "[...]".to_string();
                }
                let rendered: Vec<String> = items.borrow().iter().map(|v| v.render(path)).collect();
                path.leave();
                format!("[{}]", rendered.join(", "))
            }
            Value::Map(map) => {
                if !path.enter(Rc::as_ptr(map)) {
                    return "{...}".to_string();
                }
                let entries: Vec<String> = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| format!("{:?}: {}", k.as_ref(), v.render(path)))
                    .collect();
                path.leave();
                format!("{{{}}}", entries.join(", "))
            }
            Value::Function(c) => format!("<function {}>", c.proto.name),
            Value::Native(n) => match &n.wrapped {
                Some(inner) => inner.render(path),
                None => format!("<native function {}>", n.name),
            },
            Value::Class(c) => format!("<class {}>", c.name),
            Value::Instance(i) => format!("<{} instance>", i.class.name),
            Value::BoundMethod(m) => format!("<bound method {}>", m.method.callable_name()),
            Value::Module(m) => format!("<module {}>", m.name),
            Value::Generator(g) => format!("<generator {}>", g.borrow().name),
            Value::Coroutine(c) => format!("<coroutine {}>", c.borrow().name),
            Value::Error(e) => {
                if e.message.is_empty() {
                    e.kind.clone()
                } else {
                    format!("{}: {}", e.kind, e.message)
                }
            }
            Value::Iterator(_) => "<iterator>".to_string(),
        }
    }

    /// Plain-data form handed to log handlers
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_at(&mut RenderPath::default())
    }

    fn to_json_at(&self, path: &mut RenderPath) -> serde_json::Value {
        use serde_json::Value as Json;
        if path.0.len() > RENDER_DEPTH {
            return Json::String("...".to_string());
        }
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.to_string()),
            Value::List(items) => {
                if !path.enter(Rc::as_ptr(items)) {
                    return Json::String("[...]".to_string());
                }
                let array = items.borrow().iter().map(|v| v.to_json_at(path)).collect();
                path.leave();
                Json::Array(array)
            }
            Value::Map(map) => {
                if !path.enter(Rc::as_ptr(map)) {
                    return Json::String("{...}".to_string());
                }
                let object = map
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json_at(path)))
                    .collect();
                path.leave();
                Json::Object(object)
            }
            Value::Error(e) => serde_json::json!({ "kind": e.kind, "message": e.message }),
            other => Json::String(other.render(path)),
        }
    }
}

pub(crate) fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(3).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(!Value::list(vec![]).is_truthy());
        assert!(Value::list(vec![Value::Null]).is_truthy());
    }

    #[test]
    fn test_equality_across_numbers() {
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
        assert!(!Value::Int(2).equals(&Value::str("2")));
        assert!(Value::list(vec![1.into(), "a".into()])
            .equals(&Value::list(vec![1.into(), "a".into()])));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::str("hi").to_display_string(), "hi");
        assert_eq!(Value::str("hi").repr(), "\"hi\"");
        assert_eq!(Value::Float(2.0).to_display_string(), "2.0");
        assert_eq!(Value::Float(2.5).to_display_string(), "2.5");
        assert_eq!(
            Value::list(vec![1.into(), "a".into(), Value::Null]).to_display_string(),
            "[1, \"a\", null]"
        );
        assert_eq!(Value::error("ValueError", "bad").to_display_string(), "ValueError: bad");
    }

    #[test]
    fn test_to_json() {
        let mut map = MapObj::new();
        map.insert(Rc::from("b"), Value::Int(1));
        map.insert(Rc::from("a"), Value::list(vec![Value::Bool(true)]));
        let value = Value::Map(Rc::new(RefCell::new(map)));
        assert_eq!(value.to_json(), json!({"b": 1, "a": [true]}));
        assert_eq!(Value::Float(f64::NAN).to_json(), json!(null));
        assert_eq!(
            Value::error("KeyError", "k").to_json(),
            json!({"kind": "KeyError", "message": "k"})
        );
    }

    #[test]
    fn test_self_referential_list_renders() {
        let list = Rc::new(RefCell::new(Vec::new()));
        list.borrow_mut().push(Value::List(list.clone()));
        list.borrow_mut().push(Value::List(list.clone()));
        let value = Value::List(list.clone());
        assert_eq!(value.to_display_string(), "[[...], [...]]");
        assert_eq!(value.to_json(), json!(["[...]", "[...]"]));
        list.borrow_mut().clear();
    }

    #[test]
    fn test_shared_list_is_not_a_cycle() {
        let inner = Value::list(vec![Value::Int(1)]);
        let outer = Value::list(vec![inner.clone(), inner]);
        assert_eq!(outer.to_display_string(), "[[1], [1]]");
        assert_eq!(outer.to_json(), json!([[1], [1]]));
    }

    #[test]
    fn test_self_referential_map_renders() {
        let map = Rc::new(RefCell::new(MapObj::new()));
        map.borrow_mut().insert(Rc::from("me"), Value::Map(map.clone()));
        let value = Value::Map(map.clone());
        assert_eq!(value.to_display_string(), "{\"me\": {...}}");
        assert_eq!(value.to_json(), json!({"me": "{...}"}));
        map.borrow_mut().insert(Rc::from("me"), Value::Null);
    }

    #[test]
    fn test_equality_of_distinct_cycles_gives_up() {
        let a = Rc::new(RefCell::new(Vec::new()));
        a.borrow_mut().push(Value::List(a.clone()));
        let b = Rc::new(RefCell::new(Vec::new()));
        b.borrow_mut().push(Value::List(b.clone()));

        let (left, right) = (Value::List(a.clone()), Value::List(b.clone()));
        assert_eq!(left.try_equals(&right), None);
        assert!(!left.equals(&right));
        assert_eq!(left.try_equals(&left), Some(true));
        a.borrow_mut().clear();
        b.borrow_mut().clear();
    }

    #[test]
    fn test_map_insert_overwrites() {
        let mut map = MapObj::new();
        map.insert(Rc::from("k"), Value::Int(1));
        map.insert(Rc::from("k"), Value::Int(2));
        assert_eq!(map.len(), 1);
        assert!(map.get("k").unwrap().equals(&Value::Int(2)));
    }

    #[test]
    fn test_scope_chain() {
        let outer = Scope::new(None);
        outer.declare("x", Value::Int(1));
        let inner = Scope::new(Some(outer.clone()));
        assert!(inner.get("x").unwrap().equals(&Value::Int(1)));
        assert!(inner.assign("x", Value::Int(2)));
        assert!(outer.get_local("x").unwrap().equals(&Value::Int(2)));
        assert!(!inner.assign("missing", Value::Null));
        assert!(inner.get_local("x").is_none());
    }
}

//! Virtual machine
//!
//! Executes compiled programs. Calls recurse on the Rust stack; the call
//! depth is bounded by [`LimitConfig::max_recursion_depth`]. The VM owns
//! the table of loaded modules, pre-seeded with the `marginalia` runtime
//! module that instrumented code imports.

mod call;
mod execution;
mod index;
mod operators;

pub(crate) use call::bind_arguments;

use super::instrument;
use super::stdlib;
use super::value::{Env, ErrorObj, ModuleObj, Scope, Value};
use super::{Program, Proto};
use marginalia_config::LimitConfig;
use marginalia_log::{Dispatcher, LogEvent};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use thiserror::Error;

/// Name under which the runtime module is registered
pub const RUNTIME_MODULE: &str = "marginalia";

pub type VmResult<T> = Result<T, Thrown>;

/// A script exception in flight
#[derive(Debug, Clone)]
pub struct Thrown {
    pub error: Rc<ErrorObj>,
    /// Line where the exception was raised, filled in by the frame that
    /// raised it
    pub line: Option<usize>,
}

impl Thrown {
    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            error: Rc::new(ErrorObj {
                kind: kind.to_string(),
                message: message.into(),
            }),
            line: None,
        }
    }

    /// Raise an arbitrary value; non-error values are wrapped as `Error`
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Error(error) => Self { error, line: None },
            other => Self::new("Error", other.to_display_string()),
        }
    }

    pub fn kind(&self) -> &str {
        &self.error.kind
    }

    pub fn message(&self) -> &str {
        &self.error.message
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn into_runtime_error(self) -> RuntimeError {
        RuntimeError {
            kind: self.error.kind.clone(),
            message: self.error.message.clone(),
            line: self.line,
        }
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error.kind, self.error.message)
    }
}

/// A script exception that escaped to Rust
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: String,
    pub message: String,
    pub line: Option<usize>,
}

impl From<Thrown> for RuntimeError {
    fn from(thrown: Thrown) -> Self {
        thrown.into_runtime_error()
    }
}

/// Resolves modules the VM has not loaded yet
///
/// Implementations compile and execute the module (through
/// [`VM::execute_module`]) and return the module value.
pub trait ImportHost {
    fn import(&self, vm: &mut VM, name: &str) -> VmResult<Value>;
}

/// Exception handler registered by `SetupTry`
#[derive(Debug, Clone, Copy)]
pub(crate) struct TryHandler {
    pub(crate) target: usize,
    pub(crate) stack_len: usize,
}

/// Activation record of one function body
pub struct Frame {
    pub(crate) proto: Rc<Proto>,
    pub(crate) ip: usize,
    pub(crate) stack: Vec<Value>,
    pub(crate) env: Env,
    pub(crate) handlers: Vec<TryHandler>,
}

impl Frame {
    pub fn new(proto: Rc<Proto>, env: Env) -> Self {
        Self {
            proto,
            ip: 0,
            stack: Vec::new(),
            env,
            handlers: Vec::new(),
        }
    }
}

pub struct VM {
    modules: HashMap<String, Value>,
    builtins: HashMap<String, Value>,
    dispatcher: Arc<Dispatcher>,
    limits: LimitConfig,
    depth: usize,
    host: Option<Rc<dyn ImportHost>>,
    /// Captured `print` output; `None` writes to stdout
    output: Option<Vec<String>>,
}

impl VM {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_limits(dispatcher, LimitConfig::default())
    }

    pub fn with_limits(dispatcher: Arc<Dispatcher>, limits: LimitConfig) -> Self {
        let mut modules = HashMap::new();
        modules.insert(RUNTIME_MODULE.to_string(), instrument::runtime_module());
        Self {
            modules,
            builtins: stdlib::builtins(),
            dispatcher,
            limits,
            depth: 0,
            host: None,
            output: None,
        }
    }

    pub fn set_import_host(&mut self, host: Rc<dyn ImportHost>) {
        self.host = Some(host);
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn limits(&self) -> &LimitConfig {
        &self.limits
    }

    /// Collect `print` output instead of writing it to stdout
    pub fn capture_output(&mut self) {
        self.output = Some(Vec::new());
    }

    pub fn take_output(&mut self) -> Vec<String> {
        self.output.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub(crate) fn write_line(&mut self, line: String) {
        match &mut self.output {
            Some(lines) => lines.push(line),
            None => println!("{}", line),
        }
    }

    pub fn module(&self, name: &str) -> Option<Value> {
        self.modules.get(name).cloned()
    }

    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn insert_module(&mut self, name: &str, module: Value) {
        self.modules.insert(name.to_string(), module);
    }

    pub fn remove_module(&mut self, name: &str) -> Option<Value> {
        self.modules.remove(name)
    }

    /// Names of loaded modules, sorted
    pub fn module_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a program's top level in a fresh namespace registered under the
    /// program's module name.
    ///
    /// The module is visible in the table while it runs (so circular
    /// imports see it) and removed again if execution fails.
    pub fn execute_module(&mut self, program: &Program) -> VmResult<Value> {
        let name = program.module.clone();
        let scope = Scope::new(None);
        scope.declare("__name__", Value::str(&name));
        let module = Value::Module(Rc::new(ModuleObj {
            name: name.clone(),
            scope: scope.clone(),
        }));
        self.modules.insert(name.clone(), module.clone());
        tracing::debug!(target: "marginalia::vm", module = %name, "executing module");

        let frame = Frame::new(program.main.clone(), scope);
        match self.run_to_completion(frame) {
            Ok(_) => Ok(module),
            Err(thrown) => {
                self.modules.remove(&name);
                tracing::debug!(
                    target: "marginalia::vm",
                    module = %name,
                    error = %thrown,
                    "module execution failed"
                );
                Err(thrown)
            }
        }
    }

    /// Return a loaded module, asking the import host for new ones
    pub fn import_module(&mut self, name: &str) -> VmResult<Value> {
        if let Some(module) = self.modules.get(name) {
            return Ok(module.clone());
        }
        match self.host.clone() {
            Some(host) => host.import(self, name),
            None => Err(Thrown::new(
                "ImportError",
                format!("No module named '{}'", name),
            )),
        }
    }

    /// Look up a top-level binding of a loaded module
    pub fn get_global(&self, module: &str, name: &str) -> Option<Value> {
        match self.modules.get(module) {
            Some(Value::Module(m)) => m.scope.get_local(name),
            _ => None,
        }
    }

    /// Call a script value from Rust
    pub fn call(&mut self, callee: Value, args: Vec<Value>) -> VmResult<Value> {
        self.call_value(callee, args, Vec::new())
    }

    pub(crate) fn builtin(&self, name: &str) -> Option<Value> {
        self.builtins.get(name).cloned()
    }

    /// Broadcast a lifecycle event; a handler error becomes a `HandlerError`
    /// exception in the emitting code
    pub(crate) fn emit_event(&self, event: &LogEvent) -> VmResult<()> {
        self.dispatcher
            .emit(event)
            .map_err(|e| Thrown::new("HandlerError", e.message))
    }

    fn enter(&mut self) -> VmResult<()> {
        if self.depth >= self.limits.max_recursion_depth {
            return Err(Thrown::new(
                "RecursionError",
                "maximum recursion depth exceeded",
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

//! Test helpers
//!
//! Run a commentary module end to end: transform, compile, execute, and
//! record every event the dispatcher sees.

#![allow(dead_code)]

use marginalia_core::{compile_source, transform, LimitConfig, RuntimeError, Value, VM};
use marginalia_log::{Dispatcher, EventState, LogEvent, Recorder, SeverityTable};
use std::sync::Arc;

pub struct Outcome {
    pub events: Vec<LogEvent>,
    pub output: Vec<String>,
    pub result: Result<(), RuntimeError>,
    pub vm: VM,
}

impl Outcome {
    pub fn states(&self) -> Vec<(EventState, String)> {
        self.events
            .iter()
            .map(|e| (e.state, e.context.clone()))
            .collect()
    }

    pub fn global(&self, module: &str, name: &str) -> Option<Value> {
        self.vm.get_global(module, name)
    }
}

/// Transform and run `source` as module `module` with a fresh dispatcher
pub fn run_module(module: &str, source: &str) -> Outcome {
    let dispatcher = Arc::new(Dispatcher::new());
    run_with(dispatcher, module, source)
}

/// Same as [`run_module`] but on a caller-provided dispatcher
pub fn run_with(dispatcher: Arc<Dispatcher>, module: &str, source: &str) -> Outcome {
    run_limited(dispatcher, module, source, LimitConfig::default())
}

/// Run with explicit execution limits
pub fn run_limited(
    dispatcher: Arc<Dispatcher>,
    module: &str,
    source: &str,
    limits: LimitConfig,
) -> Outcome {
    let recorder = Recorder::new();
    dispatcher.register(recorder.handler());

    let severities = dispatcher.severities();
    let transformation = transform(module, source, &severities).expect("transform failed");
    let program = compile_source(module, &transformation.source).expect("compile failed");

    let mut vm = VM::with_limits(dispatcher, limits);
    vm.capture_output();
    let result = vm
        .execute_module(&program)
        .map(|_| ())
        .map_err(RuntimeError::from);
    let output = vm.take_output();
    Outcome {
        events: recorder.events(),
        output,
        result,
        vm,
    }
}

/// Run source that was never transformed
pub fn run_plain(module: &str, source: &str) -> Outcome {
    let dispatcher = Arc::new(Dispatcher::new());
    let recorder = Recorder::new();
    dispatcher.register(recorder.handler());
    let program = compile_source(module, source).expect("compile failed");
    let mut vm = VM::new(dispatcher);
    vm.capture_output();
    let result = vm
        .execute_module(&program)
        .map(|_| ())
        .map_err(RuntimeError::from);
    let output = vm.take_output();
    Outcome {
        events: recorder.events(),
        output,
        result,
        vm,
    }
}

pub fn default_table() -> SeverityTable {
    SeverityTable::default()
}

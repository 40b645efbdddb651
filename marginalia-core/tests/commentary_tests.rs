//! End-to-end commentary tests
//!
//! Marker comments in source become events at run time.

mod common;

use common::{default_table, run_limited, run_module, run_plain, run_with};
use marginalia_core::LimitConfig;
use marginalia_core::transform;
use marginalia_log::{Dispatcher, EventState, Handler, HandlerError, Payload};
use serde_json::json;
use std::sync::Arc;

const GREET: &str = r#"fn greet(name) {
    //: hello {name}
    return f"hi {name}";
}
var result = greet("Ada");
"#;

#[test]
fn test_greet_scenario() {
    let outcome = run_module("m", GREET);
    outcome.result.as_ref().unwrap();

    assert_eq!(
        outcome.states(),
        vec![
            (EventState::Started, "m:greet".to_string()),
            (EventState::Working, "m:greet".to_string()),
            (EventState::Success, "m:greet".to_string()),
        ]
    );
    let events = &outcome.events;
    assert_eq!(
        events[0].payload,
        Payload::Arguments(json!({"name": "Ada"}).as_object().unwrap().clone())
    );
    assert_eq!(events[1].message(), Some("hello Ada"));
    assert_eq!(events[1].severity.as_ref().unwrap().name, "INFO");
    assert_eq!(events[2].payload, Payload::Value(json!("hi Ada")));
    assert_eq!(
        outcome.global("m", "result").unwrap().to_display_string(),
        "hi Ada"
    );
}

#[test]
fn test_failure_propagates_unchanged() {
    let source = r#"fn divide(a, b) {
    //! dividing {a} by {b}
    return a / b;
}
divide(1, 0);
"#;
    let outcome = run_module("calc", source);
    let err = outcome.result.as_ref().unwrap_err();
    assert_eq!(err.kind, "ZeroDivisionError");
    assert_eq!(err.message, "division by zero");
    assert_eq!(err.line, Some(3));

    let states: Vec<EventState> = outcome.events.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![EventState::Started, EventState::Working, EventState::Failure]
    );
    match &outcome.events[2].payload {
        Payload::Failure(error) => {
            assert_eq!(error.kind, "ZeroDivisionError");
            assert_eq!(error.message, "division by zero");
        }
        other => panic!("unexpected payload {:?}", other),
    }
    // a failed module is never left in the module table
    assert!(!outcome.vm.has_module("calc"));
}

#[test]
fn test_caught_failure_still_reported() {
    let source = r#"fn risky() {
    //? about to fail
    raise error("KeyError", "missing");
}
try {
    risky();
} catch e {
    print(e.kind);
}
"#;
    let outcome = run_module("m", source);
    outcome.result.as_ref().unwrap();
    assert_eq!(outcome.output, vec!["KeyError"]);
    assert_eq!(outcome.events.last().unwrap().state, EventState::Failure);
}

#[test]
fn test_top_level_marker_is_inert() {
    let source = "//: module level\nvar x = 1;\n";
    let outcome = run_module("m", source);
    outcome.result.as_ref().unwrap();
    assert!(outcome.events.is_empty());
}

#[test]
fn test_zero_markers_behave_identically() {
    let source = r#"fn fib(n) {
    // plain comment, not a marker
    if n < 2 {
        return n;
    }
    return fib(n - 1) + fib(n - 2);
}
print(fib(10));
"#;
    let transformed = run_module("m", source);
    let plain = run_plain("m", source);
    assert_eq!(transformed.output, plain.output);
    assert_eq!(transformed.output, vec!["55"]);
    assert!(transformed.events.is_empty());
}

#[test]
fn test_return_value_preserved() {
    let source = r#"fn pair(a, b = 3) {
    //: building
    return [a, b];
}
print(pair(1), pair(1, b = 2));
"#;
    let outcome = run_module("m", source);
    outcome.result.as_ref().unwrap();
    assert_eq!(outcome.output, vec!["[1, 3] [1, 2]"]);
    // the defaulted parameter is omitted from `started`
    assert_eq!(
        outcome.events[0].payload,
        Payload::Arguments(json!({"a": 1}).as_object().unwrap().clone())
    );
}

#[test]
fn test_markers_emit_in_source_order() {
    let source = r#"fn steps() {
    //? one
    var x = 1;
    //: two
    x = x + 1;
    //! three {x}
    return x;
}
steps();
"#;
    let outcome = run_module("m", source);
    outcome.result.as_ref().unwrap();
    let messages: Vec<&str> = outcome.events.iter().filter_map(|e| e.message()).collect();
    assert_eq!(messages, vec!["one", "two", "three 2"]);
}

#[test]
fn test_nested_context_paths() {
    let source = r#"class Greeter {
    //: class body runs
    fn hello(self) {
        fn inner() {
            //: inner work
            return 1;
        }
        return inner();
    }
}
Greeter().hello();
"#;
    let outcome = run_module("pkg.mod", source);
    outcome.result.as_ref().unwrap();
    let contexts: Vec<(EventState, String)> = outcome.states();
    assert_eq!(
        contexts,
        vec![
            (EventState::Working, "pkg.mod:Greeter".to_string()),
            (EventState::Started, "pkg.mod:Greeter.hello.inner".to_string()),
            (EventState::Working, "pkg.mod:Greeter.hello.inner".to_string()),
            (EventState::Success, "pkg.mod:Greeter.hello.inner".to_string()),
        ]
    );
}

#[test]
fn test_generator_lifecycle() {
    let source = r#"fn count(n) {
    var i = 0;
    while i < n {
        //? yielding {i}
        yield i;
        i = i + 1;
    }
    return "done";
}
var g = count(2);
print("created");
print(list(g));
"#;
    let outcome = run_module("m", source);
    outcome.result.as_ref().unwrap();
    assert_eq!(outcome.output, vec!["created", "[0, 1]"]);
    let states: Vec<EventState> = outcome.events.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![
            EventState::Started,
            EventState::Working,
            EventState::Working,
            EventState::Success,
        ]
    );
    assert_eq!(outcome.events[3].payload, Payload::Value(json!("done")));
}

#[test]
fn test_generator_not_started_until_resumed() {
    let source = r#"fn gen() {
    //: inside
    yield 1;
}
var g = gen();
"#;
    let outcome = run_module("m", source);
    outcome.result.as_ref().unwrap();
    assert!(outcome.events.is_empty());
}

#[test]
fn test_async_started_on_await() {
    let source = r#"async fn fetch(x) {
    //: fetching {x}
    return x * 2;
}
var pending = fetch(21);
print("not yet");
print(run(pending));
"#;
    let outcome = run_module("m", source);
    outcome.result.as_ref().unwrap();
    assert_eq!(outcome.output, vec!["not yet", "42"]);
    assert_eq!(
        outcome.states(),
        vec![
            (EventState::Started, "m:fetch".to_string()),
            (EventState::Working, "m:fetch".to_string()),
            (EventState::Success, "m:fetch".to_string()),
        ]
    );
}

#[test]
fn test_handler_registered_twice_sees_event_once() {
    let dispatcher = Arc::new(Dispatcher::new());
    let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = {
        let count = count.clone();
        Handler::new(move |_| {
            count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        })
    };
    dispatcher.register(counter.clone());
    dispatcher.register(counter);

    let outcome = run_with(dispatcher, "m", "fn f() {\n    //: once\n    pass;\n}\nf();\n");
    outcome.result.as_ref().unwrap();
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[test]
fn test_handler_error_reaches_caller() {
    let dispatcher = Arc::new(Dispatcher::new());
    dispatcher.register(Handler::new(|event| {
        if event.state == EventState::Working {
            Err(HandlerError::new("rejected"))
        } else {
            Ok(())
        }
    }));
    let outcome = run_with(dispatcher, "m", "fn f() {\n    //: boom\n    return 1;\n}\nf();\n");
    let err = outcome.result.as_ref().unwrap_err();
    assert_eq!(err.kind, "HandlerError");
    assert_eq!(err.message, "rejected");
    assert_eq!(err.line, Some(2));
}

#[test]
fn test_unregistered_symbol_stays_a_comment() {
    let source = "fn f() {\n    //~ not a marker\n    //: marker\n    return 1;\n}\nf();\n";
    let table = default_table();
    let transformation = transform("m", source, &table).unwrap();
    assert_eq!(transformation.markers.len(), 1);
    let outcome = run_module("m", source);
    let messages: Vec<&str> = outcome.events.iter().filter_map(|e| e.message()).collect();
    assert_eq!(messages, vec!["marker"]);
}

#[test]
fn test_recursion_limit_with_instrumentation() {
    let source = "fn down(n) {\n    //? level {n}\n    return down(n + 1);\n}\ndown(0);\n";
    let limits = LimitConfig {
        max_recursion_depth: 30,
        ..LimitConfig::default()
    };
    let outcome = run_limited(Arc::new(Dispatcher::new()), "m", source, limits);
    let err = outcome.result.as_ref().unwrap_err();
    assert_eq!(err.kind, "RecursionError");
    assert_eq!(outcome.events.last().unwrap().state, EventState::Failure);
}

#[test]
fn test_instrumented_call_with_self_referential_list() {
    let source = "fn f(x) {\n    //: got\n    return 1;\n}\nvar a = [0, 0];\na[0] = a;\na[1] = a;\nf(a);\n";
    let outcome = run_module("m", source);
    outcome.result.as_ref().unwrap();

    let events = &outcome.events;
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0].payload,
        Payload::Arguments(json!({"x": ["[...]", "[...]"]}).as_object().unwrap().clone())
    );
    assert_eq!(events[1].message(), Some("got"));
    assert_eq!(events[2].payload, Payload::Value(json!(1)));
}

#[test]
fn test_comparing_cyclic_lists_raises_recursion_error() {
    let source = "var a = [0];\na[0] = a;\nvar b = [0];\nb[0] = b;\nprint(a == b);\n";
    let outcome = run_plain("m", source);
    let err = outcome.result.as_ref().unwrap_err();
    assert_eq!(err.kind, "RecursionError");
    assert_eq!(err.line, Some(5));
    assert!(outcome.output.is_empty());
}

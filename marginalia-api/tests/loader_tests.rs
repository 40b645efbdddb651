//! Compile-and-cache loader tests on a real directory

mod common;

use common::{Project, GREET};
use marginalia_api::{compile_module, expand, run, LoadError};
use marginalia_log::EventState;

#[test]
fn test_run_emits_events_and_writes_artifact() {
    let project = Project::new();
    project.write("app.mg", GREET);

    let output = run("app", &project.config()).unwrap();
    assert!(output.modules_loaded.contains(&"app".to_string()));
    assert_eq!(
        project.states(),
        vec![
            (EventState::Started, "app:greet".to_string()),
            (EventState::Working, "app:greet".to_string()),
            (EventState::Success, "app:greet".to_string()),
        ]
    );

    let artifacts = project.artifacts("");
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts[0].starts_with("app.marginalia-"));
}

#[test]
fn test_cached_program_still_emits() {
    let project = Project::new();
    project.write("app.mg", GREET);
    let config = project.config();

    run("app", &config).unwrap();
    let compiled = compile_module("app", &config).unwrap();
    assert!(compiled.from_cache);

    project.recorder.clear();
    run("app", &config).unwrap();
    assert_eq!(project.states().len(), 3);
}

#[test]
fn test_comment_edit_invalidates() {
    let project = Project::new();
    project.write("app.mg", GREET);
    let config = project.config();
    assert!(!compile_module("app", &config).unwrap().from_cache);
    assert!(compile_module("app", &config).unwrap().from_cache);

    project.write("app.mg", &format!("// unrelated note\n{}", GREET));
    assert!(!compile_module("app", &config).unwrap().from_cache);
    assert!(compile_module("app", &config).unwrap().from_cache);
}

#[test]
fn test_severity_change_invalidates() {
    let project = Project::new();
    project.write("app.mg", GREET);
    let config = project.config();
    compile_module("app", &config).unwrap();

    project.dispatcher.define_severity("~", 5, "TRACE").unwrap();
    assert!(!compile_module("app", &config).unwrap().from_cache);
}

#[test]
fn test_cache_disabled_writes_nothing() {
    let project = Project::new();
    project.write("app.mg", GREET);
    let mut config = project.config();
    config.loader.use_cache = false;

    run("app", &config).unwrap();
    let compiled = compile_module("app", &config).unwrap();
    assert!(!compiled.from_cache);
    assert!(compiled.artifact.is_none());
    assert!(project.artifacts("").is_empty());
}

#[test]
fn test_package_artifacts_live_beside_sources() {
    let project = Project::new();
    project.write("pkg/mod.mg", "var tag = \"pkg\";\n");
    project.write("pkg/util.mg", "fn twice(x) {\n    //? doubling {x}\n    return x * 2;\n}\n");

    compile_module("pkg.util", &project.config()).unwrap();
    let artifacts = project.artifacts("pkg");
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts[0].starts_with("pkg.util."));
}

#[test]
fn test_transform_error_names_module_and_line() {
    let project = Project::new();
    project.write("bad.mg", "var ok = 1;\nfn (\n");
    let err = run("bad", &project.config()).unwrap_err();
    match &err {
        LoadError::Transform(e) => {
            assert_eq!(e.module, "bad");
            assert_eq!(e.line, Some(2));
        }
        other => panic!("expected a transform error, got {other:?}"),
    }
    assert_eq!(err.to_report().phase, "transform");
    assert!(project.artifacts("").is_empty());
}

#[test]
fn test_expand_is_line_aligned() {
    let project = Project::new();
    let path = project.write("app.mg", GREET);
    let output = expand(&path, "app", &project.config()).unwrap();
    let source = &output.transformation.source;

    assert_eq!(source.lines().count(), GREET.lines().count());
    assert_eq!(output.transformation.markers.len(), 1);
    assert_eq!(output.transformation.instrumented, vec!["app:greet".to_string()]);
    assert!(source.contains(&output.transformation.alias));
}

#[test]
fn test_missing_entry_module() {
    let project = Project::new();
    let err = run("nowhere", &project.config()).unwrap_err();
    match err {
        LoadError::NotFound { name, searched } => {
            assert_eq!(name, "nowhere");
            assert_eq!(searched, vec![project.root().to_path_buf()]);
        }
        other => panic!("expected not found, got {other:?}"),
    }
}

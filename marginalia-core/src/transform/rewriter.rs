//! Lexical-context rewriter
//!
//! Walks the placeholder program with a stack of enclosing definitions and
//! turns each placeholder into an `emit` call attributed to its enclosing
//! context. The first marker that lands directly in a function also wraps
//! that function with the instrumentation decorator matching its kind.
//!
//! Every edit stays on the line it replaces, so line numbers in the
//! augmented program are the line numbers of the original source.

use super::scanner::{placeholder_index, scan, split_ending, CommentMarker};
use super::{TransformError, Transformation};
use crate::compiler::parser::{parse, ExprKind, Stmt, StmtKind};
use crate::kit::lexer::Coordinate;
use marginalia_log::SeverityTable;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Function,
    Class,
}

/// An enclosing definition during the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFrame {
    pub segment: String,
    pub kind: FrameKind,
    pub is_generator: bool,
    pub is_async: bool,
    pub already_instrumented: bool,
}

impl ContextFrame {
    /// Name of the runtime decorator that instruments this function
    fn decorator(&self) -> &'static str {
        if self.is_async {
            "logged_async"
        } else if self.is_generator {
            "logged_generator"
        } else {
            "logged"
        }
    }
}

pub struct Rewriter<'a> {
    module: &'a str,
    severities: &'a SeverityTable,
    token: String,
}

#[derive(Default)]
struct Edits {
    /// line index -> new statement (indent is kept); empty blanks the line
    replacements: HashMap<usize, String>,
    /// (line index, char column, text)
    inserts: Vec<(usize, usize, String)>,
    instrumented: Vec<String>,
}

impl<'a> Rewriter<'a> {
    /// A rewriter with a fresh random marker token
    pub fn new(module: &'a str, severities: &'a SeverityTable) -> Self {
        Self::with_token(module, severities, uuid::Uuid::new_v4().simple().to_string())
    }

    /// A rewriter with a fixed marker token (deterministic output)
    pub fn with_token(module: &'a str, severities: &'a SeverityTable, token: impl Into<String>) -> Self {
        Self {
            module,
            severities,
            token: token.into(),
        }
    }

    /// Module alias bound by the injected import
    pub fn alias(&self) -> String {
        format!("_mg_{}", self.token)
    }

    pub fn rewrite(&self, source: &str) -> Result<Transformation, TransformError> {
        let scanned = scan(source, self.severities, &self.token);
        let mut markers = scanned.markers;

        let module = parse(&scanned.text).map_err(|err| TransformError {
            module: self.module.to_string(),
            line: err.line(),
            message: err.message(),
        })?;

        let mut edits = Edits::default();
        let mut frames = Vec::new();
        self.walk(&module.statements, &mut frames, &mut markers, &mut edits);

        // a placeholder outside statement position cannot parse, so every
        // marker has been visited; blank any that were not, to be safe
        for marker in &markers {
            edits
                .replacements
                .entry(marker.line_index)
                .or_insert_with(String::new);
        }

        let text = self.apply(&scanned.text, &edits);
        tracing::debug!(
            target: "marginalia::rewriter",
            module = self.module,
            markers = markers.len(),
            instrumented = edits.instrumented.len(),
            "rewrite complete"
        );

        Ok(Transformation {
            source: text,
            markers,
            instrumented: edits.instrumented,
            alias: self.alias(),
        })
    }

    fn walk(
        &self,
        statements: &[Stmt],
        frames: &mut Vec<ContextFrame>,
        markers: &mut [CommentMarker],
        edits: &mut Edits,
    ) {
        for stmt in statements {
            match &stmt.kind {
                StmtKind::Expr(expr) => {
                    if let ExprKind::VarRef(name) = &expr.kind {
                        if let Some(index) = placeholder_index(&self.token, name) {
                            if let Some(marker) = markers.get_mut(index) {
                                self.place_marker(marker, frames, edits);
                            }
                        }
                    }
                }
                StmtKind::Function(def) => {
                    frames.push(ContextFrame {
                        segment: def.name.clone(),
                        kind: FrameKind::Function,
                        is_generator: def.is_generator,
                        is_async: def.is_async,
                        already_instrumented: false,
                    });
                    let context = self.context_path(frames);
                    self.walk(&def.body, frames, markers, edits);
                    if let Some(frame) = frames.pop() {
                        if frame.already_instrumented {
                            self.instrument(&frame, &context, def.keyword, edits);
                        }
                    }
                }
                StmtKind::Class(def) => {
                    frames.push(ContextFrame {
                        segment: def.name.clone(),
                        kind: FrameKind::Class,
                        is_generator: false,
                        is_async: false,
                        already_instrumented: false,
                    });
                    self.walk(&def.body, frames, markers, edits);
                    frames.pop();
                }
                StmtKind::If {
                    branches,
                    else_body,
                } => {
                    for (_, body) in branches {
                        self.walk(body, frames, markers, edits);
                    }
                    if let Some(body) = else_body {
                        self.walk(body, frames, markers, edits);
                    }
                }
                StmtKind::While { body, .. } | StmtKind::For { body, .. } => {
                    self.walk(body, frames, markers, edits);
                }
                StmtKind::Try { body, handler, .. } => {
                    self.walk(body, frames, markers, edits);
                    self.walk(handler, frames, markers, edits);
                }
                _ => {}
            }
        }
    }

    fn context_path(&self, frames: &[ContextFrame]) -> String {
        let path: Vec<&str> = frames.iter().map(|f| f.segment.as_str()).collect();
        format!("{}:{}", self.module, path.join("."))
    }

    fn place_marker(
        &self,
        marker: &mut CommentMarker,
        frames: &mut [ContextFrame],
        edits: &mut Edits,
    ) {
        if frames.is_empty() {
            // module-level commentary is inert
            edits.replacements.insert(marker.line_index, String::new());
            return;
        }

        let context = self.context_path(frames);
        let call = format!(
            "{}.emit(\"working\", \"{}\", f\"{}\", \"{}\");",
            self.alias(),
            escape(&context),
            escape(&marker.raw_message),
            escape(&marker.symbol),
        );
        edits.replacements.insert(marker.line_index, call);
        marker.enclosing_context_path = Some(context);

        if let Some(frame) = frames.last_mut() {
            if frame.kind == FrameKind::Function {
                frame.already_instrumented = true;
            }
        }
    }

    fn instrument(&self, frame: &ContextFrame, context: &str, keyword: Coordinate, edits: &mut Edits) {
        let text = format!(
            "@{}.{}(\"{}\") ",
            self.alias(),
            frame.decorator(),
            escape(context)
        );
        edits
            .inserts
            .push((keyword.line - 1, keyword.column - 1, text));
        edits.instrumented.push(context.to_string());
    }

    fn apply(&self, text: &str, edits: &Edits) -> String {
        let mut inserts_by_line: HashMap<usize, Vec<(usize, &str)>> = HashMap::new();
        for (line, column, insert) in &edits.inserts {
            inserts_by_line
                .entry(*line)
                .or_default()
                .push((*column, insert.as_str()));
        }

        let prefix = format!("import marginalia as {}; ", self.alias());
        let mut out = String::with_capacity(text.len() + prefix.len());
        out.push_str(&prefix);

        for (index, line) in text.split_inclusive('\n').enumerate() {
            let (body, ending) = split_ending(line);
            let mut body = match edits.replacements.get(&index) {
                Some(replacement) if replacement.is_empty() => String::new(),
                Some(replacement) => {
                    let indent = &body[..body.len() - body.trim_start().len()];
                    format!("{indent}{replacement}")
                }
                None => body.to_string(),
            };
            if let Some(inserts) = inserts_by_line.get_mut(&index) {
                // right to left so earlier columns stay valid
                inserts.sort_by(|a, b| b.0.cmp(&a.0));
                for (column, insert) in inserts.iter() {
                    let offset = body
                        .char_indices()
                        .nth(*column)
                        .map(|(offset, _)| offset)
                        .unwrap_or(body.len());
                    body.insert_str(offset, insert);
                }
            }
            out.push_str(&body);
            out.push_str(ending);
        }
        out
    }
}

/// Escape text for use inside a double-quoted literal
fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite(source: &str) -> Transformation {
        Rewriter::with_token("app", &SeverityTable::default(), "T")
            .rewrite(source)
            .unwrap()
    }

    #[test]
    fn test_zero_markers_only_adds_import() {
        let source = "fn f(x) {\n    // ordinary comment\n    return x;\n}\n";
        let out = rewrite(source);
        assert_eq!(out.source, format!("import marginalia as _mg_T; {}", source));
        assert!(out.markers.is_empty());
        assert!(out.instrumented.is_empty());
    }

    #[test]
    fn test_plain_function_marker() {
        let out = rewrite("fn greet(name) {\n    //: hello {name}\n    return name;\n}\n");
        assert_eq!(
            out.source,
            "import marginalia as _mg_T; @_mg_T.logged(\"app:greet\") fn greet(name) {\n    \
             _mg_T.emit(\"working\", \"app:greet\", f\"hello {name}\", \":\");\n    \
             return name;\n}\n"
        );
        assert_eq!(out.instrumented, vec!["app:greet"]);
        assert_eq!(
            out.markers[0].enclosing_context_path.as_deref(),
            Some("app:greet")
        );
    }

    #[test]
    fn test_top_level_marker_is_blanked() {
        let out = rewrite("var x = 1;\n//: module level\nvar y = 2;\n");
        assert_eq!(out.source, "import marginalia as _mg_T; var x = 1;\n\nvar y = 2;\n");
        assert_eq!(out.markers[0].enclosing_context_path, None);
    }

    #[test]
    fn test_tab_indent_kept() {
        let out = rewrite("fn f() {\n\t//: tabbed\n}\n");
        assert!(out.source.contains("\n\t_mg_T.emit("));
    }

    #[test]
    fn test_line_count_preserved() {
        let source = "//: a\nfn f() {\n  //? b\n  //! c\n  pass;\n}\n";
        let out = rewrite(source);
        assert_eq!(out.source.lines().count(), source.lines().count());
    }

    #[test]
    fn test_instrumented_once_per_function() {
        let out = rewrite("fn f() {\n  //? one\n  //: two\n}\n");
        assert_eq!(out.instrumented.len(), 1);
        assert_eq!(out.source.matches("logged(").count(), 1);
    }

    #[test]
    fn test_nested_functions_get_independent_paths() {
        let out = rewrite(
            "fn outer() {\n  fn inner() {\n    //: in\n  }\n  //: out\n  return inner;\n}\n",
        );
        assert_eq!(
            out.markers[0].enclosing_context_path.as_deref(),
            Some("app:outer.inner")
        );
        assert_eq!(
            out.markers[1].enclosing_context_path.as_deref(),
            Some("app:outer")
        );
        assert_eq!(out.instrumented.len(), 2);
        assert!(out.source.contains("@_mg_T.logged(\"app:outer.inner\") fn inner()"));
        assert!(out.source.contains("@_mg_T.logged(\"app:outer\") fn outer()"));
    }

    #[test]
    fn test_class_is_never_wrapped() {
        let out = rewrite(
            "class Greeter {\n  //: building class\n  fn greet(self) {\n    //: greeting\n  }\n}\n",
        );
        assert_eq!(
            out.markers[0].enclosing_context_path.as_deref(),
            Some("app:Greeter")
        );
        assert_eq!(
            out.markers[1].enclosing_context_path.as_deref(),
            Some("app:Greeter.greet")
        );
        assert_eq!(out.instrumented, vec!["app:Greeter.greet"]);
        assert!(!out.source.contains("logged(\"app:Greeter\")"));
    }

    #[test]
    fn test_generator_and_async_decorators() {
        let out = rewrite(
            "fn gen() {\n  //: producing\n  yield 1;\n}\nasync fn fetch() {\n  //: fetching\n  return 1;\n}\n",
        );
        assert!(out.source.contains("@_mg_T.logged_generator(\"app:gen\") fn gen()"));
        assert!(out.source.contains("@_mg_T.logged_async(\"app:fetch\") async fn fetch()"));
    }

    #[test]
    fn test_decorator_is_innermost() {
        let out = rewrite("@memo\nfn f() {\n  //: hi\n}\n");
        assert!(out.source.contains("@memo\n@_mg_T.logged(\"app:f\") fn f()"));
    }

    #[test]
    fn test_markers_in_control_flow() {
        let out = rewrite(
            "fn f(xs) {\n  for x in xs {\n    if x {\n      //: item {x}\n    }\n  }\n  try {\n    pass;\n  } catch e {\n    //!! failed {e}\n  }\n}\n",
        );
        assert_eq!(out.markers.len(), 2);
        assert!(out
            .markers
            .iter()
            .all(|m| m.enclosing_context_path.as_deref() == Some("app:f")));
        assert!(out.source.contains("f\"failed {e}\", \"!!\");"));
    }

    #[test]
    fn test_message_quotes_escaped() {
        let out = rewrite("fn f() {\n  //: say \"hi\" \\o/\n}\n");
        assert!(out.source.contains(r#"f"say \"hi\" \\o/""#));
        assert!(crate::compiler::parser::parse(&out.source).is_ok());
    }

    #[test]
    fn test_same_line_definitions() {
        let out = rewrite("fn a() { fn b() {\n  //: deep\n} }\n");
        let first_line = out.source.lines().next().unwrap();
        assert_eq!(
            first_line,
            "import marginalia as _mg_T; fn a() { @_mg_T.logged(\"app:a.b\") fn b() {"
        );
    }

    #[test]
    fn test_marker_in_expression_is_transform_error() {
        let err = Rewriter::with_token("app", &SeverityTable::default(), "T")
            .rewrite("var x = f(1,\n  //: nope\n  2);\n")
            .unwrap_err();
        assert_eq!(err.module, "app");
        assert_eq!(err.line, Some(2));
    }

    #[test]
    fn test_output_parses() {
        let out = rewrite(
            "class C {\n  fn m(self, a = 1) {\n    //: m {a}\n    return a;\n  }\n}\n",
        );
        assert!(crate::compiler::parser::parse(&out.source).is_ok());
    }
}

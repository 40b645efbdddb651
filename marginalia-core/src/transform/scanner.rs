//! Line-oriented commentary scanner

use marginalia_log::SeverityTable;

/// A commentary line recognised as a marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentMarker {
    /// 0-based line index in the source
    pub line_index: usize,
    /// Width in bytes of the leading whitespace
    pub indent_width: usize,
    pub symbol: String,
    pub raw_message: String,
    /// `<module>:<dotted path>`; `None` for module-level markers
    pub enclosing_context_path: Option<String>,
}

/// Source with every marker line replaced by a placeholder statement
#[derive(Debug, Clone)]
pub struct Scanned {
    pub text: String,
    pub markers: Vec<CommentMarker>,
}

/// Identifier of the placeholder statement for marker `index`
pub fn placeholder(token: &str, index: usize) -> String {
    format!("__mg_{}_{}", token, index)
}

/// Inverse of [`placeholder`]
pub fn placeholder_index(token: &str, ident: &str) -> Option<usize> {
    ident
        .strip_prefix("__mg_")?
        .strip_prefix(token)?
        .strip_prefix('_')?
        .parse()
        .ok()
}

/// Split a line into its body and its line terminator
pub(crate) fn split_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Recognise a stand-alone marker comment: `<ws>//<symbol> <message>`
fn parse_marker_line(body: &str) -> Option<(usize, &str, &str)> {
    let trimmed = body.trim_start();
    let rest = trimmed.strip_prefix("//")?;
    let (symbol, message) = rest.split_once(' ')?;
    if symbol.is_empty() {
        return None;
    }
    Some((body.len() - trimmed.len(), symbol, message))
}

/// Replace marker lines of `source` by placeholders derived from `token`.
///
/// Indentation and line terminators are kept byte-for-byte, so the result
/// has the same number of lines as the input.
pub fn scan(source: &str, severities: &SeverityTable, token: &str) -> Scanned {
    let mut text = String::with_capacity(source.len());
    let mut markers = Vec::new();

    for (line_index, line) in source.split_inclusive('\n').enumerate() {
        let (body, ending) = split_ending(line);
        match parse_marker_line(body) {
            Some((indent_width, symbol, message)) if severities.contains(symbol) => {
                text.push_str(&body[..indent_width]);
                text.push_str(&placeholder(token, markers.len()));
                text.push(';');
                text.push_str(ending);
                markers.push(CommentMarker {
                    line_index,
                    indent_width,
                    symbol: symbol.to_string(),
                    raw_message: message.trim_end().to_string(),
                    enclosing_context_path: None,
                });
            }
            _ => text.push_str(line),
        }
    }

    tracing::trace!(target: "marginalia::scanner", markers = markers.len(), "scan complete");
    Scanned { text, markers }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> SeverityTable {
        SeverityTable::default()
    }

    #[test]
    fn test_marker_replaced_with_indent_preserved() {
        let source = "fn f() {\n    //: hello {name}\n}\n";
        let scanned = scan(source, &table(), "T");
        assert_eq!(scanned.text, "fn f() {\n    __mg_T_0;\n}\n");
        assert_eq!(
            scanned.markers,
            vec![CommentMarker {
                line_index: 1,
                indent_width: 4,
                symbol: ":".to_string(),
                raw_message: "hello {name}".to_string(),
                enclosing_context_path: None,
            }]
        );
    }

    #[test]
    fn test_tabs_preserved() {
        let scanned = scan("\t\t//! careful\n", &table(), "T");
        assert_eq!(scanned.text, "\t\t__mg_T_0;\n");
        assert_eq!(scanned.markers[0].indent_width, 2);
    }

    #[test]
    fn test_inline_comment_untouched() {
        let source = "var x = 1; //: not a marker\n";
        let scanned = scan(source, &table(), "T");
        assert_eq!(scanned.text, source);
        assert!(scanned.markers.is_empty());
    }

    #[test]
    fn test_unknown_symbol_untouched() {
        let source = "// plain comment\n//% nope\n//:no-space\n";
        let scanned = scan(source, &table(), "T");
        assert_eq!(scanned.text, source);
        assert!(scanned.markers.is_empty());
    }

    #[test]
    fn test_space_after_slashes_is_not_a_marker() {
        let scanned = scan("// : hello\n", &table(), "T");
        assert!(scanned.markers.is_empty());
    }

    #[test]
    fn test_longest_symbol_is_whole_word() {
        let scanned = scan("//!! boom\n//! warn\n", &table(), "T");
        assert_eq!(scanned.markers[0].symbol, "!!");
        assert_eq!(scanned.markers[1].symbol, "!");
        assert_eq!(scanned.text, "__mg_T_0;\n__mg_T_1;\n");
    }

    #[test]
    fn test_crlf_and_missing_final_newline() {
        let scanned = scan("pass;\r\n  //? dbg", &table(), "T");
        assert_eq!(scanned.text, "pass;\r\n  __mg_T_0;");
        assert_eq!(scanned.markers[0].raw_message, "dbg");
    }

    #[test]
    fn test_custom_symbol() {
        let mut table = SeverityTable::empty();
        table.define("todo", 5, "TODO").unwrap();
        let scanned = scan("//todo later\n//: info\n", &table, "T");
        assert_eq!(scanned.markers.len(), 1);
        assert_eq!(scanned.markers[0].symbol, "todo");
    }

    #[test]
    fn test_placeholder_round_trip() {
        let ident = placeholder("abc123", 7);
        assert_eq!(placeholder_index("abc123", &ident), Some(7));
        assert_eq!(placeholder_index("other", &ident), None);
        assert_eq!(placeholder_index("abc123", "user_name"), None);
    }
}

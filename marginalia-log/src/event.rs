//! Log event definition

use crate::severity::SeverityEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state carried by an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventState {
    /// An instrumented function was entered
    Started,
    /// A commentary marker was reached
    Working,
    /// An instrumented function completed normally
    Success,
    /// An instrumented function raised
    Failure,
}

impl EventState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventState::Started => "started",
            EventState::Working => "working",
            EventState::Success => "success",
            EventState::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(EventState::Started),
            "working" => Some(EventState::Working),
            "success" => Some(EventState::Success),
            "failure" => Some(EventState::Failure),
            _ => None,
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured description of a raised error
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescription {
    pub kind: String,
    pub message: String,
}

impl fmt::Display for ErrorDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Event payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Payload {
    /// Formatted commentary text
    Message(String),
    /// Bound call arguments, in parameter order
    Arguments(serde_json::Map<String, serde_json::Value>),
    /// A return value
    Value(serde_json::Value),
    /// The error that escaped an instrumented function
    Failure(ErrorDescription),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Message(m) => f.write_str(m),
            Payload::Arguments(args) => {
                write!(f, "{}", serde_json::Value::Object(args.clone()))
            }
            Payload::Value(v) => write!(f, "{}", v),
            Payload::Failure(e) => write!(f, "{}", e),
        }
    }
}

/// A single log event, consumed synchronously by every handler
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub state: EventState,
    /// `<module>:<dotted path of enclosing definitions>`
    pub context: String,
    pub payload: Payload,
    /// Severity of the marker that produced a `working` event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<SeverityEntry>,
}

impl LogEvent {
    pub fn new(state: EventState, context: impl Into<String>, payload: Payload) -> Self {
        Self {
            state,
            context: context.into(),
            payload,
            severity: None,
        }
    }

    pub fn started(
        context: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self::new(EventState::Started, context, Payload::Arguments(arguments))
    }

    pub fn working(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EventState::Working, context, Payload::Message(message.into()))
    }

    pub fn success(context: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(EventState::Success, context, Payload::Value(value))
    }

    pub fn failure(context: impl Into<String>, error: ErrorDescription) -> Self {
        Self::new(EventState::Failure, context, Payload::Failure(error))
    }

    pub fn with_severity(mut self, severity: SeverityEntry) -> Self {
        self.severity = Some(severity);
        self
    }

    /// The message text of a `working` event
    pub fn message(&self) -> Option<&str> {
        match &self.payload {
            Payload::Message(m) => Some(m),
            _ => None,
        }
    }

    /// One-line rendering used by [`crate::PrintHandler`]
    pub fn format(&self) -> String {
        match &self.severity {
            Some(sev) => format!(
                "[{}] {} {}: {}",
                sev.name, self.state, self.context, self.payload
            ),
            None => format!("{} {}: {}", self.state, self.context, self.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_parse() {
        for state in [
            EventState::Started,
            EventState::Working,
            EventState::Success,
            EventState::Failure,
        ] {
            assert_eq!(EventState::parse(state.as_str()), Some(state));
        }
        assert_eq!(EventState::parse("done"), None);
    }

    #[test]
    fn test_format_working_with_severity() {
        let event = LogEvent::working("app:greet", "hello Ada").with_severity(SeverityEntry {
            symbol: ":".to_string(),
            level: 20,
            name: "INFO".to_string(),
        });
        assert_eq!(event.format(), "[INFO] working app:greet: hello Ada");
        assert_eq!(event.message(), Some("hello Ada"));
    }

    #[test]
    fn test_format_started() {
        let mut args = serde_json::Map::new();
        args.insert("name".to_string(), json!("Ada"));
        let event = LogEvent::started("app:greet", args);
        assert_eq!(event.format(), r#"started app:greet: {"name":"Ada"}"#);
        assert_eq!(event.message(), None);
    }

    #[test]
    fn test_failure_display() {
        let err = ErrorDescription {
            kind: "ValueError".to_string(),
            message: "bad".to_string(),
        };
        assert_eq!(LogEvent::failure("m:f", err).format(), "failure m:f: ValueError: bad");
    }

    #[test]
    fn test_serialize_event() {
        let event = LogEvent::success("m:f", json!(3));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["state"], "success");
        assert_eq!(value["payload"]["type"], "value");
        assert_eq!(value["payload"]["data"], 3);
        assert!(value.get("severity").is_none());
    }
}

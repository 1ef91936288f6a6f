//! Parsing of the CLI's line-delimited event stream.
//!
//! Each line is a JSON object with a `type` discriminator. Events are
//! kept as opaque `serde_json::Value`s so the parser tolerates CLI
//! version drift; only the terminal `type == "result"` event has strict
//! fields.

use serde_json::Value;
use std::path::Path;

/// The terminal event that concludes a CLI's streaming output
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEvent {
    /// Final textual output; non-string `result` fields are coerced
    pub result: String,
    pub session_id: String,
    pub is_error: bool,
}

impl ResultEvent {
    fn from_value(value: &Value) -> Self {
        let result = match value.get("result") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let session_id = value
            .get("session_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let is_error = value
            .get("is_error")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            result,
            session_id,
            is_error,
        }
    }
}

/// Ordered event stream plus the terminal event, if one was produced
#[derive(Debug, Default)]
pub struct ParsedStream {
    pub events: Vec<Value>,
    pub terminal: Option<ResultEvent>,
}

impl ParsedStream {
    /// Derive `(output, session_id, success)` for the response
    pub fn derive_response(&self) -> (String, String, bool) {
        match &self.terminal {
            Some(t) => (t.result.clone(), t.session_id.clone(), !t.is_error),
            None => (String::new(), String::new(), false),
        }
    }
}

fn is_terminal(event: &Value) -> bool {
    event.get("type").and_then(Value::as_str) == Some("result")
}

/// Parse the event stream at `path`.
///
/// Missing files, empty files, and unparseable lines never fail:
/// garbled lines are skipped with a warning on stderr and everything
/// else is preserved in order. The terminal event is the *last* event
/// of `type == "result"`.
pub fn parse_events(path: &Path) -> ParsedStream {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return ParsedStream::default(),
    };

    let mut parsed = ParsedStream::default();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(event) => {
                if is_terminal(&event) {
                    parsed.terminal = Some(ResultEvent::from_value(&event));
                }
                parsed.events.push(event);
            }
            Err(e) => {
                eprintln!(
                    "Warning: skipping unparseable event line {} in {}: {}",
                    lineno + 1,
                    path.display(),
                    e
                );
            }
        }
    }
    parsed
}

//! Event-stream line framing and OpenAI-style delta extraction
//!
//! Provider streams look like:
//! ```text
//! data: {"id":"chatcmpl-123","choices":[{"index":0,"delta":{"content":"Hello"}}]}
//!
//! data: [DONE]
//! ```

/// Prefix of a line carrying an event payload
const DATA_PREFIX: &str = "data:";

/// Payload that terminates the stream
const DONE_SENTINEL: &str = "[DONE]";

/// Represents a parsed event-stream line
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// Data line containing the payload
    Data(String),
    /// Terminal [DONE] marker
    Done,
}

/// Parse one complete line. Comments, blank lines and non-data fields yield `None`.
pub fn parse_line(line: &str) -> Option<SseEvent> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let data = line.strip_prefix(DATA_PREFIX)?;
    let data = data.strip_prefix(' ').unwrap_or(data);

    if data.trim() == DONE_SENTINEL {
        Some(SseEvent::Done)
    } else {
        Some(SseEvent::Data(data.to_string()))
    }
}

/// Extract `choices[0].delta.content` from a chunk payload.
///
/// Returns `None` for malformed JSON, role-only or finish deltas, and empty content.
pub fn parse_delta_content(json_str: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json_str).ok()?;
    delta_content(&value)
}

/// Extract `choices[0].delta.content` from an already parsed chunk
pub fn delta_content(value: &serde_json::Value) -> Option<String> {
    value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Splits decoded text into complete lines, holding back a trailing partial
/// line until the rest of it arrives.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    partial: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every line it completed (without the newline)
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.partial.push_str(text);

        let Some(last_newline) = self.partial.rfind('\n') else {
            return Vec::new();
        };

        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);
        complete
            .strip_suffix('\n')
            .unwrap_or(&complete)
            .split('\n')
            .map(str::to_string)
            .collect()
    }

    /// Return the unterminated final line, if any
    pub fn finish(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_line() {
        assert_eq!(
            parse_line(r#"data: {"text":"hello"}"#),
            Some(SseEvent::Data(r#"{"text":"hello"}"#.to_string()))
        );
    }

    #[test]
    fn test_parse_data_line_without_space() {
        assert_eq!(
            parse_line("data:{}"),
            Some(SseEvent::Data("{}".to_string()))
        );
    }

    #[test]
    fn test_parse_done_marker() {
        assert_eq!(parse_line("data: [DONE]"), Some(SseEvent::Done));
        assert_eq!(parse_line("data: [DONE]\r"), Some(SseEvent::Done));
        assert_eq!(parse_line("data:  [DONE]  "), Some(SseEvent::Done));
    }

    #[test]
    fn test_parse_ignores_other_lines() {
        assert_eq!(parse_line(": keep-alive comment"), None);
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line("event: message"), None);
        assert_eq!(parse_line("id: 42"), None);
    }

    #[test]
    fn test_parse_delta_content() {
        let json = r#"{"id":"chatcmpl-123","choices":[{"index":0,"delta":{"content":"test"}}]}"#;
        assert_eq!(parse_delta_content(json), Some("test".to_string()));
    }

    #[test]
    fn test_parse_delta_role_only() {
        let json = r#"{"id":"chatcmpl-123","choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_delta_content(json), None);
    }

    #[test]
    fn test_parse_delta_empty_content() {
        let json = r#"{"choices":[{"delta":{"content":""},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_delta_content(json), None);
    }

    #[test]
    fn test_parse_delta_malformed() {
        assert_eq!(parse_delta_content("not json"), None);
        assert_eq!(parse_delta_content(r#"{"choices":[]}"#), None);
    }

    #[test]
    fn test_line_buffer_holds_partial_line() {
        let mut buffer = SseLineBuffer::new();
        assert!(buffer.push("data: {\"a\"").is_empty());
        assert_eq!(buffer.push(":1}\ndata: x"), vec!["data: {\"a\":1}".to_string()]);
        assert_eq!(buffer.finish(), Some("data: x".to_string()));
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_line_buffer_multiple_lines() {
        let mut buffer = SseLineBuffer::new();
        let lines = buffer.push("a\n\nb\n");
        assert_eq!(lines, vec!["a".to_string(), String::new(), "b".to_string()]);
        assert_eq!(buffer.finish(), None);
    }
}

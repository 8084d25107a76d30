// milhouse-stream/src/json_parser.rs
// ============================================================================
// Module: Milhouse Stream-JSON Parser
// Description: Parses newline-delimited JSON engine output into Step values.
// Purpose: Implement the stream-JSON mode of the stream parser contract.
// Dependencies: serde_json, crate::step
// ============================================================================

//! ## Overview
//! Each line is a JSON object with a `type` field. Vendors sometimes emit a
//! preamble line of valid JSON with no `type` tag before the first event
//! line; this parser drops only that case silently, rather than assuming
//! line one carries `type`. A line that isn't JSON at all is never preamble
//! — it always surfaces as a plain result, per the stream parser's general
//! failure semantics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::StepParser;
use crate::step::Step;
use crate::step::StepMeta;
use crate::step::TokenUsage;

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Incremental stream-JSON parser.
#[derive(Debug, Default)]
pub struct StreamJsonParser {
    /// Bytes accumulated since the last complete line.
    buffer: Vec<u8>,
    /// Whether the JSON-lines preamble has been skipped yet.
    seen_first_json_line: bool,
    /// Accumulated token usage across `result` lines.
    usage: TokenUsage,
}

impl StreamJsonParser {
    /// Creates a new, empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the token usage accumulated so far.
    #[must_use]
    pub const fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Parses one complete line into zero or more steps.
    fn parse_line(&mut self, line: &str) -> Vec<Step> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let parsed = serde_json::from_str::<Value>(trimmed).ok();

        let Some(value) = parsed else {
            // A line that isn't JSON at all is never preamble: it always
            // surfaces as a plain result, even as the very first line.
            return vec![Step::Result {
                text: line.to_owned(),
                meta: StepMeta::default(),
            }];
        };

        if !self.seen_first_json_line {
            match value.get("type") {
                Some(_) => self.seen_first_json_line = true,
                // Preamble: valid JSON with no `type` tag. Drop it silently
                // rather than surfacing it as a result line.
                None => return Vec::new(),
            }
        }

        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return vec![Step::Result {
                text: line.to_owned(),
                meta: StepMeta::default(),
            }];
        };

        match kind {
            "assistant" => parse_assistant(&value),
            "result" => self.parse_result(&value),
            "system" => vec![Step::Result {
                text: value.to_string(),
                meta: StepMeta {
                    is_system: true,
                    ..StepMeta::default()
                },
            }],
            "user" => vec![Step::Result {
                text: value.to_string(),
                meta: StepMeta {
                    is_user_message: true,
                    ..StepMeta::default()
                },
            }],
            "error" => vec![Step::Error(
                value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or(trimmed)
                    .to_owned(),
            )],
            _ => vec![Step::Result {
                text: value.to_string(),
                meta: StepMeta::default(),
            }],
        }
    }

    /// Parses a `result`-typed line, accumulating token usage.
    fn parse_result(&mut self, value: &Value) -> Vec<Step> {
        if let Some(usage) = value.get("usage") {
            let input = usage.get("input_tokens").and_then(Value::as_u64).unwrap_or(0);
            let output = usage.get("output_tokens").and_then(Value::as_u64).unwrap_or(0);
            self.usage.accumulate(TokenUsage { input, output });
        }
        let text = value
            .get("result")
            .and_then(Value::as_str)
            .or_else(|| value.get("text").and_then(Value::as_str))
            .unwrap_or_default()
            .to_owned();
        let is_final_response = value
            .get("is_final")
            .and_then(Value::as_bool)
            .unwrap_or(true)
            && !value
                .get("delta")
                .and_then(Value::as_bool)
                .unwrap_or(false);
        vec![Step::Result {
            text,
            meta: StepMeta {
                is_final_response,
                ..StepMeta::default()
            },
        }]
    }
}

/// Parses the content array of an `assistant`-typed line.
fn parse_assistant(value: &Value) -> Vec<Step> {
    let Some(content) = value
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(Value::as_array)
        .or_else(|| value.get("content").and_then(Value::as_array))
    else {
        return Vec::new();
    };

    content.iter().filter_map(parse_content_block).collect()
}

/// Parses one block of an assistant content array.
fn parse_content_block(block: &Value) -> Option<Step> {
    let kind = block.get("type").and_then(Value::as_str)?;
    match kind {
        "thinking" => Some(Step::Thinking(
            block.get("thinking").and_then(Value::as_str).unwrap_or_default().to_owned(),
        )),
        "text" => Some(Step::Result {
            text: block.get("text").and_then(Value::as_str).unwrap_or_default().to_owned(),
            meta: StepMeta::default(),
        }),
        "tool_use" => Some(Step::ToolUse {
            name: block.get("name").and_then(Value::as_str).unwrap_or_default().to_owned(),
            input: block.get("input").cloned().unwrap_or(Value::Null),
            id: block.get("id").and_then(Value::as_str).map(str::to_owned),
        }),
        "tool_result" => Some(Step::Result {
            text: block.get("content").map_or_else(String::new, |c| c.to_string()),
            meta: StepMeta {
                is_tool_result: true,
                ..StepMeta::default()
            },
        }),
        _ => None,
    }
}

impl StepParser for StreamJsonParser {
    fn feed(&mut self, bytes: &[u8]) -> Vec<Step> {
        self.buffer.extend_from_slice(bytes);
        let mut steps = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]).into_owned();
            steps.extend(self.parse_line(&line));
        }
        steps
    }

    fn flush(&mut self) -> Vec<Step> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let remainder = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        self.parse_line(&remainder)
    }

    fn usage(&self) -> TokenUsage {
        self.usage
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::StreamJsonParser;
    use crate::StepParser;
    use crate::step::Step;

    #[test]
    fn parses_assistant_thinking_and_tool_use() {
        let mut parser = StreamJsonParser::new();
        let line = r#"{"type":"assistant","message":{"content":[{"type":"thinking","thinking":"hmm"},{"type":"tool_use","name":"bash","input":{"cmd":"ls"},"id":"1"}]}}"#;
        let steps = parser.feed(format!("{line}\n").as_bytes());
        assert!(matches!(steps[0], Step::Thinking(ref t) if t == "hmm"));
        assert!(matches!(steps[1], Step::ToolUse { ref name, .. } if name == "bash"));
    }

    #[test]
    fn accumulates_token_usage_from_result() {
        let mut parser = StreamJsonParser::new();
        let line = r#"{"type":"result","result":"done","usage":{"input_tokens":10,"output_tokens":5}}"#;
        let _ = parser.feed(format!("{line}\n").as_bytes());
        assert_eq!(parser.usage().input, 10);
        assert_eq!(parser.usage().output, 5);
    }

    #[test]
    fn skips_preamble_before_first_json_line() {
        let mut parser = StreamJsonParser::new();
        let input = "{\"note\":\"booting\"}\n{\"type\":\"result\",\"result\":\"ok\"}\n";
        let steps = parser.feed(input.as_bytes());
        assert_eq!(steps.len(), 1);
        assert!(matches!(steps[0], Step::Result { ref text, .. } if text == "ok"));
    }

    #[test]
    fn malformed_first_line_becomes_plain_result_not_dropped_as_preamble() {
        let mut parser = StreamJsonParser::new();
        let input = "Booting engine...\n{\"type\":\"result\",\"result\":\"ok\"}\n";
        let steps = parser.feed(input.as_bytes());
        assert_eq!(steps.len(), 2);
        assert!(matches!(steps[0], Step::Result { ref text, .. } if text == "Booting engine..."));
        assert!(matches!(steps[1], Step::Result { ref text, .. } if text == "ok"));
    }

    #[test]
    fn malformed_line_becomes_plain_result_not_error() {
        let mut parser = StreamJsonParser::new();
        let steps = parser.feed(b"{not json\n");
        assert_eq!(steps.len(), 1);
        assert!(matches!(steps[0], Step::Result { .. }));
    }
}

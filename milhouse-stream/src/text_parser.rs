// milhouse-stream/src/text_parser.rs
// ============================================================================
// Module: Milhouse Text Parser
// Description: Best-effort line-oriented parser for vendors with no
//              structured output mode.
// Purpose: Implement the text mode of the stream parser contract.
// Dependencies: crate::step
// ============================================================================

//! ## Overview
//! Text mode matches headings (`Thinking:`, `Running:`, `Error:`,
//! `Result:`), bracket markers (`[tool]`, `[error]`), fenced shell blocks, and
//! markdown `##` headers, stripping ANSI escape codes first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::StepParser;
use crate::step::Step;
use crate::step::StepMeta;

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Incremental best-effort text parser.
#[derive(Debug, Default)]
pub struct TextParser {
    /// Bytes accumulated since the last complete line.
    buffer: Vec<u8>,
    /// Whether the parser is currently inside a fenced code block.
    in_fence: bool,
}

impl TextParser {
    /// Creates a new, empty parser.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one complete line into zero or one steps.
    fn parse_line(&mut self, raw_line: &str) -> Option<Step> {
        let line = strip_ansi(raw_line);
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            self.in_fence = !self.in_fence;
            return None;
        }
        if self.in_fence {
            return Some(Step::ToolUse {
                name: "shell".to_owned(),
                input: Value::String(line.clone()),
                id: None,
            });
        }
        if trimmed.is_empty() {
            return None;
        }

        if let Some(rest) = strip_prefix_any(trimmed, &["Thinking:"]) {
            return Some(Step::Thinking(rest.trim().to_owned()));
        }
        if let Some(rest) = strip_prefix_any(trimmed, &["Running:", "[tool]"]) {
            return Some(Step::ToolUse {
                name: rest.trim().to_owned(),
                input: Value::Null,
                id: None,
            });
        }
        if let Some(rest) = strip_prefix_any(trimmed, &["Error:", "[error]"]) {
            return Some(Step::Error(rest.trim().to_owned()));
        }
        if let Some(rest) = strip_prefix_any(trimmed, &["Result:"]) {
            return Some(Step::Result {
                text: rest.trim().to_owned(),
                meta: StepMeta {
                    is_final_response: true,
                    ..StepMeta::default()
                },
            });
        }
        if let Some(heading) = trimmed.strip_prefix("## ") {
            return Some(classify_markdown_heading(heading));
        }

        Some(Step::Result {
            text: trimmed.to_owned(),
            meta: StepMeta::default(),
        })
    }
}

/// Classifies a markdown `##` heading line by keyword into the matching step
/// variant, defaulting to a plain result.
fn classify_markdown_heading(heading: &str) -> Step {
    let lower = heading.to_ascii_lowercase();
    if lower.contains("think") {
        Step::Thinking(heading.to_owned())
    } else if lower.contains("tool") || lower.contains("run") {
        Step::ToolUse {
            name: heading.to_owned(),
            input: Value::Null,
            id: None,
        }
    } else if lower.contains("error") {
        Step::Error(heading.to_owned())
    } else {
        Step::Result {
            text: heading.to_owned(),
            meta: StepMeta::default(),
        }
    }
}

/// Returns the text following the first matching prefix in `prefixes`, or
/// `None` if none match.
fn strip_prefix_any<'a>(text: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes.iter().find_map(|prefix| text.strip_prefix(prefix))
}

/// Strips ANSI escape sequences (`ESC [ ... letter`) from a line.
fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

impl StepParser for TextParser {
    fn feed(&mut self, bytes: &[u8]) -> Vec<Step> {
        self.buffer.extend_from_slice(bytes);
        let mut steps = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes[..line_bytes.len() - 1]).into_owned();
            if let Some(step) = self.parse_line(&line) {
                steps.push(step);
            }
        }
        steps
    }

    fn flush(&mut self) -> Vec<Step> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let remainder = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        self.parse_line(&remainder).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::TextParser;
    use crate::StepParser;
    use crate::step::Step;

    #[test]
    fn parses_headings() {
        let mut parser = TextParser::new();
        let steps = parser.feed(b"Thinking: considering options\nError: boom\n");
        assert!(matches!(steps[0], Step::Thinking(ref t) if t == "considering options"));
        assert!(matches!(steps[1], Step::Error(ref t) if t == "boom"));
    }

    #[test]
    fn strips_ansi_codes() {
        let mut parser = TextParser::new();
        let steps = parser.feed(b"\x1b[32mResult: green\x1b[0m\n");
        assert!(matches!(steps[0], Step::Result { ref text, .. } if text == "green"));
    }
}

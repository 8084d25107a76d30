// milhouse-engines/src/validate.rs
// ============================================================================
// Module: Milhouse Prompt Validator
// Description: Structural checks applied to every prompt before dispatch.
// Purpose: Catch malformed or role-mismatched prompts before spawning a
//          child process.
// Dependencies: milhouse-core
// ============================================================================

//! ## Overview
//! Six checks run over every prompt before execution. All but one surface as
//! warnings; a detected role conflict is a hard error, and per the testable
//! properties a role conflict must prevent the child process from ever being
//! spawned.

use milhouse_core::AgentRole;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Severity of one validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptIssueSeverity {
    /// Non-fatal; execution proceeds.
    Warning,
    /// Fatal; execution must not proceed.
    Error,
}

/// One prompt validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptIssue {
    /// Severity of the finding.
    pub severity: PromptIssueSeverity,
    /// Human-readable description.
    pub message: String,
}

/// Aggregate validation outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptValidation {
    /// `false` iff any finding has [`PromptIssueSeverity::Error`].
    pub valid: bool,
    /// All findings, warnings and errors alike.
    pub issues: Vec<PromptIssue>,
}

const MIN_PROMPT_LENGTH: usize = 100;

/// The known agent role codes a `## Role:` section may cite in parentheses.
const KNOWN_ROLE_CODES: &[&str] = &["LI", "IV", "PL", "CDM", "EX", "TV", "PR"];

/// Runs all six structural checks over `prompt`, expected to be executed
/// under `expected_role`.
#[must_use]
pub fn validate_prompt(prompt: &str, expected_role: AgentRole) -> PromptValidation {
    let mut issues = Vec::new();

    if prompt.len() < MIN_PROMPT_LENGTH {
        issues.push(PromptIssue {
            severity: PromptIssueSeverity::Warning,
            message: format!("prompt is shorter than the minimum of {MIN_PROMPT_LENGTH} characters"),
        });
    }

    let headers = markdown_headers(prompt);

    if !headers.iter().any(|h| h.trim_start().starts_with("Role:")) {
        issues.push(PromptIssue {
            severity: PromptIssueSeverity::Warning,
            message: "prompt has no '## Role:' section".to_owned(),
        });
    } else if let Some(role_header) = headers.iter().find(|h| h.trim_start().starts_with("Role:")) {
        if let Some(cited) = extract_role_code(role_header) {
            if KNOWN_ROLE_CODES.contains(&cited.as_str()) && cited != expected_role.to_string() {
                issues.push(PromptIssue {
                    severity: PromptIssueSeverity::Error,
                    message: format!(
                        "prompt's '## Role:' section cites role '{cited}', but this invocation expects '{expected_role}'"
                    ),
                });
            }
        }
    }

    if has_duplicate_headers(&headers) {
        issues.push(PromptIssue {
            severity: PromptIssueSeverity::Warning,
            message: "prompt has duplicate '##' section headers".to_owned(),
        });
    }

    if has_empty_section(prompt) {
        issues.push(PromptIssue {
            severity: PromptIssueSeverity::Warning,
            message: "prompt has an empty section body".to_owned(),
        });
    }

    if !fences_balanced(prompt) {
        issues.push(PromptIssue {
            severity: PromptIssueSeverity::Warning,
            message: "prompt has an unbalanced fenced code block".to_owned(),
        });
    }

    let valid = !issues.iter().any(|issue| issue.severity == PromptIssueSeverity::Error);
    PromptValidation { valid, issues }
}

/// Returns the text of every `## `-prefixed header line, in order.
fn markdown_headers(prompt: &str) -> Vec<String> {
    prompt
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("## "))
        .map(str::to_owned)
        .collect()
}

/// Extracts a parenthesized role code from a `Role:` header, e.g.
/// `Role: Executor (EX)` → `Some("EX")`.
fn extract_role_code(header: &str) -> Option<String> {
    let open = header.rfind('(')?;
    let close = header.rfind(')')?;
    if close <= open {
        return None;
    }
    Some(header[open + 1..close].trim().to_owned())
}

/// Returns whether any header text appears more than once.
fn has_duplicate_headers(headers: &[String]) -> bool {
    for (i, header) in headers.iter().enumerate() {
        if headers[i + 1..].contains(header) {
            return true;
        }
    }
    false
}

/// Returns whether any `##` section's body (up to the next `##` header or
/// end of prompt) is empty or whitespace-only.
fn has_empty_section(prompt: &str) -> bool {
    let lines: Vec<&str> = prompt.lines().collect();
    let header_indices: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim_start().starts_with("## "))
        .map(|(i, _)| i)
        .collect();

    for (pos, &start) in header_indices.iter().enumerate() {
        let end = header_indices.get(pos + 1).copied().unwrap_or(lines.len());
        let body = &lines[start + 1..end];
        if body.iter().all(|line| line.trim().is_empty()) {
            return true;
        }
    }
    false
}

/// Returns whether every fenced code block (` ``` `) is closed.
fn fences_balanced(prompt: &str) -> bool {
    let fence_count = prompt.lines().filter(|line| line.trim_start().starts_with("```")).count();
    fence_count % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::PromptIssueSeverity;
    use super::validate_prompt;
    use milhouse_core::AgentRole;

    fn padded(body: &str) -> String {
        format!("{body}{}", "x".repeat(120))
    }

    #[test]
    fn role_conflict_is_a_hard_error() {
        let prompt = padded("## Role: Executor (EX)\nDo work.\n");
        let result = validate_prompt(&prompt, AgentRole::Tv);
        assert!(!result.valid);
        assert!(
            result
                .issues
                .iter()
                .any(|i| i.severity == PromptIssueSeverity::Error)
        );
    }

    #[test]
    fn matching_role_is_not_flagged() {
        let prompt = padded("## Role: Executor (EX)\nDo work.\n");
        let result = validate_prompt(&prompt, AgentRole::Ex);
        assert!(result.valid);
    }

    #[test]
    fn missing_role_section_is_only_a_warning() {
        let prompt = padded("## Context\nSome context.\n");
        let result = validate_prompt(&prompt, AgentRole::Ex);
        assert!(result.valid);
        assert!(!result.issues.is_empty());
    }

    #[test]
    fn unbalanced_fence_is_flagged() {
        let prompt = padded("## Role: Executor (EX)\n```\nunterminated\n");
        let result = validate_prompt(&prompt, AgentRole::Ex);
        assert!(result.valid);
        assert!(result.issues.iter().any(|i| i.message.contains("fenced")));
    }
}

// milhouse-exec/src/verifier.rs
// ============================================================================
// Module: AI Truth Verifier
// Description: Runs the TV-role engine invocation that judges a run's
//              completed and failed work against the gate findings.
// Purpose: Produce the final, AI-adjudicated pass/fail verdict that closes
//          out the verify phase.
// Dependencies: milhouse-runtime, milhouse-core, serde_json
// ============================================================================

//! ## Overview
//! [`run_ai_verifier`] builds a prompt summarizing project context, task
//! counts, and any pre-check issues the deterministic gates already found,
//! then asks the `TV` role to return a structured verdict. The engine's
//! final response is rarely pure JSON — vendors wrap it in prose or markdown
//! fences — so the response is pulled out with a brace-balanced scan before
//! being deserialized against the documented shape.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use milhouse_core::AgentRole;
use milhouse_core::RunId;
use milhouse_core::Task;
use milhouse_core::TaskStatus;
use milhouse_runtime::ExecutionContext;
use milhouse_runtime::ExecutionRequest;
use milhouse_runtime::MiddlewareExecutor;
use serde::Deserialize;
use serde::Serialize;

use crate::error::GateError;
use crate::gates::GateReport;

// ============================================================================
// SECTION: Verdict Shape
// ============================================================================

/// The structured verdict a `TV`-role invocation must return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierVerdict {
    /// Whether the verifier judges the run's work, taken as a whole, done.
    pub overall_pass: bool,
    /// Per-gate commentary the verifier adds on top of the deterministic
    /// gate reports.
    #[serde(default)]
    pub gates: Vec<GateCommentary>,
    /// Free-form follow-up suggestions.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Whether the verifier spotted a regression the gates missed.
    #[serde(default)]
    pub regressions_found: bool,
    /// One-paragraph human summary.
    #[serde(default)]
    pub summary: String,
}

/// One gate's worth of verifier commentary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateCommentary {
    /// Gate name this commentary addresses.
    pub gate: String,
    /// The verifier's note on this gate's finding.
    pub note: String,
}

// ============================================================================
// SECTION: Run Verifier
// ============================================================================

/// Runs the AI verifier for one run, returning its verdict.
///
/// Overall run success is the caller's decision, computed as: zero gate
/// failures, `verdict.overall_pass`, and zero tasks left in
/// [`TaskStatus::Failed`] or [`TaskStatus::MergeError`].
///
/// # Errors
///
/// Returns [`GateError`] if the engine invocation fails or its response
/// cannot be parsed into a [`VerifierVerdict`].
pub async fn run_ai_verifier(
    executor: &MiddlewareExecutor,
    work_dir: &Path,
    run_id: &RunId,
    project_context: &str,
    tasks: &[Task],
    gate_reports: &[GateReport],
) -> Result<VerifierVerdict, GateError> {
    let prompt = build_prompt(project_context, tasks, gate_reports);
    let request = ExecutionRequest::new(prompt, work_dir.to_path_buf(), run_id.clone(), AgentRole::Tv, "verify".to_owned());
    let mut context = ExecutionContext::new(&request);

    let outcome = executor
        .execute(&request, &mut context)
        .await
        .map_err(|source| GateError::ExecutionFailed { gate: "verifier", message: source.to_string() })?;

    extract_verdict(&outcome.final_response)
}

fn build_prompt(project_context: &str, tasks: &[Task], gate_reports: &[GateReport]) -> String {
    let done = tasks.iter().filter(|task| task.status == TaskStatus::Done).count();
    let failed = tasks.iter().filter(|task| matches!(task.status, TaskStatus::Failed | TaskStatus::MergeError)).count();

    let mut prompt = String::new();
    prompt.push_str("You are the truth verifier for a completed code-change run.\n\n");
    prompt.push_str("## Project context\n");
    prompt.push_str(project_context);
    prompt.push_str("\n\n## Task summary\n");
    prompt.push_str(&format!("{done} task(s) done, {failed} task(s) failed or unmerged.\n\n"));
    prompt.push_str("## Tasks\n");
    for task in tasks {
        prompt.push_str(&format!("- {} [{:?}]: {}\n", task.id, task.status, task.title));
    }
    prompt.push_str("\n## Pre-check issues from deterministic gates\n");
    let failing_gates: Vec<&GateReport> = gate_reports.iter().filter(|report| !report.passed).collect();
    if failing_gates.is_empty() {
        prompt.push_str("None; every deterministic gate passed.\n");
    } else {
        for report in failing_gates {
            prompt.push_str(&format!("- {}: {}\n", report.gate, report.message));
        }
    }
    prompt.push_str(
        "\nRespond with exactly one JSON object matching: \
         {\"overall_pass\": bool, \"gates\": [{\"gate\": string, \"note\": string}], \
         \"recommendations\": [string], \"regressions_found\": bool, \"summary\": string}.",
    );
    prompt
}

/// Pulls the first balanced `{...}` object out of `text` and deserializes
/// it, tolerating prose or markdown fences around the JSON body.
fn extract_verdict(text: &str) -> Result<VerifierVerdict, GateError> {
    let object_text = extract_json_object(text)
        .ok_or_else(|| GateError::VerifierResponseInvalid("no JSON object found in verifier response".to_owned()))?;
    serde_json::from_str(&object_text).map_err(|source| GateError::VerifierResponseInvalid(source.to_string()))
}

fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=offset].to_owned());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::extract_verdict;

    #[test]
    fn extracts_object_wrapped_in_prose_and_fences() {
        let text = "Here is my verdict:\n```json\n{\"overall_pass\": true, \"summary\": \"all good\"}\n```\nThanks.";
        let verdict = extract_verdict(text).expect("parses");
        assert!(verdict.overall_pass);
        assert_eq!(verdict.summary, "all good");
    }

    #[test]
    fn rejects_response_with_no_object() {
        assert!(extract_verdict("no json here").is_err());
    }
}

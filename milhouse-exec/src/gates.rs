// milhouse-exec/src/gates.rs
// ============================================================================
// Module: Verification Gates
// Description: The five deterministic gates run after exec, in fixed order.
// Purpose: Decide whether a run's completed work is actually done: no
//          placeholders, no silent refactors, acceptance criteria verified,
//          evidence complete, environment consistent.
// Dependencies: milhouse-core, tokio, regex
// ============================================================================

//! ## Overview
//! [`run_all_gates`] executes the five gates strictly in order because the
//! DoD gate mutates `Acceptance::verified`, which the evidence gate then
//! reads. Every gate returns a [`GateReport`] regardless of outcome; gates
//! never abort the run, they only record findings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::time::Duration;

use milhouse_core::Execution;
use milhouse_core::Task;
use milhouse_core::TaskStatus;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use tokio::process::Command;
use tokio::time::timeout;

use crate::error::GateError;
use crate::safety::CommandSafetyPolicy;
use crate::store::RunStateStore;

/// File extensions the placeholder gate scans.
const CODE_EXTENSIONS: &[&str] =
    &["ts", "tsx", "js", "jsx", "py", "go", "rs", "java", "kt", "swift", "c", "cpp", "h", "hpp"];

/// Timeout applied to every DoD check-command invocation.
const DOD_CHECK_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Report Shapes
// ============================================================================

/// One piece of supporting evidence for a gate's finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateEvidence {
    /// Kind of evidence.
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    /// File path, for `file`-kind evidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Starting line, for `file`-kind evidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    /// Ending line, for `file`-kind evidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    /// Captured command output, for `command`-kind evidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// The command run, for `command`-kind evidence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// When this evidence was recorded.
    pub timestamp: milhouse_core::Timestamp,
}

/// The kind of artifact a [`GateEvidence`] entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    /// A source file location.
    File,
    /// A shell command invocation.
    Command,
}

/// Result of running one gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateReport {
    /// Gate name.
    pub gate: &'static str,
    /// Whether the gate passed.
    pub passed: bool,
    /// Human-readable summary.
    pub message: String,
    /// Supporting evidence for the finding.
    pub evidence: Vec<GateEvidence>,
    /// When the gate ran.
    pub timestamp: milhouse_core::Timestamp,
}

// ============================================================================
// SECTION: Run All
// ============================================================================

/// Runs the five gates in their fixed order, persisting DoD mutations to
/// `store` as they happen so the evidence gate reads up-to-date state.
///
/// # Errors
///
/// Returns [`GateError`] only if a gate's own execution fails (I/O, command
/// spawn); a gate finding real problems is reported via `passed = false`,
/// not an `Err`.
pub async fn run_all_gates(
    work_dir: &Path,
    mut tasks: Vec<Task>,
    executions: &[Execution],
    safety: &CommandSafetyPolicy,
    unsafe_dod_checks: bool,
    store: &dyn RunStateStore,
    run_id: &milhouse_core::RunId,
) -> Result<Vec<GateReport>, GateError> {
    let mut reports = Vec::with_capacity(5);

    reports.push(placeholder_gate(work_dir, &tasks).await?);
    reports.push(diff_hygiene_gate(&tasks, executions));

    let dod_report = dod_gate(&mut tasks, work_dir, safety, unsafe_dod_checks).await?;
    for task in &tasks {
        store
            .save_task(run_id, task)
            .await
            .map_err(|source| GateError::ExecutionFailed { gate: "dod", message: source.to_string() })?;
    }
    reports.push(dod_report);

    reports.push(evidence_gate(&tasks));
    reports.push(env_consistency_gate(work_dir).await);

    Ok(reports)
}

fn now_evidence(kind: EvidenceKind) -> GateEvidence {
    GateEvidence { kind, file: None, line_start: None, line_end: None, output: None, command: None, timestamp: milhouse_core::Timestamp::now() }
}

// ============================================================================
// SECTION: Gate 1 — Placeholder
// ============================================================================

async fn placeholder_gate(work_dir: &Path, tasks: &[Task]) -> Result<GateReport, GateError> {
    #[allow(clippy::unwrap_used, reason = "the pattern is a fixed, valid literal")]
    let pattern = Regex::new(
        r"(?i)\bTODO\b|\bFIXME\b|\bHACK\b|\bXXX\b|return\s+(true|false|null)\s*;?\s*//|throw\s+.*(Not implemented|TODO)|\.skip\(|\.only\(|\bmock\(\)|\bstub\(\)",
    )
    .unwrap();

    let mut evidence = Vec::new();
    for task in tasks.iter().filter(|task| task.status == TaskStatus::Done) {
        for file in &task.files {
            let Some(extension) = Path::new(file).extension().and_then(std::ffi::OsStr::to_str) else { continue };
            if !CODE_EXTENSIONS.contains(&extension) {
                continue;
            }
            let full_path = work_dir.join(file);
            let Ok(contents) = tokio::fs::read_to_string(&full_path).await else { continue };
            for (line_number, line) in contents.lines().enumerate() {
                if pattern.is_match(line) {
                    evidence.push(GateEvidence {
                        kind: EvidenceKind::File,
                        file: Some(file.clone()),
                        line_start: Some(u32::try_from(line_number + 1).unwrap_or(u32::MAX)),
                        line_end: Some(u32::try_from(line_number + 1).unwrap_or(u32::MAX)),
                        output: None,
                        command: None,
                        timestamp: milhouse_core::Timestamp::now(),
                    });
                }
            }
        }
    }

    let passed = evidence.is_empty();
    Ok(GateReport {
        gate: "placeholder",
        passed,
        message: if passed { "no placeholder markers found".to_owned() } else { format!("{} placeholder marker(s) found", evidence.len()) },
        evidence,
        timestamp: milhouse_core::Timestamp::now(),
    })
}

// ============================================================================
// SECTION: Gate 2 — Diff Hygiene
// ============================================================================

fn diff_hygiene_gate(tasks: &[Task], executions: &[Execution]) -> GateReport {
    let done_task_ids: std::collections::HashSet<_> = tasks.iter().filter(|task| task.status == TaskStatus::Done).map(|task| task.id.clone()).collect();

    let mut evidence = Vec::new();
    for execution in executions.iter().filter(|execution| done_task_ids.contains(&execution.task_id) && !execution.branch.is_empty()) {
        let Some(task) = tasks.iter().find(|task| task.id == execution.task_id) else { continue };
        if task.files.is_empty() {
            let mut item = now_evidence(EvidenceKind::File);
            item.file = Some(task.id.to_string());
            evidence.push(item);
        }
    }

    let passed = evidence.is_empty();
    GateReport {
        gate: "diff_hygiene",
        passed,
        message: if passed { "no silent-refactor suspects".to_owned() } else { format!("{} possible silent refactor(s)", evidence.len()) },
        evidence,
        timestamp: milhouse_core::Timestamp::now(),
    }
}

// ============================================================================
// SECTION: Gate 3 — DoD
// ============================================================================

async fn dod_gate(tasks: &mut [Task], work_dir: &Path, safety: &CommandSafetyPolicy, unsafe_dod_checks: bool) -> Result<GateReport, GateError> {
    let mut evidence = Vec::new();
    let mut all_verified = true;

    for task in tasks.iter_mut().filter(|task| task.status == TaskStatus::Done) {
        for acceptance in &mut task.acceptance {
            if acceptance.verified {
                continue;
            }
            let Some(command) = &acceptance.check_command else {
                all_verified = false;
                let mut item = now_evidence(EvidenceKind::Command);
                item.output = Some("no check defined".to_owned());
                evidence.push(item);
                continue;
            };

            if !unsafe_dod_checks {
                let policy_result = safety.validate(command);
                if !policy_result.valid {
                    all_verified = false;
                    let mut item = now_evidence(EvidenceKind::Command);
                    item.command = Some(command.clone());
                    item.output = Some(format!("command skipped: {}", policy_result.issues.join("; ")));
                    evidence.push(item);
                    continue;
                }
            }

            let outcome = run_check_command(command, work_dir).await?;
            if outcome.success {
                acceptance.verified = true;
            } else {
                all_verified = false;
            }
            let mut item = now_evidence(EvidenceKind::Command);
            item.command = Some(command.clone());
            item.output = Some(outcome.combined_output());
            evidence.push(item);
        }
    }

    Ok(GateReport {
        gate: "dod",
        passed: all_verified,
        message: if all_verified { "all acceptance criteria verified".to_owned() } else { "one or more acceptance criteria unverified".to_owned() },
        evidence,
        timestamp: milhouse_core::Timestamp::now(),
    })
}

struct CheckOutcome {
    success: bool,
    stdout: String,
    stderr: String,
}

impl CheckOutcome {
    fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

async fn run_check_command(command: &str, work_dir: &Path) -> Result<CheckOutcome, GateError> {
    let future = Command::new("sh").arg("-c").arg(command).current_dir(work_dir).output();
    match timeout(DOD_CHECK_TIMEOUT, future).await {
        Ok(Ok(output)) => Ok(CheckOutcome {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(source)) => Err(GateError::ExecutionFailed { gate: "dod", message: source.to_string() }),
        Err(_elapsed) => Ok(CheckOutcome { success: false, stdout: String::new(), stderr: "check command timed out after 30s".to_owned() }),
    }
}

// ============================================================================
// SECTION: Gate 4 — Evidence
// ============================================================================

fn evidence_gate(tasks: &[Task]) -> GateReport {
    let mut unverified = 0u32;
    for task in tasks.iter().filter(|task| task.status == TaskStatus::Done) {
        unverified += u32::try_from(task.acceptance.iter().filter(|item| !item.verified).count()).unwrap_or(u32::MAX);
    }

    let passed = unverified == 0;
    GateReport {
        gate: "evidence",
        passed,
        message: if passed { "all acceptance criteria have evidence".to_owned() } else { format!("{unverified} unverified acceptance criteria") },
        evidence: Vec::new(),
        timestamp: milhouse_core::Timestamp::now(),
    }
}

// ============================================================================
// SECTION: Gate 5 — Env Consistency
// ============================================================================

async fn env_consistency_gate(work_dir: &Path) -> GateReport {
    let probes_dir = work_dir.join("probes");
    let count = match tokio::fs::read_dir(&probes_dir).await {
        Ok(mut entries) => {
            let mut count = 0u32;
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.path().is_dir() {
                    count += 1;
                }
            }
            count
        }
        Err(_) => 0,
    };

    GateReport {
        gate: "env_consistency",
        passed: true,
        message: format!("{count} probe director(ies) found"),
        evidence: Vec::new(),
        timestamp: milhouse_core::Timestamp::now(),
    }
}

#[cfg(test)]
mod tests {
    use milhouse_core::Acceptance;
    use milhouse_core::IssueId;
    use milhouse_core::Task;
    use milhouse_core::TaskId;
    use milhouse_core::TaskStatus;
    use milhouse_core::Timestamp;

    use super::diff_hygiene_gate;
    use super::evidence_gate;

    fn done_task(files: Vec<&str>) -> Task {
        let mut task = Task::new(TaskId::new("T-abc-01"), IssueId::new("P-abc"), "title", "desc", Timestamp::now());
        task.status = TaskStatus::Done;
        task.files = files.into_iter().map(str::to_owned).collect();
        task
    }

    #[test]
    fn empty_files_with_a_branch_is_a_silent_refactor_suspect() {
        let task = done_task(vec![]);
        let mut execution = milhouse_core::Execution::started(
            milhouse_core::ExecutionId::new("exec-1"),
            task.id.clone(),
            "milhouse/P-abc".to_owned(),
            Timestamp::now(),
        );
        execution.success = true;
        let report = diff_hygiene_gate(std::slice::from_ref(&task), &[execution]);
        assert!(!report.passed);
    }

    #[test]
    fn unverified_acceptance_fails_evidence_gate() {
        let mut task = done_task(vec!["src/lib.rs"]);
        task.acceptance.push(Acceptance::new("criterion", Some("cargo test".to_owned())));
        let report = evidence_gate(std::slice::from_ref(&task));
        assert!(!report.passed);
    }
}

// milhouse-cli/src/phases.rs
// ============================================================================
// Module: Pipeline Phase Drivers
// Description: Drives each of the six pipeline phases against a shared
//              repository root, run, and middleware-wrapped executor.
// Purpose: Turn one CLI invocation's selected flags into engine invocations,
//          state-store writes, and (for exec/verify) the full issue-parallel
//          executor and gate engine.
// Dependencies: milhouse-core, milhouse-config, milhouse-exec,
//               milhouse-runtime, serde_json
// ============================================================================

//! ## Overview
//! Scan, validate, plan, and consolidate are each a single engine invocation
//! whose final response is expected to be a JSON document in the shape
//! documented per phase below; the prompt bodies themselves are intentionally
//! thin since the prompt template content is treated as an opaque string
//! supplied by the agent-role layer. Exec and verify instead drive the full
//! [`milhouse_exec`] machinery: the issue pool and the gate engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use milhouse_config::MilhouseConfig;
use milhouse_core::AgentRole;
use milhouse_core::Issue;
use milhouse_core::IssueId;
use milhouse_core::IssueStatus;
use milhouse_core::Run;
use milhouse_core::RunId;
use milhouse_core::Severity;
use milhouse_core::Task;
use milhouse_core::TaskId;
use milhouse_core::Timestamp;
use milhouse_exec::actions;
use milhouse_exec::run_ai_verifier;
use milhouse_exec::run_all_gates;
use milhouse_exec::order_groups_by_severity;
use milhouse_exec::partition_by_issue;
use milhouse_exec::AuditLog;
use milhouse_exec::CommandSafetyPolicy;
use milhouse_exec::GateReport;
use milhouse_exec::IssuePool;
use milhouse_exec::RunStateStore;
use milhouse_exec::Vcs;
use milhouse_exec::VerifierVerdict;
use milhouse_runtime::ExecutionContext;
use milhouse_runtime::ExecutionRequest;
use milhouse_runtime::MiddlewareExecutor;
use rand::Rng;
use serde::Deserialize;
use tracing::info;
use tracing::warn;

use crate::error::CliError;

/// Shared collaborators every phase driver needs.
pub struct PipelineCx<'a> {
    /// Repository root.
    pub root: PathBuf,
    /// Loaded configuration.
    pub config: &'a MilhouseConfig,
    /// Run-scoped state store.
    pub store: &'a dyn RunStateStore,
    /// Run-scoped audit log.
    pub audit: &'a AuditLog,
    /// Middleware-wrapped executor for this invocation's engine.
    pub executor: &'a MiddlewareExecutor,
    /// Model override forwarded to every request, if any.
    pub model_override: Option<String>,
    /// Issue id filter (`--issues`), empty means no filter.
    pub issue_filter: Vec<String>,
    /// Task id filter (`--task-id`), `None` means no filter.
    pub task_id_filter: Option<String>,
}

impl PipelineCx<'_> {
    fn new_request(&self, prompt: String, run_id: &RunId, role: AgentRole, phase: &str) -> ExecutionRequest {
        let mut request = ExecutionRequest::new(prompt, self.root.clone(), run_id.clone(), role, phase.to_owned());
        request.model_override.clone_from(&self.model_override);
        request
    }

    async fn invoke(&self, request: &ExecutionRequest) -> Result<String, CliError> {
        let mut context = ExecutionContext::new(request);
        let outcome = self.executor.execute(request, &mut context).await?;
        if !outcome.success {
            return Err(CliError::generic(format!(
                "{} invocation did not succeed: {}",
                request.pipeline_phase,
                outcome.error.unwrap_or_else(|| "no error detail reported".to_owned())
            )));
        }
        Ok(outcome.final_response)
    }
}

// ============================================================================
// SECTION: Scan
// ============================================================================

/// Response shape the scan engine invocation is asked to produce.
#[derive(Debug, Deserialize)]
struct ScannedIssue {
    symptom: String,
    hypothesis: String,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    frequency: Option<String>,
    #[serde(default)]
    blast_radius: Option<String>,
}

/// Runs the scan phase: one `LI`-role invocation producing a Problem Brief,
/// persisted as a fresh `UNVALIDATED` issue per entry.
///
/// # Errors
///
/// Returns [`CliError`] if the invocation fails or its response is not a
/// JSON array of [`ScannedIssue`] objects.
pub async fn run_scan(cx: &PipelineCx<'_>, run: &Run) -> Result<usize, CliError> {
    let prompt = format!(
        "Scan the repository at {} for candidate issues. Respond with a JSON array of objects: \
         {{\"symptom\": string, \"hypothesis\": string, \"severity\": \"LOW\"|\"MEDIUM\"|\"HIGH\"|\"CRITICAL\", \
         \"frequency\": string?, \"blast_radius\": string?}}.",
        cx.root.display()
    );
    let request = cx.new_request(prompt, &run.id, AgentRole::Li, "scan");
    let response = cx.invoke(&request).await?;
    let scanned: Vec<ScannedIssue> =
        serde_json::from_str(&extract_json_array(&response).ok_or_else(|| CliError::generic("scan response did not contain a JSON array"))?)
            .map_err(|source| CliError::generic(format!("scan response did not match the expected shape: {source}")))?;

    let now = Timestamp::now();
    let count = scanned.len();
    for (index, scanned_issue) in scanned.into_iter().enumerate() {
        let suffix = format!("{index:06x}");
        let mut issue = Issue::new_unvalidated(
            IssueId::generate(now, &suffix),
            scanned_issue.symptom,
            scanned_issue.hypothesis,
            scanned_issue.severity.as_deref().map(Severity::parse_lenient).unwrap_or(Severity::Medium),
        );
        issue.frequency = scanned_issue.frequency;
        issue.blast_radius = scanned_issue.blast_radius;
        cx.store.save_issue(&run.id, &issue).await?;
        cx.audit.append(&actions::issue_validated(now, issue.id.as_str(), "UNVALIDATED")).await.unwrap_or_else(|err| {
            warn!(error = %err, "audit append failed for scanned issue");
        });
    }
    info!(run_id = %run.id, issues_found = count, "scan phase complete");
    Ok(count)
}

// ============================================================================
// SECTION: Validate
// ============================================================================

#[derive(Debug, Deserialize)]
struct ValidatedIssue {
    issue_id: String,
    status: String,
    #[serde(default)]
    evidence: Vec<String>,
}

/// Runs the validate phase: one `IV`-role invocation over every
/// `UNVALIDATED` issue, applying the returned status transitions.
///
/// # Errors
///
/// Returns [`CliError`] if the invocation fails, its response is malformed,
/// or an issue it names does not exist in this run.
pub async fn run_validate(cx: &PipelineCx<'_>, run: &Run) -> Result<usize, CliError> {
    let issues = cx.store.load_issues(&run.id).await?;
    let pending: Vec<&Issue> = issues.iter().filter(|issue| issue.status == IssueStatus::Unvalidated).collect();
    if pending.is_empty() {
        info!(run_id = %run.id, "validate phase: no unvalidated issues");
        return Ok(0);
    }

    let mut prompt = String::from(
        "Validate the following candidate issues against the repository. Respond with a JSON array of \
         objects: {\"issue_id\": string, \"status\": \"CONFIRMED\"|\"FALSE\"|\"PARTIAL\"|\"MISDIAGNOSED\", \
         \"evidence\": [string]}.\n\n",
    );
    for issue in &pending {
        prompt.push_str(&format!("- {}: {} (hypothesis: {})\n", issue.id, issue.symptom, issue.hypothesis));
    }

    let request = cx.new_request(prompt, &run.id, AgentRole::Iv, "validate");
    let response = cx.invoke(&request).await?;
    let validations: Vec<ValidatedIssue> =
        serde_json::from_str(&extract_json_array(&response).ok_or_else(|| CliError::generic("validate response did not contain a JSON array"))?)
            .map_err(|source| CliError::generic(format!("validate response did not match the expected shape: {source}")))?;

    let now = Timestamp::now();
    let mut applied = 0;
    for validation in validations {
        let issue_id = IssueId::new(validation.issue_id);
        let mut issue = cx.store.load_issue(&run.id, &issue_id).await?;
        issue.status = parse_issue_status(&validation.status);
        issue.evidence.extend(validation.evidence);
        cx.store.save_issue(&run.id, &issue).await?;
        cx.audit
            .append(&actions::issue_validated(now, issue_id.as_str(), &validation.status))
            .await
            .unwrap_or_else(|err| warn!(error = %err, "audit append failed for validated issue"));
        applied += 1;
    }
    info!(run_id = %run.id, issues_validated = applied, "validate phase complete");
    Ok(applied)
}

fn parse_issue_status(raw: &str) -> IssueStatus {
    match raw.trim().to_ascii_uppercase().as_str() {
        "CONFIRMED" => IssueStatus::Confirmed,
        "FALSE" => IssueStatus::False,
        "PARTIAL" => IssueStatus::Partial,
        "MISDIAGNOSED" => IssueStatus::Misdiagnosed,
        _ => IssueStatus::Unvalidated,
    }
}

// ============================================================================
// SECTION: Plan
// ============================================================================

#[derive(Debug, Deserialize)]
struct PlannedAcceptance {
    description: String,
    #[serde(default)]
    check_command: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlannedTask {
    title: String,
    description: String,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    checks: Vec<String>,
    #[serde(default)]
    acceptance: Vec<PlannedAcceptance>,
}

/// Runs the plan phase: one `PL`-role invocation per confirmed or partially
/// confirmed issue, persisting the returned work-breakdown as tasks.
///
/// # Errors
///
/// Returns [`CliError`] if any per-issue invocation fails or its response is
/// malformed.
pub async fn run_plan(cx: &PipelineCx<'_>, run: &Run) -> Result<usize, CliError> {
    let issues = cx.store.load_issues(&run.id).await?;
    let planned_issues: Vec<Issue> = issues
        .into_iter()
        .filter(|issue| matches!(issue.status, IssueStatus::Confirmed | IssueStatus::Partial))
        .filter(|issue| cx.issue_filter.is_empty() || cx.issue_filter.iter().any(|wanted| wanted == issue.id.as_str()))
        .collect();

    let mut total_tasks = 0;
    for mut issue in planned_issues {
        let prompt = format!(
            "Plan a work breakdown for issue {}: {} (hypothesis: {}). Respond with a JSON array of objects: \
             {{\"title\": string, \"description\": string, \"files\": [string], \"checks\": [string], \
             \"acceptance\": [{{\"description\": string, \"check_command\": string?}}]}}.",
            issue.id, issue.symptom, issue.hypothesis
        );
        let request = cx.new_request(prompt, &run.id, AgentRole::Pl, "plan");
        let response = cx.invoke(&request).await?;
        let planned: Vec<PlannedTask> =
            serde_json::from_str(&extract_json_array(&response).ok_or_else(|| CliError::generic("plan response did not contain a JSON array"))?)
                .map_err(|source| CliError::generic(format!("plan response did not match the expected shape: {source}")))?;

        let now = Timestamp::now();
        for (sequence, planned_task) in planned.into_iter().enumerate() {
            let task_id = TaskId::generate(&issue.id, u32::try_from(sequence + 1).unwrap_or(u32::MAX));
            let mut task = Task::new(task_id.clone(), issue.id.clone(), planned_task.title, planned_task.description, now);
            task.files = planned_task.files;
            task.checks = planned_task.checks;
            task.acceptance = planned_task
                .acceptance
                .into_iter()
                .map(|item| milhouse_core::Acceptance::new(item.description, item.check_command))
                .collect();
            cx.store.save_task(&run.id, &task).await?;
            issue.related_task_ids.push(task_id);
            total_tasks += 1;
        }
        cx.store.save_issue(&run.id, &issue).await?;
    }
    info!(run_id = %run.id, tasks_planned = total_tasks, "plan phase complete");
    Ok(total_tasks)
}

// ============================================================================
// SECTION: Consolidate
// ============================================================================

#[derive(Debug, Deserialize)]
struct ConsolidatedTask {
    task_id: String,
    #[serde(default)]
    parallel_group: u32,
    #[serde(default)]
    depends_on: Vec<String>,
}

/// Runs the consolidate phase: one `CDM`-role invocation over the full task
/// graph, applying the returned parallel groups and dependency edges.
///
/// # Errors
///
/// Returns [`CliError`] if the invocation fails or its response is malformed.
pub async fn run_consolidate(cx: &PipelineCx<'_>, run: &Run) -> Result<usize, CliError> {
    let tasks = cx.store.load_tasks(&run.id).await?;
    if tasks.is_empty() {
        info!(run_id = %run.id, "consolidate phase: no tasks to consolidate");
        return Ok(0);
    }

    let mut prompt = String::from(
        "Consolidate the following tasks into a dependency-ordered graph. Respond with a JSON array of \
         objects: {\"task_id\": string, \"parallel_group\": integer, \"depends_on\": [string]}.\n\n",
    );
    for task in &tasks {
        prompt.push_str(&format!("- {} ({}): {}\n", task.id, task.issue_id, task.title));
    }

    let request = cx.new_request(prompt, &run.id, AgentRole::Cdm, "consolidate");
    let response = cx.invoke(&request).await?;
    let consolidated: Vec<ConsolidatedTask> =
        serde_json::from_str(&extract_json_array(&response).ok_or_else(|| CliError::generic("consolidate response did not contain a JSON array"))?)
            .map_err(|source| CliError::generic(format!("consolidate response did not match the expected shape: {source}")))?;

    let mut applied = 0;
    for entry in consolidated {
        let task_id = TaskId::new(entry.task_id);
        let mut task = cx.store.load_task(&run.id, &task_id).await?;
        task.parallel_group = entry.parallel_group;
        task.depends_on = entry.depends_on.into_iter().map(TaskId::new).collect();
        cx.store.save_task(&run.id, &task).await?;
        applied += 1;
    }
    info!(run_id = %run.id, tasks_consolidated = applied, "consolidate phase complete");
    Ok(applied)
}

// ============================================================================
// SECTION: Exec
// ============================================================================

/// Runs the exec phase: fans the consolidated task graph out across the
/// issue-parallel worker pool.
///
/// # Errors
///
/// Returns [`CliError`] if loading the task graph fails; individual worker
/// failures are carried in the returned outcomes rather than raised here.
pub async fn run_exec(
    cx: &PipelineCx<'_>,
    run: &Run,
    vcs: Arc<dyn Vcs>,
    store: Arc<dyn RunStateStore>,
    audit: Arc<AuditLog>,
    executor: Arc<MiddlewareExecutor>,
    max_concurrent: usize,
) -> Result<Vec<milhouse_exec::WorkerOutcome>, CliError> {
    let tasks = cx.store.load_tasks(&run.id).await?;
    let issues = cx.store.load_issues(&run.id).await?;
    let tasks: Vec<Task> = tasks
        .into_iter()
        .filter(|task| cx.task_id_filter.as_deref().is_none_or(|wanted| wanted == task.id.as_str()))
        .collect();
    let groups = order_groups_by_severity(partition_by_issue(tasks, issues));
    if groups.is_empty() {
        info!(run_id = %run.id, "exec phase: no groups to dispatch");
        return Ok(Vec::new());
    }

    let model_override = cx.model_override.clone();
    let build_prompt = Arc::new(move |issue: &Issue, task: &Task| {
        let model_hint = model_override.as_deref().map(|m| format!(" (model override: {m})")).unwrap_or_default();
        format!(
            "Implement task {} for issue {}{}.\nTitle: {}\nDescription: {}",
            task.id, issue.id, model_hint, task.title, task.description
        )
    });

    let base_branch = vcs.current_branch().await.unwrap_or_else(|_| "main".to_owned());
    let pool = IssuePool::new(
        cx.root.clone(),
        run.id.as_str(),
        base_branch,
        vcs,
        store,
        audit,
        executor,
        false,
        max_concurrent.max(1),
        build_prompt,
    );
    let outcomes = pool.run(groups).await;

    let mut results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        results.push(outcome?);
    }
    info!(run_id = %run.id, workers = results.len(), "exec phase complete");
    Ok(results)
}

// ============================================================================
// SECTION: Verify
// ============================================================================

/// Outcome of the verify phase: the deterministic gate reports and the AI
/// verifier's verdict.
pub struct VerifyOutcome {
    /// One report per deterministic gate, in fixed order.
    pub gate_reports: Vec<GateReport>,
    /// The AI verifier's structured verdict.
    pub verdict: VerifierVerdict,
}

/// Runs the verify phase: the five deterministic gates in order, then the AI
/// verifier over their output.
///
/// # Errors
///
/// Returns [`CliError`] if a gate cannot run at all, or the verifier
/// invocation fails or returns an unparseable response.
pub async fn run_verify(cx: &PipelineCx<'_>, run: &Run, unsafe_dod_checks: bool) -> Result<VerifyOutcome, CliError> {
    let tasks = cx.store.load_tasks(&run.id).await?;
    let executions = cx.store.load_executions(&run.id).await?;
    let safety = CommandSafetyPolicy::new(cx.config.allowed_commands.execution.clone());

    let gate_reports = run_all_gates(&cx.root, tasks.clone(), &executions, &safety, unsafe_dod_checks, cx.store, &run.id).await?;

    let project_context = cx.config.project.description.clone().unwrap_or_else(|| "no project description configured".to_owned());
    let verdict = run_ai_verifier(cx.executor, &cx.root, &run.id, &project_context, &tasks, &gate_reports).await?;

    info!(run_id = %run.id, overall_pass = verdict.overall_pass, gates_passed = gate_reports.iter().filter(|r| r.passed).count(), "verify phase complete");
    Ok(VerifyOutcome { gate_reports, verdict })
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Pulls the first balanced `[...]` array out of `text`, tolerating prose or
/// markdown fences around the JSON body, mirroring [`milhouse_exec`]'s
/// object-scanning approach for the AI verifier's response.
fn extract_json_array(text: &str) -> Option<String> {
    let start = text.find('[')?;
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
            b'[' => depth += 1,
            b']' => {
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

/// Generates a four-hex-character suffix for a fresh run id.
#[must_use]
pub fn random_run_suffix() -> String {
    let mut rng = rand::thread_rng();
    format!("{:04x}", rng.gen_range(0..0x1_0000u32))
}

/// Resolves the most recently created run directory under `<root>/runs/`, if
/// any; run ids sort lexicographically by creation time.
pub async fn latest_run_id(root: &Path) -> Option<RunId> {
    let runs_dir = root.join("runs");
    let mut entries = tokio::fs::read_dir(&runs_dir).await.ok()?;
    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(file_type) = entry.file_type().await {
            if file_type.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_owned());
                }
            }
        }
    }
    names.sort();
    names.pop().map(RunId::new)
}

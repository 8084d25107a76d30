// milhouse-cli/src/main.rs
// ============================================================================
// Module: Milhouse CLI Entry Point
// Description: Command dispatcher driving the six pipeline phases.
// Purpose: Parse the documented flag surface, load the run-scoped
//          collaborators, drive the selected phases in fixed pipeline
//          order, and return the documented exit code.
// Dependencies: clap, milhouse-config, milhouse-core, milhouse-engines,
//               milhouse-exec, milhouse-runtime, tokio, tracing,
//               tracing-subscriber
// ============================================================================

//! ## Overview
//! Phases run in their fixed pipeline order regardless of the order their
//! flags were given: scan, validate, plan, consolidate, exec, verify,
//! export. `--run` resumes an existing run; omitting it resolves the most
//! recently created run under `<root>/runs/`, except for `--scan`, which
//! always starts a fresh one. `--export` is accepted (its renderer lives
//! outside this core) but only ever produces a message pointing at the
//! external renderer.

// ============================================================================
// SECTION: Imports
// ============================================================================

mod error;
mod phases;

use std::process::ExitCode;
use std::sync::Arc;

use clap::ArgAction;
use clap::Parser;
use milhouse_config::ConfigCache;
use milhouse_config::MilhouseConfig;
use milhouse_core::Run;
use milhouse_core::RunId;
use milhouse_core::RunPhase;
use milhouse_core::Timestamp;
use milhouse_engines::EnginePlugin;
use milhouse_exec::actions;
use milhouse_exec::AuditLog;
use milhouse_exec::FsRunStateStore;
use milhouse_exec::GitCli;
use milhouse_exec::RunStateStore;
use milhouse_exec::Vcs;
use milhouse_runtime::middlewares::circuit_breaker::CircuitBreakerPolicy;
use milhouse_runtime::middlewares::default_stack;
use milhouse_runtime::middlewares::rate_limit::RateLimitPolicy;
use milhouse_runtime::MiddlewareExecutor;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::CliError;
use crate::phases::PipelineCx;

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "milhouse", disable_help_subcommand = true, arg_required_else_help = true)]
struct Cli {
    /// Run the scan phase, starting a fresh run.
    #[arg(long, action = ArgAction::SetTrue)]
    scan: bool,
    /// Run the validate phase.
    #[arg(long, action = ArgAction::SetTrue)]
    validate: bool,
    /// Run the plan phase.
    #[arg(long, action = ArgAction::SetTrue)]
    plan: bool,
    /// Run the consolidate phase.
    #[arg(long, action = ArgAction::SetTrue)]
    consolidate: bool,
    /// Run the exec phase.
    #[arg(long, action = ArgAction::SetTrue)]
    exec: bool,
    /// Run the verify phase.
    #[arg(long, action = ArgAction::SetTrue)]
    verify: bool,
    /// Accept the export flag; the renderer itself is out of scope.
    #[arg(long, action = ArgAction::SetTrue)]
    export: bool,

    /// Free-text focus area recorded on a freshly scanned run.
    #[arg(long, value_name = "SCOPE")]
    scope: Option<String>,
    /// Comma-separated issue id filter applied to plan.
    #[arg(long, value_name = "IDS")]
    issues: Option<String>,
    /// Single task id filter applied to exec.
    #[arg(long, value_name = "ID")]
    task_id: Option<String>,
    /// Resume an existing run by id; omit to resolve the latest run.
    #[arg(long, value_name = "RUN_ID")]
    run: Option<String>,
    /// Override the configured exec-phase concurrency cap.
    #[arg(long, value_name = "N")]
    parallel: Option<usize>,
    /// Engine name (selects the plugin) or, if unrecognized, a model string
    /// forwarded as an override to the default engine.
    #[arg(long, value_name = "NAME")]
    model: Option<String>,
    /// Run DoD check commands even when the safety policy flags them.
    #[arg(long, action = ArgAction::SetTrue)]
    unsafe_dod_checks: bool,
    /// Accepted for the tmux attach/observe lifecycle boundary; the core
    /// never attaches a session itself.
    #[arg(long, action = ArgAction::SetTrue)]
    tmux: bool,
    /// Accepted for the engine-availability check; the core never shells
    /// out to an installer.
    #[arg(long, action = ArgAction::SetTrue)]
    auto_install: bool,
    /// Emit debug-level logs.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = std::env::current_dir().map_err(|source| CliError::generic(format!("cannot resolve repository root: {source}")))?;
    let config = ConfigCache.get_or_load(&root)?;

    let (engine_name, model_override) = resolve_model_selection(cli.model.as_deref());
    let plugin = build_plugin(&engine_name).ok_or_else(|| CliError::engine_unavailable(format!("'{engine_name}' is not a known engine")))?;
    if !plugin.is_available() {
        let install_hint = if cli.auto_install {
            " (--auto-install was given, but the core never shells out to an installer)"
        } else {
            ""
        };
        return Err(CliError::engine_unavailable(format!("engine '{engine_name}' is not available in PATH{install_hint}")));
    }

    let max_concurrent = cli.parallel.unwrap_or(config.execution.parallel).max(1);
    let stack = default_stack(max_concurrent, RateLimitPolicy::default(), CircuitBreakerPolicy::default());
    let executor = MiddlewareExecutor::new(plugin, stack);

    let store = FsRunStateStore::new(&root);
    let run_record = resolve_run(&root, &store, &cli).await?;
    let audit = AuditLog::new(root.join("runs").join(run_record.id.as_str()).join("audit.jsonl"));

    let cx = PipelineCx {
        root: root.clone(),
        config: &config,
        store: &store,
        audit: &audit,
        executor: &executor,
        model_override,
        issue_filter: cli.issues.as_deref().map(split_csv).unwrap_or_default(),
        task_id_filter: cli.task_id.clone(),
    };

    let mut run_record = run_record;
    let mut gate_failure = false;

    if cli.scan {
        advance_phase(&cx, &mut run_record, RunPhase::Scan).await?;
        phases::run_scan(&cx, &run_record).await?;
    }
    if cli.validate {
        advance_phase(&cx, &mut run_record, RunPhase::Validate).await?;
        phases::run_validate(&cx, &run_record).await?;
    }
    if cli.plan {
        advance_phase(&cx, &mut run_record, RunPhase::Plan).await?;
        phases::run_plan(&cx, &run_record).await?;
    }
    if cli.consolidate {
        advance_phase(&cx, &mut run_record, RunPhase::Consolidate).await?;
        phases::run_consolidate(&cx, &run_record).await?;
    }
    if cli.exec {
        advance_phase(&cx, &mut run_record, RunPhase::Exec).await?;
        let vcs: Arc<dyn Vcs> = Arc::new(GitCli::new(&root));
        let store_arc: Arc<dyn RunStateStore> = Arc::new(FsRunStateStore::new(&root));
        let audit_arc = Arc::new(AuditLog::new(root.join("runs").join(run_record.id.as_str()).join("audit.jsonl")));
        let executor_arc = Arc::new(MiddlewareExecutor::new(build_plugin(&engine_name).ok_or_else(|| CliError::engine_unavailable(engine_name.clone()))?, default_stack(max_concurrent, RateLimitPolicy::default(), CircuitBreakerPolicy::default())));
        let outcomes = phases::run_exec(&cx, &run_record, vcs, store_arc, audit_arc, executor_arc, max_concurrent).await?;
        info!(run_id = %run_record.id, workers = outcomes.len(), "exec phase dispatched");
    }
    if cli.verify {
        advance_phase(&cx, &mut run_record, RunPhase::Verify).await?;
        let outcome = phases::run_verify(&cx, &run_record, cli.unsafe_dod_checks).await?;
        let tasks = cx.store.load_tasks(&run_record.id).await?;
        let any_task_failed = tasks.iter().any(|task| {
            matches!(task.status, milhouse_core::TaskStatus::Failed | milhouse_core::TaskStatus::MergeError)
        });
        let gates_passed = outcome.gate_reports.iter().all(|report| report.passed);
        gate_failure = !(gates_passed && outcome.verdict.overall_pass && !any_task_failed);
        let final_phase = if gate_failure { RunPhase::Failed } else { RunPhase::Completed };
        advance_phase(&cx, &mut run_record, final_phase).await?;
    }
    if cli.export {
        println!("export is handled by an external renderer; this core only accepts the flag");
    }

    if gate_failure {
        return Ok(ExitCode::from(4));
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Setup Helpers
// ============================================================================

/// Initializes the tracing subscriber: `RUST_LOG` wins when set, otherwise
/// info (or debug under `--verbose`).
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Resolves `--model` into an engine name plus an optional model-string
/// override: a value matching a known engine name selects that engine, any
/// other value selects the default engine (`claude`) and is forwarded as its
/// model override.
fn resolve_model_selection(model: Option<&str>) -> (String, Option<String>) {
    const KNOWN_ENGINES: &[&str] = &["claude", "codex", "cursor", "droid", "gemini", "opencode", "qwen", "aider"];
    match model {
        Some(value) if KNOWN_ENGINES.contains(&value) => (value.to_owned(), None),
        Some(value) => ("claude".to_owned(), Some(value.to_owned())),
        None => ("claude".to_owned(), None),
    }
}

/// Constructs the concrete engine plugin named `name`, if recognized.
fn build_plugin(name: &str) -> Option<Arc<dyn EnginePlugin>> {
    use milhouse_engines::plugins::aider::AiderPlugin;
    use milhouse_engines::plugins::claude::ClaudePlugin;
    use milhouse_engines::plugins::codex::CodexPlugin;
    use milhouse_engines::plugins::cursor::CursorPlugin;
    use milhouse_engines::plugins::droid::DroidPlugin;
    use milhouse_engines::plugins::gemini::GeminiPlugin;
    use milhouse_engines::plugins::opencode::OpenCodePlugin;
    use milhouse_engines::plugins::qwen::QwenPlugin;

    match name {
        "claude" => Some(Arc::new(ClaudePlugin::new())),
        "codex" => Some(Arc::new(CodexPlugin::new())),
        "cursor" => Some(Arc::new(CursorPlugin::new())),
        "droid" => Some(Arc::new(DroidPlugin::new())),
        "gemini" => Some(Arc::new(GeminiPlugin::new())),
        "opencode" => Some(Arc::new(OpenCodePlugin::new())),
        "qwen" => Some(Arc::new(QwenPlugin::new())),
        "aider" => Some(Arc::new(AiderPlugin::new())),
        _ => None,
    }
}

/// Resolves the run this invocation operates on: `--scan` always starts a
/// fresh run; otherwise `--run` is honored if given, falling back to the
/// latest run under `<root>/runs/`.
///
/// # Errors
///
/// Returns [`CliError::no_active_run`] if no run id was given, `--scan` was
/// not requested, and no run exists on disk yet.
async fn resolve_run(root: &std::path::Path, store: &FsRunStateStore, cli: &Cli) -> CliResult<Run> {
    if cli.scan {
        let now = Timestamp::now();
        let run_id = RunId::generate(now, &phases::random_run_suffix());
        let run = Run::new(run_id, cli.scope.clone(), None, now);
        store.save_run(&run).await?;
        return Ok(run);
    }

    if let Some(run_id) = &cli.run {
        return Ok(store.load_run(&RunId::new(run_id.clone())).await?);
    }

    match phases::latest_run_id(root).await {
        Some(run_id) => Ok(store.load_run(&run_id).await?),
        None => Err(CliError::no_active_run("no active run; pass --run or start one with --scan")),
    }
}

/// Advances `run`'s phase, persisting and auditing the transition, unless it
/// is already at or past `next`.
async fn advance_phase(cx: &PipelineCx<'_>, run: &mut Run, next: RunPhase) -> CliResult<()> {
    let before = format!("{:?}", run.phase);
    if !run.transition_to(next, Timestamp::now()) {
        return Ok(());
    }
    cx.store.save_run(run).await?;
    cx.audit
        .append(&actions::run_phase_changed(run.updated_at, run.id.as_str(), &before, &format!("{next:?}")))
        .await
        .unwrap_or_else(|err| tracing::warn!(error = %err, "audit append failed for phase transition"));
    Ok(())
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|part| !part.is_empty()).map(str::to_owned).collect()
}

/// Emits an error message to stderr and returns its documented exit code.
fn emit_error(err: &CliError) -> ExitCode {
    eprintln!("{err}");
    ExitCode::from(err.code())
}

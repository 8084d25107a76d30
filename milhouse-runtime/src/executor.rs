// milhouse-runtime/src/executor.rs
// ============================================================================
// Module: Middleware Executor
// Description: Composes the middleware stack around the innermost
//              process-spawning handler for one engine plugin.
// Purpose: Drive the full process lifecycle: spawn, stdin write/close,
//          concurrent stdout-stream/stderr-collect/exit-wait, result
//          synthesis.
// Dependencies: tokio, milhouse-engines, milhouse-stream, milhouse-core
// ============================================================================

//! ## Overview
//! `MiddlewareExecutor` pairs one [`EnginePlugin`] with a middleware stack.
//! `execute` runs the plugin to completion and returns the buffered
//! [`ExecutionOutcome`]; `execute_streaming` additionally forwards each
//! parsed [`Step`] to a caller-supplied callback as it is produced.

use std::process::Stdio;
use std::sync::Arc;

use milhouse_engines::EngineError;
use milhouse_engines::EnginePlugin;
use milhouse_engines::PromptDelivery;
use milhouse_stream::Step;
use milhouse_stream::StepParser;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::process::Command;
use tracing::warn;

use crate::error::RuntimeError;
use crate::middleware::ExecutionOutcome;
use crate::middleware::Handler;
use crate::middleware::HandlerFuture;
use crate::middleware::Middleware;
use crate::middleware::Next;
use crate::request::ExecutionContext;
use crate::request::ExecutionRequest;

/// Callback invoked once per step as it is parsed, for the streaming entry
/// point.
pub type StepCallback = Box<dyn Fn(&Step) + Send + Sync>;

// ============================================================================
// SECTION: Middleware Executor
// ============================================================================

/// Pairs one engine plugin with a middleware stack and drives the process
/// lifecycle.
pub struct MiddlewareExecutor {
    /// The vendor adapter this executor dispatches to.
    plugin: Arc<dyn EnginePlugin>,
    /// Middleware stack, outermost-first.
    stack: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareExecutor {
    /// Creates an executor for `plugin` wrapped by `stack`.
    #[must_use]
    pub fn new(plugin: Arc<dyn EnginePlugin>, stack: Vec<Arc<dyn Middleware>>) -> Self {
        Self { plugin, stack }
    }

    /// Runs `request` through the middleware stack, buffering all steps.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if the engine is unavailable, fails to
    /// spawn, times out, is rejected by the circuit breaker or rate
    /// limiter, or exhausts its retries.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        let handler = ProcessHandler { plugin: Arc::clone(&self.plugin), on_step: None };
        let next = Next::new(&self.stack, &handler);
        next.call(request, context).await
    }

    /// Returns whether the wrapped plugin's binary is present in `PATH`.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.plugin.is_available()
    }

    /// Returns the wrapped plugin's stable name.
    #[must_use]
    pub fn engine_name(&self) -> &str {
        self.plugin.name()
    }

    /// Same lifecycle as [`Self::execute`], but forwards each step to
    /// `on_step` synchronously as it is produced.
    ///
    /// # Errors
    ///
    /// See [`Self::execute`].
    pub async fn execute_streaming(
        &self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
        on_step: StepCallback,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        let handler = ProcessHandler { plugin: Arc::clone(&self.plugin), on_step: Some(on_step) };
        let next = Next::new(&self.stack, &handler);
        next.call(request, context).await
    }
}

// ============================================================================
// SECTION: Process Handler
// ============================================================================

/// The innermost handler: spawns the engine's child process and synthesizes
/// an [`ExecutionOutcome`] from its output.
struct ProcessHandler {
    /// The vendor adapter to spawn.
    plugin: Arc<dyn EnginePlugin>,
    /// Optional per-step callback for the streaming entry point.
    on_step: Option<StepCallback>,
}

impl Handler for ProcessHandler {
    fn call<'a>(&'a self, request: &'a ExecutionRequest, context: &'a mut ExecutionContext) -> HandlerFuture<'a> {
        Box::pin(self.run(request, context))
    }
}

impl ProcessHandler {
    /// Spawns the plugin's child process for `request` and drives it to
    /// completion.
    async fn run(
        &self,
        request: &ExecutionRequest,
        context: &mut ExecutionContext,
    ) -> Result<ExecutionOutcome, RuntimeError> {
        if !self.plugin.is_available() {
            return Err(RuntimeError::Engine(EngineError::Unavailable(self.plugin.name().to_owned())));
        }

        let engine_request = to_engine_request(request);
        let args = self.plugin.build_args(&engine_request).map_err(RuntimeError::Engine)?;

        let mut command = Command::new(&self.plugin.config().command);
        command.args(&args).kill_on_drop(true).current_dir(&request.work_dir).stdout(Stdio::piped()).stderr(Stdio::piped());

        if self.plugin.uses_stdin_for_prompt() {
            command.stdin(Stdio::piped());
        } else {
            command.stdin(Stdio::null());
        }

        for (key, value) in self.plugin.env() {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| {
            RuntimeError::Engine(EngineError::Spawn { engine: self.plugin.name().to_owned(), message: source.to_string() })
        })?;

        if self.plugin.prompt_delivery() == PromptDelivery::Stdin {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(request.prompt.as_bytes()).await;
                drop(stdin);
            }
        }

        let stdout = child.stdout.take().ok_or_else(|| {
            RuntimeError::Engine(EngineError::Spawn { engine: self.plugin.name().to_owned(), message: "no stdout handle".to_owned() })
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            RuntimeError::Engine(EngineError::Spawn { engine: self.plugin.name().to_owned(), message: "no stderr handle".to_owned() })
        })?;

        let mut parser = self.plugin.parse_output();
        let mut steps: Vec<Step> = Vec::new();
        let mut stderr_text = String::new();

        let mut stdout_lines = BufReader::new(stdout).lines();
        let mut stderr_lines = BufReader::new(stderr).lines();
        loop {
            tokio::select! {
                line = stdout_lines.next_line() => {
                    match line {
                        Ok(Some(raw)) => {
                            let mut chunk = raw.into_bytes();
                            chunk.push(b'\n');
                            for step in parser.feed(&chunk) {
                                if let Some(on_step) = &self.on_step {
                                    on_step(&step);
                                }
                                steps.push(step);
                            }
                        }
                        Ok(None) => break,
                        Err(source) => {
                            warn!(engine = self.plugin.name(), error = %source, "error reading engine stdout");
                            break;
                        }
                    }
                }
                line = stderr_lines.next_line() => {
                    if let Ok(Some(raw)) = line {
                        stderr_text.push_str(&raw);
                        stderr_text.push('\n');
                    }
                }
            }
        }
        while let Ok(Some(raw)) = stderr_lines.next_line().await {
            stderr_text.push_str(&raw);
            stderr_text.push('\n');
        }
        for step in parser.flush() {
            if let Some(on_step) = &self.on_step {
                on_step(&step);
            }
            steps.push(step);
        }

        let status = child.wait().await.map_err(|source| {
            RuntimeError::Engine(EngineError::Spawn { engine: self.plugin.name().to_owned(), message: source.to_string() })
        })?;

        let duration = context.elapsed();
        let final_response = milhouse_stream::extract_final_response(&steps).unwrap_or_default();
        let tokens = parser.usage();
        let success = status.success();

        context.record_metadata("engine", serde_json::Value::String(self.plugin.name().to_owned()));
        context.record_metadata("attempt", serde_json::Value::from(context.attempt));

        if !success {
            let code = status.code().unwrap_or(-1);
            return Err(RuntimeError::Engine(EngineError::NonZeroExit {
                engine: self.plugin.name().to_owned(),
                code,
                stderr: stderr_text,
            }));
        }

        Ok(ExecutionOutcome {
            success,
            final_response,
            steps,
            duration,
            exit_code: status.code(),
            tokens,
            error: None,
        })
    }
}

/// Projects the richer runtime request down to the plugin-facing shape.
fn to_engine_request(request: &ExecutionRequest) -> milhouse_engines::EngineRequest {
    let mut engine_request =
        milhouse_engines::EngineRequest::new(request.prompt.clone(), request.work_dir.clone(), request.agent_role);
    engine_request.model_override = request.model_override.clone();
    engine_request.session_id = request.session_id.clone();
    engine_request.continue_session = request.continue_session;
    engine_request
}

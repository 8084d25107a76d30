// milhouse-runtime/src/request.rs
// ============================================================================
// Module: Execution Request & Context
// Description: The validated request dispatched through the middleware
//              stack, and the per-invocation context built around it.
// Purpose: Give every middleware and the innermost executor a single,
//          stable view of "what to run" and "what we know so far".
// Dependencies: milhouse-core
// ============================================================================

//! ## Overview
//! `ExecutionRequest` is the caller-supplied, validated description of one
//! engine invocation. `ExecutionContext` is built once per invocation and
//! threaded through the middleware stack, accumulating an evidence map, an
//! attempt counter, and free-form metadata as middlewares do their work.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use milhouse_core::AgentRole;
use milhouse_core::RunId;
use serde_json::Value;

// ============================================================================
// SECTION: Execution Request
// ============================================================================

/// Output format requested of the engine, independent of its wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Stream-JSON or text, whichever the plugin natively emits.
    Native,
    /// Force plain-text final response only.
    TextOnly,
}

/// A validated request to invoke one engine, dispatched through the
/// middleware stack.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Prompt text.
    pub prompt: String,
    /// Working directory for the child process.
    pub work_dir: PathBuf,
    /// Per-invocation timeout override; `None` uses the engine default.
    pub timeout_ms: Option<u64>,
    /// Maximum retry attempts; `None` uses the retry middleware default.
    pub max_retries: Option<u32>,
    /// Whether the caller wants steps forwarded as they are produced.
    pub stream_output: bool,
    /// Requested output format.
    pub output_format: OutputFormat,
    /// Model override, if any.
    pub model_override: Option<String>,
    /// Session id to continue or resume, if any.
    pub session_id: Option<String>,
    /// Whether `session_id` should be continued.
    pub continue_session: bool,
    /// Whether `session_id` should be resumed fresh.
    pub resume_session: bool,
    /// Tool allowlist, vendor-interpreted.
    pub allowed_tools: Vec<String>,
    /// Tool denylist, vendor-interpreted.
    pub disallowed_tools: Vec<String>,
    /// Owning run id.
    pub run_id: RunId,
    /// Role this invocation executes under.
    pub agent_role: AgentRole,
    /// Pipeline phase this invocation belongs to.
    pub pipeline_phase: String,
}

impl ExecutionRequest {
    /// Creates a minimal request with no optional knobs set.
    #[must_use]
    pub fn new(
        prompt: impl Into<String>,
        work_dir: PathBuf,
        run_id: RunId,
        agent_role: AgentRole,
        pipeline_phase: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            work_dir,
            timeout_ms: None,
            max_retries: None,
            stream_output: false,
            output_format: OutputFormat::Native,
            model_override: None,
            session_id: None,
            continue_session: false,
            resume_session: false,
            allowed_tools: Vec::new(),
            disallowed_tools: Vec::new(),
            run_id,
            agent_role,
            pipeline_phase: pipeline_phase.into(),
        }
    }
}

// ============================================================================
// SECTION: Execution Context
// ============================================================================

/// Per-invocation context threaded through the middleware stack.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Owning run id.
    pub run_id: RunId,
    /// Role this invocation executes under.
    pub agent_role: AgentRole,
    /// Pipeline phase this invocation belongs to.
    pub pipeline_phase: String,
    /// Evidence accumulated by middlewares and the innermost executor.
    pub evidence: BTreeMap<String, Value>,
    /// Wall-clock start of the first attempt.
    pub started_at: Instant,
    /// Current attempt number, starting at 1.
    pub attempt: u32,
    /// Free-form metadata bag (task id, engine name, etc.).
    pub metadata: BTreeMap<String, Value>,
}

impl ExecutionContext {
    /// Builds a fresh context for `request`.
    #[must_use]
    pub fn new(request: &ExecutionRequest) -> Self {
        Self {
            run_id: request.run_id.clone(),
            agent_role: request.agent_role,
            pipeline_phase: request.pipeline_phase.clone(),
            evidence: BTreeMap::new(),
            started_at: Instant::now(),
            attempt: 1,
            metadata: BTreeMap::new(),
        }
    }

    /// Records an evidence value under `key`, overwriting any prior value.
    pub fn record_evidence(&mut self, key: impl Into<String>, value: Value) {
        self.evidence.insert(key.into(), value);
    }

    /// Records a metadata value under `key`, overwriting any prior value.
    pub fn record_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Returns the elapsed wall-clock duration since `started_at`.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

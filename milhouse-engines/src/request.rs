// milhouse-engines/src/request.rs
// ============================================================================
// Module: Milhouse Engine Request
// Description: The plugin-facing view of one invocation request.
// Purpose: Give build_args/env a stable, vendor-agnostic request shape.
// Dependencies: milhouse-core
// ============================================================================

//! ## Overview
//! `EngineRequest` is the subset of an execution request a plugin needs to
//! build argv and environment overrides. The richer request/context used by
//! the middleware executor (retries, timeouts, run/task bookkeeping) lives in
//! `milhouse-runtime` and is projected down to this shape per invocation.

use std::path::PathBuf;

use milhouse_core::AgentRole;

// ============================================================================
// SECTION: Prompt Delivery
// ============================================================================

/// How the prompt reaches the engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDelivery {
    /// Prompt is written to the child's stdin, then stdin is closed.
    Stdin,
    /// Prompt is appended as a positional argv entry; stdin is closed
    /// immediately.
    Argv,
}

// ============================================================================
// SECTION: Approval Mode
// ============================================================================

/// Autonomy/approval posture requested of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMode {
    /// The engine may act without per-step human approval.
    Autonomous,
    /// The engine must request approval before mutating actions.
    Supervised,
}

// ============================================================================
// SECTION: Engine Request
// ============================================================================

/// The plugin-facing view of one invocation.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Prompt text.
    pub prompt: String,
    /// Working directory for the child process.
    pub work_dir: PathBuf,
    /// Model override, if the caller requested one.
    pub model_override: Option<String>,
    /// Session id to continue or resume, if any.
    pub session_id: Option<String>,
    /// Whether `session_id` should be continued (vs. resumed fresh).
    pub continue_session: bool,
    /// Approval/autonomy mode.
    pub approval_mode: ApprovalMode,
    /// Auxiliary directories the engine may read/write beyond `work_dir`.
    pub auxiliary_dirs: Vec<PathBuf>,
    /// Requests the engine constrain its final response to a JSON schema.
    pub json_schema: Option<String>,
    /// Role tag for this invocation, used in logging and prompt framing.
    pub agent_role: AgentRole,
}

impl EngineRequest {
    /// Creates a minimal request with no optional knobs set.
    #[must_use]
    pub fn new(prompt: impl Into<String>, work_dir: PathBuf, agent_role: AgentRole) -> Self {
        Self {
            prompt: prompt.into(),
            work_dir,
            model_override: None,
            session_id: None,
            continue_session: false,
            approval_mode: ApprovalMode::Supervised,
            auxiliary_dirs: Vec::new(),
            json_schema: None,
            agent_role,
        }
    }
}

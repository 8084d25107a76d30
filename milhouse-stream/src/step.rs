// milhouse-stream/src/step.rs
// ============================================================================
// Module: Milhouse Step
// Description: The normalized event type produced by every stream parser.
// Purpose: Give C2/C3 a single sum type to reason about regardless of vendor
//          wire format.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! `Step` is the tagged variant every parser in this crate emits. `meta`
//! flags on a `Result` step mark internal bookkeeping records (tool results,
//! system messages, user echoes) so the final-response extractor can skip
//! them.

use serde_json::Value;

// ============================================================================
// SECTION: Step
// ============================================================================

/// One normalized event extracted from an engine's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The engine's visible reasoning text.
    Thinking(String),
    /// The engine invoked a tool.
    ToolUse {
        /// Tool name.
        name: String,
        /// Tool input payload, as the vendor emitted it.
        input: Value,
        /// Vendor-assigned call id, when present.
        id: Option<String>,
    },
    /// A result-shaped record: the final response, an intermediate
    /// system/tool-result echo, or a best-effort text-mode fallback.
    Result {
        /// Result text.
        text: String,
        /// Flags describing what kind of result this is.
        meta: StepMeta,
    },
    /// An error reported by the engine.
    Error(String),
}

// ============================================================================
// SECTION: Step Metadata
// ============================================================================

/// Flags attached to a [`Step::Result`] distinguishing the final
/// user-visible response from internal bookkeeping records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepMeta {
    /// This result echoes a tool's return value.
    pub is_tool_result: bool,
    /// This result is a system-level record, not agent output.
    pub is_system: bool,
    /// This result echoes the user's own message.
    pub is_user_message: bool,
    /// This result is internal bookkeeping, not meant for display.
    pub is_internal: bool,
    /// This result is a non-delta, whole-message final response.
    pub is_final_response: bool,
}

impl StepMeta {
    /// Returns whether this record should be skipped when scanning for the
    /// final visible response.
    #[must_use]
    pub const fn is_skippable(self) -> bool {
        self.is_tool_result || self.is_system || self.is_user_message || self.is_internal
    }
}

// ============================================================================
// SECTION: Token Usage
// ============================================================================

/// Accumulated token counts for one engine invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    /// Prompt tokens consumed.
    pub input: u64,
    /// Completion tokens produced.
    pub output: u64,
}

impl TokenUsage {
    /// Accumulates another usage delta into this total.
    pub fn accumulate(&mut self, other: TokenUsage) {
        self.input = self.input.saturating_add(other.input);
        self.output = self.output.saturating_add(other.output);
    }
}

// milhouse-engines/src/plugin.rs
// ============================================================================
// Module: Milhouse Engine Plugin Trait
// Description: The fixed contract every vendor adapter implements.
// Purpose: Let the middleware executor (C3) drive any vendor through one
//          object-safe trait.
// Dependencies: milhouse-stream, crate::{config, error, request}
// ============================================================================

//! ## Overview
//! `EnginePlugin` mirrors the core's interface-trait convention: small,
//! focused, one concern per trait, object-safe so the registry can hold
//! `Box<dyn EnginePlugin>` values.

use milhouse_stream::StepParser;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::request::EngineRequest;
use crate::request::PromptDelivery;

/// Per-vendor adapter exposing a fixed contract over a subprocess-based AI
/// CLI.
pub trait EnginePlugin: Send + Sync {
    /// Stable engine name, e.g. `"claude"`.
    fn name(&self) -> &str;

    /// Static configuration: binary, default argv, timeout, concurrency,
    /// rate limit.
    fn config(&self) -> &EngineConfig;

    /// Returns whether the engine's CLI binary is present in `PATH`.
    fn is_available(&self) -> bool;

    /// Builds the final argv for this invocation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MalformedOutput`]-adjacent errors only in the
    /// unusual case a request's fields conflict; in the common case this
    /// never fails.
    fn build_args(&self, request: &EngineRequest) -> Result<Vec<String>, EngineError>;

    /// Selects the stream-JSON or text parser appropriate for this vendor's
    /// output format.
    fn parse_output(&self) -> Box<dyn StepParser>;

    /// Key/value environment overrides for the child process. Always
    /// includes `CI=true` and `NO_COLOR=1`; may forward a host API key.
    fn env(&self) -> Vec<(String, String)>;

    /// Whether the prompt is delivered on stdin (`true`, the default) or as
    /// a positional argv entry (`false`).
    fn uses_stdin_for_prompt(&self) -> bool {
        true
    }

    /// Returns the prompt-delivery mode implied by [`Self::uses_stdin_for_prompt`].
    fn prompt_delivery(&self) -> PromptDelivery {
        if self.uses_stdin_for_prompt() {
            PromptDelivery::Stdin
        } else {
            PromptDelivery::Argv
        }
    }
}

/// Environment overrides every plugin applies regardless of vendor.
#[must_use]
pub fn base_env() -> Vec<(String, String)> {
    vec![("CI".to_owned(), "true".to_owned()), ("NO_COLOR".to_owned(), "1".to_owned())]
}

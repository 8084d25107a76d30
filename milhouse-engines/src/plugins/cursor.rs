// milhouse-engines/src/plugins/cursor.rs
// ============================================================================
// Module: Cursor Engine Plugin
// Description: Adapter for the Cursor agent CLI.
// Purpose: Translate EngineRequest into the cursor-agent binary's argv/env,
//          and select the stream-JSON output parser.
// Dependencies: milhouse-stream, which, crate::{config, plugin, request, error}
// ============================================================================

//! ## Overview
//! `cursor-agent -p --output-format stream-json` streams one JSON object per
//! line; the prompt is delivered on stdin.

use milhouse_stream::StepParser;
use milhouse_stream::StreamJsonParser;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::plugin::EnginePlugin;
use crate::plugin::base_env;
use crate::request::ApprovalMode;
use crate::request::EngineRequest;

/// Adapter for the `cursor-agent` CLI.
pub struct CursorPlugin {
    /// Static configuration.
    config: EngineConfig,
}

impl CursorPlugin {
    /// Creates a plugin with the default `cursor-agent` command and argv
    /// prefix.
    #[must_use]
    pub fn new() -> Self {
        let config = EngineConfig::new("cursor-agent")
            .with_default_args(vec!["-p".to_owned(), "--output-format".to_owned(), "stream-json".to_owned()]);
        Self { config }
    }
}

impl Default for CursorPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EnginePlugin for CursorPlugin {
    fn name(&self) -> &str {
        "cursor"
    }

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn is_available(&self) -> bool {
        which::which(&self.config.command).is_ok()
    }

    fn build_args(&self, request: &EngineRequest) -> Result<Vec<String>, EngineError> {
        let mut args = self.config.default_args.clone();

        if let Some(model) = &request.model_override {
            args.push("--model".to_owned());
            args.push(model.clone());
        }

        if let Some(session_id) = &request.session_id {
            if request.continue_session {
                args.push("--resume".to_owned());
                args.push(session_id.clone());
            }
        }

        if request.approval_mode == ApprovalMode::Autonomous {
            args.push("--force".to_owned());
        }

        Ok(args)
    }

    fn parse_output(&self) -> Box<dyn StepParser> {
        Box::new(StreamJsonParser::new())
    }

    fn env(&self) -> Vec<(String, String)> {
        let mut env = base_env();
        if let Some(pair) = crate::env::host_api_key_env("CURSOR_API_KEY") {
            env.push(pair);
        }
        env
    }

    fn uses_stdin_for_prompt(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::CursorPlugin;
    use crate::EnginePlugin;

    #[test]
    fn name_is_cursor() {
        assert_eq!(CursorPlugin::new().name(), "cursor");
    }
}
